use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pifi_netplay::{
    ArcadeCommand, ArcadeEvent, GameView, HandlerOptions, HttpApplianceApi, SessionHandler,
};
use pifi_netproto::messages::api::HighScore;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{error, info};

use crate::{
    args::Args,
    input::{AppAction, InputManager},
    ui,
};

const LOG_LINES: usize = 8;

pub struct App {
    runtime: tokio::runtime::Runtime,
    handler_task: Option<JoinHandle<()>>,
    command_tx: mpsc::Sender<ArcadeCommand>,
    event_rx: mpsc::Receiver<ArcadeEvent>,
    view_rx: watch::Receiver<GameView>,
    input_manager: InputManager,
    host: String,
    log: VecDeque<String>,
    high_scores: Vec<HighScore>,
    should_quit: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let api = HttpApplianceApi::new(args.arcade.api_base_url());
        let options = HandlerOptions::from(&args.arcade);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (handler, command_tx) = SessionHandler::new(api, options, event_tx);
        let view_rx = handler.view();

        let handler_task = runtime.spawn(async move {
            if let Err(e) = handler.run().await {
                error!("Session handler stopped: {}", e);
            }
        });
        info!(host = %args.arcade.host, game = %args.arcade.game, "Arcade client started");

        Ok(Self {
            runtime,
            handler_task: Some(handler_task),
            command_tx,
            event_rx,
            view_rx,
            input_manager: InputManager::new(args.arcade.game),
            host: args.arcade.host,
            log: VecDeque::with_capacity(LOG_LINES),
            high_scores: Vec::new(),
            should_quit: false,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        terminal.show_cursor()?;

        // Let the handler close its sockets before the runtime goes away.
        let _ = self.command_tx.blocking_send(ArcadeCommand::Shutdown);
        if let Some(task) = self.handler_task.take() {
            let _ = self
                .runtime
                .block_on(async { tokio::time::timeout(Duration::from_secs(1), task).await });
        }
        res
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        let frame_duration = Duration::from_millis(33);

        while !self.should_quit {
            let start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                if let Event::Key(key) = event::read()? {
                    let (entering_initials, volume) = {
                        let view = self.view_rx.borrow();
                        (view.initials_entry.is_some(), view.volume_pct)
                    };
                    match self
                        .input_manager
                        .handle_event(key, entering_initials, volume)
                    {
                        AppAction::Quit => self.should_quit = true,
                        AppAction::Commands(cmds) => {
                            for cmd in cmds {
                                self.send(cmd);
                            }
                        }
                        AppAction::None => {}
                    }
                }
            }

            if let Some(cmd) = self.input_manager.update() {
                self.send(cmd);
            }

            while let Ok(event) = self.event_rx.try_recv() {
                self.record(event);
            }

            terminal.draw(|f| ui::draw(f, self))?;

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        Ok(())
    }

    fn send(&mut self, cmd: ArcadeCommand) {
        if self.command_tx.blocking_send(cmd).is_err() {
            error!("Session handler is gone");
            self.should_quit = true;
        }
    }

    fn record(&mut self, event: ArcadeEvent) {
        let line = match event {
            ArcadeEvent::Joined {
                session_id,
                slot_index,
                did_join_existing_game,
            } => format!(
                "{} game {session_id} as local player {}",
                if did_join_existing_game { "Joined" } else { "Started" },
                slot_index + 1
            ),
            ArcadeEvent::Superseded { previous } => format!("Left game {previous}"),
            ArcadeEvent::JoinFailed(reason) => format!("Join failed: {reason}"),
            ArcadeEvent::GameOver { text } => format!("Game over: {text}"),
            ArcadeEvent::SocketClosed { slot_index, reason } => {
                format!("Player {} disconnected: {reason}", slot_index + 1)
            }
            ArcadeEvent::HighScore { .. } => "High score! Enter your initials".to_string(),
            ArcadeEvent::InitialsRejected(reason) => reason,
            ArcadeEvent::InitialsSubmitted { accepted } => {
                if accepted {
                    "Initials saved".to_string()
                } else {
                    "Initials not saved".to_string()
                }
            }
            ArcadeEvent::HighScores(scores) => {
                self.high_scores = scores;
                "High scores updated".to_string()
            }
            ArcadeEvent::Error(e) => format!("Error: {e}"),
        };
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    pub fn view(&self) -> GameView {
        self.view_rx.borrow().clone()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn log(&self) -> impl Iterator<Item = &String> {
        self.log.iter()
    }

    pub fn high_scores(&self) -> &[HighScore] {
        &self.high_scores
    }

    pub fn initials_input(&self) -> &str {
        self.input_manager.initials()
    }
}

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use pifi_netplay::{ArcadeCommand, Key, PhysicalControl, TouchZone};
use pifi_netproto::{
    constants::INITIALS_LEN,
    messages::game::{GameKind, PaddleDirection, SnakeDirection},
};

const VOLUME_STEP: u8 = 5;

pub enum AppAction {
    Quit,
    Commands(Vec<ArcadeCommand>),
    None,
}

pub struct InputManager {
    game: GameKind,
    initials: String,
    /// Last volume key press; the slider counts as held until it goes quiet.
    volume_held_since: Option<Instant>,
    /// Time without a volume key after which the slider is released.
    release_timeout: Duration,
}

impl InputManager {
    pub fn new(game: GameKind) -> Self {
        Self {
            game,
            initials: String::new(),
            volume_held_since: None,
            release_timeout: Duration::from_millis(300),
        }
    }

    pub fn initials(&self) -> &str {
        &self.initials
    }

    /// `entering_initials` switches letter keys to the initials prompt.
    pub fn handle_event(
        &mut self,
        key: KeyEvent,
        entering_initials: bool,
        volume_pct: Option<u8>,
    ) -> AppAction {
        if key.kind == KeyEventKind::Release {
            return AppAction::None;
        }

        if entering_initials {
            return self.handle_initials_key(key.code);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return AppAction::Quit,
            KeyCode::Char('n') | KeyCode::Enter => {
                return AppAction::Commands(vec![ArcadeCommand::NewGame]);
            }
            KeyCode::Char('h') => {
                return AppAction::Commands(vec![ArcadeCommand::FetchHighScores]);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let vol = volume_pct.unwrap_or(50).saturating_add(VOLUME_STEP).min(100);
                self.volume_held_since = Some(Instant::now());
                return AppAction::Commands(vec![ArcadeCommand::SetVolume(vol)]);
            }
            KeyCode::Char('-') => {
                let vol = volume_pct.unwrap_or(50).saturating_sub(VOLUME_STEP);
                self.volume_held_since = Some(Instant::now());
                return AppAction::Commands(vec![ArcadeCommand::SetVolume(vol)]);
            }
            _ => {}
        }

        match self.map_control(key.code) {
            Some(control) => AppAction::Commands(vec![ArcadeCommand::Input(control)]),
            None => AppAction::None,
        }
    }

    /// Called every frame; releases the volume slider once its keys go quiet.
    pub fn update(&mut self) -> Option<ArcadeCommand> {
        let since = self.volume_held_since?;
        if since.elapsed() > self.release_timeout {
            self.volume_held_since = None;
            return Some(ArcadeCommand::ReleaseVolume);
        }
        None
    }

    fn handle_initials_key(&mut self, code: KeyCode) -> AppAction {
        match code {
            KeyCode::Char(c) if c.is_ascii_alphabetic() && self.initials.len() < INITIALS_LEN => {
                self.initials.push(c.to_ascii_uppercase());
                AppAction::None
            }
            KeyCode::Backspace => {
                self.initials.pop();
                AppAction::None
            }
            KeyCode::Enter => {
                let initials = std::mem::take(&mut self.initials);
                AppAction::Commands(vec![ArcadeCommand::SubmitInitials(initials)])
            }
            KeyCode::Esc => {
                self.initials.clear();
                AppAction::Commands(vec![ArcadeCommand::SkipInitials])
            }
            _ => AppAction::None,
        }
    }

    fn map_control(&self, code: KeyCode) -> Option<PhysicalControl> {
        let key = match code {
            KeyCode::Up => Some(Key::ArrowUp),
            KeyCode::Down => Some(Key::ArrowDown),
            KeyCode::Left => Some(Key::ArrowLeft),
            KeyCode::Right => Some(Key::ArrowRight),
            KeyCode::Char('w' | 'W') => Some(Key::W),
            KeyCode::Char('a' | 'A') => Some(Key::A),
            KeyCode::Char('s' | 'S') => Some(Key::S),
            KeyCode::Char('d' | 'D') => Some(Key::D),
            _ => None,
        };
        if let Some(key) = key {
            return Some(PhysicalControl::Key(key));
        }

        // i/j/k/l stand in for the on-screen touch controls.
        match (self.game, code) {
            (GameKind::Snake, KeyCode::Char('i')) => Some(PhysicalControl::Quadrant(SnakeDirection::Up)),
            (GameKind::Snake, KeyCode::Char('k')) => Some(PhysicalControl::Quadrant(SnakeDirection::Down)),
            (GameKind::Snake, KeyCode::Char('j')) => Some(PhysicalControl::Quadrant(SnakeDirection::Left)),
            (GameKind::Snake, KeyCode::Char('l')) => Some(PhysicalControl::Quadrant(SnakeDirection::Right)),
            (GameKind::Pong, KeyCode::Char('i')) => Some(zone(TouchZone::Left, PaddleDirection::Up)),
            (GameKind::Pong, KeyCode::Char('k')) => Some(zone(TouchZone::Left, PaddleDirection::Down)),
            (GameKind::Pong, KeyCode::Char('o')) => Some(zone(TouchZone::Right, PaddleDirection::Up)),
            (GameKind::Pong, KeyCode::Char('l')) => Some(zone(TouchZone::Right, PaddleDirection::Down)),
            _ => None,
        }
    }
}

fn zone(zone: TouchZone, direction: PaddleDirection) -> PhysicalControl {
    PhysicalControl::ZoneButton { zone, direction }
}

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::App;

pub fn draw(f: &mut Frame, app: &App) {
    let view = app.view();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(f.size());

    // Header
    let join = &view.join_control;
    let join_style = if join.enabled {
        Style::default().bg(Color::Green).fg(Color::Black).bold()
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::Gray)
    };
    let title = Line::from(vec![
        Span::styled(
            " pifi arcade ",
            Style::default().bg(Color::Blue).fg(Color::White).bold(),
        ),
        Span::raw(format!(
            " | {} @ {} | players {}/{} | ",
            view.game,
            app.host(),
            view.local_players,
            view.capacity
        )),
        Span::styled(format!(" {} ", join.label.text()), join_style),
        Span::raw(match view.volume_pct {
            Some(v) => format!(" | vol {v}%"),
            None => String::new(),
        }),
    ]);
    f.render_widget(
        Paragraph::new(title).alignment(Alignment::Center),
        chunks[0],
    );

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    // Game panel
    let mut lines = Vec::new();
    if let Some(status) = &view.status {
        lines.push(Line::from(Span::styled(status.clone(), Style::default().italic())));
    }
    if let Some(indicator) = &view.player_indicator {
        lines.push(Line::from(indicator.clone()));
    }
    for (index, score) in view.scores.iter().enumerate() {
        let mine = u8::try_from(index).is_ok_and(|i| view.my_players.contains(&i));
        let style = if mine {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("Player {}: {score}", index + 1),
            style,
        )));
    }
    if let Some(apples) = view.apples_left {
        lines.push(Line::from(format!("Apples left: {apples}")));
    }
    if let Some(winner) = &view.winner {
        let color = match winner.victory {
            Some(true) => Color::Green,
            Some(false) => Color::Red,
            None => Color::Cyan,
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            winner.text.clone(),
            Style::default().fg(color).bold(),
        )));
    }
    if let Some(winners) = &view.winners_board {
        let names: Vec<String> = winners.iter().map(|w| format!("P{}", u32::from(*w) + 1)).collect();
        lines.push(Line::from(format!("Winners: {}", names.join(", "))));
    }
    if view.initials_entry.is_some() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Initials: {:_<3}", app.initials_input()),
            Style::default().fg(Color::Magenta).bold(),
        )));
    }
    if let Some((slot, label)) = view.last_pressed {
        lines.push(Line::from(Span::styled(
            format!("P{} {label}", slot + 1),
            Style::default().fg(Color::DarkGray),
        )));
    }
    if let Some(err) = &view.last_error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Game ")),
        body[0],
    );

    // Side panel: event log and high scores
    let mut side: Vec<Line> = app.log().map(|l| Line::from(l.clone())).collect();
    if !app.high_scores().is_empty() {
        side.push(Line::from(""));
        side.push(Line::from(Span::styled("High scores", Style::default().bold())));
        for hs in app.high_scores() {
            side.push(Line::from(format!(
                "{:>3} {}",
                hs.initials.as_deref().unwrap_or("???"),
                hs.score
            )));
        }
    }
    f.render_widget(
        Paragraph::new(side).block(Block::default().borders(Borders::ALL).title(" Events ")),
        body[1],
    );

    // Footer
    let help = Line::from(vec![
        Span::styled("Q/Esc", Style::default().bold()),
        Span::raw(": Quit | "),
        Span::styled("N/Enter", Style::default().bold()),
        Span::raw(": New/Join | "),
        Span::styled("Arrows/WASD", Style::default().bold()),
        Span::raw(": Move | "),
        Span::styled("IJKL/O", Style::default().bold()),
        Span::raw(": Touch | "),
        Span::styled("+/-", Style::default().bold()),
        Span::raw(": Volume | "),
        Span::styled("H", Style::default().bold()),
        Span::raw(": High scores"),
    ]);
    f.render_widget(
        Paragraph::new(help)
            .alignment(Alignment::Center)
            .bg(Color::DarkGray),
        chunks[2],
    );
}

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, Turn};
use crate::chat::ChatRole;
use crate::config;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Body: chat panel on the left, static About sidebar on the right
    let [chat_panel, sidebar_area] =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
            .areas(body_area);

    let [history_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(chat_panel);

    render_history(app, frame, history_area);
    render_input(app, frame, input_area);
    render_sidebar(frame, sidebar_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", config::CHATBOT_NAME),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(
            format!("[{}]", app.model),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let mut lines: Vec<Line> = Vec::new();

    for msg in app.conversation.messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    format!("{} You:", config::USER_AVATAR),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
                lines.push(Line::default());
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    format!("{} {}:", config::CHATBOT_AVATAR, config::CHATBOT_NAME),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
                lines.push(Line::default());
            }
            // The system instruction is never stored in the conversation
            ChatRole::System => {}
        }
    }

    match &app.turn {
        Turn::Awaiting => {
            lines.push(Line::from(Span::styled(
                format!("{} {}:", config::CHATBOT_AVATAR, config::CHATBOT_NAME),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        Turn::Streaming { buffer } => {
            lines.push(Line::from(Span::styled(
                format!("{} {}:", config::CHATBOT_AVATAR, config::CHATBOT_NAME),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            // Trailing ▌ marks in-progress output; it is never stored
            let mut partial = buffer.lines().map(str::to_string).collect::<Vec<_>>();
            match partial.last_mut() {
                Some(last) => last.push('▌'),
                None => partial.push("▌".to_string()),
            }
            for line in partial {
                lines.push(Line::from(line));
            }
        }
        Turn::Idle => {}
    }

    if let Some(status) = &app.status {
        lines.push(Line::from(Span::styled(
            format!("⚠ {}", status),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::default());
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = match app.input_mode {
        InputMode::Editing => Color::Yellow,
        InputMode::Normal => Color::DarkGray,
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask (i to type, Enter to send) ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() && app.input_mode == InputMode::Normal {
        Paragraph::new(config::INPUT_PLACEHOLDER)
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block)
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block)
    };

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_sidebar(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" About ");

    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);

    let lines = vec![
        Line::from(Span::styled("This chatbot is powered by:", heading)),
        Line::from(" • TinyLlama (1.1B parameter model)"),
        Line::from(" • Ollama (for local model hosting)"),
        Line::from(" • ratatui (for the terminal interface)"),
        Line::default(),
        Line::from(Span::styled("How to use", heading)),
        Line::from(" 1. Make sure Ollama is running"),
        Line::from(" 2. Ensure TinyLlama is downloaded"),
        Line::from(Span::styled("    (ollama pull tinyllama)", dim)),
        Line::from(" 3. Ask your tech support questions"),
        Line::default(),
        Line::from(Span::styled("Tips", heading)),
        Line::from(" • Be specific about your issue"),
        Line::from(" • Include relevant error messages"),
        Line::from(" • Mention your OS or device"),
        Line::default(),
        Line::from(vec![
            Span::styled(" c ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" clear chat"),
        ]),
    ];

    let sidebar = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(sidebar, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " TYPE ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}

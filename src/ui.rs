use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use textgen_chat::Role;

use crate::app::{App, ServerStatus};

/// Render `**bold**` runs; anything unbalanced stays literal.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    // An even number of parts means an unmatched "**"
    if parts.len() % 2 == 0 {
        return Line::from(text.to_string());
    }

    let spans: Vec<Span<'static>> = parts
        .into_iter()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| {
            if i % 2 == 1 {
                Span::styled(part.to_string(), Style::default().add_modifier(Modifier::BOLD))
            } else {
                Span::raw(part.to_string())
            }
        })
        .collect();

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = match &app.server_status {
        ServerStatus::Checking => ("checking...".to_string(), Color::Yellow),
        ServerStatus::Online(_) => ("online".to_string(), Color::Green),
        ServerStatus::Offline(_) => ("unreachable".to_string(), Color::Red),
    };

    let mut title = Line::from(vec![
        Span::styled(" textgen-chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(format!("{} ", app.endpoint), Style::default().fg(Color::White)),
        Span::styled(format!("[{}]", status_text), Style::default().fg(status_color)),
    ]);

    // Model and device as reported with the latest reply
    let (model, device) = (app.controller.model_id(), app.controller.device());
    if model.is_some() || device.is_some() {
        title.spans.push(Span::styled(
            format!(
                " {} on {}",
                model.unwrap_or("unknown model"),
                device.unwrap_or("unknown device")
            ),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store dimensions for scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    let title = match app.controller.request_count() {
        0 => " Conversation ".to_string(),
        n => format!(" Conversation ({} sent) ", n),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let conversation = app.controller.conversation();
    let text = if conversation.is_empty() && !app.is_busy() {
        let hint = match &app.server_status {
            ServerStatus::Online(message) => message.clone(),
            ServerStatus::Offline(reason) => format!("Server unreachable: {}", reason),
            ServerStatus::Checking => "Type a message and press Enter...".to_string(),
        };
        Text::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in conversation.iter() {
            match msg.role() {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        format!("{}:", Role::User.label()),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.text().lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Role::Assistant => {
                    lines.push(Line::from(Span::styled(
                        format!("{}:", Role::Assistant.label()),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.text().lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.is_busy() {
            lines.push(Line::from(Span::styled(
                format!("{}:", Role::Assistant.label()),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: ".", "..", "..."
            let dots = ".".repeat(app.animation_frame as usize + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Count wrapped lines without the block so borders don't inflate the total
    let chat = Paragraph::new(text).wrap(Wrap { trim: true });
    let total_lines = chat.line_count(inner_width).min(u16::MAX as usize) as u16;
    app.set_chat_lines(total_lines);

    let chat = chat.block(block).scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let (border_color, title) = if busy {
        (Color::DarkGray, " Waiting for reply... ")
    } else {
        (Color::Yellow, " Message (Enter to send) ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 || app.input_cursor < inner_width {
        0
    } else {
        app.input_cursor - inner_width + 1
    };

    let visible_text: String = app
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if busy { Color::DarkGray } else { Color::Cyan };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);

    frame.render_widget(input, area);

    if !busy {
        let cursor_x = (app.input_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^U ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];

    if let Some(err) = app.controller.last_error() {
        spans.push(Span::styled(
            format!(" last request failed: {} ", err.kind()),
            Style::default().bg(Color::Red).fg(Color::White),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use textgen_chat::{
        Config, Generation, GenerationError, GenerationParameters, RequestController, Transport,
    };

    struct CannedTransport(Generation);

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(&self, _params: GenerationParameters) -> Result<Generation, GenerationError> {
            Ok(self.0.clone())
        }
    }

    /// Short words so word wrap needs more lines than chars / width.
    fn long_reply() -> String {
        let mut words: Vec<String> = (b'a'..=b't')
            .enumerate()
            .map(|(i, c)| (c as char).to_string().repeat(3 + i % 3))
            .collect();
        words.push("ENDMARK".to_string());
        words.join(" ")
    }

    async fn app_with_reply(reply: Generation) -> App {
        let controller = RequestController::new(Arc::new(CannedTransport(reply)), &Config::default());
        let mut app = App::new(controller, "http://localhost:8000/generate");
        assert!(app.controller.submit("Hello"));
        app.controller.settle().await;
        app
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn bottom_of_a_wrapped_reply_is_visible() {
        let mut app = app_with_reply(Generation::new(long_reply())).await;
        let mut terminal = Terminal::new(TestBackend::new(14, 10)).unwrap();

        app.scroll_to_bottom();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(screen(&terminal).contains("ENDMARK"), "{}", screen(&terminal));
    }

    #[tokio::test]
    async fn paging_down_reaches_the_last_line() {
        let mut app = app_with_reply(Generation::new(long_reply())).await;
        let mut terminal = Terminal::new(TestBackend::new(14, 10)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        app.scroll_up(u16::MAX);
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(!screen(&terminal).contains("ENDMARK"));

        for _ in 0..50 {
            app.scroll_down(app.page_height());
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
        }
        assert!(screen(&terminal).contains("ENDMARK"), "{}", screen(&terminal));
    }

    #[tokio::test]
    async fn header_shows_reported_model_and_device() {
        let reply = Generation {
            text: "Hi".to_string(),
            model_id: Some("tiny-finetune".to_string()),
            device: Some("cpu".to_string()),
        };
        let mut app = app_with_reply(reply).await;
        let mut terminal = Terminal::new(TestBackend::new(120, 10)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let first_row: String = screen(&terminal).lines().next().unwrap_or_default().to_string();
        assert!(first_row.contains("tiny-finetune on cpu"), "{}", first_row);
    }

    fn styled_parts(line: &Line) -> Vec<(String, bool)> {
        line.spans
            .iter()
            .map(|s| {
                (
                    s.content.to_string(),
                    s.style.add_modifier.contains(Modifier::BOLD),
                )
            })
            .collect()
    }

    #[test]
    fn bold_runs_are_styled() {
        let line = parse_markdown_line("see **this** now");
        assert_eq!(
            styled_parts(&line),
            vec![
                ("see ".to_string(), false),
                ("this".to_string(), true),
                (" now".to_string(), false),
            ]
        );
    }

    #[test]
    fn unbalanced_markers_stay_literal() {
        let line = parse_markdown_line("a ** b");
        assert_eq!(styled_parts(&line), vec![("a ** b".to_string(), false)]);
    }
}

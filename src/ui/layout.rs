use crate::app::{App, AppView};
use crate::settings::SettingsField;
use crate::speedtest::TestPhase;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
    Frame,
};

const ACCENT: Color = Color::Rgb(94, 186, 200);
const SUCCESS: Color = Color::Rgb(134, 194, 156);
const ERROR: Color = Color::Rgb(214, 120, 120);
const TEXT_PRIMARY: Color = Color::Rgb(225, 225, 225);
const TEXT_SECONDARY: Color = Color::Rgb(155, 155, 155);
const TEXT_MUTED: Color = Color::Rgb(100, 100, 100);
const BORDER: Color = Color::Rgb(60, 60, 65);

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();
    match app.view {
        AppView::Main => draw_main_view(frame, area, app),
        AppView::Settings => draw_settings_view(frame, area, app),
    }
}

fn draw_main_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(7),
        Constraint::Min(6),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], app);

    let panels = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(chunks[1]);
    draw_metric_panel(
        frame,
        panels[0],
        "Download",
        format!("{:.1}", app.result.download_mbps),
        "Mbps",
        app.phase() == TestPhase::Download,
    );
    draw_metric_panel(
        frame,
        panels[1],
        "Upload",
        format!("{:.1}", app.result.upload_mbps),
        "Mbps",
        app.phase() == TestPhase::Upload,
    );
    draw_metric_panel(
        frame,
        panels[2],
        "Ping",
        format!("{:.0} / {:.0}", app.result.ping_ms, app.result.jitter_ms),
        "ms / jitter",
        app.phase() == TestPhase::Ping,
    );

    draw_activity(frame, chunks[2], app);
    draw_network_info(frame, chunks[3], app);
    draw_help(frame, chunks[4], app);
}

fn phase_label(phase: TestPhase) -> (&'static str, Color) {
    match phase {
        TestPhase::Idle => ("idle", TEXT_MUTED),
        TestPhase::Ping => ("probing latency", ACCENT),
        TestPhase::Download => ("measuring download", ACCENT),
        TestPhase::Upload => ("measuring upload", ACCENT),
        TestPhase::Complete => ("complete", SUCCESS),
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));

    let (label, color) = phase_label(app.phase());
    let mut spans = vec![
        Span::styled(
            " netgauge ",
            Style::default()
                .fg(TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("· ", Style::default().fg(TEXT_MUTED)),
        Span::styled(label, Style::default().fg(color)),
    ];

    if let Some(message) = &app.error_message {
        spans.push(Span::styled("  ✗ ", Style::default().fg(ERROR)));
        spans.push(Span::styled(message.as_str(), Style::default().fg(ERROR)));
    } else if app.phase() == TestPhase::Complete {
        spans.push(Span::styled("  ", Style::default()));
        spans.push(Span::styled(
            app.share_line(),
            Style::default().fg(TEXT_SECONDARY),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(header, area);
}

fn draw_metric_panel(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    value: String,
    unit: &str,
    active: bool,
) {
    let border = if active { ACCENT } else { BORDER };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(TEXT_SECONDARY),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(2),
        Constraint::Length(1),
    ])
    .split(inner);

    let value_style = Style::default()
        .fg(if active { ACCENT } else { TEXT_PRIMARY })
        .add_modifier(Modifier::BOLD);
    frame.render_widget(
        Paragraph::new(value)
            .style(value_style)
            .alignment(Alignment::Center),
        rows[1],
    );
    frame.render_widget(
        Paragraph::new(unit)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        rows[2],
    );
}

fn draw_activity(frame: &mut Frame, area: Rect, app: &App) {
    let measuring = matches!(app.phase(), TestPhase::Download | TestPhase::Upload);
    let title = if measuring {
        format!(" live rate · {:.1} Mbps ", app.current_mbps)
    } else {
        " live rate ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(title, Style::default().fg(TEXT_SECONDARY)));

    if app.rate_samples.is_empty() {
        let hint = if measuring {
            "waiting for samples..."
        } else {
            "press Enter to start a test"
        };
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(TEXT_MUTED))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let data: Vec<u64> = app.rate_samples.iter().map(|&r| r as u64).collect();
    let sparkline = Sparkline::default()
        .block(block)
        .style(Style::default().fg(ACCENT))
        .data(&data);
    frame.render_widget(sparkline, area);
}

fn draw_network_info(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(
            " network ",
            Style::default().fg(TEXT_SECONDARY),
        ));

    let line = match &app.ip_info {
        Some(info) => Line::from(vec![
            Span::styled(info.ip.as_str(), Style::default().fg(TEXT_PRIMARY)),
            Span::styled("  ", Style::default()),
            Span::styled(info.org.as_str(), Style::default().fg(TEXT_SECONDARY)),
            Span::styled("  ", Style::default()),
            Span::styled(info.location_line(), Style::default().fg(TEXT_MUTED)),
        ]),
        None => Line::from(Span::styled(
            "looking up network details...",
            Style::default().fg(TEXT_MUTED),
        )),
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let keys = if matches!(app.phase(), TestPhase::Idle | TestPhase::Complete) {
        "enter start · s settings · q quit"
    } else {
        "q quit"
    };
    frame.render_widget(
        Paragraph::new(keys)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_settings_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(area);

    let header = Paragraph::new(Span::styled(
        " settings ",
        Style::default()
            .fg(TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    ))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(BORDER)),
    );
    frame.render_widget(header, chunks[0]);

    let rows: [(SettingsField, String, String); 3] = [
        (
            SettingsField::ProbeCount,
            "Ping probes".to_string(),
            format!("{}", app.settings.probe_count),
        ),
        (
            SettingsField::DownloadWindow,
            "Download window".to_string(),
            format!("{} s", app.settings.download_window.as_secs()),
        ),
        (
            SettingsField::UploadWindow,
            "Upload window".to_string(),
            format!("{} s", app.settings.upload_window.as_secs()),
        ),
    ];

    let mut lines = Vec::with_capacity(rows.len());
    for (field, name, value) in rows {
        let selected = app.selected_setting == field;
        let marker = if selected { "› " } else { "  " };
        let style = if selected {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(TEXT_SECONDARY)
        };
        lines.push(Line::from(vec![
            Span::styled(marker, style),
            Span::styled(format!("{name:<18}"), style),
            Span::styled(value, Style::default().fg(TEXT_PRIMARY)),
        ]));
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::NONE)),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new("↑/↓ select · ←/→ adjust · esc back")
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        chunks[2],
    );
}

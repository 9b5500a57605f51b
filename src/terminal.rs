// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview viewer
//!
//! Shows whatever the engine last presented using Unicode half-block
//! characters (two vertical pixels per cell). The terminal window plays the
//! role of the render surface: focus lost and gained destroy and recreate
//! it, and resizes are forwarded.

use crate::engine::{Picture, Presenter, RenderMode};
use crate::errors::AppResult;
use crate::pipelines::preview::{Consent, PreviewSession, SessionEvent};
use crate::constants::timing;

use crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the viewer until the user quits, then shut the session down
pub fn run(mut session: PreviewSession, presenter: Arc<Presenter>) -> AppResult<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut session, &presenter);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.shutdown();
    result
}

/// Surface size in pixels for a terminal of `cols` x `rows` (one row is the status bar)
fn surface_size(cols: u16, rows: u16) -> (u32, u32) {
    (u32::from(cols), u32::from(rows.saturating_sub(1)) * 2)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut PreviewSession,
    presenter: &Presenter,
) -> AppResult<()> {
    let mut events = session.take_events();
    let mut blocked: Option<String> = None;

    let size = terminal.size()?;
    let (w, h) = surface_size(size.width, size.height);
    session.surface_created(w, h);

    loop {
        if let Some(rx) = events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                match event {
                    SessionEvent::CaptureBlocked(e) => blocked = Some(e.to_string()),
                    SessionEvent::CaptureStarted { .. } => blocked = None,
                    SessionEvent::Stopped => {}
                }
            }
        }

        let picture = presenter.snapshot();
        let status = StatusLine {
            fps: session.fps(),
            mode: session.mode(),
            source: session.source_name(),
            blocked: blocked.as_deref(),
        }
        .to_string();

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let preview_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(
                PictureWidget {
                    picture: picture.as_ref(),
                    blocked: blocked.is_some(),
                },
                preview_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(StatusBar { message: &status }, status_area);
        })?;

        // Input poll doubles as the UI refresh interval
        if !event::poll(timing::UI_POLL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char('q') => break,
                KeyCode::Char('e') | KeyCode::Char(' ') => {
                    session.toggle_mode();
                }
                KeyCode::Char('r') if session.is_blocked() => {
                    // Pressing 'r' is the user granting access again
                    if let Err(e) = session.retry_capture(Consent::Granted) {
                        warn!(error = %e, "Retry failed");
                    }
                }
                _ => {}
            },
            Event::FocusLost => session.surface_destroyed(),
            Event::FocusGained => {
                let size = terminal.size()?;
                let (w, h) = surface_size(size.width, size.height);
                session.surface_created(w, h);
            }
            Event::Resize(cols, rows) => {
                let (w, h) = surface_size(cols, rows);
                session.surface_resized(w, h);
            }
            _ => {}
        }
    }

    info!("Viewer closed");
    Ok(())
}

/// Status bar text
struct StatusLine<'a> {
    fps: u32,
    mode: RenderMode,
    source: &'a str,
    blocked: Option<&'a str>,
}

impl std::fmt::Display for StatusLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(reason) = self.blocked {
            return write!(f, "{} | 'r' allow camera and retry | 'q' quit", reason);
        }
        write!(
            f,
            "FPS: {} | {} {} | {} | 'e' toggle | 'q' quit",
            self.fps,
            self.mode.icon(),
            self.mode.label(),
            self.source
        )
    }
}

/// Widget that renders a presented picture using half-block characters
struct PictureWidget<'a> {
    picture: Option<&'a Picture>,
    blocked: bool,
}

impl Widget for PictureWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let picture = match self.picture {
            Some(p) if p.width > 0 && p.height > 0 => p,
            _ => {
                let msg = if self.blocked {
                    "Camera unavailable"
                } else {
                    "Waiting for camera..."
                };
                let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
                let y = area.y + area.height / 2;
                if y < area.y + area.height && x < area.x + area.width {
                    buf.set_string(x, y, msg, ratatui::style::Style::default());
                }
                return;
            }
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let aspect = picture.width as f64 / picture.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > aspect {
            // Terminal is wider - fit to height
            let w = term_height * aspect;
            (w as u16, area.height)
        } else {
            // Terminal is taller - fit to width
            let h = term_width / aspect;
            (area.width, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = picture.width as f64 / display_width as f64;
        let y_scale = picture.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(picture, src_x, src_y_top));
                    cell.set_bg(sample_pixel(picture, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample_pixel(picture: &Picture, x: u32, y: u32) -> Color {
    let x = x.min(picture.width - 1) as usize;
    let y = y.min(picture.height - 1) as usize;
    let idx = (y * picture.width as usize + x) * 4;
    match picture.rgba.get(idx..idx + 3) {
        Some(px) => Color::Rgb(px[0], px[1], px[2]),
        None => Color::Black,
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

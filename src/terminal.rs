// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based depth viewer
//!
//! Renders the composed depth view to the terminal using Unicode
//! half-block characters for improved vertical resolution.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

use crate::errors::SessionError;
use crate::render;
use crate::session::manager::Session;
use crate::storage;

/// Run the live viewer over an already negotiated session
pub fn run(mut session: Session, save_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut session, &save_dir);
    session.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    save_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut view_widget = ViewWidget::new();
    let mut status_message = format!(
        "{} | {} | 's' snapshot | 'q' quit",
        session.device(),
        session.configuration()
    );

    loop {
        // A short acquisition timeout keeps the input loop responsive; a
        // timeout just means the last view stays on screen.
        match session.acquire_frames(Duration::from_millis(50)) {
            Ok(set) => {
                if let Some(view) = render::compose(&set) {
                    view_widget.update(view);
                }
            }
            Err(SessionError::AcquisitionTimeout) => {}
            Err(e) => {
                error!(error = %e, "Frame acquisition failed");
                status_message = format!("Error: {}", e);
            }
        }

        terminal.draw(|f| {
            let area = f.area();

            let view_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&view_widget, view_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if event::poll(Duration::from_millis(16))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            if key.code == KeyCode::Char('s') {
                if let Some(view) = &view_widget.image {
                    match storage::save_snapshot(save_dir, view) {
                        Ok(path) => {
                            status_message = format!("Saved: {}", path.display());
                        }
                        Err(e) => {
                            error!("Failed to save snapshot: {}", e);
                            status_message = format!("Error: {}", e);
                        }
                    }
                }
            }

            if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                break;
            }
        }
    }

    Ok(())
}

/// Widget that renders the composed view using half-block characters
struct ViewWidget {
    image: Option<RgbImage>,
}

impl ViewWidget {
    fn new() -> Self {
        Self { image: None }
    }

    fn update(&mut self, image: RgbImage) {
        self.image = Some(image);
    }
}

impl Widget for &ViewWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.image else {
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if image.width() == 0 || image.height() == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell shows two vertical pixels: the upper half
        // block glyph gets the fg color, the lower half the bg color.
        let image_aspect = image.width() as f64 / image.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > image_aspect {
            let h = term_height;
            let w = h * image_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / image_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = image.width() as f64 / display_width as f64;
        let y_scale = image.height() as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top = sample_pixel(image, src_x, src_y_top);
                let bottom = sample_pixel(image, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

fn sample_pixel(image: &RgbImage, x: u32, y: u32) -> Color {
    let x = x.min(image.width() - 1);
    let y = y.min(image.height() - 1);
    let pixel = image.get_pixel(x, y);
    Color::Rgb(pixel[0], pixel[1], pixel[2])
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

        buf.set_string(
            area.x,
            area.y,
            truncate_chars(self.message, area.width as usize),
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

/// Truncate to at most `limit` characters, never splitting a multi-byte
/// character (save paths and device names are not always ASCII)
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("plain ascii", 5), "plain");
        assert_eq!(truncate_chars("short", 10), "short");
        // Each character below is multi-byte in UTF-8.
        assert_eq!(truncate_chars("Gerät Käfer", 6), "Gerät ");
        assert_eq!(truncate_chars("深度カメラ", 2), "深度");
    }

    #[test]
    fn test_status_bar_renders_multibyte_message_in_narrow_area() {
        let area = Rect::new(0, 0, 8, 1);
        let mut buf = Buffer::empty(area);
        let bar = StatusBar {
            message: "Saved: /home/müller/Bilder/Tiefenkamera.png",
        };
        bar.render(area, &mut buf);
    }
}

use crate::display::{Align, Color, Frame, Layout, Primitive, Rect, TextSize, palette};
use crate::hardware::{DisplaySink, HardwareError};
use crate::models::{DisplayInfo, MetricsSample, PlaybackState, PlaybackStatus, ScreenGeometry};

/// Result of one render request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    /// Identical to the last submitted frame
    Skipped,
}

/// Builds frames from the current sample and playback state and pushes them to the LCD.
///
/// Owns the display. Each draw moves it onto the blocking pool and back, so at most
/// one SPI transfer is ever in flight and the async loop never blocks on it.
pub struct Renderer {
    layout: Layout,
    display_info: DisplayInfo,
    display: Option<Box<dyn DisplaySink>>,
    last_frame: Option<Frame>,
}

impl Renderer {
    pub fn new(geometry: ScreenGeometry, display_info: DisplayInfo, display: Box<dyn DisplaySink>) -> Self {
        Self {
            layout: Layout::new(geometry),
            display_info,
            display: Some(display),
            last_frame: None,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Lay out one screen. Pure: equal inputs give equal frames.
    pub fn compose(&self, sample: &MetricsSample, playback: &PlaybackState) -> Frame {
        let layout = &self.layout;
        let mut frame = Frame::new(layout.width, layout.height);

        frame.push(Primitive::Clear(palette::BACKGROUND));
        self.compose_header(&mut frame, sample, playback);
        self.compose_progress(&mut frame, playback);
        self.compose_controls(&mut frame, playback);
        self.compose_volume(&mut frame, playback);
        self.compose_metrics(&mut frame, sample);

        frame
    }

    fn compose_header(&self, frame: &mut Frame, sample: &MetricsSample, playback: &PlaybackState) {
        let layout = &self.layout;
        let header = layout.header;
        let line = header.height as i32 / 3;

        frame.push(Primitive::FillRect {
            rect: header,
            color: palette::SURFACE,
            radius: 0,
        });

        let clock = sample.timestamp.format("%H:%M").to_string();
        let clock_width = (clock.len() as u32 + 1) * TextSize::Small.char_width();
        let title_width = (layout.width as i32 - 2 * layout.padding - clock_width as i32).max(0) as u32;

        frame.push(Primitive::Text {
            x: layout.padding,
            y: header.y + line,
            text: fit(playback.display_title(), title_width, TextSize::Normal),
            size: TextSize::Normal,
            color: palette::TEXT,
            align: Align::Left,
        });
        frame.push(Primitive::Text {
            x: layout.width as i32 - layout.padding,
            y: header.y + line,
            text: clock,
            size: TextSize::Small,
            color: palette::TEXT_DIM,
            align: Align::Right,
        });

        let status_color = match playback.status {
            PlaybackStatus::Playing => palette::SECONDARY,
            PlaybackStatus::Paused => palette::PRIMARY,
            PlaybackStatus::Stopped => palette::TEXT_DIM,
        };
        frame.push(Primitive::Text {
            x: layout.padding,
            y: header.y + 2 * line + line / 2,
            text: playback.status.label().to_string(),
            size: TextSize::Small,
            color: status_color,
            align: Align::Left,
        });
    }

    fn compose_progress(&self, frame: &mut Frame, playback: &PlaybackState) {
        let bar = self.layout.progress;
        let radius = bar.height / 2;

        frame.push(Primitive::FillRect {
            rect: bar,
            color: palette::SLIDER_TRACK,
            radius,
        });

        let label = match playback.position {
            Some(position) => {
                let filled = (bar.width as f32 * position).round() as u32;
                if filled > 0 {
                    frame.push(Primitive::FillRect {
                        rect: Rect::new(bar.x, bar.y, filled, bar.height),
                        color: palette::PRIMARY,
                        radius,
                    });
                }
                format!("{}%", (position * 100.0).round() as u32)
            }
            None => "--".to_string(),
        };

        frame.push(Primitive::Text {
            x: bar.right(),
            y: bar.y + bar.height as i32 + 10,
            text: label,
            size: TextSize::Small,
            color: palette::TEXT_DIM,
            align: Align::Right,
        });
    }

    fn compose_controls(&self, frame: &mut Frame, playback: &PlaybackState) {
        let layout = &self.layout;

        for (rect, label) in [(layout.previous, "<<"), (layout.next, ">>")] {
            push_button(frame, rect, label, palette::SURFACE_LIGHT, TextSize::Large);
        }

        // The mono fonts are ASCII-only, so the play / pause glyphs are text
        let play_label = if playback.is_playing() { "||" } else { ">" };
        push_button(frame, layout.play_pause, play_label, palette::PRIMARY, TextSize::Large);

        push_button(frame, layout.stop, "STOP", palette::ACCENT, TextSize::Normal);
    }

    fn compose_volume(&self, frame: &mut Frame, playback: &PlaybackState) {
        let layout = &self.layout;
        let track = layout.volume_track;
        let (_, center_y) = track.center();
        let bar_height = (track.height / 4).max(2);
        let bar_y = center_y - bar_height as i32 / 2;
        let thumb_x = layout.slider_x(playback.volume);

        frame.push(Primitive::Text {
            x: layout.padding,
            y: center_y,
            text: "Vol".to_string(),
            size: TextSize::Small,
            color: palette::TEXT_DIM,
            align: Align::Left,
        });
        frame.push(Primitive::FillRect {
            rect: Rect::new(track.x, bar_y, track.width, bar_height),
            color: palette::SLIDER_TRACK,
            radius: bar_height / 2,
        });

        let filled = (thumb_x - track.x).max(0) as u32;
        if filled > 0 {
            frame.push(Primitive::FillRect {
                rect: Rect::new(track.x, bar_y, filled, bar_height),
                color: palette::SLIDER_FILL,
                radius: bar_height / 2,
            });
        }

        frame.push(Primitive::SliderThumb {
            center_x: thumb_x,
            center_y,
            radius: track.height / 3,
            color: palette::TEXT,
            outline: palette::BORDER,
        });
        frame.push(Primitive::Text {
            x: track.right(),
            y: track.y - 6,
            text: format!("{}%", playback.volume),
            size: TextSize::Small,
            color: palette::TEXT,
            align: Align::Right,
        });
    }

    fn compose_metrics(&self, frame: &mut Frame, sample: &MetricsSample) {
        let area = self.layout.metrics;
        let rows: Vec<(&str, Option<f32>)> = [
            (self.display_info.cpu_usage, "CPU", sample.cpu_percent),
            (self.display_info.memory_usage, "MEM", sample.mem_percent),
            (self.display_info.disk_space, "DISK", sample.disk_percent),
        ]
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, label, value)| (label, value))
        .collect();

        if rows.is_empty() {
            return;
        }

        frame.push(Primitive::FillRect {
            rect: area,
            color: palette::SURFACE,
            radius: 4,
        });

        let row_height = area.height as i32 / rows.len() as i32;
        for (i, (label, value)) in rows.into_iter().enumerate() {
            let y = area.y + row_height * i as i32 + row_height / 2;
            let value = match value {
                Some(percent) => format!("{:.0}%", percent),
                None => "n/a".to_string(),
            };

            frame.push(Primitive::Text {
                x: area.x + 6,
                y,
                text: label.to_string(),
                size: TextSize::Small,
                color: palette::TEXT_DIM,
                align: Align::Left,
            });
            frame.push(Primitive::Text {
                x: area.right() - 6,
                y,
                text: value,
                size: TextSize::Small,
                color: palette::TEXT,
                align: Align::Right,
            });
        }
    }

    /// Submit `frame` unless it matches the last submitted one.
    ///
    /// A failed draw is not remembered, so the next tick retries.
    pub async fn render(&mut self, frame: Frame) -> Result<RenderOutcome, HardwareError> {
        if self.last_frame.as_ref() == Some(&frame) {
            return Ok(RenderOutcome::Skipped);
        }

        let mut display = self
            .display
            .take()
            .ok_or_else(|| HardwareError::Unavailable("display already released".to_string()))?;

        let (display, frame, result) = tokio::task::spawn_blocking(move || {
            let result = display.draw(&frame);
            (display, frame, result)
        })
        .await
        .map_err(|e| HardwareError::Unavailable(format!("display task failed: {}", e)))?;

        self.display = Some(display);
        result?;
        self.last_frame = Some(frame);
        Ok(RenderOutcome::Drawn)
    }

    /// Blank the panel and switch the backlight off, then drop the display.
    pub async fn shutdown(&mut self) -> Result<(), HardwareError> {
        let Some(mut display) = self.display.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || {
            let cleared = display.clear();
            let backlight = display.set_backlight(false);
            cleared.and(backlight)
        })
        .await
        .map_err(|e| HardwareError::Unavailable(format!("display task failed: {}", e)))?
    }
}

fn push_button(frame: &mut Frame, rect: Rect, label: &str, fill: Color, size: TextSize) {
    let radius = (rect.width.min(rect.height) / 5).max(2);
    let (cx, cy) = rect.center();

    frame.push(Primitive::FillRect {
        rect,
        color: fill,
        radius,
    });
    frame.push(Primitive::StrokeRect {
        rect,
        color: palette::BORDER,
        radius,
    });
    frame.push(Primitive::Text {
        x: cx,
        y: cy,
        text: label.to_string(),
        size,
        color: palette::TEXT,
        align: Align::Center,
    });
}

/// Truncate to the number of glyphs that fit in `width` pixels, marking the cut with "..".
fn fit(text: &str, width: u32, size: TextSize) -> String {
    let max_chars = (width / size.char_width()) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 2 {
        return text.chars().take(max_chars).collect();
    }
    let mut cut: String = text.chars().take(max_chars - 2).collect();
    cut.push_str("..");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockDisplaySink;
    use chrono::{Local, TimeZone};

    const GEOMETRY: ScreenGeometry = ScreenGeometry {
        width: 240,
        height: 320,
    };

    fn sample() -> MetricsSample {
        MetricsSample {
            cpu_percent: Some(12.4),
            mem_percent: None,
            disk_percent: Some(75.0),
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 9, 41, 0).unwrap(),
        }
    }

    fn renderer(display: MockDisplaySink) -> Renderer {
        Renderer::new(GEOMETRY, DisplayInfo::default(), Box::new(display))
    }

    #[test]
    fn test_compose_is_deterministic() {
        let renderer = renderer(MockDisplaySink::new());
        let playback = PlaybackState::new(PlaybackStatus::Playing, Some("song.mp3".into()), 40, Some(0.5));

        let first = renderer.compose(&sample(), &playback);
        let second = renderer.compose(&sample(), &playback);
        assert_eq!(first, second);
        assert_eq!((first.width, first.height), (240, 320));
    }

    #[test]
    fn test_compose_shows_state_and_metrics() {
        let renderer = renderer(MockDisplaySink::new());
        let playback = PlaybackState::new(PlaybackStatus::Paused, Some("song.mp3".into()), 40, None);

        let frame = renderer.compose(&sample(), &playback);
        let texts: Vec<_> = frame.texts().collect();

        assert!(texts.contains(&"song.mp3"));
        assert!(texts.contains(&"Paused"));
        assert!(texts.contains(&"09:41"));
        assert!(texts.contains(&">"));
        assert!(texts.contains(&"40%"));
        assert!(texts.contains(&"12%"));
        assert!(texts.contains(&"n/a"));
        assert!(texts.contains(&"--"));
    }

    #[test]
    fn test_play_button_label_follows_status() {
        let renderer = renderer(MockDisplaySink::new());
        let playing = PlaybackState::new(PlaybackStatus::Playing, None, 50, None);

        let frame = renderer.compose(&sample(), &playing);
        assert!(frame.texts().any(|t| t == "||"));
        assert!(frame.texts().any(|t| t == "No Track"));
    }

    #[test]
    fn test_disabled_metrics_are_hidden() {
        let info = DisplayInfo {
            cpu_usage: true,
            memory_usage: false,
            disk_space: false,
        };
        let renderer = Renderer::new(GEOMETRY, info, Box::new(MockDisplaySink::new()));

        let frame = renderer.compose(&sample(), &PlaybackState::default());
        let texts: Vec<_> = frame.texts().collect();
        assert!(texts.contains(&"CPU"));
        assert!(!texts.contains(&"MEM"));
        assert!(!texts.contains(&"n/a"));
    }

    #[test]
    fn test_fit_truncates_long_titles() {
        assert_eq!(fit("short", 80, TextSize::Normal), "short");
        assert_eq!(fit("a very long track title", 80, TextSize::Normal), "a very l..");
        assert_eq!(fit("abc", 16, TextSize::Normal), "ab");
    }

    #[tokio::test]
    async fn test_render_skips_identical_frames() {
        let mut display = MockDisplaySink::new();
        display.expect_draw().times(2).returning(|_| Ok(()));

        let mut renderer = renderer(display);
        let stopped = PlaybackState::default();
        let playing = PlaybackState::new(PlaybackStatus::Playing, None, 50, None);

        let frame = renderer.compose(&sample(), &stopped);
        assert_eq!(renderer.render(frame.clone()).await.unwrap(), RenderOutcome::Drawn);
        assert_eq!(renderer.render(frame).await.unwrap(), RenderOutcome::Skipped);

        let changed = renderer.compose(&sample(), &playing);
        assert_eq!(renderer.render(changed).await.unwrap(), RenderOutcome::Drawn);
    }

    #[tokio::test]
    async fn test_failed_draw_is_retried() {
        let mut display = MockDisplaySink::new();
        let mut calls = 0;
        display.expect_draw().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(HardwareError::Unavailable("spi busy".into()))
            } else {
                Ok(())
            }
        });

        let mut renderer = renderer(display);
        let frame = renderer.compose(&sample(), &PlaybackState::default());

        assert!(renderer.render(frame.clone()).await.is_err());
        assert_eq!(renderer.render(frame).await.unwrap(), RenderOutcome::Drawn);
    }

    #[tokio::test]
    async fn test_shutdown_blanks_and_releases_display() {
        let mut display = MockDisplaySink::new();
        display.expect_clear().times(1).returning(|| Ok(()));
        display.expect_set_backlight().withf(|on| !*on).times(1).returning(|_| Ok(()));

        let mut renderer = renderer(display);
        renderer.shutdown().await.unwrap();
        // Second call is a no-op
        renderer.shutdown().await.unwrap();

        let frame = renderer.compose(&sample(), &PlaybackState::default());
        assert!(renderer.render(frame).await.is_err());
    }
}

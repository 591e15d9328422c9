//! Generic `Display` trait for the OLED panel.

use std::path::Path;

use cuebot_types::CueError;

/// A small graphics panel.  Pixel rendering lives in the driver.
pub trait Display: Send + Sync {
    /// Render `text`, wrapped to the panel width.  `\n` starts a new line.
    fn draw_text(&mut self, text: &str) -> Result<(), CueError>;

    /// Render the image file at `path`, scaled to fit.
    fn draw_image(&mut self, path: &Path) -> Result<(), CueError>;

    /// Fill the whole panel with one colour.
    fn fill_color(&mut self, r: u8, g: u8, b: u8) -> Result<(), CueError>;

    /// Draw two horizontal level bars, each in `0.0..=1.0`.
    fn draw_bars(&mut self, first: f32, second: f32) -> Result<(), CueError>;

    /// Blank the panel.
    fn clear(&mut self) -> Result<(), CueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockDisplay {
        lines: Vec<String>,
    }

    impl Display for MockDisplay {
        fn draw_text(&mut self, text: &str) -> Result<(), CueError> {
            self.lines = text.lines().map(str::to_string).collect();
            Ok(())
        }

        fn draw_image(&mut self, path: &Path) -> Result<(), CueError> {
            Err(CueError::hardware(
                "display",
                format!("no image support for {}", path.display()),
            ))
        }

        fn fill_color(&mut self, _r: u8, _g: u8, _b: u8) -> Result<(), CueError> {
            Ok(())
        }

        fn draw_bars(&mut self, _first: f32, _second: f32) -> Result<(), CueError> {
            Ok(())
        }

        fn clear(&mut self) -> Result<(), CueError> {
            self.lines.clear();
            Ok(())
        }
    }

    #[test]
    fn mock_display_splits_lines() {
        let mut display = MockDisplay::default();
        display.draw_text("ADC:\n0.1 0.2").unwrap();
        assert_eq!(display.lines, vec!["ADC:", "0.1 0.2"]);
        display.clear().unwrap();
        assert!(display.lines.is_empty());
    }

    #[test]
    fn mock_display_reports_image_fault() {
        let mut display = MockDisplay::default();
        let err = display.draw_image(Path::new("heart1.jpg")).unwrap_err();
        assert!(matches!(err, CueError::HardwareFault { .. }));
    }
}

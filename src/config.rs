use std::path::PathBuf;

use crate::error::CardstockError;
use crate::types::{Color, Size};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub border: Color,
    pub text: Color,
    // White pad behind the QR symbol, with a thin frame around it.
    pub qr_backing: Color,
    pub qr_frame: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::from_rgb8(229, 226, 209),
            border: Color::BLACK,
            text: Color::BLACK,
            qr_backing: Color::WHITE,
            qr_frame: Color::from_rgb8(208, 206, 192),
        }
    }
}

// Validated once up front; every stage reads it, nothing mutates it after.
#[derive(Debug, Clone)]
pub struct CardConfig {
    pub page: Size,
    pub dpi: u32,
    pub palette: Palette,
    // Zero disables the border stroke.
    pub border_width_px: f32,
    pub corner_radius_in: f32,
    // Text zone width as a fraction of the card width.
    pub text_width_frac: f32,
    pub zone_gap_px: u32,
    pub line_gap_px: f32,
    // Top-to-top advance from the name block into the detail block.
    pub name_gap_px: u32,
    pub banner_frac: f32,
    pub qr_frac: f32,
    pub qr_quiet_modules: u32,
    pub qr_pad_in: f32,
    pub year: String,
    pub font_max_px: f32,
    pub font_min_px: f32,
    pub font_step_px: f32,
    // Family stems probed in order: bundled dir first, then system dirs.
    pub font_families: Vec<String>,
    pub font_dir: Option<PathBuf>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            page: Size::card_portrait(),
            dpi: 300,
            palette: Palette::default(),
            border_width_px: 2.0,
            corner_radius_in: 0.08,
            text_width_frac: 0.9,
            zone_gap_px: 15,
            line_gap_px: 6.0,
            name_gap_px: 55,
            banner_frac: 1.0 / 3.0,
            qr_frac: 0.40,
            qr_quiet_modules: 4,
            qr_pad_in: 0.08,
            year: "2026".to_string(),
            font_max_px: 40.0,
            font_min_px: 16.0,
            font_step_px: 2.0,
            font_families: vec![
                "League Spartan".to_string(),
                "Arial".to_string(),
                "Helvetica".to_string(),
                "Liberation Sans".to_string(),
                "DejaVu Sans".to_string(),
                "Noto Sans".to_string(),
            ],
            font_dir: None,
        }
    }
}

impl CardConfig {
    pub fn width_px(&self) -> u32 {
        self.page.width.to_px_u32(self.dpi)
    }

    pub fn height_px(&self) -> u32 {
        self.page.height.to_px_u32(self.dpi)
    }

    pub fn corner_radius_px(&self) -> f32 {
        self.corner_radius_in * self.dpi as f32
    }

    pub fn qr_pad_px(&self) -> u32 {
        (self.qr_pad_in * self.dpi as f32).round().max(0.0) as u32
    }

    // The fixed line printed directly under the member name.
    pub fn year_line(&self) -> String {
        format!("Annual Member {}", self.year)
    }

    pub fn validate(&self) -> Result<(), CardstockError> {
        let invalid = |message: &str| Err(CardstockError::Input(message.to_string()));
        if self.dpi < 36 || self.dpi > 2400 {
            return invalid("dpi must be between 36 and 2400");
        }
        if self.width_px() == 0 || self.height_px() == 0 {
            return invalid("page size must be positive");
        }
        if !(self.banner_frac > 0.0 && self.banner_frac < 0.9) {
            return invalid("banner fraction must be inside (0, 0.9)");
        }
        if !(self.qr_frac > 0.0 && self.qr_frac < 1.0) {
            return invalid("qr fraction must be inside (0, 1)");
        }
        if !(self.text_width_frac > 0.0 && self.text_width_frac <= 1.0) {
            return invalid("text width fraction must be inside (0, 1]");
        }
        if !(self.font_min_px > 0.0) {
            return invalid("minimum font size must be positive");
        }
        if self.font_max_px < self.font_min_px {
            return invalid("maximum font size must not be below the minimum");
        }
        if !(self.font_step_px > 0.0) {
            return invalid("font step must be positive");
        }
        if !(self.border_width_px >= 0.0) || !(self.corner_radius_in >= 0.0) {
            return invalid("border width and corner radius must be non-negative");
        }
        if !(self.line_gap_px >= 0.0) || !(self.qr_pad_in >= 0.0) {
            return invalid("gaps and pads must be non-negative");
        }
        if self.year.trim().is_empty() {
            return invalid("membership year must not be blank");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = CardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.width_px(), 750);
        assert_eq!(config.height_px(), 1200);
        assert_eq!(config.qr_pad_px(), 24);
        assert_eq!(config.year_line(), "Annual Member 2026");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = CardConfig::default();
        config.dpi = 0;
        assert!(config.validate().is_err());

        let mut config = CardConfig::default();
        config.font_min_px = 30.0;
        config.font_max_px = 20.0;
        assert!(config.validate().is_err());

        let mut config = CardConfig::default();
        config.qr_frac = 1.2;
        assert!(config.validate().is_err());

        let mut config = CardConfig::default();
        config.year = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejections_are_fatal_input_errors() {
        let mut config = CardConfig::default();
        config.banner_frac = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
    }
}

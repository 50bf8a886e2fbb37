//! Font metrics lookup
//!
//! Glyph metrics come from outside the core. [`ApproxFontMetrics`] is a
//! character-count estimate good enough for tests and for callers without
//! real font tables.

use crate::geometry::POINT;

/// Font families the core asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Font {
    #[default]
    Roman,
    Italic,
    Bold,
    BoldItalic,
    /// Music symbol font (dynamics, pedal marks, musical symbols)
    Music,
}

/// Metrics of a string set in a font at a point size, in inches
pub trait FontMetrics {
    /// Height above the baseline
    fn ascent(&self, font: Font, size: f64, text: &str) -> f64;
    /// Depth below the baseline, as a positive number
    fn descent(&self, font: Font, size: f64, text: &str) -> f64;
    /// Advance width
    fn width(&self, font: Font, size: f64, text: &str) -> f64;

    fn height(&self, font: Font, size: f64, text: &str) -> f64 {
        self.ascent(font, size, text) + self.descent(font, size, text)
    }
}

/// Estimated metrics based on character count
#[derive(Debug, Clone, Copy)]
pub struct ApproxFontMetrics {
    /// Average advance as a fraction of the point size
    pub width_factor: f64,
    pub ascent_factor: f64,
    pub descent_factor: f64,
}

impl Default for ApproxFontMetrics {
    fn default() -> Self {
        Self {
            width_factor: 0.5,
            ascent_factor: 0.7,
            descent_factor: 0.2,
        }
    }
}

impl FontMetrics for ApproxFontMetrics {
    fn ascent(&self, _font: Font, size: f64, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        size * POINT * self.ascent_factor
    }

    fn descent(&self, font: Font, size: f64, text: &str) -> f64 {
        if text.is_empty() || font == Font::Music {
            return 0.0;
        }
        size * POINT * self.descent_factor
    }

    fn width(&self, font: Font, size: f64, text: &str) -> f64 {
        let factor = match font {
            Font::Bold | Font::BoldItalic => self.width_factor * 1.1,
            Font::Music => self.width_factor * 1.4,
            Font::Roman | Font::Italic => self.width_factor,
        };
        text.chars().count() as f64 * size * POINT * factor
    }
}

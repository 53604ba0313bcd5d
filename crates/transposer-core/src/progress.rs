//! Progress notifications for the pitch-shift pipeline.
//!
//! Progress is for observability only; nothing downstream depends on it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPhase {
    Studying,
    Stretching,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftProgress {
    pub phase: ShiftPhase,
    /// Overall progress, 0..=100. Studying covers 0-50, processing 50-100.
    pub percent: u8,
}

impl ShiftProgress {
    pub(crate) fn studying(read: usize, total: usize) -> Self {
        Self {
            phase: ShiftPhase::Studying,
            percent: scaled_percent(read, total, 0),
        }
    }

    pub(crate) fn stretching() -> Self {
        Self {
            phase: ShiftPhase::Stretching,
            percent: 50,
        }
    }

    pub(crate) fn processing(read: usize, total: usize) -> Self {
        Self {
            phase: ShiftPhase::Processing,
            percent: scaled_percent(read, total, 50),
        }
    }
}

/// `base + round(read / total * 50)`
fn scaled_percent(read: usize, total: usize, base: u8) -> u8 {
    if total == 0 {
        return base + 50;
    }
    let half = (read as f64 / total as f64 * 50.0).round() as u8;
    base + half.min(50)
}

impl fmt::Display for ShiftProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            ShiftPhase::Studying => write!(f, "Studying... {}%", self.percent),
            ShiftPhase::Stretching => write!(f, "Calculating stretch profile..."),
            ShiftPhase::Processing => write!(f, "Processing... {}%", self.percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_halves() {
        assert_eq!(ShiftProgress::studying(0, 1000).percent, 0);
        assert_eq!(ShiftProgress::studying(500, 1000).percent, 25);
        assert_eq!(ShiftProgress::studying(1000, 1000).percent, 50);
        assert_eq!(ShiftProgress::processing(500, 1000).percent, 75);
        assert_eq!(ShiftProgress::processing(1000, 1000).percent, 100);
    }

    #[test]
    fn test_display() {
        assert_eq!(ShiftProgress::studying(250, 1000).to_string(), "Studying... 13%");
        assert_eq!(
            ShiftProgress::stretching().to_string(),
            "Calculating stretch profile..."
        );
        assert_eq!(
            ShiftProgress::processing(1000, 1000).to_string(),
            "Processing... 100%"
        );
    }
}

//! Terminal bar rendering

use std::io::Write;

const GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Peak decay per frame, so the scale follows the room level
const PEAK_DECAY: f32 = 0.995;
const PEAK_FLOOR: f32 = 1e-4;

/// Normalizes band magnitudes against a decaying peak and draws them
pub struct Meter {
    peak: f32,
    line: String,
}

impl Meter {
    pub fn new() -> Self {
        Self {
            peak: PEAK_FLOOR,
            line: String::new(),
        }
    }

    /// Build the bar line for one band vector
    pub fn update(&mut self, bands: &[f32]) -> &str {
        let loudest = bands.iter().copied().fold(0.0_f32, f32::max);
        self.peak = (self.peak * PEAK_DECAY).max(loudest).max(PEAK_FLOOR);

        self.line.clear();
        for &value in bands {
            let level = (value / self.peak).clamp(0.0, 1.0);
            let index = (level * (GLYPHS.len() - 1) as f32).round() as usize;
            self.line.push(GLYPHS[index]);
        }
        &self.line
    }

    /// Redraw the bar line in place on stdout
    pub fn render(&mut self, bands: &[f32]) {
        let line = self.update(bands);
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r[{}]", line);
        let _ = stdout.flush();
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loudest_band_is_full_bar() {
        let mut meter = Meter::new();
        let line: Vec<char> = meter.update(&[0.0, 0.5, 1.0]).chars().collect();

        assert_eq!(line.len(), 3);
        assert_eq!(line[0], ' ');
        assert_eq!(line[2], '█');
    }

    #[test]
    fn test_silence_draws_blank() {
        let mut meter = Meter::new();
        assert!(meter.update(&[0.0; 8]).chars().all(|c| c == ' '));
    }

    #[test]
    fn test_peak_decays() {
        let mut meter = Meter::new();
        meter.update(&[10.0]);
        for _ in 0..100 {
            meter.update(&[0.0]);
        }
        assert!(meter.peak < 10.0);
        assert!(meter.peak >= PEAK_FLOOR);
    }
}

use std::io::{self, Write};
use std::time::Duration;

const BAR_WIDTH: usize = 32;

/// Smoothed progress bar owned by the polling loop. The displayed value eases
/// toward the latest job progress instead of jumping between samples.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    displayed: f32,
    rate: f32,
}

impl ProgressMeter {
    pub fn new(rate: f32) -> Self {
        Self {
            displayed: 0.0,
            rate,
        }
    }

    pub fn displayed(&self) -> f32 {
        self.displayed
    }

    pub fn update(&mut self, target: f32, elapsed: Duration) {
        let t = (elapsed.as_secs_f32() * self.rate).min(1.0);
        self.displayed += (target.clamp(0.0, 1.0) - self.displayed) * t;
    }

    pub fn complete(&mut self) {
        self.displayed = 1.0;
    }

    pub fn bar(&self) -> String {
        let shown = self.displayed();
        let filled = ((shown * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
        format!(
            "[{}{}] {:>3}%",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            (shown * 100.0).round() as u32
        )
    }

    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "\r{}", self.bar())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eases_toward_target_without_overshoot() {
        let mut meter = ProgressMeter::new(8.0);
        meter.update(0.5, Duration::from_millis(50));
        assert!(meter.displayed() > 0.0 && meter.displayed() < 0.5);
        for _ in 0..50 {
            meter.update(0.5, Duration::from_millis(50));
        }
        assert!((meter.displayed() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn long_frames_snap_to_target() {
        let mut meter = ProgressMeter::new(8.0);
        meter.update(0.75, Duration::from_secs(1));
        assert_eq!(meter.displayed(), 0.75);
    }

    #[test]
    fn bar_reflects_completion() {
        let mut meter = ProgressMeter::new(8.0);
        assert!(meter.bar().ends_with("  0%"));
        meter.complete();
        assert_eq!(meter.bar(), format!("[{}] 100%", "#".repeat(BAR_WIDTH)));
    }
}

use std::time::{Duration, Instant};

/// Counts frames and publishes a rate once per period
#[derive(Debug, Clone)]
pub struct FpsCounter {
    period: Duration,
    started: Option<Instant>,
    frames: u32,
    fps: Option<u32>,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl FpsCounter {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            started: None,
            frames: 0,
            fps: None,
        }
    }

    pub fn frame(&mut self) {
        self.frame_at(Instant::now());
    }

    /// Counts a frame presented at `now`. Frames before a period boundary count towards
    /// that period; the frame at the boundary starts the next one.
    pub fn frame_at(&mut self, now: Instant) {
        let Some(started) = self.started else {
            self.started = Some(now);
            self.frames = 1;
            return;
        };
        if now.saturating_duration_since(started) >= self.period {
            let period_ms = self.period.as_millis().max(1) as u64;
            self.fps = Some((self.frames as u64 * 1000 / period_ms) as u32);
            self.started = Some(now);
            self.frames = 0;
        }
        self.frames += 1;
    }

    /// Rate of the last completed period
    pub fn fps(&self) -> Option<u32> {
        self.fps
    }
}

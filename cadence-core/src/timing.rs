//! Frame timing
//!
//! FPS is counted over one-second windows of accumulated frame time;
//! per-phase durations of the last frame are kept for diagnostics.

/// Length of one FPS window
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Frames-per-second counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FpsCounter {
    last_us: Option<u64>,
    accumulated_us: u64,
    redraws: u32,
    fps: u32,
}

impl FpsCounter {
    pub const fn new() -> Self {
        Self {
            last_us: None,
            accumulated_us: 0,
            redraws: 0,
            fps: 0,
        }
    }

    /// Start a new window at `now_us`, discarding partial counts
    ///
    /// The last published value is kept until the next window completes.
    pub fn reset(&mut self, now_us: u64) {
        self.last_us = Some(now_us);
        self.accumulated_us = 0;
        self.redraws = 0;
    }

    /// Record a frame finishing at `now_us`
    ///
    /// Returns the newly published FPS value if a window completed.
    pub fn record_frame(&mut self, now_us: u64) -> Option<u32> {
        let delta = match self.last_us {
            Some(last) => now_us.saturating_sub(last),
            None => 0,
        };
        self.last_us = Some(now_us);
        self.record_delta(delta)
    }

    /// Record a frame that took `delta_us`
    ///
    /// Returns the newly published FPS value if a window completed. Time
    /// past the window boundary carries into the next window.
    pub fn record_delta(&mut self, delta_us: u64) -> Option<u32> {
        self.redraws += 1;
        self.accumulated_us += delta_us;

        if self.accumulated_us < MICROS_PER_SECOND {
            return None;
        }

        self.fps = self.redraws;
        self.redraws = 0;
        self.accumulated_us -= MICROS_PER_SECOND;
        Some(self.fps)
    }

    /// Last published frames-per-second value
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Microseconds accumulated in the current window
    pub fn accumulated_us(&self) -> u64 {
        self.accumulated_us
    }

    /// Frames counted in the current window
    pub fn redraws(&self) -> u32 {
        self.redraws
    }
}

/// Wall-clock duration of each phase of the last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseTimings {
    pub update_us: u32,
    pub tick_us: u32,
    pub wait_render_us: u32,
    pub draw_us: u32,
    /// Waiting on the tearing signal before the first column goes out
    pub wait_vsync_us: u32,
    pub render_us: u32,
}

impl PhaseTimings {
    /// Sum of all phases
    pub fn total_us(&self) -> u32 {
        self.update_us
            .saturating_add(self.tick_us)
            .saturating_add(self.wait_render_us)
            .saturating_add(self.draw_us)
            .saturating_add(self.wait_vsync_us)
            .saturating_add(self.render_us)
    }
}

/// Clamp a microsecond interval to `u32`
pub(crate) fn elapsed_us(start_us: u64, end_us: u64) -> u32 {
    u32::try_from(end_us.saturating_sub(start_us)).unwrap_or(u32::MAX)
}

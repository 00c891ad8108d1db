use std::path::PathBuf;
use std::time::{Duration, Instant};

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames animate continuously, evaluate a
/// fixed timestamp, or produce a single exported image.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the render loop continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Render the effect frozen at a timestamp (seconds).
    Still {
        /// Timestamp to evaluate; defaults to 0.
        time: Option<f32>,
    },
    /// Render one frame at a timestamp and write it to disk as PNG.
    Export {
        /// Timestamp to evaluate; defaults to 0.
        time: Option<f32>,
        /// Destination path for the exported file.
        path: PathBuf,
    },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time, 0)
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time } | RenderPolicy::Export { time, .. } => {
            Box::new(FixedTimeSource::new(time.unwrap_or(0.0).max(0.0)))
        }
    }
}

/// Paces redraws for the event loop.
///
/// Uncapped animation is always ready; capped animation reports a deadline
/// the loop can sleep until via `ControlFlow::WaitUntil`. Fixed-timestamp
/// policies render once and then park until an event (such as a resize)
/// forces a repaint.
pub struct FrameScheduler {
    interval: Option<Duration>,
    render_once: bool,
    next_due: Option<Instant>,
    rendered: bool,
}

impl FrameScheduler {
    pub fn new(policy: &RenderPolicy) -> Self {
        let interval = match policy {
            RenderPolicy::Animate {
                target_fps: Some(fps),
            } if *fps > 0.0 => Some(Duration::from_secs_f32(1.0 / fps)),
            _ => None,
        };
        Self {
            interval,
            render_once: matches!(
                policy,
                RenderPolicy::Still { .. } | RenderPolicy::Export { .. }
            ),
            next_due: None,
            rendered: false,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if self.render_once && self.rendered {
            return false;
        }
        match self.next_due {
            None => true,
            Some(due) => now >= due,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.rendered = true;
        self.next_due = self.interval.map(|interval| now + interval);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.render_once && self.rendered {
            return None;
        }
        self.next_due
    }

    pub fn reset(&mut self) {
        self.rendered = false;
        self.next_due = None;
    }
}

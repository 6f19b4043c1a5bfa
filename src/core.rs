use crate::error::{MixError, MixResult};

/// One invocation of the frame clock, the unit of scheduling in the engine.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    /// The tick that follows this one.
    pub fn next(self) -> Tick {
        Tick(self.0.saturating_add(1))
    }
}

/// Tick rate of the frame clock, in whole hertz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    pub fn new(hz: u32) -> MixResult<Self> {
        if hz == 0 {
            return Err(MixError::validation("tick rate must be > 0 Hz"));
        }
        Ok(Self { hz })
    }

    pub fn hz(self) -> u32 {
        self.hz
    }

    /// Nominal interval between ticks.
    pub fn interval(self) -> std::time::Duration {
        std::time::Duration::from_secs(1).div_f64(f64::from(self.hz))
    }

    /// Number of ticks covering `ms` milliseconds, rounded to the nearest
    /// tick and never less than one.
    pub fn ticks_for_ms(self, ms: u32) -> u64 {
        let ticks = (u64::from(ms) * u64::from(self.hz) + 500) / 1000;
        ticks.max(1)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self { hz: 60 }
    }
}

/// Engine-wide configuration, set once at construction and threaded through
/// every component that needs it. There is no module-level default state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frame clock rate.
    pub rate: TickRate,
    /// Default transition duration in milliseconds; converted to ticks when a
    /// transition starts without an explicit tick count.
    pub transition_ms: u32,
    /// Width of the blended seam straddling a wipe boundary, in pixels.
    pub wipe_feather: u32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            rate: TickRate::default(),
            transition_ms: 2000,
            wipe_feather: 5,
        }
    }
}

impl MixConfig {
    pub fn validate(&self) -> MixResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MixError::validation("resolution must be non-zero"));
        }
        // Deserialization can produce a rate TickRate::new would reject.
        if self.rate.hz() == 0 {
            return Err(MixError::validation("tick rate must be > 0 Hz"));
        }
        if self.transition_ms == 0 {
            return Err(MixError::validation("transition_ms must be > 0"));
        }
        // A feather wider than the wipe extent would never leave the seam
        // inside the buffer.
        if self.wipe_feather >= self.width.min(self.height) {
            return Err(MixError::validation(
                "wipe_feather must be smaller than both output dimensions",
            ));
        }
        Ok(())
    }

    /// Default transition duration expressed in ticks at the configured rate.
    pub fn default_transition_ticks(&self) -> u64 {
        self.rate.ticks_for_ms(self.transition_ms)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

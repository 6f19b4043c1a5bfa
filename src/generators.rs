//! Synthetic test-signal sources: flat color, bar patterns, gradients,
//! checkerboard and noise. All of them render at the configured resolution
//! and are pure generators; only the noise source changes between ticks.

use rand::{RngCore, SeedableRng, rngs::SmallRng};

use crate::{
    clock::TickSubscriber,
    core::{MixConfig, Tick},
    frame::Frame,
    fx::EffectSettings,
    source::{Source, SourceCore},
};

macro_rules! impl_source_accessors {
    ($ty:ty) => {
        impl Source for $ty {
            fn current_frame(&self) -> Frame {
                self.core.frame()
            }

            fn fx(&self) -> &EffectSettings {
                self.core.fx_settings()
            }

            fn set_fx(&mut self, settings: EffectSettings) {
                self.core.set_fx_settings(settings);
            }
        }
    };
}

/// Full-field flat color.
pub struct ColorSource {
    core: SourceCore,
    pattern: Frame,
}

impl ColorSource {
    pub fn new(config: &MixConfig, rgb: [u8; 3]) -> Self {
        Self {
            core: SourceCore::new(config),
            pattern: Frame::solid(config.width, config.height, rgb),
        }
    }

    pub fn set_color(&mut self, rgb: [u8; 3]) {
        self.pattern = Frame::solid(self.core.width(), self.core.height(), rgb);
    }
}

impl TickSubscriber for ColorSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl_source_accessors!(ColorSource);

/// EBU 75% full-field bars: eight equal columns from white to black.
pub struct EbuBarsSource {
    core: SourceCore,
    pattern: Frame,
}

const EBU_BARS: [[u8; 3]; 8] = [
    [192, 192, 192], // grey
    [192, 192, 0],   // yellow
    [0, 192, 192],   // cyan
    [0, 192, 0],     // green
    [192, 0, 192],   // magenta
    [192, 0, 0],     // red
    [0, 0, 192],     // blue
    [0, 0, 0],       // black
];

impl EbuBarsSource {
    pub fn new(config: &MixConfig) -> Self {
        let bar_width = (config.width / EBU_BARS.len() as u32).max(1);
        let pattern = Frame::from_fn(config.width, config.height, |x, _y| {
            let i = ((x / bar_width) as usize).min(EBU_BARS.len() - 1);
            EBU_BARS[i]
        });
        Self {
            core: SourceCore::new(config),
            pattern,
        }
    }
}

impl TickSubscriber for EbuBarsSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl_source_accessors!(EbuBarsSource);

/// SMPTE color bars: 75% bars on top, castellation strip, then the
/// -I / white / +Q / PLUGE bottom band (approximate 8-bit values).
pub struct SmpteBarsSource {
    core: SourceCore,
    pattern: Frame,
}

const SMPTE_TOP: [[u8; 3]; 7] = [
    [191, 191, 191],
    [191, 191, 0],
    [0, 191, 191],
    [0, 191, 0],
    [191, 0, 191],
    [191, 0, 0],
    [0, 0, 191],
];

const SMPTE_MIDDLE: [[u8; 3]; 7] = [
    [0, 0, 191],
    [0, 0, 0],
    [191, 0, 191],
    [0, 0, 0],
    [0, 191, 191],
    [0, 0, 0],
    [191, 191, 191],
];

const SMPTE_BOTTOM: [[u8; 3]; 6] = [
    [0, 27, 75],     // -I
    [255, 255, 255], // 100 IRE white
    [46, 0, 106],    // +Q
    [0, 0, 0],
    [0, 0, 0], // PLUGE slot, filled separately
    [0, 0, 0],
];

impl SmpteBarsSource {
    pub fn new(config: &MixConfig) -> Self {
        let (w, h) = (config.width, config.height);
        let top_h = 2 * h / 3;
        let middle_h = h / 12;
        let top_bar = (w / 7).max(1);
        let bottom_bar = (w / 6).max(1);
        let pluge_bar = (bottom_bar / 3).max(1);

        let pattern = Frame::from_fn(w, h, |x, y| {
            if y < top_h {
                SMPTE_TOP[((x / top_bar) as usize).min(6)]
            } else if y < top_h + middle_h {
                SMPTE_MIDDLE[((x / top_bar) as usize).min(6)]
            } else {
                let i = ((x / bottom_bar) as usize).min(5);
                if i == 4 {
                    // PLUGE: 3.5 / 7.5 / 11.5 IRE steps.
                    let step = ((x - 4 * bottom_bar) / pluge_bar).min(2);
                    let v = [8u8, 19, 29][step as usize];
                    [v, v, v]
                } else {
                    SMPTE_BOTTOM[i]
                }
            }
        });
        Self {
            core: SourceCore::new(config),
            pattern,
        }
    }
}

impl TickSubscriber for SmpteBarsSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl_source_accessors!(SmpteBarsSource);

/// Gradient layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientShape {
    Horizontal,
    Vertical,
    Radial,
}

/// Linear or radial two-color gradient.
pub struct GradientSource {
    core: SourceCore,
    pattern: Frame,
}

impl GradientSource {
    pub fn new(config: &MixConfig, shape: GradientShape, start: [u8; 3], end: [u8; 3]) -> Self {
        let (w, h) = (config.width, config.height);
        let lerp = |t: f32| {
            let t = t.clamp(0.0, 1.0);
            let mut px = [0u8; 3];
            for c in 0..3 {
                px[c] = (f32::from(start[c]) * (1.0 - t) + f32::from(end[c]) * t).round() as u8;
            }
            px
        };
        let pattern = match shape {
            GradientShape::Horizontal => Frame::from_fn(w, h, |x, _y| {
                lerp(x as f32 / (w.saturating_sub(1)).max(1) as f32)
            }),
            GradientShape::Vertical => Frame::from_fn(w, h, |_x, y| {
                lerp(y as f32 / (h.saturating_sub(1)).max(1) as f32)
            }),
            GradientShape::Radial => {
                let cx = (w / 2) as f32;
                let cy = (h / 2) as f32;
                let max_r = (cx * cx + cy * cy).sqrt().max(1.0);
                Frame::from_fn(w, h, |x, y| {
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    lerp((dx * dx + dy * dy).sqrt() / max_r)
                })
            }
        };
        Self {
            core: SourceCore::new(config),
            pattern,
        }
    }
}

impl TickSubscriber for GradientSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl_source_accessors!(GradientSource);

/// White/grey checkerboard; the remainder outside whole squares stays black.
pub struct CheckerboardSource {
    core: SourceCore,
    pattern: Frame,
}

impl CheckerboardSource {
    pub fn new(config: &MixConfig, square_size: u32) -> Self {
        let square = square_size.max(1);
        let (w, h) = (config.width, config.height);
        let cols = w / square;
        let rows = h / square;
        let pattern = Frame::from_fn(w, h, |x, y| {
            let col = x / square;
            let row = y / square;
            if col >= cols || row >= rows {
                [0, 0, 0]
            } else if (row + col) % 2 == 0 {
                [255, 255, 255]
            } else {
                [127, 127, 127]
            }
        });
        Self {
            core: SourceCore::new(config),
            pattern,
        }
    }
}

impl TickSubscriber for CheckerboardSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl_source_accessors!(CheckerboardSource);

/// Uniform RGB noise, regenerated every tick from a seeded generator so runs
/// are reproducible.
pub struct NoiseSource {
    core: SourceCore,
    rng: SmallRng,
}

impl NoiseSource {
    pub fn new(config: &MixConfig, seed: u64) -> Self {
        Self {
            core: SourceCore::new(config),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl TickSubscriber for NoiseSource {
    fn on_tick(&mut self, _tick: Tick) {
        let mut data = vec![0u8; (self.core.width() as usize) * (self.core.height() as usize) * 3];
        self.rng.fill_bytes(&mut data);
        let raw = Frame::from_raw(self.core.width(), self.core.height(), data);
        self.core.publish(&raw);
    }
}

impl_source_accessors!(NoiseSource);

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(w: u32, h: u32) -> MixConfig {
        MixConfig {
            width: w,
            height: h,
            wipe_feather: 1,
            ..MixConfig::default()
        }
    }

    #[test]
    fn color_source_publishes_after_tick() {
        let mut s = ColorSource::new(&cfg(8, 4), [9, 8, 7]);
        assert_eq!(s.current_frame(), Frame::black(8, 4));
        s.on_tick(Tick(1));
        assert_eq!(s.current_frame().px(3, 2), [9, 8, 7]);

        s.set_color([1, 2, 3]);
        s.on_tick(Tick(2));
        assert_eq!(s.current_frame().px(0, 0), [1, 2, 3]);
    }

    #[test]
    fn ebu_bars_order_white_to_black() {
        let mut s = EbuBarsSource::new(&cfg(80, 4));
        s.on_tick(Tick(1));
        let f = s.current_frame();
        assert_eq!(f.px(0, 0), [192, 192, 192]);
        assert_eq!(f.px(15, 0), [192, 192, 0]); // second bar
        assert_eq!(f.px(79, 0), [0, 0, 0]); // last bar
    }

    #[test]
    fn smpte_bars_have_three_bands() {
        let mut s = SmpteBarsSource::new(&cfg(70, 60));
        s.on_tick(Tick(1));
        let f = s.current_frame();
        assert_eq!(f.px(0, 0), [191, 191, 191]); // top grey
        assert_eq!(f.px(0, 41), [0, 0, 191]); // castellation starts blue
        assert_eq!(f.px(12, 59), [255, 255, 255]); // bottom white patch
    }

    #[test]
    fn gradient_endpoints() {
        let mut s = GradientSource::new(
            &cfg(16, 4),
            GradientShape::Horizontal,
            [0, 0, 0],
            [200, 100, 50],
        );
        s.on_tick(Tick(1));
        let f = s.current_frame();
        assert_eq!(f.px(0, 0), [0, 0, 0]);
        assert_eq!(f.px(15, 3), [200, 100, 50]);

        let mut s = GradientSource::new(&cfg(4, 16), GradientShape::Vertical, [10, 10, 10], [250, 250, 250]);
        s.on_tick(Tick(1));
        let f = s.current_frame();
        assert_eq!(f.px(0, 0), [10, 10, 10]);
        assert_eq!(f.px(3, 15), [250, 250, 250]);
    }

    #[test]
    fn checkerboard_alternates_and_pads_black() {
        let mut s = CheckerboardSource::new(&cfg(10, 10), 4);
        s.on_tick(Tick(1));
        let f = s.current_frame();
        assert_eq!(f.px(0, 0), [255, 255, 255]);
        assert_eq!(f.px(4, 0), [127, 127, 127]);
        assert_eq!(f.px(4, 4), [255, 255, 255]);
        // 10 = 2 squares of 4 + remainder 2: right/bottom strip is black.
        assert_eq!(f.px(9, 0), [0, 0, 0]);
        assert_eq!(f.px(0, 9), [0, 0, 0]);
    }

    #[test]
    fn noise_is_seeded_and_changes_per_tick() {
        let c = cfg(16, 16);
        let mut a = NoiseSource::new(&c, 7);
        let mut b = NoiseSource::new(&c, 7);
        a.on_tick(Tick(1));
        b.on_tick(Tick(1));
        assert_eq!(a.current_frame(), b.current_frame());

        let first = a.current_frame();
        a.on_tick(Tick(2));
        assert_ne!(first, a.current_frame());
    }
}

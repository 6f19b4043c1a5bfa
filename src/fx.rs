use rayon::prelude::*;

use crate::{
    composite::mul_div255,
    frame::{Frame, Matte},
};

/// Geometric flip applied as the first pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipMode {
    Horizontal,
    Vertical,
    Both,
}

/// Per-source effect configuration, captured immutably for each tick.
///
/// The pipeline order is fixed and not reorderable at runtime:
/// flip, self-screen, gamma, invert, grayscale, box blur. A stage left at its
/// default is skipped entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSettings {
    pub flip: Option<FlipMode>,
    /// "Old-film screen" brightness boost, `255 - ((255-v)^2)/255` per channel.
    /// An integer approximation of `screen(A,A) = 1-(1-A)^2`; it diverges from
    /// the exact formula by at most one code value.
    pub self_screen: bool,
    /// Optional matte restricting the self-screen stage: opaque matte pixels
    /// take the screened value, transparent ones keep the original.
    pub screen_mask: Option<Matte>,
    /// Gamma correction; 1.0 disables the stage. Non-finite or non-positive
    /// values are treated as 1.0.
    pub gamma: f32,
    pub invert: bool,
    pub grayscale: bool,
    /// Box blur radius in pixels; 0 disables the stage.
    pub blur_radius: u32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            flip: None,
            self_screen: false,
            screen_mask: None,
            gamma: 1.0,
            invert: false,
            grayscale: false,
            blur_radius: 0,
        }
    }
}

impl EffectSettings {
    fn effective_gamma(&self) -> f32 {
        if self.gamma.is_finite() && self.gamma > 0.0 {
            self.gamma
        } else {
            1.0
        }
    }

    pub fn is_noop(&self) -> bool {
        self.flip.is_none()
            && !self.self_screen
            && self.effective_gamma() == 1.0
            && !self.invert
            && !self.grayscale
            && self.blur_radius == 0
    }
}

/// Runs the effect pipeline for one source, caching the gamma lookup table
/// across ticks. The table is recomputed only when the gamma value changes.
#[derive(Clone, Debug, Default)]
pub struct FxChain {
    settings: EffectSettings,
    lut: Option<(f32, [u8; 256])>,
    lut_generation: u64,
}

impl FxChain {
    pub fn new(settings: EffectSettings) -> Self {
        Self {
            settings,
            lut: None,
            lut_generation: 0,
        }
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: EffectSettings) {
        self.settings = settings;
    }

    /// How many times the gamma LUT has been (re)built. Diagnostic.
    pub fn lut_generation(&self) -> u64 {
        self.lut_generation
    }

    /// Apply the configured stages to `frame`. With all stages disabled this
    /// is a clone of the shared pixel storage, not a copy.
    pub fn apply(&mut self, frame: &Frame) -> Frame {
        if self.settings.is_noop() {
            return frame.clone();
        }

        let mut out = frame.clone();
        if let Some(mode) = self.settings.flip {
            out = flip_frame(&out, mode);
        }
        if self.settings.self_screen {
            out = self_screen(&out, self.settings.screen_mask.as_ref());
        }
        let gamma = self.settings.effective_gamma();
        if gamma != 1.0 {
            let lut = self.gamma_lut(gamma);
            out = map_channels(&out, |v| lut[v as usize]);
        }
        if self.settings.invert {
            out = map_channels(&out, |v| !v);
        }
        if self.settings.grayscale {
            out = grayscale(&out);
        }
        if self.settings.blur_radius > 0 {
            out = box_blur(&out, self.settings.blur_radius);
        }
        out
    }

    fn gamma_lut(&mut self, gamma: f32) -> [u8; 256] {
        match self.lut {
            Some((cached, table)) if cached == gamma => table,
            _ => {
                let table = build_gamma_lut(gamma);
                self.lut = Some((gamma, table));
                self.lut_generation += 1;
                table
            }
        }
    }
}

fn build_gamma_lut(gamma: f32) -> [u8; 256] {
    let inv = 1.0 / f64::from(gamma);
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let v = ((i as f64) / 255.0).powf(inv) * 255.0;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    table
}

/// Mirror a frame horizontally, vertically or both.
pub fn flip_frame(frame: &Frame, mode: FlipMode) -> Frame {
    let (w, h) = (frame.width(), frame.height());
    let src = frame.data();
    let row_len = (w as usize) * 3;
    let mut data = vec![0u8; src.len()];

    data.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, dst_row)| {
            let sy = match mode {
                FlipMode::Horizontal => y,
                FlipMode::Vertical | FlipMode::Both => (h as usize) - 1 - y,
            };
            let src_row = &src[sy * row_len..(sy + 1) * row_len];
            match mode {
                FlipMode::Vertical => dst_row.copy_from_slice(src_row),
                FlipMode::Horizontal | FlipMode::Both => {
                    for x in 0..w as usize {
                        let sx = (w as usize) - 1 - x;
                        dst_row[x * 3..x * 3 + 3].copy_from_slice(&src_row[sx * 3..sx * 3 + 3]);
                    }
                }
            }
        });

    Frame::from_raw(w, h, data)
}

fn map_channels(frame: &Frame, f: impl Fn(u8) -> u8 + Sync) -> Frame {
    let data: Vec<u8> = frame.data().par_iter().map(|&v| f(v)).collect();
    Frame::from_raw(frame.width(), frame.height(), data)
}

fn self_screen(frame: &Frame, mask: Option<&Matte>) -> Frame {
    let screen = |v: u8| 255 - mul_div255(255 - v, 255 - v);

    let mask = match mask {
        Some(m) if m.matches(frame.width(), frame.height()) => Some(m),
        Some(_) => {
            tracing::warn!("screen mask resolution mismatch; applying unmasked screen");
            None
        }
        None => None,
    };

    match mask {
        None => map_channels(frame, screen),
        Some(m) => {
            let key = m.data();
            let data: Vec<u8> = frame
                .data()
                .par_iter()
                .enumerate()
                .map(|(i, &v)| {
                    let k = key[i / 3];
                    mul_div255(screen(v), k).saturating_add(mul_div255(v, 255 - k))
                })
                .collect();
            Frame::from_raw(frame.width(), frame.height(), data)
        }
    }
}

fn grayscale(frame: &Frame) -> Frame {
    let src = frame.data();
    let mut data = vec![0u8; src.len()];
    data.par_chunks_mut(3)
        .zip(src.par_chunks(3))
        .for_each(|(dst, px)| {
            // BT.601 integer luma.
            let y = (77 * u32::from(px[0]) + 150 * u32::from(px[1]) + 29 * u32::from(px[2]) + 128)
                >> 8;
            let y = y as u8;
            dst.copy_from_slice(&[y, y, y]);
        });
    Frame::from_raw(frame.width(), frame.height(), data)
}

/// Separable edge-clamped box blur with window `2*radius + 1`.
pub fn box_blur(frame: &Frame, radius: u32) -> Frame {
    if radius == 0 {
        return frame.clone();
    }
    let (w, h) = (frame.width(), frame.height());
    let mut tmp = vec![0u8; frame.data().len()];
    horizontal_box_pass(frame.data(), &mut tmp, w, radius);
    let mut out = vec![0u8; frame.data().len()];
    vertical_box_pass(&tmp, &mut out, w, h, radius);
    Frame::from_raw(w, h, out)
}

fn horizontal_box_pass(src: &[u8], dst: &mut [u8], width: u32, radius: u32) {
    let w = width as i64;
    let r = radius as i64;
    let count = (2 * r + 1) as u32;
    let row_len = (width as usize) * 3;
    dst.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(dst_row, src_row)| {
            for x in 0..w {
                let mut acc = [0u32; 3];
                for dx in -r..=r {
                    let sx = (x + dx).clamp(0, w - 1) as usize;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += u32::from(src_row[sx * 3 + c]);
                    }
                }
                for (c, a) in acc.iter().enumerate() {
                    dst_row[(x as usize) * 3 + c] = ((a + count / 2) / count) as u8;
                }
            }
        });
}

fn vertical_box_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, radius: u32) {
    let h = height as i64;
    let r = radius as i64;
    let count = (2 * r + 1) as u32;
    let row_len = (width as usize) * 3;
    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for i in 0..row_len {
                let mut acc = 0u32;
                for dy in -r..=r {
                    let sy = ((y as i64) + dy).clamp(0, h - 1) as usize;
                    acc += u32::from(src[sy * row_len + i]);
                }
                dst_row[i] = ((acc + count / 2) / count) as u8;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Frame {
        // 2x2 with distinct corners.
        Frame::from_rgb(
            2,
            2,
            vec![
                10, 11, 12, 20, 21, 22, //
                30, 31, 32, 40, 41, 42,
            ],
        )
        .unwrap()
    }

    #[test]
    fn noop_settings_share_storage() {
        let f = quad();
        let mut fx = FxChain::default();
        let out = fx.apply(&f);
        assert!(std::ptr::eq(f.data(), out.data()));
    }

    #[test]
    fn flip_modes_move_corners() {
        let f = quad();
        let h = flip_frame(&f, FlipMode::Horizontal);
        assert_eq!(h.px(0, 0), [20, 21, 22]);
        assert_eq!(h.px(1, 1), [30, 31, 32]);

        let v = flip_frame(&f, FlipMode::Vertical);
        assert_eq!(v.px(0, 0), [30, 31, 32]);
        assert_eq!(v.px(1, 0), [40, 41, 42]);

        let b = flip_frame(&f, FlipMode::Both);
        assert_eq!(b.px(0, 0), [40, 41, 42]);
        assert_eq!(b.px(1, 1), [10, 11, 12]);
    }

    #[test]
    fn invert_is_bitwise_complement() {
        let mut fx = FxChain::new(EffectSettings {
            invert: true,
            ..EffectSettings::default()
        });
        let out = fx.apply(&Frame::solid(2, 2, [0, 128, 255]));
        assert_eq!(out.px(0, 0), [255, 127, 0]);
    }

    #[test]
    fn grayscale_preserves_luma_and_replicates() {
        let mut fx = FxChain::new(EffectSettings {
            grayscale: true,
            ..EffectSettings::default()
        });
        let out = fx.apply(&Frame::solid(2, 2, [200, 100, 50]));
        let px = out.px(0, 0);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        // 77*200 + 150*100 + 29*50 + 128 = 31978; >> 8 = 124.
        assert_eq!(px[0], 124);
    }

    #[test]
    fn self_screen_fixes_black_and_white() {
        let mut fx = FxChain::new(EffectSettings {
            self_screen: true,
            ..EffectSettings::default()
        });
        assert_eq!(fx.apply(&Frame::solid(1, 1, [0, 0, 0])).px(0, 0), [0, 0, 0]);
        assert_eq!(
            fx.apply(&Frame::solid(1, 1, [255, 255, 255])).px(0, 0),
            [255, 255, 255]
        );
        // Midtones get boosted toward screen(v,v).
        let mid = fx.apply(&Frame::solid(1, 1, [128, 128, 128])).px(0, 0)[0];
        assert!(mid > 128);
    }

    #[test]
    fn masked_screen_leaves_transparent_region_untouched() {
        let mask = Matte::from_gray(2, 1, vec![0, 255]).unwrap();
        let mut fx = FxChain::new(EffectSettings {
            self_screen: true,
            screen_mask: Some(mask),
            ..EffectSettings::default()
        });
        let out = fx.apply(&Frame::solid(2, 1, [100, 100, 100]));
        assert_eq!(out.px(0, 0), [100, 100, 100]);
        assert!(out.px(1, 0)[0] > 100);
    }

    #[test]
    fn gamma_lut_rebuilds_only_on_change() {
        let mut fx = FxChain::new(EffectSettings {
            gamma: 2.2,
            ..EffectSettings::default()
        });
        let f = Frame::solid(2, 2, [64, 64, 64]);

        fx.apply(&f);
        fx.apply(&f);
        assert_eq!(fx.lut_generation(), 1);

        let mut s = fx.settings().clone();
        s.gamma = 1.8;
        fx.set_settings(s);
        fx.apply(&f);
        assert_eq!(fx.lut_generation(), 2);
    }

    #[test]
    fn gamma_brightens_midtones_above_one() {
        let mut fx = FxChain::new(EffectSettings {
            gamma: 2.0,
            ..EffectSettings::default()
        });
        let out = fx.apply(&Frame::solid(1, 1, [64, 64, 64]));
        assert!(out.px(0, 0)[0] > 64);
        // Endpoints are fixed.
        assert_eq!(fx.apply(&Frame::solid(1, 1, [0, 0, 0])).px(0, 0)[0], 0);
        assert_eq!(
            fx.apply(&Frame::solid(1, 1, [255, 255, 255])).px(0, 0)[0],
            255
        );
    }

    #[test]
    fn box_blur_constant_image_is_identity() {
        let f = Frame::solid(8, 8, [33, 66, 99]);
        let out = box_blur(&f, 3);
        assert_eq!(out, f);
    }

    #[test]
    fn box_blur_spreads_an_impulse() {
        let f = Frame::from_fn(5, 5, |x, y| {
            if (x, y) == (2, 2) {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        });
        let out = box_blur(&f, 1);
        assert!(out.px(2, 2)[0] < 255);
        assert!(out.px(1, 2)[0] > 0);
        assert_eq!(out.px(0, 0)[0], 0);
    }

    #[test]
    fn non_finite_gamma_is_treated_as_disabled() {
        let mut fx = FxChain::new(EffectSettings {
            gamma: f32::NAN,
            ..EffectSettings::default()
        });
        let f = Frame::solid(1, 1, [77, 77, 77]);
        assert_eq!(fx.apply(&f), f);
        assert_eq!(fx.lut_generation(), 0);
    }
}

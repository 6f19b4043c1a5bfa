//! Per-pixel compositing kernels used by the transition engine.
//!
//! All kernels are pure functions over equal-resolution frames; the mix bus
//! normalizes mismatched or missing inputs to black frames before calling in.
//! Pixel math is integer fixed-point throughout (`mul_div255`), chosen so the
//! crossfade endpoints are bit-exact: weight 255 reproduces the input verbatim.

use rayon::prelude::*;

use crate::frame::{Frame, Matte};

/// Edge of the screen the incoming preview picture enters from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WipeDirection {
    FromLeft,
    FromRight,
    FromTop,
    FromBottom,
}

pub(crate) fn mul_div255(x: u8, y: u8) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn fade_weight(fade: f32) -> u8 {
    ((fade.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u8
}

/// Linear crossfade: `out = preview*fade + program*(1-fade)`.
///
/// At `fade == 0.0` the result is bit-identical to `program`, at `1.0` to
/// `preview`.
pub fn crossfade(preview: &Frame, program: &Frame, fade: f32) -> Frame {
    debug_assert!(preview.matches(program.width(), program.height()));
    let t = fade_weight(fade);
    let it = 255 - t;

    let data: Vec<u8> = preview
        .data()
        .par_iter()
        .zip(program.data().par_iter())
        .map(|(&p, &q)| mul_div255(p, t).saturating_add(mul_div255(q, it)))
        .collect();
    Frame::from_raw(preview.width(), preview.height(), data)
}

/// Directional wipe with a hard boundary and a thin 50/50 feather band.
///
/// The revealed preview region grows with `fade` from the named edge; the
/// boundary sits at `fade * extent` from that edge. Exact endpoints return the
/// untouched operand: the band only exists while the boundary is inside the
/// buffer.
pub fn wipe(
    preview: &Frame,
    program: &Frame,
    fade: f32,
    feather: u32,
    dir: WipeDirection,
) -> Frame {
    debug_assert!(preview.matches(program.width(), program.height()));
    let fade = fade.clamp(0.0, 1.0);
    if fade <= 0.0 {
        return program.clone();
    }
    if fade >= 1.0 {
        return preview.clone();
    }

    match dir {
        WipeDirection::FromLeft | WipeDirection::FromRight => {
            h_wipe(preview, program, fade, feather, dir)
        }
        WipeDirection::FromTop | WipeDirection::FromBottom => {
            v_wipe(preview, program, fade, feather, dir)
        }
    }
}

fn blend_half(p: u8, q: u8) -> u8 {
    ((u16::from(p) + u16::from(q)) / 2) as u8
}

fn h_wipe(preview: &Frame, program: &Frame, fade: f32, feather: u32, dir: WipeDirection) -> Frame {
    let w = preview.width() as usize;
    let f = feather as usize;
    let row_len = w * 3;

    // Column ranges [preview | band | program], measured left to right.
    // FromRight mirrors the layout around the boundary.
    let (pv_end, band_end, preview_side_left) = match dir {
        WipeDirection::FromLeft => {
            let pos = ((fade * w as f32) as usize).min(w);
            (pos, (pos + f).min(w), true)
        }
        WipeDirection::FromRight => {
            let pos = (((1.0 - fade) * w as f32) as usize).min(w);
            (pos, (pos + f).min(w), false)
        }
        _ => unreachable!(),
    };

    let mut data = vec![0u8; preview.data().len()];
    data.par_chunks_mut(row_len)
        .zip(preview.data().par_chunks(row_len))
        .zip(program.data().par_chunks(row_len))
        .for_each(|((out, pv), pg)| {
            let (left_src, right_src) = if preview_side_left { (pv, pg) } else { (pg, pv) };
            out[..pv_end * 3].copy_from_slice(&left_src[..pv_end * 3]);
            for i in pv_end * 3..band_end * 3 {
                out[i] = blend_half(pv[i], pg[i]);
            }
            out[band_end * 3..].copy_from_slice(&right_src[band_end * 3..]);
        });
    Frame::from_raw(preview.width(), preview.height(), data)
}

fn v_wipe(preview: &Frame, program: &Frame, fade: f32, feather: u32, dir: WipeDirection) -> Frame {
    let h = preview.height() as usize;
    let f = feather as usize;
    let row_len = (preview.width() as usize) * 3;

    let (pv_end, band_end, preview_side_top) = match dir {
        WipeDirection::FromTop => {
            let pos = ((fade * h as f32) as usize).min(h);
            (pos, (pos + f).min(h), true)
        }
        WipeDirection::FromBottom => {
            let pos = (((1.0 - fade) * h as f32) as usize).min(h);
            (pos, (pos + f).min(h), false)
        }
        _ => unreachable!(),
    };

    let mut data = vec![0u8; preview.data().len()];
    data.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, out)| {
            let pv = &preview.data()[y * row_len..(y + 1) * row_len];
            let pg = &program.data()[y * row_len..(y + 1) * row_len];
            if y < pv_end {
                out.copy_from_slice(if preview_side_top { pv } else { pg });
            } else if y < band_end {
                for i in 0..row_len {
                    out[i] = blend_half(pv[i], pg[i]);
                }
            } else {
                out.copy_from_slice(if preview_side_top { pg } else { pv });
            }
        });
    Frame::from_raw(preview.width(), preview.height(), data)
}

/// Keyed overlay blend for stinger frames:
/// `out = fill*key/255 + program*(255-key)/255`.
///
/// For a binary matte this reduces to the classic masked copy; semi-transparent
/// matte pixels get a proper weighted mix.
pub fn key_blend(fill: &Frame, key: &Matte, program: &Frame) -> Frame {
    debug_assert!(fill.matches(program.width(), program.height()));
    debug_assert!(key.matches(program.width(), program.height()));
    let k = key.data();

    let data: Vec<u8> = fill
        .data()
        .par_iter()
        .zip(program.data().par_iter())
        .enumerate()
        .map(|(i, (&f, &p))| {
            let a = k[i / 3];
            mul_div255(f, a).saturating_add(mul_div255(p, 255 - a))
        })
        .collect();
    Frame::from_raw(fill.width(), fill.height(), data)
}

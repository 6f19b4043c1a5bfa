//! Image asset loading.
//!
//! Everything the mixer composites runs at one fixed resolution, so loaders
//! resize at load time with a triangle filter and hand back ready-to-use
//! [`Frame`]s. Decoding happens here and only here; the tick path never
//! touches the filesystem.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::{
    error::{MixError, MixResult},
    frame::{Frame, Matte},
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

/// Load a single image file as an RGB frame at the given resolution.
pub fn load_frame(path: &Path, width: u32, height: u32) -> MixResult<Frame> {
    let img = image::open(path)
        .map_err(|e| MixError::asset(format!("{}: {e}", path.display())))?
        .resize_exact(width, height, FilterType::Triangle)
        .into_rgb8();
    Frame::from_rgb(width, height, img.into_raw())
}

/// Load a single RGBA image file as a fill frame plus its alpha matte.
pub fn load_keyed_frame(path: &Path, width: u32, height: u32) -> MixResult<(Frame, Matte)> {
    let img = image::open(path)
        .map_err(|e| MixError::asset(format!("{}: {e}", path.display())))?
        .resize_exact(width, height, FilterType::Triangle)
        .into_rgba8();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for px in img.pixels() {
        rgb.extend_from_slice(&px.0[..3]);
        alpha.push(px.0[3]);
    }
    Ok((
        Frame::from_rgb(width, height, rgb)?,
        Matte::from_gray(width, height, alpha)?,
    ))
}

/// Image files in `dir`, sorted by file name. Non-image files are ignored.
fn image_files(dir: &Path) -> MixResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| MixError::asset(format!("{}: {e}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(MixError::asset(format!(
            "{}: no image files found",
            dir.display()
        )));
    }
    Ok(paths)
}

/// Load an image-sequence directory as RGB frames, sorted by file name.
pub fn load_sequence_dir(dir: &Path, width: u32, height: u32) -> MixResult<Vec<Frame>> {
    let paths = image_files(dir)?;
    tracing::info!(dir = %dir.display(), frames = paths.len(), "loading image sequence");
    paths
        .iter()
        .map(|p| load_frame(p, width, height))
        .collect()
}

/// Load a stinger directory of RGBA frames as fill+matte pairs.
pub fn load_stinger_dir(dir: &Path, width: u32, height: u32) -> MixResult<Vec<(Frame, Matte)>> {
    let paths = image_files(dir)?;
    tracing::info!(dir = %dir.display(), frames = paths.len(), "loading stinger animation");
    paths
        .iter()
        .map(|p| load_keyed_frame(p, width, height))
        .collect()
}

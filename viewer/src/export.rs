//! PNG export of window surfaces.
//!
//! Images are written as-is. Volumes are laid out as an atlas of z slices, left to right
//! then top to bottom, with unused tiles left transparent.

use std::path::{Path, PathBuf};

use hyperorbit_engine::grid::Extent;
use hyperorbit_engine::options::{RenderMode, Space};
use image::{Rgba, RgbaImage};
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("surface has {actual} texels, extent {extent} needs {expected}")]
    SizeMismatch { extent: Extent, expected: usize, actual: usize },
    #[error("create output directory {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("write {path}: {source}")]
    Image { path: PathBuf, source: image::ImageError },
}

/// Tile grid `(columns, rows)` holding every slice of `extent`.
pub fn atlas_layout(extent: Extent) -> (u32, u32) {
    let depth = extent.depth.max(1);
    let mut cols = 1;
    while cols * cols < depth {
        cols += 1;
    }
    (cols, depth.div_ceil(cols))
}

/// Arrange `texels` (flat order, x fastest) into an image.
pub fn to_image(texels: &[[u8; 4]], extent: Extent) -> Result<RgbaImage, ExportError> {
    if texels.len() != extent.cells() {
        return Err(ExportError::SizeMismatch {
            extent,
            expected: extent.cells(),
            actual: texels.len(),
        });
    }
    let (cols, rows) = atlas_layout(extent);
    let mut img = RgbaImage::new(extent.width * cols, extent.height * rows);
    for (flat, texel) in texels.iter().enumerate() {
        let [x, y, z] = extent.location(flat);
        let px = (z % cols) * extent.width + x;
        let py = (z / cols) * extent.height + y;
        img.put_pixel(px, py, Rgba(*texel));
    }
    Ok(img)
}

/// File name for window `index`.
pub fn window_file_name(index: usize, space: Space, mode: RenderMode) -> String {
    format!("window{index}-{space}-{mode}.png")
}

/// Write one surface to `path`, creating parent directories.
pub fn write_png(path: &Path, texels: &[[u8; 4]], extent: Extent) -> Result<(), ExportError> {
    let img = to_image(texels, extent)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|source| ExportError::Io { path: parent.to_path_buf(), source })?;
    }
    img.save(path).map_err(|source| ExportError::Image { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), width = img.width(), height = img.height(), "exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atlas_is_near_square() {
        assert_eq!(atlas_layout(Extent::new(8, 8, 1)), (1, 1));
        assert_eq!(atlas_layout(Extent::new(8, 8, 4)), (2, 2));
        assert_eq!(atlas_layout(Extent::new(8, 8, 5)), (3, 2));
        assert_eq!(atlas_layout(Extent::new(8, 8, 64)), (8, 8));
    }

    #[test]
    fn file_names_carry_space_and_mode() {
        assert_eq!(
            window_file_name(2, Space::Dynamical, RenderMode::Escape),
            "window2-dynamical-escape.png"
        );
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall mask refinement
//!
//! Door and window pixels are carved out of the wall mask so openings do not
//! register as solid wall, then isolated specks are dropped.

use crate::config::RefineConfig;
use crate::error::{Error, Result};
use crate::masks::{self, BlobMap, MaskSet};
use image::GrayImage;

/// Clean the raw wall mask using the door and window masks as exclusions.
///
/// The output has the input's shape, and surviving pixels keep their values.
pub fn refine_walls(masks: &MaskSet, config: &RefineConfig) -> Result<GrayImage> {
    let wall = masks::shape(&masks.wall);
    let door = masks::shape(&masks.door);
    let window = masks::shape(&masks.window);
    if wall != door || wall != window {
        return Err(Error::ShapeMismatch { wall, door, window });
    }

    let mut refined = masks.wall.clone();

    let mut carved = 0usize;
    for (x, y, pixel) in refined.enumerate_pixels_mut() {
        if pixel.0[0] > 0 && (masks::is_set(&masks.door, x, y) || masks::is_set(&masks.window, x, y))
        {
            pixel.0[0] = 0;
            carved += 1;
        }
    }

    if config.open_radius > 0 {
        let opened = masks::morphological_open(&refined, config.open_radius);
        for (pixel, keep) in refined.pixels_mut().zip(opened.pixels()) {
            if keep.0[0] == 0 {
                pixel.0[0] = 0;
            }
        }
    }

    let (removed_blobs, removed_pixels) = remove_small_blobs(&mut refined, config.min_blob_area);

    tracing::debug!(
        carved,
        removed_blobs,
        removed_pixels,
        "Refined wall mask"
    );

    Ok(refined)
}

/// Zero out 8-connected blobs below `min_area`. Returns (blobs, pixels) removed.
fn remove_small_blobs(mask: &mut GrayImage, min_area: u32) -> (usize, usize) {
    if min_area <= 1 {
        return (0, 0);
    }
    let map = BlobMap::new(mask);
    let small: rustc_hash::FxHashSet<u32> = map
        .blobs
        .iter()
        .filter(|b| b.area < min_area)
        .map(|b| b.label)
        .collect();
    if small.is_empty() {
        return (0, 0);
    }

    let mut removed = 0usize;
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        if small.contains(&map.label_at(x, y)) {
            pixel.0[0] = 0;
            removed += 1;
        }
    }
    (small.len(), removed)
}

/// Everything a room cannot extend through: refined walls plus openings.
///
/// Door gaps in exterior walls would otherwise connect rooms to the outside.
pub fn barrier_mask(refined: &GrayImage, masks: &MaskSet) -> GrayImage {
    masks::union(refined, &masks.openings())
}

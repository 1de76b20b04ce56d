// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segmentation masks and binary image operations
//!
//! The segmentation step hands over three same-shaped masks. A pixel is set
//! when its value is non-zero; values themselves are otherwise preserved.

use crate::error::{Error, Result};
use image::{GrayImage, ImageBuffer, ImageReader, Luma};
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Wall, door and window masks of one floor plan
#[derive(Debug, Clone)]
pub struct MaskSet {
    pub wall: GrayImage,
    pub door: GrayImage,
    pub window: GrayImage,
}

impl MaskSet {
    /// Bundle three masks, rejecting mismatched shapes
    pub fn new(wall: GrayImage, door: GrayImage, window: GrayImage) -> Result<Self> {
        let (w, d, win) = (shape(&wall), shape(&door), shape(&window));
        if w != d || w != win {
            return Err(Error::ShapeMismatch {
                wall: w,
                door: d,
                window: win,
            });
        }
        Ok(Self { wall, door, window })
    }

    /// Load three mask images and binarize them at `threshold`
    pub fn load(
        wall: impl AsRef<Path>,
        door: impl AsRef<Path>,
        window: impl AsRef<Path>,
        threshold: u8,
    ) -> Result<Self> {
        Self::new(
            load_mask(wall.as_ref(), threshold)?,
            load_mask(door.as_ref(), threshold)?,
            load_mask(window.as_ref(), threshold)?,
        )
    }

    /// (height, width) in pixels
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        shape(&self.wall)
    }

    /// Union of the door and window masks
    pub fn openings(&self) -> GrayImage {
        union(&self.door, &self.window)
    }
}

/// (height, width) of an image
#[inline]
pub fn shape(image: &GrayImage) -> (u32, u32) {
    (image.height(), image.width())
}

#[inline]
pub fn is_set(image: &GrayImage, x: u32, y: u32) -> bool {
    image.get_pixel(x, y).0[0] > 0
}

/// Number of set pixels
pub fn count_set(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p.0[0] > 0).count()
}

fn load_mask(path: &Path, threshold: u8) -> Result<GrayImage> {
    let img = ImageReader::open(path)?.decode()?.to_luma8();
    Ok(binarize(&img, threshold))
}

/// 255 where the value exceeds `threshold`, 0 elsewhere
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    result
}

/// Pixel-wise union of two same-shaped masks (255 where either is set)
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let set = is_set(a, x, y) || (x < b.width() && y < b.height() && is_set(b, x, y));
        Luma([if set { 255 } else { 0 }])
    })
}

/// Morphological dilation - expands set regions (square structuring element)
pub fn dilate(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::dilate(image, Norm::LInf, radius)
}

/// Morphological opening (erode then dilate) - removes thin noise
pub fn morphological_open(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::open(image, Norm::LInf, radius)
}

/// 8-connected component of set pixels
#[derive(Debug, Clone)]
pub struct Blob {
    /// Component label in the label image
    pub label: u32,
    /// Pixel count
    pub area: u32,
    /// Mean pixel position
    pub centroid: Point2<f64>,
}

/// Labelled components of a mask, ordered by their first pixel in raster order
pub struct BlobMap {
    pub labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    pub blobs: Vec<Blob>,
}

impl BlobMap {
    /// Label the 8-connected components of the set pixels of `image`
    pub fn new(image: &GrayImage) -> Self {
        // connected_components only joins equal values
        let labels = connected_components(&binarize(image, 0), Connectivity::Eight, Luma([0u8]));

        let mut index: FxHashMap<u32, usize> = FxHashMap::default();
        let mut sums: Vec<(u32, u64, f64, f64)> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0];
            if label == 0 {
                continue;
            }
            let slot = *index.entry(label).or_insert_with(|| {
                sums.push((label, 0, 0.0, 0.0));
                sums.len() - 1
            });
            let entry = &mut sums[slot];
            entry.1 += 1;
            entry.2 += x as f64;
            entry.3 += y as f64;
        }

        let blobs = sums
            .into_iter()
            .map(|(label, n, sx, sy)| Blob {
                label,
                area: n as u32,
                centroid: Point2::new(sx / n as f64, sy / n as f64),
            })
            .collect();

        Self { labels, blobs }
    }

    /// Label at a pixel (0 for background)
    #[inline]
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y).0[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch() {
        let result = MaskSet::new(
            GrayImage::new(10, 20),
            GrayImage::new(10, 20),
            GrayImage::new(20, 10),
        );
        match result {
            Err(Error::ShapeMismatch { wall, window, .. }) => {
                assert_eq!(wall, (20, 10));
                assert_eq!(window, (10, 20));
            }
            other => panic!("expected shape mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_binarize_and_union() {
        let mut a = GrayImage::new(3, 1);
        a.put_pixel(0, 0, Luma([1]));
        a.put_pixel(1, 0, Luma([200]));
        let bin = binarize(&a, 127);
        assert_eq!(bin.get_pixel(0, 0).0[0], 0);
        assert_eq!(bin.get_pixel(1, 0).0[0], 255);

        let mut b = GrayImage::new(3, 1);
        b.put_pixel(2, 0, Luma([1]));
        let u = union(&a, &b);
        assert_eq!(count_set(&u), 3);
    }

    #[test]
    fn test_blob_map() {
        let mut img = GrayImage::new(10, 10);
        // diagonal pair joins under 8-connectivity
        img.put_pixel(1, 1, Luma([255]));
        img.put_pixel(2, 2, Luma([255]));
        for x in 5..9 {
            img.put_pixel(x, 7, Luma([9]));
        }

        let map = BlobMap::new(&img);
        assert_eq!(map.blobs.len(), 2);
        assert_eq!(map.blobs[0].area, 2);
        assert_eq!(map.blobs[0].centroid, Point2::new(1.5, 1.5));
        assert_eq!(map.blobs[1].area, 4);
        assert_eq!(map.label_at(6, 7), map.blobs[1].label);
        assert_eq!(map.label_at(0, 0), 0);
    }

    #[test]
    fn test_dilate_grows_square() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([255]));
        assert_eq!(count_set(&dilate(&img, 1)), 9);
        assert_eq!(count_set(&morphological_open(&img, 1)), 0);
    }
}

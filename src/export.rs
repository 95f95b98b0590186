//! PNG export of simulation state.

use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::heightmap::normalize_heightmap;
use crate::tilemap::Tilemap;

/// Export a heightmap using spectral colormap.
/// Values are normalized to the map's own range first.
pub fn export_heightmap(
    heightmap: &Tilemap<f32>,
    path: impl AsRef<Path>,
) -> Result<(), image::ImageError> {
    let normalized = normalize_heightmap(heightmap);
    let mut img: RgbImage = ImageBuffer::new(heightmap.width as u32, heightmap.height as u32);

    for (x, y, &val) in normalized.iter() {
        img.put_pixel(x as u32, y as u32, Rgb(spectral_colormap(val.clamp(0.0, 1.0))));
    }

    img.save(path)
}

/// Export standing water over a grey hillshade of the surface.
/// Depth saturates to full blue at `full_depth`.
pub fn export_water_map(
    heights: &Tilemap<f32>,
    depths: &Tilemap<f32>,
    full_depth: f32,
    path: impl AsRef<Path>,
) -> Result<(), image::ImageError> {
    let normalized = normalize_heightmap(heights);
    let mut img: RgbImage = ImageBuffer::new(heights.width as u32, heights.height as u32);
    let water = [0.12, 0.35, 0.80];

    for (x, y, &h) in normalized.iter() {
        let grey = 0.25 + 0.6 * h;
        let depth = depths.at(glam::IVec2::new(x as i32, y as i32)).copied().unwrap_or(0.0);
        let t = if full_depth > 0.0 { (depth / full_depth).clamp(0.0, 1.0) } else { 0.0 };
        // Any water at all shows a tint.
        let t = if depth > 0.0 { t.max(0.2) } else { 0.0 };

        let rgb = [
            ((grey + (water[0] - grey) * t) * 255.0) as u8,
            ((grey + (water[1] - grey) * t) * 255.0) as u8,
            ((grey + (water[2] - grey) * t) * 255.0) as u8,
        ];
        img.put_pixel(x as u32, y as u32, Rgb(rgb));
    }

    img.save(path)
}

/// Export the traffic frequency field. Values are already in [0, 1).
pub fn export_frequency_map(
    frequency: &Tilemap<f32>,
    path: impl AsRef<Path>,
) -> Result<(), image::ImageError> {
    let mut img: RgbImage = ImageBuffer::new(frequency.width as u32, frequency.height as u32);
    for (x, y, &f) in frequency.iter() {
        // Square root so faint channels stay visible.
        let v = (f.clamp(0.0, 1.0).sqrt() * 255.0) as u8;
        img.put_pixel(x as u32, y as u32, Rgb([v / 4, v / 2, v]));
    }
    img.save(path)
}

/// Spectral colormap (matplotlib style): dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

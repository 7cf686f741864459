//! Pixel-level operations used by the detection pipeline.
//!
//! All operations work on the plain [`GrayImage`] buffers; binary images use
//! the 0/255 convention throughout.

use crate::image::GrayImage;

/// Mean and maximum of a difference image, restricted to a mask.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DiffStats {
    pub mean: f64,
    pub max: u8,
}

/// Per-pixel absolute difference. Both images must have identical dimensions.
pub fn absdiff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.width, b.width);
    debug_assert_eq!(a.height, b.height);
    let data = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();
    GrayImage {
        width: a.width,
        height: a.height,
        data,
    }
}

/// Mean and max intensity of `diff` over the nonzero pixels of `mask`.
pub fn masked_diff_stats(diff: &GrayImage, mask: &GrayImage) -> DiffStats {
    debug_assert_eq!(diff.width, mask.width);
    debug_assert_eq!(diff.height, mask.height);
    let mut sum = 0u64;
    let mut count = 0u64;
    let mut max = 0u8;
    for (&d, &m) in diff.data.iter().zip(&mask.data) {
        if m == 0 {
            continue;
        }
        sum += d as u64;
        count += 1;
        if d > max {
            max = d;
        }
    }
    let mean = if count > 0 {
        sum as f64 / count as f64
    } else {
        0.0
    };
    DiffStats { mean, max }
}

/// Separable 5x5 Gaussian smoothing (kernel [1 4 6 4 1]/16, clamped borders).
pub fn gaussian_blur_5(src: &GrayImage) -> GrayImage {
    const K: [u32; 5] = [1, 4, 6, 4, 1];
    let w = src.width as i32;
    let h = src.height as i32;

    let mut horiz = vec![0u16; src.data.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (i, &k) in K.iter().enumerate() {
                let xi = (x + i as i32 - 2).clamp(0, w - 1);
                acc += k * src.data[(y * w + xi) as usize] as u32;
            }
            horiz[(y * w + x) as usize] = (acc / 16) as u16;
        }
    }

    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (i, &k) in K.iter().enumerate() {
                let yi = (y + i as i32 - 2).clamp(0, h - 1);
                acc += k * horiz[(yi * w + x) as usize] as u32;
            }
            out.data[(y * w + x) as usize] = (acc / 16).min(255) as u8;
        }
    }
    out
}

/// Binary threshold: pixels strictly above `thresh` become 255, others 0.
pub fn threshold_binary(src: &GrayImage, thresh: u8) -> GrayImage {
    let data = src
        .data
        .iter()
        .map(|&v| if v > thresh { 255 } else { 0 })
        .collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Keep pixels of `src` where `mask` is nonzero, zero elsewhere.
pub fn mask_and(src: &GrayImage, mask: &GrayImage) -> GrayImage {
    debug_assert_eq!(src.width, mask.width);
    debug_assert_eq!(src.height, mask.height);
    let data = src
        .data
        .iter()
        .zip(&mask.data)
        .map(|(&v, &m)| if m != 0 { v } else { 0 })
        .collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

fn erode_3(src: &GrayImage) -> GrayImage {
    let w = src.width as i32;
    let h = src.height as i32;
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..h {
        for x in 0..w {
            let mut keep = true;
            'outer: for dy in -1..=1 {
                for dx in -1..=1 {
                    let xi = x + dx;
                    let yi = y + dy;
                    if xi < 0 || yi < 0 || xi >= w || yi >= h {
                        keep = false;
                        break 'outer;
                    }
                    if src.data[(yi * w + xi) as usize] == 0 {
                        keep = false;
                        break 'outer;
                    }
                }
            }
            if keep {
                out.data[(y * w + x) as usize] = 255;
            }
        }
    }
    out
}

fn dilate_3(src: &GrayImage) -> GrayImage {
    let w = src.width as i32;
    let h = src.height as i32;
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..h {
        for x in 0..w {
            let mut hit = false;
            'outer: for dy in -1..=1 {
                for dx in -1..=1 {
                    let xi = x + dx;
                    let yi = y + dy;
                    if xi < 0 || yi < 0 || xi >= w || yi >= h {
                        continue;
                    }
                    if src.data[(yi * w + xi) as usize] != 0 {
                        hit = true;
                        break 'outer;
                    }
                }
            }
            if hit {
                out.data[(y * w + x) as usize] = 255;
            }
        }
    }
    out
}

/// Morphological opening with a 3x3 rectangular structuring element.
/// Removes speckle smaller than the kernel from a binary image.
pub fn morph_open_3(src: &GrayImage) -> GrayImage {
    dilate_3(&erode_3(src))
}

/// Filled circular mask (255 inside, 0 outside).
pub fn circle_mask(width: usize, height: usize, cx: f32, cy: f32, radius: f32) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    let r2 = radius * radius;
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r2 {
                out.data[y * width + x] = 255;
            }
        }
    }
    out
}

/// Number of nonzero pixels.
pub fn count_nonzero(src: &GrayImage) -> usize {
    src.data.iter().filter(|&&v| v != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(w: usize, h: usize, v: u8) -> GrayImage {
        GrayImage::from_raw(w, h, vec![v; w * h]).unwrap()
    }

    #[test]
    fn absdiff_is_symmetric() {
        let a = filled(3, 3, 200);
        let b = filled(3, 3, 50);
        assert_eq!(absdiff(&a, &b), absdiff(&b, &a));
        assert_eq!(absdiff(&a, &b).get(1, 1), 150);
    }

    #[test]
    fn diff_stats_respect_mask() {
        let mut diff = filled(4, 1, 0);
        diff.set(0, 0, 80);
        diff.set(3, 0, 200);
        let mut mask = filled(4, 1, 255);
        mask.set(3, 0, 0); // hide the bright pixel
        let stats = masked_diff_stats(&diff, &mask);
        assert_eq!(stats.max, 80);
        assert!((stats.mean - 80.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn diff_stats_on_empty_mask_are_zero() {
        let diff = filled(4, 4, 120);
        let mask = filled(4, 4, 0);
        assert_eq!(masked_diff_stats(&diff, &mask), DiffStats::default());
    }

    #[test]
    fn threshold_is_strict() {
        let mut img = filled(2, 1, 40);
        img.set(1, 0, 41);
        let thr = threshold_binary(&img, 40);
        assert_eq!(thr.get(0, 0), 0);
        assert_eq!(thr.get(1, 0), 255);
    }

    #[test]
    fn opening_removes_single_pixel_speckle() {
        let mut img = GrayImage::new(9, 9);
        img.set(4, 4, 255); // lone speckle
        let opened = morph_open_3(&img);
        assert_eq!(count_nonzero(&opened), 0);
    }

    #[test]
    fn opening_keeps_solid_blocks() {
        let mut img = GrayImage::new(9, 9);
        for y in 2..7 {
            for x in 2..7 {
                img.set(x, y, 255);
            }
        }
        let opened = morph_open_3(&img);
        assert!(count_nonzero(&opened) >= 9);
        assert_eq!(opened.get(4, 4), 255);
    }

    #[test]
    fn circle_mask_contains_center_not_corner() {
        let mask = circle_mask(10, 10, 5.0, 5.0, 3.0);
        assert_eq!(mask.get(5, 5), 255);
        assert_eq!(mask.get(0, 0), 0);
    }
}

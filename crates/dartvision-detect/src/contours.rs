//! Contour extraction on binary images (Suzuki border following).

use dartvision_core::GrayImage;
use nalgebra::Point2;

/// A single traced boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary pixel positions in trace order.
    pub points: Vec<Point2<f32>>,
    /// Whether this boundary encloses a hole inside another contour.
    pub hole: bool,
}

impl Contour {
    /// Enclosed area by the shoelace formula over the boundary polygon.
    pub fn area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc = 0.0_f64;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            acc += (p.x as f64) * (q.y as f64) - (q.x as f64) * (p.y as f64);
        }
        (acc.abs() / 2.0) as f32
    }

    /// Axis-aligned bounding box as (min, max), or `None` for an empty trace.
    pub fn bounding_box(&self) -> Option<(Point2<f32>, Point2<f32>)> {
        let first = *self.points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }
}

// 8-neighborhood sweep offsets (x, y), counterclockwise from east.
const NEIGHBORHOOD: [[i32; 2]; 8] = [
    [1, 0],
    [1, -1],
    [0, -1],
    [-1, -1],
    [-1, 0],
    [-1, 1],
    [0, 1],
    [1, 1],
];

fn neighborhood_deltas(row_stride: i32) -> [isize; 16] {
    let mut deltas = [0isize; 16];
    for i in 0..8 {
        let d = (NEIGHBORHOOD[i][0] + NEIGHBORHOOD[i][1] * row_stride) as isize;
        deltas[i] = d;
        deltas[i + 8] = d;
    }
    deltas
}

/// Trace one border starting at `pos`, marking visited pixels in `buf` with
/// the contour label `nbd` (negated on right-edge pixels, per Suzuki).
fn border_following(
    buf: &mut [i32],
    pos: usize,
    nbd: i32,
    start_x: i32,
    start_y: i32,
    hole: bool,
    deltas: &[isize; 16],
) -> Vec<Point2<f32>> {
    let mut points = Vec::new();
    let mut x = start_x;
    let mut y = start_y;

    let mut s: usize = if hole { 0 } else { 4 };
    let mut s_end = s;
    let mut pos1;

    // Clockwise sweep for the first nonzero neighbor.
    loop {
        s = s.wrapping_sub(1) & 7;
        pos1 = (pos as isize + deltas[s]) as usize;
        if buf[pos1] != 0 {
            break;
        }
        if s == s_end {
            break;
        }
    }

    if s == s_end {
        // Isolated pixel.
        buf[pos] = -nbd;
        points.push(Point2::new(x as f32, y as f32));
        return points;
    }

    let mut pos3 = pos;

    loop {
        s_end = s;

        // Counterclockwise sweep for the next boundary pixel.
        let pos4 = loop {
            s = (s + 1) & 15;
            let probe = (pos3 as isize + deltas[s]) as usize;
            if buf[probe] != 0 {
                break probe;
            }
        };

        s &= 7;

        // Right-edge pixels get a negative label so later row scans know the
        // border was already traced.
        if (s.wrapping_sub(1) as u32) < s_end as u32 {
            buf[pos3] = -nbd;
        } else if buf[pos3] == 1 {
            buf[pos3] = nbd;
        }

        points.push(Point2::new(x as f32, y as f32));

        x += NEIGHBORHOOD[s][0];
        y += NEIGHBORHOOD[s][1];

        if pos4 == pos && pos3 == pos1 {
            break;
        }

        pos3 = pos4;
        s = (s + 4) & 7;
    }

    points
}

/// Extract all boundary contours of a binary image (nonzero = foreground).
pub fn find_contours(src: &GrayImage) -> Vec<Contour> {
    let width = src.width;
    let height = src.height;
    let stride = width + 2;

    // Zero-padded working copy with pixels compressed to 0/1.
    let mut buf = vec![0i32; stride * (height + 2)];
    for y in 0..height {
        for x in 0..width {
            if src.data[y * width + x] != 0 {
                buf[(y + 1) * stride + x + 1] = 1;
            }
        }
    }

    let deltas = neighborhood_deltas(stride as i32);
    let mut contours = Vec::new();
    let mut nbd = 1;

    for y in 0..height {
        for x in 0..width {
            let pos = (y + 1) * stride + x + 1;
            let pix = buf[pos];
            if pix == 0 {
                continue;
            }

            let outer = pix == 1 && buf[pos - 1] == 0;
            let hole = !outer && pix >= 1 && buf[pos + 1] == 0;
            if !(outer || hole) {
                continue;
            }

            nbd += 1;
            let points = border_following(&mut buf, pos, nbd, x as i32, y as i32, hole, &deltas);
            contours.push(Contour { points, hole });
        }
    }

    contours
}

/// Only the external (non-hole) contours.
pub fn external_contours(src: &GrayImage) -> Vec<Contour> {
    find_contours(src).into_iter().filter(|c| !c.hole).collect()
}

// src/imgproc/mod.rs
//
// Minimal binary-image toolbox the segmenter is built on: thresholding,
// 3x3 morphology, reconstruction by dilation, connected components, Moore
// boundary tracing and a moments-based ellipse fit. Everything operates on
// ndarray grids indexed (row, col) = (y, x).

mod ellipse;
mod regions;

pub use ellipse::{fit_ellipse, major_axis_skew};
pub use regions::{connected_components, trace_boundary, Region};

use ndarray::Array2;

/// Foreground intensity grid; 0 means background.
pub type Gray = Array2<u8>;
/// Binary pixel mask.
pub type Mask = Array2<bool>;

pub fn threshold(img: &Gray, level: u8) -> Mask {
    img.map(|&v| v >= level && level > 0)
}

pub fn count(mask: &Mask) -> usize {
    mask.iter().filter(|&&v| v).count()
}

/// 3x3 cross erosion.
pub fn erode(mask: &Mask) -> Mask {
    let (h, w) = mask.dim();
    let mut out = Mask::from_elem((h, w), false);
    for y in 0..h {
        for x in 0..w {
            if !mask[(y, x)] {
                continue;
            }
            let up = y > 0 && mask[(y - 1, x)];
            let down = y + 1 < h && mask[(y + 1, x)];
            let left = x > 0 && mask[(y, x - 1)];
            let right = x + 1 < w && mask[(y, x + 1)];
            out[(y, x)] = up && down && left && right;
        }
    }
    out
}

/// 3x3 cross dilation.
pub fn dilate(mask: &Mask) -> Mask {
    let (h, w) = mask.dim();
    let mut out = mask.clone();
    for y in 0..h {
        for x in 0..w {
            if !mask[(y, x)] {
                continue;
            }
            if y > 0 {
                out[(y - 1, x)] = true;
            }
            if y + 1 < h {
                out[(y + 1, x)] = true;
            }
            if x > 0 {
                out[(y, x - 1)] = true;
            }
            if x + 1 < w {
                out[(y, x + 1)] = true;
            }
        }
    }
    out
}

pub fn open(mask: &Mask, iterations: usize) -> Mask {
    let mut m = mask.clone();
    for _ in 0..iterations {
        m = erode(&m);
    }
    for _ in 0..iterations {
        m = dilate(&m);
    }
    m
}

/// Morphological reconstruction by dilation: grow `seed` inside `limit`
/// until stable. The result is the union of `limit`'s connected components
/// that contain at least one seed pixel.
pub fn reconstruct(seed: &Mask, limit: &Mask) -> Mask {
    let (h, w) = limit.dim();
    let mut out = Mask::from_elem((h, w), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if seed[(y, x)] && limit[(y, x)] && !out[(y, x)] {
                out[(y, x)] = true;
                stack.push((y, x));
            }
        }
    }
    while let Some((y, x)) = stack.pop() {
        for (ny, nx) in neighbors8(y, x, h, w) {
            if limit[(ny, nx)] && !out[(ny, nx)] {
                out[(ny, nx)] = true;
                stack.push((ny, nx));
            }
        }
    }
    out
}

pub(crate) fn neighbors8(
    y: usize,
    x: usize,
    h: usize,
    w: usize,
) -> impl Iterator<Item = (usize, usize)> {
    const OFFS: [(i64, i64); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];
    OFFS.iter().filter_map(move |&(dy, dx)| {
        let ny = y as i64 + dy;
        let nx = x as i64 + dx;
        if ny >= 0 && (ny as usize) < h && nx >= 0 && (nx as usize) < w {
            Some((ny as usize, nx as usize))
        } else {
            None
        }
    })
}

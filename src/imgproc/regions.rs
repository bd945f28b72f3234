// src/imgproc/regions.rs
//
// Connected-component labeling (8-connectivity, BFS) and Moore-neighbor
// boundary tracing. Regions keep their pixel lists; everything downstream
// (ellipse fits, quadrant statistics, growth-race splits) works off those
// lists rather than re-scanning the full grid.

use super::Mask;
use crate::geometry::Point;

#[derive(Debug, Clone)]
pub struct Region {
    /// Pixels as (y, x) grid indices.
    pub pixels: Vec<(usize, usize)>,
}

impl Region {
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    pub fn centroid(&self) -> Point {
        if self.pixels.is_empty() {
            return Point::new(0.0, 0.0);
        }
        let n = self.pixels.len() as f32;
        let (sy, sx) = self
            .pixels
            .iter()
            .fold((0.0f32, 0.0f32), |(sy, sx), &(y, x)| {
                (sy + y as f32, sx + x as f32)
            });
        Point::new(sx / n, sy / n)
    }

    pub fn to_mask(&self, dims: (usize, usize)) -> Mask {
        let mut m = Mask::from_elem(dims, false);
        for &(y, x) in &self.pixels {
            m[(y, x)] = true;
        }
        m
    }

    /// Merge another region's pixels into this one.
    pub fn absorb(&mut self, other: Region) {
        self.pixels.extend(other.pixels);
    }
}

pub fn connected_components(mask: &Mask) -> Vec<Region> {
    let (h, w) = mask.dim();
    let mut visited = Mask::from_elem((h, w), false);
    let mut regions = Vec::new();
    let mut queue: Vec<(usize, usize)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !mask[(y, x)] || visited[(y, x)] {
                continue;
            }
            visited[(y, x)] = true;
            queue.push((y, x));
            let mut pixels = Vec::new();
            while let Some((cy, cx)) = queue.pop() {
                pixels.push((cy, cx));
                for (ny, nx) in super::neighbors8(cy, cx, h, w) {
                    if mask[(ny, nx)] && !visited[(ny, nx)] {
                        visited[(ny, nx)] = true;
                        queue.push((ny, nx));
                    }
                }
            }
            regions.push(Region { pixels });
        }
    }
    regions
}

/// Ordered outer boundary of a single connected region, via Moore-neighbor
/// tracing with Jacob's stopping criterion. Returns points in (x, y) image
/// coordinates. A 1-pixel region yields a single point.
pub fn trace_boundary(mask: &Mask) -> Vec<Point> {
    let (h, w) = mask.dim();

    // Uppermost-leftmost foreground pixel is the canonical start.
    let mut start = None;
    'scan: for y in 0..h {
        for x in 0..w {
            if mask[(y, x)] {
                start = Some((y, x));
                break 'scan;
            }
        }
    }
    let Some(start) = start else {
        return Vec::new();
    };

    // Clockwise Moore neighborhood beginning west.
    const DIRS: [(i64, i64); 8] = [
        (0, -1),
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
    ];
    let get = |y: i64, x: i64| -> bool {
        y >= 0 && (y as usize) < h && x >= 0 && (x as usize) < w && mask[(y as usize, x as usize)]
    };

    let mut boundary = vec![Point::new(start.1 as f32, start.0 as f32)];
    let mut current = start;
    // Backtrack direction: the scan pretends we entered start from the west.
    let mut backtrack = 0usize;
    let mut first_move: Option<((usize, usize), usize)> = None;

    loop {
        let mut found = None;
        for step in 1..=8 {
            let dir = (backtrack + step) % 8;
            let (dy, dx) = DIRS[dir];
            let ny = current.0 as i64 + dy;
            let nx = current.1 as i64 + dx;
            if get(ny, nx) {
                found = Some(((ny as usize, nx as usize), dir));
                break;
            }
        }
        let Some((next, dir)) = found else {
            // Isolated pixel.
            break;
        };

        // Jacob's criterion: stop on re-making the exact first move.
        match first_move {
            Some(fm) if fm == (next, dir) => break,
            None => first_move = Some((next, dir)),
            _ => {}
        }

        boundary.push(Point::new(next.1 as f32, next.0 as f32));
        backtrack = (dir + 4) % 8;
        current = next;

        if boundary.len() > 4 * (h * w) {
            // Degenerate mask; bail rather than loop forever.
            break;
        }
    }

    // Drop the duplicated closing point if present.
    if boundary.len() > 1 && boundary.last() == boundary.first() {
        boundary.pop();
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Mask {
        let h = rows.len();
        let w = rows[0].len();
        let mut m = Mask::from_elem((h, w), false);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                m[(y, x)] = c == '#';
            }
        }
        m
    }

    #[test]
    fn components_are_separated() {
        let m = mask_from(&["##...#", "##...#", "......"]);
        let mut regions = connected_components(&m);
        regions.sort_by_key(|r| std::cmp::Reverse(r.area()));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area(), 4);
        assert_eq!(regions[1].area(), 2);
    }

    #[test]
    fn diagonal_pixels_connect() {
        let m = mask_from(&["#..", ".#.", "..#"]);
        assert_eq!(connected_components(&m).len(), 1);
    }

    #[test]
    fn boundary_of_square_is_its_border() {
        let m = mask_from(&["....", ".##.", ".##.", "...."]);
        let b = trace_boundary(&m);
        assert_eq!(b.len(), 4);
        for p in &b {
            assert!(p.x >= 1.0 && p.x <= 2.0 && p.y >= 1.0 && p.y <= 2.0);
        }
    }

    #[test]
    fn boundary_of_single_pixel() {
        let m = mask_from(&["...", ".#.", "..."]);
        let b = trace_boundary(&m);
        assert_eq!(b, vec![Point::new(1.0, 1.0)]);
    }

    #[test]
    fn boundary_excludes_interior() {
        let m = mask_from(&["#####", "#####", "#####"]);
        let b = trace_boundary(&m);
        assert!(b.iter().all(|p| {
            p.x == 0.0 || p.x == 4.0 || p.y == 0.0 || p.y == 2.0
        }));
        assert!(b.len() >= 10);
    }
}

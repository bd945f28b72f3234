// src/tracking/fly.rs
//
// Per-frame, per-blob descriptor. A Fly is assembled once from a body
// region and its wing-only pixels and never mutated afterwards; identity
// and heading corrections happen later on the columnar series, not here.
//
// Wing geometry is expressed in the body frame: u along the fitted major
// axis in the `orientation` direction ("front" until heading resolution
// says otherwise), v perpendicular to it ("left" by convention). The four
// quadrants are front/rear x left/right in that frame.

use crate::error::StoreError;
use crate::geometry::{EllipseFit, Point};
use crate::imgproc::{self, Gray, Mask, Region};
use crate::store::{
    ContourHandle, ContourLog, HistogramHandle, HistogramLog, HISTOGRAM_BINS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    FrontLeft = 0,
    FrontRight = 1,
    RearLeft = 2,
    RearRight = 3,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WingQuadrant {
    /// Wing pixel count in this quadrant.
    pub area: f32,
    /// Mean angle between a wing pixel and the rear midline, radians.
    /// A folded wing sits near 0; full extension approaches PI/2.
    pub mean_angle: f32,
    /// Wing pixel farthest from the body centroid.
    pub tip: Point,
}

#[derive(Debug, Clone)]
pub struct Fly {
    pub body: EllipseFit,
    pub wing: EllipseFit,
    pub quadrants: [WingQuadrant; 4],
    /// Front-vs-rear body brightness asymmetry, positive when the front
    /// half (current facing) is brighter.
    pub color_cue: f32,
    /// Body mass asymmetry along the major axis. The abdomen is the long
    /// tapering end, so a correctly-facing fly skews negative; the cue is
    /// sign-flipped so that positive supports the current facing.
    pub shape_cue: f32,
    /// Wing placement asymmetry, positive when wing pixels sit behind the
    /// body (consistent with the current facing).
    pub wing_cue: f32,
    pub body_split: bool,
    pub body_contour: ContourHandle,
    pub wing_contour: ContourHandle,
    pub histogram: HistogramHandle,
}

impl Fly {
    /// Build a Fly from a body region and the wing pixels that are not
    /// body. Contours and the body histogram go straight to the append
    /// logs; the returned boundary points are for the occlusion carry of
    /// the next frame only.
    pub fn from_regions(
        body: &Region,
        wing_only: &[(usize, usize)],
        intensity: &Gray,
        dims: (usize, usize),
        body_split: bool,
        contours: &mut ContourLog,
        histograms: &mut HistogramLog,
    ) -> Result<(Fly, Vec<Point>), StoreError> {
        let body_fit = imgproc::fit_ellipse(&body.pixels);
        let wing_fit = if wing_only.is_empty() {
            EllipseFit::empty()
        } else {
            imgproc::fit_ellipse(wing_only)
        };

        let u_dir = body_fit.axis_direction();
        let v_dir = crate::geometry::Vector::new(-u_dir.y, u_dir.x);

        // Quadrant accumulation over wing-only pixels.
        let mut areas = [0usize; 4];
        let mut angle_sums = [0.0f64; 4];
        let mut tips = [Point::new(0.0, 0.0); 4];
        let mut tip_dist = [-1.0f32; 4];
        for &(y, x) in wing_only {
            let dx = x as f32 - body_fit.centroid.x;
            let dy = y as f32 - body_fit.centroid.y;
            let u = dx * u_dir.x + dy * u_dir.y;
            let v = dx * v_dir.x + dy * v_dir.y;
            let q = match (u >= 0.0, v >= 0.0) {
                (true, true) => Quadrant::FrontLeft,
                (true, false) => Quadrant::FrontRight,
                (false, true) => Quadrant::RearLeft,
                (false, false) => Quadrant::RearRight,
            } as usize;
            areas[q] += 1;
            angle_sums[q] += v.abs().atan2(-u) as f64;
            let d = (dx * dx + dy * dy).sqrt();
            if d > tip_dist[q] {
                tip_dist[q] = d;
                tips[q] = Point::new(x as f32, y as f32);
            }
        }
        let mut quadrants = [WingQuadrant::default(); 4];
        for q in 0..4 {
            quadrants[q] = WingQuadrant {
                area: areas[q] as f32,
                mean_angle: if areas[q] > 0 {
                    (angle_sums[q] / areas[q] as f64) as f32
                } else {
                    0.0
                },
                tip: if areas[q] > 0 { tips[q] } else { body_fit.centroid },
            };
        }

        // Heading cues.
        let (mut front_sum, mut front_n, mut rear_sum, mut rear_n) = (0.0f64, 0usize, 0.0f64, 0usize);
        let mut histogram = [0u32; HISTOGRAM_BINS];
        for &(y, x) in &body.pixels {
            let value = intensity[(y, x)];
            histogram[(value as usize * HISTOGRAM_BINS) / 256] += 1;
            let dx = x as f32 - body_fit.centroid.x;
            let dy = y as f32 - body_fit.centroid.y;
            let u = dx * u_dir.x + dy * u_dir.y;
            if u >= 0.0 {
                front_sum += value as f64;
                front_n += 1;
            } else {
                rear_sum += value as f64;
                rear_n += 1;
            }
        }
        let front_mean = if front_n > 0 { front_sum / front_n as f64 } else { 0.0 };
        let rear_mean = if rear_n > 0 { rear_sum / rear_n as f64 } else { 0.0 };
        let color_cue = if front_mean + rear_mean > 0.0 {
            ((front_mean - rear_mean) / (front_mean + rear_mean)) as f32
        } else {
            0.0
        };

        let shape_cue = -imgproc::major_axis_skew(&body.pixels, &body_fit);

        let front_wing = quadrants[Quadrant::FrontLeft as usize].area
            + quadrants[Quadrant::FrontRight as usize].area;
        let rear_wing = quadrants[Quadrant::RearLeft as usize].area
            + quadrants[Quadrant::RearRight as usize].area;
        let wing_cue = if front_wing + rear_wing > 0.0 {
            (rear_wing - front_wing) / (rear_wing + front_wing)
        } else {
            0.0
        };

        // Persist contours; the frame only keeps handles.
        let body_boundary = imgproc::trace_boundary(&body.to_mask(dims));
        let body_contour = contours.append(&[body_boundary.clone()])?;
        let wing_contour = if wing_only.is_empty() {
            ContourHandle::EMPTY
        } else {
            let mut wing_mask = Mask::from_elem(dims, false);
            for &(y, x) in wing_only {
                wing_mask[(y, x)] = true;
            }
            for &(y, x) in &body.pixels {
                wing_mask[(y, x)] = true;
            }
            contours.append(&[imgproc::trace_boundary(&wing_mask)])?
        };
        let histogram_handle = histograms.append(&histogram)?;

        Ok((
            Fly {
                body: body_fit,
                wing: wing_fit,
                quadrants,
                color_cue,
                shape_cue,
                wing_cue,
                body_split,
                body_contour,
                wing_contour,
                histogram: histogram_handle,
            },
            body_boundary,
        ))
    }

    pub fn quadrant(&self, q: Quadrant) -> &WingQuadrant {
        &self.quadrants[q as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imgproc::Gray;

    fn setup_logs(dir: &std::path::Path) -> (ContourLog, HistogramLog) {
        (
            ContourLog::create(&dir.join("c.bin")).unwrap(),
            HistogramLog::create(&dir.join("h.bin")).unwrap(),
        )
    }

    #[test]
    fn wing_cue_points_rearward() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = setup_logs(dir.path());

        // Horizontal body bar centered at x=20, wings trailing to the left
        // (negative u if orientation points +x).
        let mut body_pixels = Vec::new();
        for y in 18..23 {
            for x in 12..29 {
                body_pixels.push((y, x));
            }
        }
        let body = Region { pixels: body_pixels };
        let mut wing_only = Vec::new();
        for y in 16..25 {
            for x in 2..12 {
                wing_only.push((y, x));
            }
        }
        let intensity = Gray::from_elem((40, 40), 100);

        let (fly, boundary) = Fly::from_regions(
            &body,
            &wing_only,
            &intensity,
            (40, 40),
            false,
            &mut contours,
            &mut histograms,
        )
        .unwrap();

        assert!(!boundary.is_empty());
        // Orientation of a horizontal bar is along +-x; whichever direction
        // the fit picked, all wing pixels sit on one u side, so the cue
        // magnitude must be strong.
        assert!(fly.wing_cue.abs() > 0.9, "wing cue = {}", fly.wing_cue);
        assert!(fly.body.semi_major > fly.body.semi_minor);
    }

    #[test]
    fn histogram_counts_body_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = setup_logs(dir.path());

        let body = Region {
            pixels: vec![(5, 5), (5, 6), (6, 5), (6, 6)],
        };
        let mut intensity = Gray::from_elem((10, 10), 0);
        for &(y, x) in &body.pixels {
            intensity[(y, x)] = 200;
        }

        let (fly, _) = Fly::from_regions(
            &body,
            &[],
            &intensity,
            (10, 10),
            false,
            &mut contours,
            &mut histograms,
        )
        .unwrap();

        assert_eq!(fly.wing_contour, ContourHandle::EMPTY);
        contours.finish().unwrap();
        histograms.finish().unwrap();

        let mut reader = crate::store::HistogramReader::open(&dir.path().join("h.bin")).unwrap();
        let bins = reader.read(fly.histogram).unwrap();
        assert_eq!(bins[(200 * HISTOGRAM_BINS) / 256], 4);
        assert_eq!(bins.iter().sum::<u32>(), 4);
    }
}

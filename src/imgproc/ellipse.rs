// src/imgproc/ellipse.rs
//
// Moments-based ellipse fit for pixel regions. Second central moments give
// centroid, orientation and axis lengths; the normalized third moment along
// the major axis is kept separately as a body-shape asymmetry cue (a fly's
// abdomen end is heavier than the head end).

use crate::geometry::{EllipseFit, Point};

/// Fit an ellipse to a pixel region via its image moments.
///
/// Semi-axis lengths follow the usual 2-sigma convention, so a solid
/// elliptical region roughly reproduces its own outline. Degenerate
/// regions (< 3 pixels) collapse to a point fit.
pub fn fit_ellipse(pixels: &[(usize, usize)]) -> EllipseFit {
    let n = pixels.len();
    if n == 0 {
        return EllipseFit::empty();
    }

    let nf = n as f32;
    let (mut sx, mut sy) = (0.0f64, 0.0f64);
    for &(y, x) in pixels {
        sx += x as f64;
        sy += y as f64;
    }
    let cx = (sx / n as f64) as f32;
    let cy = (sy / n as f64) as f32;

    if n < 3 {
        return EllipseFit {
            centroid: Point::new(cx, cy),
            semi_major: 0.5,
            semi_minor: 0.5,
            orientation: 0.0,
            area: nf,
        };
    }

    let (mut mxx, mut myy, mut mxy) = (0.0f64, 0.0f64, 0.0f64);
    for &(y, x) in pixels {
        let dx = x as f64 - cx as f64;
        let dy = y as f64 - cy as f64;
        mxx += dx * dx;
        myy += dy * dy;
        mxy += dx * dy;
    }
    // 1/12 term corrects for pixel quantization of unit squares.
    let cxx = mxx / n as f64 + 1.0 / 12.0;
    let cyy = myy / n as f64 + 1.0 / 12.0;
    let cxy = mxy / n as f64;

    let trace_half = (cxx + cyy) / 2.0;
    let delta = (((cxx - cyy) / 2.0).powi(2) + cxy * cxy).sqrt();
    let lambda_major = (trace_half + delta).max(0.0);
    let lambda_minor = (trace_half - delta).max(0.0);

    let orientation = 0.5 * (2.0 * cxy).atan2(cxx - cyy);

    EllipseFit {
        centroid: Point::new(cx, cy),
        semi_major: 2.0 * (lambda_major.sqrt() as f32),
        semi_minor: 2.0 * (lambda_minor.sqrt() as f32),
        orientation: crate::geometry::wrap_angle(orientation as f32),
        area: nf,
    }
}

/// Normalized third central moment of the region projected onto the fitted
/// major axis. Positive skew means the long tail points along the fit's
/// `orientation` direction.
pub fn major_axis_skew(pixels: &[(usize, usize)], fit: &EllipseFit) -> f32 {
    if pixels.len() < 3 {
        return 0.0;
    }
    let dir = fit.axis_direction();
    let n = pixels.len() as f64;
    let mut m2 = 0.0f64;
    let mut m3 = 0.0f64;
    for &(y, x) in pixels {
        let u = (x as f32 - fit.centroid.x) * dir.x + (y as f32 - fit.centroid.y) * dir.y;
        let u = u as f64;
        m2 += u * u;
        m3 += u * u * u;
    }
    m2 /= n;
    m3 /= n;
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    (m3 / m2.powf(1.5)).clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn disk(cx: i64, cy: i64, r: i64) -> Vec<(usize, usize)> {
        let mut px = Vec::new();
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    px.push((y as usize, x as usize));
                }
            }
        }
        px
    }

    fn bar(cx: i64, cy: i64, half_len: i64, half_wid: i64) -> Vec<(usize, usize)> {
        let mut px = Vec::new();
        for y in cy - half_wid..=cy + half_wid {
            for x in cx - half_len..=cx + half_len {
                px.push((y as usize, x as usize));
            }
        }
        px
    }

    #[test]
    fn disk_fit_is_round_and_centered() {
        let fit = fit_ellipse(&disk(20, 15, 6));
        assert_relative_eq!(fit.centroid.x, 20.0, epsilon = 0.01);
        assert_relative_eq!(fit.centroid.y, 15.0, epsilon = 0.01);
        assert!((fit.semi_major - fit.semi_minor).abs() < 0.3);
        assert!(fit.eccentricity() < 0.35);
    }

    #[test]
    fn horizontal_bar_is_oriented_along_x() {
        let fit = fit_ellipse(&bar(30, 10, 12, 2));
        assert!(fit.orientation.abs() < 0.05 || (fit.orientation.abs() - std::f32::consts::PI).abs() < 0.05);
        assert!(fit.semi_major > 2.0 * fit.semi_minor);
        assert!(fit.eccentricity() > 0.8);
    }

    #[test]
    fn skew_flags_asymmetric_regions() {
        // Pear shape: disk plus a tail to the right.
        let mut px = disk(10, 10, 5);
        for x in 15..26 {
            px.push((10, x));
            px.push((9, x));
        }
        let fit = fit_ellipse(&px);
        let skew = major_axis_skew(&px, &fit);
        assert!(skew.abs() > 0.1, "tail must produce measurable skew");

        let sym = disk(10, 10, 5);
        let fit2 = fit_ellipse(&sym);
        assert!(major_axis_skew(&sym, &fit2).abs() < 0.05);
    }
}

// src/geometry.rs

use nalgebra::{Point2, Vector2};

pub type Point = Point2<f32>;
pub type Vector = Vector2<f32>;

/// Ellipse fitted to a pixel region via image moments.
///
/// `orientation` is the angle of the major axis in radians, measured in
/// image coordinates (x right, y down) and wrapped to (-PI, PI]. For a body
/// fit the direction along the major axis that counts as "front" is decided
/// later by heading resolution; until then the sign of `orientation` is
/// only consistent within a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFit {
    pub centroid: Point,
    pub semi_major: f32,
    pub semi_minor: f32,
    pub orientation: f32,
    /// Pixel count of the source region, not the analytic ellipse area.
    pub area: f32,
}

impl EllipseFit {
    pub fn empty() -> Self {
        Self {
            centroid: Point::new(0.0, 0.0),
            semi_major: 0.0,
            semi_minor: 0.0,
            orientation: 0.0,
            area: 0.0,
        }
    }

    pub fn eccentricity(&self) -> f32 {
        if self.semi_major <= f32::EPSILON {
            return 0.0;
        }
        let ratio = (self.semi_minor / self.semi_major).clamp(0.0, 1.0);
        (1.0 - ratio * ratio).sqrt()
    }

    /// Unit vector along the major axis in the `orientation` direction.
    pub fn axis_direction(&self) -> Vector {
        Vector::new(self.orientation.cos(), self.orientation.sin())
    }
}

/// Wrap an angle to (-PI, PI].
pub fn wrap_angle(a: f32) -> f32 {
    let mut a = a % (2.0 * std::f32::consts::PI);
    if a <= -std::f32::consts::PI {
        a += 2.0 * std::f32::consts::PI;
    } else if a > std::f32::consts::PI {
        a -= 2.0 * std::f32::consts::PI;
    }
    a
}

/// Smallest signed difference a - b, wrapped to (-PI, PI].
pub fn angle_difference(a: f32, b: f32) -> f32 {
    wrap_angle(a - b)
}

pub fn distance(a: Point, b: Point) -> f32 {
    (a - b).norm()
}

/// Does the ray `origin + t * dir` (t >= 0) hit the ellipse?
///
/// The ray is transformed into the ellipse frame where the ellipse becomes
/// the unit circle, then the standard quadratic is solved.
pub fn ray_intersects_ellipse(origin: Point, dir: Vector, ellipse: &EllipseFit) -> bool {
    if ellipse.semi_major <= f32::EPSILON || ellipse.semi_minor <= f32::EPSILON {
        return false;
    }
    let (sin, cos) = ellipse.orientation.sin_cos();
    let rel = origin - ellipse.centroid;

    // Rotate by -orientation, scale axes to unit.
    let ox = (rel.x * cos + rel.y * sin) / ellipse.semi_major;
    let oy = (-rel.x * sin + rel.y * cos) / ellipse.semi_minor;
    let dx = (dir.x * cos + dir.y * sin) / ellipse.semi_major;
    let dy = (-dir.x * sin + dir.y * cos) / ellipse.semi_minor;

    let a = dx * dx + dy * dy;
    let b = 2.0 * (ox * dx + oy * dy);
    let c = ox * ox + oy * oy - 1.0;

    if c <= 0.0 {
        // Origin inside the ellipse.
        return true;
    }
    if a <= f32::EPSILON {
        return false;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return false;
    }
    // Nearest intersection must lie forward along the ray.
    (-b + disc.sqrt()) / (2.0 * a) >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wrap_angle_stays_in_range() {
        assert_relative_eq!(wrap_angle(3.0 * std::f32::consts::PI), std::f32::consts::PI);
        assert_relative_eq!(wrap_angle(-3.0 * std::f32::consts::PI), std::f32::consts::PI);
        assert_relative_eq!(wrap_angle(0.5), 0.5);
    }

    #[test]
    fn angle_difference_is_shortest_path() {
        let d = angle_difference(3.0, -3.0);
        assert!(d < 0.0, "wrapping should pick the short way around");
        assert!(d.abs() < 1.0);
    }

    #[test]
    fn ray_hits_centered_circle() {
        let e = EllipseFit {
            centroid: Point::new(10.0, 0.0),
            semi_major: 2.0,
            semi_minor: 2.0,
            orientation: 0.0,
            area: 12.0,
        };
        assert!(ray_intersects_ellipse(
            Point::new(0.0, 0.0),
            Vector::new(1.0, 0.0),
            &e
        ));
        // Pointing away.
        assert!(!ray_intersects_ellipse(
            Point::new(0.0, 0.0),
            Vector::new(-1.0, 0.0),
            &e
        ));
        // Parallel miss.
        assert!(!ray_intersects_ellipse(
            Point::new(0.0, 5.0),
            Vector::new(1.0, 0.0),
            &e
        ));
    }

    #[test]
    fn ray_respects_ellipse_orientation() {
        // Narrow ellipse rotated 90 degrees: tall, not wide.
        let e = EllipseFit {
            centroid: Point::new(10.0, 0.0),
            semi_major: 4.0,
            semi_minor: 0.5,
            orientation: std::f32::consts::FRAC_PI_2,
            area: 6.0,
        };
        assert!(ray_intersects_ellipse(
            Point::new(0.0, 3.0),
            Vector::new(1.0, 0.0),
            &e
        ));
        assert!(!ray_intersects_ellipse(
            Point::new(0.0, 3.0),
            Vector::new(0.0, 1.0),
            &e
        ));
    }
}

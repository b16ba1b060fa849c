use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }

    /// Point at `fraction` of the way from `self` to `end`.
    pub fn lerp(self, end: Point, fraction: f64) -> Point {
        Point::new(
            self.x + (end.x - self.x) * fraction,
            self.y + (end.y - self.y) * fraction,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub max: Point,
    pub min: Point,
}

impl BoundingBox {
    pub fn contains(&self, t: Point) -> bool {
        t.x >= self.min.x && t.x <= self.max.x && t.y >= self.min.y && t.y <= self.max.y
    }
}

/// Rotates `p` around `pivot`. Positive angles turn clockwise on screen,
/// since screen space has y pointing down.
pub fn rotate_point(p: Point, pivot: Point, radians: f64) -> Point {
    let dx = p.x - pivot.x;
    let dy = p.y - pivot.y;
    let (sin, cos) = radians.sin_cos();
    Point::new(
        pivot.x + dx * cos - dy * sin,
        pivot.y + dx * sin + dy * cos,
    )
}

pub fn bounding_box(p1: Point, p2: Point) -> BoundingBox {
    let (max_x, min_x) = if p1.x > p2.x { (p1.x, p2.x) } else { (p2.x, p1.x) };
    let (max_y, min_y) = if p1.y > p2.y { (p1.y, p2.y) } else { (p2.y, p1.y) };
    BoundingBox {
        max: Point::new(max_x, max_y),
        min: Point::new(min_x, min_y),
    }
}

pub fn point_in_box(p1: Point, p2: Point, t: Point) -> bool {
    bounding_box(p1, p2).contains(t)
}

/// Distance test against the infinite line through `p1` and `p2`. The
/// projection is not clamped to the segment; pair it with [`point_in_box`]
/// to bound it.
pub fn point_near_segment(p1: Point, p2: Point, t: Point, tolerance: f64) -> bool {
    let Some((ux, uy, _)) = unit_direction(p1, p2) else {
        return p1.distance(t) <= tolerance;
    };

    let lambda = (t.x - p1.x) * ux + (t.y - p1.y) * uy;
    let foot = Point::new(p1.x + lambda * ux, p1.y + lambda * uy);
    foot.distance(t) <= tolerance
}

/// Position of `t` projected onto `p1 -> p2`, as a fraction of the segment
/// length. Unclamped; zero for a degenerate segment.
pub fn projection_fraction(p1: Point, p2: Point, t: Point) -> f64 {
    let Some((ux, uy, len)) = unit_direction(p1, p2) else {
        return 0.0;
    };
    ((t.x - p1.x) * ux + (t.y - p1.y) * uy) / len
}

fn unit_direction(p1: Point, p2: Point) -> Option<(f64, f64, f64)> {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let len = dx.hypot(dy);
    if len <= f64::EPSILON {
        return None;
    }
    Some((dx / len, dy / len, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn quarter_turn_moves_up_vector_to_the_right() {
        let pivot = Point::new(10.0, 10.0);
        let rotated = rotate_point(Point::new(10.0, 0.0), pivot, std::f64::consts::FRAC_PI_2);
        assert!(close(rotated, Point::new(20.0, 10.0)), "got {rotated:?}");
    }

    #[test]
    fn bounding_box_orders_each_axis_independently() {
        let bbox = bounding_box(Point::new(5.0, -2.0), Point::new(1.0, 7.0));
        assert_eq!(bbox.max, Point::new(5.0, 7.0));
        assert_eq!(bbox.min, Point::new(1.0, -2.0));
    }

    #[test]
    fn box_is_closed_on_both_axes() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(4.0, 3.0);
        assert!(point_in_box(p1, p2, Point::new(4.0, 0.0)));
        assert!(point_in_box(p1, p2, Point::new(0.0, 3.0)));
        assert!(!point_in_box(p1, p2, Point::new(4.0 + EPS, 1.0)));
    }

    #[test]
    fn midpoint_is_on_segment_with_zero_tolerance() {
        let p1 = Point::new(3.0, 9.0);
        let p2 = Point::new(-12.0, 41.0);
        let mid = p1.lerp(p2, 0.5);
        assert!(point_near_segment(p1, p2, mid, 1e-9));
    }

    #[test]
    fn point_just_beyond_tolerance_is_rejected() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(100.0, 100.0);
        let tolerance = 10.0;
        // Perpendicular offset from the midpoint, still inside the box.
        let offset = (tolerance + 0.01) / 2f64.sqrt();
        let t = Point::new(50.0 + offset, 50.0 - offset);
        assert!(point_in_box(p1, p2, t));
        assert!(!point_near_segment(p1, p2, t, tolerance));
        let inside = Point::new(50.0 + 7.0, 50.0 - 7.0);
        assert!(point_near_segment(p1, p2, inside, tolerance));
    }

    #[test]
    fn degenerate_segment_falls_back_to_point_distance() {
        let p = Point::new(2.0, 2.0);
        assert!(point_near_segment(p, p, Point::new(2.0, 5.0), 3.0));
        assert!(!point_near_segment(p, p, Point::new(2.0, 5.1), 3.0));
        assert_eq!(projection_fraction(p, p, Point::new(9.0, 9.0)), 0.0);
    }

    #[test]
    fn projection_fraction_tracks_position_along_segment() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(0.0, -200.0);
        let fraction = projection_fraction(p1, p2, Point::new(3.0, -50.0));
        assert!((fraction - 0.25).abs() < EPS);
    }

    proptest::proptest! {
        #[test]
        fn rotation_is_undone_by_inverse_rotation(
            px in -1000.0f64..1000.0,
            py in -1000.0f64..1000.0,
            cx in -1000.0f64..1000.0,
            cy in -1000.0f64..1000.0,
            rand in 0.0f64..1.0,
        ) {
            let mut angle = (30.0 + rand * 30.0).to_radians();
            if rand < 0.5 {
                angle = -angle;
            }
            let p = Point::new(px, py);
            let pivot = Point::new(cx, cy);
            let back = rotate_point(rotate_point(p, pivot, angle), pivot, -angle);
            prop_assert!(close(back, p));
        }

        #[test]
        fn box_test_is_symmetric_and_contains_endpoints(
            ax in -500.0f64..500.0,
            ay in -500.0f64..500.0,
            bx in -500.0f64..500.0,
            by in -500.0f64..500.0,
            tx in -500.0f64..500.0,
            ty in -500.0f64..500.0,
        ) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            let t = Point::new(tx, ty);
            prop_assert!(point_in_box(a, b, t) == point_in_box(b, a, t));
            prop_assert!(point_in_box(a, b, a));
            prop_assert!(point_in_box(a, b, b));
        }
    }
}

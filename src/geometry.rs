use imageproc::point::Point;

use crate::types::Size;

/// Four points bounding a candidate document, in no particular order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quadrilateral {
    pub points: [Point<f32>; 4],
}

/// The corners of a [`Quadrilateral`] after ordering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrderedCorners {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Quadrilateral {
    pub fn new(points: [Point<f32>; 4]) -> Self {
        Self { points }
    }

    /// Orders the corners by coordinate sums and differences: the top-left
    /// corner has the smallest `x + y`, the bottom-right the largest, the
    /// top-right the smallest `y - x` and the bottom-left the largest. Ties go
    /// to the earliest point.
    pub fn order_corners(&self) -> OrderedCorners {
        let sum = |p: &Point<f32>| p.x + p.y;
        let diff = |p: &Point<f32>| p.y - p.x;

        OrderedCorners {
            top_left: self.extreme_by(sum, |a, b| a < b),
            top_right: self.extreme_by(diff, |a, b| a < b),
            bottom_right: self.extreme_by(sum, |a, b| a > b),
            bottom_left: self.extreme_by(diff, |a, b| a > b),
        }
    }

    fn extreme_by(
        &self,
        key: impl Fn(&Point<f32>) -> f32,
        better: impl Fn(f32, f32) -> bool,
    ) -> Point<f32> {
        let mut best = self.points[0];
        for point in &self.points[1..] {
            if better(key(point), key(&best)) {
                best = *point;
            }
        }
        best
    }
}

impl OrderedCorners {
    /// Corners as `(x, y)` pairs in top-left, top-right, bottom-right,
    /// bottom-left order.
    pub fn as_control_points(&self) -> [(f32, f32); 4] {
        [
            (self.top_left.x, self.top_left.y),
            (self.top_right.x, self.top_right.y),
            (self.bottom_right.x, self.bottom_right.y),
            (self.bottom_left.x, self.bottom_left.y),
        ]
    }

    /// Size of the canvas a rectified view of these corners is drawn on: the
    /// longer of each pair of opposing edges, truncated to whole pixels.
    pub fn canvas_size(&self) -> Size<u32> {
        let bottom = distance_from_point_to_point(&self.bottom_right, &self.bottom_left);
        let top = distance_from_point_to_point(&self.top_right, &self.top_left);
        let right = distance_from_point_to_point(&self.top_right, &self.bottom_right);
        let left = distance_from_point_to_point(&self.top_left, &self.bottom_left);

        Size {
            width: (bottom as u32).max(top as u32),
            height: (right as u32).max(left as u32),
        }
    }
}

pub fn distance_from_point_to_point(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}

/// Area enclosed by a closed polygon, by the shoelace formula.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| f64::from(a.x) * f64::from(b.y) - f64::from(b.x) * f64::from(a.y))
        .sum::<f64>();
    twice_area.abs() / 2.0
}

/// Simplifies a closed contour with the Douglas-Peucker algorithm, keeping
/// only vertices further than `epsilon` from the simplified outline.
///
/// The contour is split at its first point and the point furthest from it,
/// and each half is simplified as an open curve.
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let start = points[0];
    let (split, _) = points
        .iter()
        .enumerate()
        .fold((0, 0.0), |(best, best_distance), (i, p)| {
            let distance = point_distance(&start, p);
            if distance > best_distance {
                (i, distance)
            } else {
                (best, best_distance)
            }
        });
    if split == 0 {
        return vec![start];
    }

    let mut second_half = points[split..].to_vec();
    second_half.push(start);

    let mut out = approximate_open_curve(&points[..=split], epsilon);
    out.pop();
    out.extend(approximate_open_curve(&second_half, epsilon));
    out.pop();
    out
}

fn approximate_open_curve(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut spans = vec![(0, last)];
    while let Some((first, last)) = spans.pop() {
        if last <= first + 1 {
            continue;
        }
        let (index, distance) = (first + 1..last)
            .map(|i| (i, distance_to_line(&points[i], &points[first], &points[last])))
            .fold((first, 0.0), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });
        if distance > epsilon {
            keep[index] = true;
            spans.push((first, index));
            spans.push((index, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}

fn point_distance(a: &Point<i32>, b: &Point<i32>) -> f64 {
    f64::from(a.x - b.x).hypot(f64::from(a.y - b.y))
}

/// Distance from `p` to the line through `a` and `b`, or to `a` if they
/// coincide.
fn distance_to_line(p: &Point<i32>, a: &Point<i32>, b: &Point<i32>) -> f64 {
    let length = point_distance(a, b);
    if length == 0.0 {
        return point_distance(p, a);
    }
    let cross = f64::from(b.x - a.x) * f64::from(a.y - p.y)
        - f64::from(a.x - p.x) * f64::from(b.y - a.y);
    cross.abs() / length
}

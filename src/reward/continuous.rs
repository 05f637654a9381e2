//! Predefined reward functions over continuous relevant sub-states.

use log::warn;
use ndarray::prelude::*;

const TOLERANCE: f64 = 1e-13;

pub(crate) fn euclidean_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Distance moved towards the target between two consecutive relevant
/// states. Positive when the new state is closer.
pub fn move_to_point_delta(
    old_relevant: &Array1<f64>,
    new_relevant: &Array1<f64>,
    target: &Array1<f64>,
) -> f64 {
    euclidean_norm(&(old_relevant - target)) - euclidean_norm(&(new_relevant - target))
}

/// Whether a relevant state lies within `radius` of the target.
pub fn within_target_radius(
    relevant: &Array1<f64>,
    target: &Array1<f64>,
    radius: f64,
) -> bool {
    euclidean_norm(&(relevant - target)) < radius
}

/// Total perpendicular deviation of the window points from their best-fit
/// line.
///
/// The line runs through the centroid of the window along the first right
/// singular vector of the centred window matrix, obtained by power
/// iteration on the window's Gram matrix. Rows are window points, columns
/// relevant coordinates.
pub fn line_deviation(points: &Array2<f64>) -> f64 {
    let mean = match points.mean_axis(Axis(0)) {
        Some(mean) => mean,
        None => return 0.0,
    };
    let mut centred = points.to_owned();
    for mut row in centred.rows_mut() {
        row -= &mean;
    }
    let direction = principal_direction(&centred);
    let start = &mean - &direction;
    let end = &mean + &direction;

    points
        .rows()
        .into_iter()
        .map(|point| point_line_distance(&point.to_owned(), &start, &end))
        .sum()
}

/// Shortest distance of a point from the line through `a` and `b`.
pub fn point_line_distance(point: &Array1<f64>, a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let line = a - b;
    let to_point = a - point;
    let line_norm = euclidean_norm(&line);
    if line_norm < TOLERANCE {
        return 0.0;
    }
    let projection = line.dot(&to_point) / line_norm;
    let mut squared_distance = to_point.dot(&to_point) - projection * projection;
    if squared_distance < 0.0 {
        if squared_distance < -TOLERANCE {
            warn!(
                "Squared point-line distance fell below the tolerance: {}",
                squared_distance
            );
        }
        squared_distance = 0.0;
    }
    squared_distance.sqrt()
}

/// Dominant right singular vector of `centred`, via power iteration on the
/// Gram matrix. Returns the zero vector for a degenerate window.
fn principal_direction(centred: &Array2<f64>) -> Array1<f64> {
    let gram = centred.t().dot(centred);
    let dim = gram.shape()[0];
    // A deterministic start with a small per-coordinate tilt, to avoid
    // starting orthogonal to the dominant direction.
    let mut direction = Array1::from_shape_fn(dim, |i| 1.0 + 0.1 * i as f64);
    let start_norm = euclidean_norm(&direction);
    direction = direction / start_norm;
    for _ in 0..100 {
        let next = gram.dot(&direction);
        let norm = euclidean_norm(&next);
        if norm < TOLERANCE {
            return Array1::zeros(dim);
        }
        let next = next / norm;
        let aligned = direction.dot(&next).abs();
        direction = next;
        if aligned > 1.0 - 1e-14 {
            break;
        }
    }
    direction
}

use crate::core::chunked::ChunkedArray;
use crate::core::coords::{Coordinate, DataArray};
use crate::types::{SarError, SarResult};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interpolation used to fill grid nodes from scattered samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridMethod {
    /// Barycentric interpolation inside a Delaunay triangulation of the
    /// samples. Nodes outside the convex hull are NaN.
    #[default]
    Linear,
    /// Value of the closest sample
    Nearest,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: usize,
    v1: usize,
    v2: usize,
}

impl Triangle {
    fn edges(&self) -> [(usize, usize); 3] {
        [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)]
    }
}

/// Circumcentre and squared radius, None for degenerate triangles
fn circumcircle(a: &Sample, b: &Sample, c: &Sample) -> Option<(f64, f64, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }

    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    Some((ux, uy, (a.x - ux).powi(2) + (a.y - uy).powi(2)))
}

/// Barycentric weights of `(px, py)` in triangle `(p0, p1, p2)`
fn barycentric(px: f64, py: f64, p0: &Sample, p1: &Sample, p2: &Sample) -> (f64, f64, f64) {
    let (v0x, v0y) = (p1.x - p0.x, p1.y - p0.y);
    let (v1x, v1y) = (p2.x - p0.x, p2.y - p0.y);
    let (v2x, v2y) = (px - p0.x, py - p0.y);

    let dot00 = v0x * v0x + v0y * v0y;
    let dot01 = v0x * v1x + v0y * v1y;
    let dot02 = v0x * v2x + v0y * v2y;
    let dot11 = v1x * v1x + v1y * v1y;
    let dot12 = v1x * v2x + v1y * v2y;

    let inv_denom = 1.0 / (dot00 * dot11 - dot01 * dot01);
    let v = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let w = (dot00 * dot12 - dot01 * dot02) * inv_denom;
    (1.0 - v - w, v, w)
}

/// Bowyer-Watson Delaunay triangulation. Triangle vertices index `samples`.
fn delaunay(samples: &[Sample]) -> Vec<Triangle> {
    if samples.len() < 3 {
        return Vec::new();
    }

    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for s in samples {
        min_x = min_x.min(s.x);
        min_y = min_y.min(s.y);
        max_x = max_x.max(s.x);
        max_y = max_y.max(s.y);
    }
    let (dx, dy) = (max_x - min_x, max_y - min_y);
    let delta = dx.max(dy).max(1.0);

    // super-triangle occupies vertices 0..3
    let mut vertices = vec![
        Sample { x: min_x - 10.0 * delta, y: min_y - delta, z: 0.0 },
        Sample { x: min_x + 0.5 * dx, y: max_y + 10.0 * delta, z: 0.0 },
        Sample { x: max_x + 10.0 * delta, y: min_y - delta, z: 0.0 },
    ];
    let mut triangles = vec![Triangle { v0: 0, v1: 1, v2: 2 }];

    for sample in samples {
        let vi = vertices.len();
        vertices.push(*sample);

        let mut bad: Vec<usize> = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                circumcircle(&vertices[t.v0], &vertices[t.v1], &vertices[t.v2]).map_or(
                    false,
                    |(cx, cy, r2)| (sample.x - cx).powi(2) + (sample.y - cy).powi(2) <= r2,
                )
            })
            .map(|(i, _)| i)
            .collect();

        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &bi in &bad {
            for (ea, eb) in triangles[bi].edges() {
                let shared = bad.iter().any(|&oi| {
                    oi != bi
                        && triangles[oi]
                            .edges()
                            .iter()
                            .any(|&(oa, ob)| (oa == ea && ob == eb) || (oa == eb && ob == ea))
                });
                if !shared {
                    boundary.push((ea, eb));
                }
            }
        }

        bad.sort_unstable_by(|a, b| b.cmp(a));
        for bi in bad {
            triangles.swap_remove(bi);
        }
        triangles.extend(boundary.into_iter().map(|(ea, eb)| Triangle { v0: ea, v1: eb, v2: vi }));
    }

    triangles
        .into_iter()
        .filter(|t| t.v0 >= 3 && t.v1 >= 3 && t.v2 >= 3)
        .filter(|t| circumcircle(&vertices[t.v0], &vertices[t.v1], &vertices[t.v2]).is_some())
        .map(|t| Triangle { v0: t.v0 - 3, v1: t.v1 - 3, v2: t.v2 - 3 })
        .collect()
}

fn linear_value(samples: &[Sample], triangles: &[Triangle], gx: f64, gy: f64) -> f64 {
    const EPS: f64 = -1e-10;
    for t in triangles {
        let (p0, p1, p2) = (&samples[t.v0], &samples[t.v1], &samples[t.v2]);
        let (u, v, w) = barycentric(gx, gy, p0, p1, p2);
        if u >= EPS && v >= EPS && w >= EPS {
            return u * p0.z + v * p1.z + w * p2.z;
        }
    }
    f64::NAN
}

fn nearest_value(samples: &[Sample], gx: f64, gy: f64) -> f64 {
    let mut best = f64::INFINITY;
    let mut value = f64::NAN;
    for s in samples {
        let d2 = (s.x - gx).powi(2) + (s.y - gy).powi(2);
        if d2 < best {
            best = d2;
            value = s.z;
        }
    }
    value
}

/// Sorted, de-duplicated copy of `values`
fn unique_sorted(values: &[f64]) -> Array1<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    Array1::from(sorted)
}

/// Grid scattered `z` values sampled at `(x, y)` onto the regular grid of
/// unique `x` and `y` values.
///
/// Returns a single-chunk 2-D array with dimensions `dims` and 1-D
/// coordinates holding the unique `x` and `y` values. With
/// [`GridMethod::Linear`] at least three non-collinear samples are needed.
pub fn minigrid(
    x: &[f64],
    y: &[f64],
    z: &[f64],
    method: GridMethod,
    dims: [&str; 2],
) -> SarResult<DataArray<f64>> {
    if x.len() != y.len() || x.len() != z.len() {
        return Err(SarError::Processing(format!(
            "Sample arrays have different lengths: x={}, y={}, z={}",
            x.len(),
            y.len(),
            z.len()
        )));
    }

    let samples: Vec<Sample> = x
        .iter()
        .zip(y)
        .zip(z)
        .filter(|((sx, sy), _)| sx.is_finite() && sy.is_finite())
        .map(|((&sx, &sy), &sz)| Sample { x: sx, y: sy, z: sz })
        .collect();
    if samples.is_empty() {
        return Err(SarError::Processing("No samples to grid".to_string()));
    }

    let triangles = match method {
        GridMethod::Linear => {
            let triangles = delaunay(&samples);
            if triangles.is_empty() {
                return Err(SarError::Processing(format!(
                    "Cannot triangulate {} samples (fewer than 3 or collinear)",
                    samples.len()
                )));
            }
            triangles
        }
        GridMethod::Nearest => Vec::new(),
    };

    let x_u = unique_sorted(x);
    let y_u = unique_sorted(y);
    log::debug!(
        "Gridding {} samples onto {}x{} nodes ({:?})",
        samples.len(),
        x_u.len(),
        y_u.len(),
        method
    );

    let mut grid = Array2::<f64>::zeros((x_u.len(), y_u.len()));
    Zip::from(grid.rows_mut())
        .and(&x_u)
        .par_for_each(|mut row, &gx| {
            for (cell, &gy) in row.iter_mut().zip(y_u.iter()) {
                *cell = match method {
                    GridMethod::Linear => linear_value(&samples, &triangles, gx, gy),
                    GridMethod::Nearest => nearest_value(&samples, gx, gy),
                };
            }
        });

    let mut coords = BTreeMap::new();
    coords.insert(dims[0].to_string(), Coordinate::Float(x_u));
    coords.insert(dims[1].to_string(), Coordinate::Float(y_u));

    let shape = grid.shape().to_vec();
    let data = ChunkedArray::from_array(grid.into_dyn(), &shape)?;
    DataArray::new(data, vec![dims[0].to_string(), dims[1].to_string()], coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    fn plane_samples() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        // corners of a 2x2 square plus its centre, z = x
        let x = vec![0.0, 2.0, 0.0, 2.0, 1.0];
        let y = vec![0.0, 0.0, 2.0, 2.0, 1.0];
        let z = x.clone();
        (x, y, z)
    }

    #[test]
    fn test_delaunay_square() {
        let samples: Vec<Sample> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .iter()
            .map(|&(x, y)| Sample { x, y, z: 0.0 })
            .collect();
        assert_eq!(delaunay(&samples).len(), 2);
    }

    #[test]
    fn test_minigrid_linear_on_plane() {
        let (x, y, z) = plane_samples();
        let da = minigrid(&x, &y, &z, GridMethod::default(), ["atrack", "xtrack"]).unwrap();
        assert_eq!(da.dims(), &["atrack".to_string(), "xtrack".to_string()]);
        assert_eq!(da.shape(), vec![3, 3]);
        assert_eq!(da.coord("atrack").unwrap(), &Coordinate::from(vec![0.0, 1.0, 2.0]));

        let values = da.compute().unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(values[IxDyn(&[i, j])], i as f64, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_minigrid_linear_outside_hull_is_nan() {
        // triangle, z = x + y; node (2, 2) lies outside it
        let x = [0.0, 2.0, 0.0];
        let y = [0.0, 0.0, 2.0];
        let z = [0.0, 2.0, 2.0];
        let values = minigrid(&x, &y, &z, GridMethod::Linear, ["x", "y"])
            .unwrap()
            .compute()
            .unwrap();
        assert_abs_diff_eq!(values[IxDyn(&[0, 0])], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[IxDyn(&[1, 0])], 2.0, epsilon = 1e-9);
        assert!(values[IxDyn(&[1, 1])].is_nan());
    }

    #[test]
    fn test_minigrid_linear_needs_triangle() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        let z = [1.0, 2.0, 3.0];
        assert!(minigrid(&x, &y, &z, GridMethod::Linear, ["x", "y"]).is_err());
        assert!(minigrid(&x[..2], &y[..2], &z[..2], GridMethod::Linear, ["x", "y"]).is_err());
    }

    #[test]
    fn test_minigrid_nearest() {
        let (x, y, z) = plane_samples();
        let values = minigrid(&x, &y, &z, GridMethod::Nearest, ["x", "y"])
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(values[IxDyn(&[1, 1])], 1.0);
        assert_eq!(values[IxDyn(&[2, 0])], 2.0);

        // nearest fills nodes with no sample of their own
        let values = minigrid(&[0.0, 10.0], &[0.0, 10.0], &[1.0, 2.0], GridMethod::Nearest, ["x", "y"])
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(values[IxDyn(&[0, 0])], 1.0);
        assert_eq!(values[IxDyn(&[1, 1])], 2.0);
        assert!(!values[IxDyn(&[0, 1])].is_nan());
    }

    #[test]
    fn test_minigrid_rejects_mismatched_samples() {
        assert!(minigrid(&[0.0], &[0.0, 1.0], &[1.0], GridMethod::Nearest, ["x", "y"]).is_err());
        assert!(minigrid(&[], &[], &[], GridMethod::Nearest, ["x", "y"]).is_err());
    }
}

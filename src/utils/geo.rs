use crate::types::{SarError, SarResult};
use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};
use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (spherical earth)
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Distance in meters and bearing in degrees from point 1 to point 2,
/// assuming a spherical earth
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> (f64, f64) {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );

    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    let bearing = (dlon.sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos());

    (c * EARTH_RADIUS, bearing.to_degrees())
}

/// Element-wise [`haversine`] over equally sized arrays
pub fn haversine_array(
    lon1: ArrayView1<f64>,
    lat1: ArrayView1<f64>,
    lon2: ArrayView1<f64>,
    lat2: ArrayView1<f64>,
) -> SarResult<(Array1<f64>, Array1<f64>)> {
    let n = lon1.len();
    if lat1.len() != n || lon2.len() != n || lat2.len() != n {
        return Err(SarError::Processing(format!(
            "Coordinate arrays have different lengths: {}, {}, {}, {}",
            n,
            lat1.len(),
            lon2.len(),
            lat2.len()
        )));
    }

    let mut distance = Array1::zeros(n);
    let mut bearing = Array1::zeros(n);
    Zip::from(&mut distance)
        .and(&mut bearing)
        .and(&lon1)
        .and(&lat1)
        .and(&lon2)
        .and(&lat2)
        .par_for_each(|d, b, &lo1, &la1, &lo2, &la2| {
            let (dist, bear) = haversine(lo1, la1, lo2, la2);
            *d = dist;
            *b = bear;
        });

    Ok((distance, bearing))
}

/// Map longitudes from [0, 360] into [-180, 180], in place
pub fn to_lon180(mut lon: ArrayViewMut1<f64>) {
    lon.mapv_inplace(|l| if l > 180.0 { l - 360.0 } else { l });
}

/// Padding applied around the outer grid cells by [`bbox_coords`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum BboxPad {
    /// Half of the grid spacing on each axis
    #[default]
    Extends,
    NoPad,
    /// Explicit (x, y) padding
    Fixed(f64, f64),
}

/// Corners of the box surrounding a 1-D `xs` x `ys` grid:
/// `(x0, y0), (x0, yN), (xN, yN), (xN, y0)`, padded outward
pub fn bbox_coords(xs: &[f64], ys: &[f64], pad: BboxPad) -> SarResult<[(f64, f64); 4]> {
    let (x0, xn) = match (xs.first(), xs.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(SarError::Processing("Empty x coordinates".to_string())),
    };
    let (y0, yn) = match (ys.first(), ys.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(SarError::Processing("Empty y coordinates".to_string())),
    };

    let (xpad, ypad) = match pad {
        BboxPad::Extends => (smallest_step(xs)? / 2.0, smallest_step(ys)? / 2.0),
        BboxPad::NoPad => (0.0, 0.0),
        BboxPad::Fixed(px, py) => (px, py),
    };

    Ok([
        (x0 - xpad, y0 - ypad),
        (x0 - xpad, yn + ypad),
        (xn + xpad, yn + ypad),
        (xn + xpad, y0 - ypad),
    ])
}

fn smallest_step(values: &[f64]) -> SarResult<f64> {
    values
        .windows(2)
        .map(|w| w[1] - w[0])
        .reduce(f64::min)
        .ok_or_else(|| {
            SarError::Processing("At least two coordinates are needed to pad a bbox".to_string())
        })
}

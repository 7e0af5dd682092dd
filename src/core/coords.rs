use crate::core::chunked::ChunkedArray;
use crate::types::{SarError, SarResult};
use chrono::{DateTime, Utc};
use ndarray::{s, Array1, ArrayD};
use std::collections::BTreeMap;

/// 1-D coordinate values along one dimension
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinate {
    Float(Array1<f64>),
    Int(Array1<i64>),
    /// Azimuth times and other timestamps
    Time(Array1<DateTime<Utc>>),
}

impl Coordinate {
    pub fn len(&self) -> usize {
        match self {
            Coordinate::Float(values) => values.len(),
            Coordinate::Int(values) => values.len(),
            Coordinate::Time(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in `[start, stop)`, or `None` if the range does not fit
    pub fn slice(&self, start: usize, stop: usize) -> Option<Coordinate> {
        if start > stop || stop > self.len() {
            return None;
        }
        Some(match self {
            Coordinate::Float(values) => Coordinate::Float(values.slice(s![start..stop]).to_owned()),
            Coordinate::Int(values) => Coordinate::Int(values.slice(s![start..stop]).to_owned()),
            Coordinate::Time(values) => Coordinate::Time(values.slice(s![start..stop]).to_owned()),
        })
    }

    /// Real-valued view of the coordinate. Timestamps become fractional
    /// seconds since the Unix epoch.
    pub fn to_f64(&self) -> Array1<f64> {
        match self {
            Coordinate::Float(values) => values.clone(),
            Coordinate::Int(values) => values.mapv(|v| v as f64),
            Coordinate::Time(values) => values.mapv(|t| {
                t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
            }),
        }
    }
}

impl From<Array1<f64>> for Coordinate {
    fn from(values: Array1<f64>) -> Self {
        Coordinate::Float(values)
    }
}

impl From<Vec<f64>> for Coordinate {
    fn from(values: Vec<f64>) -> Self {
        Coordinate::Float(Array1::from(values))
    }
}

impl From<Array1<i64>> for Coordinate {
    fn from(values: Array1<i64>) -> Self {
        Coordinate::Int(values)
    }
}

impl From<Vec<i64>> for Coordinate {
    fn from(values: Vec<i64>) -> Self {
        Coordinate::Int(Array1::from(values))
    }
}

impl From<Vec<DateTime<Utc>>> for Coordinate {
    fn from(values: Vec<DateTime<Utc>>) -> Self {
        Coordinate::Time(Array1::from(values))
    }
}

/// Chunked array with named dimensions and coordinates
#[derive(Debug, Clone)]
pub struct DataArray<T> {
    dims: Vec<String>,
    coords: BTreeMap<String, Coordinate>,
    data: ChunkedArray<T>,
}

impl<T> DataArray<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Every dimension needs a coordinate of matching length. Extra
    /// coordinates (e.g. `xint`) are kept as auxiliary coordinates.
    pub fn new(
        data: ChunkedArray<T>,
        dims: Vec<String>,
        coords: BTreeMap<String, Coordinate>,
    ) -> SarResult<Self> {
        let shape = data.shape();
        if dims.len() != shape.len() {
            return Err(SarError::Metadata(format!(
                "{} dimension names given for a {}-dimensional array",
                dims.len(),
                shape.len()
            )));
        }

        for (dim, &size) in dims.iter().zip(&shape) {
            let coord = coords
                .get(dim)
                .ok_or_else(|| SarError::MissingCoordinate(dim.clone()))?;
            if coord.len() != size {
                return Err(SarError::Metadata(format!(
                    "Coordinate '{}' has length {}, dimension size is {}",
                    dim,
                    coord.len(),
                    size
                )));
            }
        }

        Ok(Self { dims, coords, data })
    }

    /// Attach an auxiliary coordinate. Dimension coordinates must keep
    /// their length.
    pub fn assign_coord(mut self, name: impl Into<String>, coord: Coordinate) -> SarResult<Self> {
        let name = name.into();
        if let Some(axis) = self.dims.iter().position(|d| *d == name) {
            let size = self.data.shape()[axis];
            if coord.len() != size {
                return Err(SarError::Metadata(format!(
                    "Coordinate '{}' has length {}, dimension size is {}",
                    name,
                    coord.len(),
                    size
                )));
            }
        }
        self.coords.insert(name, coord);
        Ok(self)
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> SarResult<&Coordinate> {
        self.coords
            .get(name)
            .ok_or_else(|| SarError::MissingCoordinate(name.to_string()))
    }

    /// Coordinates of the dimensions only, keyed by dimension name
    pub fn dim_coords(&self) -> BTreeMap<String, Coordinate> {
        self.dims
            .iter()
            .filter_map(|d| self.coords.get(d).map(|c| (d.clone(), c.clone())))
            .collect()
    }

    pub fn data(&self) -> &ChunkedArray<T> {
        &self.data
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.shape()
    }

    pub fn compute(&self) -> SarResult<ArrayD<T>> {
        self.data.compute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunked::ChunkLayout;
    use chrono::TimeZone;

    fn template() -> ChunkedArray<f32> {
        ChunkedArray::full(ChunkLayout::regular(&[3, 2], &[2, 2]).unwrap(), 0.0)
    }

    #[test]
    fn test_coordinate_slice_bounds() {
        let coord = Coordinate::from(vec![1.0, 2.0, 3.0]);
        assert_eq!(coord.slice(1, 3), Some(Coordinate::from(vec![2.0, 3.0])));
        assert!(coord.slice(0, 0).unwrap().is_empty());
        assert_eq!(coord.slice(2, 4), None);
    }

    #[test]
    fn test_time_coordinate_to_f64() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 3, 17, 8, 15).unwrap();
        let t1 = t0 + chrono::Duration::milliseconds(500);
        let values = Coordinate::from(vec![t0, t1]).to_f64();
        assert!((values[1] - values[0] - 0.5).abs() < 1e-6);
        assert_eq!(values[0], t0.timestamp() as f64);
    }

    #[test]
    fn test_dataarray_validation() {
        let mut coords = BTreeMap::new();
        coords.insert("atrack".to_string(), Coordinate::from(vec![0i64, 1, 2]));
        coords.insert("xtrack".to_string(), Coordinate::from(vec![0i64, 1]));
        let da = DataArray::new(template(), vec!["atrack".into(), "xtrack".into()], coords.clone());
        assert!(da.is_ok());

        coords.insert("xtrack".to_string(), Coordinate::from(vec![0i64, 1, 2]));
        let err = DataArray::new(template(), vec!["atrack".into(), "xtrack".into()], coords);
        assert!(matches!(err, Err(SarError::Metadata(_))));

        let err = DataArray::new(template(), vec!["atrack".into(), "xtrack".into()], BTreeMap::new());
        assert!(matches!(err, Err(SarError::MissingCoordinate(_))));
    }
}

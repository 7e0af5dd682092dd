//! sarutils: helper utilities for a SAR processing toolkit
//!
//! The centre piece is [`core::map_blocks_coords`], which builds lazy chunked
//! arrays whose blocks are computed from their coordinates (directly, or
//! through an azimuth-time interpolation index for TOPS bursts). Around it
//! sit small standalone helpers: geodesy, gridding, glob inference, YAML
//! merging, timing, a blocking actor proxy and SAFE recompression.

pub mod types;
pub mod io;
pub mod core;
pub mod utils;

// Re-export main types and functions for easier access
pub use types::{SarError, SarResult};

pub use crate::core::{
    map_blocks_coords, AddressingMode, BlockCoords, ChunkLayout, ChunkedArray, Coordinate,
    DataArray, MapBlocksOptions,
};
pub use io::{compress_safe, CompressOptions};
pub use utils::{
    bbox_coords, get_glob, haversine, merge_yaml, minigrid, to_lon180, BboxPad, BlockingActorProxy,
    GridMethod, Timing,
};

#[cfg(feature = "python")]
mod python {
    use crate::utils::{self, BboxPad};
    use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1, PyReadwriteArray1};
    use pyo3::prelude::*;

    fn to_py_err(e: crate::SarError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Distance in meters and bearing in degrees between point arrays
    #[pyfunction]
    fn haversine<'py>(
        py: Python<'py>,
        lon1: PyReadonlyArray1<f64>,
        lat1: PyReadonlyArray1<f64>,
        lon2: PyReadonlyArray1<f64>,
        lat2: PyReadonlyArray1<f64>,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let (distance, bearing) = utils::haversine_array(
            lon1.as_array(),
            lat1.as_array(),
            lon2.as_array(),
            lat2.as_array(),
        )
        .map_err(to_py_err)?;
        Ok((distance.into_pyarray(py), bearing.into_pyarray(py)))
    }

    #[pyfunction]
    fn to_lon180(mut lon: PyReadwriteArray1<f64>) {
        utils::to_lon180(lon.as_array_mut());
    }

    #[pyfunction]
    fn get_glob(strings: Vec<String>) -> String {
        utils::get_glob(&strings)
    }

    /// `pad` is "extends", None, or an (x, y) tuple
    #[pyfunction]
    #[pyo3(signature = (xs, ys, pad = Some("extends".to_string()), pad_xy = None))]
    fn bbox_coords(
        xs: Vec<f64>,
        ys: Vec<f64>,
        pad: Option<String>,
        pad_xy: Option<(f64, f64)>,
    ) -> PyResult<Vec<(f64, f64)>> {
        let pad = match (pad.as_deref(), pad_xy) {
            (_, Some((px, py))) => BboxPad::Fixed(px, py),
            (Some("extends"), None) => BboxPad::Extends,
            (None, None) => BboxPad::NoPad,
            (Some(other), None) => {
                return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                    "Invalid pad: {}",
                    other
                )))
            }
        };
        let corners = utils::bbox_coords(&xs, &ys, pad).map_err(to_py_err)?;
        Ok(corners.to_vec())
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(haversine, m)?)?;
        m.add_function(wrap_pyfunction!(to_lon180, m)?)?;
        m.add_function(wrap_pyfunction!(get_glob, m)?)?;
        m.add_function(wrap_pyfunction!(bbox_coords, m)?)?;
        Ok(())
    }
}

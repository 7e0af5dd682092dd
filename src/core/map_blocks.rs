//! Coordinate-driven lazy block evaluation
//!
//! [`map_blocks_coords`] registers a function over a templated chunked
//! array. When a block is forced, the coordinates of every dimension are
//! sliced to the block extent and handed to the function; block values are
//! never read. Two addressing modes exist:
//!
//! * [`AddressingMode::Direct`]: one coordinate slice per dimension, in
//!   dimension order.
//! * [`AddressingMode::Burst`]: TOPS bursts. The `xint` interpolation index
//!   (aligned to the first dimension) is passed as a `[k, 1]` column and the
//!   second dimension coordinate as a `[1, m]` row.

use crate::core::chunked::{BlockInfo, BlockLocation};
use crate::core::coords::{Coordinate, DataArray};
use crate::types::{SarError, SarResult};
use ndarray::{Array2, ArrayD, Axis};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};

/// Name of the interpolation-index coordinate used in burst mode
pub const INTERPOLATION_COORD: &str = "xint";

/// How block locations map onto function arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Per-dimension coordinates used as-is
    #[default]
    Direct,
    /// Azimuth-time interpolation index along the first dimension
    Burst,
}

/// Options forwarded to the chunked-array runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapBlocksOptions {
    /// Output array name. Defaults to the function name.
    pub name: Option<String>,
}

/// Coordinate arguments for one block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockCoords {
    Direct(Vec<Coordinate>),
    Burst {
        /// `[k, 1]` column of interpolation indices
        azimuth_time: Array2<f64>,
        /// `[1, m]` row of range indices
        range: Array2<f64>,
    },
}

impl BlockCoords {
    pub fn direct(&self) -> Option<&[Coordinate]> {
        match self {
            BlockCoords::Direct(coords) => Some(coords),
            BlockCoords::Burst { .. } => None,
        }
    }

    pub fn burst(&self) -> Option<(&Array2<f64>, &Array2<f64>)> {
        match self {
            BlockCoords::Burst { azimuth_time, range } => Some((azimuth_time, range)),
            BlockCoords::Direct(_) => None,
        }
    }

    /// Block shape implied by the coordinate slices
    pub fn shape(&self) -> Vec<usize> {
        match self {
            BlockCoords::Direct(coords) => coords.iter().map(Coordinate::len).collect(),
            BlockCoords::Burst { azimuth_time, range } => vec![azimuth_time.nrows(), range.ncols()],
        }
    }
}

/// Adapter binding a coordinate function to the coordinates, keyword
/// arguments and addressing mode it is evaluated with
pub struct CoordBlockEvaluator<F, K> {
    func: F,
    kwargs: K,
    mode: AddressingMode,
    coords: Vec<(String, Coordinate)>,
}

impl<F, K> CoordBlockEvaluator<F, K> {
    /// `coords` holds one coordinate per dimension in direct mode, and
    /// `[xint, range]` in burst mode.
    pub fn new(func: F, kwargs: K, mode: AddressingMode, coords: Vec<(String, Coordinate)>) -> Self {
        Self {
            func,
            kwargs,
            mode,
            coords,
        }
    }

    fn slice_coord(
        name: &str,
        coord: &Coordinate,
        (start, stop): (usize, usize),
        probe: bool,
    ) -> SarResult<Coordinate> {
        // probe locations are synthetic and may overrun short coordinates
        let (start, stop) = if probe {
            let stop = stop.min(coord.len());
            (start.min(stop), stop)
        } else {
            (start, stop)
        };
        coord.slice(start, stop).ok_or_else(|| SarError::IndexOutOfRange {
            dim: name.to_string(),
            start,
            stop,
            len: coord.len(),
        })
    }

    fn block_coords(&self, location: &BlockLocation, probe: bool) -> SarResult<BlockCoords> {
        match self.mode {
            AddressingMode::Direct => {
                let coords = self
                    .coords
                    .iter()
                    .zip(&location.0)
                    .map(|((name, coord), &range)| Self::slice_coord(name, coord, range, probe))
                    .collect::<SarResult<Vec<_>>>()?;
                Ok(BlockCoords::Direct(coords))
            }
            AddressingMode::Burst => {
                if self.coords.len() < 2 || location.ndim() < 2 {
                    return Err(SarError::Processing(
                        "Burst addressing needs two dimensions".to_string(),
                    ));
                }
                let (xint_name, xint) = &self.coords[0];
                let (range_name, range) = &self.coords[1];

                // cast before interpolation
                let azimuth_time = Self::slice_coord(xint_name, xint, location.0[0], probe)?.to_f64();
                let range = Self::slice_coord(range_name, range, location.0[1], probe)?.to_f64();
                log::debug!(
                    "Burst block: {} azimuth times, {} range samples",
                    azimuth_time.len(),
                    range.len()
                );

                Ok(BlockCoords::Burst {
                    azimuth_time: azimuth_time.insert_axis(Axis(1)),
                    range: range.insert_axis(Axis(0)),
                })
            }
        }
    }

    /// Evaluate the function for one block and cast the result to `T`
    pub fn evaluate<T, U>(&self, info: &BlockInfo) -> SarResult<ArrayD<T>>
    where
        F: Fn(&BlockCoords, &K) -> SarResult<ArrayD<U>>,
        T: NumCast + Copy,
        U: NumCast + Copy,
    {
        let probe = info.is_probe();
        let location = info.location_or_dummy();
        if probe {
            log::debug!("Probe call for block shape {:?}", info.shape);
        } else {
            log::debug!("Evaluating block {:?} at {:?}", info.block_id, location.0);
        }

        let coords = self.block_coords(&location, probe)?;
        let result = (self.func)(&coords, &self.kwargs)?;
        cast_block(result)
    }
}

/// Element-wise cast to the output dtype
fn cast_block<T, U>(block: ArrayD<U>) -> SarResult<ArrayD<T>>
where
    T: NumCast + Copy,
    U: NumCast + Copy,
{
    let shape = block.raw_dim();
    let values = block
        .iter()
        .map(|&v| {
            T::from(v).ok_or_else(|| {
                SarError::Cast(format!(
                    "{} value cannot be represented as {}",
                    std::any::type_name::<U>(),
                    std::any::type_name::<T>()
                ))
            })
        })
        .collect::<SarResult<Vec<T>>>()?;
    ArrayD::from_shape_vec(shape, values).map_err(|e| SarError::Cast(e.to_string()))
}

/// Readable name for a function type: the last path segment that is not a
/// closure marker, without generic arguments
fn funcname<F>() -> String {
    let full = std::any::type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    path.split("::")
        .filter(|segment| !segment.is_empty() && !segment.starts_with("{{"))
        .last()
        .unwrap_or(path)
        .to_string()
}

/// Like a per-block map, but `func` receives the coordinates belonging to
/// each block instead of block values.
///
/// `da` is the template of the output: its chunk layout, dimensions,
/// coordinates and element type are reused. Nothing is computed here;
/// `func` runs only when blocks of the returned array are forced.
///
/// # Arguments
/// * `da` - Template array
/// * `func` - Function of the block coordinates and `func_kwargs`
/// * `mode` - Direct or burst addressing
/// * `func_kwargs` - Shared read-only arguments passed on every call
/// * `options` - Runtime options (output name)
pub fn map_blocks_coords<T, U, K, F>(
    da: &DataArray<T>,
    func: F,
    mode: AddressingMode,
    func_kwargs: K,
    options: MapBlocksOptions,
) -> SarResult<DataArray<T>>
where
    T: NumCast + Copy + Send + Sync + 'static,
    U: NumCast + Copy + 'static,
    K: Send + Sync + 'static,
    F: Fn(&BlockCoords, &K) -> SarResult<ArrayD<U>> + Send + Sync + 'static,
{
    let coords = match mode {
        AddressingMode::Direct => da
            .dims()
            .iter()
            .map(|dim| Ok((dim.clone(), da.coord(dim)?.clone())))
            .collect::<SarResult<Vec<_>>>()?,
        AddressingMode::Burst => {
            if da.dims().len() < 2 {
                return Err(SarError::Processing(format!(
                    "Burst addressing needs at least two dimensions, got {:?}",
                    da.dims()
                )));
            }
            if da.dims().len() > 2 {
                log::warn!("Burst addressing only uses the first two of {:?}", da.dims());
            }
            let range_dim = &da.dims()[1];
            vec![
                (
                    INTERPOLATION_COORD.to_string(),
                    da.coord(INTERPOLATION_COORD)?.clone(),
                ),
                (range_dim.clone(), da.coord(range_dim)?.clone()),
            ]
        }
    };

    let name = options.name.unwrap_or_else(funcname::<F>);
    log::debug!(
        "map_blocks_coords '{}' ({:?}) over dims {:?}, {} blocks",
        name,
        mode,
        da.dims(),
        da.data().layout().num_blocks()
    );

    let evaluator = CoordBlockEvaluator::new(func, func_kwargs, mode, coords);
    let data = da
        .data()
        .map_blocks(name, move |info: &BlockInfo| evaluator.evaluate::<T, U>(info));

    DataArray::new(data, da.dims().to_vec(), da.dim_coords())
}

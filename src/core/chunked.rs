use crate::types::{SarError, SarResult};
use ndarray::{ArrayD, IxDyn, Slice};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Extent of one block inside the logical array: `(start, stop)` per dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation(pub Vec<(usize, usize)>);

impl BlockLocation {
    /// Zero-based location spanning `shape`, used for probe calls
    pub fn dummy(shape: &[usize]) -> Self {
        Self(shape.iter().map(|&n| (0, n)).collect())
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.iter().map(|&(start, stop)| stop.saturating_sub(start)).collect()
    }

    fn slice_for(&self, axis: usize) -> Slice {
        let (start, stop) = self.0[axis];
        Slice::from(start..stop)
    }
}

/// Per-dimension chunk sizes of a chunked array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    chunks: Vec<Vec<usize>>,
}

impl ChunkLayout {
    /// Create a layout from explicit chunk sizes, one list per dimension
    pub fn new(chunks: Vec<Vec<usize>>) -> Self {
        Self { chunks }
    }

    /// Split `shape` into chunks of `chunk_shape`, the last chunk of each
    /// dimension taking the remainder
    pub fn regular(shape: &[usize], chunk_shape: &[usize]) -> SarResult<Self> {
        if shape.len() != chunk_shape.len() {
            return Err(SarError::InvalidFormat(format!(
                "Chunk shape {:?} does not match array shape {:?}",
                chunk_shape, shape
            )));
        }

        let mut chunks = Vec::with_capacity(shape.len());
        for (&size, &chunk) in shape.iter().zip(chunk_shape) {
            if size == 0 {
                chunks.push(vec![0]);
                continue;
            }
            if chunk == 0 {
                return Err(SarError::InvalidFormat(
                    "Chunk size must be positive for non-empty dimensions".to_string(),
                ));
            }
            let mut dim_chunks = vec![chunk; size / chunk];
            if size % chunk != 0 {
                dim_chunks.push(size % chunk);
            }
            chunks.push(dim_chunks);
        }

        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[Vec<usize>] {
        &self.chunks
    }

    pub fn ndim(&self) -> usize {
        self.chunks.len()
    }

    /// Logical shape of the whole array
    pub fn shape(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.iter().sum()).collect()
    }

    /// Number of blocks along each dimension
    pub fn grid_shape(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.len()).collect()
    }

    pub fn num_blocks(&self) -> usize {
        self.grid_shape().iter().product()
    }

    /// All block ids in row-major order
    pub fn block_ids(&self) -> Vec<Vec<usize>> {
        let grid = self.grid_shape();
        let mut ids: Vec<Vec<usize>> = vec![Vec::with_capacity(grid.len())];
        for &n in &grid {
            ids = ids
                .into_iter()
                .flat_map(|prefix| {
                    (0..n).map(move |i| {
                        let mut id = prefix.clone();
                        id.push(i);
                        id
                    })
                })
                .collect();
        }
        ids
    }

    fn check_block_id(&self, block_id: &[usize]) -> SarResult<()> {
        if block_id.len() != self.ndim() {
            return Err(SarError::Processing(format!(
                "Block id {:?} has {} dimensions, array has {}",
                block_id,
                block_id.len(),
                self.ndim()
            )));
        }
        for (dim, (&i, chunks)) in block_id.iter().zip(&self.chunks).enumerate() {
            if i >= chunks.len() {
                return Err(SarError::Processing(format!(
                    "Block index {} out of range for dimension {} ({} blocks)",
                    i,
                    dim,
                    chunks.len()
                )));
            }
        }
        Ok(())
    }

    pub fn block_shape(&self, block_id: &[usize]) -> SarResult<Vec<usize>> {
        self.check_block_id(block_id)?;
        Ok(block_id
            .iter()
            .zip(&self.chunks)
            .map(|(&i, chunks)| chunks[i])
            .collect())
    }

    pub fn block_location(&self, block_id: &[usize]) -> SarResult<BlockLocation> {
        self.check_block_id(block_id)?;
        Ok(BlockLocation(
            block_id
                .iter()
                .zip(&self.chunks)
                .map(|(&i, chunks)| {
                    let start: usize = chunks[..i].iter().sum();
                    (start, start + chunks[i])
                })
                .collect(),
        ))
    }
}

/// Metadata handed to a block kernel on every invocation
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub block_id: Vec<usize>,
    /// Declared shape of the block
    pub shape: Vec<usize>,
    /// Absent for structural probe calls
    pub location: Option<BlockLocation>,
}

impl BlockInfo {
    /// Record for a probe call: a block of `shape` with no position
    pub fn probe(shape: Vec<usize>) -> Self {
        Self {
            block_id: vec![0; shape.len()],
            shape,
            location: None,
        }
    }

    fn usable_location(&self) -> Option<&BlockLocation> {
        let location = self.location.as_ref()?;
        if location.ndim() != self.shape.len() {
            return None;
        }
        let consistent = location
            .0
            .iter()
            .zip(&self.shape)
            .all(|(&(start, stop), &n)| start <= stop && stop - start == n);
        consistent.then_some(location)
    }

    /// True when no usable location was supplied (missing or malformed)
    pub fn is_probe(&self) -> bool {
        self.usable_location().is_none()
    }

    /// The block location, or a dummy `(0, shape[i])` location for probe calls
    pub fn location_or_dummy(&self) -> BlockLocation {
        match self.usable_location() {
            Some(location) => location.clone(),
            None => BlockLocation::dummy(&self.shape),
        }
    }
}

/// Per-block computation registered on a chunked array
pub type BlockKernel<T> = Arc<dyn Fn(&BlockInfo) -> SarResult<ArrayD<T>> + Send + Sync>;

enum Source<T> {
    Array(Arc<ArrayD<T>>),
    Kernel(BlockKernel<T>),
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Source::Array(array) => Source::Array(Arc::clone(array)),
            Source::Kernel(kernel) => Source::Kernel(Arc::clone(kernel)),
        }
    }
}

/// Lazy N-dimensional array partitioned into independently computable blocks
pub struct ChunkedArray<T> {
    name: String,
    layout: ChunkLayout,
    source: Source<T>,
}

impl<T> Clone for ChunkedArray<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            layout: self.layout.clone(),
            source: self.source.clone(),
        }
    }
}

impl<T> fmt::Debug for ChunkedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Array(_) => "array",
            Source::Kernel(_) => "kernel",
        };
        f.debug_struct("ChunkedArray")
            .field("name", &self.name)
            .field("dtype", &std::any::type_name::<T>())
            .field("chunks", &self.layout.chunks())
            .field("source", &source)
            .finish()
    }
}

impl<T> ChunkedArray<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap an in-memory array, splitting it into regular chunks
    pub fn from_array(array: ArrayD<T>, chunk_shape: &[usize]) -> SarResult<Self> {
        let layout = ChunkLayout::regular(array.shape(), chunk_shape)?;
        Ok(Self {
            name: "array".to_string(),
            layout,
            source: Source::Array(Arc::new(array)),
        })
    }

    /// Constant-valued array, typically used as a template
    pub fn full(layout: ChunkLayout, value: T) -> Self {
        let kernel: BlockKernel<T> = Arc::new(move |info: &BlockInfo| {
            Ok(ArrayD::from_elem(IxDyn(&info.shape), value.clone()))
        });
        Self::from_kernel("full", layout, kernel)
    }

    pub fn from_kernel(name: impl Into<String>, layout: ChunkLayout, kernel: BlockKernel<T>) -> Self {
        Self {
            name: name.into(),
            layout,
            source: Source::Kernel(kernel),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn shape(&self) -> Vec<usize> {
        self.layout.shape()
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Register a per-block transformation. Nothing is executed until the
    /// returned array is forced.
    pub fn map_blocks<U, F>(&self, name: impl Into<String>, kernel: F) -> ChunkedArray<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&BlockInfo) -> SarResult<ArrayD<U>> + Send + Sync + 'static,
    {
        ChunkedArray::<U>::from_kernel(name, self.layout.clone(), Arc::new(kernel))
    }

    /// Run the block computation for an explicit metadata record. The
    /// result shape is not checked.
    pub fn evaluate_block(&self, info: &BlockInfo) -> SarResult<ArrayD<T>> {
        match &self.source {
            Source::Array(array) => {
                let location = info.location_or_dummy();
                if location.ndim() != array.ndim() {
                    return Err(SarError::Processing(format!(
                        "Block location has {} dimensions, array has {}",
                        location.ndim(),
                        array.ndim()
                    )));
                }
                for (axis, (&(_, stop), &len)) in location.0.iter().zip(array.shape()).enumerate() {
                    if stop > len {
                        return Err(SarError::IndexOutOfRange {
                            dim: format!("axis {}", axis),
                            start: location.0[axis].0,
                            stop,
                            len,
                        });
                    }
                }
                Ok(array
                    .slice_each_axis(|ax| location.slice_for(ax.axis.index()))
                    .to_owned())
            }
            Source::Kernel(kernel) => kernel(info),
        }
    }

    fn block_info(&self, block_id: &[usize]) -> SarResult<BlockInfo> {
        Ok(BlockInfo {
            block_id: block_id.to_vec(),
            shape: self.layout.block_shape(block_id)?,
            location: Some(self.layout.block_location(block_id)?),
        })
    }

    /// Force a single block, checking it against its declared shape
    pub fn compute_block(&self, block_id: &[usize]) -> SarResult<ArrayD<T>> {
        let info = self.block_info(block_id)?;
        let block = self.evaluate_block(&info)?;
        if block.shape() != info.shape.as_slice() {
            return Err(SarError::ShapeMismatch {
                block: info.block_id,
                expected: info.shape,
                actual: block.shape().to_vec(),
            });
        }
        Ok(block)
    }

    /// Issue a structural probe call: a zero-sized block with no location
    pub fn probe(&self) -> SarResult<ArrayD<T>> {
        let info = BlockInfo::probe(vec![0; self.ndim()]);
        self.evaluate_block(&info)
    }

    fn compute_blocks(&self) -> SarResult<Vec<(Vec<usize>, ArrayD<T>)>> {
        let ids = self.layout.block_ids();
        log::debug!("Computing {} blocks of '{}'", ids.len(), self.name);

        #[cfg(feature = "parallel")]
        let blocks: Vec<SarResult<(Vec<usize>, ArrayD<T>)>> = ids
            .into_par_iter()
            .map(|id| self.compute_block(&id).map(|block| (id, block)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let blocks: Vec<SarResult<(Vec<usize>, ArrayD<T>)>> = ids
            .into_iter()
            .map(|id| self.compute_block(&id).map(|block| (id, block)))
            .collect();

        blocks.into_iter().collect()
    }

    /// Force every block and assemble the dense array
    pub fn compute(&self) -> SarResult<ArrayD<T>> {
        let shape = self.shape();
        let blocks = self.compute_blocks()?;

        let fill = blocks.iter().find_map(|(_, block)| block.iter().next().cloned());
        let mut output = match fill {
            Some(value) => ArrayD::from_elem(IxDyn(&shape), value),
            None => {
                return ArrayD::from_shape_vec(IxDyn(&shape), Vec::new())
                    .map_err(|e| SarError::Processing(format!("Empty array assembly failed: {}", e)));
            }
        };

        for (id, block) in &blocks {
            let location = self.layout.block_location(id)?;
            output
                .slice_each_axis_mut(|ax| location.slice_for(ax.axis.index()))
                .assign(block);
        }

        log::debug!("Assembled '{}' with shape {:?}", self.name, shape);
        Ok(output)
    }

    /// Sum of all elements, forcing every block
    pub fn sum(&self) -> SarResult<T>
    where
        T: num_traits::Zero,
    {
        let blocks = self.compute_blocks()?;
        Ok(blocks
            .into_iter()
            .fold(T::zero(), |acc, (_, block)| acc + block.sum()))
    }
}

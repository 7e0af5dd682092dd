//! Core chunked-array and block evaluation modules

pub mod chunked;
pub mod coords;
pub mod map_blocks;

// Re-export main types
pub use chunked::{BlockInfo, BlockKernel, BlockLocation, ChunkLayout, ChunkedArray};
pub use coords::{Coordinate, DataArray};
pub use map_blocks::{
    map_blocks_coords, AddressingMode, BlockCoords, CoordBlockEvaluator, MapBlocksOptions,
    INTERPOLATION_COORD,
};

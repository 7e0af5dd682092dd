//! Small standalone helpers used around the processing chain

pub mod actor;
pub mod geo;
pub mod glob;
pub mod grid;
pub mod timing;
pub mod yaml;

pub use actor::BlockingActorProxy;
pub use geo::{bbox_coords, haversine, haversine_array, to_lon180, BboxPad};
pub use glob::get_glob;
pub use grid::{minigrid, GridMethod};
pub use timing::{MemoryProbe, ProcStatus, Timing};
pub use yaml::merge_yaml;

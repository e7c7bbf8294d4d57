// Domain layer: the voxel model and the ports its collaborators implement.

pub mod catalogue;
pub mod model;
pub mod ports;
pub mod raster;

pub use catalogue::{LithCatalogue, Rgb, BACKGROUND, BACKGROUND_INDEX};
pub use model::{
    AxisRange, GeoData, GridFrame, InvariantViolation, LithGrid, ModelSummary, VoxelModel, UNSET,
};
pub use raster::{GeoTransform, Raster2D, DEFAULT_NULL_VALUE};

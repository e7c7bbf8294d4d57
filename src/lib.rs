pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::JobConfig;

pub use adapters::{BilinearReprojector, LocalStorage, ModelArchive};
pub use core::{GridImporter, ModelCodec, ModelEngine, ModelMerger};
pub use domain::{LithCatalogue, Raster2D, VoxelModel};
pub use utils::error::{ModelError, Result};

// Core layer: import, persistence and merge algorithms over the domain model.

pub mod codec;
pub mod editing;
pub mod engine;
pub mod export;
pub mod importer;
pub mod merger;
pub mod progress;
pub mod raster_merge;
pub mod record;
pub mod schema;

pub use codec::ModelCodec;
pub use editing::{ranged_copy, RangedCopy, SliceAxis};
pub use engine::ModelEngine;
pub use export::export_csv;
pub use importer::{BlockModelTable, GridImporter, ImportOptions, PointSample};
pub use merger::ModelMerger;
pub use raster_merge::gmerge;
pub use record::{LayerRecord, ModelRecord, RecordValue};
pub use crate::utils::error::Result;

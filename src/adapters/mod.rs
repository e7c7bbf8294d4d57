// Adapters layer: concrete implementations of the domain ports (storage, archive, sources, reprojection, progress).

pub mod archive;
pub mod progress;
pub mod reproject;
pub mod sources;
pub mod storage;

pub use archive::ModelArchive;
pub use progress::{LogProgress, TracingReporter};
pub use reproject::{BilinearReprojector, IdentityTransform};
pub use sources::{ArchiveSource, BlockModelSource, XyzSource};
pub use storage::LocalStorage;

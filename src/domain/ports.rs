use crate::domain::model::VoxelModel;
use crate::domain::raster::GeoTransform;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Anything that yields a populated model: an archive, a point cloud, a block model.
#[async_trait]
pub trait ModelSource: Send + Sync {
    fn name(&self) -> &str;
    async fn load(&self) -> Result<VoxelModel>;
}

/// Row-major source grid handed to a [`Reprojector`]; `0.0` means no data.
#[derive(Debug, Clone, Copy)]
pub struct SourceRaster<'a> {
    pub values: &'a [f64],
    pub cols: usize,
    pub rows: usize,
}

/// Resamples a grid onto another footprint. Output is `dst_cols * dst_rows`
/// row-major values with `0.0` where nothing could be sampled.
pub trait Reprojector: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn reproject(
        &self,
        source: &SourceRaster<'_>,
        src_transform: &GeoTransform,
        src_srs: &str,
        dst_transform: &GeoTransform,
        dst_cols: usize,
        dst_rows: usize,
        dst_srs: &str,
    ) -> Result<Vec<f64>>;
}

pub trait CoordinateTransform: Send + Sync {
    fn transform_point(&self, src_srs: &str, dst_srs: &str, x: f64, y: f64) -> Result<(f64, f64)>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub label: String,
    pub done: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub remaining: Option<Duration>,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Status message sink ("show text").
pub trait Reporter: Send + Sync {
    fn show_text(&self, message: &str);
}

impl<F> Reporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn show_text(&self, message: &str) {
        self(message)
    }
}

/// Optional collaborators threaded through long-running operations.
#[derive(Clone, Copy, Default)]
pub struct Hooks<'a> {
    pub progress: Option<&'a dyn ProgressObserver>,
    pub reporter: Option<&'a dyn Reporter>,
}

impl<'a> Hooks<'a> {
    pub fn with_progress(mut self, progress: &'a dyn ProgressObserver) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn report(&self, message: &str) {
        if let Some(reporter) = self.reporter {
            reporter.show_text(message);
        }
    }
}

use crate::adapters::archive::ModelArchive;
use crate::core::codec::ModelCodec;
use crate::core::export::export_csv;
use crate::core::merger::ModelMerger;
use crate::domain::model::VoxelModel;
use crate::domain::ports::{Hooks, ModelSource, ProgressObserver, Reporter, Reprojector, Storage};
use crate::utils::error::{ModelError, Result};
use crate::utils::monitor::SystemMonitor;
use std::sync::Arc;

/// Runs sources → merge → archive as one job.
///
/// The first source is the master; every later source is merged into it in
/// order.
pub struct ModelEngine<S: Storage> {
    storage: S,
    sources: Vec<Box<dyn ModelSource>>,
    reprojector: Box<dyn Reprojector>,
    codec: ModelCodec,
    archive_path: String,
    csv_path: Option<String>,
    progress: Option<Arc<dyn ProgressObserver>>,
    reporter: Option<Arc<dyn Reporter>>,
    monitor: SystemMonitor,
}

impl<S: Storage> ModelEngine<S> {
    pub fn new(storage: S, reprojector: Box<dyn Reprojector>, archive_path: impl Into<String>) -> Self {
        Self::new_with_monitoring(storage, reprojector, archive_path, false)
    }

    pub fn new_with_monitoring(
        storage: S,
        reprojector: Box<dyn Reprojector>,
        archive_path: impl Into<String>,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            storage,
            sources: Vec::new(),
            reprojector,
            codec: ModelCodec::new(),
            archive_path: archive_path.into(),
            csv_path: None,
            progress: None,
            reporter: None,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn with_source(mut self, source: Box<dyn ModelSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_codec(mut self, codec: ModelCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_csv_export(mut self, path: impl Into<String>) -> Self {
        self.csv_path = Some(path.into());
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    fn hooks(&self) -> Hooks<'_> {
        Hooks {
            progress: self.progress.as_deref(),
            reporter: self.reporter.as_deref(),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting model job with {} source(s)", self.sources.len());
        self.monitor.log_stats("Start");

        let models = self.extract().await?;
        self.monitor.log_stats("Extract");

        let model = self.transform(models)?;
        self.monitor.log_stats("Merge");

        let output_path = self.load(&model).await?;
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }

    pub async fn extract(&self) -> Result<Vec<VoxelModel>> {
        if self.sources.is_empty() {
            return Err(ModelError::MissingConfigError {
                field: "sources".to_string(),
            });
        }

        let mut models = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            tracing::debug!("Loading source '{}'", source.name());
            let model = source.load().await?;
            tracing::info!(
                "📥 Loaded '{}': {}x{}x{} cells, {} lithologies",
                source.name(),
                model.numx(),
                model.numy(),
                model.numz(),
                model.catalogue.len()
            );
            models.push(model);
        }
        Ok(models)
    }

    pub fn transform(&self, models: Vec<VoxelModel>) -> Result<VoxelModel> {
        let mut models = models.into_iter();
        let mut master = models.next().ok_or_else(|| ModelError::MissingConfigError {
            field: "sources".to_string(),
        })?;

        let merger = ModelMerger::new(self.reprojector.as_ref()).with_hooks(self.hooks());
        for (n, slave) in models.enumerate() {
            let name = self
                .sources
                .get(n + 1)
                .map(|s| s.name().to_string())
                .unwrap_or_default();
            tracing::info!("🔀 Merging '{}' into the master model", name);
            merger.merge(&mut master, &slave)?;
        }
        Ok(master)
    }

    pub async fn load(&self, model: &VoxelModel) -> Result<String> {
        let record = self.codec.encode(model);
        let bytes = ModelArchive::to_bytes(&record)?;
        tracing::debug!("Writing archive ({} bytes) to storage", bytes.len());
        self.storage.write_file(&self.archive_path, &bytes).await?;
        tracing::info!("💾 Archive saved: {}", self.archive_path);

        if let Some(csv_path) = &self.csv_path {
            let mut buffer = Vec::new();
            let rows = export_csv(model, &mut buffer)?;
            self.storage.write_file(csv_path, &buffer).await?;
            tracing::info!("📄 Exported {} voxels to {}", rows, csv_path);
        }

        Ok(self.archive_path.clone())
    }
}

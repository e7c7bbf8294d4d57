use crate::adapters::{
    ArchiveSource, BilinearReprojector, BlockModelSource, LocalStorage, LogProgress, TracingReporter, XyzSource,
};
use crate::core::codec::ModelCodec;
use crate::core::engine::ModelEngine;
use crate::core::importer::ImportOptions;
use crate::domain::ports::ModelSource;
use crate::utils::error::{ModelError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub const SOURCE_TYPES: [&str; 3] = ["archive", "xyz", "block_model"];

/// A model job: which sources to load, whether to merge them, where to write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobSection,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub merge: Option<MergeConfig>,
    pub output: OutputConfig,
    pub import: Option<ImportConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    pub name: String,
    pub description: Option<String>,
    /// Directory every source and output path is relative to.
    pub base_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub r#type: String,
    pub path: String,
    /// Block models only: which label column to read.
    pub label_column: Option<String>,
    /// Archives only: key prefix of the stored model.
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub archive: String,
    pub csv: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub color_seed: Option<u64>,
    pub log_progress: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl JobConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ModelError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ModelError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn base_path(&self) -> &str {
        self.job.base_path.as_deref().unwrap_or(".")
    }

    /// Merging defaults to on whenever more than one source is listed.
    pub fn merge_enabled(&self) -> bool {
        self.merge
            .as_ref()
            .map(|m| m.enabled)
            .unwrap_or(self.sources.len() > 1)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            color_seed: self.import.as_ref().and_then(|i| i.color_seed),
        }
    }

    fn log_progress(&self) -> bool {
        self.import
            .as_ref()
            .and_then(|i| i.log_progress)
            .unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("job.name", &self.job.name)?;
        validation::validate_path("job.base_path", self.base_path())?;
        validation::validate_min_count("sources", self.sources.len(), 1)?;

        let mut seen = HashSet::new();
        for (n, source) in self.sources.iter().enumerate() {
            validation::validate_non_empty_string(&format!("sources[{}].name", n), &source.name)?;
            if !seen.insert(source.name.as_str()) {
                return Err(ModelError::InvalidConfigValueError {
                    field: format!("sources[{}].name", n),
                    value: source.name.clone(),
                    reason: "Source names must be unique".to_string(),
                });
            }
            if !SOURCE_TYPES.contains(&source.r#type.as_str()) {
                return Err(ModelError::InvalidConfigValueError {
                    field: format!("sources[{}].type", n),
                    value: source.r#type.clone(),
                    reason: format!("Unsupported source type. Valid types: {}", SOURCE_TYPES.join(", ")),
                });
            }
            validation::validate_path(&format!("sources[{}].path", n), &source.path)?;
            match source.r#type.as_str() {
                "archive" => {
                    validation::validate_archive_path(&format!("sources[{}].path", n), &source.path)?;
                    if let Some(prefix) = &source.prefix {
                        validation::validate_key_prefix(&format!("sources[{}].prefix", n), prefix)?;
                    }
                }
                "block_model" => {
                    if let Some(column) = &source.label_column {
                        validation::validate_non_empty_string(
                            &format!("sources[{}].label_column", n),
                            column,
                        )?;
                    }
                }
                _ => {}
            }
        }

        if self.merge_enabled() && self.sources.len() < 2 {
            return Err(ModelError::InvalidConfigValueError {
                field: "merge.enabled".to_string(),
                value: "true".to_string(),
                reason: "Merging needs at least two sources".to_string(),
            });
        }
        if !self.merge_enabled() && self.sources.len() > 1 {
            return Err(ModelError::InvalidConfigValueError {
                field: "merge.enabled".to_string(),
                value: "false".to_string(),
                reason: format!(
                    "{} sources listed but merging is disabled; only one model can be written",
                    self.sources.len()
                ),
            });
        }

        validation::validate_archive_path("output.archive", &self.output.archive)?;
        if let Some(csv) = &self.output.csv {
            validation::validate_extension("output.csv", csv, &["csv"])?;
        }
        if let Some(prefix) = &self.output.prefix {
            validation::validate_key_prefix("output.prefix", prefix)?;
        }

        Ok(())
    }

    fn build_source(&self, storage: &LocalStorage, source: &SourceConfig) -> Result<Box<dyn ModelSource>> {
        let storage = storage.clone();
        let boxed: Box<dyn ModelSource> = match source.r#type.as_str() {
            "archive" => {
                let archive = ArchiveSource::new(storage, &source.path);
                match &source.prefix {
                    Some(prefix) => Box::new(archive.with_prefix(prefix)),
                    None => Box::new(archive),
                }
            }
            "xyz" => Box::new(
                XyzSource::new(storage, &source.path, self.import_options())
                    .with_progress_logging(self.log_progress()),
            ),
            "block_model" => Box::new(
                BlockModelSource::new(storage, &source.path, self.import_options())
                    .with_label_column(source.label_column.clone())
                    .with_progress_logging(self.log_progress()),
            ),
            other => {
                return Err(ModelError::InvalidConfigValueError {
                    field: "sources.type".to_string(),
                    value: other.to_string(),
                    reason: format!("Unsupported source type. Valid types: {}", SOURCE_TYPES.join(", ")),
                })
            }
        };
        Ok(boxed)
    }

    /// Wires an engine over local storage rooted at `job.base_path`.
    pub fn build_engine(&self) -> Result<ModelEngine<LocalStorage>> {
        self.validate_config()?;
        let storage = LocalStorage::new(self.base_path());

        let mut engine = ModelEngine::new_with_monitoring(
            storage.clone(),
            Box::new(BilinearReprojector),
            &self.output.archive,
            self.monitoring_enabled(),
        )
        .with_reporter(Arc::new(TracingReporter));
        for source in &self.sources {
            engine = engine.with_source(self.build_source(&storage, source)?);
        }
        if let Some(prefix) = &self.output.prefix {
            engine = engine.with_codec(ModelCodec::with_prefix(prefix));
        }
        if let Some(csv) = &self.output.csv {
            engine = engine.with_csv_export(csv);
        }
        if self.log_progress() {
            engine = engine.with_progress(Arc::new(LogProgress));
        }
        Ok(engine)
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

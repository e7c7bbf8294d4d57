use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Degenerate {axis} axis: {detail}")]
    DegenerateAxis { axis: char, detail: String },

    #[error("Sample {coordinate} maps to {axis} cell {index}, outside grid of {len} cells")]
    OutOfBounds {
        axis: char,
        index: i64,
        len: usize,
        coordinate: f64,
    },

    #[error("A {numx}x{numy}x{numz} grid is too large to allocate")]
    GridTooLarge { numx: usize, numy: usize, numz: usize },

    #[error("Corrupt model record at key '{key}': {detail}")]
    CorruptRecord { key: String, detail: String },

    #[error("Models cannot be merged: {reason}")]
    IncompatibleMerge { reason: String },

    #[error("Raster layer '{layer}' has inconsistent shape: {detail}")]
    LayerShapeMismatch { layer: String, detail: String },

    #[error("Failed to parse source '{source_name}' at line {line}: {message}")]
    SourceParseError {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Import,
    Persistence,
    Merge,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ModelError {
    pub fn corrupt(key: impl Into<String>, detail: impl Into<String>) -> Self {
        ModelError::CorruptRecord {
            key: key.into(),
            detail: detail.into(),
        }
    }

    pub fn incompatible(reason: impl Into<String>) -> Self {
        ModelError::IncompatibleMerge {
            reason: reason.into(),
        }
    }

    pub fn layer_shape(layer: impl Into<String>, detail: impl Into<String>) -> Self {
        ModelError::LayerShapeMismatch {
            layer: layer.into(),
            detail: detail.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::DegenerateAxis { .. }
            | ModelError::OutOfBounds { .. }
            | ModelError::GridTooLarge { .. }
            | ModelError::SourceParseError { .. }
            | ModelError::CsvError(_) => ErrorCategory::Import,
            ModelError::CorruptRecord { .. }
            | ModelError::ZipError(_)
            | ModelError::SerializationError(_) => ErrorCategory::Persistence,
            ModelError::IncompatibleMerge { .. } | ModelError::LayerShapeMismatch { .. } => {
                ErrorCategory::Merge
            }
            ModelError::ConfigError { .. }
            | ModelError::ConfigValidationError { .. }
            | ModelError::InvalidConfigValueError { .. }
            | ModelError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ModelError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Import | ErrorCategory::Merge => ErrorSeverity::High,
            // a damaged archive may still be recoverable from another copy
            ErrorCategory::Persistence => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ModelError::DegenerateAxis { axis, .. } => format!(
                "A voxel model needs at least two evenly spaced samples along every axis; check the {} coordinates and cell sizes",
                axis
            ),
            ModelError::OutOfBounds { axis, .. } => format!(
                "Check the {} coordinates of the source for stray samples outside the surveyed block",
                axis
            ),
            ModelError::GridTooLarge { .. } => {
                "Check the coordinate units and cell sizes of the source; a stray sample far from the block inflates the grid".to_string()
            }
            ModelError::CorruptRecord { key, .. } => format!(
                "The archive entry '{}' is missing or malformed; re-export the model or restore a backup",
                key
            ),
            ModelError::IncompatibleMerge { .. } => {
                "Resample one model so both share the same cell sizes, and make sure both carry a Background lithology".to_string()
            }
            ModelError::LayerShapeMismatch { layer, .. } => format!(
                "Re-import the '{}' raster layer; its declared size does not match its data",
                layer
            ),
            ModelError::SourceParseError { .. } | ModelError::CsvError(_) => {
                "Check the source file format: x,y,z,label rows or a block model export".to_string()
            }
            ModelError::ZipError(_) | ModelError::SerializationError(_) => {
                "The archive could not be read or written; check that the file is a lithmod archive".to_string()
            }
            ModelError::IoError(_) => {
                "Check that the path exists and that you have read/write permission".to_string()
            }
            ModelError::ConfigError { .. }
            | ModelError::ConfigValidationError { .. }
            | ModelError::InvalidConfigValueError { .. }
            | ModelError::MissingConfigError { .. } => {
                "Fix the configuration value named above and run again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Import => format!("Could not build the voxel model: {}", self),
            ErrorCategory::Persistence => format!("Could not read or write the model archive: {}", self),
            ErrorCategory::Merge => format!("Could not merge the models: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

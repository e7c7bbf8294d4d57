use crate::adapters::archive::ModelArchive;
use crate::adapters::progress::LogProgress;
use crate::core::codec::ModelCodec;
use crate::core::importer::{BlockModelTable, GridImporter, ImportOptions, PointSample};
use crate::domain::catalogue::BACKGROUND;
use crate::domain::model::VoxelModel;
use crate::domain::ports::{Hooks, ModelSource, Storage};
use crate::utils::error::{ModelError, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

/// Columns before the first label column in a block model export:
/// `x, y, z, dx, dy, dz` and one more bookkeeping column.
const BLOCK_LABEL_OFFSET: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLayout {
    Comma,
    Whitespace,
}

impl TextLayout {
    /// `.csv` files are comma separated, anything else whitespace separated.
    pub fn from_path(path: &str) -> Self {
        let is_csv = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            TextLayout::Comma
        } else {
            TextLayout::Whitespace
        }
    }
}

fn parse_error(source_name: &str, line: usize, message: impl Into<String>) -> ModelError {
    ModelError::SourceParseError {
        source_name: source_name.to_string(),
        line,
        message: message.into(),
    }
}

fn parse_number(source_name: &str, line: usize, field: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|e| parse_error(source_name, line, format!("{} '{}': {}", field, text.trim(), e)))
}

fn sample_from_fields(source_name: &str, line: usize, fields: &[&str]) -> Result<PointSample> {
    if fields.len() != 3 && fields.len() != 4 {
        return Err(parse_error(
            source_name,
            line,
            format!("expected x, y, z[, label], found {} fields", fields.len()),
        ));
    }
    let label = fields
        .get(3)
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| BACKGROUND.to_string());
    Ok(PointSample::new(
        parse_number(source_name, line, "x", fields[0])?,
        parse_number(source_name, line, "y", fields[1])?,
        parse_number(source_name, line, "z", fields[2])?,
        label,
    ))
}

fn record_line(record: &StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

/// Reads `x, y, z[, label]` rows. Blank lines and `#` comments are skipped.
pub fn parse_xyz(source_name: &str, bytes: &[u8], layout: TextLayout) -> Result<Vec<PointSample>> {
    let mut samples = Vec::new();
    match layout {
        TextLayout::Comma => {
            let mut reader = ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .trim(Trim::All)
                .comment(Some(b'#'))
                .from_reader(bytes);
            for (n, record) in reader.records().enumerate() {
                let record = record?;
                let line = record_line(&record, n + 1);
                let fields: Vec<&str> = record.iter().collect();
                if fields.iter().all(|f| f.is_empty()) {
                    continue;
                }
                samples.push(sample_from_fields(source_name, line, &fields)?);
            }
        }
        TextLayout::Whitespace => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| parse_error(source_name, 0, format!("not UTF-8 text: {}", e)))?;
            for (n, raw) in text.lines().enumerate() {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                let fields: Vec<&str> = trimmed.split_whitespace().collect();
                samples.push(sample_from_fields(source_name, n + 1, &fields)?);
            }
        }
    }
    tracing::debug!("Parsed {} samples from '{}'", samples.len(), source_name);
    Ok(samples)
}

/// Reads a block model CSV export.
///
/// Leading `#` lines are skipped. The header's columns from the eighth on
/// name the label columns; `label_column` picks one by name, the first
/// otherwise. Cell sizes come from the first data row.
pub fn parse_block_model(
    source_name: &str,
    bytes: &[u8],
    label_column: Option<&str>,
) -> Result<BlockModelTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(bytes);
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record?,
        None => return Err(parse_error(source_name, 0, "no header row")),
    };
    let labels: Vec<&str> = header.iter().skip(BLOCK_LABEL_OFFSET).collect();
    if labels.is_empty() {
        return Err(parse_error(
            source_name,
            record_line(&header, 1),
            format!(
                "header has {} columns; label columns start at column {}",
                header.len(),
                BLOCK_LABEL_OFFSET + 1
            ),
        ));
    }
    let label_index = match label_column {
        Some(name) => {
            let position = labels.iter().position(|l| *l == name).ok_or_else(|| {
                parse_error(
                    source_name,
                    record_line(&header, 1),
                    format!("no label column '{}' (have: {})", name, labels.join(", ")),
                )
            })?;
            BLOCK_LABEL_OFFSET + position
        }
        None => BLOCK_LABEL_OFFSET,
    };
    tracing::debug!(
        "Block model '{}': using label column '{}'",
        source_name,
        header.get(label_index).unwrap_or_default()
    );

    let mut cell = None;
    let mut rows = Vec::new();
    for (n, record) in records.enumerate() {
        let record = record?;
        let line = record_line(&record, n + 2);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let field = |i: usize, name: &str| -> Result<&str> {
            record
                .get(i)
                .ok_or_else(|| parse_error(source_name, line, format!("missing {} column", name)))
        };
        if cell.is_none() {
            cell = Some([
                parse_number(source_name, line, "dx", field(3, "dx")?)?,
                parse_number(source_name, line, "dy", field(4, "dy")?)?,
                parse_number(source_name, line, "dz", field(5, "dz")?)?,
            ]);
        }
        rows.push(PointSample::new(
            parse_number(source_name, line, "x", field(0, "x")?)?,
            parse_number(source_name, line, "y", field(1, "y")?)?,
            parse_number(source_name, line, "z", field(2, "z")?)?,
            field(label_index, "label")?,
        ));
    }

    let cell = cell.ok_or_else(|| parse_error(source_name, 0, "no data rows"))?;
    Ok(BlockModelTable { cell, rows })
}

fn importer_hooks<'a>(log_progress: bool, progress: &'a LogProgress) -> Hooks<'a> {
    if log_progress {
        Hooks::default().with_progress(progress)
    } else {
        Hooks::default()
    }
}

/// A model previously written with [`ModelArchive`].
pub struct ArchiveSource<S: Storage> {
    storage: S,
    path: String,
    codec: ModelCodec,
}

impl<S: Storage> ArchiveSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
            codec: ModelCodec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.codec = ModelCodec::with_prefix(prefix);
        self
    }
}

#[async_trait]
impl<S: Storage> ModelSource for ArchiveSource<S> {
    fn name(&self) -> &str {
        &self.path
    }

    async fn load(&self) -> Result<VoxelModel> {
        let bytes = self.storage.read_file(&self.path).await?;
        let record = ModelArchive::from_bytes(&bytes)?;
        self.codec.decode(record)
    }
}

/// Scattered `x, y, z, label` text.
pub struct XyzSource<S: Storage> {
    storage: S,
    path: String,
    options: ImportOptions,
    log_progress: bool,
}

impl<S: Storage> XyzSource<S> {
    pub fn new(storage: S, path: impl Into<String>, options: ImportOptions) -> Self {
        Self {
            storage,
            path: path.into(),
            options,
            log_progress: false,
        }
    }

    pub fn with_progress_logging(mut self, enabled: bool) -> Self {
        self.log_progress = enabled;
        self
    }
}

#[async_trait]
impl<S: Storage> ModelSource for XyzSource<S> {
    fn name(&self) -> &str {
        &self.path
    }

    async fn load(&self) -> Result<VoxelModel> {
        let bytes = self.storage.read_file(&self.path).await?;
        let samples = parse_xyz(&self.path, &bytes, TextLayout::from_path(&self.path))?;
        let progress = LogProgress;
        GridImporter::new(self.options.clone())
            .with_hooks(importer_hooks(self.log_progress, &progress))
            .import_points(&samples)
    }
}

/// Block model CSV export.
pub struct BlockModelSource<S: Storage> {
    storage: S,
    path: String,
    label_column: Option<String>,
    options: ImportOptions,
    log_progress: bool,
}

impl<S: Storage> BlockModelSource<S> {
    pub fn new(storage: S, path: impl Into<String>, options: ImportOptions) -> Self {
        Self {
            storage,
            path: path.into(),
            label_column: None,
            options,
            log_progress: false,
        }
    }

    pub fn with_label_column(mut self, column: Option<String>) -> Self {
        self.label_column = column;
        self
    }

    pub fn with_progress_logging(mut self, enabled: bool) -> Self {
        self.log_progress = enabled;
        self
    }
}

#[async_trait]
impl<S: Storage> ModelSource for BlockModelSource<S> {
    fn name(&self) -> &str {
        &self.path
    }

    async fn load(&self) -> Result<VoxelModel> {
        let bytes = self.storage.read_file(&self.path).await?;
        let table = parse_block_model(&self.path, &bytes, self.label_column.as_deref())?;
        let progress = LogProgress;
        GridImporter::new(self.options.clone())
            .with_hooks(importer_hooks(self.log_progress, &progress))
            .import_block_model(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_follows_extension() {
        assert_eq!(TextLayout::from_path("model.CSV"), TextLayout::Comma);
        assert_eq!(TextLayout::from_path("model.txt"), TextLayout::Whitespace);
        assert_eq!(TextLayout::from_path("model"), TextLayout::Whitespace);
    }

    #[test]
    fn test_parse_xyz_comma() {
        let text = b"# survey 12\n0,0,0,Granite\n\n10, 0, 0, Shale\n10,10,0\n";
        let samples = parse_xyz("a.csv", text, TextLayout::Comma).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], PointSample::new(10.0, 0.0, 0.0, "Shale"));
        assert_eq!(samples[2].label, BACKGROUND);
    }

    #[test]
    fn test_parse_xyz_whitespace_reports_line() {
        let text = b"0 0 0 Granite\n1   0\t0 Granite\nx 0 0 Granite\n";
        let err = parse_xyz("a.txt", text, TextLayout::Whitespace).unwrap_err();
        assert!(matches!(err, ModelError::SourceParseError { line: 3, .. }));
    }

    #[test]
    fn test_parse_block_model_selects_label_column() {
        let text = b"# exported\n# units m\nx,y,z,dx,dy,dz,volume,lith,domain\n\
            5,5,5,10,10,10,1000,granite,north\n\
            15,5,5,10,10,10,1000,blank,south\n";
        let table = parse_block_model("bm.csv", text, Some("domain")).unwrap();
        assert_eq!(table.cell, [10.0, 10.0, 10.0]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].label, "north");

        let table = parse_block_model("bm.csv", text, None).unwrap();
        assert_eq!(table.rows[1].label, "blank");

        let err = parse_block_model("bm.csv", text, Some("colour")).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_block_model_without_label_columns() {
        let text = b"x,y,z,dx,dy,dz\n1,1,1,1,1,1\n";
        assert!(matches!(
            parse_block_model("bm.csv", text, None),
            Err(ModelError::SourceParseError { .. })
        ));
    }
}

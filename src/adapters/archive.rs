use crate::core::record::{ModelRecord, RecordValue};
use crate::utils::error::Result;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const ENTRY_SUFFIX: &str = ".json";

/// Zip container for model records: one deflated `<key>.json` entry per key,
/// in record order.
pub struct ModelArchive;

impl ModelArchive {
    pub fn to_bytes(record: &ModelRecord) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (key, value) in record.iter() {
            zip.start_file(format!("{}{}", key, ENTRY_SUFFIX), options)?;
            serde_json::to_writer(&mut zip, value)?;
            zip.flush()?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ModelRecord> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut record = ModelRecord::new();

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            let name = file.name().to_string();
            let Some(key) = name.strip_suffix(ENTRY_SUFFIX) else {
                tracing::warn!("Ignoring unexpected archive entry '{}'", name);
                continue;
            };
            let value: RecordValue = serde_json::from_reader(file)?;
            record.insert(key, value);
        }

        tracing::debug!("Read {} record entries from archive", record.len());
        Ok(record)
    }
}

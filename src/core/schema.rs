//! Record schema upgrades, applied once before decoding.
//!
//! All legacy fallbacks live here so the decoder only ever sees records in
//! the current shape. Records already at [`SCHEMA_VERSION`] pass through
//! untouched, which keeps encode/decode an exact round trip.

use crate::core::record::{LayerRecord, ModelRecord, RecordValue};
use crate::domain::model::{default_profile_x, default_profile_y, AxisRange};
use crate::utils::error::{ModelError, Result};
use std::collections::BTreeMap;
use tracing::debug;

pub const SCHEMA_VERSION: i64 = 2;
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Records with no version entry predate versioning.
const UNVERSIONED: i64 = 1;

pub fn upgrade(record: &mut ModelRecord, prefix: &str) -> Result<()> {
    let version_key = format!("{}{}", prefix, SCHEMA_VERSION_KEY);
    let version = match record.get(&version_key) {
        Some(_) => record.int(&version_key)?,
        None => UNVERSIONED,
    };
    if version > SCHEMA_VERSION {
        return Err(ModelError::corrupt(
            version_key,
            format!(
                "written by a newer schema (version {}, this build reads up to {})",
                version, SCHEMA_VERSION
            ),
        ));
    }
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    debug!("Upgrading model record from schema version {}", version);

    let layers_key = format!("{}griddata", prefix);
    match record.get_mut(&layers_key) {
        Some(RecordValue::Layers(layers)) => upgrade_layers(layers),
        Some(_) => {
            // leave it for the decoder to reject with the right kind
        }
        None => record.insert(layers_key, RecordValue::Layers(BTreeMap::new())),
    }

    synthesize_profiles(record, prefix)?;

    record.insert(version_key, RecordValue::Int(SCHEMA_VERSION));
    Ok(())
}

fn upgrade_layers(layers: &mut BTreeMap<String, LayerRecord>) {
    for (key, layer) in layers.iter_mut() {
        let mut dataid = layer.dataid.take().unwrap_or_default();
        if let Some(bandid) = layer.bandid.take() {
            if dataid.is_empty() {
                dataid = bandid;
            }
        }
        if dataid.is_empty() {
            dataid = key.clone();
        }
        layer.dataid = Some(dataid);

        if layer.mask.is_empty() && !layer.data.is_empty() {
            let null_bits = layer.nullvalue.to_bits();
            layer.mask = layer.data.iter().map(|v| v.to_bits() == null_bits).collect();
        }
    }

    // one pass: every layer without a spatial reference takes the first one found
    let shared_wkt = layers
        .values()
        .filter_map(|layer| layer.wkt.as_deref())
        .find(|wkt| !wkt.is_empty())
        .map(str::to_string);
    if let Some(wkt) = shared_wkt {
        for layer in layers.values_mut() {
            if layer.wkt.as_deref().map_or(true, str::is_empty) {
                layer.wkt = Some(wkt.clone());
            }
        }
    }
}

fn synthesize_profiles(record: &mut ModelRecord, prefix: &str) -> Result<()> {
    let xkey = format!("{}custprofx", prefix);
    let ykey = format!("{}custprofy", prefix);
    if !record.contains_key(&xkey) {
        let [min, max] = record.bounds(&format!("{}xrange", prefix))?;
        record.insert(
            xkey,
            RecordValue::Anchors(default_profile_x(&AxisRange::new(min, max))),
        );
    }
    if !record.contains_key(&ykey) {
        let [min, max] = record.bounds(&format!("{}yrange", prefix))?;
        record.insert(
            ykey,
            RecordValue::Anchors(default_profile_y(&AxisRange::new(min, max))),
        );
    }
    Ok(())
}

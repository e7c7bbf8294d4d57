use crate::utils::error::{ModelError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value in a flat model record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordValue {
    Int(i64),
    Float(#[serde(with = "f64_bit")] f64),
    Text(String),
    TextList(Vec<String>),
    Floats(#[serde(with = "f64_bits")] Vec<f64>),
    IntGrid { shape: Vec<usize>, data: Vec<i32> },
    ColorTable(BTreeMap<i32, [u8; 3]>),
    Anchors(BTreeMap<i32, (f64, f64)>),
    Layers(BTreeMap<String, LayerRecord>),
}

impl RecordValue {
    fn kind(&self) -> &'static str {
        match self {
            RecordValue::Int(_) => "int",
            RecordValue::Float(_) => "float",
            RecordValue::Text(_) => "text",
            RecordValue::TextList(_) => "text list",
            RecordValue::Floats(_) => "float array",
            RecordValue::IntGrid { .. } => "integer grid",
            RecordValue::ColorTable(_) => "colour table",
            RecordValue::Anchors(_) => "profile anchors",
            RecordValue::Layers(_) => "raster layers",
        }
    }
}

/// Stored form of a raster layer.
///
/// The optional fields cover records written before the display identifier
/// existed (`dataid`), with the old `bandid` name, or without a spatial
/// reference; `core::schema::upgrade` resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandid: Option<String>,
    #[serde(default)]
    pub wkt: Option<String>,
    pub cols: usize,
    pub rows: usize,
    pub xdim: f64,
    pub ydim: f64,
    pub tlx: f64,
    pub tly: f64,
    pub nullvalue: f64,
    #[serde(with = "f64_bits")]
    pub data: Vec<f64>,
    #[serde(default)]
    pub mask: Vec<bool>,
}

/// Floats travel as IEEE-754 bit patterns so NaN payloads, infinities and
/// masked fill values come back bit for bit.
mod f64_bit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}

mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| v.to_bits()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let bits = Vec::<u64>::deserialize(deserializer)?;
        Ok(bits.into_iter().map(f64::from_bits).collect())
    }
}

/// Flat, ordered key/value form of a voxel model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRecord {
    entries: IndexMap<String, RecordValue>,
}

impl ModelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RecordValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut RecordValue> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<RecordValue> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` in, overwriting on key clashes.
    pub fn extend(&mut self, other: ModelRecord) {
        self.entries.extend(other.entries);
    }

    fn require(&self, key: &str) -> Result<&RecordValue> {
        self.entries
            .get(key)
            .ok_or_else(|| ModelError::corrupt(key, "required entry is missing"))
    }

    fn wrong_kind(key: &str, expected: &str, found: &RecordValue) -> ModelError {
        ModelError::corrupt(key, format!("expected {}, found {}", expected, found.kind()))
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        match self.require(key)? {
            RecordValue::Int(v) => Ok(*v),
            other => Err(Self::wrong_kind(key, "int", other)),
        }
    }

    pub fn count(&self, key: &str) -> Result<usize> {
        let value = self.int(key)?;
        usize::try_from(value).map_err(|_| ModelError::corrupt(key, format!("negative size {}", value)))
    }

    /// Integers are accepted where a float is expected.
    pub fn float(&self, key: &str) -> Result<f64> {
        match self.require(key)? {
            RecordValue::Float(v) => Ok(*v),
            RecordValue::Int(v) => Ok(*v as f64),
            other => Err(Self::wrong_kind(key, "float", other)),
        }
    }

    pub fn floats(&self, key: &str) -> Result<&[f64]> {
        match self.require(key)? {
            RecordValue::Floats(v) => Ok(v),
            other => Err(Self::wrong_kind(key, "float array", other)),
        }
    }

    pub fn bounds(&self, key: &str) -> Result<[f64; 2]> {
        match self.floats(key)? {
            [min, max] => Ok([*min, *max]),
            other => Err(ModelError::corrupt(
                key,
                format!("expected two bounds, found {} values", other.len()),
            )),
        }
    }

    pub fn text_list(&self, key: &str) -> Result<&[String]> {
        match self.require(key)? {
            RecordValue::TextList(v) => Ok(v),
            other => Err(Self::wrong_kind(key, "text list", other)),
        }
    }

    pub fn color_table(&self, key: &str) -> Result<&BTreeMap<i32, [u8; 3]>> {
        match self.require(key)? {
            RecordValue::ColorTable(v) => Ok(v),
            other => Err(Self::wrong_kind(key, "colour table", other)),
        }
    }

    pub fn anchors(&self, key: &str) -> Result<&BTreeMap<i32, (f64, f64)>> {
        match self.require(key)? {
            RecordValue::Anchors(v) => Ok(v),
            other => Err(Self::wrong_kind(key, "profile anchors", other)),
        }
    }

    pub fn layers(&self, key: &str) -> Result<&BTreeMap<String, LayerRecord>> {
        match self.require(key)? {
            RecordValue::Layers(v) => Ok(v),
            other => Err(Self::wrong_kind(key, "raster layers", other)),
        }
    }

    /// Moves an integer grid out of the record.
    pub fn take_int_grid(&mut self, key: &str) -> Result<(Vec<usize>, Vec<i32>)> {
        match self.remove(key) {
            Some(RecordValue::IntGrid { shape, data }) => Ok((shape, data)),
            Some(other) => Err(Self::wrong_kind(key, "integer grid", &other)),
            None => Err(ModelError::corrupt(key, "required entry is missing")),
        }
    }
}

impl FromIterator<(String, RecordValue)> for ModelRecord {
    fn from_iter<T: IntoIterator<Item = (String, RecordValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ModelRecord {
    type Item = (String, RecordValue);
    type IntoIter = indexmap::map::IntoIter<String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

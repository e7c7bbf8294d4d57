use crate::domain::model::GeoData;
use crate::utils::error::{ModelError, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;

pub const BACKGROUND: &str = "Background";
pub const BACKGROUND_INDEX: i32 = 0;

pub type Rgb = [u8; 3];

/// Lithology catalogue: name ⇄ index ⇄ colour in one table.
///
/// Names keep insertion order (Background first). Every mutation goes through
/// this type, so the reverse index map and the colour table never drift from
/// the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LithCatalogue {
    entries: IndexMap<String, GeoData>,
    by_index: BTreeMap<i32, String>,
    colors: BTreeMap<i32, Rgb>,
}

impl LithCatalogue {
    pub fn new(background_color: Rgb) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(BACKGROUND.to_string(), GeoData::default());
        let mut by_index = BTreeMap::new();
        by_index.insert(BACKGROUND_INDEX, BACKGROUND.to_string());
        let mut colors = BTreeMap::new();
        colors.insert(BACKGROUND_INDEX, background_color);
        Self {
            entries,
            by_index,
            colors,
        }
    }

    /// Adds or replaces a lithology.
    ///
    /// Replacing keeps the entry's position. Fails if the index is held by a
    /// different name, or if Background and index 0 are not paired.
    pub fn insert(&mut self, name: &str, mut geodata: GeoData, index: i32, color: Rgb) -> Result<()> {
        if (name == BACKGROUND) != (index == BACKGROUND_INDEX) {
            return Err(ModelError::corrupt(
                format!("{}_lith_index", name),
                format!("index {} is reserved for {} only", BACKGROUND_INDEX, BACKGROUND),
            ));
        }
        if index < 0 {
            return Err(ModelError::corrupt(
                format!("{}_lith_index", name),
                format!("negative lithology index {}", index),
            ));
        }
        if let Some(holder) = self.by_index.get(&index) {
            if holder != name {
                return Err(ModelError::corrupt(
                    format!("{}_lith_index", name),
                    format!("index {} already used by '{}'", index, holder),
                ));
            }
        }
        if let Some(old) = self.entries.get(name) {
            let old_index = old.lith_index;
            self.by_index.remove(&old_index);
            self.colors.remove(&old_index);
        }

        geodata.lith_index = index;
        self.entries.insert(name.to_string(), geodata);
        self.by_index.insert(index, name.to_string());
        self.colors.insert(index, color);
        Ok(())
    }

    /// Removes a lithology. Background cannot be removed.
    pub fn remove(&mut self, name: &str) -> Option<GeoData> {
        if name == BACKGROUND {
            return None;
        }
        let geodata = self.entries.shift_remove(name)?;
        self.by_index.remove(&geodata.lith_index);
        self.colors.remove(&geodata.lith_index);
        Some(geodata)
    }

    pub fn get(&self, name: &str) -> Option<&GeoData> {
        self.entries.get(name)
    }

    /// Edits physical properties in place; the index cannot be changed this way.
    pub fn update_properties(&mut self, name: &str, edit: impl FnOnce(&mut GeoData)) -> bool {
        match self.entries.get_mut(name) {
            Some(geodata) => {
                let index = geodata.lith_index;
                edit(geodata);
                geodata.lith_index = index;
                true
            }
            None => false,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<i32> {
        self.entries.get(name).map(|g| g.lith_index)
    }

    pub fn name_of(&self, index: i32) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    pub fn color(&self, index: i32) -> Option<Rgb> {
        self.colors.get(&index).copied()
    }

    pub fn set_color(&mut self, index: i32, color: Rgb) -> bool {
        if !self.by_index.contains_key(&index) {
            return false;
        }
        self.colors.insert(index, color);
        true
    }

    pub fn colors(&self) -> &BTreeMap<i32, Rgb> {
        &self.colors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn contains_index(&self, index: i32) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GeoData)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_index(&self) -> i32 {
        self.by_index.keys().next_back().copied().unwrap_or(BACKGROUND_INDEX)
    }

    /// Points every lithology's sub-grid metadata at the model grid.
    pub fn refresh_grid_metadata(&mut self, numx: usize, numy: usize, numz: usize, dxy: f64, d_z: f64) {
        for geodata in self.entries.values_mut() {
            geodata.set_grid(numx, numy, numz, dxy, d_z);
        }
    }
}

impl Default for LithCatalogue {
    fn default() -> Self {
        Self::new([255, 255, 255])
    }
}

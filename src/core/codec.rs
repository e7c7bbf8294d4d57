use crate::core::record::{LayerRecord, ModelRecord, RecordValue};
use crate::core::schema::{self, SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::domain::catalogue::{LithCatalogue, BACKGROUND};
use crate::domain::model::{AxisRange, GeoData, InvariantViolation, LithGrid, VoxelModel};
use crate::domain::raster::Raster2D;
use crate::utils::error::{ModelError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Converts voxel models to and from flat [`ModelRecord`]s.
///
/// With a prefix every key is written as `<prefix><key>`, so several models
/// can share one archive.
#[derive(Debug, Clone, Default)]
pub struct ModelCodec {
    prefix: String,
}

impl ModelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn lith_key(&self, lithology: &str, field: &str) -> String {
        format!("{}{}_{}", self.prefix, lithology, field)
    }

    pub fn encode(&self, model: &VoxelModel) -> ModelRecord {
        let mut record = ModelRecord::new();
        self.encode_into(model, &mut record);
        record
    }

    /// Appends the model's entries to an existing record.
    pub fn encode_into(&self, model: &VoxelModel, record: &mut ModelRecord) {
        let (numx, numy, numz) = model.grid.dims();

        record.insert(self.key("gregional"), RecordValue::Float(model.gregional));
        record.insert(self.key("ght"), RecordValue::Float(model.ght));
        record.insert(self.key("mht"), RecordValue::Float(model.mht));
        record.insert(self.key("numx"), RecordValue::Int(numx as i64));
        record.insert(self.key("numy"), RecordValue::Int(numy as i64));
        record.insert(self.key("numz"), RecordValue::Int(numz as i64));
        record.insert(self.key("dxy"), RecordValue::Float(model.dxy));
        record.insert(self.key("d_z"), RecordValue::Float(model.d_z));
        record.insert(
            self.key("lith_index"),
            RecordValue::IntGrid {
                shape: vec![numx, numy, numz],
                data: model.grid.as_slice().to_vec(),
            },
        );
        for (name, range) in [
            ("xrange", &model.xrange),
            ("yrange", &model.yrange),
            ("zrange", &model.zrange),
        ] {
            record.insert(self.key(name), RecordValue::Floats(vec![range.min, range.max]));
        }
        record.insert(
            self.key("mlut"),
            RecordValue::ColorTable(model.catalogue.colors().clone()),
        );
        record.insert(self.key("custprofx"), RecordValue::Anchors(model.custprofx.clone()));
        record.insert(self.key("custprofy"), RecordValue::Anchors(model.custprofy.clone()));
        record.insert(
            self.key("griddata"),
            RecordValue::Layers(
                model
                    .layers
                    .iter()
                    .map(|(key, layer)| (key.clone(), LayerRecord::from(layer)))
                    .collect(),
            ),
        );

        for (name, geodata) in model.catalogue.iter() {
            self.encode_lithology(name, geodata, record);
        }

        record.insert(
            self.key("lithkeys"),
            RecordValue::TextList(model.catalogue.names().map(str::to_string).collect()),
        );
        record.insert(self.key(SCHEMA_VERSION_KEY), RecordValue::Int(SCHEMA_VERSION));
    }

    fn encode_lithology(&self, name: &str, g: &GeoData, record: &mut ModelRecord) {
        let floats = [
            ("hintn", g.hintn),
            ("finc", g.finc),
            ("fdec", g.fdec),
            ("zobsm", g.zobsm),
            ("susc", g.susc),
            ("mstrength", g.mstrength),
            ("qratio", g.qratio),
            ("minc", g.minc),
            ("mdec", g.mdec),
            ("density", g.density),
            ("bdensity", g.bdensity),
            ("dxy", g.g_dxy),
            ("d_z", g.d_z),
            ("zobsg", g.zobsg),
        ];
        for (field, value) in floats {
            record.insert(self.lith_key(name, field), RecordValue::Float(value));
        }
        let ints = [
            ("lith_index", g.lith_index as i64),
            ("numx", g.g_cols as i64),
            ("numy", g.g_rows as i64),
            ("numz", g.numz as i64),
        ];
        for (field, value) in ints {
            record.insert(self.lith_key(name, field), RecordValue::Int(value));
        }
        for (field, bounds) in [("x12", g.x12), ("y12", g.y12), ("z12", g.z12)] {
            record.insert(self.lith_key(name, field), RecordValue::Floats(bounds.to_vec()));
        }
    }

    /// Rebuilds a model. Legacy records are upgraded first.
    pub fn decode(&self, mut record: ModelRecord) -> Result<VoxelModel> {
        schema::upgrade(&mut record, &self.prefix)?;

        let numx = record.count(&self.key("numx"))?;
        let numy = record.count(&self.key("numy"))?;
        let numz = record.count(&self.key("numz"))?;

        let grid_key = self.key("lith_index");
        let (shape, data) = record.take_int_grid(&grid_key)?;
        if shape != [numx, numy, numz] {
            return Err(ModelError::corrupt(
                grid_key,
                format!("shape {:?} does not match {}x{}x{}", shape, numx, numy, numz),
            ));
        }
        let grid = LithGrid::from_vec(numx, numy, numz, data).ok_or_else(|| {
            ModelError::corrupt(
                self.key("lith_index"),
                format!("data length does not match shape {:?}", shape),
            )
        })?;

        let range = |name: &str| -> Result<AxisRange> {
            let [min, max] = record.bounds(&self.key(name))?;
            Ok(AxisRange::new(min, max))
        };
        let xrange = range("xrange")?;
        let yrange = range("yrange")?;
        let zrange = range("zrange")?;

        let model = VoxelModel {
            gregional: record.float(&self.key("gregional"))?,
            ght: record.float(&self.key("ght"))?,
            mht: record.float(&self.key("mht"))?,
            dxy: record.float(&self.key("dxy"))?,
            d_z: record.float(&self.key("d_z"))?,
            xrange,
            yrange,
            zrange,
            grid,
            catalogue: self.decode_catalogue(&record)?,
            layers: self.decode_layers(&record)?,
            custprofx: record.anchors(&self.key("custprofx"))?.clone(),
            custprofy: record.anchors(&self.key("custprofy"))?.clone(),
        };
        model.validate().map_err(|violation| self.inconsistency(violation))?;
        debug!(
            "Decoded {}x{}x{} model with {} lithologies and {} layers",
            numx,
            numy,
            numz,
            model.catalogue.len(),
            model.layers.len()
        );
        Ok(model)
    }

    /// Names the record entry a decoded model's inconsistency comes from.
    fn inconsistency(&self, violation: InvariantViolation) -> ModelError {
        let key = match &violation {
            InvariantViolation::CellSize { .. } => self.key("dxy"),
            InvariantViolation::Extent { axis, .. } => self.key(&format!("{}range", axis)),
            InvariantViolation::MissingBackground(_) => self.key("lithkeys"),
            InvariantViolation::OrphanIndex(_) => self.key("lith_index"),
            InvariantViolation::MissingColor(_) => self.key("mlut"),
            InvariantViolation::Layer { .. } => self.key("griddata"),
        };
        ModelError::corrupt(key, violation.to_string())
    }

    fn decode_catalogue(&self, record: &ModelRecord) -> Result<LithCatalogue> {
        let mlut_key = self.key("mlut");
        let colors = record.color_table(&mlut_key)?;
        let names = record.text_list(&self.key("lithkeys"))?;

        let background_color = colors.get(&0).copied().unwrap_or([255, 255, 255]);
        let mut catalogue = LithCatalogue::new(background_color);

        for name in names {
            if name == BACKGROUND && !record.contains_key(&self.lith_key(name, "hintn")) {
                // an implicit Background keeps its synthesized defaults
                continue;
            }
            let geodata = self.decode_lithology(name, record)?;
            let index = geodata.lith_index;
            let color = colors.get(&index).copied().ok_or_else(|| {
                ModelError::corrupt(
                    mlut_key.clone(),
                    format!("no colour for lithology '{}' (index {})", name, index),
                )
            })?;
            catalogue.insert(name, geodata, index, color)?;
        }
        Ok(catalogue)
    }

    fn decode_lithology(&self, name: &str, record: &ModelRecord) -> Result<GeoData> {
        let float = |field: &str| record.float(&self.lith_key(name, field));
        let count = |field: &str| record.count(&self.lith_key(name, field));

        let index_key = self.lith_key(name, "lith_index");
        let lith_index = i32::try_from(record.int(&index_key)?)
            .map_err(|_| ModelError::corrupt(index_key, "index out of range"))?;

        let mut geodata = GeoData {
            hintn: float("hintn")?,
            finc: float("finc")?,
            fdec: float("fdec")?,
            zobsm: float("zobsm")?,
            zobsg: float("zobsg")?,
            susc: float("susc")?,
            mstrength: float("mstrength")?,
            qratio: float("qratio")?,
            minc: float("minc")?,
            mdec: float("mdec")?,
            density: float("density")?,
            bdensity: float("bdensity")?,
            lith_index,
            g_cols: count("numx")?,
            g_rows: count("numy")?,
            numz: count("numz")?,
            g_dxy: float("dxy")?,
            d_z: float("d_z")?,
            ..GeoData::default()
        };
        geodata.set_xyz12();

        // stored bounding boxes win over recomputed ones when present
        for (field, target) in [
            ("x12", &mut geodata.x12),
            ("y12", &mut geodata.y12),
            ("z12", &mut geodata.z12),
        ] {
            let key = self.lith_key(name, field);
            if record.contains_key(&key) {
                *target = record.bounds(&key)?;
            }
        }
        Ok(geodata)
    }

    fn decode_layers(&self, record: &ModelRecord) -> Result<BTreeMap<String, Raster2D>> {
        let mut layers = BTreeMap::new();
        for (key, stored) in record.layers(&self.key("griddata"))? {
            let layer = Raster2D {
                dataid: stored.dataid.clone().unwrap_or_else(|| key.clone()),
                cols: stored.cols,
                rows: stored.rows,
                xdim: stored.xdim,
                ydim: stored.ydim,
                tlx: stored.tlx,
                tly: stored.tly,
                wkt: stored.wkt.clone().unwrap_or_default(),
                nullvalue: stored.nullvalue,
                data: stored.data.clone(),
                mask: stored.mask.clone(),
            };
            layer.check_shape()?;
            layers.insert(key.clone(), layer);
        }
        Ok(layers)
    }
}

impl From<&Raster2D> for LayerRecord {
    fn from(layer: &Raster2D) -> Self {
        LayerRecord {
            dataid: Some(layer.dataid.clone()),
            bandid: None,
            wkt: Some(layer.wkt.clone()),
            cols: layer.cols,
            rows: layer.rows,
            xdim: layer.xdim,
            ydim: layer.ydim,
            tlx: layer.tlx,
            tly: layer.tly,
            nullvalue: layer.nullvalue,
            data: layer.data.clone(),
            mask: layer.mask.clone(),
        }
    }
}

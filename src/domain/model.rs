use crate::domain::catalogue::{LithCatalogue, BACKGROUND, BACKGROUND_INDEX};
use crate::domain::raster::Raster2D;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Grid value of a cell no source ever wrote.
pub const UNSET: i32 = -1;

/// Fractional cell coordinates this close to an integer are treated as on the boundary.
pub const SNAP_EPSILON: f64 = 1e-9;

/// Floor with a boundary tolerance: `2.9999999999` lands in cell 3, not 2.
pub fn snap_floor(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value.floor()
    }
}

/// Physical properties of one lithology, plus the sub-grid it was authored on.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoData {
    pub hintn: f64,
    pub finc: f64,
    pub fdec: f64,
    pub zobsm: f64,
    pub zobsg: f64,
    pub susc: f64,
    pub mstrength: f64,
    pub qratio: f64,
    pub minc: f64,
    pub mdec: f64,
    pub density: f64,
    pub bdensity: f64,
    pub lith_index: i32,
    pub g_cols: usize,
    pub g_rows: usize,
    pub numz: usize,
    pub g_dxy: f64,
    pub d_z: f64,
    pub x12: [f64; 2],
    pub y12: [f64; 2],
    pub z12: [f64; 2],
}

impl Default for GeoData {
    fn default() -> Self {
        let mut geodata = Self {
            hintn: 30000.0,
            finc: -63.0,
            fdec: -17.0,
            zobsm: -1.0,
            zobsg: -1.0,
            susc: 0.01,
            mstrength: 0.0,
            qratio: 0.0,
            minc: -63.0,
            mdec: -17.0,
            density: 2.75,
            bdensity: 2.67,
            lith_index: BACKGROUND_INDEX,
            g_cols: 10,
            g_rows: 10,
            numz: 10,
            g_dxy: 1000.0,
            d_z: 100.0,
            x12: [0.0; 2],
            y12: [0.0; 2],
            z12: [0.0; 2],
        };
        geodata.set_xyz12();
        geodata
    }
}

impl GeoData {
    pub fn set_grid(&mut self, numx: usize, numy: usize, numz: usize, dxy: f64, d_z: f64) {
        self.g_cols = numx;
        self.g_rows = numy;
        self.numz = numz;
        self.g_dxy = dxy;
        self.d_z = d_z;
        self.set_xyz12();
    }

    /// Recomputes the cached cell limits of the kernel cube at the far corner of the sub-grid.
    pub fn set_xyz12(&mut self) {
        let xedge = self.g_cols as f64 * self.g_dxy;
        let yedge = self.g_rows as f64 * self.g_dxy;
        let zedge = self.numz as f64 * self.d_z;
        self.x12 = [xedge - self.g_dxy / 2.0, xedge + self.g_dxy / 2.0];
        self.y12 = [yedge - self.g_dxy / 2.0, yedge + self.g_dxy / 2.0];
        self.z12 = [zedge - self.d_z / 2.0, zedge + self.d_z / 2.0];
    }
}

/// Inclusive world bounds along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn union(&self, other: &AxisRange) -> AxisRange {
        AxisRange::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn contains_range(&self, other: &AxisRange) -> bool {
        self.min <= other.min && self.max >= other.max
    }

    /// Whole cells of size `cell` covering the span.
    pub fn cell_count(&self, cell: f64) -> usize {
        ((self.span() / cell) - SNAP_EPSILON).ceil().max(1.0) as usize
    }
}

/// Dense lithology-index grid, stored `[col][row][layer]` with layer fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LithGrid {
    numx: usize,
    numy: usize,
    numz: usize,
    data: Vec<i32>,
}

impl LithGrid {
    /// Panics if the cell count overflows; see [`try_new`](Self::try_new) for untrusted sizes.
    pub fn new(numx: usize, numy: usize, numz: usize, fill: i32) -> Self {
        let cells = Self::cell_count(numx, numy, numz)
            .unwrap_or_else(|| panic!("{}x{}x{} grid overflows the cell count", numx, numy, numz));
        Self {
            numx,
            numy,
            numz,
            data: vec![fill; cells],
        }
    }

    /// `None` when the cell count overflows or the cells cannot be allocated.
    pub fn try_new(numx: usize, numy: usize, numz: usize, fill: i32) -> Option<Self> {
        let cells = Self::cell_count(numx, numy, numz)?;
        let mut data = Vec::new();
        data.try_reserve_exact(cells).ok()?;
        data.resize(cells, fill);
        Some(Self {
            numx,
            numy,
            numz,
            data,
        })
    }

    pub fn cell_count(numx: usize, numy: usize, numz: usize) -> Option<usize> {
        numx.checked_mul(numy)?.checked_mul(numz)
    }

    pub fn from_vec(numx: usize, numy: usize, numz: usize, data: Vec<i32>) -> Option<Self> {
        if Self::cell_count(numx, numy, numz) != Some(data.len()) {
            return None;
        }
        Some(Self {
            numx,
            numy,
            numz,
            data,
        })
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.numx, self.numy, self.numz)
    }

    pub fn numx(&self) -> usize {
        self.numx
    }

    pub fn numy(&self) -> usize {
        self.numy
    }

    pub fn numz(&self) -> usize {
        self.numz
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.numy + j) * self.numz + k
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<i32> {
        if i >= self.numx || j >= self.numy || k >= self.numz {
            return None;
        }
        Some(self.data[self.offset(i, j, k)])
    }

    /// Panics if the cell is outside the grid.
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: i32) {
        assert!(
            i < self.numx && j < self.numy && k < self.numz,
            "cell ({}, {}, {}) outside {}x{}x{} grid",
            i,
            j,
            k,
            self.numx,
            self.numy,
            self.numz
        );
        let offset = self.offset(i, j, k);
        self.data[offset] = value;
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.data
    }

    pub fn replace(&mut self, from: i32, to: i32) -> usize {
        let mut replaced = 0;
        for value in self.data.iter_mut().filter(|v| **v == from) {
            *value = to;
            replaced += 1;
        }
        replaced
    }

    pub fn count(&self, value: i32) -> usize {
        self.data.iter().filter(|v| **v == value).count()
    }

    pub fn distinct_values(&self) -> BTreeSet<i32> {
        self.data.iter().copied().collect()
    }

    pub fn max_value(&self) -> i32 {
        self.data.iter().copied().max().unwrap_or(UNSET)
    }
}

/// Placement of a grid in world space: top-left-top corner, spacing and dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    pub xmin: f64,
    pub ymax: f64,
    pub zmax: f64,
    pub dxy: f64,
    pub d_z: f64,
    pub numx: usize,
    pub numy: usize,
    pub numz: usize,
}

impl GridFrame {
    /// Copies `grid` (laid out on `self`) onto `target`; uncovered cells get `fill`.
    ///
    /// Origins are snapped to whole cells of the target spacing.
    pub fn reframe(&self, grid: &LithGrid, target: &GridFrame, fill: i32) -> LithGrid {
        let di = ((self.xmin - target.xmin) / target.dxy).round() as i64;
        let dj = ((target.ymax - self.ymax) / target.dxy).round() as i64;
        let dk = ((target.zmax - self.zmax) / target.d_z).round() as i64;

        let mut out = LithGrid::new(target.numx, target.numy, target.numz, fill);
        let (numx, numy, numz) = grid.dims();
        for i in 0..numx {
            let ti = i as i64 + di;
            if ti < 0 || ti >= target.numx as i64 {
                continue;
            }
            for j in 0..numy {
                let tj = j as i64 + dj;
                if tj < 0 || tj >= target.numy as i64 {
                    continue;
                }
                for k in 0..numz {
                    let tk = k as i64 + dk;
                    if tk < 0 || tk >= target.numz as i64 {
                        continue;
                    }
                    if let Some(value) = grid.get(i, j, k) {
                        out.set(ti as usize, tj as usize, tk as usize, value);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("non-positive cell size (dxy = {dxy}, d_z = {d_z})")]
    CellSize { dxy: f64, d_z: f64 },

    #[error("{axis} range spans {span} but {cells} cells of {cell} give {expected}")]
    Extent {
        axis: char,
        span: f64,
        cells: usize,
        cell: f64,
        expected: f64,
    },

    #[error("lithology '{0}' is missing from the catalogue")]
    MissingBackground(&'static str),

    #[error("grid holds index {0} with no catalogue entry")]
    OrphanIndex(i32),

    #[error("lithology index {0} has no colour")]
    MissingColor(i32),

    #[error("raster layer '{layer}': {detail}")]
    Layer { layer: String, detail: String },
}

/// The 3D lithology model.
///
/// Cell `[i, j, k]` sits at `x = xmin + i·dxy`, `y = ymax − j·dxy`,
/// `z = zmax − k·d_z`: rows run south and layers run down.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelModel {
    pub gregional: f64,
    pub ght: f64,
    pub mht: f64,
    pub dxy: f64,
    pub d_z: f64,
    pub xrange: AxisRange,
    pub yrange: AxisRange,
    pub zrange: AxisRange,
    pub grid: LithGrid,
    pub catalogue: LithCatalogue,
    pub layers: BTreeMap<String, Raster2D>,
    pub custprofx: BTreeMap<i32, (f64, f64)>,
    pub custprofy: BTreeMap<i32, (f64, f64)>,
}

impl Default for VoxelModel {
    fn default() -> Self {
        Self {
            gregional: 100.0,
            ght: 0.0,
            mht: 100.0,
            dxy: 1.0,
            d_z: 1.0,
            xrange: AxisRange::new(0.0, 0.0),
            yrange: AxisRange::new(0.0, 0.0),
            zrange: AxisRange::new(0.0, 0.0),
            grid: LithGrid::new(0, 0, 0, UNSET),
            catalogue: LithCatalogue::default(),
            layers: BTreeMap::new(),
            custprofx: BTreeMap::new(),
            custprofy: BTreeMap::new(),
        }
    }
}

impl VoxelModel {
    pub fn numx(&self) -> usize {
        self.grid.numx()
    }

    pub fn numy(&self) -> usize {
        self.grid.numy()
    }

    pub fn numz(&self) -> usize {
        self.grid.numz()
    }

    pub fn frame(&self) -> GridFrame {
        GridFrame {
            xmin: self.xrange.min,
            ymax: self.yrange.max,
            zmax: self.zrange.max,
            dxy: self.dxy,
            d_z: self.d_z,
            numx: self.numx(),
            numy: self.numy(),
            numz: self.numz(),
        }
    }

    pub fn cell_origin(&self, i: usize, j: usize, k: usize) -> (f64, f64, f64) {
        (
            self.xrange.min + i as f64 * self.dxy,
            self.yrange.max - j as f64 * self.dxy,
            self.zrange.max - k as f64 * self.d_z,
        )
    }

    /// Cell containing a world point, if inside the grid.
    pub fn cell_at(&self, x: f64, y: f64, z: f64) -> Option<(usize, usize, usize)> {
        let i = snap_floor((x - self.xrange.min) / self.dxy);
        let j = snap_floor((self.yrange.max - y) / self.dxy);
        let k = snap_floor((self.zrange.max - z) / self.d_z);
        if i < 0.0 || j < 0.0 || k < 0.0 {
            return None;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= self.numx() || j >= self.numy() || k >= self.numz() {
            return None;
        }
        Some((i, j, k))
    }

    /// Lithology name at a world point; `None` outside the grid or on unset cells.
    pub fn lithology_at(&self, x: f64, y: f64, z: f64) -> Option<&str> {
        let (i, j, k) = self.cell_at(x, y, z)?;
        let index = self.grid.get(i, j, k)?;
        self.catalogue.name_of(index)
    }

    pub fn set_default_profiles(&mut self) {
        self.custprofx = default_profile_x(&self.xrange);
        self.custprofy = default_profile_y(&self.yrange);
    }

    pub fn voxel_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for value in self.grid.as_slice() {
            *counts.entry(*value).or_insert(0) += 1;
        }
        counts
    }

    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.dxy <= 0.0 || self.d_z <= 0.0 || !self.dxy.is_finite() || !self.d_z.is_finite() {
            return Err(InvariantViolation::CellSize {
                dxy: self.dxy,
                d_z: self.d_z,
            });
        }

        for (axis, range, cells, cell) in [
            ('x', &self.xrange, self.numx(), self.dxy),
            ('y', &self.yrange, self.numy(), self.dxy),
            ('z', &self.zrange, self.numz(), self.d_z),
        ] {
            let expected = cells as f64 * cell;
            let tolerance = 1e-6 * range.span().abs().max(cell);
            if (expected - range.span()).abs() > tolerance {
                return Err(InvariantViolation::Extent {
                    axis,
                    span: range.span(),
                    cells,
                    cell,
                    expected,
                });
            }
        }

        if self.catalogue.index_of(BACKGROUND) != Some(BACKGROUND_INDEX) {
            return Err(InvariantViolation::MissingBackground(BACKGROUND));
        }

        for value in self.grid.distinct_values() {
            if value != UNSET && !self.catalogue.contains_index(value) {
                return Err(InvariantViolation::OrphanIndex(value));
            }
        }

        for (_, geodata) in self.catalogue.iter() {
            if self.catalogue.color(geodata.lith_index).is_none() {
                return Err(InvariantViolation::MissingColor(geodata.lith_index));
            }
        }

        for (key, layer) in &self.layers {
            layer.check_shape().map_err(|e| InvariantViolation::Layer {
                layer: key.clone(),
                detail: e.to_string(),
            })?;
        }

        Ok(())
    }

    pub fn summary(&self) -> ModelSummary {
        let counts = self.voxel_counts();
        ModelSummary {
            dims: self.grid.dims(),
            dxy: self.dxy,
            d_z: self.d_z,
            xrange: self.xrange,
            yrange: self.yrange,
            zrange: self.zrange,
            lithologies: self
                .catalogue
                .iter()
                .map(|(name, g)| {
                    (
                        name.to_string(),
                        g.lith_index,
                        counts.get(&g.lith_index).copied().unwrap_or(0),
                    )
                })
                .collect(),
            unset_cells: counts.get(&UNSET).copied().unwrap_or(0),
            layers: self.layers.keys().cloned().collect(),
        }
    }
}

pub fn default_profile_x(xrange: &AxisRange) -> BTreeMap<i32, (f64, f64)> {
    BTreeMap::from([(0, (xrange.min, xrange.max))])
}

pub fn default_profile_y(yrange: &AxisRange) -> BTreeMap<i32, (f64, f64)> {
    BTreeMap::from([(0, (yrange.min, yrange.min))])
}

#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub dims: (usize, usize, usize),
    pub dxy: f64,
    pub d_z: f64,
    pub xrange: AxisRange,
    pub yrange: AxisRange,
    pub zrange: AxisRange,
    /// (name, index, voxel count)
    pub lithologies: Vec<(String, i32, usize)>,
    pub unset_cells: usize,
    pub layers: Vec<String>,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Grid: {} x {} x {} (dxy = {}, d_z = {})",
            self.dims.0, self.dims.1, self.dims.2, self.dxy, self.d_z
        )?;
        writeln!(f, "X: [{}, {}]", self.xrange.min, self.xrange.max)?;
        writeln!(f, "Y: [{}, {}]", self.yrange.min, self.yrange.max)?;
        writeln!(f, "Z: [{}, {}]", self.zrange.min, self.zrange.max)?;
        writeln!(f, "Lithologies:")?;
        for (name, index, count) in &self.lithologies {
            writeln!(f, "  {:>3}  {:<24} {} voxels", index, name, count)?;
        }
        writeln!(f, "Unset voxels: {}", self.unset_cells)?;
        if self.layers.is_empty() {
            write!(f, "Raster layers: none")
        } else {
            write!(f, "Raster layers: {}", self.layers.join(", "))
        }
    }
}

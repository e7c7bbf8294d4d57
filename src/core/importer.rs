use crate::core::progress::track;
use crate::domain::model::{
    snap_floor, AxisRange, GeoData, InvariantViolation, LithGrid, VoxelModel, SNAP_EPSILON, UNSET,
};
use crate::domain::ports::Hooks;
use crate::domain::{LithCatalogue, Rgb, BACKGROUND, BACKGROUND_INDEX};
use crate::utils::error::{ModelError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

/// Label that block-model exports use for empty cells.
pub const BLANK_LABEL: &str = "blank";

#[derive(Debug, Clone, PartialEq)]
pub struct PointSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub label: String,
}

impl PointSample {
    pub fn new(x: f64, y: f64, z: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            y,
            z,
            label: label.into(),
        }
    }

    fn is_background(&self) -> bool {
        self.label == BACKGROUND || self.label == BLANK_LABEL
    }
}

/// Rows of a block model export: one row per cell centre, with the cell size given up front.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockModelTable {
    pub cell: [f64; 3],
    pub rows: Vec<PointSample>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Seed for lithology colours; random when `None`.
    pub color_seed: Option<u64>,
}

/// Distinct coordinates along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisLattice {
    min: f64,
    max: f64,
    /// Largest gap between consecutive distinct coordinates.
    cell: f64,
    distinct: usize,
}

fn analyse_axis(axis: char, values: impl Iterator<Item = f64>) -> Result<AxisLattice> {
    let mut distinct: Vec<f64> = values.collect();
    if let Some(bad) = distinct.iter().find(|v| !v.is_finite()) {
        return Err(ModelError::DegenerateAxis {
            axis,
            detail: format!("non-finite coordinate {}", bad),
        });
    }
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let (min, max) = match (distinct.first(), distinct.last()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => {
            return Err(ModelError::DegenerateAxis {
                axis,
                detail: "no samples".to_string(),
            })
        }
    };

    let cell = distinct
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0_f64, f64::max);

    Ok(AxisLattice {
        min,
        max,
        cell,
        distinct: distinct.len(),
    })
}

fn require_cell(axis: char, cell: f64) -> Result<()> {
    if cell <= 0.0 || !cell.is_finite() {
        return Err(ModelError::DegenerateAxis {
            axis,
            detail: format!("cell size {} is not positive", cell),
        });
    }
    Ok(())
}

/// Cells spanning `span` at spacing `cell`, counting both end samples. Saturates.
fn lattice_cells(span: f64, cell: f64) -> usize {
    let gaps = (span / cell - SNAP_EPSILON).ceil() as usize;
    gaps.saturating_add(1)
}

fn allocate_grid(numx: usize, numy: usize, numz: usize, fill: i32) -> Result<LithGrid> {
    LithGrid::try_new(numx, numy, numz, fill).ok_or(ModelError::GridTooLarge { numx, numy, numz })
}

fn cell_index(axis: char, offset: f64, cell: f64, len: usize, coordinate: f64) -> Result<usize> {
    let index = snap_floor(offset / cell);
    if index < 0.0 || index >= len as f64 {
        return Err(ModelError::OutOfBounds {
            axis,
            index: index as i64,
            len,
            coordinate,
        });
    }
    Ok(index as usize)
}

/// Builds voxel models from scattered labelled points or block model rows.
pub struct GridImporter<'a> {
    options: ImportOptions,
    hooks: Hooks<'a>,
}

impl<'a> GridImporter<'a> {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Snaps scattered `(x, y, z, label)` samples onto a regular grid.
    ///
    /// Cells no sample lands in stay [`UNSET`].
    pub fn import_points(&self, samples: &[PointSample]) -> Result<VoxelModel> {
        let x = analyse_axis('x', samples.iter().map(|s| s.x))?;
        let y = analyse_axis('y', samples.iter().map(|s| s.y))?;
        let z = analyse_axis('z', samples.iter().map(|s| s.z))?;

        for (axis, lattice) in [('x', &x), ('y', &y), ('z', &z)] {
            if lattice.distinct < 2 {
                return Err(ModelError::DegenerateAxis {
                    axis,
                    detail: format!("single distinct coordinate {}", lattice.min),
                });
            }
            require_cell(axis, lattice.cell)?;
        }

        // the finer of the two horizontal spacings, so no column of samples is lost
        let dxy = x.cell.min(y.cell);
        let d_z = z.cell;

        let numx = lattice_cells(x.max - x.min, dxy);
        let numy = lattice_cells(y.max - y.min, dxy);
        let numz = lattice_cells(z.max - z.min, d_z);
        let grid = allocate_grid(numx, numy, numz, UNSET)?;

        let xmin = x.min - dxy / 2.0;
        let ymax = y.max + dxy / 2.0;
        let zmax = z.max + d_z / 2.0;

        let mut model = VoxelModel {
            dxy,
            d_z,
            xrange: AxisRange::new(xmin, xmin + numx as f64 * dxy),
            yrange: AxisRange::new(ymax - numy as f64 * dxy, ymax),
            zrange: AxisRange::new(zmax - numz as f64 * d_z, zmax),
            grid,
            ..VoxelModel::default()
        };

        tracing::debug!(
            "Point import: {} samples onto {}x{}x{} grid (dxy = {}, d_z = {})",
            samples.len(),
            numx,
            numy,
            numz,
            dxy,
            d_z
        );

        self.populate(&mut model, samples)?;
        Ok(model)
    }

    /// Same as [`import_points`](Self::import_points) for pre-split columns.
    pub fn import_columns(
        &self,
        x: &[f64],
        y: &[f64],
        z: &[f64],
        labels: &[String],
    ) -> Result<VoxelModel> {
        let len = x.len();
        if y.len() != len || z.len() != len || labels.len() != len {
            return Err(ModelError::SourceParseError {
                source_name: "columns".to_string(),
                line: 0,
                message: format!(
                    "column lengths differ: x={}, y={}, z={}, label={}",
                    len,
                    y.len(),
                    z.len(),
                    labels.len()
                ),
            });
        }

        let samples: Vec<PointSample> = (0..len)
            .map(|i| PointSample::new(x[i], y[i], z[i], labels[i].clone()))
            .collect();
        self.import_points(&samples)
    }

    /// Ragged rows of `x, y, z[, label]`; a row without a label is Background.
    pub fn import_rows(&self, rows: &[Vec<String>]) -> Result<VoxelModel> {
        let mut samples = Vec::with_capacity(rows.len());
        for (n, row) in rows.iter().enumerate() {
            let line = n + 1;
            if row.len() != 3 && row.len() != 4 {
                return Err(ModelError::SourceParseError {
                    source_name: "rows".to_string(),
                    line,
                    message: format!("expected 3 or 4 fields, found {}", row.len()),
                });
            }
            let coordinate = |i: usize| -> Result<f64> {
                row[i].trim().parse::<f64>().map_err(|e| ModelError::SourceParseError {
                    source_name: "rows".to_string(),
                    line,
                    message: format!("field {} '{}': {}", i + 1, row[i], e),
                })
            };
            let label = row
                .get(3)
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| BACKGROUND.to_string());
            samples.push(PointSample::new(coordinate(0)?, coordinate(1)?, coordinate(2)?, label));
        }
        self.import_points(&samples)
    }

    /// Block models list every cell centre, so the grid is exactly the distinct coordinates.
    ///
    /// The grid starts as Background; `blank` rows stay Background.
    pub fn import_block_model(&self, table: &BlockModelTable) -> Result<VoxelModel> {
        let [xcell, ycell, zcell] = table.cell;
        require_cell('x', xcell)?;
        require_cell('y', ycell)?;
        require_cell('z', zcell)?;

        let x = analyse_axis('x', table.rows.iter().map(|s| s.x))?;
        let y = analyse_axis('y', table.rows.iter().map(|s| s.y))?;
        let z = analyse_axis('z', table.rows.iter().map(|s| s.z))?;

        let dxy = xcell.max(ycell);
        let d_z = zcell;
        if (xcell - ycell).abs() > SNAP_EPSILON * dxy {
            tracing::warn!(
                "Block model cells are {} x {}; the model uses square {} cells",
                xcell,
                ycell,
                dxy
            );
        }
        let grid = allocate_grid(x.distinct, y.distinct, z.distinct, BACKGROUND_INDEX)?;

        let mut model = VoxelModel {
            dxy,
            d_z,
            xrange: AxisRange::new(x.min - dxy / 2.0, x.max + dxy / 2.0),
            yrange: AxisRange::new(y.min - dxy / 2.0, y.max + dxy / 2.0),
            zrange: AxisRange::new(z.min - d_z / 2.0, z.max + d_z / 2.0),
            grid,
            ..VoxelModel::default()
        };

        tracing::debug!(
            "Block model import: {} rows onto {}x{}x{} grid (dxy = {}, d_z = {})",
            table.rows.len(),
            x.distinct,
            y.distinct,
            z.distinct,
            dxy,
            d_z
        );

        self.populate(&mut model, &table.rows)?;

        // non-square cells leave the extents out of step with the cell counts
        if let Err(violation) = model.validate() {
            let axis = match &violation {
                InvariantViolation::Extent { axis, .. } => *axis,
                _ => 'x',
            };
            return Err(ModelError::DegenerateAxis {
                axis,
                detail: format!("block model does not form a regular grid: {}", violation),
            });
        }
        Ok(model)
    }

    fn random_colors(&self) -> StdRng {
        match self.options.color_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Builds the catalogue from the labels, then writes every sample into its cell.
    fn populate(&self, model: &mut VoxelModel, samples: &[PointSample]) -> Result<()> {
        let mut rng = self.random_colors();
        let labels: BTreeSet<&str> = samples
            .iter()
            .filter(|s| !s.is_background())
            .map(|s| s.label.as_str())
            .collect();

        let background_color: Rgb = rng.gen();
        let mut catalogue = LithCatalogue::new(background_color);
        for (n, label) in labels.iter().enumerate() {
            let color: Rgb = rng.gen();
            catalogue.insert(label, GeoData::default(), n as i32 + 1, color)?;
        }
        catalogue.refresh_grid_metadata(model.numx(), model.numy(), model.numz(), model.dxy, model.d_z);

        let (numx, numy, numz) = model.grid.dims();
        for sample in track(samples, "Snapping samples to grid", self.hooks.progress) {
            let i = cell_index('x', sample.x - model.xrange.min, model.dxy, numx, sample.x)?;
            let j = cell_index('y', model.yrange.max - sample.y, model.dxy, numy, sample.y)?;
            let k = cell_index('z', model.zrange.max - sample.z, model.d_z, numz, sample.z)?;

            let value = if sample.is_background() {
                BACKGROUND_INDEX
            } else {
                catalogue.index_of(&sample.label).unwrap_or(UNSET)
            };
            model.grid.set(i, j, k, value);
        }

        model.catalogue = catalogue;
        model.set_default_profiles();

        self.hooks.report(&format!(
            "Imported {} samples into {} lithologies",
            samples.len(),
            labels.len()
        ));
        tracing::info!(
            "Imported {} samples: {} lithologies, {} unset cells",
            samples.len(),
            labels.len(),
            model.grid.count(UNSET)
        );
        Ok(())
    }
}

impl Default for GridImporter<'_> {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(nx: usize, ny: usize, nz: usize, step: f64) -> Vec<PointSample> {
        let mut samples = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let label = if i < nx / 2 { "Granite" } else { "Shale" };
                    samples.push(PointSample::new(
                        i as f64 * step,
                        j as f64 * step,
                        -(k as f64) * step,
                        label,
                    ));
                }
            }
        }
        samples
    }

    fn seeded() -> GridImporter<'static> {
        GridImporter::new(ImportOptions {
            color_seed: Some(7),
        })
    }

    #[test]
    fn test_analyse_axis_uses_largest_gap() {
        let lattice = analyse_axis('x', [0.0, 10.0, 10.0, 30.0, 20.0].into_iter()).unwrap();
        assert_eq!(lattice.cell, 10.0);
        assert_eq!(lattice.distinct, 4);
        assert_eq!((lattice.min, lattice.max), (0.0, 30.0));
    }

    #[test]
    fn test_regular_lattice_fills_every_cell() {
        let samples = lattice(4, 3, 2, 10.0);
        let model = seeded().import_points(&samples).unwrap();

        assert_eq!(model.grid.dims(), (4, 3, 2));
        assert_eq!(model.dxy, 10.0);
        assert_eq!(model.xrange, AxisRange::new(-5.0, 35.0));
        assert_eq!(model.yrange, AxisRange::new(-5.0, 25.0));
        assert_eq!(model.zrange, AxisRange::new(-15.0, 5.0));
        assert_eq!(model.grid.count(UNSET), 0);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_indices_are_compact_and_sorted_by_label() {
        let samples = vec![
            PointSample::new(0.0, 0.0, 0.0, "Shale"),
            PointSample::new(1.0, 0.0, 0.0, "Granite"),
            PointSample::new(0.0, 1.0, 0.0, "blank"),
            PointSample::new(1.0, 1.0, 1.0, "Granite"),
        ];
        let model = seeded().import_points(&samples).unwrap();

        assert_eq!(model.catalogue.index_of("Granite"), Some(1));
        assert_eq!(model.catalogue.index_of("Shale"), Some(2));
        assert_eq!(model.catalogue.len(), 3);
        assert_eq!(model.lithology_at(0.0, 1.0, 0.0), Some(BACKGROUND));
        assert_eq!(model.lithology_at(1.0, 0.0, 0.0), Some("Granite"));
        // half of the 2x2x2 grid was never sampled
        assert_eq!(model.grid.count(UNSET), 4);
    }

    #[test]
    fn test_single_layer_is_degenerate() {
        let samples = vec![
            PointSample::new(0.0, 0.0, 5.0, "Granite"),
            PointSample::new(1.0, 1.0, 5.0, "Granite"),
        ];
        let err = seeded().import_points(&samples).unwrap_err();
        assert!(matches!(err, ModelError::DegenerateAxis { axis: 'z', .. }));
    }

    #[test]
    fn test_empty_source_is_degenerate() {
        let err = seeded().import_points(&[]).unwrap_err();
        assert!(matches!(err, ModelError::DegenerateAxis { axis: 'x', .. }));
    }

    #[test]
    fn test_columns_must_line_up() {
        let err = seeded()
            .import_columns(&[0.0, 1.0], &[0.0], &[0.0, 1.0], &["A".into(), "B".into()])
            .unwrap_err();
        assert!(matches!(err, ModelError::SourceParseError { .. }));
    }

    #[test]
    fn test_rows_without_label_are_background() {
        let rows: Vec<Vec<String>> = vec![
            vec!["0".into(), "0".into(), "0".into(), "Granite".into()],
            vec!["1".into(), "1".into(), "1".into()],
        ];
        let model = seeded().import_rows(&rows).unwrap();
        assert_eq!(model.lithology_at(1.0, 1.0, 1.0), Some(BACKGROUND));
        assert_eq!(model.catalogue.len(), 2);

        let bad: Vec<Vec<String>> = vec![vec!["0".into(), "x".into(), "0".into()]];
        assert!(matches!(
            seeded().import_rows(&bad),
            Err(ModelError::SourceParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_block_model_starts_as_background() {
        let table = BlockModelTable {
            cell: [5.0, 5.0, 2.0],
            rows: vec![
                PointSample::new(2.5, 2.5, -1.0, "Dolerite"),
                PointSample::new(7.5, 2.5, -1.0, "blank"),
                PointSample::new(2.5, 7.5, -3.0, "Dolerite"),
            ],
        };
        let model = seeded().import_block_model(&table).unwrap();

        assert_eq!(model.grid.dims(), (2, 2, 2));
        assert_eq!(model.xrange, AxisRange::new(0.0, 10.0));
        assert_eq!(model.zrange, AxisRange::new(-4.0, 0.0));
        assert_eq!(model.grid.count(UNSET), 0);
        assert_eq!(model.grid.count(1), 2);
        assert_eq!(model.lithology_at(2.5, 7.5, -3.0), Some("Dolerite"));
    }

    #[test]
    fn test_block_model_rejects_zero_cell() {
        let table = BlockModelTable {
            cell: [5.0, 0.0, 2.0],
            rows: vec![PointSample::new(2.5, 2.5, -1.0, "Dolerite")],
        };
        assert!(matches!(
            seeded().import_block_model(&table),
            Err(ModelError::DegenerateAxis { axis: 'y', .. })
        ));
    }

    #[test]
    fn test_block_model_with_rectangular_cells_is_refused() {
        let table = BlockModelTable {
            cell: [5.0, 10.0, 2.0],
            rows: vec![
                PointSample::new(2.5, 5.0, -1.0, "Dolerite"),
                PointSample::new(7.5, 5.0, -1.0, "Dolerite"),
            ],
        };
        assert!(matches!(
            seeded().import_block_model(&table),
            Err(ModelError::DegenerateAxis { axis: 'x', .. })
        ));
    }

    #[test]
    fn test_runaway_extent_is_too_large() {
        let samples = vec![
            PointSample::new(0.0, 0.0, 0.0, "Granite"),
            PointSample::new(1e18, 1e-12, 0.0, "Granite"),
            PointSample::new(0.0, 0.0, -1.0, "Granite"),
        ];
        assert!(matches!(
            seeded().import_points(&samples),
            Err(ModelError::GridTooLarge { numy: 2, .. })
        ));
    }

    #[test]
    fn test_seeded_colors_are_repeatable() {
        let samples = lattice(2, 2, 2, 1.0);
        let a = seeded().import_points(&samples).unwrap();
        let b = seeded().import_points(&samples).unwrap();
        assert_eq!(a.catalogue.colors(), b.catalogue.colors());
    }
}

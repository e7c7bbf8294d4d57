use crate::core::progress::track;
use crate::core::raster_merge::{gmerge, is_blended, BLEND_LAYERS};
use crate::domain::catalogue::{LithCatalogue, BACKGROUND, BACKGROUND_INDEX};
use crate::domain::model::{AxisRange, GridFrame, InvariantViolation, VoxelModel, UNSET};
use crate::domain::ports::{Hooks, Reprojector};
use crate::domain::raster::Raster2D;
use crate::utils::error::{ModelError, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Relative difference under which two cell sizes count as the same.
const SPACING_TOLERANCE: f64 = 1e-6;

/// Unions a slave model into a master model.
///
/// The master keeps precedence everywhere: its spacing, its profile anchors,
/// its lithology properties and colours for shared names, and its voxel and
/// raster values wherever it has any. Nothing is written to the master until
/// every step has succeeded.
pub struct ModelMerger<'a> {
    reprojector: &'a dyn Reprojector,
    hooks: Hooks<'a>,
}

impl<'a> ModelMerger<'a> {
    pub fn new(reprojector: &'a dyn Reprojector) -> Self {
        Self {
            reprojector,
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn merge(&self, master: &mut VoxelModel, slave: &VoxelModel) -> Result<()> {
        check_model("master", master)?;
        check_model("slave", slave)?;
        check_spacing('x', master.dxy, slave.dxy)?;
        check_spacing('z', master.d_z, slave.d_z)?;
        check_alignment(master, slave);

        let dxy = master.dxy;
        let d_z = master.d_z;

        let xunion = master.xrange.union(&slave.xrange);
        let yunion = master.yrange.union(&slave.yrange);
        let zunion = master.zrange.union(&slave.zrange);
        let numx = xunion.cell_count(dxy);
        let numy = yunion.cell_count(dxy);
        let numz = zunion.cell_count(d_z);
        let xrange = AxisRange::new(xunion.min, xunion.min + numx as f64 * dxy);
        let yrange = AxisRange::new(yunion.max - numy as f64 * dxy, yunion.max);
        let zrange = AxisRange::new(zunion.max - numz as f64 * d_z, zunion.max);

        info!(
            "🔀 Merging {}x{}x{} slave into {}x{}x{} master -> {}x{}x{}",
            slave.numx(),
            slave.numy(),
            slave.numz(),
            master.numx(),
            master.numy(),
            master.numz(),
            numx,
            numy,
            numz
        );
        self.hooks
            .report(&format!("Merging models onto a {} x {} x {} grid", numx, numy, numz));

        let layers = self.blend_layers(master, slave, &xrange, &yrange)?;

        let target = GridFrame {
            xmin: xrange.min,
            ymax: yrange.max,
            zmax: zrange.max,
            dxy,
            d_z,
            numx,
            numy,
            numz,
        };
        let mut master_grid = master.frame().reframe(&master.grid, &target, UNSET);
        let mut slave_grid = slave.frame().reframe(&slave.grid, &target, UNSET);

        // union of names, master's order first; Background is never renumbered
        let mut names: Vec<&str> = master
            .catalogue
            .names()
            .filter(|name| *name != BACKGROUND)
            .collect();
        for name in slave.catalogue.names() {
            if name != BACKGROUND && !master.catalogue.contains(name) {
                names.push(name);
            }
        }

        // temporary indices sit above every live index so relabelling one
        // lithology can never capture cells of another
        let base = master
            .catalogue
            .max_index()
            .max(slave.catalogue.max_index())
            .saturating_add(1);
        let background_color = master
            .catalogue
            .color(BACKGROUND_INDEX)
            .unwrap_or([255, 255, 255]);
        let mut catalogue = LithCatalogue::new(background_color);
        if let Some(background) = master.catalogue.get(BACKGROUND) {
            catalogue.insert(BACKGROUND, background.clone(), BACKGROUND_INDEX, background_color)?;
        }

        let relabel = track(names.iter().enumerate(), "Relabelling lithologies", self.hooks.progress);
        for (position, name) in relabel {
            let final_index = i32::try_from(position + 1)
                .map_err(|_| ModelError::incompatible("too many lithologies to index"))?;
            let temporary = base
                .checked_add(final_index)
                .ok_or_else(|| ModelError::incompatible("lithology indices overflow"))?;

            if let Some(old) = slave.catalogue.index_of(name) {
                slave_grid.replace(old, temporary);
            }
            if let Some(old) = master.catalogue.index_of(name) {
                master_grid.replace(old, temporary);
            }

            let (source, role) = if master.catalogue.contains(name) {
                (&master.catalogue, "master")
            } else {
                (&slave.catalogue, "slave")
            };
            let (Some(geodata), Some(old)) = (source.get(name), source.index_of(name)) else {
                continue;
            };
            let color = source.color(old).ok_or_else(|| {
                ModelError::incompatible(format!(
                    "{} lithology '{}' has no colour",
                    role, name
                ))
            })?;
            debug!("Lithology '{}' ({} index {}) -> {}", name, role, old, final_index);
            catalogue.insert(name, geodata.clone(), final_index, color)?;
        }

        let mut filled = 0usize;
        for (cell, incoming) in track(
            master_grid.as_mut_slice().iter_mut().zip(slave_grid.as_slice()),
            "Filling voxels",
            self.hooks.progress,
        ) {
            if (*cell == BACKGROUND_INDEX || *cell == UNSET) && *incoming != UNSET {
                if *cell != *incoming {
                    filled += 1;
                }
                *cell = *incoming;
            }
            if *cell > base {
                *cell -= base;
            }
        }
        catalogue.refresh_grid_metadata(numx, numy, numz, dxy, d_z);

        master.xrange = xrange;
        master.yrange = yrange;
        master.zrange = zrange;
        master.grid = master_grid;
        master.catalogue = catalogue;
        master.layers = layers;

        info!(
            "✅ Merge complete: {} lithologies, {} voxels filled from slave",
            master.catalogue.len(),
            filled
        );
        Ok(())
    }

    fn blend_layers(
        &self,
        master: &VoxelModel,
        slave: &VoxelModel,
        xrange: &AxisRange,
        yrange: &AxisRange,
    ) -> Result<BTreeMap<String, Raster2D>> {
        let mut layers = master.layers.clone();
        for key in BLEND_LAYERS {
            let (Some(primary), Some(secondary)) = (master.layers.get(key), slave.layers.get(key)) else {
                continue;
            };
            self.hooks.report(&format!("Blending {}", key));
            let blended = gmerge(primary, secondary, xrange, yrange, self.reprojector)?;
            layers.insert(key.to_string(), blended);
        }

        for key in master.layers.keys().filter(|k| !is_blended(k)) {
            warn!("Layer '{}' is not blended; keeping master's copy", key);
        }
        for key in slave.layers.keys().filter(|k| !is_blended(k)) {
            debug!("Dropping slave layer '{}'", key);
        }
        Ok(layers)
    }
}

fn check_model(role: &str, model: &VoxelModel) -> Result<()> {
    model.validate().map_err(|violation| match violation {
        InvariantViolation::Layer { layer, detail } => ModelError::layer_shape(layer, detail),
        other => ModelError::incompatible(format!("{} model: {}", role, other)),
    })
}

fn check_spacing(axis: char, master: f64, slave: f64) -> Result<()> {
    let difference = (master - slave).abs();
    if difference > SPACING_TOLERANCE * master.abs() {
        return Err(ModelError::incompatible(format!(
            "{} spacing differs (master {}, slave {})",
            if axis == 'z' { "vertical" } else { "horizontal" },
            master,
            slave
        )));
    }
    if difference > 0.0 {
        warn!(
            "Spacing mismatch on {} inside tolerance (master {}, slave {}); using master's",
            axis, master, slave
        );
    }
    Ok(())
}

fn check_alignment(master: &VoxelModel, slave: &VoxelModel) {
    for (axis, offset, cell) in [
        ('x', slave.xrange.min - master.xrange.min, master.dxy),
        ('y', master.yrange.max - slave.yrange.max, master.dxy),
        ('z', master.zrange.max - slave.zrange.max, master.d_z),
    ] {
        let cells = offset / cell;
        if (cells - cells.round()).abs() > SPACING_TOLERANCE {
            warn!(
                "Slave {} origin is {:.3} cells off master's lattice; snapping to the nearest cell",
                axis, cells
            );
        }
    }
}

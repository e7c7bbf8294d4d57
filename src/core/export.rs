use crate::domain::model::{VoxelModel, UNSET};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct VoxelRow<'a> {
    x: f64,
    y: f64,
    z: f64,
    density: f64,
    susceptibility: f64,
    lith_index: i32,
    lithology: &'a str,
}

/// Writes one CSV row per assigned voxel and returns the row count.
///
/// Coordinates are the cell origins (`xmin + i·dxy`, `ymax − j·dxy`,
/// `zmax − k·d_z`). Unset cells are skipped.
pub fn export_csv<W: Write>(model: &VoxelModel, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let (numx, numy, numz) = model.grid.dims();
    let mut rows = 0;

    for i in 0..numx {
        for j in 0..numy {
            for k in 0..numz {
                let Some(index) = model.grid.get(i, j, k) else {
                    continue;
                };
                if index == UNSET {
                    continue;
                }
                let Some(name) = model.catalogue.name_of(index) else {
                    tracing::warn!("Skipping voxel ({}, {}, {}) with unknown index {}", i, j, k, index);
                    continue;
                };
                let Some(geodata) = model.catalogue.get(name) else {
                    continue;
                };
                let (x, y, z) = model.cell_origin(i, j, k);
                csv.serialize(VoxelRow {
                    x,
                    y,
                    z,
                    density: geodata.density,
                    susceptibility: geodata.susc,
                    lith_index: index,
                    lithology: name,
                })?;
                rows += 1;
            }
        }
    }

    if rows == 0 {
        // serialize() only emits the header with the first record
        csv.write_record([
            "x",
            "y",
            "z",
            "density",
            "susceptibility",
            "lith_index",
            "lithology",
        ])?;
    }
    csv.flush()?;
    Ok(rows)
}

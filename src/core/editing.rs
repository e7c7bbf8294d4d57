use crate::domain::model::VoxelModel;
use crate::utils::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which family of 2D slices a ranged copy walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceAxis {
    /// Horizontal layer at fixed `k`.
    Layer,
    /// East-west profile at fixed row `j`.
    EastWest,
    /// North-south profile at fixed column `i`.
    NorthSouth,
}

impl SliceAxis {
    fn label(&self) -> char {
        match self {
            SliceAxis::Layer => 'z',
            SliceAxis::EastWest => 'y',
            SliceAxis::NorthSouth => 'x',
        }
    }

    fn slice_count(&self, model: &VoxelModel) -> usize {
        match self {
            SliceAxis::Layer => model.numz(),
            SliceAxis::EastWest => model.numy(),
            SliceAxis::NorthSouth => model.numx(),
        }
    }

    /// Extent of one slice as (a, b).
    fn slice_dims(&self, model: &VoxelModel) -> (usize, usize) {
        match self {
            SliceAxis::Layer => (model.numx(), model.numy()),
            SliceAxis::EastWest => (model.numx(), model.numz()),
            SliceAxis::NorthSouth => (model.numy(), model.numz()),
        }
    }

    fn cell(&self, slice: usize, a: usize, b: usize) -> (usize, usize, usize) {
        match self {
            SliceAxis::Layer => (a, b, slice),
            SliceAxis::EastWest => (a, slice, b),
            SliceAxis::NorthSouth => (slice, a, b),
        }
    }
}

/// Copies selected lithologies from one slice into a range of slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangedCopy {
    pub axis: SliceAxis,
    pub master: usize,
    pub start: usize,
    pub end: usize,
    /// Lithologies taken from the master slice.
    pub copy: Vec<String>,
    /// Lithologies in the target slices that may be replaced.
    pub overwrite: Vec<String>,
}

fn resolve(model: &VoxelModel, field: &str, names: &[String]) -> Result<BTreeSet<i32>> {
    names
        .iter()
        .map(|name| {
            model
                .catalogue
                .index_of(name)
                .ok_or_else(|| ModelError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: name.clone(),
                    reason: "no such lithology in the model".to_string(),
                })
        })
        .collect()
}

/// Applies the copy and returns how many voxels changed.
///
/// A target cell takes the master slice's value only when the master cell
/// holds a `copy` lithology and the target cell holds an `overwrite` one.
/// The range is inclusive, swapped if reversed and clamped to the axis.
pub fn ranged_copy(model: &mut VoxelModel, request: &RangedCopy) -> Result<usize> {
    let copy = resolve(model, "copy", &request.copy)?;
    let overwrite = resolve(model, "overwrite", &request.overwrite)?;

    let axis = request.axis;
    let count = axis.slice_count(model);
    if request.master >= count {
        return Err(ModelError::OutOfBounds {
            axis: axis.label(),
            index: request.master as i64,
            len: count,
            coordinate: request.master as f64,
        });
    }

    let (mut start, mut end) = (request.start, request.end);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    let end = end.min(count - 1);

    let (na, nb) = axis.slice_dims(model);
    let mut source = Vec::with_capacity(na * nb);
    for a in 0..na {
        for b in 0..nb {
            let (i, j, k) = axis.cell(request.master, a, b);
            source.push(model.grid.get(i, j, k).filter(|value| copy.contains(value)));
        }
    }

    let mut changed = 0;
    for slice in start..=end {
        for a in 0..na {
            for b in 0..nb {
                let Some(value) = source[a * nb + b] else {
                    continue;
                };
                let (i, j, k) = axis.cell(slice, a, b);
                match model.grid.get(i, j, k) {
                    Some(current) if overwrite.contains(&current) && current != value => {
                        model.grid.set(i, j, k, value);
                        changed += 1;
                    }
                    _ => {}
                }
            }
        }
    }

    debug!(
        "Ranged copy along {} from slice {} into {}..={}: {} voxels changed",
        axis.label(),
        request.master,
        start,
        end,
        changed
    );
    Ok(changed)
}

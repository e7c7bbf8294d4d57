use crate::domain::model::AxisRange;
use crate::domain::ports::{Reprojector, SourceRaster};
use crate::domain::raster::{GeoTransform, Raster2D, DEFAULT_NULL_VALUE};
use crate::utils::error::{ModelError, Result};
use tracing::debug;

/// Layers a merge blends; anything else is never combined.
pub const BLEND_LAYERS: [&str; 5] = [
    "DTM Dataset",
    "Magnetic Dataset",
    "Gravity Dataset",
    "Study Area Dataset",
    "Gravity Regional",
];

/// Values at or below this after reprojection are treated as no-data.
const VALID_FLOOR: f64 = 0.1;
/// Headroom above the shifted maximum before a value counts as a blow-up.
const VALID_HEADROOM: f64 = 1000.0;

pub fn is_blended(key: &str) -> bool {
    BLEND_LAYERS.contains(&key)
}

/// One input resampled onto the union grid.
struct Resampled {
    values: Vec<f64>,
    valid: Vec<bool>,
}

/// Blends `slave` into `master` over the footprint `xrange` × `yrange`.
///
/// The result is on master's cell size and spatial reference. Master wins
/// wherever it has a value; slave only fills cells master leaves masked.
pub fn gmerge(
    master: &Raster2D,
    slave: &Raster2D,
    xrange: &AxisRange,
    yrange: &AxisRange,
    reprojector: &dyn Reprojector,
) -> Result<Raster2D> {
    master.check_shape()?;
    slave.check_shape()?;

    let cols = xrange.cell_count(master.xdim);
    let rows = yrange.cell_count(master.ydim);
    let target = GeoTransform::new(xrange.min, master.xdim, yrange.max, master.ydim);
    debug!(
        "Blending layer '{}' onto {}x{} cells at ({}, {})",
        master.dataid, cols, rows, xrange.min, yrange.max
    );

    let primary = resample(master, &master.dataid, &master.wkt, &target, cols, rows, reprojector)?;
    let secondary = resample(slave, &master.dataid, &master.wkt, &target, cols, rows, reprojector)?;

    let mut data = Vec::with_capacity(cols * rows);
    let mut mask = Vec::with_capacity(cols * rows);
    for i in 0..cols * rows {
        if primary.valid[i] {
            data.push(primary.values[i]);
            mask.push(false);
        } else if secondary.valid[i] {
            data.push(secondary.values[i]);
            mask.push(false);
        } else {
            data.push(DEFAULT_NULL_VALUE);
            mask.push(true);
        }
    }

    Ok(Raster2D {
        dataid: master.dataid.clone(),
        cols,
        rows,
        xdim: master.xdim,
        ydim: master.ydim,
        tlx: xrange.min,
        tly: yrange.max,
        wkt: master.wkt.clone(),
        nullvalue: DEFAULT_NULL_VALUE,
        data,
        mask,
    })
}

/// Shifts valid values above zero, reprojects, remasks and shifts back.
fn resample(
    layer: &Raster2D,
    dataid: &str,
    srs: &str,
    target: &GeoTransform,
    cols: usize,
    rows: usize,
    reprojector: &dyn Reprojector,
) -> Result<Resampled> {
    let (Some(min), Some(max)) = (layer.valid_min(), layer.valid_max()) else {
        return Ok(Resampled {
            values: vec![DEFAULT_NULL_VALUE; cols * rows],
            valid: vec![false; cols * rows],
        });
    };

    // 0 is the reprojection no-data value; every valid value must land at 1 or above
    let offset = if min < 1.0 + VALID_FLOOR { min - 1.0 } else { 0.0 };
    let shifted: Vec<f64> = layer
        .data
        .iter()
        .zip(&layer.mask)
        .map(|(v, masked)| if *masked { 0.0 } else { v - offset })
        .collect();
    let ceiling = max - offset + VALID_HEADROOM;

    let source = SourceRaster {
        values: &shifted,
        cols: layer.cols,
        rows: layer.rows,
    };
    let out = reprojector
        .reproject(&source, &layer.geotransform(), srs, target, cols, rows, srs)
        .map_err(|e| ModelError::layer_shape(dataid, format!("reprojection failed: {}", e)))?;
    if out.len() != cols * rows {
        return Err(ModelError::layer_shape(
            dataid,
            format!(
                "reprojection returned {} values for a {}x{} grid",
                out.len(),
                cols,
                rows
            ),
        ));
    }

    let valid: Vec<bool> = out.iter().map(|v| *v > VALID_FLOOR && *v < ceiling).collect();
    let values = out
        .iter()
        .zip(&valid)
        .map(|(v, ok)| if *ok { v + offset } else { DEFAULT_NULL_VALUE })
        .collect();
    Ok(Resampled { values, valid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::snap_floor;

    /// Takes the source cell under each target centre.
    struct NearestCell;

    impl Reprojector for NearestCell {
        fn reproject(
            &self,
            source: &SourceRaster<'_>,
            src: &GeoTransform,
            _src_srs: &str,
            dst: &GeoTransform,
            dst_cols: usize,
            dst_rows: usize,
            _dst_srs: &str,
        ) -> Result<Vec<f64>> {
            let mut out = vec![0.0; dst_cols * dst_rows];
            for row in 0..dst_rows {
                for col in 0..dst_cols {
                    let (x, y) = dst.cell_center(col, row);
                    let c = snap_floor((x - src.origin_x) / src.cell_x);
                    let r = snap_floor((src.origin_y - y) / src.cell_y);
                    if c >= 0.0 && r >= 0.0 && (c as usize) < source.cols && (r as usize) < source.rows {
                        out[row * dst_cols + col] = source.values[r as usize * source.cols + c as usize];
                    }
                }
            }
            Ok(out)
        }
    }

    struct Broken;

    impl Reprojector for Broken {
        fn reproject(
            &self,
            _source: &SourceRaster<'_>,
            _src: &GeoTransform,
            _src_srs: &str,
            _dst: &GeoTransform,
            _dst_cols: usize,
            _dst_rows: usize,
            _dst_srs: &str,
        ) -> Result<Vec<f64>> {
            Ok(vec![1.0])
        }
    }

    fn layer(values: Vec<f64>, cols: usize, tlx: f64) -> Raster2D {
        let rows = values.len() / cols;
        Raster2D::from_values("Gravity Dataset", cols, rows, values)
            .unwrap()
            .with_geometry(tlx, rows as f64, 1.0, 1.0)
    }

    #[test]
    fn test_master_wins_and_slave_fills_gaps() {
        let mut master = layer(vec![-5.0, 0.0, 7.0, 8.0], 4, 0.0);
        master.mask_cell(2, 0);
        master.mask_cell(3, 0);
        let slave = layer(vec![100.0, 200.0, 300.0, 400.0], 4, 0.0);

        let out = gmerge(
            &master,
            &slave,
            &AxisRange::new(0.0, 4.0),
            &AxisRange::new(0.0, 1.0),
            &NearestCell,
        )
        .unwrap();

        assert_eq!(out.cols, 4);
        assert_eq!(out.get(0, 0), Some(-5.0));
        assert_eq!(out.get(1, 0), Some(0.0));
        assert_eq!(out.get(2, 0), Some(300.0));
        assert_eq!(out.get(3, 0), Some(400.0));
    }

    #[test]
    fn test_small_positive_master_values_survive() {
        let mut master = layer(vec![0.05, 0.08, 0.0, 0.0], 4, 0.0);
        master.mask_cell(2, 0);
        master.mask_cell(3, 0);
        let slave = layer(vec![9.0, 9.0, 7.0, 8.0], 4, 0.0);

        let out = gmerge(
            &master,
            &slave,
            &AxisRange::new(0.0, 4.0),
            &AxisRange::new(0.0, 1.0),
            &NearestCell,
        )
        .unwrap();

        assert!((out.get(0, 0).unwrap() - 0.05).abs() < 1e-12);
        assert!((out.get(1, 0).unwrap() - 0.08).abs() < 1e-12);
        assert_eq!(out.get(2, 0), Some(7.0));
        assert_eq!(out.get(3, 0), Some(8.0));
    }

    #[test]
    fn test_union_footprint_masks_uncovered_cells() {
        let master = layer(vec![1.0, 2.0], 2, 0.0);
        let slave = layer(vec![3.0], 1, 3.0);

        let out = gmerge(
            &master,
            &slave,
            &AxisRange::new(0.0, 4.0),
            &AxisRange::new(0.0, 1.0),
            &NearestCell,
        )
        .unwrap();

        assert_eq!((out.tlx, out.tly), (0.0, 1.0));
        assert_eq!(out.get(0, 0), Some(1.0));
        assert_eq!(out.get(2, 0), None);
        assert_eq!(out.data[2], DEFAULT_NULL_VALUE);
        assert_eq!(out.get(3, 0), Some(3.0));
    }

    #[test]
    fn test_wrong_length_output_is_a_shape_error() {
        let master = layer(vec![1.0, 2.0], 2, 0.0);
        let err = gmerge(
            &master,
            &master.clone(),
            &AxisRange::new(0.0, 2.0),
            &AxisRange::new(0.0, 1.0),
            &Broken,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::LayerShapeMismatch { ref layer, .. } if layer == "Gravity Dataset"));
    }

    #[test]
    fn test_whitelist() {
        assert!(is_blended("Gravity Regional"));
        assert!(!is_blended("Calculated Gravity"));
    }
}

use crate::domain::model::SNAP_EPSILON;
use crate::domain::ports::{CoordinateTransform, Reprojector, SourceRaster};
use crate::domain::raster::GeoTransform;
use crate::utils::error::{ModelError, Result};

fn same_reference(src_srs: &str, dst_srs: &str) -> bool {
    src_srs.is_empty() || dst_srs.is_empty() || src_srs == dst_srs
}

fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value
    }
}

/// Bilinear resampling between grids that share a spatial reference.
///
/// No-data (`0.0` or non-finite) neighbours are left out and the remaining
/// weights renormalised. Target cells whose centre falls outside the source
/// footprint come back as `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearReprojector;

impl BilinearReprojector {
    fn sample(source: &SourceRaster<'_>, src: &GeoTransform, x: f64, y: f64) -> f64 {
        let u = snap((x - src.origin_x) / src.cell_x);
        let v = snap((src.origin_y - y) / src.cell_y);
        if u < 0.0 || v < 0.0 || u >= source.cols as f64 || v >= source.rows as f64 {
            return 0.0;
        }

        // fractional position relative to source cell centres
        let fx = snap(u - 0.5);
        let fy = snap(v - 0.5);
        let c0 = fx.floor();
        let r0 = fy.floor();
        let wx = fx - c0;
        let wy = fy - r0;

        let last_col = source.cols as i64 - 1;
        let last_row = source.rows as i64 - 1;
        let mut total = 0.0;
        let mut weight = 0.0;
        for (dc, dr, w) in [
            (0, 0, (1.0 - wx) * (1.0 - wy)),
            (1, 0, wx * (1.0 - wy)),
            (0, 1, (1.0 - wx) * wy),
            (1, 1, wx * wy),
        ] {
            if w <= 0.0 {
                continue;
            }
            let col = (c0 as i64 + dc).clamp(0, last_col) as usize;
            let row = (r0 as i64 + dr).clamp(0, last_row) as usize;
            let value = source.values[row * source.cols + col];
            if value == 0.0 || !value.is_finite() {
                continue;
            }
            total += w * value;
            weight += w;
        }

        if weight > 0.0 {
            total / weight
        } else {
            0.0
        }
    }
}

impl Reprojector for BilinearReprojector {
    fn reproject(
        &self,
        source: &SourceRaster<'_>,
        src_transform: &GeoTransform,
        src_srs: &str,
        dst_transform: &GeoTransform,
        dst_cols: usize,
        dst_rows: usize,
        dst_srs: &str,
    ) -> Result<Vec<f64>> {
        if !same_reference(src_srs, dst_srs) {
            return Err(ModelError::incompatible(format!(
                "bilinear resampling cannot change spatial reference ('{}' -> '{}')",
                src_srs, dst_srs
            )));
        }
        if source.values.len() != source.cols * source.rows {
            return Err(ModelError::layer_shape(
                "reprojection source",
                format!(
                    "{} values for a {}x{} grid",
                    source.values.len(),
                    source.cols,
                    source.rows
                ),
            ));
        }

        let mut out = vec![0.0; dst_cols * dst_rows];
        if source.cols == 0 || source.rows == 0 {
            return Ok(out);
        }
        for row in 0..dst_rows {
            for col in 0..dst_cols {
                let (x, y) = dst_transform.cell_center(col, row);
                out[row * dst_cols + col] = Self::sample(source, src_transform, x, y);
            }
        }
        Ok(out)
    }
}

/// Pass-through transform for points already in the target reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn transform_point(&self, src_srs: &str, dst_srs: &str, x: f64, y: f64) -> Result<(f64, f64)> {
        if !same_reference(src_srs, dst_srs) {
            return Err(ModelError::incompatible(format!(
                "no transform from '{}' to '{}'",
                src_srs, dst_srs
            )));
        }
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(values: &[f64], cols: usize) -> SourceRaster<'_> {
        SourceRaster {
            values,
            cols,
            rows: values.len() / cols,
        }
    }

    #[test]
    fn test_aligned_grids_copy_exactly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let transform = GeoTransform::new(0.0, 10.0, 20.0, 10.0);
        let out = BilinearReprojector
            .reproject(&grid(&values, 2), &transform, "", &transform, 2, 2, "")
            .unwrap();
        assert_eq!(out, values.to_vec());
    }

    #[test]
    fn test_half_cell_shift_interpolates() {
        let values = [2.0, 4.0];
        let src = GeoTransform::new(0.0, 1.0, 1.0, 1.0);
        let dst = GeoTransform::new(0.5, 1.0, 1.0, 1.0);
        let out = BilinearReprojector
            .reproject(&grid(&values, 2), &src, "", &dst, 2, 1, "")
            .unwrap();
        assert_relative_eq!(out[0], 3.0);
        // centre at x = 2.0 lies on the source's right edge
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn test_no_data_neighbours_are_dropped() {
        let values = [5.0, 0.0];
        let src = GeoTransform::new(0.0, 1.0, 1.0, 1.0);
        let dst = GeoTransform::new(0.5, 1.0, 1.0, 1.0);
        let out = BilinearReprojector
            .reproject(&grid(&values, 2), &src, "", &dst, 1, 1, "")
            .unwrap();
        assert_relative_eq!(out[0], 5.0);
    }

    #[test]
    fn test_outside_footprint_is_no_data() {
        let values = [7.0];
        let src = GeoTransform::new(0.0, 1.0, 1.0, 1.0);
        let dst = GeoTransform::new(-2.0, 1.0, 1.0, 1.0);
        let out = BilinearReprojector
            .reproject(&grid(&values, 1), &src, "", &dst, 4, 1, "")
            .unwrap();
        assert_eq!(out, vec![0.0, 0.0, 7.0, 0.0]);
    }

    #[test]
    fn test_differing_references_are_refused() {
        let values = [1.0];
        let t = GeoTransform::new(0.0, 1.0, 1.0, 1.0);
        assert!(BilinearReprojector
            .reproject(&grid(&values, 1), &t, "EPSG:4326", &t, 1, 1, "EPSG:32735")
            .is_err());
        assert!(IdentityTransform.transform_point("EPSG:4326", "EPSG:32735", 1.0, 2.0).is_err());
        assert_eq!(
            IdentityTransform.transform_point("EPSG:4326", "EPSG:4326", 1.0, 2.0).unwrap(),
            (1.0, 2.0)
        );
    }
}

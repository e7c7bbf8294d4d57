use crate::utils::error::{ModelError, Result};

/// Null value written into masked cells of blended layers.
pub const DEFAULT_NULL_VALUE: f64 = 1e20;

/// North-up affine transform: `(origin_x, cell_x, 0, origin_y, 0, -cell_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub cell_x: f64,
    pub origin_y: f64,
    pub cell_y: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, cell_x: f64, origin_y: f64, cell_y: f64) -> Self {
        Self {
            origin_x,
            cell_x,
            origin_y,
            cell_y,
        }
    }

    pub fn to_tuple(&self) -> [f64; 6] {
        [self.origin_x, self.cell_x, 0.0, self.origin_y, 0.0, -self.cell_y]
    }

    /// World coordinate of the centre of `(col, row)`.
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_x,
            self.origin_y - (row as f64 + 0.5) * self.cell_y,
        )
    }
}

/// A single masked 2D grid layer attached to a voxel model.
///
/// `data` and `mask` are row-major (`row * cols + col`); `mask[i] == true`
/// marks a cell without a valid value.
#[derive(Debug, Clone)]
pub struct Raster2D {
    pub dataid: String,
    pub cols: usize,
    pub rows: usize,
    pub xdim: f64,
    pub ydim: f64,
    pub tlx: f64,
    pub tly: f64,
    pub wkt: String,
    pub nullvalue: f64,
    pub data: Vec<f64>,
    pub mask: Vec<bool>,
}

impl Raster2D {
    /// Fully masked raster.
    pub fn new(dataid: impl Into<String>, cols: usize, rows: usize) -> Self {
        Self {
            dataid: dataid.into(),
            cols,
            rows,
            xdim: 1.0,
            ydim: 1.0,
            tlx: 0.0,
            tly: 0.0,
            wkt: String::new(),
            nullvalue: DEFAULT_NULL_VALUE,
            data: vec![DEFAULT_NULL_VALUE; cols * rows],
            mask: vec![true; cols * rows],
        }
    }

    /// Fully valid raster from row-major values.
    pub fn from_values(
        dataid: impl Into<String>,
        cols: usize,
        rows: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let dataid = dataid.into();
        if values.len() != cols * rows {
            return Err(ModelError::layer_shape(
                dataid,
                format!("{} values for a {}x{} raster", values.len(), cols, rows),
            ));
        }
        let mask = vec![false; values.len()];
        Ok(Self {
            data: values,
            mask,
            ..Self::new(dataid, cols, rows)
        })
    }

    pub fn with_geometry(mut self, tlx: f64, tly: f64, xdim: f64, ydim: f64) -> Self {
        self.tlx = tlx;
        self.tly = tly;
        self.xdim = xdim;
        self.ydim = ydim;
        self
    }

    pub fn with_wkt(mut self, wkt: impl Into<String>) -> Self {
        self.wkt = wkt.into();
        self
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let i = self.index(col, row);
        if self.mask[i] {
            None
        } else {
            Some(self.data[i])
        }
    }

    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        let i = self.index(col, row);
        self.data[i] = value;
        self.mask[i] = false;
    }

    pub fn mask_cell(&mut self, col: usize, row: usize) {
        let i = self.index(col, row);
        self.data[i] = self.nullvalue;
        self.mask[i] = true;
    }

    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .zip(&self.mask)
            .filter(|(_, masked)| !**masked)
            .map(|(v, _)| *v)
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    pub fn valid_min(&self) -> Option<f64> {
        self.valid_values().reduce(f64::min)
    }

    pub fn valid_max(&self) -> Option<f64> {
        self.valid_values().reduce(f64::max)
    }

    pub fn geotransform(&self) -> GeoTransform {
        GeoTransform::new(self.tlx, self.xdim, self.tly, self.ydim)
    }

    pub fn check_shape(&self) -> Result<()> {
        let expected = self.cols * self.rows;
        if self.data.len() != expected || self.mask.len() != expected {
            return Err(ModelError::layer_shape(
                &self.dataid,
                format!(
                    "declared {}x{} ({} cells) but data has {} values and mask {} flags",
                    self.cols,
                    self.rows,
                    expected,
                    self.data.len(),
                    self.mask.len()
                ),
            ));
        }
        if self.xdim <= 0.0 || self.ydim <= 0.0 {
            return Err(ModelError::layer_shape(
                &self.dataid,
                format!("non-positive cell size {}x{}", self.xdim, self.ydim),
            ));
        }
        Ok(())
    }
}

// Bitwise on `data`, so masked NaN payloads compare equal to themselves.
impl PartialEq for Raster2D {
    fn eq(&self, other: &Self) -> bool {
        self.dataid == other.dataid
            && self.cols == other.cols
            && self.rows == other.rows
            && self.xdim.to_bits() == other.xdim.to_bits()
            && self.ydim.to_bits() == other.ydim.to_bits()
            && self.tlx.to_bits() == other.tlx.to_bits()
            && self.tly.to_bits() == other.tly.to_bits()
            && self.wkt == other.wkt
            && self.nullvalue.to_bits() == other.nullvalue.to_bits()
            && self.mask == other.mask
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_cells_are_excluded_from_statistics() {
        let mut raster = Raster2D::from_values("Gravity Dataset", 3, 1, vec![5.0, -2.0, 9.0]).unwrap();
        raster.mask_cell(2, 0);

        assert_eq!(raster.valid_count(), 2);
        assert_eq!(raster.valid_min(), Some(-2.0));
        assert_eq!(raster.valid_max(), Some(5.0));
        assert_eq!(raster.get(2, 0), None);
        assert_eq!(raster.get(3, 0), None);
    }

    #[test]
    fn test_check_shape_reports_layer() {
        let mut raster = Raster2D::new("DTM Dataset", 2, 2);
        raster.data.pop();
        let err = raster.check_shape().unwrap_err();
        assert!(matches!(err, ModelError::LayerShapeMismatch { ref layer, .. } if layer == "DTM Dataset"));
    }

    #[test]
    fn test_geotransform_tuple() {
        let raster = Raster2D::new("Magnetic Dataset", 4, 4).with_geometry(100.0, 500.0, 25.0, 50.0);
        assert_eq!(
            raster.geotransform().to_tuple(),
            [100.0, 25.0, 0.0, 500.0, 0.0, -50.0]
        );
        assert_eq!(raster.geotransform().cell_center(0, 0), (112.5, 475.0));
    }

    #[test]
    fn test_equality_is_bitwise_on_data() {
        let mut a = Raster2D::new("Study Area Dataset", 1, 1);
        a.data[0] = f64::NAN;
        let b = a.clone();
        assert_eq!(a, b);
    }
}

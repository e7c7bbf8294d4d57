use approx::assert_relative_eq;
use lithmod::core::raster_merge::gmerge;
use lithmod::domain::model::{AxisRange, GeoData, LithGrid};
use lithmod::domain::{Raster2D, VoxelModel, BACKGROUND, BACKGROUND_INDEX};
use lithmod::{BilinearReprojector, ModelMerger};
use std::collections::BTreeSet;

/// 10 x 10 x 1 model at unit spacing whose columns `fill` hold `lithology`.
fn block(xmin: f64, lithology: &str, index: i32, fill: std::ops::Range<usize>) -> VoxelModel {
    let mut model = VoxelModel {
        xrange: AxisRange::new(xmin, xmin + 10.0),
        yrange: AxisRange::new(0.0, 10.0),
        zrange: AxisRange::new(-1.0, 0.0),
        grid: LithGrid::new(10, 10, 1, BACKGROUND_INDEX),
        ..VoxelModel::default()
    };
    model
        .catalogue
        .insert(lithology, GeoData::default(), index, [index as u8 * 40, 0, 0])
        .unwrap();
    for i in fill {
        for j in 0..10 {
            model.grid.set(i, j, 0, index);
        }
    }
    model.set_default_profiles();
    model
}

#[test]
fn test_merged_extent_contains_both_inputs() -> anyhow::Result<()> {
    let mut master = block(0.0, "A", 1, 0..5);
    let slave = block(5.0, "B", 1, 0..10);
    let (master_x, slave_x) = (master.xrange, slave.xrange);

    ModelMerger::new(&BilinearReprojector).merge(&mut master, &slave)?;

    for (merged, input) in [(master.xrange, master_x), (master.xrange, slave_x)] {
        assert!(merged.contains_range(&input));
    }
    assert!(master.yrange.contains_range(&slave.yrange));
    assert!(master.zrange.contains_range(&slave.zrange));
    assert_eq!(master.xrange, AxisRange::new(0.0, 15.0));
    assert_eq!(master.grid.dims(), (15, 10, 1));
    Ok(())
}

#[test]
fn test_overlapping_blocks_resolve_by_precedence() -> anyhow::Result<()> {
    let mut master = block(0.0, "A", 1, 0..5);
    // master also claims one column inside the overlap
    for j in 0..10 {
        master.grid.set(8, j, 0, 1);
    }
    let slave = block(5.0, "B", 1, 0..10);

    ModelMerger::new(&BilinearReprojector).merge(&mut master, &slave)?;

    assert_eq!(master.lithology_at(2.5, 5.0, -0.5), Some("A"));
    assert_eq!(master.lithology_at(12.5, 5.0, -0.5), Some("B"));
    // master is Background at x = 7, so slave fills it
    assert_eq!(master.lithology_at(7.5, 5.0, -0.5), Some("B"));
    // master holds A at x = 8 and keeps it
    assert_eq!(master.lithology_at(8.5, 5.0, -0.5), Some("A"));
    Ok(())
}

#[test]
fn test_colliding_indices_are_relabelled_compactly() -> anyhow::Result<()> {
    let mut master = block(0.0, "X", 1, 0..10);
    let slave = block(20.0, "Y", 1, 0..10);

    ModelMerger::new(&BilinearReprojector).merge(&mut master, &slave)?;

    assert_eq!(master.lithology_at(3.5, 3.5, -0.5), Some("X"));
    assert_eq!(master.lithology_at(23.5, 3.5, -0.5), Some("Y"));
    // the gap between the two footprints belongs to neither
    assert_ne!(master.lithology_at(15.5, 3.5, -0.5), Some("X"));
    assert_ne!(master.lithology_at(15.5, 3.5, -0.5), Some("Y"));

    let indices: BTreeSet<i32> = master.catalogue.iter().map(|(_, g)| g.lith_index).collect();
    assert_eq!(indices, BTreeSet::from([0, 1, 2]));
    assert_eq!(master.catalogue.index_of(BACKGROUND), Some(BACKGROUND_INDEX));
    for value in master.grid.distinct_values() {
        assert!(value < 0 || master.catalogue.contains_index(value));
    }
    for (_, geodata) in master.catalogue.iter() {
        assert_eq!(geodata.g_cols, 30);
    }
    Ok(())
}

fn strip(dataid: &str, tlx: f64, values: Vec<f64>) -> Raster2D {
    let cols = values.len();
    Raster2D::from_values(dataid, cols, 1, values)
        .unwrap()
        .with_geometry(tlx, 1.0, 1.0, 1.0)
}

#[test]
fn test_blend_fills_masked_region_from_slave() -> anyhow::Result<()> {
    let mut master = strip("Gravity Dataset", 0.0, vec![5.0, 6.0, 0.0, 0.0]);
    master.mask_cell(2, 0);
    master.mask_cell(3, 0);
    let slave = strip("Gravity Dataset", 0.0, vec![50.0, 60.0, 70.0, 80.0]);

    let out = gmerge(
        &master,
        &slave,
        &AxisRange::new(0.0, 4.0),
        &AxisRange::new(0.0, 1.0),
        &BilinearReprojector,
    )?;

    let values: Vec<Option<f64>> = (0..4).map(|c| out.get(c, 0)).collect();
    assert_eq!(values, vec![Some(5.0), Some(6.0), Some(70.0), Some(80.0)]);
    Ok(())
}

#[test]
fn test_blend_preserves_negative_master_values() -> anyhow::Result<()> {
    let mut master = strip("Magnetic Dataset", 0.0, vec![-20.0, -10.0, 0.0, 0.0]);
    master.mask_cell(2, 0);
    master.mask_cell(3, 0);
    let slave = strip("Magnetic Dataset", 0.0, vec![1.0, 2.0, 3.5, 4.0]);

    let out = gmerge(
        &master,
        &slave,
        &AxisRange::new(0.0, 4.0),
        &AxisRange::new(0.0, 1.0),
        &BilinearReprojector,
    )?;

    assert_relative_eq!(out.get(0, 0).unwrap_or(f64::NAN), -20.0, epsilon = 1e-9);
    assert_relative_eq!(out.get(1, 0).unwrap_or(f64::NAN), -10.0, epsilon = 1e-9);
    assert_relative_eq!(out.get(2, 0).unwrap_or(f64::NAN), 3.5, epsilon = 1e-9);
    assert_relative_eq!(out.get(3, 0).unwrap_or(f64::NAN), 4.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_blend_keeps_small_positive_master_values() -> anyhow::Result<()> {
    let mut master = strip("Gravity Regional", 0.0, vec![0.05, 0.08, 0.0, 0.0]);
    master.mask_cell(2, 0);
    master.mask_cell(3, 0);
    let slave = strip("Gravity Regional", 0.0, vec![9.0, 9.0, 7.0, 8.0]);

    let out = gmerge(
        &master,
        &slave,
        &AxisRange::new(0.0, 4.0),
        &AxisRange::new(0.0, 1.0),
        &BilinearReprojector,
    )?;

    assert_relative_eq!(out.get(0, 0).unwrap_or(f64::NAN), 0.05, epsilon = 1e-9);
    assert_relative_eq!(out.get(1, 0).unwrap_or(f64::NAN), 0.08, epsilon = 1e-9);
    assert_relative_eq!(out.get(2, 0).unwrap_or(f64::NAN), 7.0, epsilon = 1e-9);
    assert_relative_eq!(out.get(3, 0).unwrap_or(f64::NAN), 8.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_merge_blends_whitelisted_layers_over_union() -> anyhow::Result<()> {
    let mut master = VoxelModel {
        xrange: AxisRange::new(0.0, 2.0),
        yrange: AxisRange::new(0.0, 1.0),
        zrange: AxisRange::new(-1.0, 0.0),
        grid: LithGrid::new(2, 1, 1, BACKGROUND_INDEX),
        ..VoxelModel::default()
    };
    let mut slave = VoxelModel {
        xrange: AxisRange::new(2.0, 4.0),
        ..master.clone()
    };
    master
        .layers
        .insert("DTM Dataset".to_string(), strip("DTM Dataset", 0.0, vec![100.0, 110.0]));
    master
        .layers
        .insert("Calculated Gravity".to_string(), strip("Calculated Gravity", 0.0, vec![1.0, 2.0]));
    slave
        .layers
        .insert("DTM Dataset".to_string(), strip("DTM Dataset", 2.0, vec![120.0, 130.0]));
    slave
        .layers
        .insert("Survey Lines".to_string(), strip("Survey Lines", 2.0, vec![1.0, 1.0]));

    ModelMerger::new(&BilinearReprojector).merge(&mut master, &slave)?;

    let dtm = &master.layers["DTM Dataset"];
    assert_eq!((dtm.cols, dtm.rows), (4, 1));
    let values: Vec<Option<f64>> = (0..4).map(|c| dtm.get(c, 0)).collect();
    assert_eq!(values, vec![Some(100.0), Some(110.0), Some(120.0), Some(130.0)]);

    assert_eq!(master.layers["Calculated Gravity"].cols, 2);
    assert!(!master.layers.contains_key("Survey Lines"));
    Ok(())
}

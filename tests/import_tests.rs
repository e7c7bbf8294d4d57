use lithmod::adapters::{BlockModelSource, LocalStorage, XyzSource};
use lithmod::core::importer::{BlockModelTable, GridImporter, ImportOptions, PointSample};
use lithmod::domain::ports::ModelSource;
use lithmod::domain::{BACKGROUND, BACKGROUND_INDEX, UNSET};
use lithmod::ModelError;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn seeded() -> ImportOptions {
    ImportOptions { color_seed: Some(11) }
}

/// 3 x 2 x 2 lattice with spacing 10 horizontally and 5 vertically.
fn lattice() -> Vec<PointSample> {
    let mut samples = Vec::new();
    for x in [0.0, 10.0, 20.0] {
        for y in [0.0, 10.0] {
            for z in [0.0, -5.0] {
                let label = match x as i32 {
                    0 => "Shale",
                    10 => "Granite",
                    _ => BACKGROUND,
                };
                samples.push(PointSample::new(x, y, z, label));
            }
        }
    }
    samples
}

#[test]
fn test_regular_lattice_gets_one_cell_per_sample() -> anyhow::Result<()> {
    let model = GridImporter::new(seeded()).import_points(&lattice())?;

    assert_eq!(model.grid.dims(), (3, 2, 2));
    assert_eq!(model.dxy, 10.0);
    assert_eq!(model.d_z, 5.0);
    assert_eq!(model.grid.count(UNSET), 0);

    for sample in lattice() {
        assert_eq!(
            model.lithology_at(sample.x, sample.y, sample.z),
            Some(sample.label.as_str()),
            "sample at ({}, {}, {})",
            sample.x,
            sample.y,
            sample.z
        );
    }
    Ok(())
}

#[test]
fn test_indices_are_compact_and_all_cells_known() -> anyhow::Result<()> {
    let model = GridImporter::new(seeded()).import_points(&lattice())?;

    let indices: BTreeSet<i32> = model.catalogue.iter().map(|(_, g)| g.lith_index).collect();
    assert_eq!(indices, BTreeSet::from([0, 1, 2]));
    for value in model.grid.distinct_values() {
        assert!(model.catalogue.contains_index(value), "index {} not catalogued", value);
    }
    assert!(model.validate().is_ok());
    Ok(())
}

#[test]
fn test_same_seed_gives_same_colours() -> anyhow::Result<()> {
    let a = GridImporter::new(seeded()).import_points(&lattice())?;
    let b = GridImporter::new(seeded()).import_points(&lattice())?;
    assert_eq!(a.catalogue.colors(), b.catalogue.colors());
    Ok(())
}

#[test]
fn test_single_x_value_is_degenerate() {
    let samples = vec![
        PointSample::new(5.0, 0.0, 0.0, "Shale"),
        PointSample::new(5.0, 10.0, -5.0, "Shale"),
    ];
    let err = GridImporter::new(seeded()).import_points(&samples).unwrap_err();
    assert!(matches!(err, ModelError::DegenerateAxis { axis: 'x', .. }));
}

#[test]
fn test_block_model_with_missing_column_is_out_of_bounds() {
    // nothing at x = 7.5, so 12.5 falls past the second of two columns
    let table = BlockModelTable {
        cell: [5.0, 5.0, 2.0],
        rows: vec![
            PointSample::new(2.5, 2.5, -1.0, "Dolerite"),
            PointSample::new(12.5, 2.5, -1.0, "Dolerite"),
        ],
    };
    let err = GridImporter::new(seeded()).import_block_model(&table).unwrap_err();
    assert!(matches!(
        err,
        ModelError::OutOfBounds { axis: 'x', index: 2, len: 2, .. }
    ));
}

#[tokio::test]
async fn test_xyz_source_reads_through_storage() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("points.csv"),
        "# x,y,z,label\n0,0,0,Shale\n10,0,0,Shale\n0,10,0,Granite\n10,10,0\n0,0,-5,Shale\n10,10,-5,Granite\n",
    )?;

    let storage = LocalStorage::new(temp_dir.path());
    let model = XyzSource::new(storage, "points.csv", seeded()).load().await?;

    assert_eq!(model.grid.dims(), (2, 2, 2));
    assert_eq!(model.lithology_at(0.0, 10.0, 0.0), Some("Granite"));
    assert_eq!(model.lithology_at(10.0, 10.0, 0.0), Some(BACKGROUND));
    // (10, 0, -5) was never sampled
    assert_eq!(model.cell_at(10.0, 0.0, -5.0).and_then(|(i, j, k)| model.grid.get(i, j, k)), Some(UNSET));
    Ok(())
}

#[tokio::test]
async fn test_block_model_source_fills_background() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("block.csv"),
        "# block model export\n\
         x,y,z,dx,dy,dz,volume,rocktype\n\
         5,5,-5,10,10,10,1000,granite\n\
         15,5,-5,10,10,10,1000,blank\n\
         5,15,-5,10,10,10,1000,schist\n",
    )?;

    let storage = LocalStorage::new(temp_dir.path());
    let model = BlockModelSource::new(storage, "block.csv", seeded())
        .with_label_column(Some("rocktype".to_string()))
        .load()
        .await?;

    assert_eq!(model.grid.dims(), (2, 2, 1));
    assert_eq!(model.xrange.min, 0.0);
    assert_eq!(model.xrange.max, 20.0);
    assert_eq!(model.lithology_at(5.0, 5.0, -5.0), Some("granite"));
    assert_eq!(model.lithology_at(15.0, 5.0, -5.0), Some(BACKGROUND));
    // the fourth cell is absent from the export and stays Background
    assert_eq!(model.grid.count(BACKGROUND_INDEX), 2);
    assert_eq!(model.grid.count(UNSET), 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_source_reports_line() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("bad.txt"), "0 0 0 Shale\n1 0 zero Shale\n").unwrap();

    let storage = LocalStorage::new(temp_dir.path());
    let err = XyzSource::new(storage, "bad.txt", seeded()).load().await.unwrap_err();
    assert!(matches!(err, ModelError::SourceParseError { line: 2, .. }));
}

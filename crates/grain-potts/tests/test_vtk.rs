use std::fs;
use std::path::PathBuf;

use grain_potts::potts::{Lattice, SpinGrid, DEFAULT_RNG_SEED};
use grain_potts::vtk::{self, VtkError};

fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("grain_potts_vtk_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn half_space_grid(side: usize) -> SpinGrid {
    let mut spins = Vec::with_capacity(side * side * side);
    for _z in 0..side {
        for _y in 0..side {
            for x in 0..side {
                spins.push(if x < side / 2 { 1 } else { 2 });
            }
        }
    }
    SpinGrid::new(side, spins).unwrap()
}

fn write_ph(path: &PathBuf, grid: &SpinGrid) {
    let mut text = format!("{}\nheader\nheader\n", grid.side_length);
    for spin in &grid.spins {
        text.push_str(&spin.to_string());
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_ph_round_trip() {
    let grid = half_space_grid(4);
    let path = temp_path("half_space.ph");
    write_ph(&path, &grid);

    let loaded = vtk::from_ph(&path).unwrap();
    assert_eq!(loaded, grid);
}

#[test]
fn test_vtk_round_trip() {
    let grid = half_space_grid(4);
    let mut lattice = Lattice::from_grid(&grid, DEFAULT_RNG_SEED);
    lattice.init().unwrap();

    let path = temp_path("round_trip.vtk");
    vtk::to_vtk(&path, &lattice).unwrap();

    let loaded = vtk::from_vtk(&path).unwrap();
    assert_eq!(loaded, grid);
}

#[test]
fn test_from_file_dispatches_on_extension() {
    let grid = half_space_grid(2);
    let path = temp_path("dispatch.ph");
    write_ph(&path, &grid);
    assert_eq!(vtk::from_file(&path).unwrap(), grid);

    let bad = temp_path("dispatch.dat");
    fs::write(&bad, "junk").unwrap();
    assert!(matches!(
        vtk::from_file(&bad),
        Err(VtkError::UnrecognizedFormat(_))
    ));
}

#[test]
fn test_truncated_vtk_is_rejected() {
    let path = temp_path("truncated.vtk");
    let mut text = String::from(
        "# vtk DataFile Version 2.0\nlattice\nASCII\nDATASET RECTILINEAR_GRID\nDIMENSIONS 3 3 3\nCELL_DATA 8\nSCALARS GrainIDs int 1\nLOOKUP_TABLE default\n",
    );
    for _ in 0..5 {
        text.push_str("1\n");
    }
    fs::write(&path, text).unwrap();

    assert!(matches!(
        vtk::from_vtk(&path),
        Err(VtkError::TruncatedData {
            expected: 8,
            found: 5
        })
    ));
}

#[test]
fn test_missing_dimensions_is_rejected() {
    let path = temp_path("no_dims.vtk");
    fs::write(&path, "# vtk DataFile Version 2.0\nnothing here\n").unwrap();
    assert!(matches!(
        vtk::from_vtk(&path),
        Err(VtkError::MissingDimensions)
    ));
}

#[test]
fn test_scale_grid_doubles_blocks() {
    let grid = SpinGrid::new(2, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let scaled = vtk::scale_grid(&grid, 2.0);

    assert_eq!(scaled.side_length, 4);
    assert_eq!(scaled.spins.len(), 64);
    // Each source voxel becomes a 2x2x2 block of its spin.
    for z in 0..4 {
        for y in 0..4 {
            for x in 0..4 {
                let expected = grid.spins[(x / 2) + (y / 2) * 2 + (z / 2) * 4];
                assert_eq!(scaled.spins[x + y * 4 + z * 16], expected);
            }
        }
    }
}

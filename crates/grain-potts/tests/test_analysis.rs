use std::fs;

use grain_potts::analysis::LatticeAnalyzer;
use grain_potts::potts::{Lattice, SpinGrid, DEFAULT_RNG_SEED};
use grain_potts::utils::is_close::IsClose;

fn init_lattice(grid: &SpinGrid) -> Lattice {
    let mut lattice = Lattice::from_grid(grid, DEFAULT_RNG_SEED);
    lattice.init().unwrap();
    lattice
}

fn half_space_lattice(side: usize) -> Lattice {
    let mut spins = Vec::with_capacity(side * side * side);
    for _z in 0..side {
        for _y in 0..side {
            for x in 0..side {
                spins.push(if x < side / 2 { 1u32 } else { 2 });
            }
        }
    }
    init_lattice(&SpinGrid::new(side, spins).unwrap())
}

#[test]
fn test_volumes_count_every_voxel() {
    let lattice = half_space_lattice(4);
    let mut analyzer = LatticeAnalyzer::new();
    analyzer.load_lattice(&lattice);

    // Flat interfaces have no convex pokes in either direction.
    analyzer
        .curvature(1, 2)
        .is_close(&0.0, 1e-12, 1e-12)
        .expect("flat boundary curvature");

    let dir = std::env::temp_dir().join(format!("grain_potts_analysis_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("flat_analysis.txt");
    analyzer.save_analysis(&path, &lattice).unwrap();

    let report = fs::read_to_string(&path).unwrap();
    assert!(report.contains("VOLUMES\n"));
    assert!(report.contains("1 32\n"));
    assert!(report.contains("2 32\n"));
    assert!(report.contains("CURVATURES\n"));
    assert!(report.contains("SURFACE_AREAS\n"));
    assert!(report.contains("1 2 64\n"));
    assert!(report.contains("BOUNDARY_FLIPS\n"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_single_voxel_poke_curvature() {
    // One dissident voxel inside a uniform grain: all 12 of its edges
    // count as convex pokes of grain 2 into grain 1.
    let side = 4;
    let mut spins = vec![1u32; side * side * side];
    spins[1 + side + side * side] = 2; // (1, 1, 1)
    let lattice = init_lattice(&SpinGrid::new(side, spins).unwrap());

    let mut analyzer = LatticeAnalyzer::new();
    analyzer.load_lattice(&lattice);

    let expected = (std::f64::consts::PI / 4.0) * 12.0;
    analyzer
        .curvature(2, 1)
        .is_close(&expected, 1e-12, 1e-12)
        .expect("convex blob curvature");
    analyzer
        .curvature(1, 2)
        .is_close(&-expected, 1e-12, 1e-12)
        .expect("antisymmetry");
}

#[test]
fn test_flip_counts_reach_report() {
    let mut lattice = half_space_lattice(4);
    for _ in 0..5 {
        lattice.step().unwrap();
    }

    let mut analyzer = LatticeAnalyzer::new();
    analyzer.load_lattice(&lattice);

    let dir = std::env::temp_dir().join(format!("grain_potts_flips_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("flips_analysis.txt");
    analyzer.save_analysis(&path, &lattice).unwrap();

    let report = fs::read_to_string(&path).unwrap();
    let flips_section = report.split("BOUNDARY_FLIPS\n").nth(1).unwrap();
    let mut total = 0u64;
    for line in flips_section.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 4);
        total += fields[2].parse::<u64>().unwrap() + fields[3].parse::<u64>().unwrap();
    }
    assert_eq!(total, 5);

    fs::remove_dir_all(&dir).ok();
}

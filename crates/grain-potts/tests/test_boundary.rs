use grain_potts::potts::{BoundaryKey, BoundaryTracker, Lattice, SpinGrid, DEFAULT_RNG_SEED};

const NEIGH_COUNT: usize = 26;

fn neighbor_table(spins: &[u32]) -> [u32; NEIGH_COUNT] {
    let mut table = [0; NEIGH_COUNT];
    table[..spins.len()].copy_from_slice(spins);
    table
}

/// Two half-space grains plus a grain-3 column along z at (x=2, y=0), so
/// that (1,2), (1,3) and (2,3) all coexist.
fn three_grain_lattice() -> Lattice {
    let side = 4;
    let mut spins = Vec::with_capacity(side * side * side);
    for _z in 0..side {
        for y in 0..side {
            for x in 0..side {
                let spin = if x == 2 && y == 0 {
                    3
                } else if x < 2 {
                    1
                } else {
                    2
                };
                spins.push(spin);
            }
        }
    }
    let grid = SpinGrid::new(side, spins).unwrap();
    let mut lattice = Lattice::from_grid(&grid, DEFAULT_RNG_SEED);
    lattice.init().unwrap();
    lattice
}

#[test]
fn test_key_canonicalisation_yields_single_boundary() {
    let mut tracker = BoundaryTracker::new();
    tracker.find_or_create(7, 3);
    tracker.find_or_create(3, 7);

    assert_eq!(tracker.total_boundary_count(), 1);
    let boundary = tracker.between(7, 3).unwrap();
    assert_eq!((boundary.a_spin, boundary.b_spin), (3, 7));
    assert_eq!(BoundaryKey::new(7, 3), BoundaryKey::new(3, 7));
}

#[test]
fn test_is_transformed_does_not_create() {
    let tracker = BoundaryTracker::new();
    assert!(!tracker.is_transformed(9, 12));
    assert_eq!(tracker.total_boundary_count(), 0);
}

#[test]
fn test_mark_transformed_counts_once() {
    let mut tracker = BoundaryTracker::new();
    tracker.mark_transformed(1, 2);
    tracker.mark_transformed(1, 2);
    tracker.mark_transformed_key(BoundaryKey::new(2, 1));

    assert_eq!(tracker.transformed_boundary_count(), 1);
    assert!(tracker.is_transformed(1, 2));
}

#[test]
fn test_junction_tallies_balance() {
    let mut tracker = BoundaryTracker::new();
    let table = neighbor_table(&[2, 3]);

    tracker.add_to_boundary(1, 2, 40, &table);
    let junction = BoundaryKey::new(1, 3);
    assert_eq!(
        tracker.between(1, 2).unwrap().junctions.get(&junction),
        Some(&1)
    );
    // The junction partner is created as a side effect.
    assert!(tracker.between(1, 3).is_some());

    tracker.add_to_boundary(1, 2, 41, &table);
    assert_eq!(
        tracker.between(1, 2).unwrap().junctions.get(&junction),
        Some(&2)
    );

    tracker.remove_from_boundary(1, 2, 40, &table);
    assert_eq!(
        tracker.between(1, 2).unwrap().junctions.get(&junction),
        Some(&1)
    );
}

#[test]
fn test_emptied_boundary_is_marked_then_swept() {
    let mut tracker = BoundaryTracker::new();
    let table = neighbor_table(&[2]);

    tracker.add_to_boundary(1, 2, 0, &table);
    tracker.remove_from_boundary(1, 2, 0, &table);
    assert!(tracker.between(1, 2).unwrap().marked_for_deletion);

    // Fresh evidence clears the mark.
    tracker.add_to_boundary(1, 2, 1, &table);
    assert!(!tracker.between(1, 2).unwrap().marked_for_deletion);

    tracker.remove_from_boundary(1, 2, 1, &table);
    tracker.remove_marked_boundaries();
    assert!(tracker.between(1, 2).is_none());
    assert_eq!(tracker.total_boundary_count(), 0);
}

#[test]
fn test_sweep_prunes_stale_junction_entries() {
    let mut tracker = BoundaryTracker::new();

    tracker.find_or_create(1, 2).voxels.insert(0);
    tracker.find_or_create(1, 3).voxels.insert(1);
    let dangling = BoundaryKey::new(8, 9);
    {
        let boundary = tracker.get_mut(BoundaryKey::new(1, 2)).unwrap();
        boundary.delta_junction(BoundaryKey::new(1, 3), 1);
        boundary.delta_junction(dangling, 1);
        boundary.delta_junction(BoundaryKey::new(1, 4), 0);
    }
    tracker.find_or_create(1, 4).voxels.insert(2);

    tracker.remove_marked_boundaries();

    let boundary = tracker.between(1, 2).unwrap();
    assert_eq!(boundary.junctions.get(&BoundaryKey::new(1, 3)), Some(&1));
    assert!(!boundary.junctions.contains_key(&dangling));
    // Zero-tally entries carry no junction evidence and are pruned.
    assert!(!boundary.junctions.contains_key(&BoundaryKey::new(1, 4)));
}

#[test]
fn test_delete_boundary_prefers_energised_transformed_junction() {
    let mut tracker = BoundaryTracker::new();

    tracker.find_or_create(1, 3).voxels.insert(0);
    tracker.find_or_create(1, 4).voxels.insert(1);
    tracker.find_or_create(1, 5).voxels.insert(2);
    tracker.mark_transformed(1, 3);
    tracker.mark_transformed(1, 4);
    tracker.get_mut(BoundaryKey::new(1, 4)).unwrap().potential_energy = 5;

    let key = BoundaryKey::new(1, 2);
    {
        let boundary = tracker.find_or_create(1, 2);
        boundary.potential_energy = 7;
        boundary.delta_junction(BoundaryKey::new(1, 3), 1);
        boundary.delta_junction(BoundaryKey::new(1, 4), 1);
        boundary.delta_junction(BoundaryKey::new(1, 5), 1);
    }

    tracker.delete_boundary(key);

    assert!(tracker.between(1, 2).is_none());
    // (1,4) is transformed with positive energy and wins over the
    // transformed-but-empty (1,3) and the untransformed (1,5).
    assert_eq!(tracker.between(1, 4).unwrap().potential_energy, 12);
    assert_eq!(tracker.between(1, 3).unwrap().potential_energy, 0);
    assert_eq!(tracker.between(1, 5).unwrap().potential_energy, 0);
}

#[test]
fn test_delete_boundary_falls_back_to_first_live_junction() {
    let mut tracker = BoundaryTracker::new();

    tracker.find_or_create(1, 3).voxels.insert(0);
    tracker.find_or_create(1, 5).voxels.insert(1);
    let key = BoundaryKey::new(1, 2);
    {
        let boundary = tracker.find_or_create(1, 2);
        boundary.potential_energy = 9;
        // A dangling key sorts first and must be skipped.
        boundary.delta_junction(BoundaryKey::new(0, 1), 1);
        boundary.delta_junction(BoundaryKey::new(1, 3), 1);
        boundary.delta_junction(BoundaryKey::new(1, 5), 1);
    }

    tracker.delete_boundary(key);
    assert_eq!(tracker.between(1, 3).unwrap().potential_energy, 9);
    assert_eq!(tracker.between(1, 5).unwrap().potential_energy, 0);
}

#[test]
fn test_track_flip_directions() {
    let mut tracker = BoundaryTracker::new();
    tracker.track_flip(5, 2);
    tracker.track_flip(2, 5);
    tracker.track_flip(2, 5);

    let counts = tracker.flip_counts().get(&BoundaryKey::new(2, 5)).unwrap();
    assert_eq!(counts.low_to_high, 2);
    assert_eq!(counts.high_to_low, 1);

    tracker.reset_flip_counts();
    assert!(tracker.flip_counts().is_empty());
}

#[test]
fn test_triple_junction_bookkeeping_on_lattice() {
    let lattice = three_grain_lattice();
    let tracker = lattice.boundary_tracker();

    let boundary = tracker.between(1, 2).expect("(1,2) exists");
    let to_13 = boundary.junctions.get(&BoundaryKey::new(1, 3)).copied();
    let to_23 = boundary.junctions.get(&BoundaryKey::new(2, 3)).copied();
    assert!(to_13.is_some_and(|tally| tally > 0));
    assert!(to_23.is_some_and(|tally| tally > 0));
}

#[test]
fn test_deleting_boundary_with_energy_transfers_to_surviving_junction() {
    let mut lattice = three_grain_lattice();
    let key = BoundaryKey::new(1, 2);
    let tracker = lattice.boundary_tracker_mut();
    tracker.get_mut(key).unwrap().potential_energy = 9;

    tracker.delete_boundary(key);

    let received: i64 = [
        tracker.between(1, 3).map_or(0, |b| b.potential_energy),
        tracker.between(2, 3).map_or(0, |b| b.potential_energy),
    ]
    .iter()
    .sum();
    assert_eq!(received, 9);
}

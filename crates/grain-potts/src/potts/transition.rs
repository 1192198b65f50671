//! Periodic selection and propagation of boundary transformations.
//!
//! Selection decouples sampling from iteration: random "k-th of its kind"
//! indices are drawn up front and consumed while a single traversal walks
//! the registry in its canonical order. Propagation advancing out of
//! sequence penalises later boundaries slightly; that bias is part of the
//! model, not an accident.

use std::collections::BTreeSet;
use std::io::Write;

use tracing::info;

use crate::potts::boundary::BoundaryKey;
use crate::potts::lattice::{Lattice, LatticeError};
use crate::potts::voxel::NEIGH_COUNT;

impl Lattice {
    /// Transition `count` randomly chosen grain boundaries.
    ///
    /// The quota is clamped to the untransformed population, then split
    /// into direct flips and propagations from already-transformed
    /// boundaries according to `propagation_chance` (propagations are
    /// further clamped to the transformed population, the slack returning
    /// to flips). A propagating boundary transforms up to
    /// `max(1, floor(junctions * propagation_ratio))` of its untransformed
    /// junction partners, in junction order; when it has none, a fresh
    /// index further along the traversal is queued instead. With
    /// `use_potential_energy`, every transformed boundary banks its
    /// shrinkage since the previous pass and greedily spends it
    /// transforming its smallest untransformed junction partners.
    pub fn transition_boundaries(
        &mut self,
        count: usize,
        propagation_chance: f64,
        propagation_ratio: f64,
        use_potential_energy: bool,
    ) -> Result<(), LatticeError> {
        // Junction keys may dangle between sweeps; scrub before walking
        // the registry so quotas see live boundaries only.
        self.boundary_tracker.remove_marked_boundaries();

        let total = self.boundary_tracker.total_boundary_count();
        let transformed = self.boundary_tracker.transformed_boundary_count();
        let untransformed = total - transformed;

        let count = count.min(untransformed);
        info!(count, "transitioning boundaries");

        let mut propagate_count = (count as f64 * propagation_chance) as usize;
        let mut flip_count = count - propagate_count;
        if transformed < propagate_count {
            propagate_count = transformed;
            flip_count = count - propagate_count;
        }

        // Distinct k-th-of-its-kind indices; the clamps above guarantee the
        // rejection loops terminate.
        let mut flip_indices: BTreeSet<usize> = BTreeSet::new();
        while flip_indices.len() < flip_count {
            let index = self.rng_range(0.0, untransformed as f64) as usize;
            flip_indices.insert(index);
        }
        let mut propagate_indices: BTreeSet<usize> = BTreeSet::new();
        while propagate_indices.len() < propagate_count {
            let index = self.rng_range(0.0, transformed as f64) as usize;
            propagate_indices.insert(index);
        }

        let keys = self.boundary_tracker.boundary_keys();

        let mut untrans_count = 0usize;
        let mut trans_count = 0usize;
        let mut propagated = 0usize;
        let mut flipped = 0usize;
        let mut prop_done = false;

        for key in keys {
            let Some(boundary) = self.boundary_tracker.get(key) else {
                continue;
            };

            if boundary.transformed {
                if !prop_done && !propagate_indices.is_empty() {
                    if propagate_indices.first() == Some(&trans_count) {
                        propagate_indices.pop_first();

                        let junction_keys: Vec<BoundaryKey> = self
                            .boundary_tracker
                            .get(key)
                            .map(|b| b.junctions.keys().copied().collect())
                            .unwrap_or_default();
                        let mut prop_num = ((junction_keys.len() as f64 * propagation_ratio)
                            .floor() as usize)
                            .max(1);

                        let mut found_junction = false;
                        for junction in &junction_keys {
                            let Some(other) = self.boundary_tracker.get(*junction) else {
                                continue;
                            };
                            if other.transformed {
                                continue;
                            }
                            self.transition_boundary(*junction)?;
                            found_junction = true;
                            propagated += 1;
                            if propagated >= propagate_count {
                                prop_done = true;
                                break;
                            }
                            prop_num -= 1;
                            if prop_num == 0 {
                                break;
                            }
                        }

                        if !found_junction {
                            // Nothing to propagate onto here; retry on a
                            // later transformed boundary.
                            let mut fresh = trans_count + 1;
                            while propagate_indices.contains(&fresh) {
                                fresh += 1;
                            }
                            propagate_indices.insert(fresh);
                        }
                    }
                    trans_count += 1;
                }

                if use_potential_energy {
                    self.apply_potential_energy(key)?;
                }
            } else if !flip_indices.is_empty() {
                if flip_indices.first() == Some(&untrans_count) {
                    flip_indices.pop_first();
                    self.transition_boundary(key)?;
                    flipped += 1;
                }
                untrans_count += 1;
            } else if prop_done || propagate_indices.is_empty() {
                break;
            }
        }

        info!(
            transformed = self.boundary_tracker.transformed_boundary_count(),
            total = self.boundary_tracker.total_boundary_count(),
            flipped,
            propagated,
            "transition pass complete"
        );
        Ok(())
    }

    /// Bank the boundary's shrinkage since the previous pass as potential
    /// energy (clamped at zero) and spend it greedily on the smallest
    /// untransformed junction partners it can afford, then record the
    /// current area for the next pass.
    fn apply_potential_energy(&mut self, key: BoundaryKey) -> Result<(), LatticeError> {
        let Some(boundary) = self.boundary_tracker.get(key) else {
            return Ok(());
        };
        let previous_area = boundary.previous_surface_area;

        if previous_area != 0 {
            if let Some(boundary) = self.boundary_tracker.get_mut(key) {
                let area = boundary.area();
                boundary.potential_energy += previous_area as i64 - area as i64;
                if boundary.potential_energy < 0 {
                    boundary.potential_energy = 0;
                }
            }

            loop {
                let Some(boundary) = self.boundary_tracker.get(key) else {
                    break;
                };
                let energy = boundary.potential_energy;
                let junction_keys: Vec<BoundaryKey> = boundary.junctions.keys().copied().collect();

                let mut smallest: Option<(BoundaryKey, usize)> = None;
                for junction in junction_keys {
                    let Some(other) = self.boundary_tracker.get(junction) else {
                        continue;
                    };
                    if other.transformed {
                        continue;
                    }
                    let area = other.area();
                    match smallest {
                        Some((_, best)) if area >= best => {}
                        _ => smallest = Some((junction, area)),
                    }
                }

                match smallest {
                    Some((junction, area)) if area as i64 <= energy => {
                        self.transition_boundary(junction)?;
                        if let Some(boundary) = self.boundary_tracker.get_mut(key) {
                            boundary.potential_energy -= area as i64;
                        }
                    }
                    _ => break,
                }
            }
        }

        if let Some(boundary) = self.boundary_tracker.get_mut(key) {
            boundary.previous_surface_area = boundary.area();
        }
        Ok(())
    }

    /// Mark one boundary transformed and refresh every activity its
    /// mobility change touches: each voxel on the boundary, plus each such
    /// voxel's 26 neighbors for that voxel's spin.
    pub(crate) fn transition_boundary(&mut self, key: BoundaryKey) -> Result<(), LatticeError> {
        self.boundary_tracker.mark_transformed_key(key);

        let voxel_indices: Vec<usize> = self
            .boundary_tracker
            .get(key)
            .map(|b| b.voxels.iter().copied().collect())
            .unwrap_or_default();

        for index in voxel_indices {
            let (x, y, z) = self.from_index(index);
            self.rebuild_voxel_activity(x, y, z)?;
            let spin = self.voxel(x, y, z).spin;
            for n in 0..NEIGH_COUNT {
                let (dx, dy, dz) = self.neighbor_offsets[n];
                self.rebuild_neighbor_activity(x + dx, y + dy, z + dz, spin)?;
            }
        }

        if let Some(log) = &mut self.transition_log {
            writeln!(log, "{}\t{}\t{:.6}", key.a, key.b, self.log_timestep)?;
        }
        Ok(())
    }
}

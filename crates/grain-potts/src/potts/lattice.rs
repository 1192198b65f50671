//! The lattice engine: neighbor geometry, energy and probability
//! computation, flip execution and the n-fold-way step.
//!
//! Algorithm references:
//! Hassold & Holm, "A Fast Serial Algorithm for the Finite Temperature
//! Quenched Potts Model" (1993), for the rejection-free step and its time
//! increment (Eq. 20); Frazier, "A Potts Model Investigation of Complexion
//! Transitions and Abnormal Grain Growth" (2015), for the flip probability
//! (Eq. 4.2, p. 42) and the boundary-transformation model.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use crate::potts::boundary::BoundaryTracker;
use crate::potts::octree::ActivityOctree;
use crate::potts::voxel::{Voxel, VoxelError, NEIGH_COUNT};
use crate::potts::{Coord, Spin};

/// Simulation temperature for the e^(-dE/kT) Boltzmann factor.
pub const KT: f64 = 0.5;

/// Default seed of the simulation RNG. Fixed so that runs are reproducible
/// by default; override through configuration.
pub const DEFAULT_RNG_SEED: u64 = 1337;

#[derive(Error, Debug)]
pub enum LatticeError {
    #[error(transparent)]
    Voxel(#[from] VoxelError),

    #[error("system activity is zero; no voxel can flip")]
    ZeroSystemActivity,

    #[error("activity walk selected zero-activity voxel ({x}, {y}, {z})")]
    ZeroActivityVoxel { x: usize, y: usize, z: usize },

    #[error("activity walk exhausted the octree without locating a voxel (target {target})")]
    WalkExhausted { target: f64 },

    #[error("voxel ({x}, {y}, {z}) produced no flip target for draw {draw}")]
    NoFlipTarget { x: usize, y: usize, z: usize, draw: f64 },

    #[error("spin grid holds {got} spins, expected {expected} for side length {side}")]
    GridSizeMismatch {
        side: usize,
        got: usize,
        expected: usize,
    },

    #[error("transition log IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bare cube of spins: what the file loaders produce and
/// [`Lattice::from_grid`] consumes. Spins are stored x fastest, then y,
/// then z.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinGrid {
    pub side_length: usize,
    pub spins: Vec<Spin>,
}

impl SpinGrid {
    pub fn new(side_length: usize, spins: Vec<Spin>) -> Result<Self, LatticeError> {
        let expected = side_length * side_length * side_length;
        if spins.len() != expected {
            return Err(LatticeError::GridSizeMismatch {
                side: side_length,
                got: spins.len(),
                expected,
            });
        }
        Ok(SpinGrid { side_length, spins })
    }
}

/// A periodic cubic lattice of spin-labelled voxels, with the activity
/// octree and boundary registry that index it.
pub struct Lattice {
    pub(crate) side_length: usize,
    pub(crate) voxels: Array3<Voxel>,
    pub(crate) octree: ActivityOctree,
    pub(crate) boundary_tracker: BoundaryTracker,

    /// Offsets of the 26-neighborhood, in fixed z-outer, y, x-inner order.
    pub(crate) neighbor_offsets: [(Coord, Coord, Coord); NEIGH_COUNT],
    /// e^(-dE/kT) for every dE in [-26, 26], indexed by dE + 26.
    eterm_lookup: [f64; NEIGH_COUNT * 2 + 1],

    pub default_mobility: f64,
    pub transitioned_mobility: f64,

    /// Number of distinct grains the simulation can hold. Auto-detected
    /// from the initial state during `init` when left at zero.
    pub grain_count: u32,

    pub total_flips: u64,
    pub transformed_flips: u64,

    rng: StdRng,

    pub(crate) transition_log: Option<BufWriter<File>>,
    pub(crate) log_timestep: f64,
}

impl Lattice {
    /// Create an all-zero lattice of the given side, seeding the RNG.
    pub fn new(side_length: usize, seed: u64) -> Self {
        let l = side_length;
        let voxels =
            Array3::from_shape_fn((l, l, l), |(z, y, x)| Voxel::new(x + y * l + z * l * l));

        let mut neighbor_offsets = [(0, 0, 0); NEIGH_COUNT];
        let mut offset_index = 0;
        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    if x == 0 && y == 0 && z == 0 {
                        continue;
                    }
                    neighbor_offsets[offset_index] = (x, y, z);
                    offset_index += 1;
                }
            }
        }

        let mut eterm_lookup = [0.0; NEIGH_COUNT * 2 + 1];
        for d_e in -(NEIGH_COUNT as i32)..=(NEIGH_COUNT as i32) {
            eterm_lookup[(d_e + NEIGH_COUNT as i32) as usize] = (-(d_e as f64) / KT).exp();
        }

        Lattice {
            side_length,
            voxels,
            octree: ActivityOctree::new(side_length),
            boundary_tracker: BoundaryTracker::new(),
            neighbor_offsets,
            eterm_lookup,
            default_mobility: 0.002,
            transitioned_mobility: 0.04,
            grain_count: 0,
            total_flips: 0,
            transformed_flips: 0,
            rng: StdRng::seed_from_u64(seed),
            transition_log: None,
            log_timestep: 0.0,
        }
    }

    /// Create a lattice holding the spins of `grid`.
    pub fn from_grid(grid: &SpinGrid, seed: u64) -> Self {
        let l = grid.side_length;
        let mut lattice = Lattice::new(l, seed);
        for z in 0..l {
            for y in 0..l {
                for x in 0..l {
                    lattice.voxels[[z, y, x]].spin = grid.spins[x + y * l + z * l * l];
                }
            }
        }
        lattice
    }

    pub fn side_length(&self) -> usize {
        self.side_length
    }

    pub fn system_activity(&self) -> f64 {
        self.octree.system_activity()
    }

    pub fn octree(&self) -> &ActivityOctree {
        &self.octree
    }

    pub fn boundary_tracker(&self) -> &BoundaryTracker {
        &self.boundary_tracker
    }

    pub fn boundary_tracker_mut(&mut self) -> &mut BoundaryTracker {
        &mut self.boundary_tracker
    }

    fn wrap(&self, c: Coord) -> usize {
        c.rem_euclid(self.side_length as Coord) as usize
    }

    /// Linear index of the (wrapped) coordinates.
    pub fn index_at(&self, x: Coord, y: Coord, z: Coord) -> usize {
        let l = self.side_length;
        self.wrap(x) + self.wrap(y) * l + self.wrap(z) * l * l
    }

    /// Coordinates of a linear index.
    pub fn from_index(&self, index: usize) -> (Coord, Coord, Coord) {
        let l = self.side_length;
        (
            (index % l) as Coord,
            ((index / l) % l) as Coord,
            ((index / (l * l)) % l) as Coord,
        )
    }

    /// The voxel at the (wrapped) coordinates.
    pub fn voxel(&self, x: Coord, y: Coord, z: Coord) -> &Voxel {
        &self.voxels[[self.wrap(z), self.wrap(y), self.wrap(x)]]
    }

    /// Mobility of the interface between two grains.
    fn mobility(&self, a: Spin, b: Spin) -> f64 {
        if self.boundary_tracker.is_transformed(a, b) {
            self.transitioned_mobility
        } else {
            self.default_mobility
        }
    }

    /// Energy change of flipping the voxel at `(x, y, z)` to `new_spin`:
    /// +1 per neighbor sharing the current spin, -1 per neighbor already
    /// holding the new spin. `None` when no neighbor holds the new spin at
    /// all (such a flip is forbidden).
    pub fn delta_e(&self, x: Coord, y: Coord, z: Coord, new_spin: Spin) -> Option<i32> {
        let curr_spin = self.voxel(x, y, z).spin;
        let mut d_e = 0;
        let mut found = false;
        for n in 0..NEIGH_COUNT {
            let (dx, dy, dz) = self.neighbor_offsets[n];
            let nspin = self.voxel(x + dx, y + dy, z + dz).spin;
            if nspin == new_spin {
                d_e -= 1;
                found = true;
            } else if nspin == curr_spin {
                d_e += 1;
            }
        }
        found.then_some(d_e)
    }

    /// Probability of the voxel at `(x, y, z)` flipping to `new_spin`:
    /// zero for its own spin or an unreachable one, the boundary mobility
    /// for an energy-lowering flip, mobility scaled by the Boltzmann
    /// factor otherwise.
    pub fn flip_prob(&self, x: Coord, y: Coord, z: Coord, new_spin: Spin) -> f64 {
        let curr_spin = self.voxel(x, y, z).spin;
        if new_spin == curr_spin {
            return 0.0;
        }
        match self.delta_e(x, y, z, new_spin) {
            None => 0.0,
            Some(d_e) if d_e < 0 => self.mobility(curr_spin, new_spin),
            Some(d_e) => {
                self.mobility(curr_spin, new_spin)
                    * self.eterm_lookup[(d_e + NEIGH_COUNT as i32) as usize]
            }
        }
    }

    /// Uniform draw in `[min, max)`.
    pub(crate) fn rng_range(&mut self, min: f64, max: f64) -> f64 {
        self.rng.random::<f64>() * (max - min) + min
    }

    /// Recompute the voxel's own activity table, recording any foreign
    /// neighbor spins not yet present and pushing the deltas into the
    /// octree. Existing entries are left untouched.
    pub(crate) fn rebuild_voxel_activity(
        &mut self,
        x: Coord,
        y: Coord,
        z: Coord,
    ) -> Result<(), LatticeError> {
        let (xi, yi, zi) = (self.wrap(x), self.wrap(y), self.wrap(z));
        for n in 0..NEIGH_COUNT {
            let (dx, dy, dz) = self.neighbor_offsets[n];
            let nspin = self.voxel(x + dx, y + dy, z + dz).spin;
            {
                let voxel = &self.voxels[[zi, yi, xi]];
                if nspin == voxel.spin || voxel.has_neighbor(nspin) {
                    continue;
                }
            }
            let prob = self.flip_prob(x, y, z, nspin);
            let delta =
                self.voxels[[zi, yi, xi]].set_neighbor(nspin, prob, &mut self.boundary_tracker)?;
            self.octree.delta(xi, yi, zi, delta);
        }
        Ok(())
    }

    /// Refresh one voxel's probability towards `nspin`, inserting,
    /// updating or removing the table entry as the new probability
    /// dictates.
    pub(crate) fn rebuild_neighbor_activity(
        &mut self,
        x: Coord,
        y: Coord,
        z: Coord,
        nspin: Spin,
    ) -> Result<(), LatticeError> {
        let (xi, yi, zi) = (self.wrap(x), self.wrap(y), self.wrap(z));
        let prob = self.flip_prob(x, y, z, nspin);
        let delta =
            self.voxels[[zi, yi, xi]].set_neighbor(nspin, prob, &mut self.boundary_tracker)?;
        self.octree.delta(xi, yi, zi, delta);
        Ok(())
    }

    /// Flip a voxel to a new spin, keeping every affected activity table,
    /// the octree and the boundary registry consistent.
    ///
    /// Each of the 26 neighbors is refreshed for *both* the old and the
    /// new spin: the old spin may have vanished from a neighbor's
    /// neighborhood while the new one may have appeared in it.
    pub fn flip_voxel(
        &mut self,
        x: Coord,
        y: Coord,
        z: Coord,
        new_spin: Spin,
    ) -> Result<(), LatticeError> {
        let (xi, yi, zi) = (self.wrap(x), self.wrap(y), self.wrap(z));
        let old_spin = self.voxels[[zi, yi, xi]].spin;

        let delta = self.voxels[[zi, yi, xi]].reset(&mut self.boundary_tracker);
        self.octree.delta(xi, yi, zi, delta);
        self.voxels[[zi, yi, xi]].spin = new_spin;

        self.rebuild_voxel_activity(x, y, z)?;
        for n in 0..NEIGH_COUNT {
            let (dx, dy, dz) = self.neighbor_offsets[n];
            self.rebuild_neighbor_activity(x + dx, y + dy, z + dz, old_spin)?;
            self.rebuild_neighbor_activity(x + dx, y + dy, z + dz, new_spin)?;
        }

        self.total_flips += 1;
        if self.boundary_tracker.is_transformed(old_spin, new_spin) {
            self.transformed_flips += 1;
        }
        self.boundary_tracker.track_flip(old_spin, new_spin);
        Ok(())
    }

    /// Build the initial activity state: every voxel's table is populated
    /// from its 26-neighborhood and the grain count is detected when not
    /// configured.
    pub fn init(&mut self) -> Result<(), LatticeError> {
        info!(side_length = self.side_length, "initializing lattice");

        let mut spins: HashSet<Spin> = HashSet::new();
        for z in 0..self.side_length as Coord {
            for y in 0..self.side_length as Coord {
                for x in 0..self.side_length as Coord {
                    if self.grain_count == 0 {
                        spins.insert(self.voxel(x, y, z).spin);
                    }
                    self.rebuild_voxel_activity(x, y, z)?;
                }
            }
        }
        if self.grain_count == 0 {
            self.grain_count = spins.len() as u32;
        }

        info!(
            grain_count = self.grain_count,
            system_activity = self.system_activity(),
            "lattice initialized"
        );
        Ok(())
    }

    /// Advance the simulation by one rejection-free flip, returning the
    /// elapsed simulated time (Hassold/Holm 1993, Eq. 20).
    ///
    /// Draws resample whenever they land at or above the stored total:
    /// incremental floating-point updates can leave the octree root
    /// marginally above the true sum, and a draw in that sliver has no
    /// cell under it.
    pub fn step(&mut self) -> Result<f64, LatticeError> {
        if self.system_activity() <= 0.0 {
            return Err(LatticeError::ZeroSystemActivity);
        }

        let mut rand_activ;
        loop {
            rand_activ = self.rng_range(0.0, self.system_activity());
            if rand_activ < self.system_activity() {
                break;
            }
        }

        let target = rand_activ;
        let (vx, vy, vz) = self
            .octree
            .find_voxel(rand_activ, self.side_length, |x, y, z| {
                self.voxels[[z, y, x]].activity
            })
            .ok_or(LatticeError::WalkExhausted { target })?;

        let voxel_activity = self.voxels[[vz, vy, vx]].activity;
        if voxel_activity == 0.0 {
            return Err(LatticeError::ZeroActivityVoxel {
                x: vx,
                y: vy,
                z: vz,
            });
        }

        let mut draw;
        loop {
            draw = self.rng_range(0.0, voxel_activity);
            if draw < voxel_activity {
                break;
            }
        }
        let new_spin = self.voxels[[vz, vy, vx]]
            .choose_neighbor(draw)
            .ok_or(LatticeError::NoFlipTarget {
                x: vx,
                y: vy,
                z: vz,
                draw,
            })?;

        self.flip_voxel(vx as Coord, vy as Coord, vz as Coord, new_spin)?;

        let u = self.rng_range(0.01, 0.99);
        Ok(-(f64::from(self.grain_count) - 1.0) * u.ln() / self.system_activity())
    }

    /// Open `transitions.txt` under `output_folder` and start logging
    /// boundary transitions to it.
    pub fn begin_logging_transitions(&mut self, output_folder: &Path) -> Result<(), LatticeError> {
        info!("starting to log boundary transitions");
        let file = File::create(output_folder.join("transitions.txt"))?;
        self.transition_log = Some(BufWriter::new(file));
        Ok(())
    }

    /// Stop logging transitions, flushing any buffered records.
    pub fn stop_logging_transitions(&mut self) -> Result<(), LatticeError> {
        if let Some(mut log) = self.transition_log.take() {
            log.flush()?;
        }
        Ok(())
    }

    /// Flush buffered transition records; called at checkpoints.
    pub fn flush_log_file(&mut self) -> Result<(), LatticeError> {
        if let Some(log) = &mut self.transition_log {
            log.flush()?;
        }
        Ok(())
    }

    /// Set the timestep stamped onto subsequent transition log records.
    pub fn set_log_timestep(&mut self, timestep: f64) {
        self.log_timestep = timestep;
    }
}

//! Core of the simulator: lattice state, activity bookkeeping and the
//! boundary-transformation machinery.

pub mod boundary;
pub mod lattice;
pub mod octree;
pub mod transition;
pub mod voxel;

pub use boundary::{Boundary, BoundaryKey, BoundaryTracker, FlipCounts};
pub use lattice::{Lattice, LatticeError, SpinGrid, DEFAULT_RNG_SEED, KT};
pub use octree::ActivityOctree;
pub use voxel::{Voxel, VoxelError, NEIGH_COUNT, NO_NEIGHBOR};

/// Grain identity carried by a voxel. Spin 0 is reserved as the
/// empty-slot sentinel in voxel neighbor tables.
pub type Spin = u32;

/// Signed lattice coordinate. Signed so that stepping one cell off either
/// edge stays representable before the periodic wrap is applied.
pub type Coord = i64;

//! Rejection-free Monte-Carlo grain-growth simulation on a periodic cubic
//! lattice, after the n-fold-way Potts-model algorithm of Hassold & Holm
//! (1993) with the complexion-transition extensions of Frazier (2015).
//!
//! The `potts` module holds the core: per-voxel flip-activity tables, the
//! octree that makes activity-weighted voxel selection logarithmic, the
//! grain-boundary registry, and the boundary-transformation driver. The
//! surrounding modules supply configuration, lattice file IO, the analysis
//! report writer, and the simulation loop used by the `grainsim` binary.

pub mod analysis;
pub mod config;
pub mod driver;
pub mod potts;
pub mod utils;
pub mod vtk;

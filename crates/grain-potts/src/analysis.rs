//! Checkpoint analysis: per-grain volumes, boundary curvature estimates
//! from convex/concave edge counts, surface areas, and per-boundary flip
//! tallies.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::info;

use crate::potts::{Coord, Lattice, Spin};

/// Edge stencils examined per voxel: each row is four cells around one of
/// the voxel's back/bottom/left edges. Scanning three edges per voxel
/// covers every lattice edge exactly once under the periodic wrap.
const EDGE_STENCILS: [[(Coord, Coord, Coord); 4]; 3] = [
    // back bottom
    [(0, 0, -1), (0, 0, 0), (0, -1, 0), (0, -1, -1)],
    // back left
    [(-1, 0, 0), (0, 0, 0), (0, 0, -1), (-1, 0, -1)],
    // top left
    [(-1, 1, 0), (0, 1, 0), (0, 0, 0), (-1, 0, 0)],
];

/// Accumulates grain statistics for one lattice snapshot.
#[derive(Debug, Default)]
pub struct LatticeAnalyzer {
    /// outie[[a, b]] counts edges where grain `a` pokes convexly into a
    /// 3-cell run of grain `b`.
    outie_matrix: Array2<i64>,
    volumes: Array1<i64>,
    matrix_dim: usize,
}

impl LatticeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the lattice, rebuilding the volume vector and the edge-count
    /// matrix.
    pub fn load_lattice(&mut self, lattice: &Lattice) {
        let max_grain = self.max_grain(lattice);
        let dim = max_grain as usize + 1;
        if self.matrix_dim != dim {
            self.matrix_dim = dim;
            self.outie_matrix = Array2::zeros((dim, dim));
            self.volumes = Array1::zeros(dim);
        } else {
            self.outie_matrix.fill(0);
            self.volumes.fill(0);
        }

        let side = lattice.side_length() as Coord;
        for z in 0..side {
            for y in 0..side {
                for x in 0..side {
                    for stencil in &EDGE_STENCILS {
                        self.check_edge(lattice, x, y, z, stencil);
                    }
                    self.volumes[lattice.voxel(x, y, z).spin as usize] += 1;
                }
            }
        }
    }

    fn max_grain(&self, lattice: &Lattice) -> Spin {
        let side = lattice.side_length() as Coord;
        let mut max_so_far = 0;
        for z in 0..side {
            for y in 0..side {
                for x in 0..side {
                    max_so_far = max_so_far.max(lattice.voxel(x, y, z).spin);
                }
            }
        }
        max_so_far
    }

    /// If exactly one of the four cells around an edge belongs to a
    /// different grain, that grain pokes convexly into the other: count it.
    fn check_edge(
        &mut self,
        lattice: &Lattice,
        rx: Coord,
        ry: Coord,
        rz: Coord,
        stencil: &[(Coord, Coord, Coord); 4],
    ) {
        let ids: Vec<Spin> = stencil
            .iter()
            .map(|&(dx, dy, dz)| lattice.voxel(rx + dx, ry + dy, rz + dz).spin)
            .collect();
        let (id1, id2, id3, id4) = (ids[0], ids[1], ids[2], ids[3]);

        let outie = if id1 != id2 && id2 == id3 && id2 == id4 {
            Some((id1, id2))
        } else if id2 != id1 && id1 == id3 && id1 == id4 {
            Some((id2, id1))
        } else if id3 != id1 && id1 == id2 && id1 == id4 {
            Some((id3, id1))
        } else if id4 != id1 && id1 == id2 && id1 == id3 {
            Some((id4, id1))
        } else {
            None
        };

        if let Some((poker, pokee)) = outie {
            self.outie_matrix[[poker as usize, pokee as usize]] += 1;
        }
    }

    /// Signed curvature estimate of the (a, b) boundary: the imbalance of
    /// convex pokes in each direction, scaled by pi/4. Callers must know
    /// the boundary exists; absent pairs just report zero imbalance.
    pub fn curvature(&self, a: Spin, b: Spin) -> f64 {
        (PI / 4.0)
            * (self.outie_matrix[[a as usize, b as usize]]
                - self.outie_matrix[[b as usize, a as usize]]) as f64
    }

    /// Write the analysis report: volumes, directed curvatures, surface
    /// areas and per-boundary flip tallies.
    pub fn save_analysis<P: AsRef<Path>>(
        &self,
        path: P,
        lattice: &Lattice,
    ) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        info!(path = %path.display(), "writing analysis file");

        let mut writer = BufWriter::new(File::create(path)?);

        writeln!(writer, "VOLUMES")?;
        for (grain, &volume) in self.volumes.iter().enumerate() {
            if volume == 0 {
                continue;
            }
            writeln!(writer, "{grain} {volume}")?;
        }

        writeln!(writer, "CURVATURES")?;
        for (key, boundary) in lattice.boundary_tracker().iter() {
            if boundary.area() == 0 {
                continue;
            }
            writeln!(writer, "{} {} {}", key.a, key.b, self.curvature(key.a, key.b))?;
            writeln!(writer, "{} {} {}", key.b, key.a, self.curvature(key.b, key.a))?;
        }

        writeln!(writer, "SURFACE_AREAS")?;
        for (key, boundary) in lattice.boundary_tracker().iter() {
            if boundary.area() == 0 {
                continue;
            }
            writeln!(writer, "{} {} {}", key.a, key.b, boundary.area())?;
            writeln!(writer, "{} {} {}", key.b, key.a, boundary.area())?;
        }

        writeln!(writer, "BOUNDARY_FLIPS")?;
        for (key, counts) in lattice.boundary_tracker().flip_counts() {
            writeln!(
                writer,
                "{} {} {} {}",
                key.a, key.b, counts.low_to_high, counts.high_to_low
            )?;
        }

        writer.flush()
    }
}

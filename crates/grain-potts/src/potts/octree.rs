/// Hierarchical index over per-voxel activities.
///
/// A full octree whose side is the next power of two at or above the true
/// lattice side; every internal node stores the sum of its eight children
/// and every leaf covers exactly one cell (cells in the padded region
/// beyond the true side are addressable but stay at zero). Padding to a
/// power of two sidesteps the off-by-one integer-division surprises a
/// ragged tree would invite, at the cost of some memory.
///
/// The stored sums are maintained incrementally through [`ActivityOctree::delta`];
/// they are never recomputed by re-summation, which is what makes the
/// n-fold-way step logarithmic.
#[derive(Debug, Clone)]
pub struct ActivityOctree {
    side: usize,
    height: usize,
    level_offsets: Vec<usize>,
    nodes: Vec<f64>,
}

impl ActivityOctree {
    /// Build a zeroed octree covering a cube of side `true_side`.
    pub fn new(true_side: usize) -> Self {
        let side = true_side.next_power_of_two().max(1);
        let height = side.trailing_zeros() as usize + 1;

        let mut level_offsets = Vec::with_capacity(height);
        let mut total = 0usize;
        let mut width = 1usize;
        for _ in 0..height {
            level_offsets.push(total);
            total += width;
            width *= 8;
        }

        ActivityOctree {
            side,
            height,
            level_offsets,
            nodes: vec![0.0; total],
        }
    }

    /// Side length of the (padded) region the octree covers.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Total activity of the whole lattice: the root node.
    pub fn system_activity(&self) -> f64 {
        self.nodes[0]
    }

    /// Octant bit pattern (z << 2 | y << 1 | x) selecting the child that
    /// contains `(x, y, z)` when descending from `level`.
    fn octant(&self, x: usize, y: usize, z: usize, level: usize) -> usize {
        let shift = self.side.trailing_zeros() as usize - 1 - level;
        (((z >> shift) & 1) << 2) | (((y >> shift) & 1) << 1) | ((x >> shift) & 1)
    }

    /// Shift the activity of the cell at `(x, y, z)` by `d_activ`, updating
    /// every node on the root-to-leaf path.
    pub fn delta(&mut self, x: usize, y: usize, z: usize, d_activ: f64) {
        if d_activ == 0.0 {
            return;
        }

        let mut node = 0usize;
        for level in 0..self.height {
            self.nodes[self.level_offsets[level] + node] += d_activ;
            if level + 1 < self.height {
                node = node * 8 + self.octant(x, y, z, level);
            }
        }
    }

    /// Locate the cell at which the running sum of activities (walking the
    /// lattice in octant order) covers `rand_activ`.
    ///
    /// At each level the eight siblings are visited in octant order,
    /// subtracting each stored sum that is strictly below the remaining
    /// draw; the walk descends into the sibling the draw lands in. Leaves
    /// may sit in the padded region, so the final step scans the lattice
    /// cells covered by the leaf (x fastest, clipped to `true_side`)
    /// against the live per-cell activities supplied by `cell_activity`.
    ///
    /// Returns `None` when the walk exhausts the tree without landing on a
    /// cell; callers treat that as a broken invariant.
    pub fn find_voxel<F>(
        &self,
        mut rand_activ: f64,
        true_side: usize,
        cell_activity: F,
    ) -> Option<(usize, usize, usize)>
    where
        F: Fn(usize, usize, usize) -> f64,
    {
        let (mut ox, mut oy, mut oz) = (0usize, 0usize, 0usize);
        let mut node = 0usize;
        let mut size = self.side;

        for level in 1..self.height {
            size /= 2;
            let base = self.level_offsets[level] + node * 8;
            let mut child = 0usize;
            loop {
                let stored = self.nodes[base + child];
                if stored < rand_activ {
                    rand_activ -= stored;
                    child += 1;
                    if child == 8 {
                        return None;
                    }
                } else {
                    break;
                }
            }
            node = node * 8 + child;
            if child & 1 != 0 {
                ox += size;
            }
            if child & 2 != 0 {
                oy += size;
            }
            if child & 4 != 0 {
                oz += size;
            }
        }

        for z in oz..(oz + size).min(true_side) {
            for y in oy..(oy + size).min(true_side) {
                for x in ox..(ox + size).min(true_side) {
                    let activ = cell_activity(x, y, z);
                    if activ >= rand_activ {
                        return Some((x, y, z));
                    }
                    rand_activ -= activ;
                }
            }
        }
        None
    }
}

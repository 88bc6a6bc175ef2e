//! 3D connected component labeling using union-find.
//!
//! A single raster pass over the volume assigns provisional labels and merges
//! them with the already-visited half of the neighborhood. Roots are always the
//! smaller label, so after flattening the final labels follow discovery order
//! (slice-major raster order of each component's first voxel).


use serde::{Deserialize, Serialize};

use crate::volume::{Calibration, Dims, Mask, VolumeBuffer};

// ============================================================================
// Connectivity
// ============================================================================

/// Voxel adjacency used to group foreground voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Face neighbors only.
    Six,
    /// Faces, edges and corners.
    #[default]
    TwentySix,
}

impl Connectivity {
    /// Neighbor offsets that precede a voxel in raster order.
    fn backward_offsets(self) -> &'static [[i32; 3]] {
        match self {
            Connectivity::Six => &BACKWARD_6,
            Connectivity::TwentySix => &BACKWARD_26,
        }
    }

    /// All neighbor offsets.
    pub fn offsets(self) -> &'static [[i32; 3]] {
        match self {
            Connectivity::Six => &NEIGHBORS_6,
            Connectivity::TwentySix => &NEIGHBORS_26,
        }
    }
}

const BACKWARD_6: [[i32; 3]; 3] = [[-1, 0, 0], [0, -1, 0], [0, 0, -1]];

const BACKWARD_26: [[i32; 3]; 13] = [
    [-1, -1, -1],
    [0, -1, -1],
    [1, -1, -1],
    [-1, 0, -1],
    [0, 0, -1],
    [1, 0, -1],
    [-1, 1, -1],
    [0, 1, -1],
    [1, 1, -1],
    [-1, -1, 0],
    [0, -1, 0],
    [1, -1, 0],
    [-1, 0, 0],
];

const NEIGHBORS_6: [[i32; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

pub(crate) const NEIGHBORS_26: [[i32; 3]; 26] = {
    let mut out = [[0i32; 3]; 26];
    let mut n = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = [dx, dy, dz];
                    n += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
};

// ============================================================================
// LabelMap
// ============================================================================

/// A 3D label volume from connected component analysis. 0 is background.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: VolumeBuffer<u32>,
    num_labels: usize,
}

impl LabelMap {
    /// Labels the foreground of `mask`.
    pub fn from_mask(mask: &Mask, connectivity: Connectivity) -> Self {
        let dims = mask.dims();
        let mut labels = vec![0u32; dims.len()];
        let num_labels = if dims.is_empty() {
            0
        } else {
            label_volume(mask.voxels(), dims, connectivity, &mut labels)
        };

        Self {
            labels: VolumeBuffer::new(dims, labels, mask.calibration()),
            num_labels,
        }
    }

    /// Wraps pre-computed labels. `num_labels` must be the largest label present.
    pub fn from_raw(labels: VolumeBuffer<u32>, num_labels: usize) -> Self {
        debug_assert!(labels
            .voxels()
            .iter()
            .all(|&l| (l as usize) <= num_labels));
        Self { labels, num_labels }
    }

    /// Number of connected components (excluding background).
    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.labels.dims()
    }

    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.labels.calibration()
    }

    #[inline]
    pub fn labels(&self) -> &[u32] {
        self.labels.voxels()
    }

    #[inline]
    pub fn volume(&self) -> &VolumeBuffer<u32> {
        &self.labels
    }

    pub fn into_volume(self) -> VolumeBuffer<u32> {
        self.labels
    }

    /// Voxel count per label; index 0 is the background count.
    pub fn voxel_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_labels + 1];
        for &l in self.labels.voxels() {
            counts[l as usize] += 1;
        }
        counts
    }

    /// Foreground mask of all labeled voxels.
    pub fn to_mask(&self) -> Mask {
        self.labels.map(|&l| l != 0)
    }

    /// Drops components whose physical volume lies outside `[min_volume, max_volume]`
    /// and renumbers the survivors 1..n, keeping their relative order.
    pub fn filter_by_size(self, min_volume: f64, max_volume: Option<f64>) -> LabelMap {
        let voxel_volume = self.calibration().voxel_volume();
        let counts = self.voxel_counts();

        let mut remap = vec![0u32; self.num_labels + 1];
        let mut kept = 0u32;
        for label in 1..=self.num_labels {
            let volume = counts[label] as f64 * voxel_volume;
            let too_small = volume < min_volume;
            let too_large = max_volume.is_some_and(|max| volume > max);
            if !too_small && !too_large {
                kept += 1;
                remap[label] = kept;
            }
        }

        tracing::debug!(
            before = self.num_labels,
            after = kept,
            min_volume,
            ?max_volume,
            "Size filter"
        );

        let LabelMap { mut labels, .. } = self;
        for l in labels.voxels_mut() {
            *l = remap[*l as usize];
        }

        LabelMap {
            labels,
            num_labels: kept as usize,
        }
    }
}

impl std::ops::Index<usize> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.labels[idx]
    }
}

// ============================================================================
// Raster labeling
// ============================================================================

fn label_volume(
    mask: &[bool],
    dims: Dims,
    connectivity: Connectivity,
    labels: &mut [u32],
) -> usize {
    let offsets = connectivity.backward_offsets();
    let mut uf = UnionFind::new();

    for (idx, &fg) in mask.iter().enumerate() {
        if !fg {
            continue;
        }
        let p = dims.coords(idx);

        let mut current = 0u32;
        for &offset in offsets {
            let Some(n_idx) = dims.offset_index(p, offset) else {
                continue;
            };
            let neighbor = labels[n_idx];
            if neighbor == 0 {
                continue;
            }
            if current == 0 {
                current = neighbor;
            } else if neighbor != current {
                uf.union(current, neighbor);
            }
        }

        labels[idx] = if current == 0 {
            uf.make_set()
        } else {
            current
        };
    }

    uf.flatten_labels(labels)
}

// ============================================================================
// Union-Find
// ============================================================================

#[derive(Debug)]
struct UnionFind {
    parent: Vec<u32>,
    next_label: u32,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: Vec::with_capacity(256),
            next_label: 1,
        }
    }

    #[inline]
    fn make_set(&mut self) -> u32 {
        let label = self.next_label;
        self.parent.push(label);
        self.next_label += 1;
        label
    }

    /// Find root with path compression (two-pass).
    #[inline]
    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        loop {
            let parent = self.parent[(root - 1) as usize];
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = label;
        while current != root {
            let idx = (current - 1) as usize;
            let parent = self.parent[idx];
            self.parent[idx] = root;
            current = parent;
        }

        root
    }

    #[inline]
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Flatten labels to sequential 1..n in root order.
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        if self.parent.is_empty() {
            return 0;
        }

        let len = self.parent.len();
        let mut label_map = vec![0u32; len + 1];
        let mut num_labels = 0u32;

        for i in 1..=len as u32 {
            let root = self.find(i);
            if label_map[root as usize] == 0 {
                num_labels += 1;
                label_map[root as usize] = num_labels;
            }
            label_map[i as usize] = label_map[root as usize];
        }

        for l in labels.iter_mut() {
            if *l != 0 {
                *l = label_map[*l as usize];
            }
        }

        num_labels as usize
    }
}

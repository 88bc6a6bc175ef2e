//! Topology-preserving 3D thinning.
//!
//! Border voxels are peeled one direction at a time (±x, ±y, ±z). In each
//! directional pass the deletable voxels (simple, not curve ends) are collected
//! in parallel against the current mask, then removed one by one, re-checking
//! simplicity before each removal so that no component is split and no cavity
//! or tunnel is created. A candidate that became a curve end earlier in the
//! same pass is kept. Passes repeat until nothing changes.

use rayon::prelude::*;

use crate::volume::{Dims, Mask};

const CENTER: usize = 13;

const DIRECTIONS: [[i32; 3]; 6] = [
    [0, -1, 0],
    [0, 1, 0],
    [1, 0, 0],
    [-1, 0, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Reduces `mask` to a one-voxel-wide skeleton in place. Returns the number of
/// removed voxels.
pub fn thin(mask: &mut Mask) -> usize {
    let dims = mask.dims();
    if dims.is_empty() {
        return 0;
    }

    let mut removed = 0;
    let mut passes = 0;
    loop {
        let mut changed = 0;
        for direction in DIRECTIONS {
            let candidates = collect_candidates(mask, dims, direction);
            for idx in candidates {
                let p = dims.coords(idx);
                let nb = neighborhood(mask.voxels(), dims, p);
                if foreground_neighbors(&nb) != 1 && is_simple(&nb) {
                    mask[idx] = false;
                    changed += 1;
                }
            }
        }
        passes += 1;
        removed += changed;
        if changed == 0 {
            break;
        }
    }

    tracing::debug!(removed, passes, remaining = mask.count_foreground(), "Thinned");
    removed
}

/// Border voxels in `direction` that are simple and not curve ends, in raster order.
fn collect_candidates(mask: &Mask, dims: Dims, direction: [i32; 3]) -> Vec<usize> {
    let voxels = mask.voxels();
    let per_slice: Vec<Vec<usize>> = (0..dims.depth)
        .into_par_iter()
        .map(|z| {
            let mut out = Vec::new();
            let base = z * dims.slice_len();
            for local in 0..dims.slice_len() {
                let idx = base + local;
                if !voxels[idx] {
                    continue;
                }
                let p = dims.coords(idx);
                let is_border = dims
                    .offset_index(p, direction)
                    .map_or(true, |n| !voxels[n]);
                if !is_border {
                    continue;
                }
                let nb = neighborhood(voxels, dims, p);
                if foreground_neighbors(&nb) != 1 && is_simple(&nb) {
                    out.push(idx);
                }
            }
            out
        })
        .collect();
    per_slice.into_iter().flatten().collect()
}

/// The 3x3x3 neighborhood of `p`, indexed `(dz+1)*9 + (dy+1)*3 + (dx+1)`.
/// Positions outside the volume are background.
pub(crate) fn neighborhood(voxels: &[bool], dims: Dims, p: glam::UVec3) -> [bool; 27] {
    let mut nb = [false; 27];
    for (i, cell) in nb.iter_mut().enumerate() {
        let offset = cell_offset(i);
        *cell = dims.offset_index(p, offset).is_some_and(|n| voxels[n]);
    }
    nb
}

#[inline]
fn cell_offset(i: usize) -> [i32; 3] {
    [
        (i % 3) as i32 - 1,
        ((i / 3) % 3) as i32 - 1,
        (i / 9) as i32 - 1,
    ]
}

/// Number of non-zero offset components: 1 face, 2 edge, 3 corner.
#[inline]
fn order(i: usize) -> usize {
    cell_offset(i).iter().filter(|&&c| c != 0).count()
}

#[inline]
fn adjacent_26(a: usize, b: usize) -> bool {
    let (pa, pb) = (cell_offset(a), cell_offset(b));
    a != b && (0..3).all(|k| (pa[k] - pb[k]).abs() <= 1)
}

#[inline]
fn adjacent_6(a: usize, b: usize) -> bool {
    let (pa, pb) = (cell_offset(a), cell_offset(b));
    (0..3).map(|k| (pa[k] - pb[k]).abs()).sum::<i32>() == 1
}

pub(crate) fn foreground_neighbors(nb: &[bool; 27]) -> usize {
    nb.iter()
        .enumerate()
        .filter(|&(i, &v)| i != CENTER && v)
        .count()
}

/// A voxel is simple when removing it changes neither the 26-connected
/// foreground nor the 6-connected background of its neighborhood: exactly one
/// foreground component in N26, and exactly one background component in N18
/// touching a face neighbor.
pub(crate) fn is_simple(nb: &[bool; 27]) -> bool {
    let foreground: Vec<usize> = (0..27).filter(|&i| i != CENTER && nb[i]).collect();
    if count_components(&foreground, adjacent_26, |_| true) != 1 {
        return false;
    }

    let background: Vec<usize> = (0..27)
        .filter(|&i| i != CENTER && !nb[i] && order(i) <= 2)
        .collect();
    count_components(&background, adjacent_6, |i| order(i) == 1) == 1
}

/// Components of `cells` under `adjacent` that contain at least one cell
/// accepted by `counts`.
fn count_components(
    cells: &[usize],
    adjacent: fn(usize, usize) -> bool,
    counts: impl Fn(usize) -> bool,
) -> usize {
    let mut visited = [false; 27];
    let mut stack = Vec::with_capacity(cells.len());
    let mut components = 0;

    for &seed in cells {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        stack.push(seed);
        let mut counted = false;
        while let Some(cur) = stack.pop() {
            counted |= counts(cur);
            for &other in cells {
                if !visited[other] && adjacent(cur, other) {
                    visited[other] = true;
                    stack.push(other);
                }
            }
        }
        if counted {
            components += 1;
        }
    }
    components
}

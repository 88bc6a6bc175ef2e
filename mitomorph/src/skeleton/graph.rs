//! Skeleton graph: an arena of vertices and index-pair branches.
//!
//! Every skeleton voxel is classified by its number of 26-neighbors: end
//! points have one, slab voxels two, junction voxels three or more. Touching
//! junction voxels form one junction vertex. Branches are traced through slab
//! voxels from vertex to vertex; rings without any vertex become a single
//! loop vertex carrying one self-branch.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::labeling::NEIGHBORS_26;
use crate::volume::{Calibration, Dims, Mask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    /// A voxel without skeleton neighbors.
    Isolated,
    End,
    Junction,
    /// Anchor of a ring that has no end or junction voxel.
    Loop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub kind: VertexKind,
    /// Linear voxel indices; more than one only for junction clusters.
    pub voxels: Vec<usize>,
}

/// A branch between two vertices (the same vertex for loops).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub from: usize,
    pub to: usize,
    /// Path length in microns, vertex voxel to vertex voxel.
    pub length: f64,
    pub slab_voxels: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonGraph {
    pub vertices: Vec<Vertex>,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoxelClass {
    Isolated,
    End,
    Slab,
    Junction,
}

impl SkeletonGraph {
    /// Builds the graph of a one-voxel-wide skeleton.
    pub fn build(skeleton: &Mask) -> Self {
        let dims = skeleton.dims();
        let voxels = skeleton.voxels();
        let calibration = skeleton.calibration();

        let classes: HashMap<usize, VoxelClass> = voxels
            .iter()
            .enumerate()
            .filter(|&(_, &fg)| fg)
            .map(|(idx, _)| {
                let degree = neighbors(voxels, dims, idx).count();
                let class = match degree {
                    0 => VoxelClass::Isolated,
                    1 => VoxelClass::End,
                    2 => VoxelClass::Slab,
                    _ => VoxelClass::Junction,
                };
                (idx, class)
            })
            .collect();

        let mut graph = SkeletonGraph::default();
        let mut vertex_of: HashMap<usize, usize> = HashMap::new();

        let mut ordered: Vec<usize> = classes.keys().copied().collect();
        ordered.sort_unstable();

        for &idx in &ordered {
            if vertex_of.contains_key(&idx) {
                continue;
            }
            let kind = match classes[&idx] {
                VoxelClass::Isolated => VertexKind::Isolated,
                VoxelClass::End => VertexKind::End,
                VoxelClass::Junction => VertexKind::Junction,
                VoxelClass::Slab => continue,
            };
            let members = if kind == VertexKind::Junction {
                junction_cluster(voxels, dims, &classes, idx)
            } else {
                vec![idx]
            };
            let id = graph.vertices.len();
            for &m in &members {
                vertex_of.insert(m, id);
            }
            graph.vertices.push(Vertex {
                kind,
                voxels: members,
            });
        }

        let mut visited_slabs: HashSet<usize> = HashSet::new();
        let mut direct_links: HashSet<(usize, usize)> = HashSet::new();

        for from in 0..graph.vertices.len() {
            let starts = graph.vertices[from].voxels.clone();
            for start in starts {
                for next in neighbors(voxels, dims, start) {
                    match vertex_of.get(&next) {
                        Some(&to) if to == from => {}
                        Some(&to) => {
                            let key = (start.min(next), start.max(next));
                            if direct_links.insert(key) {
                                graph.branches.push(Branch {
                                    from,
                                    to,
                                    length: distance(calibration, dims, start, next),
                                    slab_voxels: 0,
                                });
                            }
                        }
                        None => {
                            if visited_slabs.contains(&next) {
                                continue;
                            }
                            let branch = trace(
                                voxels,
                                dims,
                                calibration,
                                &vertex_of,
                                &mut visited_slabs,
                                from,
                                start,
                                next,
                            );
                            if branch.to != from || branch.slab_voxels >= 2 {
                                graph.branches.push(branch);
                            }
                        }
                    }
                }
            }
        }

        // Rings made only of slab voxels.
        for &idx in &ordered {
            if classes[&idx] != VoxelClass::Slab || visited_slabs.contains(&idx) {
                continue;
            }
            let id = graph.vertices.len();
            graph.vertices.push(Vertex {
                kind: VertexKind::Loop,
                voxels: vec![idx],
            });
            visited_slabs.insert(idx);
            vertex_of.insert(idx, id);

            let Some(first) = neighbors(voxels, dims, idx).next() else {
                continue;
            };
            let branch = trace(
                voxels,
                dims,
                calibration,
                &vertex_of,
                &mut visited_slabs,
                id,
                idx,
                first,
            );
            graph.branches.push(Branch { to: id, ..branch });
        }

        graph
    }

    /// Vertex index holding the voxel `idx`, if any.
    pub fn vertex_at(&self, idx: usize) -> Option<usize> {
        self.vertices.iter().position(|v| v.voxels.contains(&idx))
    }
}

fn neighbors(voxels: &[bool], dims: Dims, idx: usize) -> impl Iterator<Item = usize> + '_ {
    let p = dims.coords(idx);
    NEIGHBORS_26
        .into_iter()
        .filter_map(move |o| dims.offset_index(p, o))
        .filter(move |&n| voxels[n])
}

fn distance(calibration: Calibration, dims: Dims, a: usize, b: usize) -> f64 {
    calibration.distance(dims.coords(a), dims.coords(b))
}

fn junction_cluster(
    voxels: &[bool],
    dims: Dims,
    classes: &HashMap<usize, VoxelClass>,
    seed: usize,
) -> Vec<usize> {
    let mut members = vec![seed];
    let mut seen: HashSet<usize> = HashSet::from_iter([seed]);
    let mut stack = vec![seed];
    while let Some(cur) = stack.pop() {
        for n in neighbors(voxels, dims, cur) {
            if classes.get(&n) == Some(&VoxelClass::Junction) && seen.insert(n) {
                members.push(n);
                stack.push(n);
            }
        }
    }
    members.sort_unstable();
    members
}

/// Walks slab voxels from `start` (a vertex voxel) through `first` until a
/// vertex voxel is reached.
#[allow(clippy::too_many_arguments)]
fn trace(
    voxels: &[bool],
    dims: Dims,
    calibration: Calibration,
    vertex_of: &HashMap<usize, usize>,
    visited_slabs: &mut HashSet<usize>,
    from: usize,
    start: usize,
    first: usize,
) -> Branch {
    let mut length = distance(calibration, dims, start, first);
    let mut slab_voxels = 0;
    let mut prev = start;
    let mut cur = first;

    loop {
        if let Some(&to) = vertex_of.get(&cur) {
            if cur != start || slab_voxels > 0 {
                return Branch {
                    from,
                    to,
                    length,
                    slab_voxels,
                };
            }
        }
        visited_slabs.insert(cur);
        slab_voxels += 1;

        let next = neighbors(voxels, dims, cur)
            .filter(|&n| n != prev && !visited_slabs.contains(&n))
            .min_by_key(|&n| !vertex_of.contains_key(&n));
        let next = match next {
            Some(n) => n,
            // Ring closed back onto its loop anchor.
            None => match neighbors(voxels, dims, cur).find(|&n| n != prev && n == start) {
                Some(n) => n,
                None => {
                    return Branch {
                        from,
                        to: from,
                        length,
                        slab_voxels,
                    }
                }
            },
        };
        length += distance(calibration, dims, cur, next);
        prev = cur;
        cur = next;
    }
}

//! Skeletonization and network-wide skeleton statistics.

pub mod graph;
pub mod thinning;


use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::labeling::{Connectivity, LabelMap};
use crate::population::ObjectPopulation;
use crate::volume::{Mask, Plane};

pub use graph::{Branch, SkeletonGraph, Vertex, VertexKind};
pub use thinning::thin;

// ============================================================================
// Statistics
// ============================================================================

/// Branch, length, end point and junction tallies.
///
/// For a single skeleton component `branch_length` is its average branch
/// length; summed over a network it is the sum of those averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonStats {
    pub branch_count: usize,
    pub branch_length: f64,
    pub end_points: usize,
    pub junctions: usize,
}

impl Add for SkeletonStats {
    type Output = SkeletonStats;

    fn add(self, rhs: SkeletonStats) -> SkeletonStats {
        SkeletonStats {
            branch_count: self.branch_count + rhs.branch_count,
            branch_length: self.branch_length + rhs.branch_length,
            end_points: self.end_points + rhs.end_points,
            junctions: self.junctions + rhs.junctions,
        }
    }
}

impl AddAssign for SkeletonStats {
    fn add_assign(&mut self, rhs: SkeletonStats) {
        *self = *self + rhs;
    }
}

impl Sum for SkeletonStats {
    fn sum<I: Iterator<Item = SkeletonStats>>(iter: I) -> Self {
        iter.fold(SkeletonStats::default(), Add::add)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Skeleton of one population with its statistics.
#[derive(Debug, Clone)]
pub struct SkeletonResult {
    /// Sum over all skeleton components.
    pub stats: SkeletonStats,
    /// One entry per 26-connected skeleton component, in label order.
    pub trees: Vec<SkeletonStats>,
    pub graph: SkeletonGraph,
    /// One-voxel-wide skeleton.
    pub skeleton: Mask,
    /// Skeleton components labeled 1..n, maximum-projected along z.
    pub labeled_projection: Plane<u32>,
}

/// Renders a population, thins it, and tallies its skeleton graph.
pub fn extract(population: &ObjectPopulation) -> SkeletonResult {
    let mut skeleton = population.render_binary();
    thin(&mut skeleton);
    analyze(skeleton)
}

/// Tallies an already one-voxel-wide skeleton.
pub fn analyze(skeleton: Mask) -> SkeletonResult {
    let labels = LabelMap::from_mask(&skeleton, Connectivity::TwentySix);
    let graph = SkeletonGraph::build(&skeleton);

    let component_of = |vertex: usize| labels[graph.vertices[vertex].voxels[0]] as usize - 1;

    let mut branch_totals = vec![(0usize, 0.0f64); labels.num_labels()];
    for branch in &graph.branches {
        let entry = &mut branch_totals[component_of(branch.from)];
        entry.0 += 1;
        entry.1 += branch.length;
    }

    let mut trees: Vec<SkeletonStats> = branch_totals
        .iter()
        .map(|&(count, total)| SkeletonStats {
            branch_count: count,
            branch_length: if count > 0 { total / count as f64 } else { 0.0 },
            end_points: 0,
            junctions: 0,
        })
        .collect();

    for (id, vertex) in graph.vertices.iter().enumerate() {
        let tree = &mut trees[component_of(id)];
        match vertex.kind {
            VertexKind::End => tree.end_points += 1,
            VertexKind::Junction => tree.junctions += 1,
            VertexKind::Isolated | VertexKind::Loop => {}
        }
    }

    let stats: SkeletonStats = trees.iter().copied().sum();
    tracing::debug!(
        voxels = skeleton.count_foreground(),
        trees = trees.len(),
        branches = stats.branch_count,
        end_points = stats.end_points,
        junctions = stats.junctions,
        "Skeleton analyzed"
    );

    let labeled_projection = labels.volume().max_projection();
    SkeletonResult {
        stats,
        trees,
        graph,
        skeleton,
        labeled_projection,
    }
}

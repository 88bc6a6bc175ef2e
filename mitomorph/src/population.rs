//! Labeled 3D objects and their collection.

use glam::UVec3;

use crate::labeling::LabelMap;
use crate::volume::{Calibration, Dims, Mask, VolumeBuffer};

/// One connected component. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledObject {
    label: u32,
    voxels: Vec<UVec3>,
    calibration: Calibration,
}

impl LabeledObject {
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    #[inline]
    pub fn voxels(&self) -> &[UVec3] {
        &self.voxels
    }

    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.voxels.len()
    }

    /// Volume in cubic microns: voxel count x pixelWidth² x pixelDepth.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.voxels.len() as f64 * self.calibration.voxel_volume()
    }
}

/// Objects in label discovery order, with the grid they live on.
///
/// Labels are 1..=n, disjoint, and cover every foreground voxel of the label
/// map the population was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPopulation {
    objects: Vec<LabeledObject>,
    dims: Dims,
    calibration: Calibration,
}

impl ObjectPopulation {
    pub fn empty(dims: Dims, calibration: Calibration) -> Self {
        Self {
            objects: Vec::new(),
            dims,
            calibration,
        }
    }

    pub fn from_label_map(map: &LabelMap) -> Self {
        let dims = map.dims();
        let calibration = map.calibration();
        let counts = map.voxel_counts();

        let mut objects: Vec<LabeledObject> = (1..=map.num_labels())
            .map(|label| LabeledObject {
                label: label as u32,
                voxels: Vec::with_capacity(counts[label]),
                calibration,
            })
            .collect();

        for (idx, &l) in map.labels().iter().enumerate() {
            if l != 0 {
                objects[l as usize - 1].voxels.push(dims.coords(idx));
            }
        }

        Self {
            objects,
            dims,
            calibration,
        }
    }

    /// Builds a population from arbitrary label ids, renumbering them 1..n in
    /// the order they first appear.
    pub fn from_label_volume(labels: &VolumeBuffer<u32>) -> Self {
        let mut remap = hashbrown::HashMap::new();
        let compact: Vec<u32> = labels
            .voxels()
            .iter()
            .map(|&l| {
                if l == 0 {
                    return 0;
                }
                let next = remap.len() as u32 + 1;
                *remap.entry(l).or_insert(next)
            })
            .collect();
        let num_labels = remap.len();
        Self::from_label_map(&LabelMap::from_raw(labels.with_voxels(compact), num_labels))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn get(&self, label: u32) -> Option<&LabeledObject> {
        let idx = (label as usize).checked_sub(1)?;
        self.objects.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledObject> {
        self.objects.iter()
    }

    /// Sum of object volumes in cubic microns.
    pub fn total_volume(&self) -> f64 {
        self.objects.iter().map(LabeledObject::volume).sum()
    }

    /// Label volume with each object's voxels set to its label.
    pub fn render_labels(&self) -> VolumeBuffer<u32> {
        let mut out = VolumeBuffer::new_filled(self.dims, 0u32, self.calibration);
        for obj in &self.objects {
            for p in &obj.voxels {
                out[(p.x as usize, p.y as usize, p.z as usize)] = obj.label;
            }
        }
        out
    }

    /// Binary rendering of all objects.
    pub fn render_binary(&self) -> Mask {
        let mut out = VolumeBuffer::new_filled(self.dims, false, self.calibration);
        for p in self.objects.iter().flat_map(|o| o.voxels.iter()) {
            out[(p.x as usize, p.y as usize, p.z as usize)] = true;
        }
        out
    }
}

impl<'a> IntoIterator for &'a ObjectPopulation {
    type Item = &'a LabeledObject;
    type IntoIter = std::slice::Iter<'a, LabeledObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

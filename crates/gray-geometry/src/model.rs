//! The placed-volume tree.
//!
//! A [`GeometryModel`] is assembled once from a list of [`VolumeSpec`]s by a
//! [`GeometryBuilder`] and is immutable afterwards. Volumes live in a flat
//! arena and refer to each other by [`VolumeId`]: children are owned by the
//! tree top-down, and the parent link is only an index back-reference.
//!
//! Consumers that need a particular volume (the scoring layer, the primary
//! source) resolve it by name with [`GeometryModel::find_volume`] so they
//! never depend on how the geometry was constructed.

use std::collections::HashMap;

use gray_materials::{MaterialDatabase, MaterialError};
use thiserror::Error;

use crate::overlap::OverlapCheck;
use crate::shapes::{Shape, ShapeError};
use crate::transform::Transform;
use crate::units::MM3_PER_CM3;

/// Errors raised while building or querying the geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Duplicate volume name: {0}")]
    DuplicateName(String),

    #[error("Volume '{child}' refers to unknown parent '{parent}'")]
    UnknownParent { child: String, parent: String },

    #[error("No world volume defined (every volume has a parent)")]
    MissingWorld,

    #[error("Multiple world volumes: '{first}' and '{second}'")]
    MultipleWorlds { first: String, second: String },

    #[error("Volume '{0}' is not connected to the world volume")]
    Detached(String),

    #[error("Volume '{volume}' has an invalid shape: {source}")]
    InvalidShape { volume: String, source: ShapeError },

    #[error("Volume '{child}' extends outside its parent '{parent}' at {point:?} mm")]
    Containment {
        child: String,
        parent: String,
        point: [f64; 3],
    },

    #[error("Volume '{first}' overlaps sibling '{second}' at {point:?} mm (depth {depth:.3e} mm)")]
    Overlap {
        first: String,
        second: String,
        point: [f64; 3],
        depth: f64,
    },

    #[error("Volume not found: {0}")]
    NotFound(String),

    #[error("Volume '{volume}': {source}")]
    UnknownMaterial { volume: String, source: MaterialError },
}

/// Index of a volume inside a [`GeometryModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(usize);

impl VolumeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A placed volume in the tree.
#[derive(Debug, Clone)]
pub struct Volume {
    name: String,
    shape: Shape,
    material: String,
    placement: Transform,
    parent: Option<VolumeId>,
    children: Vec<VolumeId>,
}

impl Volume {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Material identifier, resolved through a [`MaterialDatabase`].
    pub fn material(&self) -> &str {
        &self.material
    }

    /// Placement relative to the parent volume.
    pub fn placement(&self) -> &Transform {
        &self.placement
    }

    pub fn parent(&self) -> Option<VolumeId> {
        self.parent
    }

    pub fn children(&self) -> &[VolumeId] {
        &self.children
    }
}

/// Declarative description of one volume, consumed by [`GeometryBuilder`].
#[derive(Debug, Clone)]
pub struct VolumeSpec {
    pub name: String,
    pub shape: Shape,
    pub material: String,
    /// Name of the parent volume; `None` for the world.
    pub parent: Option<String>,
    pub placement: Transform,
}

impl VolumeSpec {
    /// A volume at the origin of its parent, without rotation.
    pub fn new(name: impl Into<String>, shape: Shape, material: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape,
            material: material.into(),
            parent: None,
            placement: Transform::default(),
        }
    }

    /// Place this volume inside the named parent.
    pub fn inside(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Translate this volume within its parent (mm).
    pub fn at(mut self, position: [f64; 3]) -> Self {
        self.placement.translation = nalgebra::Vector3::new(position[0], position[1], position[2]);
        self
    }

    /// Replace the whole placement.
    pub fn with_placement(mut self, placement: Transform) -> Self {
        self.placement = placement;
        self
    }
}

/// Collects volume specifications and validates them into a model.
#[derive(Debug, Clone)]
pub struct GeometryBuilder {
    specs: Vec<VolumeSpec>,
    check_overlaps: bool,
    check: OverlapCheck,
}

impl GeometryBuilder {
    /// A builder with overlap checking enabled.
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            check_overlaps: true,
            check: OverlapCheck::default(),
        }
    }

    /// Add a volume.
    pub fn volume(mut self, spec: VolumeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Enable or disable the containment/overlap checks.
    pub fn check_overlaps(mut self, enabled: bool) -> Self {
        self.check_overlaps = enabled;
        self
    }

    /// Override the sampling used by the overlap checks.
    pub fn overlap_check(mut self, check: OverlapCheck) -> Self {
        self.check = check;
        self
    }

    /// Validate the specifications and assemble the immutable tree.
    pub fn build(self) -> Result<GeometryModel, GeometryError> {
        let mut index = HashMap::with_capacity(self.specs.len());
        for (i, spec) in self.specs.iter().enumerate() {
            spec.shape
                .validate()
                .map_err(|source| GeometryError::InvalidShape {
                    volume: spec.name.clone(),
                    source,
                })?;
            if index.insert(spec.name.clone(), VolumeId(i)).is_some() {
                return Err(GeometryError::DuplicateName(spec.name.clone()));
            }
        }

        let mut world: Option<VolumeId> = None;
        let mut volumes: Vec<Volume> = Vec::with_capacity(self.specs.len());
        for (i, spec) in self.specs.into_iter().enumerate() {
            let parent = match &spec.parent {
                Some(parent_name) => Some(*index.get(parent_name).ok_or_else(|| {
                    GeometryError::UnknownParent {
                        child: spec.name.clone(),
                        parent: parent_name.clone(),
                    }
                })?),
                None => {
                    if let Some(existing) = world {
                        return Err(GeometryError::MultipleWorlds {
                            first: volumes[existing.0].name.clone(),
                            second: spec.name,
                        });
                    }
                    world = Some(VolumeId(i));
                    None
                }
            };
            volumes.push(Volume {
                name: spec.name,
                shape: spec.shape,
                material: spec.material,
                placement: spec.placement,
                parent,
                children: Vec::new(),
            });
        }
        let world = world.ok_or(GeometryError::MissingWorld)?;

        for i in 0..volumes.len() {
            if let Some(parent) = volumes[i].parent {
                volumes[parent.0].children.push(VolumeId(i));
            }
        }

        let model = GeometryModel {
            volumes,
            index,
            world,
        };

        let reachable = model.walk().len();
        if reachable != model.volumes.len() {
            let detached = model
                .volumes
                .iter()
                .find(|v| !model.is_descendant_of_world(v))
                .map(|v| v.name.clone())
                .unwrap_or_default();
            return Err(GeometryError::Detached(detached));
        }

        if self.check_overlaps {
            model.check_placements(&self.check)?;
        } else {
            log::warn!("Geometry overlap checking disabled");
        }

        log::info!(
            "Geometry built: {} volumes under world '{}'",
            model.len(),
            model.volume(world).name
        );
        Ok(model)
    }
}

impl Default for GeometryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable tree of placed volumes.
#[derive(Debug, Clone)]
pub struct GeometryModel {
    volumes: Vec<Volume>,
    index: HashMap<String, VolumeId>,
    world: VolumeId,
}

impl GeometryModel {
    /// Resolve a volume by its unique name.
    pub fn find_volume(&self, name: &str) -> Result<VolumeId, GeometryError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GeometryError::NotFound(name.to_string()))
    }

    /// Access a volume by id.
    pub fn volume(&self, id: VolumeId) -> &Volume {
        &self.volumes[id.0]
    }

    /// Convenience lookup by name.
    pub fn get(&self, name: &str) -> Option<&Volume> {
        self.index.get(name).map(|&id| self.volume(id))
    }

    /// The root volume.
    pub fn world(&self) -> VolumeId {
        self.world
    }

    pub fn parent(&self, id: VolumeId) -> Option<VolumeId> {
        self.volume(id).parent
    }

    pub fn children(&self, id: VolumeId) -> &[VolumeId] {
        &self.volume(id).children
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// All volumes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, &Volume)> {
        self.volumes
            .iter()
            .enumerate()
            .map(|(i, v)| (VolumeId(i), v))
    }

    /// Depth-first traversal from the world: (depth, id) pairs.
    pub fn walk(&self) -> Vec<(usize, VolumeId)> {
        let mut order = Vec::with_capacity(self.volumes.len());
        let mut stack = vec![(0, self.world)];
        while let Some((depth, id)) = stack.pop() {
            order.push((depth, id));
            if order.len() > self.volumes.len() {
                break;
            }
            for &child in self.children(id).iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        order
    }

    /// Placement of a volume relative to the world frame.
    pub fn global_transform(&self, id: VolumeId) -> Transform {
        let mut transform = self.volume(id).placement.clone();
        let mut current = self.volume(id).parent;
        while let Some(parent) = current {
            transform = transform.then(&self.volume(parent).placement);
            current = self.volume(parent).parent;
        }
        transform
    }

    /// Mass of a volume (g): material density times shape volume.
    ///
    /// Daughter volumes are not subtracted; the mass is that of the full
    /// solid, as used for dose in the scoring volume.
    pub fn mass(
        &self,
        id: VolumeId,
        materials: &dyn MaterialDatabase,
    ) -> Result<f64, GeometryError> {
        let volume = self.volume(id);
        volume
            .shape
            .validate()
            .map_err(|source| GeometryError::InvalidShape {
                volume: volume.name.clone(),
                source,
            })?;
        let density = materials
            .density(&volume.material)
            .map_err(|source| GeometryError::UnknownMaterial {
                volume: volume.name.clone(),
                source,
            })?;
        Ok(density * volume.shape.volume() / MM3_PER_CM3)
    }

    fn is_descendant_of_world(&self, volume: &Volume) -> bool {
        let mut current = volume.parent;
        let mut hops = 0;
        while let Some(parent) = current {
            if parent == self.world {
                return true;
            }
            hops += 1;
            if hops > self.volumes.len() {
                return false;
            }
            current = self.volume(parent).parent;
        }
        volume.parent.is_none()
    }

    fn check_placements(&self, check: &OverlapCheck) -> Result<(), GeometryError> {
        for (_, id) in self.walk() {
            let parent = self.volume(id);
            let children = &parent.children;
            for (i, &child) in children.iter().enumerate() {
                check.check_containment(self.volume(child), parent)?;
                for &sibling in &children[i + 1..] {
                    check.check_siblings(self.volume(child), self.volume(sibling))?;
                }
            }
            log::debug!(
                "Checked placements of {} daughters in '{}'",
                children.len(),
                parent.name
            );
        }
        Ok(())
    }
}

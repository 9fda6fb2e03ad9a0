//! Hierarchical scene graph.
//!
//! A [`Document`] owns every [`GroupNode`] and [`Entity`] in an arena keyed
//! by document-local ids. Group children and entity memberships are links:
//! the same entity may be a member of several groups and a group may be
//! linked under several parents. Parent attachment and deformer parameters
//! are non-owning references to other entities.

use crate::suffix::remove_last_segment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

/// Identifier of a group within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Identifier of an entity within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Errors raised by graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The group does not exist in this document.
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    /// The entity does not exist in this document.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// Linking would make the group hierarchy cyclic.
    #[error("linking {child} under {parent} would create a cycle")]
    Cycle {
        /// Group that would receive the link
        parent: GroupId,
        /// Group being linked
        child: GroupId,
    },
}

/// Type tag of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Polygon geometry
    Mesh,
    /// Curve geometry, including hair curves
    Curve,
    /// Skeleton driving deformation
    Armature,
    /// Transform-only placeholder
    #[default]
    Empty,
    /// Any other type, by name
    Other(String),
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Mesh => write!(f, "mesh"),
            EntityKind::Curve => write!(f, "curve"),
            EntityKind::Armature => write!(f, "armature"),
            EntityKind::Empty => write!(f, "empty"),
            EntityKind::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Local transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub translation: [f64; 3],
    /// Euler rotation in radians
    pub rotation: [f64; 3],
    /// Per-axis scale
    pub scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// A deformer parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Free text
    Text(String),
    /// Reference to another entity
    Entity(EntityId),
}

/// An ordered deformation step applied to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deformer {
    /// Name, unique within the owning entity
    pub name: String,
    /// Deformer type (e.g. "armature", "subdivision")
    pub kind: String,
    /// Named parameters
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl Deformer {
    /// Create a deformer without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Entities referenced by this deformer's parameters.
    pub fn entity_refs(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.params.values().filter_map(|value| match value {
            ParamValue::Entity(id) => Some(*id),
            _ => None,
        })
    }
}

/// Where a material slot stores its assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotLink {
    /// Stored on the entity itself
    Entity,
    /// Stored on the shared geometry data
    #[default]
    Data,
}

/// A material slot on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSlot {
    /// Link mode
    #[serde(default)]
    pub link: SlotLink,
    /// Assigned material, if any
    pub material: Option<String>,
}

/// Element counts describing a mesh topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    /// Vertex count
    pub vertices: u32,
    /// Edge count
    pub edges: u32,
    /// Face count
    pub faces: u32,
}

/// A scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Document-local id
    pub id: EntityId,
    /// Unique name within the document
    pub name: String,
    /// Type tag
    #[serde(default)]
    pub kind: EntityKind,
    /// Local transform
    #[serde(default)]
    pub transform: Transform,
    /// Ordered deformer stack
    #[serde(default)]
    pub deformers: Vec<Deformer>,
    /// Material slots
    #[serde(default)]
    pub material_slots: Vec<MaterialSlot>,
    /// Entity this one is attached to
    #[serde(default)]
    pub parent: Option<EntityId>,
    /// Geometry summary for meshes
    #[serde(default)]
    pub topology: Option<Topology>,
}

impl Entity {
    /// Every entity this one references.
    pub fn entity_refs(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.parent
            .into_iter()
            .chain(self.deformers.iter().flat_map(Deformer::entity_refs))
    }

    /// Rewrite references to `from` so they point at `to`.
    ///
    /// Returns the number of rewritten references.
    pub fn remap_reference(&mut self, from: EntityId, to: EntityId) -> usize {
        self.rewrite_refs(|id| (id == from).then_some(Some(to)))
    }

    /// Apply `rewrite` to every entity reference.
    ///
    /// `rewrite` returns `None` to keep a reference, `Some(Some(id))` to
    /// replace it and `Some(None)` to clear it. Cleared deformer parameters
    /// are removed. Returns the number of touched references.
    pub fn rewrite_refs<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(EntityId) -> Option<Option<EntityId>>,
    {
        let mut touched = 0;
        if let Some(parent) = self.parent {
            if let Some(replacement) = rewrite(parent) {
                self.parent = replacement;
                touched += 1;
            }
        }
        for deformer in &mut self.deformers {
            let mut cleared = Vec::new();
            for (key, value) in &mut deformer.params {
                if let ParamValue::Entity(id) = value {
                    match rewrite(*id) {
                        Some(Some(replacement)) => {
                            *id = replacement;
                            touched += 1;
                        }
                        Some(None) => {
                            cleared.push(key.clone());
                            touched += 1;
                        }
                        None => {}
                    }
                }
            }
            for key in cleared {
                deformer.params.remove(&key);
            }
        }
        touched
    }
}

/// Viewport and render visibility flags of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Visibility {
    /// Hidden in the viewport
    pub hide_viewport: bool,
    /// Hidden in renders
    pub hide_render: bool,
}

/// A named group of child groups and member entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    /// Document-local id
    pub id: GroupId,
    /// Unique name within the document
    pub name: String,
    /// Linked child groups, in order
    #[serde(default)]
    pub children: Vec<GroupId>,
    /// Member entities, in order
    #[serde(default)]
    pub entities: Vec<EntityId>,
    /// Visibility flags
    #[serde(default)]
    pub visibility: Visibility,
}

/// Counts of nodes removed by [`Document::purge_orphans`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeReport {
    /// Removed groups
    pub groups: usize,
    /// Removed entities
    pub entities: usize,
}

/// A scene graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    uid: Uuid,
    scene: GroupId,
    next_id: u64,
    groups: BTreeMap<GroupId, GroupNode>,
    entities: BTreeMap<EntityId, Entity>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("Scene")
    }
}

impl Document {
    /// Create a document holding only a scene root group.
    #[must_use]
    pub fn new(scene_name: impl Into<String>) -> Self {
        let mut document = Self {
            uid: Uuid::new_v4(),
            scene: GroupId(0),
            next_id: 0,
            groups: BTreeMap::new(),
            entities: BTreeMap::new(),
        };
        document.scene = document.add_group(scene_name);
        document
    }

    /// Unique identity of this document.
    #[must_use]
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// The scene root group.
    #[must_use]
    pub fn scene(&self) -> GroupId {
        self.scene
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add an unlinked group.
    pub fn add_group(&mut self, name: impl Into<String>) -> GroupId {
        let id = GroupId(self.allocate());
        self.groups.insert(
            id,
            GroupNode {
                id,
                name: name.into(),
                children: Vec::new(),
                entities: Vec::new(),
                visibility: Visibility::default(),
            },
        );
        id
    }

    /// Add an entity that is not a member of any group.
    pub fn add_entity(&mut self, name: impl Into<String>, kind: EntityKind) -> EntityId {
        let id = EntityId(self.allocate());
        self.entities.insert(
            id,
            Entity {
                id,
                name: name.into(),
                kind,
                transform: Transform::default(),
                deformers: Vec::new(),
                material_slots: Vec::new(),
                parent: None,
                topology: None,
            },
        );
        id
    }

    /// Look up a group.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&GroupNode> {
        self.groups.get(&id)
    }

    /// Look up a group for mutation.
    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut GroupNode> {
        self.groups.get_mut(&id)
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up an entity for mutation.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether the group exists.
    #[must_use]
    pub fn contains_group(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Whether the entity exists.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All groups, in id order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupNode> {
        self.groups.values()
    }

    /// All entities, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Name of a group, or an empty string when it does not exist.
    #[must_use]
    pub fn group_name(&self, id: GroupId) -> &str {
        self.groups.get(&id).map_or("", |group| group.name.as_str())
    }

    /// Name of an entity, or an empty string when it does not exist.
    #[must_use]
    pub fn entity_name(&self, id: EntityId) -> &str {
        self.entities.get(&id).map_or("", |entity| entity.name.as_str())
    }

    /// Link `child` under `parent`.
    ///
    /// Returns `false` when the link already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if either group is unknown or the link would
    /// introduce a cycle.
    pub fn link_child(&mut self, parent: GroupId, child: GroupId) -> Result<bool, GraphError> {
        if !self.contains_group(child) {
            return Err(GraphError::UnknownGroup(child));
        }
        if parent == child || self.descendants(child).contains(&parent) {
            return Err(GraphError::Cycle { parent, child });
        }
        let node = self
            .groups
            .get_mut(&parent)
            .ok_or(GraphError::UnknownGroup(parent))?;
        if node.children.contains(&child) {
            return Ok(false);
        }
        node.children.push(child);
        Ok(true)
    }

    /// Remove the link from `parent` to `child`.
    ///
    /// Returns whether a link was removed.
    pub fn unlink_child(&mut self, parent: GroupId, child: GroupId) -> bool {
        let Some(node) = self.groups.get_mut(&parent) else {
            return false;
        };
        let before = node.children.len();
        node.children.retain(|id| *id != child);
        before != node.children.len()
    }

    /// Replace the link to `old` in `parent` with a link to `new`, keeping
    /// its position. When `new` is already linked the old link is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a group is unknown or the link would introduce a
    /// cycle.
    pub fn replace_child(
        &mut self,
        parent: GroupId,
        old: GroupId,
        new: GroupId,
    ) -> Result<(), GraphError> {
        if !self.contains_group(new) {
            return Err(GraphError::UnknownGroup(new));
        }
        if parent == new || self.descendants(new).contains(&parent) {
            return Err(GraphError::Cycle { parent, child: new });
        }
        let node = self
            .groups
            .get_mut(&parent)
            .ok_or(GraphError::UnknownGroup(parent))?;
        if node.children.contains(&new) {
            node.children.retain(|id| *id != old);
        } else if let Some(slot) = node.children.iter_mut().find(|id| **id == old) {
            *slot = new;
        } else {
            node.children.push(new);
        }
        Ok(())
    }

    /// Make `entity` a member of `group`.
    ///
    /// Returns `false` when it already was.
    ///
    /// # Errors
    ///
    /// Returns an error if the group or entity is unknown.
    pub fn link_entity(&mut self, group: GroupId, entity: EntityId) -> Result<bool, GraphError> {
        if !self.contains_entity(entity) {
            return Err(GraphError::UnknownEntity(entity));
        }
        let node = self
            .groups
            .get_mut(&group)
            .ok_or(GraphError::UnknownGroup(group))?;
        if node.entities.contains(&entity) {
            return Ok(false);
        }
        node.entities.push(entity);
        Ok(true)
    }

    /// Remove `entity` from the members of `group`.
    pub fn unlink_entity(&mut self, group: GroupId, entity: EntityId) -> bool {
        let Some(node) = self.groups.get_mut(&group) else {
            return false;
        };
        let before = node.entities.len();
        node.entities.retain(|id| *id != entity);
        before != node.entities.len()
    }

    /// Replace membership of `old` in `group` with `new`, keeping its
    /// position.
    ///
    /// # Errors
    ///
    /// Returns an error if the group or the new entity is unknown.
    pub fn replace_entity(
        &mut self,
        group: GroupId,
        old: EntityId,
        new: EntityId,
    ) -> Result<(), GraphError> {
        if !self.contains_entity(new) {
            return Err(GraphError::UnknownEntity(new));
        }
        let node = self
            .groups
            .get_mut(&group)
            .ok_or(GraphError::UnknownGroup(group))?;
        if node.entities.contains(&new) {
            node.entities.retain(|id| *id != old);
        } else if let Some(slot) = node.entities.iter_mut().find(|id| **id == old) {
            *slot = new;
        } else {
            node.entities.push(new);
        }
        Ok(())
    }

    /// Unlink every member entity of `group` and return them.
    pub fn unlink_all_entities(&mut self, group: GroupId) -> Vec<EntityId> {
        self.groups
            .get_mut(&group)
            .map(|node| std::mem::take(&mut node.entities))
            .unwrap_or_default()
    }

    /// Delete a group, unlinking it from every parent.
    ///
    /// Its children and members are not deleted.
    pub fn remove_group(&mut self, id: GroupId) -> Option<GroupNode> {
        if id == self.scene {
            return None;
        }
        let removed = self.groups.remove(&id)?;
        for node in self.groups.values_mut() {
            node.children.retain(|child| *child != id);
        }
        Some(removed)
    }

    /// Delete an entity, unlinking it from every group and clearing every
    /// reference to it.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id)?;
        for node in self.groups.values_mut() {
            node.entities.retain(|member| *member != id);
        }
        for entity in self.entities.values_mut() {
            entity.rewrite_refs(|referenced| (referenced == id).then_some(None));
        }
        Some(removed)
    }

    /// Groups that link `child`.
    #[must_use]
    pub fn parents_of(&self, child: GroupId) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|node| node.children.contains(&child))
            .map(|node| node.id)
            .collect()
    }

    /// Groups that have `entity` as a member.
    #[must_use]
    pub fn groups_containing(&self, entity: EntityId) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|node| node.entities.contains(&entity))
            .map(|node| node.id)
            .collect()
    }

    /// Direct child of `parent` with the given name.
    #[must_use]
    pub fn find_child_by_name(&self, parent: GroupId, name: &str) -> Option<GroupId> {
        self.groups.get(&parent)?.children.iter().copied().find(|child| {
            self.groups
                .get(child)
                .is_some_and(|node| node.name == name)
        })
    }

    /// Any group with the given name.
    #[must_use]
    pub fn find_group(&self, name: &str) -> Option<GroupId> {
        self.groups
            .values()
            .find(|node| node.name == name)
            .map(|node| node.id)
    }

    /// Any entity with the given name.
    #[must_use]
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.entities
            .values()
            .find(|entity| entity.name == name)
            .map(|entity| entity.id)
    }

    /// Every group reachable below `root`, breadth first, excluding `root`.
    #[must_use]
    pub fn descendants(&self, root: GroupId) -> Vec<GroupId> {
        let mut seen = BTreeSet::from([root]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.groups.get(&current) else {
                continue;
            };
            for child in &node.children {
                if seen.insert(*child) {
                    order.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        order
    }

    /// Every entity that is a member of `root` or one of its descendants.
    #[must_use]
    pub fn all_entities(&self, root: GroupId) -> Vec<EntityId> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for group in std::iter::once(root).chain(self.descendants(root)) {
            let Some(node) = self.groups.get(&group) else {
                continue;
            };
            for entity in &node.entities {
                if seen.insert(*entity) {
                    order.push(*entity);
                }
            }
        }
        order
    }

    /// Rewrite every reference to `from` so it points at `to`.
    ///
    /// Returns the number of rewritten references.
    pub fn remap_entity_references(&mut self, from: EntityId, to: EntityId) -> usize {
        self.entities
            .values_mut()
            .map(|entity| entity.remap_reference(from, to))
            .sum()
    }

    /// Append `suffix` to the names of `root`, its descendant groups and
    /// their entities.
    pub fn add_suffix_to_hierarchy(&mut self, root: GroupId, suffix: &str) {
        self.rename_hierarchy(root, |name| format!("{name}{suffix}"));
    }

    /// Drop the last delimiter-separated segment from the names of `root`,
    /// its descendant groups and their entities.
    pub fn remove_suffix_from_hierarchy(&mut self, root: GroupId) {
        self.rename_hierarchy(root, |name| remove_last_segment(name).to_string());
    }

    fn rename_hierarchy<F>(&mut self, root: GroupId, rename: F)
    where
        F: Fn(&str) -> String,
    {
        let entities = self.all_entities(root);
        for group in std::iter::once(root).chain(self.descendants(root)) {
            if let Some(node) = self.groups.get_mut(&group) {
                node.name = rename(&node.name);
            }
        }
        for entity in entities {
            if let Some(entity) = self.entities.get_mut(&entity) {
                entity.name = rename(&entity.name);
            }
        }
    }

    /// Delete every group not reachable from the scene root and every
    /// entity neither a member of a reachable group nor referenced by a
    /// kept entity.
    pub fn purge_orphans(&mut self) -> PurgeReport {
        let mut reachable_groups: BTreeSet<GroupId> = self.descendants(self.scene).into_iter().collect();
        reachable_groups.insert(self.scene);

        let mut kept: BTreeSet<EntityId> = self.all_entities(self.scene).into_iter().collect();
        let mut pending: Vec<EntityId> = kept.iter().copied().collect();
        while let Some(current) = pending.pop() {
            let Some(entity) = self.entities.get(&current) else {
                continue;
            };
            for referenced in entity.entity_refs() {
                if self.entities.contains_key(&referenced) && kept.insert(referenced) {
                    pending.push(referenced);
                }
            }
        }

        let groups_before = self.groups.len();
        let entities_before = self.entities.len();
        self.groups.retain(|id, _| reachable_groups.contains(id));
        self.entities.retain(|id, _| kept.contains(id));

        let report = PurgeReport {
            groups: groups_before - self.groups.len(),
            entities: entities_before - self.entities.len(),
        };
        tracing::debug!(
            groups = report.groups,
            entities = report.entities,
            "Purged orphaned nodes"
        );
        report
    }

    /// Insert a copy of `subtree`, appending `suffix` to every copied name.
    ///
    /// The copied root is returned unlinked. References to entities outside
    /// the subtree are kept when the subtree was collected from this
    /// document and cleared otherwise.
    pub fn insert_subtree(&mut self, subtree: &Subtree, suffix: &str) -> GroupId {
        let mut group_ids = BTreeMap::new();
        for group in &subtree.groups {
            let copy = self.add_group(format!("{}{suffix}", group.name));
            group_ids.insert(group.id, copy);
        }
        let mut entity_ids = BTreeMap::new();
        for entity in &subtree.entities {
            let copy = self.add_entity(format!("{}{suffix}", entity.name), entity.kind.clone());
            entity_ids.insert(entity.id, copy);
        }

        let same_document = subtree.origin == self.uid;
        for group in &subtree.groups {
            let Some(copy) = group_ids.get(&group.id).and_then(|id| self.groups.get_mut(id)) else {
                continue;
            };
            copy.visibility = group.visibility;
            copy.children = group
                .children
                .iter()
                .filter_map(|child| group_ids.get(child).copied())
                .collect();
            copy.entities = group
                .entities
                .iter()
                .filter_map(|entity| entity_ids.get(entity).copied())
                .collect();
        }
        for entity in &subtree.entities {
            let Some(copy) = entity_ids.get(&entity.id).and_then(|id| self.entities.get_mut(id)) else {
                continue;
            };
            copy.transform = entity.transform;
            copy.deformers.clone_from(&entity.deformers);
            copy.material_slots.clone_from(&entity.material_slots);
            copy.parent = entity.parent;
            copy.topology = entity.topology;
            copy.rewrite_refs(|referenced| match entity_ids.get(&referenced) {
                Some(mapped) => Some(Some(*mapped)),
                None if same_document => None,
                None => Some(None),
            });
        }

        let root = group_ids
            .get(&subtree.root)
            .copied()
            .unwrap_or(self.scene);
        tracing::debug!(
            root = %root,
            groups = group_ids.len(),
            entities = entity_ids.len(),
            suffix,
            "Inserted subtree copy"
        );
        root
    }
}

/// A detached copy of a group hierarchy and its member entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    origin: Uuid,
    root: GroupId,
    groups: Vec<GroupNode>,
    entities: Vec<Entity>,
}

impl Subtree {
    /// Copy `root`, its descendants and their member entities out of
    /// `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist.
    pub fn collect(document: &Document, root: GroupId) -> Result<Self, GraphError> {
        if !document.contains_group(root) {
            return Err(GraphError::UnknownGroup(root));
        }
        let groups = std::iter::once(root)
            .chain(document.descendants(root))
            .filter_map(|id| document.group(id).cloned())
            .collect();
        let entities = document
            .all_entities(root)
            .into_iter()
            .filter_map(|id| document.entity(id).cloned())
            .collect();
        Ok(Self {
            origin: document.uid(),
            root,
            groups,
            entities,
        })
    }

    /// Name of the copied root.
    #[must_use]
    pub fn root_name(&self) -> &str {
        self.groups.first().map_or("", |group| group.name.as_str())
    }

    /// Number of copied groups, including the root.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of copied entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, GroupId, GroupId, EntityId, EntityId) {
        let mut doc = Document::default();
        let asset = doc.add_group("einar");
        let geo = doc.add_group("einar.geometry");
        doc.link_child(doc.scene(), asset).unwrap();
        doc.link_child(asset, geo).unwrap();
        let rig = doc.add_entity("RIG-einar", EntityKind::Armature);
        let body = doc.add_entity("GEO-body", EntityKind::Mesh);
        doc.link_entity(asset, rig).unwrap();
        doc.link_entity(geo, body).unwrap();
        doc.entity_mut(body).unwrap().parent = Some(rig);
        (doc, asset, geo, rig, body)
    }

    #[test]
    fn test_link_child_rejects_cycles() {
        let (mut doc, asset, geo, _, _) = sample();
        assert_eq!(
            doc.link_child(geo, asset),
            Err(GraphError::Cycle {
                parent: geo,
                child: asset
            })
        );
        assert!(matches!(
            doc.link_child(geo, geo),
            Err(GraphError::Cycle { .. })
        ));
        assert_eq!(doc.link_child(asset, geo), Ok(false));
    }

    #[test]
    fn test_descendants_and_entities() {
        let (doc, asset, geo, rig, body) = sample();
        assert_eq!(doc.descendants(asset), vec![geo]);
        assert_eq!(doc.all_entities(asset), vec![rig, body]);
        assert_eq!(doc.parents_of(geo), vec![asset]);
        assert_eq!(doc.groups_containing(body), vec![geo]);
    }

    #[test]
    fn test_remove_entity_clears_references() {
        let (mut doc, _, geo, rig, body) = sample();
        doc.entity_mut(body)
            .unwrap()
            .deformers
            .push(Deformer::new("Armature", "armature").with_param("object", ParamValue::Entity(rig)));

        doc.remove_entity(rig);

        let body = doc.entity(body).unwrap();
        assert_eq!(body.parent, None);
        assert!(body.deformers[0].params.is_empty());
        assert!(doc.group(geo).unwrap().entities.contains(&body.id));
    }

    #[test]
    fn test_replace_keeps_position() {
        let (mut doc, asset, _, rig, _) = sample();
        let other = doc.add_entity("RIG-other", EntityKind::Armature);
        let extra = doc.add_entity("EMPTY-extra", EntityKind::Empty);
        doc.link_entity(asset, extra).unwrap();

        doc.replace_entity(asset, rig, other).unwrap();

        assert_eq!(doc.group(asset).unwrap().entities, vec![other, extra]);
    }

    #[test]
    fn test_suffix_round_trip() {
        let (mut doc, asset, geo, rig, _) = sample();
        doc.add_suffix_to_hierarchy(asset, ".PUBLISH");
        assert_eq!(doc.group_name(asset), "einar.PUBLISH");
        assert_eq!(doc.group_name(geo), "einar.geometry.PUBLISH");
        assert_eq!(doc.entity_name(rig), "RIG-einar.PUBLISH");

        doc.remove_suffix_from_hierarchy(asset);
        assert_eq!(doc.group_name(asset), "einar");
        assert_eq!(doc.group_name(geo), "einar.geometry");
    }

    #[test]
    fn test_purge_keeps_referenced_entities() {
        let (mut doc, asset, geo, rig, body) = sample();
        let stray_group = doc.add_group("stray");
        let stray = doc.add_entity("stray", EntityKind::Empty);
        doc.unlink_entity(asset, rig);

        let report = doc.purge_orphans();

        assert_eq!(report, PurgeReport { groups: 1, entities: 1 });
        assert!(doc.contains_entity(rig));
        assert!(doc.contains_entity(body));
        assert!(doc.contains_group(geo));
        assert!(!doc.contains_group(stray_group));
        assert!(!doc.contains_entity(stray));
    }

    #[test]
    fn test_insert_subtree_remaps_internal_refs() {
        let (doc, asset, _, _, _) = sample();
        let subtree = Subtree::collect(&doc, asset).unwrap();
        assert_eq!(subtree.root_name(), "einar");

        let mut other = Document::default();
        let copy = other.insert_subtree(&subtree, ".TASK");
        other.link_child(other.scene(), copy).unwrap();

        assert_eq!(other.group_name(copy), "einar.TASK");
        let body = other.find_entity("GEO-body.TASK").unwrap();
        let rig = other.find_entity("RIG-einar.TASK").unwrap();
        assert_eq!(other.entity(body).unwrap().parent, Some(rig));
        assert_eq!(other.all_entities(copy).len(), 2);
    }

    #[test]
    fn test_insert_subtree_external_refs() {
        let (mut doc, _, geo, rig, body) = sample();
        doc.entity_mut(body).unwrap().parent = Some(rig);
        let subtree = Subtree::collect(&doc, geo).unwrap();

        let same = doc.insert_subtree(&subtree, ".COPY");
        let copied_body = doc.all_entities(same)[0];
        assert_eq!(doc.entity(copied_body).unwrap().parent, Some(rig));

        let mut other = Document::default();
        let foreign = other.insert_subtree(&subtree, "");
        let foreign_body = other.all_entities(foreign)[0];
        assert_eq!(other.entity(foreign_body).unwrap().parent, None);
    }

    #[test]
    fn test_serde_round_trip() {
        let (doc, _, _, _, _) = sample();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}

//! Per-triangle scalar attributes and the typed tag registry.
//!
//! Tags are attached temporarily by editing operations (for example the
//! sub-object label used while cutting) and are looked up by a marker type,
//! so asking for the wrong value type is a compile error rather than a
//! silent miss.

use crate::mesh::TriangleId;
use hashbrown::HashMap;
use std::fmt::Debug;

/// One value per triangle ID. New triangles receive `fill`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleAttribute<T> {
    values: Vec<T>,
    fill: T,
}

impl<T: Copy> TriangleAttribute<T> {
    pub fn new(triangle_slots: usize, initial: T, fill: T) -> Self {
        Self {
            values: vec![initial; triangle_slots],
            fill,
        }
    }

    /// Value for `triangle`, or the fill value for an unknown slot.
    pub fn get(&self, triangle: TriangleId) -> T {
        self.values.get(triangle.0).copied().unwrap_or(self.fill)
    }

    pub fn set(&mut self, triangle: TriangleId, value: T) {
        if triangle.0 >= self.values.len() {
            self.values.resize(triangle.0 + 1, self.fill);
        }
        self.values[triangle.0] = value;
    }

    pub(crate) fn push_slot(&mut self) {
        self.values.push(self.fill);
    }

    pub(crate) fn ensure_slots(&mut self, count: usize) {
        if self.values.len() < count {
            self.values.resize(count, self.fill);
        }
    }

    pub(crate) fn remapped(&self, old_ids: &[TriangleId]) -> Self {
        Self {
            values: old_ids.iter().map(|t| self.get(*t)).collect(),
            fill: self.fill,
        }
    }
}

/// Registry key of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    /// Triangle belongs to the original outer surface
    IsShell,
    /// Integer label of the piece a triangle belongs to
    SubObject,
}

/// Type-erased storage for one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagStorage {
    Bool(TriangleAttribute<bool>),
    Int(TriangleAttribute<i32>),
}

impl TagStorage {
    fn push_slot(&mut self) {
        match self {
            TagStorage::Bool(a) => a.push_slot(),
            TagStorage::Int(a) => a.push_slot(),
        }
    }

    fn ensure_slots(&mut self, count: usize) {
        match self {
            TagStorage::Bool(a) => a.ensure_slots(count),
            TagStorage::Int(a) => a.ensure_slots(count),
        }
    }

    fn remapped(&self, old_ids: &[TriangleId]) -> Self {
        match self {
            TagStorage::Bool(a) => TagStorage::Bool(a.remapped(old_ids)),
            TagStorage::Int(a) => TagStorage::Int(a.remapped(old_ids)),
        }
    }
}

/// Scalar types a tag can hold.
pub trait TagValue: Copy + Default + Debug + PartialEq + 'static {
    fn wrap(attribute: TriangleAttribute<Self>) -> TagStorage;
    fn as_attribute(storage: &TagStorage) -> Option<&TriangleAttribute<Self>>;
    fn as_attribute_mut(storage: &mut TagStorage) -> Option<&mut TriangleAttribute<Self>>;
}

impl TagValue for bool {
    fn wrap(attribute: TriangleAttribute<Self>) -> TagStorage {
        TagStorage::Bool(attribute)
    }
    fn as_attribute(storage: &TagStorage) -> Option<&TriangleAttribute<Self>> {
        match storage {
            TagStorage::Bool(a) => Some(a),
            _ => None,
        }
    }
    fn as_attribute_mut(storage: &mut TagStorage) -> Option<&mut TriangleAttribute<Self>> {
        match storage {
            TagStorage::Bool(a) => Some(a),
            _ => None,
        }
    }
}

impl TagValue for i32 {
    fn wrap(attribute: TriangleAttribute<Self>) -> TagStorage {
        TagStorage::Int(attribute)
    }
    fn as_attribute(storage: &TagStorage) -> Option<&TriangleAttribute<Self>> {
        match storage {
            TagStorage::Int(a) => Some(a),
            _ => None,
        }
    }
    fn as_attribute_mut(storage: &mut TagStorage) -> Option<&mut TriangleAttribute<Self>> {
        match storage {
            TagStorage::Int(a) => Some(a),
            _ => None,
        }
    }
}

/// Marker type naming a tag and its value type.
pub trait TriangleTag {
    type Value: TagValue;
    const KEY: TagKey;
}

/// `true` for triangles of the original outer surface, `false` for faces
/// exposed by cutting.
#[derive(Debug, Clone, Copy)]
pub struct IsShell;

impl TriangleTag for IsShell {
    type Value = bool;
    const KEY: TagKey = TagKey::IsShell;
}

/// Piece label used while cutting and splitting.
#[derive(Debug, Clone, Copy)]
pub struct SubObjectId;

impl TriangleTag for SubObjectId {
    type Value = i32;
    const KEY: TagKey = TagKey::SubObject;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRegistry {
    tags: HashMap<TagKey, TagStorage>,
}

impl TagRegistry {
    /// Attach `T` with `initial` on every existing slot. Returns `false`, and
    /// leaves the stored values alone, if `T` is already attached.
    pub fn attach<T: TriangleTag>(&mut self, triangle_slots: usize, initial: T::Value) -> bool {
        if self.tags.contains_key(&T::KEY) {
            return false;
        }
        let attribute = TriangleAttribute::new(triangle_slots, initial, T::Value::default());
        self.tags.insert(T::KEY, T::Value::wrap(attribute));
        true
    }

    pub fn detach<T: TriangleTag>(&mut self) -> bool {
        self.tags.remove(&T::KEY).is_some()
    }

    pub fn has<T: TriangleTag>(&self) -> bool {
        self.tags.contains_key(&T::KEY)
    }

    pub fn get<T: TriangleTag>(&self) -> Option<&TriangleAttribute<T::Value>> {
        self.tags.get(&T::KEY).and_then(T::Value::as_attribute)
    }

    pub fn get_mut<T: TriangleTag>(&mut self) -> Option<&mut TriangleAttribute<T::Value>> {
        self.tags.get_mut(&T::KEY).and_then(T::Value::as_attribute_mut)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.tags.keys().copied()
    }

    pub(crate) fn storage(&self, key: TagKey) -> Option<&TagStorage> {
        self.tags.get(&key)
    }

    pub(crate) fn storage_mut(&mut self, key: TagKey) -> Option<&mut TagStorage> {
        self.tags.get_mut(&key)
    }

    /// Attach an empty tag of the same key and type as `storage`.
    pub(crate) fn attach_like(&mut self, key: TagKey, storage: &TagStorage, triangle_slots: usize) {
        self.tags.entry(key).or_insert_with(|| match storage {
            TagStorage::Bool(_) => TagStorage::Bool(TriangleAttribute::new(triangle_slots, false, false)),
            TagStorage::Int(_) => TagStorage::Int(TriangleAttribute::new(triangle_slots, 0, 0)),
        });
    }

    pub(crate) fn push_slot(&mut self) {
        self.tags.values_mut().for_each(TagStorage::push_slot);
    }

    pub(crate) fn ensure_slots(&mut self, count: usize) {
        self.tags.values_mut().for_each(|s| s.ensure_slots(count));
    }

    pub(crate) fn remapped(&self, old_ids: &[TriangleId]) -> Self {
        Self {
            tags: self
                .tags
                .iter()
                .map(|(k, s)| (*k, s.remapped(old_ids)))
                .collect(),
        }
    }
}

/// Copy the value of every tag of `source` at `from` into `dest` at `to`.
pub(crate) fn copy_tag_values(source: &TagRegistry, from: TriangleId, dest: &mut TagRegistry, to: TriangleId) {
    for key in source.keys().collect::<Vec<_>>() {
        let (Some(src), Some(dst)) = (source.storage(key), dest.storage_mut(key)) else {
            continue;
        };
        match (src, dst) {
            (TagStorage::Bool(s), TagStorage::Bool(d)) => d.set(to, s.get(from)),
            (TagStorage::Int(s), TagStorage::Int(d)) => d.set(to, s.get(from)),
            _ => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_is_typed_and_keeps_existing_values() {
        let mut registry = TagRegistry::default();
        assert!(registry.attach::<IsShell>(3, true));
        registry.get_mut::<IsShell>().unwrap().set(TriangleId(1), false);

        assert!(!registry.attach::<IsShell>(3, true));
        assert!(!registry.get::<IsShell>().unwrap().get(TriangleId(1)));
        assert!(registry.get::<IsShell>().unwrap().get(TriangleId(0)));

        registry.push_slot();
        assert!(!registry.get::<IsShell>().unwrap().get(TriangleId(3)));
        assert!(registry.get::<SubObjectId>().is_none());
    }

    #[test]
    fn detach_leaves_registry_clean() {
        let mut registry = TagRegistry::default();
        registry.attach::<SubObjectId>(2, 4);
        assert_eq!(registry.get::<SubObjectId>().unwrap().get(TriangleId(1)), 4);
        assert!(registry.detach::<SubObjectId>());
        assert!(registry.is_empty());
        assert!(!registry.detach::<SubObjectId>());
    }
}

//! Forward ID maps used while copying triangles from one mesh into another.

use crate::mesh::{ElementId, GroupId, TriangleId, VertexId};
use hashbrown::HashMap;
use std::hash::Hash;

/// Map from source IDs to destination IDs for one ID space.
#[derive(Debug, Clone)]
pub struct IdMap<K, V> {
    map: HashMap<K, V>,
}

impl<K, V> Default for IdMap<K, V> {
    fn default() -> Self {
        Self { map: HashMap::new() }
    }
}

impl<K: Copy + Eq + Hash, V: Copy> IdMap<K, V> {
    pub fn get(&self, source: K) -> Option<V> {
        self.map.get(&source).copied()
    }

    pub fn insert(&mut self, source: K, dest: V) {
        self.map.insert(source, dest);
    }

    /// Destination for `source`, creating it with `create` the first time.
    pub fn get_or_insert_with(&mut self, source: K, create: impl FnOnce() -> V) -> V {
        *self.map.entry(source).or_insert_with(create)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// ID maps for one source/destination mesh pair.
///
/// Re-copying a source vertex or overlay element returns the destination ID
/// created the first time, so shared elements are duplicated only once per
/// destination mesh.
#[derive(Debug, Clone, Default)]
pub struct IndexMappings {
    pub vertices: IdMap<VertexId, VertexId>,
    pub triangles: IdMap<TriangleId, TriangleId>,
    pub groups: IdMap<GroupId, GroupId>,
    pub normals: IdMap<ElementId, ElementId>,
    pub uv_layers: Vec<IdMap<ElementId, ElementId>>,
    pub colors: IdMap<ElementId, ElementId>,
}

impl IndexMappings {
    pub fn new(num_uv_layers: usize) -> Self {
        Self {
            uv_layers: (0..num_uv_layers).map(|_| IdMap::default()).collect(),
            ..Default::default()
        }
    }

    pub fn uv_layer_mut(&mut self, layer: usize) -> &mut IdMap<ElementId, ElementId> {
        if self.uv_layers.len() <= layer {
            self.uv_layers.resize_with(layer + 1, IdMap::default);
        }
        &mut self.uv_layers[layer]
    }

    /// Forget every mapping.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
        self.groups.clear();
        self.normals.clear();
        self.uv_layers.iter_mut().for_each(IdMap::clear);
        self.colors.clear();
    }
}

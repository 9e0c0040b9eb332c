//! The attribute set attached to a mesh: overlays plus per-triangle values.

use crate::mesh::overlay::{ColorOverlay, NormalOverlay, Overlay, UvOverlay};
use crate::mesh::tags::{TagRegistry, TriangleAttribute, TriangleTag};
use crate::mesh::TriangleId;

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    normals: NormalOverlay,
    uv_layers: Vec<UvOverlay>,
    colors: Option<ColorOverlay>,
    material_ids: Option<TriangleAttribute<i32>>,
    polygroup_layers: Vec<TriangleAttribute<i32>>,
    tags: TagRegistry,
    triangle_slots: usize,
}

impl AttributeSet {
    /// Normals plus one UV layer, sized for `triangle_slots` triangle IDs.
    pub fn new(triangle_slots: usize) -> Self {
        Self {
            normals: NormalOverlay::with_triangle_slots(triangle_slots),
            uv_layers: vec![UvOverlay::with_triangle_slots(triangle_slots)],
            colors: None,
            material_ids: None,
            polygroup_layers: Vec::new(),
            tags: TagRegistry::default(),
            triangle_slots,
        }
    }

    pub fn normals(&self) -> &NormalOverlay {
        &self.normals
    }

    pub fn normals_mut(&mut self) -> &mut NormalOverlay {
        &mut self.normals
    }

    pub fn num_uv_layers(&self) -> usize {
        self.uv_layers.len()
    }

    /// Grow or shrink to `count` UV layers (at least one is always kept).
    pub fn set_num_uv_layers(&mut self, count: usize) {
        let count = count.max(1);
        let slots = self.triangle_slots;
        self.uv_layers
            .resize_with(count, || UvOverlay::with_triangle_slots(slots));
    }

    pub fn uv_layer(&self, layer: usize) -> Option<&UvOverlay> {
        self.uv_layers.get(layer)
    }

    pub fn uv_layer_mut(&mut self, layer: usize) -> Option<&mut UvOverlay> {
        self.uv_layers.get_mut(layer)
    }

    pub fn primary_uv(&self) -> &UvOverlay {
        &self.uv_layers[0]
    }

    pub fn primary_uv_mut(&mut self) -> &mut UvOverlay {
        &mut self.uv_layers[0]
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Idempotent.
    pub fn enable_colors(&mut self) {
        if self.colors.is_none() {
            self.colors = Some(ColorOverlay::with_triangle_slots(self.triangle_slots));
        }
    }

    pub fn disable_colors(&mut self) {
        self.colors = None;
    }

    pub fn colors(&self) -> Option<&ColorOverlay> {
        self.colors.as_ref()
    }

    pub fn colors_mut(&mut self) -> Option<&mut ColorOverlay> {
        self.colors.as_mut()
    }

    /// Idempotent.
    pub fn enable_material_ids(&mut self) {
        if self.material_ids.is_none() {
            self.material_ids = Some(TriangleAttribute::new(self.triangle_slots, 0, 0));
        }
    }

    pub fn material_ids(&self) -> Option<&TriangleAttribute<i32>> {
        self.material_ids.as_ref()
    }

    pub fn material_ids_mut(&mut self) -> Option<&mut TriangleAttribute<i32>> {
        self.material_ids.as_mut()
    }

    /// Add a polygroup layer initialised to zero and return its index.
    pub fn add_polygroup_layer(&mut self) -> usize {
        self.polygroup_layers
            .push(TriangleAttribute::new(self.triangle_slots, 0, 0));
        self.polygroup_layers.len() - 1
    }

    pub fn num_polygroup_layers(&self) -> usize {
        self.polygroup_layers.len()
    }

    pub fn polygroup_layer(&self, layer: usize) -> Option<&TriangleAttribute<i32>> {
        self.polygroup_layers.get(layer)
    }

    pub fn polygroup_layer_mut(&mut self, layer: usize) -> Option<&mut TriangleAttribute<i32>> {
        self.polygroup_layers.get_mut(layer)
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagRegistry {
        &mut self.tags
    }

    /// Attach tag `T`, initialising every existing triangle to `initial`.
    pub fn attach_tag<T: TriangleTag>(&mut self, initial: T::Value) -> bool {
        self.tags.attach::<T>(self.triangle_slots, initial)
    }

    pub fn detach_tag<T: TriangleTag>(&mut self) -> bool {
        self.tags.detach::<T>()
    }

    pub fn has_tag<T: TriangleTag>(&self) -> bool {
        self.tags.has::<T>()
    }

    pub fn tag<T: TriangleTag>(&self) -> Option<&TriangleAttribute<T::Value>> {
        self.tags.get::<T>()
    }

    pub fn tag_mut<T: TriangleTag>(&mut self) -> Option<&mut TriangleAttribute<T::Value>> {
        self.tags.get_mut::<T>()
    }

    /// No temporary tags are attached, so the mesh can be handed out.
    pub fn is_clean(&self) -> bool {
        self.tags.is_empty()
    }

    /// Make sure this set has at least the facets `other` has.
    pub fn enable_matching(&mut self, other: &AttributeSet) {
        self.set_num_uv_layers(self.num_uv_layers().max(other.num_uv_layers()));
        if other.has_colors() {
            self.enable_colors();
        }
        if other.material_ids.is_some() {
            self.enable_material_ids();
        }
        while self.polygroup_layers.len() < other.polygroup_layers.len() {
            self.add_polygroup_layer();
        }
        for key in other.tags.keys() {
            if let Some(storage) = other.tags.storage(key) {
                self.tags.attach_like(key, storage, self.triangle_slots);
            }
        }
    }

    pub(crate) fn on_triangle_appended(&mut self, triangle: TriangleId) {
        let count = triangle.0 + 1;
        while self.triangle_slots < count {
            self.normals.push_triangle_slot();
            self.uv_layers.iter_mut().for_each(|l| l.push_triangle_slot());
            if let Some(colors) = self.colors.as_mut() {
                colors.push_triangle_slot();
            }
            if let Some(materials) = self.material_ids.as_mut() {
                materials.push_slot();
            }
            self.polygroup_layers.iter_mut().for_each(|l| l.push_slot());
            self.tags.push_slot();
            self.triangle_slots += 1;
        }
    }

    pub(crate) fn on_triangle_removed(&mut self, triangle: TriangleId) {
        self.normals.unset_triangle(triangle);
        self.uv_layers.iter_mut().for_each(|l| l.unset_triangle(triangle));
        if let Some(colors) = self.colors.as_mut() {
            colors.unset_triangle(triangle);
        }
    }

    pub(crate) fn on_triangle_reversed(&mut self, triangle: TriangleId) {
        self.normals.swap_corners(triangle);
        self.uv_layers.iter_mut().for_each(|l| l.swap_corners(triangle));
        if let Some(colors) = self.colors.as_mut() {
            colors.swap_corners(triangle);
        }
    }

    pub(crate) fn ensure_triangle_slots(&mut self, count: usize) {
        if count <= self.triangle_slots {
            return;
        }
        self.normals.ensure_triangle_slots(count);
        self.uv_layers.iter_mut().for_each(|l| l.ensure_triangle_slots(count));
        if let Some(colors) = self.colors.as_mut() {
            colors.ensure_triangle_slots(count);
        }
        if let Some(materials) = self.material_ids.as_mut() {
            materials.ensure_slots(count);
        }
        self.polygroup_layers.iter_mut().for_each(|l| l.ensure_slots(count));
        self.tags.ensure_slots(count);
        self.triangle_slots = count;
    }

    /// Rebuild the set for a compacted mesh whose triangle `i` was `old_ids[i]`.
    /// Only elements still referenced are kept, in their original order.
    pub(crate) fn compacted(&self, old_ids: &[TriangleId], keep_colors: bool) -> Self {
        let normals = compact_overlay(&self.normals, old_ids);
        let uv_layers = self
            .uv_layers
            .iter()
            .map(|l| compact_overlay(l, old_ids))
            .collect();
        let colors = match (&self.colors, keep_colors) {
            (Some(c), true) => Some(compact_overlay(c, old_ids)),
            _ => None,
        };
        Self {
            normals,
            uv_layers,
            colors,
            material_ids: self.material_ids.as_ref().map(|m| m.remapped(old_ids)),
            polygroup_layers: self
                .polygroup_layers
                .iter()
                .map(|l| l.remapped(old_ids))
                .collect(),
            tags: self.tags.remapped(old_ids),
            triangle_slots: old_ids.len(),
        }
    }
}

fn compact_overlay<T: Copy>(overlay: &Overlay<T>, old_ids: &[TriangleId]) -> Overlay<T> {
    let mut used = vec![false; overlay.element_count()];
    for tid in old_ids {
        if let Some(elements) = overlay.tri_elements(*tid) {
            elements.iter().for_each(|e| used[e.0] = true);
        }
    }

    let mut out = Overlay::with_triangle_slots(old_ids.len());
    let mut remap = vec![None; overlay.element_count()];
    for (id, value) in overlay.elements() {
        if used[id.0] {
            remap[id.0] = Some(out.append_element(value));
        }
    }

    for (new_tid, old_tid) in old_ids.iter().enumerate() {
        let Some([a, b, c]) = overlay.tri_elements(*old_tid) else {
            continue;
        };
        if let (Some(a), Some(b), Some(c)) = (remap[a.0], remap[b.0], remap[c.0]) {
            let set = out.set_triangle(TriangleId(new_tid), [a, b, c]);
            debug_assert!(set.is_ok(), "remapped elements exist in the compacted overlay");
        }
    }
    out
}

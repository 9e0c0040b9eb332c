//! Per-corner attribute overlays.
//!
//! An overlay owns its own element ID space. Each triangle either has all
//! three corner elements set or none of them, so a vertex can carry several
//! normals or UVs across a hard edge or seam.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::mesh::{ElementId, TriangleId};
use nalgebra::{Vector2, Vector3, Vector4};

/// Normal overlay (unit 3-vectors).
pub type NormalOverlay = Overlay<Vector3<Real>>;
/// UV overlay (2-vectors).
pub type UvOverlay = Overlay<Vector2<Real>>;
/// Color overlay (linear RGBA).
pub type ColorOverlay = Overlay<Vector4<Real>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay<T> {
    elements: Vec<T>,
    triangles: Vec<Option<[ElementId; 3]>>,
}

impl<T> Default for Overlay<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            triangles: Vec::new(),
        }
    }
}

impl<T: Copy> Overlay<T> {
    /// Empty overlay with a triangle slot for every triangle ID below `triangle_slots`.
    pub fn with_triangle_slots(triangle_slots: usize) -> Self {
        Self {
            elements: Vec::new(),
            triangles: vec![None; triangle_slots],
        }
    }

    /// Append a new element and return its ID.
    pub fn append_element(&mut self, value: T) -> ElementId {
        self.elements.push(value);
        ElementId(self.elements.len() - 1)
    }

    pub fn element(&self, element: ElementId) -> Option<T> {
        self.elements.get(element.0).copied()
    }

    pub fn set_element(&mut self, element: ElementId, value: T) -> MeshResult<()> {
        let slot = self
            .elements
            .get_mut(element.0)
            .ok_or(MeshError::InvalidElement(element))?;
        *slot = value;
        Ok(())
    }

    #[inline]
    pub fn is_element(&self, element: ElementId) -> bool {
        element.0 < self.elements.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, T)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, value)| (ElementId(i), *value))
    }

    /// Assign the three corner elements of a triangle.
    ///
    /// Fails without touching the overlay if the triangle has no slot or any
    /// of the elements is unknown.
    pub fn set_triangle(&mut self, triangle: TriangleId, elements: [ElementId; 3]) -> MeshResult<()> {
        if triangle.0 >= self.triangles.len() {
            return Err(MeshError::InvalidTriangle(triangle));
        }
        if let Some(bad) = elements.iter().find(|e| !self.is_element(**e)) {
            return Err(MeshError::InvalidElement(*bad));
        }
        self.triangles[triangle.0] = Some(elements);
        Ok(())
    }

    pub fn unset_triangle(&mut self, triangle: TriangleId) {
        if let Some(slot) = self.triangles.get_mut(triangle.0) {
            *slot = None;
        }
    }

    pub fn tri_elements(&self, triangle: TriangleId) -> Option<[ElementId; 3]> {
        self.triangles.get(triangle.0).copied().flatten()
    }

    pub fn is_set_triangle(&self, triangle: TriangleId) -> bool {
        self.tri_elements(triangle).is_some()
    }

    /// Values at the three corners of a triangle.
    pub fn tri_values(&self, triangle: TriangleId) -> Option<[T; 3]> {
        let [a, b, c] = self.tri_elements(triangle)?;
        Some([self.elements[a.0], self.elements[b.0], self.elements[c.0]])
    }

    /// Drop every element and unset every triangle, keeping the slot count.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.triangles.iter_mut().for_each(|t| *t = None);
    }

    pub(crate) fn push_triangle_slot(&mut self) {
        self.triangles.push(None);
    }

    pub(crate) fn ensure_triangle_slots(&mut self, count: usize) {
        if self.triangles.len() < count {
            self.triangles.resize(count, None);
        }
    }

    pub(crate) fn swap_corners(&mut self, triangle: TriangleId) {
        if let Some(Some(elements)) = self.triangles.get_mut(triangle.0) {
            elements.swap(1, 2);
        }
    }

    pub(crate) fn map_elements(&mut self, mut f: impl FnMut(T) -> T) {
        self.elements.iter_mut().for_each(|e| *e = f(*e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_triangle_is_all_or_nothing() {
        let mut overlay = UvOverlay::with_triangle_slots(2);
        let a = overlay.append_element(Vector2::new(0.0, 0.0));
        let b = overlay.append_element(Vector2::new(1.0, 0.0));

        let err = overlay.set_triangle(TriangleId(0), [a, b, ElementId(7)]);
        assert_eq!(err, Err(MeshError::InvalidElement(ElementId(7))));
        assert!(!overlay.is_set_triangle(TriangleId(0)));

        let c = overlay.append_element(Vector2::new(0.0, 1.0));
        overlay.set_triangle(TriangleId(0), [a, b, c]).unwrap();
        assert_eq!(overlay.tri_elements(TriangleId(0)), Some([a, b, c]));
        assert_eq!(overlay.tri_values(TriangleId(0)).unwrap()[2], Vector2::new(0.0, 1.0));

        assert_eq!(
            overlay.set_triangle(TriangleId(5), [a, b, c]),
            Err(MeshError::InvalidTriangle(TriangleId(5)))
        );
    }

    #[test]
    fn elements_can_be_shared_across_triangles() {
        let mut overlay = NormalOverlay::with_triangle_slots(2);
        let up = overlay.append_element(Vector3::z());
        overlay.set_triangle(TriangleId(0), [up, up, up]).unwrap();
        overlay.set_triangle(TriangleId(1), [up, up, up]).unwrap();
        overlay.set_element(up, -Vector3::z()).unwrap();
        assert_eq!(overlay.tri_values(TriangleId(1)).unwrap()[0], -Vector3::z());
        assert_eq!(overlay.element_count(), 1);
    }
}

//! Solid BSP tree over convex polygons.

use crate::float_types::Real;
use crate::ops::bsp::plane::{BACK, COPLANAR, FRONT, Plane};
use crate::ops::bsp::polygon::BspPolygon;

/// Trait for picking the splitting plane of a node.
pub trait SplittingPlaneStrategy {
    /// `polygons` is never empty.
    fn pick_splitting_plane(&self, polygons: &[BspPolygon]) -> Plane;
}

/// Scores a sample of candidate planes by how many polygons they would
/// split and how unbalanced the two halves would be.
#[derive(Debug, Clone, Copy)]
pub struct BalancedSplittingStrategy {
    pub span_weight: Real,
    pub balance_weight: Real,
    pub sample_size: usize,
}

impl Default for BalancedSplittingStrategy {
    fn default() -> Self {
        Self {
            span_weight: 8.0,
            balance_weight: 1.0,
            sample_size: 20,
        }
    }
}

impl SplittingPlaneStrategy for BalancedSplittingStrategy {
    fn pick_splitting_plane(&self, polygons: &[BspPolygon]) -> Plane {
        let mut best = polygons[0].plane;
        let mut best_score = Real::MAX;
        for candidate in polygons.iter().take(self.sample_size.max(1)) {
            let plane = &candidate.plane;
            let (mut front, mut back, mut spanning) = (0i64, 0i64, 0i64);
            for polygon in polygons {
                match plane.classify_polygon(polygon) {
                    COPLANAR => {},
                    FRONT => front += 1,
                    BACK => back += 1,
                    _ => spanning += 1,
                }
            }
            let score = self.span_weight * spanning as Real + self.balance_weight * (front - back).abs() as Real;
            if score < best_score {
                best_score = score;
                best = *plane;
            }
        }
        best
    }
}

/// A BSP tree node, containing polygons plus optional front/back subtrees
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Splitting plane, `None` until the node is built
    pub plane: Option<Plane>,
    pub front: Option<Box<Node>>,
    pub back: Option<Box<Node>>,
    /// Polygons lying on `plane`
    pub polygons: Vec<BspPolygon>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_polygons(polygons: &[BspPolygon]) -> Self {
        let mut node = Self::new();
        node.build(polygons);
        node
    }

    /// Add `polygons` to the tree, splitting them at the existing planes.
    pub fn build(&mut self, polygons: &[BspPolygon]) {
        self.build_with(polygons, &BalancedSplittingStrategy::default());
    }

    pub fn build_with(&mut self, polygons: &[BspPolygon], strategy: &impl SplittingPlaneStrategy) {
        if polygons.is_empty() {
            return;
        }
        let plane = *self
            .plane
            .get_or_insert_with(|| strategy.pick_splitting_plane(polygons));

        let mut front = Vec::with_capacity(polygons.len() / 2);
        let mut back = Vec::with_capacity(polygons.len() / 2);
        for polygon in polygons {
            let [coplanar_front, coplanar_back, f, b] = plane.split_polygon(polygon);
            self.polygons.extend(coplanar_front);
            self.polygons.extend(coplanar_back);
            front.extend(f);
            back.extend(b);
        }

        if !front.is_empty() {
            self.front
                .get_or_insert_with(Default::default)
                .build_with(&front, strategy);
        }
        if !back.is_empty() {
            self.back
                .get_or_insert_with(Default::default)
                .build_with(&back, strategy);
        }
    }

    /// Swap solid and empty space.
    pub fn invert(&mut self) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.polygons.iter_mut().for_each(BspPolygon::flip);
            if let Some(plane) = node.plane.as_mut() {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);
            if let Some(front) = node.front.as_deref_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_deref_mut() {
                stack.push(back);
            }
        }
    }

    /// Remove the parts of `polygons` inside this tree's solid.
    pub fn clip_polygons(&self, polygons: &[BspPolygon]) -> Vec<BspPolygon> {
        let Some(plane) = self.plane else {
            return polygons.to_vec();
        };
        let mut front = Vec::with_capacity(polygons.len());
        let mut back = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            let [coplanar_front, coplanar_back, f, b] = plane.split_polygon(polygon);
            front.extend(coplanar_front);
            front.extend(f);
            back.extend(coplanar_back);
            back.extend(b);
        }

        let mut result = match self.front.as_deref() {
            Some(node) => node.clip_polygons(&front),
            None => front,
        };
        // without a back subtree everything behind the plane is solid
        if let Some(node) = self.back.as_deref() {
            result.extend(node.clip_polygons(&back));
        }
        result
    }

    /// Remove the parts of this tree's polygons inside `other`.
    pub fn clip_to(&mut self, other: &Node) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.polygons = other.clip_polygons(&node.polygons);
            if let Some(front) = node.front.as_deref_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_deref_mut() {
                stack.push(back);
            }
        }
    }

    pub fn all_polygons(&self) -> Vec<BspPolygon> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            result.extend_from_slice(&node.polygons);
            stack.extend(node.front.as_deref());
            stack.extend(node.back.as_deref());
        }
        result
    }
}

//! Boundary loop extraction.

use crate::mesh::{DynamicMesh, VertexId};
use hashbrown::HashMap;
use tracing::debug;

/// Chain of boundary vertices.
///
/// Consecutive vertices follow the direction of the boundary edge in its
/// triangle, so a patch closing a loop must be wound the other way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    pub vertices: Vec<VertexId>,
    /// `false` for an open span whose ends did not meet
    pub closed: bool,
}

impl BoundaryLoop {
    pub fn edge_count(&self) -> usize {
        if self.closed { self.vertices.len() } else { self.vertices.len().saturating_sub(1) }
    }

    /// Closed with at least three distinct vertices.
    pub fn is_fillable(&self) -> bool {
        let mut distinct = self.vertices.clone();
        distinct.sort_unstable();
        distinct.dedup();
        self.closed && distinct.len() >= 3
    }
}

/// Every boundary loop and open span of `mesh`.
pub fn boundary_loops(mesh: &DynamicMesh) -> Vec<BoundaryLoop> {
    boundary_loops_where(mesh, |_, _| true)
}

/// Boundary loops built only from the boundary edges `keep` accepts.
pub fn boundary_loops_where(mesh: &DynamicMesh, keep: impl Fn(VertexId, VertexId) -> bool) -> Vec<BoundaryLoop> {
    let edges: Vec<(VertexId, VertexId)> = mesh
        .boundary_edges()
        .into_iter()
        .filter(|&(a, b)| keep(a, b))
        .collect();
    if edges.is_empty() {
        return Vec::new();
    }

    let mut outgoing: HashMap<VertexId, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<VertexId, usize> = HashMap::new();
    for (i, &(a, b)) in edges.iter().enumerate() {
        outgoing.entry(a).or_default().push(i);
        *incoming.entry(b).or_default() += 1;
    }

    let mut used = vec![false; edges.len()];
    let walk = |start_edge: usize, used: &mut [bool]| -> BoundaryLoop {
        let start = edges[start_edge].0;
        let mut vertices = vec![start];
        let mut edge = start_edge;
        loop {
            used[edge] = true;
            let next_vertex = edges[edge].1;
            if next_vertex == start {
                return BoundaryLoop { vertices, closed: true };
            }
            vertices.push(next_vertex);
            let next = outgoing
                .get(&next_vertex)
                .and_then(|out| out.iter().copied().find(|e| !used[*e]));
            match next {
                Some(e) => edge = e,
                None => return BoundaryLoop { vertices, closed: false },
            }
        }
    };

    let mut loops = Vec::new();
    // spans first, from vertices nothing leads into
    for i in 0..edges.len() {
        if !used[i] && !incoming.contains_key(&edges[i].0) {
            loops.push(walk(i, &mut used));
        }
    }
    for i in 0..edges.len() {
        if !used[i] {
            loops.push(walk(i, &mut used));
        }
    }
    debug!(
        edges = edges.len(),
        loops = loops.iter().filter(|l| l.closed).count(),
        spans = loops.iter().filter(|l| !l.closed).count(),
        "traced boundary"
    );
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn single_triangle_has_one_loop() {
        let (mesh, _) = DynamicMesh::from_triangles(
            &[Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            &[[0, 1, 2]],
        );
        let loops = boundary_loops(&mesh);
        assert_eq!(loops.len(), 1);
        assert!(loops[0].closed);
        assert_eq!(loops[0].edge_count(), 3);
        assert!(loops[0].is_fillable());
    }

    #[test]
    fn filtered_edges_form_a_span() {
        let (mesh, _) = DynamicMesh::from_triangles(
            &[Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            &[[0, 1, 2]],
        );
        let loops = boundary_loops_where(&mesh, |a, _| a != VertexId(2));
        assert_eq!(loops.len(), 1);
        assert!(!loops[0].closed);
        assert_eq!(loops[0].vertices, vec![VertexId(0), VertexId(1), VertexId(2)]);
    }

    #[test]
    fn repeated_or_open_loops_are_not_fillable() {
        let (a, b) = (VertexId(0), VertexId(1));
        let repeated = BoundaryLoop {
            vertices: vec![a, b, a, b],
            closed: true,
        };
        assert_eq!(repeated.edge_count(), 4);
        assert!(!repeated.is_fillable());

        let open = BoundaryLoop {
            vertices: vec![a, b, VertexId(2)],
            closed: false,
        };
        assert!(!open.is_fillable());
    }
}

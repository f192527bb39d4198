//! Geometry buffers produced by styles.

use std::mem;

/// A single vertex in tile-local coordinates.
///
/// Positions are normalized to the tile square: `(0, 0)` is the top-left
/// corner and `(1, 1)` the bottom-right.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Vertex {
    /// Tile-local position.
    pub position: [f32; 2],
    /// RGBA color.
    pub color: [u8; 4],
}

/// Indexed triangle mesh for one style.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, position: [f32; 2], color: [u8; 4]) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex { position, color });
        index
    }

    /// Appends a triangle referencing previously pushed vertices.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Appends an axis-aligned quad given its four corners in winding order.
    pub fn push_quad(&mut self, corners: [[f32; 2]; 4], color: [u8; 4]) {
        let base = self.push_vertex(corners[0], color);
        for corner in &corners[1..] {
            self.push_vertex(*corner, color);
        }
        self.push_triangle(base, base + 1, base + 2);
        self.push_triangle(base, base + 2, base + 3);
    }

    /// Vertex buffer.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index buffer.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Approximate resident size of the buffers in bytes.
    pub fn memory_usage(&self) -> usize {
        self.vertices.len() * mem::size_of::<Vertex>() + self.indices.len() * mem::size_of::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_quad() {
        let mut mesh = Mesh::new();
        mesh.push_quad([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], [255; 4]);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_memory_usage() {
        let mut mesh = Mesh::new();
        assert_eq!(mesh.memory_usage(), 0);
        assert!(mesh.is_empty());

        let a = mesh.push_vertex([0.0, 0.0], [0; 4]);
        let b = mesh.push_vertex([1.0, 0.0], [0; 4]);
        let c = mesh.push_vertex([0.0, 1.0], [0; 4]);
        mesh.push_triangle(a, b, c);

        assert_eq!(
            mesh.memory_usage(),
            3 * mem::size_of::<Vertex>() + 3 * mem::size_of::<u32>()
        );
    }
}

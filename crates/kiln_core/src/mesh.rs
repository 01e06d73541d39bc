//! Indexed triangle mesh geometry.
//!
//! A mesh owns shared vertex arrays (positions, normals, UVs); each `Face`
//! refers into them by index. The renderer builds one acceleration
//! structure per mesh when the scene is loaded.

use kiln_math::{Aabb, Vec2, Vec3};

use crate::material::MaterialId;

/// One triangle of a mesh, expressed as indices into the mesh arrays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face {
    /// Indices into `Mesh::positions`
    pub vertices: [u32; 3],
    /// Optional indices into `Mesh::normals` (smooth shading)
    pub normals: Option<[u32; 3]>,
    /// Optional indices into `Mesh::uvs`
    pub uvs: Option<[u32; 3]>,
    /// Material applied to this face
    pub material: MaterialId,
}

impl Face {
    /// A flat-shaded face without texture coordinates.
    pub fn new(vertices: [u32; 3], material: MaterialId) -> Self {
        Self {
            vertices,
            normals: None,
            uvs: None,
            material,
        }
    }

    pub fn with_normals(mut self, normals: [u32; 3]) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: [u32; 3]) -> Self {
        self.uvs = Some(uvs);
        self
    }
}

/// A mesh consisting of shared vertex arrays and indexed faces.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Mesh name (from the scene file)
    pub name: String,

    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Shading normals referenced by `Face::normals`
    pub normals: Vec<Vec3>,

    /// Texture coordinates referenced by `Face::uvs`
    pub uvs: Vec<Vec2>,

    /// Triangles
    pub faces: Vec<Face>,

    /// Axis-aligned bounding box of all positions
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and faces.
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, faces: Vec<Face>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            name: name.into(),
            positions,
            normals: Vec::new(),
            uvs: Vec::new(),
            faces,
            bounds,
        }
    }

    /// Build a flat-shaded mesh from a triangle index list (every 3 indices
    /// form a triangle), all faces sharing one material.
    pub fn from_indices(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: &[u32],
        material: MaterialId,
    ) -> Self {
        let faces = indices
            .chunks_exact(3)
            .map(|tri| Face::new([tri[0], tri[1], tri[2]], material))
            .collect();
        Self::new(name, positions, faces)
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = uvs;
        self
    }

    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        if positions.is_empty() {
            return Aabb::EMPTY;
        }

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for pos in positions {
            min = min.min(*pos);
            max = max.max(*pos);
        }

        Aabb::from_points(min, max)
    }

    /// Compute smooth vertex normals by averaging face normals, and point
    /// every face's normal indices at them.
    ///
    /// Face normals are weighted by triangle area (the unnormalized cross
    /// product), counter-clockwise winding. Vertices only touched by
    /// degenerate faces get +Y.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in &self.faces {
            let [i0, i1, i2] = face.vertices.map(|i| i as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let edge1 = self.positions[i1] - p0;
            let edge2 = self.positions[i2] - p0;
            let face_normal = edge1.cross(edge2);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        for face in &mut self.faces {
            face.normals = Some(face.vertices);
        }
        self.normals = normals;

        log::debug!(
            "Computed {} smooth normals for mesh '{}'",
            vertex_count,
            self.name
        );
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Positions of a face's three corners, or `None` if any index is out
    /// of range.
    pub fn face_positions(&self, face: &Face) -> Option<[Vec3; 3]> {
        let [a, b, c] = face.vertices;
        Some([
            *self.positions.get(a as usize)?,
            *self.positions.get(b as usize)?,
            *self.positions.get(c as usize)?,
        ])
    }

    /// Shading normals of a face's corners, if the face has valid normal indices.
    pub fn face_normals(&self, face: &Face) -> Option<[Vec3; 3]> {
        let [a, b, c] = face.normals?;
        Some([
            *self.normals.get(a as usize)?,
            *self.normals.get(b as usize)?,
            *self.normals.get(c as usize)?,
        ])
    }

    /// Texture coordinates of a face's corners, if the face has valid UV indices.
    pub fn face_uvs(&self, face: &Face) -> Option<[Vec2; 3]> {
        let [a, b, c] = face.uvs?;
        Some([
            *self.uvs.get(a as usize)?,
            *self.uvs.get(b as usize)?,
            *self.uvs.get(c as usize)?,
        ])
    }
}

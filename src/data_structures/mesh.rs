//! Vertex formats, CPU-side geometry and its GPU upload.

use wgpu::util::DeviceExt;

/// Layout of a vertex type inside a vertex buffer.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Position and normal; used by the instanced static props.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// A vertex bound to up to four joints of a skeleton.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl SkinnedVertex {
    /// A vertex that follows a single joint.
    pub fn rigid(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2], joint: u32) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            joints: [joint, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Vertex for SkinnedVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
            3 => Uint32x4,
            4 => Float32x4,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SkinnedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CpuMesh<V> {
    pub vertices: Vec<V>,
    pub indices: Vec<u32>,
}

/// A `width` x `height` plane in the XY plane facing +Z, split into segments.
pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> CpuMesh<MeshVertex> {
    let cols = width_segments.max(1);
    let rows = height_segments.max(1);
    let mut vertices = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
    for row in 0..=rows {
        let y = height / 2.0 - height * row as f32 / rows as f32;
        for col in 0..=cols {
            let x = -width / 2.0 + width * col as f32 / cols as f32;
            vertices.push(MeshVertex {
                position: [x, y, 0.0],
                normal: [0.0, 0.0, 1.0],
            });
        }
    }
    let mut indices = Vec::with_capacity((cols * rows * 6) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let a = row * (cols + 1) + col;
            let b = a + cols + 1;
            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }
    CpuMesh { vertices, indices }
}

/// An axis-aligned box centred on the origin with per-face normals.
pub fn cuboid(size: [f32; 3]) -> CpuMesh<MeshVertex> {
    let [hx, hy, hz] = size.map(|s| s / 2.0);
    // normal, then the face's u and v axes scaled to the half extents
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -hz], [0.0, hy, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, hz], [0.0, hy, 0.0]),
        ([0.0, 1.0, 0.0], [hx, 0.0, 0.0], [0.0, 0.0, -hz]),
        ([0.0, -1.0, 0.0], [hx, 0.0, 0.0], [0.0, 0.0, hz]),
        ([0.0, 0.0, 1.0], [hx, 0.0, 0.0], [0.0, hy, 0.0]),
        ([0.0, 0.0, -1.0], [-hx, 0.0, 0.0], [0.0, hy, 0.0]),
    ];
    let half = [hx, hy, hz];
    let mut mesh = CpuMesh {
        vertices: Vec::new(),
        indices: Vec::new(),
    };
    for (normal, u, v) in faces {
        let base = mesh.vertices.len() as u32;
        let centre = [0, 1, 2].map(|i| normal[i] * half[i]);
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            mesh.vertices.push(MeshVertex {
                position: [0, 1, 2].map(|i| centre[i] + u[i] * su + v[i] * sv),
                normal,
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Vertex and index buffers of one uploaded mesh.
#[derive(Debug)]
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl GpuMesh {
    pub fn upload<V: bytemuck::Pod>(device: &wgpu::Device, name: &str, mesh: &CpuMesh<V>) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Vertex Buffer")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Index Buffer")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: mesh.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// Every triangle must wind counter-clockwise around its vertex normal.
    fn assert_ccw(mesh: &CpuMesh<MeshVertex>) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.vertices[tri[i] as usize]);
            let n = cross(sub(b.position, a.position), sub(c.position, a.position));
            let facing: f32 = (0..3).map(|i| n[i] * a.normal[i]).sum();
            assert!(facing > 0.0, "triangle {tri:?} winds clockwise");
        }
    }

    #[test]
    fn plane_has_a_grid_of_segments() {
        let mesh = plane(60.0, 60.0, 9, 9);
        assert_eq!(mesh.vertices.len(), 100);
        assert_eq!(mesh.indices.len(), 9 * 9 * 6);
        assert_eq!(mesh.vertices[0].position, [-30.0, 30.0, 0.0]);
        assert_eq!(mesh.vertices[99].position, [30.0, -30.0, 0.0]);
        assert_ccw(&mesh);
    }

    #[test]
    fn cuboid_faces_point_outwards() {
        let mesh = cuboid([2.0, 4.0, 6.0]);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for v in &mesh.vertices {
            assert_eq!(v.position.map(f32::abs), [1.0, 2.0, 3.0]);
        }
        assert_ccw(&mesh);
    }
}

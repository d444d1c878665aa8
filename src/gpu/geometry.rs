//! Vertex layout, CPU-side mesh generation and GPU upload.
//!
//! Meshes are generated on the CPU as plain vertex/index vectors so the
//! generators stay testable without a device, then uploaded once into a
//! [`GpuGeometry`] that owns the vertex and index buffers.

use std::mem;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::gpu::context::RenderContext;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3D {
    const ATTRIBUTES: [VertexAttribute; 3] = [
        VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: VertexFormat::Float32x3,
        },
        VertexAttribute {
            offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: 1,
            format: VertexFormat::Float32x3,
        },
        VertexAttribute {
            offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
            shader_location: 2,
            format: VertexFormat::Float32x2,
        },
    ];

    pub fn desc<'a>() -> VertexBufferLayout<'a> {
        VertexBufferLayout {
            array_stride: mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// CPU-side mesh data plus the topology it must be drawn with.
pub struct Geometry {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    pub topology: wgpu::PrimitiveTopology,
}

impl Geometry {
    /// Unit quad in the xy-plane, centered on the origin, normal +Z.
    /// Used for the board object.
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex3D::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex3D::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex3D::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex3D::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 2, 1, 3];
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    /// Full-screen quad spanning (0,0)..(1,1), drawn under an ortho(0,1)
    /// projection by the composite and ray-generation passes.
    pub fn fullscreen_quad() -> Self {
        let vertices = vec![
            Vertex3D::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex3D::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex3D::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex3D::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 2, 1, 3];
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    /// The eight corners of a unit cube connected by twelve edges, drawn as a
    /// line list around the selected object.
    pub fn wire_box() -> Self {
        let corners = [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [-0.5, 0.5, 0.5],
            [0.5, 0.5, 0.5],
        ];
        let vertices = corners
            .iter()
            .map(|&p| Vertex3D::new(p, [0.0, 0.0, 0.0], [0.0, 0.0]))
            .collect();
        let indices = vec![
            0, 1, 0, 2, 1, 3, 2, 3, //
            0, 4, 1, 5, 2, 6, 3, 7, //
            4, 5, 4, 6, 5, 7, 6, 7,
        ];
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::LineList,
        }
    }

    /// Unit cube with per-face normals and uvs, corners at +-0.5.
    pub fn cube() -> Self {
        // (normal, four corners in ccw order seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            (
                [0.0, 0.0, 1.0],
                [
                    [-0.5, -0.5, 0.5],
                    [0.5, -0.5, 0.5],
                    [0.5, 0.5, 0.5],
                    [-0.5, 0.5, 0.5],
                ],
            ),
            (
                [0.0, 0.0, -1.0],
                [
                    [0.5, -0.5, -0.5],
                    [-0.5, -0.5, -0.5],
                    [-0.5, 0.5, -0.5],
                    [0.5, 0.5, -0.5],
                ],
            ),
            (
                [1.0, 0.0, 0.0],
                [
                    [0.5, -0.5, 0.5],
                    [0.5, -0.5, -0.5],
                    [0.5, 0.5, -0.5],
                    [0.5, 0.5, 0.5],
                ],
            ),
            (
                [-1.0, 0.0, 0.0],
                [
                    [-0.5, -0.5, -0.5],
                    [-0.5, -0.5, 0.5],
                    [-0.5, 0.5, 0.5],
                    [-0.5, 0.5, -0.5],
                ],
            ),
            (
                [0.0, 1.0, 0.0],
                [
                    [-0.5, 0.5, 0.5],
                    [0.5, 0.5, 0.5],
                    [0.5, 0.5, -0.5],
                    [-0.5, 0.5, -0.5],
                ],
            ),
            (
                [0.0, -1.0, 0.0],
                [
                    [-0.5, -0.5, -0.5],
                    [0.5, -0.5, -0.5],
                    [0.5, -0.5, 0.5],
                    [-0.5, -0.5, 0.5],
                ],
            ),
        ];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.iter().zip(uvs.iter()) {
                vertices.push(Vertex3D::new(*corner, normal, *uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    /// Latitude/longitude sphere around the origin.
    pub fn uv_sphere(res_theta: u32, res_phi: u32, radius: f32) -> Self {
        let mut vertices = Vec::with_capacity(((res_theta + 1) * (res_phi + 1)) as usize);
        for j in 0..=res_phi {
            let phi = std::f32::consts::PI * j as f32 / res_phi as f32;
            for i in 0..=res_theta {
                let theta = std::f32::consts::TAU * i as f32 / res_theta as f32;
                let normal = [
                    phi.sin() * theta.cos(),
                    phi.sin() * theta.sin(),
                    phi.cos(),
                ];
                let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
                let uv = [i as f32 / res_theta as f32, j as f32 / res_phi as f32];
                vertices.push(Vertex3D::new(position, normal, uv));
            }
        }

        let stride = res_theta + 1;
        let mut indices = Vec::with_capacity((res_theta * res_phi * 6) as usize);
        for j in 0..res_phi {
            for i in 0..res_theta {
                let a = j * stride + i;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    /// Torus in the xy-plane: `ring_radius` is the distance from the origin
    /// to the tube center, `tube_radius` the radius of the tube itself.
    pub fn torus(res_ring: u32, res_tube: u32, ring_radius: f32, tube_radius: f32) -> Self {
        let mut vertices = Vec::with_capacity(((res_ring + 1) * (res_tube + 1)) as usize);
        for i in 0..=res_ring {
            let theta = std::f32::consts::TAU * i as f32 / res_ring as f32;
            for j in 0..=res_tube {
                let phi = std::f32::consts::TAU * j as f32 / res_tube as f32;
                let ring = ring_radius + tube_radius * phi.cos();
                let position = [
                    ring * theta.cos(),
                    ring * theta.sin(),
                    tube_radius * phi.sin(),
                ];
                let normal = [phi.cos() * theta.cos(), phi.cos() * theta.sin(), phi.sin()];
                let uv = [i as f32 / res_ring as f32, j as f32 / res_tube as f32];
                vertices.push(Vertex3D::new(position, normal, uv));
            }
        }

        let stride = res_tube + 1;
        let mut indices = Vec::with_capacity((res_ring * res_tube * 6) as usize);
        for i in 0..res_ring {
            for j in 0..res_tube {
                let a = i * stride + j;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, c, c, b, d]);
            }
        }
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// GPU-resident vertex/index data for one shape.
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub topology: wgpu::PrimitiveTopology,
}

impl GpuGeometry {
    pub fn upload(ctx: &RenderContext, geometry: &Geometry, label: &str) -> Self {
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} vertices")),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} indices")),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
            topology: geometry.topology,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_bounds(geometry: &Geometry) {
        let count = geometry.vertices.len() as u32;
        assert!(geometry.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_quad() {
        let quad = Geometry::quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert!(quad.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert_indices_in_bounds(&quad);
    }

    #[test]
    fn test_wire_box() {
        let wire_box = Geometry::wire_box();
        assert_eq!(wire_box.vertices.len(), 8);
        assert_eq!(wire_box.indices.len(), 24);
        assert_eq!(wire_box.topology, wgpu::PrimitiveTopology::LineList);
        assert_indices_in_bounds(&wire_box);
    }

    #[test]
    fn test_cube() {
        let cube = Geometry::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_indices_in_bounds(&cube);
        // Every corner lies on the unit cube surface.
        assert!(cube
            .vertices
            .iter()
            .all(|v| v.position.iter().all(|c| c.abs() == 0.5)));
    }

    #[test]
    fn test_sphere_radius_and_normals() {
        let sphere = Geometry::uv_sphere(16, 8, 0.5);
        assert_eq!(sphere.vertices.len(), 17 * 9);
        assert_indices_in_bounds(&sphere);
        for v in &sphere.vertices {
            let r = (v.position[0].powi(2) + v.position[1].powi(2) + v.position[2].powi(2)).sqrt();
            assert!((r - 0.5).abs() < 1e-5);
            let n = (v.normal[0].powi(2) + v.normal[1].powi(2) + v.normal[2].powi(2)).sqrt();
            assert!((n - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_torus_extents() {
        let torus = Geometry::torus(32, 16, 0.34, 0.16);
        assert_indices_in_bounds(&torus);
        let mut max_xy: f32 = 0.0;
        let mut max_z: f32 = 0.0;
        for v in &torus.vertices {
            max_xy = max_xy.max((v.position[0].powi(2) + v.position[1].powi(2)).sqrt());
            max_z = max_z.max(v.position[2].abs());
        }
        assert!((max_xy - 0.5).abs() < 1e-5);
        assert!((max_z - 0.16).abs() < 1e-3);
    }
}

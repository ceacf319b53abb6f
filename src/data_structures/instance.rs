//! Translation/rotation/scale transforms.
//!
//! [`Instance`] is used twice: as the local transform of a skeleton node while
//! animating, and as the per-instance placement of static props that are
//! packed into a GPU buffer for instanced drawing.

use std::ops::Mul;

use cgmath::{Euler, Deg, One, SquareMatrix};

use crate::data_structures::mesh::Vertex;

/// Position, rotation (as quaternion) and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transform.
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Builds a placement from a position, XYZ euler angles in degrees and a uniform scale.
    pub fn placed(position: [f32; 3], rotation_deg: [f32; 3], scale: f32) -> Self {
        let [x, y, z] = rotation_deg;
        Self {
            position: position.into(),
            rotation: Euler::new(Deg(x), Deg(y), Deg(z)).into(),
            scale: cgmath::Vector3::new(scale, scale, scale),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        InstanceRaw {
            model: world_matrix.into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            handedness: world_matrix.determinant().signum(),
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    /// Composes `rhs` into the space of `self` (parent * child).
    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let scaled_rhs_pos = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Instance {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: cgmath::Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU layout of an [`Instance`]: model matrix, rotation-only normal matrix and
/// the sign of the model determinant (negative for mirrored placements).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub handedness: f32,
}

/*
 * Instances are stepped per instance, not per vertex. The mat4 occupies four
 * vertex slots and the mat3 three, starting after the mesh attributes.
 */
impl Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Quaternion, Rotation3, Vector3};

    use super::*;

    #[test]
    fn composing_applies_parent_scale_and_rotation_to_child_offset() {
        let parent = Instance {
            position: Vector3::new(1.0, 0.0, 0.0),
            rotation: Quaternion::from_angle_y(Deg(90.0)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let child = Instance::from(Vector3::new(1.0, 0.0, 0.0));
        let world = parent * child;
        // (1,0,0) scaled to (2,0,0), turned 90 degrees about Y to (0,0,-2)
        assert!((world.position - Vector3::new(1.0, 0.0, -2.0)).magnitude() < 1e-5);
        assert_eq!(world.scale, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn mirrored_placement_has_negative_handedness() {
        let mut mirrored = Instance::new();
        mirrored.scale.x = -1.0;
        assert_eq!(mirrored.to_raw().handedness, -1.0);
        assert_eq!(Instance::new().to_raw().handedness, 1.0);
    }

    #[test]
    fn placed_uses_degrees() {
        let placement = Instance::placed([0.0, 0.0, -450.0], [0.0, 180.0, 0.0], 1.0);
        let forward = placement.rotation * Vector3::new(0.0, 0.0, 1.0);
        assert!((forward - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-5);
        assert_eq!(placement.position.z, -450.0);
    }
}

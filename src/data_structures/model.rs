//! Loaded models: the CPU-side [`ModelData`] produced by the loaders and the
//! GPU-side [`SkinnedModel`] an actor draws with.

use cgmath::{Matrix4, SquareMatrix};
use serde::{Deserialize, Serialize};
use wgpu::util::DeviceExt;

use crate::{
    animation::{AnimationClip, MAX_JOINTS, Skeleton},
    context::InitContext,
    data_structures::{
        mesh::{CpuMesh, GpuMesh, SkinnedVertex},
        texture::Texture,
    },
    render::{Render, Skinned},
};

/// Encoded image bytes as found in the asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub image: Option<ImageData>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            image: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveData {
    pub mesh: CpuMesh<SkinnedVertex>,
    /// Index into [`ModelData::materials`].
    pub material: usize,
}

/// Everything a loader extracts from one asset file.
#[derive(Clone, Debug)]
pub struct ModelData {
    pub name: String,
    pub primitives: Vec<PrimitiveData>,
    pub materials: Vec<MaterialData>,
    pub skeleton: Skeleton,
    pub clips: Vec<AnimationClip>,
}

/// How a material is shaded. `Normal` colours surfaces by their view-space
/// normal, `Basic` ignores lights and `Lit` applies the directional light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shading {
    Basic,
    Normal,
    #[default]
    Lit,
}

impl Shading {
    fn code(self) -> f32 {
        match self {
            Shading::Basic => 0.0,
            Shading::Normal => 1.0,
            Shading::Lit => 2.0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    /// x: shading mode, yzw unused
    pub params: [f32; 4],
}

impl MaterialUniform {
    pub fn new(color: [f32; 4], shading: Shading) -> Self {
        Self {
            color,
            params: [shading.code(), 0.0, 0.0, 0.0],
        }
    }
}

/// Colour, shading mode and texture bound at group 2 of both pipelines.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub uniform: MaterialUniform,
    #[allow(unused)]
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        name: &str,
        uniform: MaterialUniform,
        texture: &Texture,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Material Buffer")),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
            label: Some(name),
        });
        Self {
            name: name.to_string(),
            uniform,
            buffer,
            bind_group,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
}

#[derive(Debug)]
pub struct SkinnedPrimitive {
    pub mesh: GpuMesh,
    pub material: usize,
}

/// GPU buffers of one actor: meshes, materials, the model matrix and the
/// joint palette (group 3 of the skinned pipeline).
#[derive(Debug)]
pub struct SkinnedModel {
    pub primitives: Vec<SkinnedPrimitive>,
    pub materials: Vec<Material>,
    object_buffer: wgpu::Buffer,
    joint_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
}

impl SkinnedModel {
    /// `shading` and `color` override every material of the asset when set.
    pub fn upload(
        ctx: &InitContext,
        data: &ModelData,
        shading: Option<Shading>,
        color: Option<[f32; 4]>,
    ) -> anyhow::Result<Self> {
        let device = &ctx.device;
        let queue = &ctx.queue;
        if data.primitives.is_empty() {
            anyhow::bail!("`{}` has nothing to draw", data.name);
        }

        let white = Texture::solid(device, queue, [255, 255, 255, 255], "white");
        let fallback = [MaterialData::default()];
        let sources = if data.materials.is_empty() {
            &fallback[..]
        } else {
            &data.materials[..]
        };
        let materials = sources
            .iter()
            .map(|source| {
                let texture = source.image.as_ref().and_then(|image| {
                    Texture::from_bytes(device, queue, &image.bytes, &source.name, image.mime.as_deref())
                        .inspect_err(|e| log::warn!("{e:#}; using a plain colour"))
                        .ok()
                });
                let uniform = MaterialUniform::new(
                    color.unwrap_or(source.base_color),
                    shading.unwrap_or_default(),
                );
                Material::new(
                    device,
                    &ctx.layouts.material,
                    &source.name,
                    uniform,
                    texture.as_ref().unwrap_or(&white),
                )
            })
            .collect::<Vec<_>>();

        let primitives = data
            .primitives
            .iter()
            .enumerate()
            .map(|(i, primitive)| SkinnedPrimitive {
                mesh: GpuMesh::upload(device, &format!("{}#{i}", data.name), &primitive.mesh),
                material: primitive.material.min(materials.len() - 1),
            })
            .collect();

        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Object Buffer", data.name)),
            contents: bytemuck::cast_slice(&[ObjectUniform {
                model: Matrix4::<f32>::identity().into(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        let joint_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Joint Buffer", data.name)),
            contents: bytemuck::cast_slice(&vec![identity; MAX_JOINTS]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &ctx.layouts.object,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: joint_buffer.as_entire_binding(),
                },
            ],
            label: Some(&format!("{} Object Bind Group", data.name)),
        });

        Ok(Self {
            primitives,
            materials,
            object_buffer,
            joint_buffer,
            object_bind_group,
        })
    }

    pub fn write(&self, queue: &wgpu::Queue, model: Matrix4<f32>, palette: &[Matrix4<f32>]) {
        queue.write_buffer(
            &self.object_buffer,
            0,
            bytemuck::cast_slice(&[ObjectUniform {
                model: model.into(),
            }]),
        );
        let joints: Vec<[[f32; 4]; 4]> = palette
            .iter()
            .take(MAX_JOINTS)
            .map(|m| (*m).into())
            .collect();
        if !joints.is_empty() {
            queue.write_buffer(&self.joint_buffer, 0, bytemuck::cast_slice(&joints));
        }
    }

    pub fn render(&self) -> Render<'_> {
        Render::Skins(
            self.primitives
                .iter()
                .filter_map(|primitive| {
                    let material = self.materials.get(primitive.material)?;
                    Some(Skinned {
                        mesh: &primitive.mesh,
                        material: &material.bind_group,
                        object: &self.object_bind_group,
                    })
                })
                .collect(),
        )
    }
}

//! Render pipelines and the bind group layouts they share.
//!
//! Group layout of both pipelines:
//! 0 camera, 1 light, 2 material, 3 object (skinned only).

pub mod basic;
pub mod light;
pub mod skinned;

/// Bind group layouts created once with the device. Loaders need them to build
/// material and object bind groups off the render loop.
#[derive(Clone, Debug)]
pub struct Layouts {
    pub camera: wgpu::BindGroupLayout,
    pub light: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            camera: crate::camera::mk_bind_group_layout(device),
            light: light::mk_bind_group_layout(device),
            material: basic::mk_material_layout(device),
            object: skinned::mk_object_layout(device),
        }
    }
}

#[derive(Debug)]
pub struct Pipelines {
    /// Instanced static props.
    pub basic: wgpu::RenderPipeline,
    pub skinned: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, layouts: &Layouts) -> Self {
        Self {
            basic: basic::mk_basic_pipeline(device, config, layouts),
            skinned: skinned::mk_skinned_pipeline(device, config, layouts),
        }
    }
}

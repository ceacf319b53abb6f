use crate::{
    data_structures::{
        mesh::{SkinnedVertex, Vertex},
        texture::Texture,
    },
    pipelines::{Layouts, basic::mk_render_pipeline},
};

/// Object group: model matrix (binding 0) and the joint palette (binding 1).
/// The palette is a fixed-size uniform array so the pipeline also runs on WebGL2.
pub fn mk_object_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform(0), uniform(1)],
        label: Some("object_bind_group_layout"),
    })
}

pub fn mk_skinned_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    layouts: &Layouts,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Skinned Pipeline Layout"),
        bind_group_layouts: &[
            &layouts.camera,
            &layouts.light,
            &layouts.material,
            &layouts.object,
        ],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Skinned Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("skinned.wgsl").into()),
    };

    // assets mirrored by a negative scale flip their winding, so no culling here either
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(wgpu::BlendState::REPLACE),
        Some(Texture::DEPTH_FORMAT),
        &[SkinnedVertex::desc()],
        None,
        shader,
    )
}

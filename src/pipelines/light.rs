use wgpu::util::DeviceExt;

use crate::config::LightSettings;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    // uniforms need 16 byte spacing
    _padding: u32,
}

impl LightUniform {
    pub fn new(position: [f32; 3], color: [f32; 3], intensity: f32) -> Self {
        Self {
            position,
            intensity,
            color,
            _padding: 0,
        }
    }
}

impl From<&LightSettings> for LightUniform {
    fn from(settings: &LightSettings) -> Self {
        Self::new(settings.position, settings.color, settings.intensity)
    }
}

/// A single point light shining at the scene (group 1 of every pipeline).
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, uniform: LightUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, uniform: LightUniform) {
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_two_vec4s() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 32);
    }

    #[test]
    fn settings_map_onto_the_uniform() {
        let settings = LightSettings::default();
        let uniform = LightUniform::from(&settings);
        assert_eq!(uniform.position, settings.position);
        assert_eq!(uniform.intensity, settings.intensity);
    }
}

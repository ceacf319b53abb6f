//! The stage: ground plane, decorative colliders, light and camera.
//!
//! Everything here is uploaded once in [`Stage::new`] and never changes.

use std::f32::consts::FRAC_PI_2;

use cgmath::{One, Quaternion, Rad, Rotation3, Vector3};
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::event::{DeviceEvent, WindowEvent};

use crate::{
    config::{ColliderSettings, GroundSettings, StageSettings},
    context::{Context, InitContext},
    data_structures::{
        instance::Instance,
        mesh::{self, GpuMesh},
        model::{Material, MaterialUniform, Shading},
        texture::Texture,
    },
    flow::{GraphicsFlow, Out},
    pipelines::light::LightUniform,
    render::{Instanced, Render},
};

/// Instances sharing one material.
struct Batch {
    material: Material,
    instances: wgpu::Buffer,
    amount: usize,
}

impl Batch {
    fn new(ctx: &InitContext, name: &str, uniform: MaterialUniform, instances: &[Instance], white: &Texture) -> Self {
        let raw: Vec<_> = instances.iter().map(Instance::to_raw).collect();
        let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Instance Buffer")),
            contents: bytemuck::cast_slice(&raw),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            material: Material::new(&ctx.device, &ctx.layouts.material, name, uniform, white),
            instances: buffer,
            amount: raw.len(),
        }
    }

    fn instanced<'a>(&'a self, mesh: &'a GpuMesh) -> Instanced<'a> {
        Instanced {
            instance: &self.instances,
            mesh,
            material: &self.material.bind_group,
            amount: self.amount,
        }
    }
}

pub struct Stage {
    settings: StageSettings,
    ground_mesh: GpuMesh,
    ground: Batch,
    cube_mesh: GpuMesh,
    colliders: Vec<Batch>,
}

impl Stage {
    pub fn new(ctx: &InitContext, settings: StageSettings) -> Self {
        let white = Texture::solid(&ctx.device, &ctx.queue, [255, 255, 255, 255], "stage white");

        let ground = &settings.ground;
        let ground_mesh = GpuMesh::upload(
            &ctx.device,
            "ground",
            &mesh::plane(ground.size, ground.size, ground.segments, ground.segments),
        );
        let [r, g, b] = ground.color;
        let ground = Batch::new(
            ctx,
            "ground",
            MaterialUniform::new([r, g, b, 1.0], Shading::Basic),
            &[ground_instance(ground)],
            &white,
        );

        let cube_mesh = GpuMesh::upload(&ctx.device, "collider", &mesh::cuboid([1.0, 1.0, 1.0]));
        let colliders = collider_batches(&settings.colliders)
            .into_iter()
            .enumerate()
            .map(|(i, ([r, g, b], instances))| {
                Batch::new(
                    ctx,
                    &format!("colliders{i}"),
                    MaterialUniform::new([r, g, b, 1.0], Shading::Lit),
                    &instances,
                    &white,
                )
            })
            .collect::<Vec<_>>();
        log::info!(
            "Stage ready: {} colliders in {} batches",
            settings.colliders.len(),
            colliders.len()
        );

        Self {
            settings,
            ground_mesh,
            ground,
            cube_mesh,
            colliders,
        }
    }
}

/// The plane is built facing +Z; lay it flat so it faces +Y.
pub fn ground_instance(ground: &GroundSettings) -> Instance {
    Instance {
        position: Vector3::new(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_x(Rad(-FRAC_PI_2)),
        scale: Vector3::new(ground.scale, ground.scale, ground.scale),
    }
}

/// Unit cubes scaled to each collider's size, grouped by colour.
pub fn collider_batches(colliders: &[ColliderSettings]) -> Vec<([f32; 3], Vec<Instance>)> {
    let mut batches: Vec<([f32; 3], Vec<Instance>)> = Vec::new();
    for collider in colliders {
        let instance = Instance {
            position: collider.position.into(),
            rotation: Quaternion::one(),
            scale: collider.size.into(),
        };
        match batches.iter_mut().find(|(color, _)| *color == collider.color) {
            Some((_, instances)) => instances.push(instance),
            None => batches.push((collider.color, vec![instance])),
        }
    }
    batches
}

impl<S, E> GraphicsFlow<S, E> for Stage {
    fn on_init(&mut self, ctx: &mut Context, _state: &mut S) -> Out<S, E> {
        let [r, g, b] = self.settings.background.map(f64::from);
        ctx.clear_colour = wgpu::Color { r, g, b, a: 1.0 };

        let camera = &self.settings.camera;
        ctx.camera.camera.position = camera.position.into();
        ctx.camera.camera.target = camera.target.into();
        ctx.camera.controller.rotate_speed = camera.rotate_speed;
        ctx.camera.controller.zoom_speed = camera.zoom_speed;
        ctx.camera.controller.max_distance = camera.far * 0.95;
        ctx.projection
            .set_lens(cgmath::Deg(camera.fov_deg), camera.near, camera.far);

        ctx.light
            .write(&ctx.queue, LightUniform::from(&self.settings.light));
        Out::Empty
    }

    fn on_click(&mut self, _ctx: &Context, _state: &mut S) -> Out<S, E> {
        Out::Empty
    }

    fn on_update(&mut self, _ctx: &Context, _state: &mut S, _dt: Duration) -> Out<S, E> {
        Out::Empty
    }

    fn on_tick(&mut self, _ctx: &Context, _state: &mut S) -> Out<S, E> {
        Out::Empty
    }

    fn on_device_events(&mut self, _ctx: &Context, _state: &mut S, _event: &DeviceEvent) -> Out<S, E> {
        Out::Empty
    }

    fn on_window_events(&mut self, _ctx: &Context, _state: &mut S, _event: &WindowEvent) -> Out<S, E> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _ctx: &Context, _state: &mut S, event: E) -> Option<E> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        let mut items = vec![self.ground.instanced(&self.ground_mesh)];
        items.extend(self.colliders.iter().map(|batch| batch.instanced(&self.cube_mesh)));
        Render::Defaults(items)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Rotation};

    use super::*;

    #[test]
    fn ground_faces_up() {
        let ground = ground_instance(&GroundSettings::default());
        let normal = ground.rotation.rotate_vector(Vector3::unit_z());
        assert!((normal - Vector3::unit_y()).magnitude() < 1e-6);
        assert_eq!(ground.scale, Vector3::new(30.0, 30.0, 30.0));
    }

    #[test]
    fn colliders_are_batched_by_colour() {
        let red = [1.0, 0.0, 0.0];
        let mut colliders = StageSettings::default().colliders;
        colliders[1].color = red;
        colliders.push(ColliderSettings {
            color: red,
            ..ColliderSettings::new([0.0, 10.0, 0.0], [20.0, 20.0, 20.0])
        });

        let batches = collider_batches(&colliders);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].1.len(), 3);
        assert_eq!(batches[1].0, red);
        assert_eq!(batches[1].1.len(), 2);
        assert_eq!(batches[1].1[1].scale, Vector3::new(20.0, 20.0, 20.0));
    }

    #[test]
    fn no_colliders_no_batches() {
        assert!(collider_batches(&[]).is_empty());
    }
}

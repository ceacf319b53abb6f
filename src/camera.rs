//! Perspective camera with orbit controls.
//!
//! The camera looks at a target point. [`CameraController`] orbits it around
//! that target on a sphere: right-drag changes the azimuth and polar angle,
//! the mouse wheel changes the radius.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3};
use instant::Duration;
use winit::event::{MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const MIN_POLAR: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn set_lens<F: Into<Rad<f32>>>(&mut self, fovy: F, znear: f32, zfar: f32) {
        self.fovy = fovy.into();
        self.znear = znear;
        self.zfar = zfar;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Accumulates drag and wheel input between frames and applies it in
/// [`update`](Self::update).
#[derive(Clone, Debug)]
pub struct CameraController {
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Fraction of the radius per wheel line.
    pub zoom_speed: f32,
    /// Share of the pending rotation dropped per 60 Hz frame; 0 applies it at once.
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    rotate_delta: (f32, f32),
    zoom_delta: f32,
}

impl CameraController {
    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            damping_factor: 0.2,
            min_distance: 50.0,
            max_distance: 1900.0,
            rotate_delta: (0.0, 0.0),
            zoom_delta: 0.0,
        }
    }

    /// Mouse motion while the orbit button is held.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        self.rotate_delta.0 -= dx as f32 * self.rotate_speed;
        self.rotate_delta.1 -= dy as f32 * self.rotate_speed;
    }

    /// Picks up wheel input; returns whether the event was used.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseWheel { delta, .. } => {
                self.zoom_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let applied = if self.damping_factor > 0.0 {
            let retention = (1.0 - self.damping_factor.min(1.0)).powf(dt.as_secs_f32() * 60.0);
            let applied = (
                self.rotate_delta.0 * (1.0 - retention),
                self.rotate_delta.1 * (1.0 - retention),
            );
            self.rotate_delta.0 *= retention;
            self.rotate_delta.1 *= retention;
            applied
        } else {
            std::mem::take(&mut self.rotate_delta)
        };
        theta += applied.0;
        phi = (phi + applied.1).clamp(MIN_POLAR, PI - MIN_POLAR);

        let mut radius = radius;
        if self.zoom_delta != 0.0 {
            radius *= (1.0 - self.zoom_speed).powf(self.zoom_delta);
            self.zoom_delta = 0.0;
        }
        let radius = radius.clamp(self.min_distance, self.max_distance);

        camera.position = camera.target
            + Vector3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view: Matrix4::identity().into(),
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        let view = camera.calc_matrix();
        self.view_position = camera.position.to_homogeneous().into();
        self.view = view.into();
        self.view_proj = (projection.calc_matrix() * view).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state plus the GPU buffer and bind group (group 0 of every pipeline).
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
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
        label: Some("camera_bind_group_layout"),
    })
}

use std::sync::Arc;

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::{dpi::PhysicalPosition, window::Window};

use crate::{
    camera::{Camera, CameraController, CameraResources, CameraUniform, Projection},
    config::{CameraSettings, LightSettings},
    data_structures::texture::Texture,
    pipelines::{
        Layouts, Pipelines,
        light::{LightResources, LightUniform},
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButtonState {
    Left,
    Right,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MouseState {
    pub coords: PhysicalPosition<f64>,
    pub pressed: MouseButtonState,
}

/// Window, device and the scene-wide GPU state every flow renders with.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub layouts: Layouts,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    pub tick_duration_millis: u64,
    pub mouse: MouseState,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter fits the surface")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL2 caps uniform blocks and bind groups
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("requesting the device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // shaders output linear colour and rely on an sRGB target
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture format")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &config, &layouts);

        let settings = CameraSettings::default();
        let camera = Camera::new(settings.position, settings.target);
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(settings.fov_deg),
            settings.near,
            settings.far,
        );
        let controller = CameraController::new(settings.rotate_speed, settings.zoom_speed);

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, &projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let camera = CameraResources {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout: layouts.camera.clone(),
        };

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let light = LightResources::new(
            &device,
            &layouts.light,
            LightUniform::from(&LightSettings::default()),
        );

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            layouts,
            pipelines,
            clear_colour: wgpu::Color::WHITE,
            tick_duration_millis: 1000,
            mouse: MouseState::default(),
        })
    }

    /// Re-uploads the camera uniform after the camera or projection changed.
    pub fn write_camera(&mut self) {
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }
}

/// The part of [`Context`] flow constructors get while the window is still
/// being set up. Device and queue are reference counted, so cloning is cheap.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub layouts: Layouts,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            layouts: ctx.layouts.clone(),
        }
    }
}

//! Flow control and application event loop.
//!
//! A "flow" is a self-contained scene participant: it handles input, updates
//! its state every frame and hands drawables to the frame. The engine owns the
//! flows, distributes events to them and batches their renders per pipeline.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S, E>`] is the trait scenes implement
//! - [`Out<S, E>`] is returned from every hook for async work and context changes
//!
//! # Frame
//!
//! 1. Window and device events are handed to every flow
//! 2. `on_update` runs with the frame delta, `on_tick` on its own period
//! 3. The orbit camera is updated and uploaded
//! 4. Every flow's `on_render` is sorted into the instanced and skinned batches
//! 5. The frame is drawn and presented

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext, MouseButtonState},
    data_structures::texture::Texture,
    render::{Instanced, Skinned},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

///
/// Output of every lifecycle hook.
///
/// `Out::FutEvent` resolves futures into custom events that are queued for
/// `on_custom_events`.
///
/// `Out::FutFn` resolves futures into mutations of the shared state.
///
/// `Out::Configure` changes the [`Context`] at runtime, for instance the
/// clear colour or the camera.
///
/// `Out::Exit` closes the window and leaves the event loop.
///
/// `Empty` is the default when nothing needs to happen.
///
pub enum Out<S, E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    FutFn(Vec<Box<dyn Future<Output = Box<dyn FnOnce(&mut S)>>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Exit,
    Empty,
}

impl<S, E> Default for Out<S, E> {
    fn default() -> Self {
        Self::Empty
    }
}

/// A renderable scene participant.
///
/// # Lifecycle
///
/// 1. `on_init()` once after the window and every flow are ready
/// 2. `on_window_events()` / `on_device_events()` for each winit event
/// 3. `on_click()` when the left mouse button goes down
/// 4. `on_update()` every frame
/// 5. `on_tick()` every `tick_duration_millis`
/// 6. `on_custom_events()` for events produced by [`Out::FutEvent`]
/// 7. `on_render()` every frame
///
pub trait GraphicsFlow<S, E> {
    /// The only hook with mutable access to the context: set up the camera,
    /// the light or the clear colour here.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<S, E>;

    /// Left click anywhere in the window. The cursor position is in
    /// `ctx.mouse.coords`.
    fn on_click(&mut self, ctx: &Context, state: &mut S) -> Out<S, E>;

    /// Called every frame with the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<S, E>;

    /// Called every `tick_duration_millis` milliseconds.
    fn on_tick(&mut self, ctx: &Context, state: &mut S) -> Out<S, E>;

    fn on_device_events(&mut self, ctx: &Context, state: &mut S, event: &DeviceEvent) -> Out<S, E>;

    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<S, E>;

    /// Returns the event if it was not consumed so the next flow sees it.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    fn on_render(&self) -> crate::render::Render<'_>;
}

impl<State, Event> Debug for dyn GraphicsFlow<State, Event> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Builds a flow from an [`InitContext`]. Constructors run concurrently so
/// every flow can load its assets before the first frame.
pub type FlowConsturctor<S, E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S, E>>>>>>;

/// GPU context, app state and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self>
    where
        State: Default,
    {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn render<Event>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>],
    ) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut basics: Vec<Instanced> = Vec::new();
            let mut skins: Vec<Skinned> = Vec::new();
            graphics_flows
                .iter()
                .for_each(|flow| flow.on_render().sort_into(&mut basics, &mut skins));

            render_pass.set_pipeline(&self.ctx.pipelines.basic);
            render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
            render_pass.set_bind_group(1, &self.ctx.light.bind_group, &[]);
            for instanced in basics {
                if instanced.amount == 0 || instanced.instance.size() == 0 {
                    log::warn!("`{}` has no instances to draw", instanced.mesh.name);
                    continue;
                }
                render_pass.set_bind_group(2, instanced.material, &[]);
                render_pass.set_vertex_buffer(0, instanced.mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.set_index_buffer(
                    instanced.mesh.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(
                    0..instanced.mesh.num_elements,
                    0,
                    0..instanced.amount as u32,
                );
            }

            if !skins.is_empty() {
                render_pass.set_pipeline(&self.ctx.pipelines.skinned);
                render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
                render_pass.set_bind_group(1, &self.ctx.light.bind_group, &[]);
                for skinned in skins {
                    render_pass.set_bind_group(2, skinned.material, &[]);
                    render_pass.set_bind_group(3, skinned.object, &[]);
                    render_pass.set_vertex_buffer(0, skinned.mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(
                        skinned.mesh.index_buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    render_pass.draw_indexed(0..skinned.mesh.num_elements, 0, 0..1);
                }
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    state: Option<AppState<State>>,
    // fully initialised flows
    graphics_flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    // taken on the first `resumed`
    constructors: Option<Vec<FlowConsturctor<State, Event>>>,
    clock: FrameClock,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: 'static,
{
    fn new(
        event_loop: &EventLoop<FlowEvent<State, Event>>,
        constructors: Vec<FlowConsturctor<State, Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            clock: FrameClock::new(),
        })
    }

    fn dispatch<F>(&mut self, mut hook: F)
    where
        F: FnMut(&mut Box<dyn GraphicsFlow<State, Event>>, &Context, &mut State) -> Out<State, Event>,
    {
        let Some(app_state) = &mut self.state else {
            return;
        };
        for flow in self.graphics_flows.iter_mut() {
            let out = hook(flow, &app_state.ctx, &mut app_state.state);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut app_state.state,
                &mut app_state.ctx,
                self.proxy.clone(),
                out,
            );
        }
    }

    fn init_flows(&mut self) {
        let Some(app_state) = &mut self.state else {
            return;
        };
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut app_state.state,
                &mut app_state.ctx,
                self.proxy.clone(),
                out,
            );
        }
        app_state.ctx.write_camera();
        // asset loading must not count as the first frame
        self.clock.restart();
    }

    fn redraw(&mut self) {
        let dt = self.clock.frame();

        self.dispatch(|flow, ctx, state| flow.on_update(ctx, state, dt));

        let Some(app_state) = &mut self.state else {
            return;
        };
        let tick = Duration::from_millis(app_state.ctx.tick_duration_millis);
        if self.clock.tick_due(tick) {
            self.dispatch(|flow, ctx, state| flow.on_tick(ctx, state));
        }

        let Some(app_state) = &mut self.state else {
            return;
        };
        let ctx = &mut app_state.ctx;
        ctx.camera.controller.update(&mut ctx.camera.camera, dt);
        ctx.write_camera();

        match app_state.render(&self.graphics_flows) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = app_state.ctx.window.inner_size();
                app_state.resize(size.width, size.height);
            }
            Err(e) => log::error!("Unable to render {e}"),
        }
    }
}

/// Frame deltas and the `on_tick` period.
#[derive(Debug)]
pub(crate) struct FrameClock {
    last_frame: Instant,
    since_tick: Duration,
}

impl FrameClock {
    pub(crate) fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            since_tick: Duration::ZERO,
        }
    }

    /// Measures from now on.
    pub(crate) fn restart(&mut self) {
        self.last_frame = Instant::now();
        self.since_tick = Duration::ZERO;
    }

    /// Time since the previous frame (or the last restart).
    pub(crate) fn frame(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        self.since_tick += dt;
        dt
    }

    /// True once per elapsed `period`.
    pub(crate) fn tick_due(&mut self, period: Duration) -> bool {
        if self.since_tick < period {
            return false;
        }
        self.since_tick = Duration::ZERO;
        true
    }
}

pub(crate) enum FlowEvent<State: 'static, Event: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
    #[allow(dead_code)]
    Mut(Box<dyn FnOnce(&mut State)>),
    Custom(Event),
    Exit,
}

impl<State, Event> Debug for FlowEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Mut(_) => f.write_str("Mut(|&mut State| -> {...})"),
            Self::Custom(_) => f.write_str("Custom(E)"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

impl<State: 'static + Default, Event: 'static> ApplicationHandler<FlowEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("flow-melee");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flows)) => {
                    self.state = Some(app_state);
                    self.graphics_flows = flows;
                    self.init_flows();
                }
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((state, flows)) => {
                        if proxy
                            .send_event(FlowEvent::Initialized { state, flows })
                            .is_err()
                        {
                            log::error!("Event loop closed before initialization finished");
                        }
                    }
                    Err(e) => log::error!("App initialization failed: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            FlowEvent::Initialized { state, flows } => {
                // wasm: initialization finished on `spawn_local`
                self.state = Some(state);
                self.graphics_flows = flows;
                if let Some(app_state) = &mut self.state {
                    let size = app_state.ctx.window.inner_size();
                    app_state.resize(size.width, size.height);
                }
                self.init_flows();
                if let Some(app_state) = &self.state {
                    app_state.ctx.window.request_redraw();
                }
            }
            FlowEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .graphics_flows
                        .iter_mut()
                        .fold(Some(custom_event), |event, flow| {
                            flow.on_custom_events(&state.ctx, &mut state.state, event?)
                        });
                    if result.is_some() {
                        log::warn!("Custom event was not consumed this cycle");
                    }
                }
            }
            FlowEvent::Mut(fn_once) => {
                if let Some(state) = &mut self.state {
                    fn_once(&mut state.state);
                }
            }
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.ctx.mouse.pressed == MouseButtonState::Right {
                state.ctx.camera.controller.handle_mouse(dx, dy);
            }
        }
        self.dispatch(|flow, ctx, state| flow.on_device_events(ctx, state, &event));
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.controller.handle_window_events(&event);
        if let WindowEvent::CursorMoved { position, .. } = event {
            state.ctx.mouse.coords = position;
        }

        self.dispatch(|flow, ctx, state| flow.on_window_events(ctx, state, &event));

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match (button, button_state.is_pressed()) {
                    (MouseButton::Left, true) => {
                        state.ctx.mouse.pressed = MouseButtonState::Left;
                        self.dispatch(|flow, ctx, state| flow.on_click(ctx, state));
                    }
                    (MouseButton::Right, true) => {
                        state.ctx.mouse.pressed = MouseButtonState::Right;
                    }
                    (_, false) => state.ctx.mouse.pressed = MouseButtonState::None,
                    _ => (),
                }
            }
            _ => {}
        }
    }
}

fn handle_flow_output<State, Event>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    state: &mut State,
    ctx: &mut Context,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    out: Out<State, Event>,
) {
    match out {
        // resolved events go back through winit
        Out::FutEvent(futures) => {
            let fut =
                async move { futures::future::join_all(futures.into_iter().map(Pin::from)).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                for event in async_runtime.block_on(fut) {
                    if let Err(e) = proxy.send_event(FlowEvent::Custom(event)) {
                        log::error!("Event loop closed before all events were processed: {e}");
                    }
                }
            }

            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    for event in fut.await {
                        if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                            log::error!("Event loop closed before all events were processed");
                        }
                    }
                });
            }
        }
        // natively the state is mutated in place, on wasm through an event
        Out::FutFn(futures) => {
            let mutations: Vec<Pin<Box<dyn Future<Output = Box<dyn FnOnce(&mut State)>>>>> =
                futures.into_iter().map(Pin::from).collect();
            let fut = async move { futures::future::join_all(mutations).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                for mutation in async_runtime.block_on(fut) {
                    mutation(state);
                }
            }

            #[cfg(target_arch = "wasm32")]
            {
                let _ = state;
                wasm_bindgen_futures::spawn_local(async move {
                    for mutation in fut.await {
                        if proxy.send_event(FlowEvent::Mut(mutation)).is_err() {
                            log::error!("Event loop closed before all mutations were applied");
                        }
                    }
                });
            }
        }
        Out::Configure(f) => f(ctx),
        Out::Exit => {
            if let Err(e) = proxy.send_event(FlowEvent::Exit) {
                log::error!("Event loop already closed: {e}");
            }
        }
        Out::Empty => (),
    }
}

/// Opens the window and drives `constructors` until the window closes or a
/// flow returns [`Out::Exit`].
pub fn run<State: 'static + Default, Event: 'static>(
    constructors: Vec<FlowConsturctor<State, Event>>,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {e}");
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Info).is_err() {
            log::warn!("A logger was already initialized");
        }
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restarting_drops_the_time_spent_loading() {
        let mut clock = FrameClock::new();
        std::thread::sleep(Duration::from_millis(60));
        clock.restart();
        assert!(clock.frame() < Duration::from_millis(50));
        assert!(!clock.tick_due(Duration::from_millis(50)));
    }

    #[test]
    fn ticks_fire_once_per_period() {
        let mut clock = FrameClock::new();
        std::thread::sleep(Duration::from_millis(20));
        clock.frame();
        assert!(clock.tick_due(Duration::from_millis(10)));
        assert!(!clock.tick_due(Duration::from_millis(10)));
    }
}

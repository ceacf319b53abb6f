//! flow-melee
//!
//! A click-driven melee arena on a native and WASM compatible wgpu stack.
//! A hero fights a roster of monsters one at a time; every model is animated
//! through a state→clip table with crossfades, and finished clips drive the
//! combat.
//!
//! High-level modules
//! - `actor`: animation states, clip bindings and loaded actors
//! - `animation`: clips, actions, the blending mixer and skeletons
//! - `arena`: the demo flow wiring stage, actors and combat together
//! - `camera`: orbit camera, projection and uniforms
//! - `combat`: HP, hit timing and roster progression
//! - `config`: the `arena.json` configuration
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, instances, textures and models
//! - `flow`: high level flow control (scenes / update loops)
//! - `pipelines`: the basic instanced and the skinned render pipelines
//! - `resources`: async asset loading and the glTF/FBX loaders
//! - `render`: render composition for efficient pipeline reuse
//! - `scene`: the static stage
//!

pub mod actor;
pub mod animation;
pub mod arena;
pub mod camera;
pub mod combat;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::dpi::PhysicalPosition;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
pub use wgpu::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = arena::run_arena() {
        log::error!("The arena stopped: {e:#}");
    }
}

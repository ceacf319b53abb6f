//! Engine data structures.
//!
//! - `instance` holds per-instance placement and its GPU layout
//! - `mesh` has the vertex formats, procedural geometry and uploaded meshes
//! - `model` has loaded models: CPU data, materials and skinned GPU models
//! - `texture` wraps GPU textures and their creation

pub mod instance;
pub mod mesh;
pub mod model;
pub mod texture;

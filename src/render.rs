//! Render composition.
//!
//! Flows describe what they want drawn with a [`Render`] value each frame.
//! The frame loop sorts the drawables into the instanced (static props) and
//! skinned (actors) pipelines so each pipeline is bound once per frame.

use crate::data_structures::mesh::GpuMesh;

/// A static mesh drawn `amount` times from an instance buffer.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub mesh: &'a GpuMesh,
    pub material: &'a wgpu::BindGroup,
    pub amount: usize,
}

/// One primitive of a skinned model.
pub struct Skinned<'a> {
    pub mesh: &'a GpuMesh,
    pub material: &'a wgpu::BindGroup,
    /// Model matrix and joint palette.
    pub object: &'a wgpu::BindGroup,
}

/// What a flow wants drawn this frame.
///
/// - `None` renders nothing
/// - `Default(Instanced)` / `Defaults(Vec<Instanced>)` use the instanced pipeline
/// - `Skin(Skinned)` / `Skins(Vec<Skinned>)` use the skinned pipeline
/// - `Composed(Vec<Render>)` nests renders of several objects
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Skin(Skinned<'a>),
    Skins(Vec<Skinned<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Flattens `self` into per-pipeline batches.
    pub(crate) fn sort_into(
        self,
        instanced: &mut Vec<Instanced<'a>>,
        skinned: &mut Vec<Skinned<'a>>,
    ) {
        match self {
            Render::None => {}
            Render::Default(item) => instanced.push(item),
            Render::Defaults(items) => instanced.extend(items),
            Render::Skin(item) => skinned.push(item),
            Render::Skins(items) => skinned.extend(items),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.sort_into(instanced, skinned)),
        }
    }
}

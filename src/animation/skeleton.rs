//! Node hierarchy and joint palette.

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::instance::Instance;

/// Joints beyond this count are dropped from the palette; the shader's
/// uniform array is sized to match.
pub const MAX_JOINTS: usize = 128;

/// Every node of a loaded model with its rest transform, plus the subset of
/// nodes that skin vertices (`joints`) and their inverse bind matrices.
///
/// A vertex joint index `i` refers to `joints[i]`, which is a node index.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub names: Vec<String>,
    pub parents: Vec<Option<usize>>,
    pub rest: Vec<Instance>,
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

impl Skeleton {
    pub fn node_count(&self) -> usize {
        self.rest.len()
    }

    /// Appends a joint and returns its palette slot.
    pub fn add_joint(&mut self, node: usize, inverse_bind: Matrix4<f32>) -> usize {
        self.joints.push(node);
        self.inverse_bind.push(inverse_bind);
        self.joints.len() - 1
    }

    /// Resolves the world matrix of every node for the given local pose.
    ///
    /// `pose` must hold one transform per node. Parents may appear after their
    /// children; each chain is walked up once and cached.
    pub fn global_transforms(&self, pose: &[Instance]) -> Vec<Matrix4<f32>> {
        let count = self.node_count().min(pose.len());
        let mut globals: Vec<Option<Matrix4<f32>>> = vec![None; count];
        let mut chain = Vec::new();
        for node in 0..count {
            if globals[node].is_some() {
                continue;
            }
            chain.clear();
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if current >= count || globals[current].is_some() || chain.contains(&current) {
                    break;
                }
                chain.push(current);
                cursor = self.parents[current];
            }
            for &current in chain.iter().rev() {
                let local = pose[current].to_matrix();
                let global = match self.parents[current].and_then(|p| globals.get(p).copied().flatten()) {
                    Some(parent) => parent * local,
                    None => local,
                };
                globals[current] = Some(global);
            }
        }
        globals
            .into_iter()
            .map(|g| g.unwrap_or_else(Matrix4::identity))
            .collect()
    }

    /// Skinning matrices (`global * inverse_bind`) for the first [`MAX_JOINTS`] joints.
    pub fn palette(&self, pose: &[Instance]) -> Vec<Matrix4<f32>> {
        let globals = self.global_transforms(pose);
        self.joints
            .iter()
            .take(MAX_JOINTS)
            .enumerate()
            .map(|(slot, &node)| {
                let global = globals.get(node).copied().unwrap_or_else(Matrix4::identity);
                let inverse_bind = self
                    .inverse_bind
                    .get(slot)
                    .copied()
                    .unwrap_or_else(Matrix4::identity);
                global * inverse_bind
            })
            .collect()
    }
}

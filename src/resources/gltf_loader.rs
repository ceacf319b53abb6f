//! glTF 2.0 / GLB parsing into [`ModelData`].
//!
//! Every node becomes a skeleton node so clips can target any of them. Skins
//! are appended to one palette; a mesh on a node without a skin is bound
//! rigidly to a synthesized joint for that node, so props and characters
//! animate through the same path.

use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3};
use gltf::{animation::util::ReadOutputs, mesh::Mode};

use crate::{
    animation::{AnimationClip, Interpolation, Keyframes, MAX_JOINTS, Skeleton, Track},
    data_structures::{
        instance::Instance,
        mesh::{CpuMesh, SkinnedVertex},
        model::{ImageData, MaterialData, ModelData, PrimitiveData},
    },
    error::AssetError,
    resources::load_uri,
};

pub(super) async fn load_gltf(path: &str, bytes: &[u8]) -> anyhow::Result<ModelData> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| AssetError::Gltf {
        path: path.to_string(),
        source,
    })?;
    let buffers = load_buffers(path, &gltf).await?;
    let images = load_images(path, &gltf.document, &buffers).await;
    Ok(model_from_document(path, &gltf.document, &buffers, &images)?)
}

async fn load_buffers(path: &str, gltf: &gltf::Gltf) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf.blob.clone().ok_or(AssetError::MissingBuffer {
                path: path.to_string(),
                index: buffer.index(),
            })?,
            gltf::buffer::Source::Uri(uri) => load_uri(path, uri).await?.0,
        };
        if data.len() < buffer.length() {
            return Err(AssetError::MissingBuffer {
                path: path.to_string(),
                index: buffer.index(),
            }
            .into());
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// Encoded images by glTF image index. An image that cannot be read is
/// logged and its material falls back to the base colour.
async fn load_images(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
) -> Vec<Option<ImageData>> {
    let mut images = Vec::new();
    for image in document.images() {
        let data = match image.source() {
            gltf::image::Source::View { view, mime_type } => buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
                .map(|bytes| ImageData {
                    bytes: bytes.to_vec(),
                    mime: Some(mime_type.to_string()),
                }),
            gltf::image::Source::Uri { uri, mime_type } => match load_uri(path, uri).await {
                Ok((bytes, embedded)) => Some(ImageData {
                    bytes,
                    mime: mime_type.map(str::to_string).or(embedded),
                }),
                Err(e) => {
                    log::warn!("Skipping image {} of `{path}`: {e:#}", image.index());
                    None
                }
            },
        };
        images.push(data);
    }
    images
}

fn model_from_document(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    images: &[Option<ImageData>],
) -> Result<ModelData, AssetError> {
    let read = |buffer: gltf::Buffer| buffers.get(buffer.index()).map(Vec::as_slice);

    let mut skeleton = read_nodes(document);

    let mut skin_offsets = Vec::new();
    for skin in document.skins() {
        let inverse_binds: Vec<Matrix4<f32>> = skin
            .reader(read)
            .read_inverse_bind_matrices()
            .map(|matrices| matrices.map(Matrix4::from).collect())
            .unwrap_or_default();
        skin_offsets.push(skeleton.joints.len());
        for (i, joint) in skin.joints().enumerate() {
            let inverse_bind = inverse_binds.get(i).copied().unwrap_or_else(Matrix4::identity);
            skeleton.add_joint(joint.index(), inverse_bind);
        }
    }

    let mut materials: Vec<MaterialData> = document
        .materials()
        .enumerate()
        .map(|(i, material)| {
            let pbr = material.pbr_metallic_roughness();
            MaterialData {
                name: material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("material{i}")),
                base_color: pbr.base_color_factor(),
                image: pbr
                    .base_color_texture()
                    .and_then(|info| images.get(info.texture().source().index()).cloned().flatten()),
            }
        })
        .collect();
    let mut default_material = None;

    let mut primitives = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let (joint_offset, skinned) = match node.skin() {
            Some(skin) => (skin_offsets[skin.index()], true),
            None => (skeleton.add_joint(node.index(), Matrix4::identity()), false),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::warn!(
                    "Skipping {:?} primitive of mesh {} in `{path}`",
                    primitive.mode(),
                    mesh.index()
                );
                continue;
            }
            let reader = primitive.reader(read);
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let count = positions.len();
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|indices| indices.into_u32().collect())
                .unwrap_or_else(|| (0..count as u32).collect());
            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|normals| normals.collect())
                .unwrap_or_else(|| accumulate_normals(&positions, &indices));
            let tex_coords: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().collect())
                .unwrap_or_default();
            let joints: Vec<[u16; 4]> = reader
                .read_joints(0)
                .map(|joints| joints.into_u16().collect())
                .unwrap_or_default();
            let weights: Vec<[f32; 4]> = reader
                .read_weights(0)
                .map(|weights| weights.into_f32().collect())
                .unwrap_or_default();
            let has_weights = skinned && joints.len() == count && weights.len() == count;

            let vertices = (0..count)
                .map(|i| {
                    let normal = normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
                    let uv = tex_coords.get(i).copied().unwrap_or([0.0, 0.0]);
                    let mut vertex = SkinnedVertex::rigid(positions[i], normal, uv, joint_offset as u32);
                    if has_weights {
                        vertex.joints = joints[i].map(|j| j as u32 + joint_offset as u32);
                        vertex.weights = normalize_weights(weights[i]);
                    }
                    vertex
                })
                .collect();

            let material = match primitive.material().index() {
                Some(index) => index,
                None => *default_material.get_or_insert_with(|| {
                    materials.push(MaterialData::default());
                    materials.len() - 1
                }),
            };
            primitives.push(PrimitiveData {
                mesh: CpuMesh { vertices, indices },
                material,
            });
        }
    }

    if primitives.is_empty() {
        return Err(AssetError::NoMeshes {
            path: path.to_string(),
        });
    }
    if skeleton.joints.len() > MAX_JOINTS {
        log::warn!(
            "`{path}` has {} joints; only the first {MAX_JOINTS} deform the mesh",
            skeleton.joints.len()
        );
    }

    let clips = document
        .animations()
        .enumerate()
        .map(|(i, animation)| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("clip{i}"));
            let tracks = animation
                .channels()
                .filter_map(|channel| read_track(&channel, read))
                .collect();
            AnimationClip::new(name, tracks)
        })
        .collect();

    let name = std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string();

    Ok(ModelData {
        name,
        primitives,
        materials,
        skeleton,
        clips,
    })
}

fn read_nodes(document: &gltf::Document) -> Skeleton {
    let count = document.nodes().count();
    let mut skeleton = Skeleton {
        names: Vec::with_capacity(count),
        parents: vec![None; count],
        rest: Vec::with_capacity(count),
        ..Default::default()
    };
    for node in document.nodes() {
        let (translation, rotation, scale) = node.transform().decomposed();
        skeleton.names.push(
            node.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node{}", node.index())),
        );
        skeleton.rest.push(Instance {
            position: Vector3::from(translation),
            // glTF stores quaternions as xyzw
            rotation: Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: Vector3::from(scale),
        });
        for child in node.children() {
            skeleton.parents[child.index()] = Some(node.index());
        }
    }
    skeleton
}

fn read_track<'a, 's, F>(channel: &gltf::animation::Channel<'a>, read: F) -> Option<Track>
where
    F: Clone + Fn(gltf::Buffer<'a>) -> Option<&'s [u8]>,
{
    let reader = channel.reader(read);
    let timestamps: Vec<f32> = reader.read_inputs()?.collect();
    let (interpolation, cubic) = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
        gltf::animation::Interpolation::Step => (Interpolation::Step, false),
        // keep the values, drop the tangents
        gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
    };
    let keyframes = match reader.read_outputs()? {
        ReadOutputs::Translations(values) => Keyframes::Translation(
            spline_values(values.collect(), cubic)
                .into_iter()
                .map(Vector3::from)
                .collect(),
        ),
        ReadOutputs::Rotations(values) => Keyframes::Rotation(
            spline_values(values.into_f32().collect(), cubic)
                .into_iter()
                .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                .collect(),
        ),
        ReadOutputs::Scales(values) => Keyframes::Scale(
            spline_values(values.collect(), cubic)
                .into_iter()
                .map(Vector3::from)
                .collect(),
        ),
        ReadOutputs::MorphTargetWeights(_) => {
            log::debug!("Skipping morph target channel {}", channel.index());
            return None;
        }
    };
    Some(Track::new(
        channel.target().node().index(),
        timestamps,
        keyframes,
        interpolation,
    ))
}

/// Cubic-spline outputs come as (in-tangent, value, out-tangent) triples.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|triple| triple[1]).collect()
    } else {
        values
    }
}

fn normalize_weights(weights: [f32; 4]) -> [f32; 4] {
    let sum: f32 = weights.iter().sum();
    if sum > f32::EPSILON {
        weights.map(|w| w / sum)
    } else {
        [1.0, 0.0, 0.0, 0.0]
    }
}

/// Area-weighted vertex normals for meshes that ship without any.
fn accumulate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    use cgmath::InnerSpace;

    let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a.max(b).max(c) >= positions.len() {
            continue;
        }
        let [pa, pb, pc] = [a, b, c].map(|i| Vector3::from(positions[i]));
        let face = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            normals[i] += face;
        }
    }
    normals
        .into_iter()
        .map(|n| {
            if n.magnitude2() > f32::EPSILON {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;

    /// A triangle drawn by a skinned node and by a plain prop node, one
    /// joint, and a clip moving that joint.
    fn sample_document() -> String {
        let mut bin: Vec<u8> = Vec::new();
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        bin.extend_from_slice(bytemuck::cast_slice(&positions));
        bin.extend_from_slice(bytemuck::cast_slice(&[0u16, 1, 2, 0]));
        bin.extend_from_slice(bytemuck::cast_slice(&[0.0f32, 1.0]));
        bin.extend_from_slice(bytemuck::cast_slice(&[0.0f32, 0.0, 0.0, 0.0, 2.0, 0.0]));
        let identity: [f32; 16] = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        bin.extend_from_slice(bytemuck::cast_slice(&identity));
        assert_eq!(bin.len(), 140);
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bin)
        );

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 3] }}],
  "nodes": [
    {{ "name": "root", "children": [1, 2] }},
    {{ "name": "bone" }},
    {{ "name": "body", "mesh": 0, "skin": 0 }},
    {{ "name": "prop", "mesh": 0, "translation": [5.0, 0.0, 0.0] }}
  ],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "skins": [{{ "joints": [1], "inverseBindMatrices": 4 }}],
  "animations": [{{
    "name": "Armature|Idle",
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }}],
    "samplers": [{{ "input": 2, "output": 3 }}]
  }}],
  "buffers": [{{ "byteLength": 140, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 52, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 76, "byteLength": 64 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }},
    {{ "bufferView": 4, "componentType": 5126, "count": 1, "type": "MAT4" }}
  ]
}}"#
        )
    }

    #[tokio::test]
    async fn loads_nodes_meshes_and_clips() {
        let json = sample_document();
        let model = load_gltf("model/sample.gltf", json.as_bytes()).await.unwrap();

        assert_eq!(model.name, "sample");
        assert_eq!(model.skeleton.node_count(), 4);
        assert_eq!(model.skeleton.parents, vec![None, Some(0), Some(0), None]);
        // skin joint first, then the synthesized joint of the prop
        assert_eq!(model.skeleton.joints, vec![1, 3]);

        assert_eq!(model.primitives.len(), 2);
        let skinned = &model.primitives[0].mesh;
        assert_eq!(skinned.indices, vec![0, 1, 2]);
        assert_eq!(skinned.vertices[0].joints[0], 0);
        assert_eq!(skinned.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(model.primitives[1].mesh.vertices[2].joints[0], 1);

        assert_eq!(model.materials.len(), 1);
        assert!(model.primitives.iter().all(|p| p.material == 0));

        assert_eq!(model.clips.len(), 1);
        assert_eq!(model.clips[0].name, "Armature|Idle");
        assert_eq!(model.clips[0].duration, 1.0);
        assert_eq!(model.clips[0].tracks[0].node, 1);
    }

    #[tokio::test]
    async fn props_are_placed_by_their_joint() {
        let json = sample_document();
        let model = load_gltf("sample.gltf", json.as_bytes()).await.unwrap();
        let palette = model.skeleton.palette(&model.skeleton.rest);
        assert_eq!(palette[0], Matrix4::identity());
        assert_eq!(palette[1], Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0)));
    }

    #[tokio::test]
    async fn garbage_is_a_typed_error() {
        let err = load_gltf("broken.glb", b"not a model").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AssetError>(),
            Some(AssetError::Gltf { .. })
        ));
    }

    #[test]
    fn weights_are_normalized() {
        assert_eq!(normalize_weights([2.0, 2.0, 0.0, 0.0]), [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(normalize_weights([0.0; 4]), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn cubic_splines_keep_their_values() {
        assert_eq!(spline_values(vec![0, 1, 2, 3, 4, 5], true), vec![1, 4]);
        assert_eq!(spline_values(vec![0, 1, 2], false), vec![0, 1, 2]);
    }
}

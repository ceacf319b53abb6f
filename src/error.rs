//! Typed errors for asset loading and configuration.
//!
//! Loader and config code returns these; flow constructors and the binary
//! entry point wrap them in `anyhow` where they only need to be reported.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot tell the model format of `{path}` from its extension")]
    UnsupportedFormat { path: String },

    #[error("{format} models are not supported (`{path}`); convert the asset to glTF or GLB")]
    FormatNotSupported { path: String, format: &'static str },

    #[error("`{path}` is not a valid glTF document: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },

    #[error("buffer {index} referenced by `{path}` could not be resolved")]
    MissingBuffer { path: String, index: usize },

    #[error("malformed data URI: {0}")]
    DataUri(String),

    #[error("`{path}` contains no drawable triangle meshes")]
    NoMeshes { path: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("arena config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("the monster roster is empty")]
    EmptyRoster,

    #[error("`{field}` must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("actor `{actor}` has no model path")]
    MissingModel { actor: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown animation state `{0}`")]
pub struct UnknownState(pub String);

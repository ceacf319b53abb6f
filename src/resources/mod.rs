//! Loading from the asset directory.
//!
//! Natively files are read from `./assets/`; on the web they are fetched from
//! `<origin>/assets/`. Models are parsed into the CPU-side [`ModelData`] here
//! and uploaded by the caller, so loaders never touch the GPU.

use std::path::Path;

use anyhow::Context as _;
use base64::Engine as _;

use crate::error::AssetError;

pub use crate::data_structures::model::ModelData;

mod fbx_loader;
mod gltf_loader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetFormat {
    Gltf,
    Fbx,
}

impl AssetFormat {
    /// Picks the format from the file extension, ignoring case.
    pub fn from_path(path: &str) -> Result<Self, AssetError> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gltf" | "glb") => Ok(AssetFormat::Gltf),
            Some("fbx") => Ok(AssetFormat::Fbx),
            _ => Err(AssetError::UnsupportedFormat {
                path: path.to_string(),
            }),
        }
    }
}

/// Reads and parses a model file. Nothing is uploaded yet.
pub async fn load_model_data(path: &str) -> anyhow::Result<ModelData> {
    match AssetFormat::from_path(path)? {
        AssetFormat::Gltf => {
            let bytes = load_binary(path)
                .await
                .with_context(|| format!("reading `{path}`"))?;
            gltf_loader::load_gltf(path, &bytes).await
        }
        AssetFormat::Fbx => Ok(fbx_loader::load_fbx(path)?),
    }
}

/// Resolves `uri` relative to the directory of the asset at `base`.
pub fn sibling_path(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(split) => format!("{}/{}", &base[..split], uri),
        None => uri.to_string(),
    }
}

/// Decodes a base64 `data:` URI into its bytes and MIME type.
pub fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, Option<String>), AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::DataUri("missing `data:` scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::DataUri("missing `,` before the payload".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| AssetError::DataUri(format!("`{header}` is not base64 encoded")))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AssetError::DataUri(e.to_string()))?;
    let mime = (!mime.is_empty()).then(|| mime.to_string());
    Ok((bytes, mime))
}

/// Bytes behind a URI found inside the asset at `base`: either embedded or a
/// sibling file.
pub(crate) async fn load_uri(base: &str, uri: &str) -> anyhow::Result<(Vec<u8>, Option<String>)> {
    if uri.starts_with("data:") {
        return Ok(decode_data_uri(uri)?);
    }
    let path = sibling_path(base, uri);
    let bytes = load_binary(&path)
        .await
        .with_context(|| format!("reading `{path}` referenced by `{base}`"))?;
    Ok((bytes, None))
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("cannot read the page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.error_for_status()?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = Path::new("./").join("assets").join(file_name);
        tokio::fs::read_to_string(path).await?
    };

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = Path::new("./").join("assets").join(file_name);
        tokio::fs::read(path).await?
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(AssetFormat::from_path("model/hero.glb").ok(), Some(AssetFormat::Gltf));
        assert_eq!(AssetFormat::from_path("model/Hero.GLTF").ok(), Some(AssetFormat::Gltf));
        assert_eq!(AssetFormat::from_path("model/orc.FBX").ok(), Some(AssetFormat::Fbx));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        for path in ["model/hero.obj", "model/hero", "glb"] {
            assert!(matches!(
                AssetFormat::from_path(path),
                Err(AssetError::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn sibling_paths_share_the_directory() {
        assert_eq!(sibling_path("model/hero.gltf", "hero.bin"), "model/hero.bin");
        assert_eq!(sibling_path("hero.gltf", "hero.bin"), "hero.bin");
        assert_eq!(
            sibling_path("a/b/hero.gltf", "textures/skin.png"),
            "a/b/textures/skin.png"
        );
    }

    #[test]
    fn data_uris_decode() {
        let (bytes, mime) = decode_data_uri("data:application/octet-stream;base64,AAEC/w==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 255]);
        assert_eq!(mime.as_deref(), Some("application/octet-stream"));

        let (bytes, mime) = decode_data_uri("data:;base64,AA==").unwrap();
        assert_eq!(bytes, vec![0]);
        assert_eq!(mime, None);
    }

    #[test]
    fn malformed_data_uris_are_errors() {
        for uri in ["hero.bin", "data:text/plain,hello", "data:;base64", "data:;base64,!!"] {
            assert!(matches!(decode_data_uri(uri), Err(AssetError::DataUri(_))), "{uri}");
        }
    }

    #[tokio::test]
    async fn fbx_models_are_not_parsed() {
        let err = load_model_data("model/orc.fbx").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AssetError>(),
            Some(AssetError::FormatNotSupported { format: "FBX", .. })
        ));
    }
}

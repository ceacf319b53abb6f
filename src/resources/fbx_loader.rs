use crate::{data_structures::model::ModelData, error::AssetError};

/// FBX is recognised by extension but not parsed. Convert such assets to GLB.
pub(super) fn load_fbx(path: &str) -> Result<ModelData, AssetError> {
    log::warn!("`{path}` is an FBX file; only glTF and GLB models are parsed");
    Err(AssetError::FormatNotSupported {
        path: path.to_string(),
        format: "FBX",
    })
}

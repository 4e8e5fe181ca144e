//! Multi-document YAML streams.

use serde::Deserialize;

use crate::error::ManifestError;
use crate::resource::ManifestResource;

const DOCUMENT_SEPARATOR: &str = "---\n";

/// Render resources as one YAML stream, documents separated by `---`.
pub fn to_yaml_stream(resources: &[ManifestResource]) -> Result<String, ManifestError> {
    let mut out = String::new();
    for resource in resources {
        out.push_str(DOCUMENT_SEPARATOR);
        out.push_str(&serde_yaml_ng::to_string(resource)?);
    }
    Ok(out)
}

/// Parse a stream written by [`to_yaml_stream`].
pub fn from_yaml_stream(stream: &str) -> Result<Vec<ManifestResource>, ManifestError> {
    serde_yaml_ng::Deserializer::from_str(stream)
        .map(|document| ManifestResource::deserialize(document).map_err(ManifestError::from))
        .collect()
}

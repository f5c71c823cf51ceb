use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::error::{ExecError, ExecResult};

/// Registry credentials carried by a job image.
///
/// The wire form is a base64-encoded JSON object.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryAuth {
    #[serde(alias = "Username")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
}

impl RegistryAuth {
    /// Decode the base64 JSON blob from the job description.
    pub fn parse(blob: &str) -> ExecResult<Self> {
        let bytes = STANDARD
            .decode(blob)
            .map_err(|e| ExecError::Auth(format!("bad base64: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| ExecError::Auth(format!("bad json: {e}")))
    }
}

/// The registry host of an image reference, when it names one.
///
/// `registry.example.org/repo/image` has a registry; a bare `repo/image`
/// pulled from the default registry does not need a login target.
pub fn registry_host(image: &str) -> Option<&str> {
    let first = image.split('/').next()?;
    if image.contains('/') && (first.contains('.') || first.contains(':')) {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_credentials_blob() {
        // base64 of {"Username":"user","Password":"hunter2"}
        let blob = STANDARD.encode(r#"{"Username":"user","Password":"hunter2"}"#);
        let auth = RegistryAuth::parse(&blob).unwrap();
        assert_eq!(auth.username, "user");
        assert_eq!(auth.password, "hunter2");
    }

    #[test]
    fn rejects_garbage() {
        assert!(RegistryAuth::parse("%%%").is_err());
        let blob = STANDARD.encode("not json");
        assert!(RegistryAuth::parse(&blob).is_err());
    }

    #[test]
    fn registry_host_detection() {
        assert_eq!(
            registry_host("gims.grid.example.org:5000/backwards-compat"),
            Some("gims.grid.example.org:5000")
        );
        assert_eq!(registry_host("registry.io/repo/img"), Some("registry.io"));
        assert_eq!(registry_host("discoenv/echo"), None);
        assert_eq!(registry_host("ubuntu"), None);
    }
}

//! Files handed to web clients: the first token and the connect settings.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the client config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientConfigFile {
    /// Where the client should open its websocket
    pub websocket_address: String,
    /// Token the client authenticates with
    pub client_auth_string: String,
}

impl ClientConfigFile {
    /// Build the file contents for `config`
    pub fn new(config: &Config, token: &str) -> Self {
        Self {
            websocket_address: config.websocket_address(),
            client_auth_string: token.to_string(),
        }
    }
}

/// Write `contents` next to `path` and rename it into place
///
/// On Unix the file is made readable by the owner only.
pub(crate) async fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let perm = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = tokio::fs::set_permissions(path, perm).await {
            tracing::debug!(path = %path.display(), error = %e, "could not restrict permissions");
        }
    }

    Ok(())
}

/// Write the client config file as pretty JSON
pub(crate) async fn write_client_config(
    path: &Path,
    contents: &ClientConfigFile,
) -> crate::Result<()> {
    let json = serde_json::to_vec_pretty(contents)?;
    write_secret(path, &json).await.map_err(|e| {
        crate::Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write client config '{}': {}", path.display(), e),
        ))
    })
}

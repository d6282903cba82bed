//! OAuth client credentials file (the JSON a provider console hands out)

use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Client ID / secret pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

impl ClientCredentials {
    /// Load from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse the file contents; a `web` client wins over an `installed` one
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let file: CredentialsFile =
            serde_json::from_str(content).context("Failed to parse credentials JSON")?;

        for section in [file.web, file.installed].into_iter().flatten() {
            if !section.client_id.is_empty() {
                return Ok(Self {
                    client_id: section.client_id,
                    client_secret: section.client_secret,
                });
            }
        }

        bail!("No client credentials found in file")
    }
}

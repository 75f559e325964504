//! Client-side config persisted at `~/.contextcache/config.json`, resolved
//! via the `dirs` crate, written with an owner-only file mode.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
}

impl ClientConfig {
    fn path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?;
        Ok(home.join(".contextcache").join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Resolves effective values: env vars take precedence over the saved file.
    pub fn resolved(&self) -> ResolvedConfig {
        ResolvedConfig {
            api_key: std::env::var("CC_API_KEY").ok().or_else(|| self.api_key.clone()),
            base_url: std::env::var("CC_BASE_URL").ok().or_else(|| self.base_url.clone()).unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            org_id: std::env::var("CC_ORG_ID").ok().or_else(|| self.org_id.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub org_id: Option<String>,
}

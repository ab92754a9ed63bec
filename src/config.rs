use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::db::ConnectionConfig;
use crate::llm::LlmConfig;
use crate::pipeline::{SchemaConfig, ScopeKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: ConnectionConfig,
    pub schema: SchemaConfig,
    pub server: ServerConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: String::from("0.0.0.0:8000"),
        }
    }
}

/// Values given on the command line or through the environment. They win
/// over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub database_url: Option<String>,
    pub ollama_host: Option<String>,
    pub listen: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgask")
            .join("config.toml")
    }

    /// Read `path`, or the default location when none is given. Only an
    /// explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if required {
                bail!("Config file {} does not exist", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(model) = &overrides.model {
            self.llm.model = Some(model.clone());
        }
        if let Some(url) = &overrides.database_url {
            self.database.url = Some(url.clone());
        }
        if let Some(host) = &overrides.ollama_host {
            self.llm.host = host.clone();
        }
        if let Some(listen) = &overrides.listen {
            self.server.listen = listen.clone();
        }
    }

    pub fn model(&self) -> Result<&str> {
        match self.llm.model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => Ok(model),
            _ => bail!("No model configured: set [llm] model, PGASK_MODEL or --model"),
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        match self.database.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!(
                "No database configured: set [database] url, DATABASE_URL or --database-url"
            ),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", self.server.listen))
    }

    /// Settings every command needs: a model and a database.
    pub fn validate(&self) -> Result<()> {
        self.model()?;
        self.database_url()?;
        if self.schema.scope == ScopeKind::Fixed && self.schema.tables.is_empty() {
            bail!("[schema] scope = \"fixed\" needs a non-empty tables list");
        }
        Ok(())
    }
}

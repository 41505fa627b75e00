use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sled,
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Backend> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "sled" => Ok(Backend::Sled),
            other => Err(Error::Validation(format!("unknown backend {:?}", other))),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind: String,
    pub backend: Backend,
    pub db_path: PathBuf,
    /// Open sled in temporary mode, discarding data on shutdown.
    pub temporary: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bind: "127.0.0.1:8080".to_owned(),
            backend: Backend::Memory,
            db_path: PathBuf::from("cinegraph.db"),
            temporary: false,
        }
    }
}

impl Config {
    /// Reads the TOML file named by `CINEGRAPH_CONFIG`, if any, then applies
    /// the `CINEGRAPH_*` environment overrides.
    pub fn load() -> Result<Config> {
        let file = match std::env::var_os("CINEGRAPH_CONFIG") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|err| {
                Error::Validation(format!("cannot read config {:?}: {}", path, err))
            })?),
            None => None,
        };
        Config::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file: Option<&str>, var: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(text) => toml::from_str(text)
                .map_err(|err| Error::Validation(format!("invalid config: {}", err)))?,
            None => Config::default(),
        };
        if let Some(bind) = var("CINEGRAPH_BIND") {
            config.bind = bind;
        }
        if let Some(backend) = var("CINEGRAPH_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(path) = var("CINEGRAPH_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

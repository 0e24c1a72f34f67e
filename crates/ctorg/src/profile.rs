//! connection settings
//!
//! The official CLI keeps its profiles in a `cli.yml`. This module finds that file, picks a
//! profile and turns it into the api base url and key the [crate::http::HttpClient] needs.
//!
//! Precedence for the server: release stage, then an explicit server url, then the profile,
//! then [DEFAULT_SERVER_URL]. An explicit api key beats the profile's.
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "cli.yml";
pub const DEFAULT_SERVER_URL: &str = "https://api.cloudtruth.io";
const API_PATH: &str = "/api/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub profiles: IndexMap<String, Profile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    /// Profile to take missing values from
    #[serde(default)]
    pub source_profile: Option<String>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub server_url: Option<String>,
    pub release_stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub api_base_url: String,
    pub api_key: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("no cli.yml found, searched {}", searched(.paths))]
    ConfigNotFound { paths: Vec<PathBuf> },
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("profile {0:?} not found")]
    UnknownProfile(String),
    #[error("profile {0:?} has no api key")]
    MissingApiKey(String),
}

fn searched(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Unset, empty and the literal "null" all mean absent
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|value| !value.is_empty() && *value != "null")
        .map(ToString::to_string)
}

impl CliConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&yaml).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Values of `name`, gaps filled from its source profile
    pub fn credentials(&self, name: &str) -> Result<Credentials, ProfileError> {
        let Some(profile) = self.profiles.get(name) else {
            return Err(ProfileError::UnknownProfile(name.to_string()));
        };

        let mut credentials = Credentials {
            api_key: present(&profile.api_key),
            server_url: present(&profile.server_url),
        };

        let source = present(&profile.source_profile).and_then(|source| self.profiles.get(&source));
        if let Some(source) = source {
            credentials.api_key = credentials.api_key.or_else(|| present(&source.api_key));
            credentials.server_url = credentials
                .server_url
                .or_else(|| present(&source.server_url));
        }

        Ok(credentials)
    }
}

impl Overrides {
    fn server(&self) -> Option<String> {
        match present(&self.release_stage) {
            Some(stage) => Some(format!("https://api.{stage}.cloudtruth.io")),
            None => present(&self.server_url),
        }
    }
}

/// Combines an optional config file with the overrides
///
/// Without an api key override the profile has to exist and provide a key.
pub fn connection(
    config: Option<&CliConfig>,
    profile: &str,
    overrides: &Overrides,
) -> Result<Connection, ProfileError> {
    let api_key_override = present(&overrides.api_key);

    let credentials = match config.map(|config| config.credentials(profile)) {
        Some(Ok(credentials)) => credentials,
        Some(Err(error)) if api_key_override.is_none() => return Err(error),
        _ => Credentials::default(),
    };

    let Some(api_key) = api_key_override.or(credentials.api_key) else {
        return Err(ProfileError::MissingApiKey(profile.to_string()));
    };

    let server_url = overrides
        .server()
        .or(credentials.server_url)
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    Ok(Connection {
        api_base_url: format!("{}{API_PATH}", server_url.trim_end_matches('/')),
        api_key,
    })
}

/// Where the official CLI may keep its config, most specific first
pub fn candidate_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut paths = vec![];

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("cloudtruth").join(CONFIG_FILE));
    }
    if let Some(home) = &home {
        paths.push(home.join(".config").join("cloudtruth").join(CONFIG_FILE));
        paths.push(
            home.join("Library")
                .join("Application Support")
                .join("com.cloudtruth.CloudTruth-CLI")
                .join(CONFIG_FILE),
        );
    }
    if let Some(app_data) = std::env::var_os("APPDATA") {
        paths.push(
            PathBuf::from(app_data)
                .join("CloudTruth")
                .join("CloudTruth CLI")
                .join("config")
                .join(CONFIG_FILE),
        );
    }

    paths
}

pub fn find_config_file() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|path| path.is_file())
}

/// Finds and reads the config file, then builds the [Connection] for `profile`
pub fn resolve(profile: &str, overrides: &Overrides) -> Result<Connection, ProfileError> {
    let config = match find_config_file() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using config file");
            Some(CliConfig::load(&path)?)
        }
        None if present(&overrides.api_key).is_some() => None,
        None => {
            return Err(ProfileError::ConfigNotFound {
                paths: candidate_paths(),
            })
        }
    };

    connection(config.as_ref(), profile, overrides)
}

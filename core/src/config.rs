use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

/// Default endpoint for local development builds.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Resolved API endpoint configuration.
///
/// Resolution order: `SANA_API_URL` environment variable, then the
/// `api.base_url` entry of `sana.yaml`, else the development default.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("API configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(detail) => {
                format!("API endpoint not usable—{detail}. Update sana.yaml or SANA_API_URL.")
            }
        }
    }
}

impl ApiSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let file = read_config_file()?;
        resolve(std::env::var("SANA_API_URL").ok(), file)
    }
}

fn resolve(
    env_override: Option<String>,
    file: Option<SanaConfig>,
) -> Result<ApiSettings, ConfigError> {
    let raw = env_override
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            file.and_then(|config| config.api)
                .and_then(|api| api.base_url)
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    Ok(ApiSettings {
        base_url: normalize_base_url(&raw)?,
    })
}

/// Validates the endpoint and strips any trailing slash so clients can
/// append absolute paths.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ConfigError::Invalid(format!("invalid base URL `{raw}`: {err}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Invalid(format!(
            "base URL `{raw}` must use http or https"
        )));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn read_config_file() -> Result<Option<SanaConfig>, ConfigError> {
    let Some(path) = locate_config_file() else {
        return Ok(None);
    };
    let contents = fs::read_to_string(&path).map_err(|err| {
        ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
    })?;
    let config = serde_yaml::from_str(&contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid sana.yaml: {err}")))?;
    Ok(Some(config))
}

fn locate_config_file() -> Option<PathBuf> {
    sana_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn sana_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("sana");
        paths.push(config_dir.join("sana.yaml"));
        paths.push(config_dir.join("sana.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".sana").join("sana.yaml"));
        paths.push(home_dir.join(".sana").join("sana.yml"));
    } else {
        paths.push(PathBuf::from("sana.yaml"));
        paths.push(PathBuf::from("sana.yml"));
    }
    paths
}

#[derive(Debug, Deserialize)]
struct SanaConfig {
    api: Option<ApiSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSection {
    #[serde(default)]
    base_url: Option<String>,
}

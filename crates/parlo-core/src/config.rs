use std::path::PathBuf;

use crate::errors::ParloError;

/// Static client configuration, fixed for the process lifetime.
///
/// Shells construct this from build-time values; `from_env` exists for
/// desktop smoke runs and test harnesses.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root, e.g. `https://api.parlo.example`. No trailing slash.
    pub api_base_url: String,
    /// Directory for persisted local state (settings, file-backed credentials).
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let mut api_base_url = api_base_url.into();
        while api_base_url.ends_with('/') {
            api_base_url.pop();
        }
        Self {
            api_base_url,
            data_dir: data_dir.into(),
        }
    }

    /// Read `PARLO_API_BASE_URL` and `PARLO_DATA_DIR` from the environment.
    pub fn from_env() -> Result<Self, ParloError> {
        let api_base_url = std::env::var("PARLO_API_BASE_URL")
            .map_err(|_| ParloError::Validation("PARLO_API_BASE_URL is not set".into()))?;
        let data_dir = std::env::var("PARLO_DATA_DIR")
            .map_err(|_| ParloError::Validation("PARLO_DATA_DIR is not set".into()))?;
        Ok(Self::new(api_base_url, data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped() {
        let config = ClientConfig::new("https://api.parlo.example/", "/tmp/parlo");
        assert_eq!(config.api_base_url, "https://api.parlo.example");

        let config = ClientConfig::new("https://api.parlo.example//", "/tmp/parlo");
        assert_eq!(config.api_base_url, "https://api.parlo.example");
    }

    #[test]
    fn bare_url_is_kept() {
        let config = ClientConfig::new("http://127.0.0.1:8000", "/tmp/parlo");
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for the ledger store. Memory store when unset.
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub token: TokenConfig,
}

/// Bearer token settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    pub kind: TokenKind,
    /// JWT: at least 32 bytes. PASETO: exactly 32 bytes.
    pub symmetric_key: String,
    #[serde(default = "default_access_token_duration_secs")]
    pub access_token_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Jwt,
    Paseto,
}

fn default_access_token_duration_secs() -> u64 {
    15 * 60
}

impl TokenConfig {
    pub fn access_token_duration(&self) -> Result<chrono::Duration> {
        i64::try_from(self.access_token_duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| {
                format!(
                    "access_token_duration_secs out of range: {}",
                    self.access_token_duration_secs
                )
            })
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
log_level: debug
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
token:
  kind: paseto
  symmetric_key: "12345678901234567890123456789012"
"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.postgres_url.is_none());
        assert_eq!(config.token.kind, TokenKind::Paseto);
        assert_eq!(config.token.access_token_duration_secs, 900);
        assert_eq!(
            config.token.access_token_duration().unwrap(),
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn test_access_token_duration_out_of_range() {
        let mut token = TokenConfig {
            kind: TokenKind::Jwt,
            symmetric_key: "12345678901234567890123456789012".to_string(),
            access_token_duration_secs: u64::MAX,
        };
        let err = token.access_token_duration().unwrap_err();
        assert!(err.to_string().contains("out of range"));

        // Fits in i64 but not in a chrono duration
        token.access_token_duration_secs = i64::MAX as u64;
        assert!(token.access_token_duration().is_err());

        token.access_token_duration_secs = 60;
        assert_eq!(
            token.access_token_duration().unwrap(),
            chrono::Duration::minutes(1)
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::from_file("does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_token_kind_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.replace("paseto", "rsa").as_bytes())
            .unwrap();

        assert!(AppConfig::from_file(file.path()).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use anyhow::Result;
use regex::Regex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub connection_string: Option<String>,
    /// Overrides the endpoint derived from the connection string.
    #[serde(default)]
    pub account_url: Option<String>,
    #[serde(default = "default_source_container")]
    pub source_container: String,
    #[serde(default = "default_target_container")]
    pub target_container: String,
    #[serde(default)]
    pub source_sas_token: String,
    #[serde(default)]
    pub target_sas_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub key: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// How long a submitted job is remembered per target blob. 0 disables it.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to this file, without ANSI colours.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_source_container() -> String {
    "source-docs".to_string()
}

fn default_target_container() -> String {
    "translated-docs".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_dedup_ttl_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

impl Config {
    /// Load a YAML or JSON config file, substituting `${VAR}` placeholders
    /// from the environment.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let content = substitute_env_vars(&content);

        let path_lower = path.to_lowercase();
        let config: Config = if path_lower.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_or = |name: &str, default: u64| -> Result<u64> {
            match lookup(name) {
                Some(v) => v
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
                None => Ok(default),
            }
        };

        let config = Config {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(default_host),
                port: u16::try_from(parse_or("PORT", default_port() as u64)?)
                    .map_err(|_| anyhow::anyhow!("Invalid value for PORT: out of range"))?,
                max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", default_max_upload_bytes() as u64)?
                    as usize,
            },
            storage: StorageConfig {
                connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING"),
                account_url: lookup("AZURE_STORAGE_ACCOUNT_URL"),
                source_container: lookup("AZURE_SOURCE_CONTAINER")
                    .unwrap_or_else(default_source_container),
                target_container: lookup("AZURE_TARGET_CONTAINER")
                    .unwrap_or_else(default_target_container),
                source_sas_token: lookup("SOURCE_SAS_TOKEN").unwrap_or_default(),
                target_sas_token: lookup("TARGET_SAS_TOKEN").unwrap_or_default(),
                timeout_secs: parse_or("STORAGE_TIMEOUT_SECS", default_timeout_secs())?,
            },
            translator: TranslatorConfig {
                endpoint: lookup("AZURE_TRANSLATOR_ENDPOINT").unwrap_or_default(),
                key: lookup("AZURE_TRANSLATOR_KEY").unwrap_or_default(),
                region: lookup("AZURE_TRANSLATOR_REGION").unwrap_or_default(),
                timeout_secs: parse_or("TRANSLATOR_TIMEOUT_SECS", default_timeout_secs())?,
            },
            submission: SubmissionConfig {
                dedup_ttl_secs: parse_or("DEDUP_TTL_SECS", default_dedup_ttl_secs())?,
            },
            logging: LoggingConfig {
                file: lookup("LOG_FILE").filter(|f| !f.trim().is_empty()),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.translator.endpoint.trim().is_empty() {
            anyhow::bail!("Translator endpoint is not configured");
        }
        if self.translator.key.trim().is_empty() {
            anyhow::bail!("Translator subscription key is not configured");
        }
        if self.storage.source_container.is_empty() || self.storage.target_container.is_empty() {
            anyhow::bail!("Storage container names must not be empty");
        }

        let substituted = [
            ("storage.connection_string", self.storage.connection_string.as_deref()),
            ("storage.account_url", self.storage.account_url.as_deref()),
            ("storage.source_container", Some(self.storage.source_container.as_str())),
            ("storage.target_container", Some(self.storage.target_container.as_str())),
            ("storage.source_sas_token", Some(self.storage.source_sas_token.as_str())),
            ("storage.target_sas_token", Some(self.storage.target_sas_token.as_str())),
            ("translator.endpoint", Some(self.translator.endpoint.as_str())),
            ("translator.key", Some(self.translator.key.as_str())),
            ("translator.region", Some(self.translator.region.as_str())),
            ("logging.file", self.logging.file.as_deref()),
        ];
        for (field, value) in substituted {
            if value.is_some_and(|v| v.contains("${")) {
                anyhow::bail!("{} has an unresolved ${{...}} placeholder", field);
            }
        }
        Ok(())
    }
}

/// Replace `${VAR_NAME}` with the variable's value; unset variables are left as-is.
fn substitute_env_vars(content: &str) -> String {
    let pattern = Regex::new(r"\$\{(\w+)\}").expect("static pattern");
    pattern
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

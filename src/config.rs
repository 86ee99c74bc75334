use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.9
}

fn default_top_p() -> f32 {
    0.8
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which wire format the completion endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `{prompt}` in, `{text}` or `{error}` out.
    Relay,
    /// Google Generative Language `generateContent`.
    Gemini,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub backend: Backend,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            backend: Backend::Gemini,
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: None,
        }
    }
}

impl CompletionConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 960,
            height: 720,
            min_width: 480,
            min_height: 360,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Overrides the default database location.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| Config::get_config_dir().join("storage.sqlite"))
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(
                        path = %config_path.display(),
                        error = %e,
                        "error parsing config.toml, using defaults"
                    ),
                },
                Err(e) => tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "error reading config.toml, using defaults"
                ),
            }
        } else if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::debug!(error = %e, "could not create config directory");
            }
        }

        Config::default()
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/turbo-dash")
        } else {
            PathBuf::from(".")
        }
    }
}

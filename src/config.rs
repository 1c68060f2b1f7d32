use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::services::PhotoSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub photos: PhotoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoConfig {
    pub upload_folder: String,
    pub allowed_extensions: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database: DatabaseConfig {
                url: var("DATABASE_URL", "sqlite:data/user_records.db"),
                max_connections: var("DATABASE_MAX_CONNECTIONS", "5")
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            },
            server: ServerConfig {
                host: var("SERVER_HOST", "0.0.0.0"),
                port: var("SERVER_PORT", "8000")
                    .parse()
                    .context("SERVER_PORT must be a port number")?,
            },
            photos: PhotoConfig {
                upload_folder: var("UPLOAD_FOLDER", "./users/photos/"),
                allowed_extensions: var("ALLOWED_EXTENSIONS", "png,jpg,jpeg")
                    .split(',')
                    .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .collect(),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn photo_settings(&self) -> PhotoSettings {
        PhotoSettings {
            upload_folder: PathBuf::from(&self.photos.upload_folder),
            allowed_extensions: self.photos.allowed_extensions.clone(),
        }
    }
}

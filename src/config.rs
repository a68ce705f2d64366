use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// `host:port` as MinIO expects it, or a full URL.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub bucket: String,
    pub region: String,
    /// Base that public object URLs are built on.
    pub public_url: String,
}

impl S3Config {
    pub fn endpoint_url(&self) -> String {
        endpoint_url(&self.endpoint, self.use_ssl)
    }
}

fn endpoint_url(endpoint: &str, use_ssl: bool) -> String {
    if endpoint.contains("://") {
        return endpoint.trim_end_matches('/').to_string();
    }
    let scheme = if use_ssl { "https" } else { "http" };
    format!("{}://{}", scheme, endpoint.trim_end_matches('/'))
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub s3: S3Config,
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{} is not set", key));

        if let Some(driver) = get("DB_DRIVER") {
            if !matches!(driver.as_str(), "postgres" | "postgresql") {
                anyhow::bail!("unsupported DB_DRIVER {:?}, only postgres is available", driver);
            }
        }

        let database_url = get("DATABASE_URL")
            .or_else(|| get("DB_DSN"))
            .context("DATABASE_URL (or DB_DSN) is not set")?;

        let port = match get("SERVER_PORT").or_else(|| get("APP_PORT")) {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("invalid server port {:?}", p))?,
            None => 8080,
        };

        let use_ssl = get("MINIO_USE_SSL").as_deref() == Some("true");
        let endpoint = require("MINIO_ENDPOINT")?;
        let public_url = get("MINIO_PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint_url(&endpoint, use_ssl));

        let s3 = S3Config {
            access_key: require("MINIO_ACCESS_KEY_ID")?,
            secret_key: require("MINIO_SECRET_ACCESS_KEY")?,
            bucket: require("MINIO_BUCKET")?,
            region: get("MINIO_REGION").unwrap_or_else(|| "us-east-1".into()),
            endpoint,
            use_ssl,
            public_url,
        };

        Ok(Self {
            database_url,
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            s3,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        })
    }
}

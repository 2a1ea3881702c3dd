//! Service configuration.
//!
//! Built once at startup from environment variables and passed down
//! explicitly. Parsing goes through a lookup function so tests can use
//! fixed maps instead of mutating the process environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::schema::Strategy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: usize = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// One Document AI processor (location + id within the project).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub location: String,
    pub processor_id: String,
}

/// Where the bearer token for Document AI comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    KeyFile(PathBuf),
    AccessToken(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: String,
    /// OCR processor used by the scan strategy.
    pub scan_processor: Option<ProcessorConfig>,
    /// Custom extractor used by the structured strategy.
    pub structured_processor: Option<ProcessorConfig>,
    pub credentials: CredentialSource,
    pub endpoint: Option<String>,
    pub default_strategy: Strategy,
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub upstream_timeout: Duration,
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = get("GOOGLE_CLOUD_PROJECT").context("GOOGLE_CLOUD_PROJECT not set")?;

        let scan_processor = processor_pair(
            get("GOOGLE_CLOUD_LOCATION"),
            get("GOOGLE_CLOUD_PROCESSOR_ID"),
            "GOOGLE_CLOUD_LOCATION",
            "GOOGLE_CLOUD_PROCESSOR_ID",
        )?;
        let structured_processor = processor_pair(
            get("GOOGLE_CLOUD_LOCATION_GENIA"),
            get("GOOGLE_CLOUD_PROCESSOR_ID__GENIA"),
            "GOOGLE_CLOUD_LOCATION_GENIA",
            "GOOGLE_CLOUD_PROCESSOR_ID__GENIA",
        )?;

        if scan_processor.is_none() && structured_processor.is_none() {
            anyhow::bail!(
                "No Document AI processor configured: set GOOGLE_CLOUD_LOCATION/GOOGLE_CLOUD_PROCESSOR_ID \
                 or GOOGLE_CLOUD_LOCATION_GENIA/GOOGLE_CLOUD_PROCESSOR_ID__GENIA"
            );
        }

        let credentials = match (get("GOOGLE_ACCESS_TOKEN"), get("GOOGLE_APPLICATION_CREDENTIALS")) {
            (Some(token), _) => CredentialSource::AccessToken(token),
            (None, Some(path)) => CredentialSource::KeyFile(PathBuf::from(path)),
            (None, None) => anyhow::bail!(
                "GOOGLE_APPLICATION_CREDENTIALS not set (or provide GOOGLE_ACCESS_TOKEN)"
            ),
        };

        let default_strategy = match get("EXTRACTION_STRATEGY") {
            Some(s) => Strategy::from_str(&s)
                .with_context(|| format!("Unknown EXTRACTION_STRATEGY: {} (scan|structured)", s))?,
            None => Strategy::Scan,
        };

        let has_default = match default_strategy {
            Strategy::Scan => scan_processor.is_some(),
            Strategy::Structured => structured_processor.is_some(),
        };
        if !has_default {
            anyhow::bail!(
                "EXTRACTION_STRATEGY is '{}' but no processor is configured for it",
                default_strategy
            );
        }

        Ok(Self {
            project_id,
            scan_processor,
            structured_processor,
            credentials,
            endpoint: get("DOCUMENTAI_ENDPOINT"),
            default_strategy,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            upload_dir: PathBuf::from(
                get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?,
            upstream_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                get("UPSTREAM_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )?),
            max_retries: parse_or("UPSTREAM_MAX_RETRIES", get("UPSTREAM_MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
            retry_backoff_ms: parse_or(
                "UPSTREAM_RETRY_BACKOFF_MS",
                get("UPSTREAM_RETRY_BACKOFF_MS"),
                DEFAULT_RETRY_BACKOFF_MS,
            )?,
        })
    }
}

fn processor_pair(
    location: Option<String>,
    processor_id: Option<String>,
    location_var: &str,
    id_var: &str,
) -> Result<Option<ProcessorConfig>> {
    match (location, processor_id) {
        (Some(location), Some(processor_id)) => Ok(Some(ProcessorConfig {
            location,
            processor_id,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => anyhow::bail!("{} is set but {} is missing", location_var, id_var),
        (None, Some(_)) => anyhow::bail!("{} is set but {} is missing", id_var, location_var),
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, v)),
        None => Ok(default),
    }
}

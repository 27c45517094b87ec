use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Where the food log is persisted.
#[derive(Debug, Clone)]
pub enum SlotConfig {
    Postgres { database_url: String, name: String },
    File { path: String },
}

/// Timezone that decides which calendar day an instant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The system timezone; DST is resolved separately for every instant.
    System,
    /// Explicit override from `LOCAL_UTC_OFFSET`.
    Fixed(FixedOffset),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slot: SlotConfig,
    pub gemini: GeminiConfig,
    pub object_store: Option<ObjectStoreConfig>,
    pub local_zone: LocalZone,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let slot = match std::env::var("DATABASE_URL") {
            Ok(database_url) => SlotConfig::Postgres {
                database_url,
                name: std::env::var("LOG_SLOT").unwrap_or_else(|_| "snapcal_log".into()),
            },
            Err(_) => SlotConfig::File {
                path: std::env::var("LOG_FILE").unwrap_or_else(|_| "snapcal_log.json".into()),
            },
        };

        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            timeout_secs: std::env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };

        // all four or nothing
        let object_store = match std::env::var("MINIO_ENDPOINT") {
            Ok(endpoint) => Some(ObjectStoreConfig {
                endpoint,
                bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET")?,
                access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
                secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
                region: "us-east-1".into(),
            }),
            Err(_) => None,
        };

        let local_zone = match std::env::var("LOCAL_UTC_OFFSET") {
            Ok(raw) => LocalZone::Fixed(parse_offset(&raw)?),
            Err(_) => LocalZone::System,
        };

        Ok(Self {
            slot,
            gemini,
            object_store,
            local_zone,
        })
    }
}

/// Parses `+HH:MM` / `-HH:MM`, or `Z` for UTC.
pub fn parse_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let raw = raw.trim();
    let offset = if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        UtcOffset::UTC
    } else {
        UtcOffset::parse(
            raw,
            format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
        )
        .with_context(|| format!("invalid LOCAL_UTC_OFFSET {raw:?}"))?
    };
    FixedOffset::east_opt(offset.whole_seconds())
        .with_context(|| format!("LOCAL_UTC_OFFSET {raw:?} out of range"))
}

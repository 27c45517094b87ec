use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use crate::analysis::{FoodAnalyzer, GeminiAnalyzer};
use crate::config::{AppConfig, LocalZone, SlotConfig};
use crate::entries::repo::{FileSlot, LogSlot, PgSlot};
use crate::entries::store::FoodLogStore;
use crate::session::{AnalysisGate, Journal};
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub journal: Arc<Mutex<Journal>>,
    pub gate: AnalysisGate,
    pub analyzer: Arc<dyn FoodAnalyzer>,
    pub storage: Option<Arc<dyn StorageClient>>,
    pub local_zone: LocalZone,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let slot: Arc<dyn LogSlot> = match &config.slot {
            SlotConfig::Postgres { database_url, name } => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgSlot::new(db, name.clone()))
            }
            SlotConfig::File { path } => {
                tracing::info!(%path, "using file slot for the food log");
                Arc::new(FileSlot::new(path))
            }
        };

        let storage = match &config.object_store {
            Some(cfg) => Some(Arc::new(Storage::new(cfg).await?) as Arc<dyn StorageClient>),
            None => {
                tracing::info!("no object store configured; images stay inline");
                None
            }
        };

        let analyzer = Arc::new(GeminiAnalyzer::new(&config.gemini)?) as Arc<dyn FoodAnalyzer>;
        let journal = Journal::open(FoodLogStore::new(slot)).await;
        tracing::info!(zone = ?config.local_zone, "local calendar day");

        Ok(Self::from_parts(journal, analyzer, storage, config.local_zone))
    }

    pub fn from_parts(
        journal: Journal,
        analyzer: Arc<dyn FoodAnalyzer>,
        storage: Option<Arc<dyn StorageClient>>,
        local_zone: LocalZone,
    ) -> Self {
        Self {
            journal: Arc::new(Mutex::new(journal)),
            gate: AnalysisGate::default(),
            analyzer,
            storage,
            local_zone,
        }
    }
}

#[cfg(test)]
pub mod fake {
    use std::path::Path;

    use async_trait::async_trait;
    use chrono::FixedOffset;

    use super::*;
    use crate::analysis::{parse_estimate, AnalysisError, NutritionEstimate};
    use crate::images::services::CapturedImage;
    use crate::storage::fake::FakeStorage;

    /// Replies with a canned payload, optionally after waiting for a signal.
    pub struct FakeAnalyzer {
        pub reply: String,
        pub release: Option<Arc<tokio::sync::Notify>>,
    }

    impl FakeAnalyzer {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                release: None,
            }
        }
    }

    #[async_trait]
    impl FoodAnalyzer for FakeAnalyzer {
        async fn analyze(&self, _image: &CapturedImage) -> Result<NutritionEstimate, AnalysisError> {
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.reply.is_empty() {
                return Err(AnalysisError::Transport("connection refused".into()));
            }
            parse_estimate(&self.reply)
        }
    }

    pub async fn fake_state(
        dir: &Path,
        analyzer: FakeAnalyzer,
        storage: Option<Arc<FakeStorage>>,
    ) -> AppState {
        let slot = Arc::new(FileSlot::new(dir.join("snapcal_log.json"))) as Arc<dyn LogSlot>;
        let journal = Journal::open(FoodLogStore::new(slot)).await;
        AppState::from_parts(
            journal,
            Arc::new(analyzer),
            storage.map(|s| s as Arc<dyn StorageClient>),
            LocalZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        )
    }
}

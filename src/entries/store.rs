use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use super::model::FoodLog;
use super::repo::LogSlot;

/// Loads and persists the food log through a durable slot.
#[derive(Clone)]
pub struct FoodLogStore {
    slot: Arc<dyn LogSlot>,
}

impl FoodLogStore {
    pub fn new(slot: Arc<dyn LogSlot>) -> Self {
        Self { slot }
    }

    /// Never fails: a missing, unreadable or unparsable slot yields an empty log.
    pub async fn load(&self) -> FoodLog {
        let payload = match self.slot.read().await {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!("no persisted food log, starting empty");
                return FoodLog::default();
            }
            Err(e) => {
                warn!(error = %e, "failed to read persisted food log; starting empty");
                return FoodLog::default();
            }
        };

        match serde_json::from_str::<FoodLog>(&payload) {
            Ok(log) => {
                debug!(entries = log.len(), "food log loaded");
                log
            }
            Err(e) => {
                warn!(error = %e, "persisted food log is corrupt; starting empty");
                FoodLog::default()
            }
        }
    }

    /// Full overwrite of the slot with `log`.
    pub async fn persist(&self, log: &FoodLog) -> anyhow::Result<()> {
        let payload = serde_json::to_string(log).context("serialize food log")?;
        self.slot.write(&payload).await?;
        debug!(entries = log.len(), "food log persisted");
        Ok(())
    }
}

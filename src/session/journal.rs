use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::entries::model::{FoodEntry, FoodLog};
use crate::entries::store::FoodLogStore;

/// Screen the client is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppView {
    #[default]
    Dashboard,
    Scanner,
    History,
    Settings,
}

/// Owned application state: the food log and the current view.
///
/// Each mutation persists the full log before the in-memory copy is
/// replaced, so durable state never runs ahead of memory.
pub struct Journal {
    store: FoodLogStore,
    log: FoodLog,
    view: AppView,
}

impl Journal {
    pub async fn open(store: FoodLogStore) -> Self {
        let log = store.load().await;
        info!(entries = log.len(), "journal opened");
        Self {
            store,
            log,
            view: AppView::default(),
        }
    }

    pub fn log(&self) -> &FoodLog {
        &self.log
    }

    pub fn view(&self) -> AppView {
        self.view
    }

    pub fn set_view(&mut self, view: AppView) {
        self.view = view;
    }

    pub async fn record(&mut self, entry: FoodEntry) -> anyhow::Result<()> {
        let id = entry.id;
        let next = self.log.clone().append(entry)?;
        self.commit(next).await?;
        info!(%id, entries = self.log.len(), "food entry recorded");
        Ok(())
    }

    /// Empties the log and hands back what was discarded.
    pub async fn reset(&mut self) -> anyhow::Result<FoodLog> {
        let previous = self.log.clone();
        self.commit(previous.clone().clear()).await?;
        info!(discarded = previous.len(), "food log reset");
        Ok(previous)
    }

    async fn commit(&mut self, next: FoodLog) -> anyhow::Result<()> {
        if let Err(e) = self.store.persist(&next).await {
            error!(error = %e, "persist failed; in-memory log unchanged");
            return Err(e);
        }
        self.log = next;
        Ok(())
    }
}

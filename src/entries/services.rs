use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use super::model::{unix_millis, FoodEntry, FoodLog};
use crate::analysis::AnalysisError;
use crate::images::services::{delete_entry_images, upload_entry_image, CapturedImage};
use crate::session::{AppView, GateError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Busy(#[from] GateError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("failed to record entry: {0}")]
    Record(anyhow::Error),
}

/// Analyses one capture and appends the result to the log.
///
/// The work runs on its own task, so a caller that goes away does not
/// cancel an analysis already in flight; its result is still recorded.
pub async fn scan_and_log(state: &AppState, image: CapturedImage) -> Result<FoodEntry, ScanError> {
    let ticket = state.gate.try_begin()?;
    let id = Uuid::new_v4();
    let captured_at = unix_millis(OffsetDateTime::now_utc());

    let st = state.clone();
    let task = tokio::spawn(async move {
        let _ticket = ticket;
        let estimate = st.analyzer.analyze(&image).await.map_err(|e| {
            error!(error = %e, %id, "analysis failed");
            ScanError::Analysis(e)
        })?;

        let image_url = match &st.storage {
            Some(storage) => upload_entry_image(storage.as_ref(), id, &image)
                .await
                .map_err(ScanError::Record)?,
            None => image.to_data_uri(),
        };

        let entry = FoodEntry::from_estimate(id, captured_at, estimate, Some(image_url));
        let mut journal = st.journal.lock().await;
        journal.record(entry.clone()).await.map_err(ScanError::Record)?;
        journal.set_view(AppView::Dashboard);
        Ok::<_, ScanError>(entry)
    });

    match task.await {
        Ok(result) => result,
        Err(e) => Err(ScanError::Record(anyhow::anyhow!("scan task aborted: {e}"))),
    }
}

/// Discards every entry, then best-effort removes their stored images.
pub async fn reset_log(state: &AppState) -> anyhow::Result<FoodLog> {
    let discarded = state.journal.lock().await.reset().await?;
    if discarded.is_empty() {
        return Ok(discarded);
    }
    if let Some(storage) = &state.storage {
        let deleted = delete_entry_images(storage.as_ref(), discarded.entries()).await;
        info!(deleted, "entry images removed");
    }
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::entries::model::Confidence;
    use crate::state::fake::{fake_state, FakeAnalyzer};
    use crate::storage::fake::FakeStorage;

    const BANANA: &str = r#"{"name":"Banana","calories":105,
        "macros":{"protein":1.3,"carbs":27,"fat":0.4},"confidence":"high"}"#;

    fn capture() -> CapturedImage {
        CapturedImage::from_bytes(Bytes::from_static(b"\xff\xd8jpeg"), Some("image/jpeg")).unwrap()
    }

    #[tokio::test]
    async fn successful_scan_appends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = fake_state(dir.path(), FakeAnalyzer::replying(BANANA), None).await;
        state.journal.lock().await.set_view(AppView::Scanner);

        let before = unix_millis(OffsetDateTime::now_utc());
        let entry = scan_and_log(&state, capture()).await.unwrap();
        assert_eq!(entry.name, "Banana");
        assert_eq!(entry.confidence, Some(Confidence::High));
        assert!(entry.timestamp >= before);
        assert!(entry.image_url.as_deref().unwrap().starts_with("data:image/jpeg;base64,"));

        let journal = state.journal.lock().await;
        assert_eq!(journal.log().last(), Some(&entry));
        assert_eq!(journal.view(), AppView::Dashboard);
        drop(journal);

        let reopened = fake_state(dir.path(), FakeAnalyzer::replying(BANANA), None).await;
        assert_eq!(reopened.journal.lock().await.log().len(), 1);
        assert_eq!(state.gate.phase(), crate::session::AnalysisPhase::Idle);
    }

    #[tokio::test]
    async fn malformed_estimate_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reply = r#"{"name":"","macros":{"protein":0,"carbs":0,"fat":0}}"#;
        let state = fake_state(dir.path(), FakeAnalyzer::replying(reply), None).await;

        let err = scan_and_log(&state, capture()).await.unwrap_err();
        assert!(matches!(err, ScanError::Analysis(AnalysisError::Invalid(_))));
        assert!(state.journal.lock().await.log().is_empty());
        assert!(state.gate.try_begin().is_ok());
    }

    #[tokio::test]
    async fn transport_failure_reopens_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let state = fake_state(dir.path(), FakeAnalyzer::replying(""), None).await;

        let err = scan_and_log(&state, capture()).await.unwrap_err();
        assert!(matches!(err, ScanError::Analysis(AnalysisError::Transport(_))));
        assert!(state.gate.try_begin().is_ok());
    }

    #[tokio::test]
    async fn overlapping_scan_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(tokio::sync::Notify::new());
        let analyzer = FakeAnalyzer {
            reply: BANANA.into(),
            release: Some(release.clone()),
        };
        let state = fake_state(dir.path(), analyzer, None).await;

        let first = {
            let st = state.clone();
            tokio::spawn(async move { scan_and_log(&st, capture()).await })
        };
        while state.gate.phase() != crate::session::AnalysisPhase::Analyzing {
            tokio::task::yield_now().await;
        }

        let err = scan_and_log(&state, capture()).await.unwrap_err();
        assert!(matches!(err, ScanError::Busy(GateError::Busy)));

        release.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(state.journal.lock().await.log().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_scan_still_records_its_result() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(tokio::sync::Notify::new());
        let analyzer = FakeAnalyzer {
            reply: BANANA.into(),
            release: Some(release.clone()),
        };
        let state = fake_state(dir.path(), analyzer, None).await;

        let caller = {
            let st = state.clone();
            tokio::spawn(async move { scan_and_log(&st, capture()).await })
        };
        while state.gate.phase() != crate::session::AnalysisPhase::Analyzing {
            tokio::task::yield_now().await;
        }
        caller.abort();
        let _ = caller.await;

        release.notify_one();
        while state.gate.phase() != crate::session::AnalysisPhase::Idle {
            tokio::task::yield_now().await;
        }
        assert_eq!(state.journal.lock().await.log().len(), 1);
    }

    #[tokio::test]
    async fn stored_images_are_uploaded_then_removed_on_reset() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FakeStorage::default());
        let state = fake_state(dir.path(), FakeAnalyzer::replying(BANANA), Some(storage.clone())).await;

        let entry = scan_and_log(&state, capture()).await.unwrap();
        let key = entry.image_url.clone().unwrap();
        assert_eq!(key, format!("entries/{}.jpg", entry.id));
        assert!(storage.contains(&key));

        let discarded = reset_log(&state).await.unwrap();
        assert_eq!(discarded.len(), 1);
        assert!(!storage.contains(&key));
        assert!(state.journal.lock().await.log().is_empty());
    }

    #[tokio::test]
    async fn reset_of_empty_log_discards_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FakeStorage::default());
        let state = fake_state(dir.path(), FakeAnalyzer::replying(BANANA), Some(storage)).await;

        let discarded = reset_log(&state).await.unwrap();
        assert!(discarded.is_empty());
        assert!(state.journal.lock().await.log().is_empty());
    }
}

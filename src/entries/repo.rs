use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

/// One named durable slot holding the whole serialized food log.
#[async_trait]
pub trait LogSlot: Send + Sync {
    /// `None` when nothing has ever been written.
    async fn read(&self) -> anyhow::Result<Option<String>>;
    /// Overwrites whatever the slot held before.
    async fn write(&self, payload: &str) -> anyhow::Result<()>;
}

/// Slot backed by a single JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LogSlot for FileSlot {
    async fn read(&self) -> anyhow::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read slot {}", self.path.display())),
        }
    }

    async fn write(&self, payload: &str) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create slot dir {}", dir.display()))?;
        }
        // write-then-rename so a crash never leaves half a log behind
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, payload)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} into place", tmp.display()))?;
        Ok(())
    }
}

/// Slot stored as one row of the `log_slots` table.
#[derive(Clone)]
pub struct PgSlot {
    db: PgPool,
    name: String,
}

impl PgSlot {
    pub fn new(db: PgPool, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }
}

#[async_trait]
impl LogSlot for PgSlot {
    async fn read(&self) -> anyhow::Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT payload
              FROM log_slots
             WHERE name = $1
            "#,
        )
        .bind(&self.name)
        .fetch_optional(&self.db)
        .await
        .context("select log slot")?;
        Ok(row.map(|(payload,)| payload))
    }

    async fn write(&self, payload: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO log_slots (name, payload, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            "#,
        )
        .bind(&self.name)
        .bind(payload)
        .execute(&self.db)
        .await
        .context("upsert log slot")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("absent.json"));
        assert_eq!(slot.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_overwrites_previous_payload() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested/log.json"));
        slot.write("[1]").await.unwrap();
        slot.write("[]").await.unwrap();
        assert_eq!(slot.read().await.unwrap().as_deref(), Some("[]"));
        assert!(!slot.tmp_path().exists());
    }
}

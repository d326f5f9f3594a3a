//! Persisted redelivery attempt counters.
//!
//! A persistent delivery policy records, per message id, how many times the
//! message has been sent without a successful acknowledgment. The counters
//! must survive a process restart, so every mutation rewrites the backing
//! file. Entries keep insertion order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::Mutex;

/// File-backed (message id, attempt count) store.
pub struct RedeliveryService {
    path: PathBuf,
    deliveries: Mutex<Vec<(String, u32)>>,
}

impl RedeliveryService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads counters from the backing file. Missing file means no counters.
    pub async fn load(&self) -> Result<()> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading redelivery file {}", self.path.display()))?;

        for line in raw.lines().filter(|l| !l.is_empty()) {
            let (id, count) = line
                .split_once('\t')
                .with_context(|| format!("malformed redelivery entry: {line:?}"))?;
            deliveries.push((id.to_string(), count.parse()?));
        }

        Ok(())
    }

    /// Sets the attempt count for a message id, inserting it if unseen.
    pub async fn set(&self, message_id: &str, count: u32) -> Result<()> {
        let mut deliveries = self.deliveries.lock().await;
        match deliveries.iter_mut().find(|(id, _)| id == message_id) {
            Some(entry) => entry.1 = count,
            None => deliveries.push((message_id.to_string(), count)),
        }
        self.flush(&deliveries).await
    }

    /// Removes the counter for a message id, usually on successful delivery.
    pub async fn remove(&self, message_id: &str) -> Result<()> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries.retain(|(id, _)| id != message_id);
        self.flush(&deliveries).await
    }

    /// Current attempt count for a message id.
    pub async fn attempt_count(&self, message_id: &str) -> u32 {
        self.deliveries
            .lock()
            .await
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// All counters in insertion order.
    pub async fn get_deliveries(&self) -> Vec<(String, u32)> {
        self.deliveries.lock().await.clone()
    }

    /// Drops every counter and truncates the backing file.
    pub async fn clear(&self) -> Result<()> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries.clear();
        self.flush(&deliveries).await
    }

    /// Deletes the backing file.
    pub async fn delete(&self) -> Result<()> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries.clear();
        if self.path.exists() {
            tokio::fs::remove_file(&self.path)
                .await
                .with_context(|| format!("deleting redelivery file {}", self.path.display()))?;
        }
        Ok(())
    }

    async fn flush(&self, deliveries: &[(String, u32)]) -> Result<()> {
        let mut contents = String::new();
        for (id, count) in deliveries {
            contents.push_str(id);
            contents.push('\t');
            contents.push_str(&count.to_string());
            contents.push('\n');
        }
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("writing redelivery file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("relaymq-{tag}-{}.delivery", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn counters_survive_reload() {
        let path = temp_path("reload");
        let service = RedeliveryService::new(&path);
        service.set("msg1", 1).await.unwrap();
        service.set("msg2", 3).await.unwrap();

        let reloaded = RedeliveryService::new(&path);
        reloaded.load().await.unwrap();
        assert_eq!(
            reloaded.get_deliveries().await,
            vec![("msg1".to_string(), 1), ("msg2".to_string(), 3)]
        );

        service.delete().await.unwrap();
    }

    #[tokio::test]
    async fn set_overwrites_existing_counter() {
        let path = temp_path("overwrite");
        let service = RedeliveryService::new(&path);
        service.set("msg1", 1).await.unwrap();
        service.set("msg1", 2).await.unwrap();

        let deliveries = service.get_deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0], ("msg1".to_string(), 2));

        service.delete().await.unwrap();
    }
}

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Observer notified after every successful mutation. Keeps backup policy out
/// of the booking logic: the app only announces "the store file changed".
pub trait SnapshotSync: Send + Sync {
    fn after_mutation(&self, store_file: &Path);
}

/// Used when no remote storage is configured.
pub struct NoopSync;

impl SnapshotSync for NoopSync {
    fn after_mutation(&self, _store_file: &Path) {}
}

#[derive(Clone)]
pub struct SnapshotConfig {
    pub url: String,
    pub bucket: String,
    pub object: String,
    pub backup_object: String,
}

/// Ships the whole store file to remote blob storage. Uploads run as spawned
/// best-effort tasks so a slow or absent remote never stalls a booking; the
/// guarantee is "eventually backed up after a mutation", not "backed up
/// before the response".
pub struct HttpSnapshotSync {
    client: reqwest::Client,
    config: SnapshotConfig,
}

impl HttpSnapshotSync {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn object_url(&self, object: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.bucket,
            object
        )
    }

    /// Pull the primary snapshot when no local store file exists yet, so a
    /// fresh deployment starts from the last backup instead of empty.
    pub async fn restore_if_missing(&self, store_file: &Path) -> Result<()> {
        if store_file.exists() {
            debug!("Store file present, skipping snapshot restore");
            return Ok(());
        }
        let url = self.object_url(&self.config.object);
        info!("Restoring store file from {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching snapshot from {url}"))?;
        if !response.status().is_success() {
            warn!("No snapshot to restore ({})", response.status());
            return Ok(());
        }
        let body = response.bytes().await.context("reading snapshot body")?;
        std::fs::write(store_file, &body)
            .with_context(|| format!("writing {}", store_file.display()))?;
        info!("Restored {} bytes into {}", body.len(), store_file.display());
        Ok(())
    }

    async fn upload(client: reqwest::Client, url: String, bytes: Vec<u8>) {
        match client.put(&url).body(bytes).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Snapshot uploaded to {}", url);
            }
            Ok(response) => warn!("Snapshot upload to {} rejected: {}", url, response.status()),
            Err(e) => warn!("Snapshot upload to {} failed: {}", url, e),
        }
    }
}

impl SnapshotSync for HttpSnapshotSync {
    fn after_mutation(&self, store_file: &Path) {
        let bytes = match std::fs::read(store_file) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read store file for snapshot: {}", e);
                return;
            }
        };
        let primary = self.object_url(&self.config.object);
        let backup = self.object_url(&self.config.backup_object);
        let client = self.client.clone();
        tokio::spawn(async move {
            Self::upload(client.clone(), primary, bytes.clone()).await;
            Self::upload(client, backup, bytes).await;
        });
    }
}

//! FileDestination - appends NDJSON batches to disk

use bytes::Bytes;
use contracts::{BatchDestination, ContractError, DestinationStatus, PutBatchOutcome};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Configuration for FileDestination
#[derive(Debug, Clone)]
pub struct FileDestinationConfig {
    /// Output directory
    pub base_path: PathBuf,
    /// File stem of the stream inside `base_path`
    pub stream: String,
}

impl FileDestinationConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let stream = params
            .get("stream")
            .cloned()
            .unwrap_or_else(|| "events".to_string());

        Self { base_path, stream }
    }

    /// Full path of the stream file
    pub fn stream_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.ndjson", self.stream))
    }
}

/// Destination writing each batch to one append-only NDJSON file
#[derive(Debug, Clone)]
pub struct FileDestination {
    name: String,
    config: FileDestinationConfig,
}

impl FileDestination {
    /// Create a new FileDestination; the directory is created on connect
    pub fn new(name: impl Into<String>, config: FileDestinationConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        Self::new(name, FileDestinationConfig::from_params(params))
    }

    pub fn config(&self) -> &FileDestinationConfig {
        &self.config
    }

    async fn append(&self, records: &[Bytes]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.stream_path())
            .await?;
        for record in records {
            file.write_all(record).await?;
        }
        file.flush().await
    }
}

impl BatchDestination for FileDestination {
    async fn describe(&self) -> Result<DestinationStatus, ContractError> {
        match fs::metadata(&self.config.base_path).await {
            Ok(meta) if meta.is_dir() => Ok(DestinationStatus::Found(
                self.config.stream_path().display().to_string(),
            )),
            Ok(_) => Err(ContractError::connect(
                &self.name,
                format!("{} is not a directory", self.config.base_path.display()),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DestinationStatus::Missing),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self) -> Result<String, ContractError> {
        fs::create_dir_all(&self.config.base_path).await?;
        debug!(
            sink = %self.name,
            path = %self.config.base_path.display(),
            "Created output directory"
        );
        Ok(self.config.stream_path().display().to_string())
    }

    #[instrument(
        name = "file_destination_put_batch",
        skip(self, records),
        fields(sink = %self.name, records = records.len())
    )]
    async fn put_batch(&self, records: &[Bytes]) -> Result<PutBatchOutcome, ContractError> {
        self.append(records).await.map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            ContractError::delivery(&self.name, e.to_string())
        })?;
        Ok(PutBatchOutcome::default())
    }
}

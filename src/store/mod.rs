use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::SinkError;
use crate::roster::{NewSubmission, SubmissionRecord};

/// Key the submission list is stored under
pub const SUBMISSIONS_KEY: &str = "submissions";

/// Accepts new rosters. Either succeeds with the stored record or fails
/// with a message fit to show the captain.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, SinkError>;
}

/// Reads back every stored roster in submission order.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn load_all(&self) -> Result<Vec<SubmissionRecord>, SinkError>;
}

/// Key-value store on disk: each key is one JSON document in `data_dir`.
/// Only the `submissions` key is used.
pub struct JsonFileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    async fn read_list(&self) -> Result<Vec<SubmissionRecord>, SinkError> {
        let path = self.key_path(SUBMISSIONS_KEY);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the whole list. Written to a temp file first so readers
    /// never see a half-written document.
    async fn replace_list(&self, records: &[SubmissionRecord]) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.key_path(SUBMISSIONS_KEY);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), count = records.len(), "Replaced submission list");
        Ok(())
    }
}

#[async_trait]
impl SubmissionSink for JsonFileStore {
    async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, SinkError> {
        let team_name = submission.team_name.trim().to_string();
        if team_name.is_empty() {
            return Err(SinkError::Rejected("team name is required".to_string()));
        }
        if submission.players.is_empty() {
            return Err(SinkError::Rejected("at least one player is required".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut records = self.read_list().await?;
        let record = SubmissionRecord {
            id: new_submission_id(),
            team_name,
            submitted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            players: submission.players,
        };
        records.push(record.clone());
        self.replace_list(&records).await?;

        info!(
            id = %record.id,
            team = %record.team_name,
            players = record.players.len(),
            "Stored roster submission"
        );
        Ok(record)
    }
}

#[async_trait]
impl SubmissionSource for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<SubmissionRecord>, SinkError> {
        let _guard = self.write_lock.lock().await;
        self.read_list().await
    }
}

fn new_submission_id() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}

//! Rebuild the statistics from a channel's full history.
//!
//! A rescan is destructive: the store is cleared *before* the channel is
//! resolved, so a missing channel leaves the store empty.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revolt_api::RevoltError;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use crate::ingest::{Attachment, FileFetcher};
use crate::{
    archive::UploadArchive,
    audio::DurationDecoder,
    ingest::{has_song_extension, UploadPipeline, Verdict},
    store::{StatStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub id: String,
    /// Normalized sender identity, used as the stats key.
    pub author: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("platform request failed: {0}")]
    Platform(#[from] RevoltError),

    #[error("{0}")]
    Other(String),
}

/// Where a rescan reads channels, history pages and file bytes from.
#[async_trait]
pub trait HistorySource: FileFetcher {
    /// Resolve a channel ID by name. `near` is the channel the request came
    /// from, used to prefer a channel on the same server.
    async fn find_channel(
        &self,
        name: &str,
        near: Option<&str>,
    ) -> Result<Option<String>, HistoryError>;

    /// The next page of messages after `cursor` (from the start when `None`),
    /// oldest first. An empty page ends the walk.
    async fn page_after(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<HistoryMessage>, HistoryError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescanReport {
    /// Attachments counted as songs.
    pub accepted: u64,
    /// Attachments with a song extension that were downloaded and checked.
    pub examined: u64,
    /// Attachments skipped because of a download, decode or store error.
    pub failures: u64,
    pub messages: u64,
    /// ID of the last message walked; a later walk can resume after it.
    pub last_message_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RescanReport {
    fn new() -> Self {
        Self {
            accepted: 0,
            examined: 0,
            failures: 0,
            messages: 0,
            last_message_id: None,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RescanError {
    #[error("a rescan is already running")]
    AlreadyRunning,

    #[error("could not clear the stats file: {0}")]
    Clear(#[source] StoreError),

    #[error("channel `#{0}` not found")]
    ChannelNotFound(String),

    #[error("channel lookup failed: {0}")]
    Lookup(#[source] HistoryError),

    #[error("history walk stopped after {} message(s): {source}", .partial.messages)]
    Interrupted {
        partial: RescanReport,
        #[source]
        source: HistoryError,
    },
}

/// Resets the single-flight flag when a rescan ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Rescanner {
    pipeline: Arc<UploadPipeline>,
    channel_name: String,
    running: AtomicBool,
}

impl Rescanner {
    /// `archive` set means accepted uploads are also written to disk.
    pub fn new(
        store: Arc<dyn StatStore>,
        decoder: Arc<dyn DurationDecoder>,
        archive: Option<UploadArchive>,
        channel_name: impl Into<String>,
    ) -> Self {
        let pipeline = UploadPipeline::new(store, decoder, archive);
        Self::with_pipeline(Arc::new(pipeline), channel_name)
    }

    /// Share the pipeline live uploads go through.
    pub fn with_pipeline(pipeline: Arc<UploadPipeline>, channel_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            channel_name: channel_name.into(),
            running: AtomicBool::new(false),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn run(
        &self,
        source: &dyn HistorySource,
        near: Option<&str>,
    ) -> Result<RescanReport, RescanError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RescanError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.pipeline.store().clear().await.map_err(RescanError::Clear)?;
        info!(channel = %self.channel_name, "stats cleared; starting rescan");

        let channel_id = source
            .find_channel(&self.channel_name, near)
            .await
            .map_err(RescanError::Lookup)?
            .ok_or_else(|| RescanError::ChannelNotFound(self.channel_name.clone()))?;

        let mut report = RescanReport::new();
        loop {
            let page = match source
                .page_after(&channel_id, report.last_message_id.as_deref())
                .await
            {
                Ok(page) => page,
                Err(source) => {
                    return Err(RescanError::Interrupted {
                        partial: report,
                        source,
                    })
                }
            };
            if page.is_empty() {
                break;
            }
            debug!(
                messages = page.len(),
                after = ?report.last_message_id,
                "rescan page"
            );

            for message in page {
                for attachment in &message.attachments {
                    self.scan_attachment(source, &message.author, attachment, &mut report)
                        .await;
                }
                report.messages += 1;
                report.last_message_id = Some(message.id);
            }
        }

        info!(
            accepted = report.accepted,
            examined = report.examined,
            failures = report.failures,
            messages = report.messages,
            elapsed_ms = (Utc::now() - report.started_at).num_milliseconds(),
            "rescan complete"
        );
        Ok(report)
    }

    async fn scan_attachment(
        &self,
        source: &dyn HistorySource,
        author: &str,
        attachment: &Attachment,
        report: &mut RescanReport,
    ) {
        if !has_song_extension(&attachment.filename) {
            return;
        }
        report.examined += 1;

        match self.pipeline.process(source, author, attachment).await {
            Ok(Verdict::Accepted { .. }) => report.accepted += 1,
            Ok(_) => {}
            Err(e) => {
                warn!("Error processing file {}: {e}", attachment.filename);
                report.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::DecodeError, store::MemoryStatStore};

    struct LengthInName;

    /// Reads the length from the bytes, which the fake source fills with it.
    impl DurationDecoder for LengthInName {
        fn duration_seconds(&self, _: &str, bytes: &[u8]) -> Result<f64, DecodeError> {
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(DecodeError::UnknownLength)
        }
    }

    struct OnePage {
        messages: Vec<HistoryMessage>,
    }

    #[async_trait]
    impl HistorySource for OnePage {
        async fn find_channel(
            &self,
            name: &str,
            _: Option<&str>,
        ) -> Result<Option<String>, HistoryError> {
            Ok((name == "wip-beats").then(|| "chan".to_string()))
        }

        async fn page_after(
            &self,
            _: &str,
            cursor: Option<&str>,
        ) -> Result<Vec<HistoryMessage>, HistoryError> {
            Ok(if cursor.is_none() { self.messages.clone() } else { Vec::new() })
        }
    }

    #[async_trait]
    impl FileFetcher for OnePage {
        async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError> {
            Ok(attachment.id.clone().into_bytes())
        }
    }

    fn msg(id: &str, author: &str, files: &[(&str, &str)]) -> HistoryMessage {
        HistoryMessage {
            id: id.into(),
            author: author.into(),
            attachments: files
                .iter()
                .map(|(len, name)| Attachment {
                    id: len.to_string(),
                    tag: "attachments".into(),
                    filename: name.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn second_run_while_running_is_refused() {
        let store = Arc::new(MemoryStatStore::new());
        let rescanner = Rescanner::new(store, Arc::new(LengthInName), None, "wip-beats");
        rescanner.running.store(true, Ordering::Release);

        let source = OnePage { messages: vec![] };
        let err = rescanner.run(&source, None).await.unwrap_err();
        assert!(matches!(err, RescanError::AlreadyRunning));
    }

    #[tokio::test]
    async fn undecodable_attachment_is_skipped() {
        let store = Arc::new(MemoryStatStore::new());
        let rescanner = Rescanner::new(store.clone(), Arc::new(LengthInName), None, "wip-beats");
        let source = OnePage {
            messages: vec![msg("1", "kai", &[("garbage", "a.mp3"), ("20", "b.mp3")])],
        };

        let report = rescanner.run(&source, None).await.unwrap();
        assert_eq!((report.accepted, report.examined, report.failures), (1, 2, 1));
        assert_eq!(report.last_message_id.as_deref(), Some("1"));
        assert!(!rescanner.is_running());
        assert_eq!(store.load().await.unwrap().get("kai").unwrap().count, 1);
    }
}

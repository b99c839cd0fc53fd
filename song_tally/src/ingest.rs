//! Decides which uploads count as songs and records the ones that do.
//!
//! [`UploadPipeline`] is the one path every upload takes, whether it arrives
//! live or is found by a rescan: fetch, measure, record, archive.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::{self, JoinError};
use tracing::{debug, info, warn};

use crate::{
    archive::UploadArchive,
    audio::{DecodeError, DurationDecoder},
    rescan::HistoryError,
    store::{StatStore, StoreError},
};

/// Uploads must be strictly longer than this to count.
pub const MIN_SONG_SECONDS: f64 = 10.0;

/// Case-sensitive filename suffixes that may be songs.
pub const SONG_EXTENSIONS: [&str; 2] = [".mp3", ".wav"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accepted { seconds: f64 },
    TooShort { seconds: f64 },
    NotAudio,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

pub fn has_song_extension(filename: &str) -> bool {
    SONG_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}

pub fn classify(filename: &str, seconds: f64) -> Verdict {
    if !has_song_extension(filename) {
        Verdict::NotAudio
    } else if seconds > MIN_SONG_SECONDS {
        Verdict::Accepted { seconds }
    } else {
        Verdict::TooShort { seconds }
    }
}

/// Classify an upload and, if it is a song, add it to `username`'s stats.
pub async fn ingest(
    store: &dyn StatStore,
    username: &str,
    filename: &str,
    seconds: f64,
) -> Result<Verdict, StoreError> {
    let verdict = classify(filename, seconds);
    if let Verdict::Accepted { seconds } = verdict {
        store.record_submission(username, seconds).await?;
        info!("{username} sent a song: {filename} ({seconds:.2}s)");
    }
    Ok(verdict)
}

/// An uploaded file, as a message carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    /// Storage bucket on the file server.
    pub tag: String,
    pub filename: String,
}

/// Fetches the bytes of an attachment.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError>;
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("download failed: {0}")]
    Download(#[source] HistoryError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("decoder task died: {0}")]
    Decoder(#[from] JoinError),

    #[error("could not record: {0}")]
    Record(#[from] StoreError),
}

pub struct UploadPipeline {
    store: Arc<dyn StatStore>,
    decoder: Arc<dyn DurationDecoder>,
    archive: Option<UploadArchive>,
}

impl UploadPipeline {
    /// `archive` set means accepted uploads are also written to disk.
    pub fn new(
        store: Arc<dyn StatStore>,
        decoder: Arc<dyn DurationDecoder>,
        archive: Option<UploadArchive>,
    ) -> Self {
        Self {
            store,
            decoder,
            archive,
        }
    }

    pub fn store(&self) -> &dyn StatStore {
        self.store.as_ref()
    }

    /// Run one attachment through the tally. Files without a song extension
    /// are never downloaded. A failed archive write is logged and does not
    /// undo the count.
    pub async fn process<F: FileFetcher + ?Sized>(
        &self,
        fetcher: &F,
        author: &str,
        attachment: &Attachment,
    ) -> Result<Verdict, UploadError> {
        if !has_song_extension(&attachment.filename) {
            return Ok(Verdict::NotAudio);
        }

        let bytes = fetcher
            .download(attachment)
            .await
            .map_err(UploadError::Download)?;
        let (bytes, seconds) = self.measure(&attachment.filename, bytes).await?;
        debug!(file = %attachment.filename, seconds, "audio length");

        let verdict = ingest(self.store.as_ref(), author, &attachment.filename, seconds).await?;
        if verdict.is_accepted() {
            if let Some(archive) = &self.archive {
                match archive.save(author, &attachment.filename, &bytes).await {
                    Ok(path) => info!("Saved to {}", path.display()),
                    Err(e) => warn!("Error saving file {}: {e}", attachment.filename),
                }
            }
        }
        Ok(verdict)
    }

    /// Decoding is CPU-bound, so it runs on the blocking pool. The bytes are
    /// handed back for archiving.
    async fn measure(&self, filename: &str, bytes: Vec<u8>) -> Result<(Vec<u8>, f64), UploadError> {
        let decoder = Arc::clone(&self.decoder);
        let filename = filename.to_string();
        let (bytes, seconds) = task::spawn_blocking(move || {
            let seconds = decoder.duration_seconds(&filename, &bytes);
            (bytes, seconds)
        })
        .await?;
        Ok((bytes, seconds?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStatStore;

    #[test]
    fn boundary_is_strict() {
        assert_eq!(classify("a.mp3", 10.0), Verdict::TooShort { seconds: 10.0 });
        assert_eq!(classify("a.mp3", 10.01), Verdict::Accepted { seconds: 10.01 });
    }

    #[test]
    fn only_lowercase_mp3_and_wav() {
        assert_eq!(classify("a.flac", 600.0), Verdict::NotAudio);
        assert_eq!(classify("a.MP3", 600.0), Verdict::NotAudio);
        assert_eq!(classify("mp3", 600.0), Verdict::NotAudio);
        assert!(classify("take.2.wav", 11.0).is_accepted());
    }

    #[tokio::test]
    async fn accepted_upload_updates_store_once() {
        let store = MemoryStatStore::new();
        let verdict = ingest(&store, "kai#0001", "beat.wav", 42.5).await.unwrap();
        assert!(verdict.is_accepted());

        let table = store.load().await.unwrap();
        let kai = table.get("kai#0001").unwrap();
        assert_eq!(kai.count, 1);
        assert!((kai.duration - 42.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejected_upload_leaves_store_untouched() {
        let store = MemoryStatStore::new();
        ingest(&store, "kai", "beat.wav", 10.0).await.unwrap();
        ingest(&store, "kai", "beat.flac", 99.0).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    /// Reads the length from the bytes, which `Bytes` fills with it.
    struct LengthInBytes;

    impl DurationDecoder for LengthInBytes {
        fn duration_seconds(&self, _: &str, bytes: &[u8]) -> Result<f64, DecodeError> {
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(DecodeError::UnknownLength)
        }
    }

    struct Panics;

    impl DurationDecoder for Panics {
        fn duration_seconds(&self, _: &str, _: &[u8]) -> Result<f64, DecodeError> {
            panic!("decoder should not run");
        }
    }

    /// Serves the attachment ID as the file body; `missing` fails the download.
    struct Bytes;

    #[async_trait]
    impl FileFetcher for Bytes {
        async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError> {
            if attachment.id == "missing" {
                return Err(HistoryError::Other("404".into()));
            }
            Ok(attachment.id.clone().into_bytes())
        }
    }

    fn file(id: &str, filename: &str) -> Attachment {
        Attachment {
            id: id.into(),
            tag: "attachments".into(),
            filename: filename.into(),
        }
    }

    #[tokio::test]
    async fn pipeline_skips_decoding_for_other_files() {
        let store = Arc::new(MemoryStatStore::new());
        let pipeline = UploadPipeline::new(store.clone(), Arc::new(Panics), None);
        let verdict = pipeline.process(&Bytes, "kai", &file("x", "cover.png")).await;
        assert_eq!(verdict.unwrap(), Verdict::NotAudio);
    }

    #[tokio::test]
    async fn pipeline_records_and_archives_songs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStatStore::new());
        let archive = UploadArchive::new(tmp.path(), &Default::default());
        let pipeline = UploadPipeline::new(store.clone(), Arc::new(LengthInBytes), Some(archive));

        let verdict = pipeline.process(&Bytes, "kai", &file("42", "beat.wav")).await.unwrap();
        assert_eq!(verdict, Verdict::Accepted { seconds: 42.0 });
        let short = pipeline.process(&Bytes, "kai", &file("3", "tick.wav")).await.unwrap();
        assert_eq!(short, Verdict::TooShort { seconds: 3.0 });

        assert_eq!(store.load().await.unwrap().get("kai").unwrap().count, 1);
        assert_eq!(std::fs::read(tmp.path().join("kai - beat.wav")).unwrap(), b"42");
        assert!(!tmp.path().join("kai - tick.wav").exists());
    }

    #[tokio::test]
    async fn pipeline_reports_download_and_decode_failures() {
        let store = Arc::new(MemoryStatStore::new());
        let pipeline = UploadPipeline::new(store.clone(), Arc::new(LengthInBytes), None);

        let err = pipeline.process(&Bytes, "kai", &file("missing", "a.mp3")).await;
        assert!(matches!(err, Err(UploadError::Download(_))));
        let err = pipeline.process(&Bytes, "kai", &file("noise", "b.mp3")).await;
        assert!(matches!(err, Err(UploadError::Decode(DecodeError::UnknownLength))));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decoder_panic_is_a_failure() {
        let store = Arc::new(MemoryStatStore::new());
        let pipeline = UploadPipeline::new(store, Arc::new(Panics), None);
        let err = pipeline.process(&Bytes, "kai", &file("1", "a.mp3")).await;
        assert!(matches!(err, Err(UploadError::Decoder(_))));
    }
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use revolt_api::RevoltError;
use song_tally::{
    audio::{DecodeError, DurationDecoder},
    commands::Replier,
    ingest::{Attachment, FileFetcher, UploadPipeline},
    live::{InboundMessage, LiveUploads, NOT_A_SONG},
    rescan::{HistoryError, HistoryMessage, HistorySource, Rescanner},
    MemoryStatStore, StatStore,
};
use tokio::sync::Notify;

/// Attachment IDs double as file bodies holding the length in seconds.
struct TextLength;

impl DurationDecoder for TextLength {
    fn duration_seconds(&self, _: &str, bytes: &[u8]) -> Result<f64, DecodeError> {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(DecodeError::UnknownLength)
    }
}

struct IdAsBody;

#[async_trait]
impl FileFetcher for IdAsBody {
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError> {
        Ok(attachment.id.clone().into_bytes())
    }
}

#[derive(Default)]
struct Replies(Mutex<Vec<String>>);

impl Replies {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl Replier for Replies {
    async fn say(&self, text: &str) -> Result<(), RevoltError> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn whisper(&self, text: &str) -> Result<(), RevoltError> {
        self.say(text).await
    }
}

struct Bot {
    live: LiveUploads,
    rescanner: Arc<Rescanner>,
    store: Arc<MemoryStatStore>,
}

fn bot(announce_rejections: bool) -> Bot {
    let store = Arc::new(MemoryStatStore::new());
    let pipeline = Arc::new(UploadPipeline::new(store.clone(), Arc::new(TextLength), None));
    let rescanner = Arc::new(Rescanner::with_pipeline(pipeline.clone(), "wip-beats"));
    Bot {
        live: LiveUploads::new(pipeline, rescanner.clone(), announce_rejections),
        rescanner,
        store,
    }
}

fn upload(channel: &str, author_id: &str, files: &[(&str, &str)]) -> InboundMessage {
    InboundMessage {
        channel_name: channel.into(),
        author_id: author_id.into(),
        author: format!("{author_id}#0001"),
        system: false,
        attachments: files
            .iter()
            .map(|(length, filename)| Attachment {
                id: length.to_string(),
                tag: "attachments".into(),
                filename: filename.to_string(),
            })
            .collect(),
    }
}

impl Bot {
    async fn count(&self, author: &str) -> u64 {
        let table = self.store.load().await.unwrap();
        table.get(author).map_or(0, |stat| stat.count)
    }
}

#[tokio::test]
async fn only_the_monitored_channel_counts() {
    let bot = bot(true);
    let replies = Replies::default();

    let elsewhere = upload("general", "kai", &[("30", "beat.mp3")]);
    assert_eq!(bot.live.handle(&elsewhere, Some("bot"), &IdAsBody, &replies).await, 0);
    assert_eq!(bot.count("kai#0001").await, 0);

    let here = upload("wip-beats", "kai", &[("30", "beat.mp3"), ("99", "cover.png")]);
    assert_eq!(bot.live.handle(&here, Some("bot"), &IdAsBody, &replies).await, 1);
    assert_eq!(bot.count("kai#0001").await, 1);
    assert!(replies.take().is_empty());
}

#[tokio::test]
async fn own_and_system_messages_are_ignored() {
    let bot = bot(true);
    let replies = Replies::default();

    let own = upload("wip-beats", "bot", &[("30", "beat.mp3"), ("2", "tick.wav")]);
    assert_eq!(bot.live.handle(&own, Some("bot"), &IdAsBody, &replies).await, 0);

    let mut notice = upload("wip-beats", "kai", &[("30", "beat.mp3"), ("2", "tick.wav")]);
    notice.system = true;
    assert_eq!(bot.live.handle(&notice, Some("bot"), &IdAsBody, &replies).await, 0);

    assert!(bot.store.load().await.unwrap().is_empty());
    assert!(replies.take().is_empty());
}

#[tokio::test]
async fn short_uploads_are_announced_when_enabled() {
    let bot = bot(true);
    let replies = Replies::default();

    let message = upload("wip-beats", "kai", &[("4", "tick.wav"), ("10", "loop.mp3")]);
    assert_eq!(bot.live.handle(&message, None, &IdAsBody, &replies).await, 0);
    assert_eq!(replies.take(), [NOT_A_SONG, NOT_A_SONG]);
    assert_eq!(bot.count("kai#0001").await, 0);
}

#[tokio::test]
async fn short_uploads_are_silent_when_disabled() {
    let bot = bot(false);
    let replies = Replies::default();

    let message = upload("wip-beats", "kai", &[("4", "tick.wav"), ("11", "loop.mp3")]);
    assert_eq!(bot.live.handle(&message, None, &IdAsBody, &replies).await, 1);
    assert!(replies.take().is_empty());
    assert_eq!(bot.count("kai#0001").await, 1);
}

#[tokio::test]
async fn broken_files_do_not_stop_the_rest() {
    let bot = bot(true);
    let replies = Replies::default();

    let message = upload("wip-beats", "kai", &[("noise", "a.mp3"), ("45", "b.wav")]);
    assert_eq!(bot.live.handle(&message, None, &IdAsBody, &replies).await, 1);
    assert!(replies.take().is_empty());
}

/// A one-message history whose first page waits to be released.
struct HeldHistory {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl HistorySource for HeldHistory {
    async fn find_channel(
        &self,
        _: &str,
        _: Option<&str>,
    ) -> Result<Option<String>, HistoryError> {
        Ok(Some("chan".into()))
    }

    async fn page_after(
        &self,
        _: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<HistoryMessage>, HistoryError> {
        if cursor.is_some() {
            return Ok(Vec::new());
        }
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![HistoryMessage {
            id: "m1".into(),
            author: "kai#0001".into(),
            attachments: upload("wip-beats", "kai", &[("30", "beat.mp3")]).attachments,
        }])
    }
}

#[async_trait]
impl FileFetcher for HeldHistory {
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, HistoryError> {
        IdAsBody.download(attachment).await
    }
}

#[tokio::test]
async fn uploads_during_a_rescan_are_left_to_it() {
    let bot = bot(true);
    let history = Arc::new(HeldHistory {
        entered: Notify::new(),
        release: Notify::new(),
    });

    let scan = tokio::spawn({
        let rescanner = bot.rescanner.clone();
        let history = history.clone();
        async move { rescanner.run(history.as_ref(), None).await }
    });
    history.entered.notified().await;
    assert!(bot.rescanner.is_running());

    // The same upload the walk is about to read.
    let replies = Replies::default();
    let message = upload("wip-beats", "kai", &[("30", "beat.mp3")]);
    assert_eq!(bot.live.handle(&message, None, &IdAsBody, &replies).await, 0);

    history.release.notify_one();
    let report = scan.await.unwrap().unwrap();
    assert_eq!(report.accepted, 1);
    assert_eq!(bot.count("kai#0001").await, 1);

    // Once the rescan is done, live counting resumes.
    let later = upload("wip-beats", "kai", &[("20", "next.mp3")]);
    assert_eq!(bot.live.handle(&later, None, &IdAsBody, &replies).await, 1);
    assert_eq!(bot.count("kai#0001").await, 2);
}

//! Uploads posted to the monitored channel while the bot is running.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    commands::Replier,
    ingest::{has_song_extension, Attachment, FileFetcher, UploadPipeline, Verdict},
    rescan::Rescanner,
};

pub const NOT_A_SONG: &str = "Not a song";

/// One inbound message, as far as live counting cares.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Name of the channel it arrived in, or its ID when the name is unknown.
    pub channel_name: String,
    pub author_id: String,
    /// Normalized sender identity, used as the stats key.
    pub author: String,
    pub system: bool,
    pub attachments: Vec<Attachment>,
}

/// System notices and the bot's own messages are never counted or answered.
pub fn is_ignored(system: bool, author_id: &str, bot_user_id: Option<&str>) -> bool {
    system || bot_user_id == Some(author_id)
}

pub struct LiveUploads {
    pipeline: Arc<UploadPipeline>,
    rescanner: Arc<Rescanner>,
    announce_rejections: bool,
}

impl LiveUploads {
    /// The monitored channel is the one `rescanner` replays.
    pub fn new(
        pipeline: Arc<UploadPipeline>,
        rescanner: Arc<Rescanner>,
        announce_rejections: bool,
    ) -> Self {
        Self {
            pipeline,
            rescanner,
            announce_rejections,
        }
    }

    pub fn monitored_channel(&self) -> &str {
        self.rescanner.channel_name()
    }

    /// Count the song attachments of `message` and return how many were
    /// accepted. While a rescan is running the uploads are left to it, since
    /// the walk reads the same history and would count them a second time.
    pub async fn handle(
        &self,
        message: &InboundMessage,
        bot_user_id: Option<&str>,
        fetcher: &dyn FileFetcher,
        replier: &dyn Replier,
    ) -> usize {
        if is_ignored(message.system, &message.author_id, bot_user_id)
            || message.channel_name != self.monitored_channel()
        {
            return 0;
        }
        let songs = message
            .attachments
            .iter()
            .filter(|a| has_song_extension(&a.filename))
            .count();
        if songs == 0 {
            return 0;
        }
        if self.rescanner.is_running() {
            debug!(songs, author = %message.author, "rescan running; leaving uploads to it");
            return 0;
        }

        let mut accepted = 0;
        for attachment in &message.attachments {
            match self.pipeline.process(fetcher, &message.author, attachment).await {
                Ok(Verdict::Accepted { .. }) => accepted += 1,
                Ok(Verdict::TooShort { seconds }) => {
                    debug!(file = %attachment.filename, seconds, "too short to count");
                    if self.announce_rejections {
                        if let Err(e) = replier.say(NOT_A_SONG).await {
                            warn!("could not send reply: {e}");
                        }
                    }
                }
                Ok(Verdict::NotAudio) => {}
                Err(e) => warn!("Error processing file {}: {e}", attachment.filename),
            }
        }
        accepted
    }
}

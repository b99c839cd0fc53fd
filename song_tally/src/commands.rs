//! Text commands: parsing, the replies they produce, and the free-text
//! fallback.

use std::sync::Arc;

use async_trait::async_trait;
use revolt_api::RevoltError;
use tracing::{error, warn};

use crate::{
    format::format_duration,
    rescan::{HistorySource, RescanError, Rescanner},
    store::{StatStore, StatTable, UserStat},
};

pub const NO_SONGS_YET: &str = "No songs have been submitted yet!";
const LEADERBOARD_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Scan,
    Help,
    ServerDuration,
    Leaderboard,
    Stats,
    ServerStats,
}

const COMMANDS: &[(&str, Command)] = &[
    (">scan", Command::Scan),
    (">help", Command::Help),
    (">server-duration", Command::ServerDuration),
    (">leaderboard", Command::Leaderboard),
    (">stats", Command::Stats),
    (">server-stats", Command::ServerStats),
];

impl Command {
    /// Exact, case-sensitive match against the command table.
    pub fn parse(text: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, command)| *command)
    }

    pub fn name(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }
}

/// What a piece of message text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Command(Command),
    /// Anything else. A leading `?` asks for a private answer and is
    /// stripped from `text`.
    FreeText { text: &'a str, private: bool },
}

impl<'a> Input<'a> {
    pub fn parse(text: &'a str) -> Self {
        if text.is_empty() {
            return Input::Empty;
        }
        if let Some(command) = Command::parse(text) {
            return Input::Command(command);
        }
        match text.strip_prefix('?') {
            Some(rest) => Input::FreeText {
                text: rest,
                private: true,
            },
            None => Input::FreeText {
                text,
                private: false,
            },
        }
    }
}

/// Sends answers back to whoever issued a command.
#[async_trait]
pub trait Replier: Send + Sync {
    /// Reply in the channel the command came from.
    async fn say(&self, text: &str) -> Result<(), RevoltError>;

    /// Reply in a direct message to the requester.
    async fn whisper(&self, text: &str) -> Result<(), RevoltError>;
}

/// Answers text that is not a command. `None` means stay silent.
pub trait FreeTextResponder: Send + Sync {
    fn respond(&self, text: &str) -> Option<String> {
        text.starts_with('>')
            .then(|| "I don't know that command. Try **>help**.".to_string())
    }
}

/// Only points people at `>help` when they mistype a command.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandHint;

impl FreeTextResponder for CommandHint {}

/// One inbound message, as far as the dispatcher cares.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub text: &'a str,
    /// Normalized identity of the sender.
    pub author: &'a str,
    /// Channel the message arrived in, used to pick the scan target.
    pub channel_id: Option<&'a str>,
}

pub struct Dispatcher {
    store: Arc<dyn StatStore>,
    rescanner: Arc<Rescanner>,
    responder: Arc<dyn FreeTextResponder>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn StatStore>,
        rescanner: Arc<Rescanner>,
        responder: Arc<dyn FreeTextResponder>,
    ) -> Self {
        Self {
            store,
            rescanner,
            responder,
        }
    }

    /// Handle one message. Failures are logged and, where possible, reported
    /// back; nothing is returned to the caller.
    pub async fn dispatch(
        &self,
        request: Request<'_>,
        replier: &dyn Replier,
        history: &dyn HistorySource,
    ) {
        match Input::parse(request.text) {
            Input::Empty => {}
            Input::Command(Command::Scan) => self.scan(request, replier, history).await,
            Input::Command(Command::Help) => say(replier, &self.help_text()).await,
            Input::Command(Command::ServerDuration) => self.query(replier, server_duration).await,
            Input::Command(Command::Leaderboard) => self.query(replier, leaderboard).await,
            Input::Command(Command::ServerStats) => self.query(replier, server_stats).await,
            Input::Command(Command::Stats) => {
                self.query(replier, |table| {
                    personal_stats(&table.stats_or_default(request.author))
                })
                .await
            }
            Input::FreeText { text, private } => {
                let Some(answer) = self.responder.respond(text) else {
                    return;
                };
                let sent = if private {
                    replier.whisper(&answer).await
                } else {
                    replier.say(&answer).await
                };
                if let Err(e) = sent {
                    warn!("could not send reply: {e}");
                }
            }
        }
    }

    /// Answer a read-only command from a fresh load of the table.
    async fn query(&self, replier: &dyn Replier, render: impl FnOnce(&StatTable) -> String + Send) {
        match self.store.load().await {
            Ok(table) => say(replier, &render(&table)).await,
            Err(e) => {
                error!("stats query failed: {e}");
                say(replier, "⚠️ Couldn't read the stats file.").await;
            }
        }
    }

    fn help_text(&self) -> String {
        let channel = self.rescanner.channel_name();
        format!(
            "**>scan** - Rescans all of #{channel} for .mp3 and .wav (above 10 seconds long).\n\
             **>leaderboard** - Shows top 3 users with most songs sent.\n\
             **>stats** - Displays personal stats (song count and total duration of songs)\n\
             **>server-stats** - Displays stats of everyone who has sent a song in #{channel}\n\
             **>server-duration** - Displays total time of each song in #{channel} combined."
        )
    }

    async fn scan(&self, request: Request<'_>, replier: &dyn Replier, history: &dyn HistorySource) {
        let channel = self.rescanner.channel_name();
        if self.rescanner.is_running() {
            say(replier, "⏳ A scan is already running.").await;
            return;
        }
        say(
            replier,
            &format!("Scanning `#{channel}` for past audio uploads..."),
        )
        .await;

        let reply = match self.rescanner.run(history, request.channel_id).await {
            Ok(report) => format!(
                "✅ Scan complete. Found {} valid audio uploads.",
                report.accepted
            ),
            Err(RescanError::AlreadyRunning) => "⏳ A scan is already running.".to_string(),
            Err(RescanError::ChannelNotFound(name)) => {
                warn!("rescan target `#{name}` not found");
                format!("❌ Couldn't find `#{name}` channel.")
            }
            Err(RescanError::Interrupted { partial, source }) => {
                error!(
                    messages = partial.messages,
                    last = ?partial.last_message_id,
                    "rescan interrupted: {source}"
                );
                format!(
                    "⚠️ Scan stopped early after {} message(s). \
                     Found {} valid audio uploads so far.",
                    partial.messages, partial.accepted
                )
            }
            Err(e) => {
                error!("rescan failed: {e}");
                format!("❌ Scan failed: {e}")
            }
        };
        say(replier, &reply).await;
    }
}

async fn say(replier: &dyn Replier, text: &str) {
    if let Err(e) = replier.say(text).await {
        warn!("could not send reply: {e}");
    }
}

fn ranking_line(rank: usize, stat: &UserStat) -> String {
    format!(
        "{rank}. `{}` — {} song(s) ({})\n",
        stat.username,
        stat.count,
        format_duration(stat.duration)
    )
}

pub fn server_duration(table: &StatTable) -> String {
    if table.is_empty() {
        return NO_SONGS_YET.to_string();
    }
    format!(
        "🎵 **Server Total:** {} song(s) with a combined duration of **{}**!",
        table.total_count(),
        format_duration(table.total_duration())
    )
}

pub fn leaderboard(table: &StatTable) -> String {
    if table.is_empty() {
        return NO_SONGS_YET.to_string();
    }
    let mut out = String::from("**Top 3 by Song Count:**\n");
    for (i, stat) in table
        .ranked_by_count()
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
    {
        out.push_str(&ranking_line(i + 1, stat));
    }
    out
}

pub fn personal_stats(stat: &UserStat) -> String {
    format!(
        "🎵 {} has sent **{} song(s)** with a total duration of **{}**!",
        stat.username,
        stat.count,
        format_duration(stat.duration)
    )
}

pub fn server_stats(table: &StatTable) -> String {
    if table.is_empty() {
        return NO_SONGS_YET.to_string();
    }
    let mut out = String::from("**Server Stats:**\n");
    for (i, stat) in table.ranked_by_duration().into_iter().enumerate() {
        out.push_str(&ranking_line(i + 1, stat));
    }
    out
}

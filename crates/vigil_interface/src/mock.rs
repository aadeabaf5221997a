//! In-memory platform and verdict service for tests.

use crate::{
    AnalysisStatus, ChatPlatform, HistoryMessage, NewChannel, OutgoingMessage, VerdictService,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::oneshot;
use vigil_core::{VerdictSnapshot, VerdictStats};
use vigil_error::{
    PlatformError, PlatformErrorKind, PlatformResult, ScanError, ScanErrorKind, ScanResult,
};

/// A message the mock recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination channel
    pub channel_id: u64,
    /// Assigned ID
    pub message_id: u64,
    /// Content
    pub message: OutgoingMessage,
}

/// A channel the mock created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChannel {
    /// Owning guild
    pub guild_id: u64,
    /// Assigned ID
    pub channel_id: u64,
    /// Requested shape
    pub request: NewChannel,
}

#[derive(Debug, Default)]
struct MockState {
    created: Vec<CreatedChannel>,
    sent: Vec<SentMessage>,
    edited: Vec<SentMessage>,
    direct: Vec<(u64, OutgoingMessage)>,
    deleted_channels: Vec<u64>,
    deleted_messages: Vec<(u64, u64)>,
    pinned: Vec<(u64, u64)>,
    topics: HashMap<u64, String>,
    history: HashMap<u64, Vec<HistoryMessage>>,
    downloads: HashMap<String, Vec<u8>>,
    closed_dms: BTreeSet<u64>,
    fail_channel_create: bool,
    fail_channel_delete: bool,
    history_hold: Option<(oneshot::Sender<u64>, oneshot::Receiver<()>)>,
}

/// A history fetch parked by [`MockChatPlatform::hold_next_history`].
#[derive(Debug)]
pub struct HeldHistory {
    /// Resolves with the channel whose history was requested
    pub requested: oneshot::Receiver<u64>,
    /// Send to let the fetch return
    pub release: oneshot::Sender<()>,
}

/// Chat platform that records every call.
#[derive(Debug)]
pub struct MockChatPlatform {
    bot_id: u64,
    next_id: AtomicU64,
    state: Mutex<MockState>,
}

impl Default for MockChatPlatform {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MockChatPlatform {
    /// Mock whose bot user is `bot_id`.
    pub fn new(bot_id: u64) -> Self {
        Self {
            bot_id,
            next_id: AtomicU64::new(10_000),
            state: Mutex::new(MockState::default()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Channels created so far.
    pub fn created_channels(&self) -> Vec<CreatedChannel> {
        self.state.lock().created.clone()
    }

    /// Messages posted to `channel_id`.
    pub fn messages_in(&self, channel_id: u64) -> Vec<SentMessage> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }

    /// Every message posted to any channel.
    pub fn all_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Edits applied so far.
    pub fn edits(&self) -> Vec<SentMessage> {
        self.state.lock().edited.clone()
    }

    /// Direct messages delivered to `user_id`.
    pub fn direct_messages_to(&self, user_id: u64) -> Vec<OutgoingMessage> {
        self.state
            .lock()
            .direct
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Channels deleted so far.
    pub fn deleted_channels(&self) -> Vec<u64> {
        self.state.lock().deleted_channels.clone()
    }

    /// `(channel, message)` pairs deleted so far.
    pub fn deleted_messages(&self) -> Vec<(u64, u64)> {
        self.state.lock().deleted_messages.clone()
    }

    /// `(channel, message)` pairs pinned so far.
    pub fn pinned(&self) -> Vec<(u64, u64)> {
        self.state.lock().pinned.clone()
    }

    /// Latest topic set on `channel_id`.
    pub fn topic(&self, channel_id: u64) -> Option<String> {
        self.state.lock().topics.get(&channel_id).cloned()
    }

    /// Append a message to the history of `channel_id`.
    pub fn push_history(&self, channel_id: u64, message: HistoryMessage) {
        self.state
            .lock()
            .history
            .entry(channel_id)
            .or_default()
            .push(message);
    }

    /// Serve `bytes` for downloads of `url`.
    pub fn add_download(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.state.lock().downloads.insert(url.into(), bytes);
    }

    /// Make direct messages to `user_id` fail.
    pub fn close_direct_messages(&self, user_id: u64) {
        self.state.lock().closed_dms.insert(user_id);
    }

    /// Make channel creation fail.
    pub fn fail_channel_create(&self, fail: bool) {
        self.state.lock().fail_channel_create = fail;
    }

    /// Make channel deletion fail.
    pub fn fail_channel_delete(&self, fail: bool) {
        self.state.lock().fail_channel_delete = fail;
    }

    /// Park the next `channel_history` call until released, so a test can
    /// act while a transcript is being built.
    pub fn hold_next_history(&self) -> HeldHistory {
        let (requested_tx, requested) = oneshot::channel();
        let (release, release_rx) = oneshot::channel();
        self.state.lock().history_hold = Some((requested_tx, release_rx));
        HeldHistory { requested, release }
    }
}

#[async_trait]
impl ChatPlatform for MockChatPlatform {
    fn bot_user_id(&self) -> u64 {
        self.bot_id
    }

    async fn create_channel(&self, guild_id: u64, channel: &NewChannel) -> PlatformResult<u64> {
        if self.state.lock().fail_channel_create {
            return Err(PlatformError::new(PlatformErrorKind::ChannelCreateFailed(
                "mock refused".to_string(),
            )));
        }
        let channel_id = self.next_id();
        let mut state = self.state.lock();
        if let Some(topic) = &channel.topic {
            state.topics.insert(channel_id, topic.clone());
        }
        state.created.push(CreatedChannel {
            guild_id,
            channel_id,
            request: channel.clone(),
        });
        Ok(channel_id)
    }

    async fn delete_channel(&self, channel_id: u64) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.fail_channel_delete {
            return Err(PlatformError::new(PlatformErrorKind::ChannelDeleteFailed(
                "mock refused".to_string(),
            )));
        }
        state.deleted_channels.push(channel_id);
        Ok(())
    }

    async fn set_channel_topic(&self, channel_id: u64, topic: &str) -> PlatformResult<()> {
        self.state.lock().topics.insert(channel_id, topic.to_string());
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<u64> {
        let message_id = self.next_id();
        self.state.lock().sent.push(SentMessage {
            channel_id,
            message_id,
            message: message.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<()> {
        self.state.lock().edited.push(SentMessage {
            channel_id,
            message_id,
            message: message.clone(),
        });
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()> {
        self.state
            .lock()
            .deleted_messages
            .push((channel_id, message_id));
        Ok(())
    }

    async fn pin_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()> {
        self.state.lock().pinned.push((channel_id, message_id));
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<u64> {
        let mut state = self.state.lock();
        if state.closed_dms.contains(&user_id) {
            return Err(PlatformError::new(PlatformErrorKind::DirectMessageFailed(
                format!("user {} has direct messages closed", user_id),
            )));
        }
        state.direct.push((user_id, message.clone()));
        Ok(self.next_id())
    }

    async fn channel_history(&self, channel_id: u64) -> PlatformResult<Vec<HistoryMessage>> {
        let hold = self.state.lock().history_hold.take();
        if let Some((requested, release)) = hold {
            let _ = requested.send(channel_id);
            let _ = release.await;
        }
        let mut history = self
            .state
            .lock()
            .history
            .get(&channel_id)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|m| (m.timestamp, m.id));
        Ok(history)
    }

    async fn download_attachment(&self, url: &str) -> PlatformResult<Vec<u8>> {
        self.state
            .lock()
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| PlatformError::new(PlatformErrorKind::DownloadFailed(url.to_string())))
    }
}

/// Verdict service driven by a script of poll results.
///
/// Once the script runs out every poll reports `queued`.
#[derive(Debug, Default)]
pub struct ScriptedVerdictService {
    submit_error: Mutex<Option<ScanErrorKind>>,
    script: Mutex<VecDeque<ScanResult<AnalysisStatus>>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    keys_seen: Mutex<Vec<String>>,
}

impl ScriptedVerdictService {
    /// Service with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service that reports `queued` once and then completes with `stats`.
    pub fn completing_with(stats: VerdictStats) -> Self {
        let service = Self::new();
        service.push_status("queued", VerdictSnapshot::default());
        service.push_status(
            "completed",
            VerdictSnapshot {
                stats,
                engines: BTreeMap::new(),
                date: Some(1_700_000_000),
            },
        );
        service
    }

    /// Queue a poll result.
    pub fn push_status(&self, status: &str, snapshot: VerdictSnapshot) {
        self.script.lock().push_back(Ok(AnalysisStatus {
            status: status.to_string(),
            snapshot,
        }));
    }

    /// Queue a poll failure.
    pub fn push_error(&self, kind: ScanErrorKind) {
        self.script.lock().push_back(Err(ScanError::new(kind)));
    }

    /// Make uploads fail with `kind`.
    pub fn fail_submit(&self, kind: ScanErrorKind) {
        *self.submit_error.lock() = Some(kind);
    }

    /// Number of uploads attempted.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of polls performed.
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// API keys presented, in call order.
    pub fn keys_seen(&self) -> Vec<String> {
        self.keys_seen.lock().clone()
    }
}

#[async_trait]
impl VerdictService for ScriptedVerdictService {
    async fn submit(&self, api_key: &str, filename: &str, _bytes: Vec<u8>) -> ScanResult<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().push(api_key.to_string());
        match self.submit_error.lock().clone() {
            Some(kind) => Err(ScanError::new(kind)),
            None => Ok(format!("analysis-{}", filename)),
        }
    }

    async fn poll(&self, _api_key: &str, _analysis_id: &str) -> ScanResult<AnalysisStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(AnalysisStatus {
                status: "queued".to_string(),
                snapshot: VerdictSnapshot::default(),
            })
        })
    }
}

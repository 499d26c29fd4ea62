#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{mpsc, Notify};

use connecthub::client::chat::{ChannelEvent, EventReceiver, RealtimeChannel, RealtimeConnector};
use connecthub::client::error::{ApiError, ChannelError};
use connecthub::client::services::{ChatHistoryApi, DiscoveryApi, DiscoveryFilters};
use connecthub::common::models::{
    Candidate, CandidateId, ConversationId, ConversationMessage, LikeKind, LikeResult, Match, MessageOrigin,
};
use connecthub::common::protocol::{NewMessage, OutgoingEvent};

pub fn candidate(id: &str) -> Candidate {
    Candidate {
        id: id.into(),
        name: id.to_uppercase(),
        age: 27,
        photos: vec![format!("https://cdn.example/{}.jpg", id)],
        bio: format!("hi, I'm {}", id),
        interests: ["hiking".to_string()].into_iter().collect(),
        distance: 3.0,
        premium: false,
    }
}

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
}

pub fn history_message(id: &str, from: &str, text: &str, minute: u32) -> ConversationMessage {
    ConversationMessage {
        id: id.into(),
        conversation_id: "m1".into(),
        sender_id: from.into(),
        text: text.into(),
        sent_at: at(minute),
        origin: MessageOrigin::History,
        is_mine: false,
        client_id: None,
    }
}

pub fn realtime(id: &str, from: &str, text: &str, minute: u32, client_id: Option<&str>) -> ChannelEvent {
    ChannelEvent::Message(NewMessage {
        id: id.into(),
        kind: Some("message".into()),
        match_id: "m1".into(),
        from_user_id: from.into(),
        text: text.into(),
        sent_at: at(minute),
        client_id: client_id.map(str::to_string),
    })
}

/// Scripted discovery backend. Like responses are consumed in order.
#[derive(Clone, Default)]
pub struct FakeDiscovery {
    inner: Arc<FakeDiscoveryInner>,
}

#[derive(Default)]
struct FakeDiscoveryInner {
    batch: Mutex<Vec<Candidate>>,
    likes: Mutex<VecDeque<Result<LikeResult, ApiError>>>,
    calls: Mutex<Vec<(CandidateId, LikeKind)>>,
}

impl FakeDiscovery {
    pub fn with_batch(ids: &[&str]) -> Self {
        let fake = Self::default();
        *fake.inner.batch.lock().unwrap() = ids.iter().map(|id| candidate(id)).collect();
        fake
    }

    pub fn push_like(&self, result: Result<LikeResult, ApiError>) {
        self.inner.likes.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<(CandidateId, LikeKind)> {
        self.inner.calls.lock().unwrap().clone()
    }
}

impl DiscoveryApi for FakeDiscovery {
    async fn fetch_candidates(&self, _filters: &DiscoveryFilters) -> Result<Vec<Candidate>, ApiError> {
        Ok(self.inner.batch.lock().unwrap().clone())
    }

    async fn submit_like(&self, candidate_id: &CandidateId, kind: LikeKind) -> Result<LikeResult, ApiError> {
        self.inner.calls.lock().unwrap().push((candidate_id.clone(), kind));
        self.inner
            .likes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LikeResult::no_match()))
    }

    async fn fetch_matches(&self) -> Result<Vec<Match>, ApiError> {
        Ok(Vec::new())
    }
}

/// History that resolves only once `release` is called, when gated.
pub struct FakeHistory {
    pub messages: Mutex<VecDeque<Result<Vec<ConversationMessage>, ApiError>>>,
    pub gate: Option<Arc<Notify>>,
}

impl FakeHistory {
    pub fn ready(messages: Vec<ConversationMessage>) -> Self {
        Self { messages: Mutex::new(VecDeque::from([Ok(messages)])), gate: None }
    }

    pub fn gated(messages: Vec<ConversationMessage>, gate: Arc<Notify>) -> Self {
        Self { messages: Mutex::new(VecDeque::from([Ok(messages)])), gate: Some(gate) }
    }

    pub fn then(self, next: Result<Vec<ConversationMessage>, ApiError>) -> Self {
        self.messages.lock().unwrap().push_back(next);
        self
    }
}

impl ChatHistoryApi for FakeHistory {
    async fn fetch_history(&self, _conversation_id: &ConversationId) -> Result<Vec<ConversationMessage>, ApiError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.messages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// In-memory realtime channel. The paired `Remote` plays the server.
pub struct MemoryChannel {
    emitted: Arc<Mutex<Vec<OutgoingEvent>>>,
    events: Option<EventReceiver>,
    fail_emit: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct Remote {
    pub tx: mpsc::UnboundedSender<ChannelEvent>,
    emitted: Arc<Mutex<Vec<OutgoingEvent>>>,
    fail_emit: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl Remote {
    pub fn push(&self, event: ChannelEvent) {
        self.tx.send(event).unwrap();
    }

    pub fn emitted(&self) -> Vec<OutgoingEvent> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.emitted()
            .into_iter()
            .filter_map(|e| match e {
                OutgoingEvent::SendMessage(m) => Some((m.text, m.client_id)),
                _ => None,
            })
            .collect()
    }

    pub fn fail_emits(&self, fail: bool) {
        self.fail_emit.store(fail, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Server drops the connection.
    pub fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(ChannelEvent::Disconnected { reason: reason.into() });
    }
}

pub fn memory_channel() -> (MemoryChannel, Remote) {
    let (tx, rx) = mpsc::unbounded_channel();
    let emitted = Arc::new(Mutex::new(Vec::new()));
    let fail_emit = Arc::new(AtomicBool::new(false));
    let connected = Arc::new(AtomicBool::new(true));
    let channel = MemoryChannel {
        emitted: emitted.clone(),
        events: Some(rx),
        fail_emit: fail_emit.clone(),
        connected: connected.clone(),
    };
    (channel, Remote { tx, emitted, fail_emit, connected })
}

impl RealtimeChannel for MemoryChannel {
    fn subscribe(&mut self) -> Result<EventReceiver, ChannelError> {
        self.events.take().ok_or(ChannelError::AlreadySubscribed)
    }

    fn emit(&self, event: &OutgoingEvent) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("socket buffer full".into()));
        }
        self.emitted.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hands out prepared channels; an empty queue fails the attempt.
#[derive(Default)]
pub struct MemoryConnector {
    channels: Mutex<VecDeque<Result<MemoryChannel, ChannelError>>>,
    pub attempts: Mutex<u32>,
}

impl MemoryConnector {
    pub fn push(&self, channel: Result<MemoryChannel, ChannelError>) {
        self.channels.lock().unwrap().push_back(channel);
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl RealtimeConnector for MemoryConnector {
    type Channel = MemoryChannel;

    async fn connect(&self, _url: &str) -> Result<MemoryChannel, ChannelError> {
        *self.attempts.lock().unwrap() += 1;
        let next = self.channels.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ChannelError::ConnectionFailed("refused".into())))
    }
}

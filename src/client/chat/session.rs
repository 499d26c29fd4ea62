//! One open conversation: history, realtime stream and composer.
//!
//! History and realtime events may arrive in any order. While history is
//! loading, realtime messages (and optimistic local sends) are buffered; when
//! history lands the view becomes `history ++ buffered`, skipping ids already
//! present. After that, messages are only appended in arrival order, never
//! re-sorted.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::client::auth::CurrentUser;
use crate::client::chat::channel::{ChannelEvent, EventReceiver, RealtimeChannel};
use crate::client::config::EchoPolicy;
use crate::client::error::{ApiError, ChannelError, ChatError};
use crate::common::models::{ConversationId, ConversationMessage, MessageId, MessageOrigin};
use crate::common::protocol::{JoinRoom, OutgoingEvent, SendMessage, MAX_MESSAGE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Closed,
}

/// Non-fatal problems surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatNotice {
    HistoryFailed(String),
    SendFailed(String),
    Server(String),
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Emitted; `client_id` correlates the server copy.
    Sent { client_id: String },
    /// Blank or too long. Nothing was emitted.
    Ignored,
}

pub struct ChatSession<C> {
    conversation_id: ConversationId,
    user: Arc<CurrentUser>,
    channel: Option<C>,
    echo: EchoPolicy,
    state: SessionState,
    messages: Vec<ConversationMessage>,
    buffered: Vec<ConversationMessage>,
    composer: String,
    notice: Option<ChatNotice>,
}

impl<C: RealtimeChannel> ChatSession<C> {
    /// Subscribes to the channel and joins the conversation room. The session
    /// starts in `Loading`; feed the history result to `apply_history`.
    ///
    /// A failed join is logged and reported as a notice, the session stays open.
    pub fn open(
        conversation_id: ConversationId,
        user: Arc<CurrentUser>,
        mut channel: C,
        echo: EchoPolicy,
    ) -> Result<(Self, EventReceiver), ChatError> {
        let events = channel.subscribe()?;
        let mut session = Self {
            conversation_id,
            user,
            channel: None,
            echo,
            state: SessionState::Loading,
            messages: Vec::new(),
            buffered: Vec::new(),
            composer: String::new(),
            notice: None,
        };
        session.join(&channel);
        session.channel = Some(channel);
        info!("[CHAT] Opened conversation {}", session.conversation_id);
        Ok((session, events))
    }

    fn join(&mut self, channel: &C) {
        let room = JoinRoom {
            match_id: self.conversation_id.clone(),
            user_id: self.user.id.clone(),
        };
        if let Err(e) = channel.join(&room) {
            warn!("[CHAT] Could not join room {}: {}", self.conversation_id, e);
            self.notice = Some(ChatNotice::Disconnected(e.to_string()));
        }
    }

    /// Swaps in a fresh channel after a drop and rejoins the room.
    pub fn attach(&mut self, mut channel: C) -> Result<EventReceiver, ChatError> {
        if self.state == SessionState::Closed {
            return Err(ChatError::Closed);
        }
        let events = channel.subscribe()?;
        if let Some(mut old) = self.channel.take() {
            old.disconnect();
        }
        self.join(&channel);
        self.channel = Some(channel);
        info!("[CHAT] Channel reattached for {}", self.conversation_id);
        Ok(events)
    }

    /// Installs the history result. Only the first call while loading counts;
    /// results after `close` are ignored.
    pub fn apply_history(&mut self, result: Result<Vec<ConversationMessage>, ApiError>) {
        match self.state {
            SessionState::Closed => {
                debug!("[CHAT] History for closed conversation {} dropped", self.conversation_id);
                return;
            }
            SessionState::Ready => {
                debug!("[CHAT] History for {} already applied", self.conversation_id);
                return;
            }
            SessionState::Loading => {}
        }

        let mut merged: Vec<ConversationMessage> = match result {
            Ok(history) => {
                debug!("[CHAT] {} history messages for {}", history.len(), self.conversation_id);
                history.into_iter().map(|m| self.tag(m, MessageOrigin::History)).collect()
            }
            Err(e) => {
                warn!("[CHAT] History for {} failed: {}", self.conversation_id, e);
                self.notice = Some(ChatNotice::HistoryFailed(e.to_string()));
                Vec::new()
            }
        };
        // A pending send whose copy is already in history is dropped; that
        // copy takes its place.
        let history_len = merged.len();
        let mut claimed = HashSet::new();
        for message in std::mem::take(&mut self.buffered) {
            if message.is_pending() {
                if let Some(pos) = Self::history_copy(&merged[..history_len], &message, &claimed) {
                    debug!("[CHAT] Pending send {} already in history as {}", message.id, merged[pos].id);
                    claimed.insert(pos);
                    continue;
                }
                merged.push(message);
            } else if !merged.iter().any(|m| m.id == message.id) {
                merged.push(message);
            }
        }
        self.messages = merged;
        self.state = SessionState::Ready;
    }

    /// Position of the history message that is the server copy of `pending`:
    /// same `client_id` if history carries one, else the newest unclaimed own
    /// message with the same text.
    fn history_copy(
        history: &[ConversationMessage],
        pending: &ConversationMessage,
        claimed: &HashSet<usize>,
    ) -> Option<usize> {
        let own = |&(pos, m): &(usize, &ConversationMessage)| m.is_mine && !claimed.contains(&pos);
        let by_client_id = pending.client_id.as_ref().and_then(|cid| {
            history
                .iter()
                .enumerate()
                .filter(own)
                .find(|(_, m)| m.client_id.as_ref() == Some(cid))
                .map(|(pos, _)| pos)
        });
        by_client_id.or_else(|| {
            history
                .iter()
                .enumerate()
                .filter(own)
                .rev()
                .find(|(_, m)| m.text == pending.text)
                .map(|(pos, _)| pos)
        })
    }

    /// Appends history fetched after a reconnect, skipping what is already shown.
    /// Returns how many messages were added.
    pub fn backfill(&mut self, history: Vec<ConversationMessage>) -> usize {
        if self.state != SessionState::Ready {
            return 0;
        }
        let before = self.messages.len();
        let mut reconciled = 0;
        for message in history {
            let message = self.tag(message, MessageOrigin::History);
            if Self::absorb(&mut self.messages, message, self.echo) {
                reconciled += 1;
            }
        }
        let added = self.messages.len() - before;
        info!("[CHAT] Backfilled {} messages ({} reconciled) for {}", added, reconciled, self.conversation_id);
        added
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        if self.state == SessionState::Closed {
            debug!("[CHAT] Event for closed conversation {} dropped", self.conversation_id);
            return;
        }
        match event {
            ChannelEvent::Message(incoming) => {
                if incoming.match_id != self.conversation_id {
                    debug!("[CHAT] Ignoring message for other conversation {}", incoming.match_id);
                    return;
                }
                let message = incoming.into_message(&self.user.id);
                let echo = self.echo;
                let target = match self.state {
                    SessionState::Loading => &mut self.buffered,
                    _ => &mut self.messages,
                };
                Self::absorb(target, message, echo);
            }
            ChannelEvent::ServerError(message) => {
                warn!("[CHAT] Server error in {}: {}", self.conversation_id, message);
                self.notice = Some(ChatNotice::Server(message));
            }
            ChannelEvent::Disconnected { reason } => {
                warn!("[CHAT] Channel for {} dropped: {}", self.conversation_id, reason);
                self.notice = Some(ChatNotice::Disconnected(reason));
            }
        }
    }

    /// Adds a server-side message to `list`. A copy of one of our pending
    /// sends replaces it in place. Returns true when a pending send was
    /// reconciled.
    fn absorb(list: &mut Vec<ConversationMessage>, message: ConversationMessage, echo: EchoPolicy) -> bool {
        if list.iter().any(|m| !m.is_pending() && m.id == message.id) {
            // Already shown; a pending send carrying this echo's client id is
            // the same message.
            let duplicate = message
                .client_id
                .as_ref()
                .and_then(|cid| list.iter().position(|m| m.is_pending() && m.client_id.as_ref() == Some(cid)));
            return match duplicate {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            };
        }
        if echo == EchoPolicy::Optimistic && message.is_mine {
            let by_client_id = message
                .client_id
                .as_ref()
                .and_then(|cid| list.iter().position(|m| m.is_pending() && m.client_id.as_ref() == Some(cid)));
            let slot = by_client_id.or_else(|| list.iter().position(|m| m.is_pending() && m.text == message.text));
            if let Some(pos) = slot {
                let client_id = list[pos].client_id.take();
                list[pos] = ConversationMessage {
                    client_id: message.client_id.clone().or(client_id),
                    ..message
                };
                return true;
            }
        }
        list.push(message);
        false
    }

    fn tag(&self, mut message: ConversationMessage, origin: MessageOrigin) -> ConversationMessage {
        message.is_mine = message.sender_id == self.user.id;
        message.origin = origin;
        message
    }

    pub fn set_composer(&mut self, text: impl Into<String>) {
        self.composer = text.into();
    }

    pub fn composer(&self) -> &str {
        &self.composer
    }

    /// Sends the composer text. Blank or over-long input is ignored without
    /// touching the channel. When the emit fails the text goes back into the
    /// composer and nothing is appended.
    pub fn send(&mut self) -> Result<SendOutcome, ChatError> {
        if self.state == SessionState::Closed {
            return Err(ChatError::Closed);
        }
        let text = self.composer.trim().to_string();
        if text.is_empty() || text.chars().count() > MAX_MESSAGE_LENGTH {
            debug!("[CHAT] Ignoring send of {} chars", text.chars().count());
            return Ok(SendOutcome::Ignored);
        }
        let original = std::mem::take(&mut self.composer);
        let client_id = Uuid::new_v4().to_string();
        let event = OutgoingEvent::SendMessage(SendMessage {
            match_id: self.conversation_id.clone(),
            from_user_id: self.user.id.clone(),
            text: text.clone(),
            client_id: client_id.clone(),
        });

        let emitted = match &self.channel {
            Some(channel) => channel.emit(&event),
            None => Err(ChannelError::NotConnected),
        };
        if let Err(e) = emitted {
            warn!("[CHAT] Send in {} failed: {}", self.conversation_id, e);
            self.composer = original;
            self.notice = Some(ChatNotice::SendFailed(e.to_string()));
            return Err(e.into());
        }

        if self.echo == EchoPolicy::Optimistic {
            let pending = ConversationMessage {
                id: MessageId::new(format!("local-{}", client_id)),
                conversation_id: self.conversation_id.clone(),
                sender_id: self.user.id.clone(),
                text,
                sent_at: Utc::now(),
                origin: MessageOrigin::Local,
                is_mine: true,
                client_id: Some(client_id.clone()),
            };
            match self.state {
                SessionState::Loading => self.buffered.push(pending),
                _ => self.messages.push(pending),
            }
        }
        Ok(SendOutcome::Sent { client_id })
    }

    /// Releases the channel. Later history results and events are ignored.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        if let Some(mut channel) = self.channel.take() {
            channel.disconnect();
        }
        self.buffered.clear();
        info!("[CHAT] Closed conversation {}", self.conversation_id);
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Messages in display order. Empty while loading.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().chain(self.buffered.iter()).filter(|m| m.is_pending()).count()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().map(|c| c.is_connected()).unwrap_or(false)
    }

    pub fn take_notice(&mut self) -> Option<ChatNotice> {
        self.notice.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    use crate::common::protocol::NewMessage;

    #[derive(Default)]
    struct Recorder {
        emitted: Mutex<Vec<OutgoingEvent>>,
        fail: bool,
        events: Option<EventReceiver>,
        disconnected: bool,
    }

    impl RealtimeChannel for Recorder {
        fn subscribe(&mut self) -> Result<EventReceiver, ChannelError> {
            self.events.take().ok_or(ChannelError::AlreadySubscribed)
        }

        fn emit(&self, event: &OutgoingEvent) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::SendFailed("boom".into()));
            }
            self.emitted.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnected = true;
        }

        fn is_connected(&self) -> bool {
            !self.disconnected
        }
    }

    fn recorder(fail: bool) -> Recorder {
        let (_tx, rx) = mpsc::unbounded_channel();
        Recorder { fail, events: Some(rx), ..Default::default() }
    }

    fn open(fail: bool, echo: EchoPolicy) -> ChatSession<Recorder> {
        let user = Arc::new(CurrentUser::new("me", "Me"));
        let (session, _events) = ChatSession::open("m1".into(), user, recorder(fail), echo).unwrap();
        session
    }

    fn incoming(id: &str, from: &str, text: &str, client_id: Option<&str>) -> ChannelEvent {
        ChannelEvent::Message(NewMessage {
            id: id.into(),
            kind: Some("message".into()),
            match_id: "m1".into(),
            from_user_id: from.into(),
            text: text.into(),
            sent_at: Utc::now(),
            client_id: client_id.map(str::to_string),
        })
    }

    fn emitted(session: &ChatSession<Recorder>) -> Vec<OutgoingEvent> {
        session.channel.as_ref().unwrap().emitted.lock().unwrap().clone()
    }

    #[test]
    fn open_joins_room_with_local_user() {
        let session = open(false, EchoPolicy::Optimistic);
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(
            emitted(&session),
            vec![OutgoingEvent::JoinRoom(JoinRoom { match_id: "m1".into(), user_id: "me".into() })]
        );
    }

    #[test]
    fn blank_and_oversized_sends_never_emit() {
        let mut session = open(false, EchoPolicy::Optimistic);
        for text in ["", "   ", "\n\t "] {
            session.set_composer(text);
            assert_eq!(session.send().unwrap(), SendOutcome::Ignored);
        }
        session.set_composer("x".repeat(MAX_MESSAGE_LENGTH + 1));
        assert_eq!(session.send().unwrap(), SendOutcome::Ignored);
        assert_eq!(emitted(&session).len(), 1);
    }

    #[test]
    fn failed_emit_restores_composer() {
        let mut session = open(true, EchoPolicy::Optimistic);
        session.apply_history(Ok(Vec::new()));
        session.set_composer("  hello ");
        assert!(session.send().is_err());
        assert_eq!(session.composer(), "  hello ");
        assert!(session.messages().is_empty());
        assert!(matches!(session.take_notice(), Some(ChatNotice::SendFailed(_))));
    }

    #[test]
    fn optimistic_send_reconciles_by_client_id() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.apply_history(Ok(Vec::new()));
        session.set_composer("hi");
        let SendOutcome::Sent { client_id } = session.send().unwrap() else {
            panic!("expected send");
        };
        assert_eq!(session.composer(), "");
        assert_eq!(session.pending_count(), 1);

        session.handle_event(incoming("s1", "me", "hi", Some(&client_id)));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id.as_str(), "s1");
        assert_eq!(session.messages()[0].origin, MessageOrigin::Realtime);
        assert!(session.messages()[0].is_mine);
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn echo_without_client_id_matches_oldest_pending_text() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.apply_history(Ok(Vec::new()));
        session.set_composer("same");
        session.send().unwrap();
        session.set_composer("same");
        session.send().unwrap();
        session.handle_event(incoming("s1", "me", "same", None));
        assert_eq!(session.messages()[0].id.as_str(), "s1");
        assert!(session.messages()[1].is_pending());
    }

    #[test]
    fn echo_of_already_shown_message_drops_matching_pending() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.apply_history(Ok(Vec::new()));
        session.set_composer("a");
        session.send().unwrap();
        session.set_composer("a");
        let SendOutcome::Sent { client_id: second } = session.send().unwrap() else {
            panic!("expected send");
        };

        // Backfill without client ids claims the oldest pending by text.
        let backfilled = match incoming("s2", "me", "a", None) {
            ChannelEvent::Message(m) => m.into_message(&"me".into()),
            _ => unreachable!(),
        };
        assert_eq!(session.backfill(vec![backfilled]), 0);
        assert_eq!(session.pending_count(), 1);

        session.handle_event(incoming("s2", "me", "a", Some(&second)));
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.messages().len(), 1);

        session.handle_event(incoming("s1", "me", "a", None));
        let ids: Vec<&str> = session.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
    }

    #[test]
    fn server_echo_policy_waits_for_reflection() {
        let mut session = open(false, EchoPolicy::ServerEcho);
        session.apply_history(Ok(Vec::new()));
        session.set_composer("hi");
        session.send().unwrap();
        assert!(session.messages().is_empty());
        session.handle_event(incoming("s1", "me", "hi", None));
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].is_mine);
    }

    #[test]
    fn duplicate_realtime_ids_are_dropped() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.apply_history(Ok(Vec::new()));
        session.handle_event(incoming("s1", "other", "yo", None));
        session.handle_event(incoming("s1", "other", "yo", None));
        assert_eq!(session.messages().len(), 1);
        assert!(!session.messages()[0].is_mine);
    }

    #[test]
    fn history_failure_keeps_buffered_messages() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.handle_event(incoming("s1", "other", "early", None));
        session.apply_history(Err(ApiError::Unauthenticated));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.messages().len(), 1);
        assert!(matches!(session.take_notice(), Some(ChatNotice::HistoryFailed(_))));
    }

    #[test]
    fn close_disconnects_and_ignores_late_input() {
        let mut session = open(false, EchoPolicy::Optimistic);
        session.close();
        assert!(session.channel.is_none());
        session.apply_history(Ok(Vec::new()));
        session.handle_event(incoming("s1", "other", "late", None));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.messages().is_empty());
        session.set_composer("hi");
        assert!(matches!(session.send(), Err(ChatError::Closed)));
    }
}

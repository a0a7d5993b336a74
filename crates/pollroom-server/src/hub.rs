//! Broadcast gateway: every live WebSocket connection, the participant
//! roster and the chat backlog.
//!
//! Each connection owns a bounded outbound queue. Fan-out never waits on a
//! slow client: when its queue is full the event is dropped for that client
//! only. Removing a connection drops its queue sender, which ends the
//! connection's writer task and closes the socket.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pollroom_shared::identity::is_teacher;
use pollroom_shared::protocol::{ChatEntry, ServerEvent};
use pollroom_shared::PollError;

use crate::chat::ChatLog;
use crate::config::ServerConfig;

pub type ConnectionId = Uuid;

struct Peer {
    /// Set once the connection has joined the chat.
    username: Option<String>,
    tx: mpsc::Sender<ServerEvent>,
}

#[derive(Clone)]
pub struct Hub {
    peers: Arc<RwLock<HashMap<ConnectionId, Peer>>>,
    participants: Arc<RwLock<BTreeSet<String>>>,
    chat: Arc<Mutex<ChatLog>>,
    replay_limit: usize,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            peers: Arc::new(RwLock::new(HashMap::new())),
            participants: Arc::new(RwLock::new(BTreeSet::new())),
            chat: Arc::new(Mutex::new(ChatLog::new(config.chat_history_capacity))),
            replay_limit: config.chat_replay_limit,
            queue_capacity: config.client_queue_capacity,
        }
    }

    /// Register a new connection. Returns its id and the receiving end of
    /// its outbound queue.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let mut peers = self.peers.write().await;
        peers.insert(id, Peer { username: None, tx });
        info!(conn = %id, connections = peers.len(), "Client connected");

        (id, rx)
    }

    /// Forget a connection. If it had joined the chat its username leaves
    /// the roster and everyone gets the new roster.
    pub async fn disconnect(&self, id: ConnectionId) {
        let removed = self.peers.write().await.remove(&id);

        let Some(peer) = removed else {
            return;
        };
        info!(conn = %id, user = ?peer.username, "Client disconnected");

        if let Some(username) = peer.username {
            self.participants.write().await.remove(&username);
            self.broadcast_roster().await;
        }
    }

    pub async fn username(&self, id: ConnectionId) -> Option<String> {
        self.peers
            .read()
            .await
            .get(&id)
            .and_then(|p| p.username.clone())
    }

    /// Send to one connection. Returns `false` if it is gone or its queue
    /// is full.
    pub async fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let peers = self.peers.read().await;
        match peers.get(&id) {
            Some(peer) => deliver(id, peer, event),
            None => false,
        }
    }

    /// Send to every live connection.
    pub async fn broadcast(&self, event: ServerEvent) {
        let peers = self.peers.read().await;
        for (id, peer) in peers.iter() {
            deliver(*id, peer, event.clone());
        }
    }

    /// Send to connections that joined the chat room.
    async fn broadcast_chat(&self, event: ServerEvent) {
        let peers = self.peers.read().await;
        for (id, peer) in peers.iter().filter(|(_, p)| p.username.is_some()) {
            deliver(*id, peer, event.clone());
        }
    }

    pub async fn participants(&self) -> Vec<String> {
        self.participants.read().await.iter().cloned().collect()
    }

    async fn broadcast_roster(&self) {
        let roster = self.participants().await;
        self.broadcast(ServerEvent::ParticipantsUpdate(roster)).await;
    }

    /// Bind `username` to the connection, add it to the roster, broadcast
    /// the roster and replay recent chat to the joiner.
    pub async fn join_chat(&self, id: ConnectionId, username: String) -> Result<(), PollError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(PollError::validation("username is required to join"));
        }

        {
            let mut peers = self.peers.write().await;
            let Some(peer) = peers.get_mut(&id) else {
                return Ok(());
            };
            peer.username = Some(username.clone());
        }

        self.participants.write().await.insert(username.clone());
        info!(conn = %id, user = %username, "Joined chat");

        self.broadcast_roster().await;

        let history = self.chat.lock().await.recent(self.replay_limit);
        self.send_to(id, ServerEvent::ChatHistory(history)).await;
        Ok(())
    }

    /// Stamp, store and relay a chat message.
    pub async fn chat_message(&self, fields: Map<String, Value>) -> ChatEntry {
        let entry = ChatEntry::stamp(fields, Utc::now());
        self.chat.lock().await.push(entry.clone());
        debug!(id = %entry.id, "Relaying chat message");
        self.broadcast_chat(ServerEvent::ChatMessage(entry.clone()))
            .await;
        entry
    }

    /// Disconnect every connection bound to `target` and drop it from the
    /// roster. Only a teacher connection may do this. Returns how many
    /// connections were closed.
    pub async fn kick(&self, issuer: ConnectionId, target: &str) -> Result<usize, PollError> {
        let issuer_name = self.username(issuer).await;
        if !issuer_name.as_deref().is_some_and(is_teacher) {
            return Err(PollError::Unauthorized);
        }

        let kicked: Vec<(ConnectionId, Peer)> = {
            let mut peers = self.peers.write().await;
            let ids: Vec<ConnectionId> = peers
                .iter()
                .filter(|(_, p)| p.username.as_deref() == Some(target))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| peers.remove(&id).map(|peer| (id, peer)))
                .collect()
        };

        // The notice is queued before the peer, and with it the queue sender,
        // is dropped.
        let count = kicked.len();
        for (id, peer) in kicked {
            deliver(id, &peer, ServerEvent::KickedOut);
        }

        self.participants.write().await.remove(target);
        info!(
            issuer = ?issuer_name,
            target = %target,
            connections = count,
            "Participant kicked"
        );
        self.broadcast_roster().await;

        Ok(count)
    }

    pub async fn connection_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

fn deliver(id: ConnectionId, peer: &Peer, event: ServerEvent) -> bool {
    match peer.tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!(conn = %id, "Dropping event for slow client");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!(conn = %id, "Event for closed connection");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub() -> Hub {
        Hub::new(&ServerConfig::default())
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn last_roster(events: &[ServerEvent]) -> Option<Vec<String>> {
        events.iter().rev().find_map(|e| match e {
            ServerEvent::ParticipantsUpdate(names) => Some(names.clone()),
            _ => None,
        })
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_join_chat_roster_has_both() {
        let hub = hub();
        let (carol, mut carol_rx) = hub.connect().await;
        let (dave, _dave_rx) = hub.connect().await;

        hub.join_chat(carol, "carol".into()).await.unwrap();
        hub.join_chat(dave, "dave".into()).await.unwrap();

        let events = drain(&mut carol_rx);
        let mut roster = last_roster(&events).unwrap();
        roster.sort();
        assert_eq!(roster, vec!["carol".to_string(), "dave".to_string()]);
    }

    #[tokio::test]
    async fn test_join_replays_history_to_joiner_only() {
        let hub = hub();
        let (early, mut early_rx) = hub.connect().await;
        hub.join_chat(early, "early".into()).await.unwrap();
        for n in 0..60 {
            hub.chat_message(object(json!({ "text": n }))).await;
        }
        drain(&mut early_rx);

        let (late, mut late_rx) = hub.connect().await;
        hub.join_chat(late, "late".into()).await.unwrap();

        let history = drain(&mut late_rx)
            .into_iter()
            .find_map(|e| match e {
                ServerEvent::ChatHistory(h) => Some(h),
                _ => None,
            })
            .unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].fields["text"], 10);

        assert!(drain(&mut early_rx)
            .iter()
            .all(|e| !matches!(e, ServerEvent::ChatHistory(_))));
    }

    #[tokio::test]
    async fn test_chat_goes_to_chat_room_only() {
        let hub = hub();
        let (member, mut member_rx) = hub.connect().await;
        let (_lurker, mut lurker_rx) = hub.connect().await;
        hub.join_chat(member, "member".into()).await.unwrap();
        drain(&mut member_rx);
        drain(&mut lurker_rx);

        let entry = hub
            .chat_message(object(json!({ "text": "hello", "sender": "member" })))
            .await;

        assert_eq!(drain(&mut member_rx), vec![ServerEvent::ChatMessage(entry)]);
        assert!(drain(&mut lurker_rx).is_empty());
    }

    #[tokio::test]
    async fn test_kick_by_non_teacher_has_no_effect() {
        let hub = hub();
        let (student, mut student_rx) = hub.connect().await;
        let (victim, mut victim_rx) = hub.connect().await;
        hub.join_chat(student, "mallory".into()).await.unwrap();
        hub.join_chat(victim, "bob".into()).await.unwrap();
        drain(&mut student_rx);
        drain(&mut victim_rx);

        assert_eq!(hub.kick(student, "bob").await, Err(PollError::Unauthorized));

        assert!(drain(&mut victim_rx).is_empty());
        assert!(drain(&mut student_rx).is_empty());
        assert_eq!(hub.connection_count().await, 2);
        assert_eq!(hub.participants().await, vec!["bob".to_string(), "mallory".to_string()]);
    }

    #[tokio::test]
    async fn test_kick_without_joining_is_unauthorized() {
        let hub = hub();
        let (anon, _rx) = hub.connect().await;
        assert_eq!(hub.kick(anon, "bob").await, Err(PollError::Unauthorized));
    }

    #[tokio::test]
    async fn test_teacher_kick_disconnects_all_target_connections() {
        let hub = hub();
        let (teacher, mut teacher_rx) = hub.connect().await;
        let (bob_a, mut bob_a_rx) = hub.connect().await;
        let (bob_b, mut bob_b_rx) = hub.connect().await;
        hub.join_chat(teacher, "teacher_1".into()).await.unwrap();
        hub.join_chat(bob_a, "bob".into()).await.unwrap();
        hub.join_chat(bob_b, "bob".into()).await.unwrap();
        drain(&mut teacher_rx);
        drain(&mut bob_a_rx);
        drain(&mut bob_b_rx);

        assert_eq!(hub.kick(teacher, "bob").await, Ok(2));

        for rx in [&mut bob_a_rx, &mut bob_b_rx] {
            assert_eq!(rx.recv().await, Some(ServerEvent::KickedOut));
            // Queue closed: the writer task will end and close the socket.
            assert_eq!(rx.recv().await, None);
        }

        assert_eq!(hub.participants().await, vec!["teacher_1".to_string()]);
        assert_eq!(
            last_roster(&drain(&mut teacher_rx)),
            Some(vec!["teacher_1".to_string()])
        );
        assert_eq!(hub.connection_count().await, 1);

        // The kicked connections' own disconnect is a no-op afterwards.
        hub.disconnect(bob_a).await;
        assert!(drain(&mut teacher_rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_updates_roster() {
        let hub = hub();
        let (carol, _carol_rx) = hub.connect().await;
        let (dave, mut dave_rx) = hub.connect().await;
        hub.join_chat(carol, "carol".into()).await.unwrap();
        hub.join_chat(dave, "dave".into()).await.unwrap();
        drain(&mut dave_rx);

        hub.disconnect(carol).await;
        assert_eq!(last_roster(&drain(&mut dave_rx)), Some(vec!["dave".to_string()]));

        // Connections that never joined leave silently.
        let (anon, _anon_rx) = hub.connect().await;
        hub.disconnect(anon).await;
        assert!(drain(&mut dave_rx).is_empty());
    }

    #[tokio::test]
    async fn test_slow_client_drops_events() {
        let config = ServerConfig {
            client_queue_capacity: 2,
            ..ServerConfig::default()
        };
        let hub = Hub::new(&config);
        let (id, mut rx) = hub.connect().await;

        for _ in 0..5 {
            hub.broadcast(ServerEvent::error("ping")).await;
        }
        assert!(!hub.send_to(id, ServerEvent::error("one more")).await);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let hub = hub();
        let (id, _rx) = hub.connect().await;
        assert!(matches!(
            hub.join_chat(id, "   ".into()).await,
            Err(PollError::Validation(_))
        ));
        assert!(hub.participants().await.is_empty());
    }
}

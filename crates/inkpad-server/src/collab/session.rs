use std::collections::HashMap;
use std::sync::Arc;

use inkpad_core::{AccessLevel, Identity};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::protocol::{ClientEvent, ServerEvent};
use super::rooms::{ConnectionId, RoomRegistry};
use crate::service::NotebookService;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Notebook {0} not found or unauthorized")]
    NotAuthorized(Uuid),

    #[error("Join notebook {0} before sending edits")]
    NotJoined(Uuid),

    #[error("Notebook {0} is read-only for you")]
    ReadOnly(Uuid),

    #[error("Relay unavailable")]
    Store,
}

struct Membership {
    access: AccessLevel,
    forwarder: JoinHandle<()>,
}

/// Relay state for one connected client.
///
/// Access is checked when joining a room; edits are only relayed into rooms
/// this connection joined with write access.
pub struct RelaySession {
    conn: ConnectionId,
    identity: Identity,
    notebooks: NotebookService,
    rooms: Arc<RoomRegistry>,
    outbound: mpsc::Sender<ServerEvent>,
    memberships: HashMap<Uuid, Membership>,
}

impl RelaySession {
    pub fn new(
        identity: Identity,
        notebooks: NotebookService,
        rooms: Arc<RoomRegistry>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            conn: Uuid::new_v4(),
            identity,
            notebooks,
            rooms,
            outbound,
            memberships: HashMap::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn
    }

    pub fn joined(&self) -> impl Iterator<Item = &Uuid> {
        self.memberships.keys()
    }

    /// Handle one raw text frame
    pub async fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                tracing::debug!(conn = %self.conn, "malformed relay frame: {}", e);
                self.reply(ServerEvent::Error {
                    message: format!("Malformed event: {}", e),
                })
                .await;
            }
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        if let Err(e) = self.dispatch(event).await {
            tracing::debug!(conn = %self.conn, user_id = %self.identity.user_id, "relay refused: {}", e);
            self.reply(ServerEvent::Error {
                message: e.to_string(),
            })
            .await;
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), RelayError> {
        match event {
            ClientEvent::JoinNotebook { notebook_id } => self.join(notebook_id).await,
            ClientEvent::LeaveNotebook { notebook_id } => {
                self.leave(notebook_id).await;
                self.reply(ServerEvent::Left { notebook_id }).await;
                Ok(())
            }
            ClientEvent::UpdateNote {
                notebook_id,
                content,
            } => {
                self.relay(
                    notebook_id,
                    ServerEvent::NoteUpdated {
                        notebook_id,
                        content,
                        from: self.identity.user_id,
                    },
                )
                .await
            }
            ClientEvent::Draw { notebook_id, data } => {
                self.relay(
                    notebook_id,
                    ServerEvent::Draw {
                        notebook_id,
                        data,
                        from: self.identity.user_id,
                    },
                )
                .await
            }
            ClientEvent::UpdateSketch { notebook_id, data } => {
                self.relay(
                    notebook_id,
                    ServerEvent::SketchUpdated {
                        notebook_id,
                        data,
                        from: self.identity.user_id,
                    },
                )
                .await
            }
        }
    }

    async fn join(&mut self, notebook_id: Uuid) -> Result<(), RelayError> {
        let access = self
            .notebooks
            .access_level(notebook_id, &self.identity)
            .await
            .map_err(|e| {
                tracing::error!("relay access check failed: {}", e);
                RelayError::Store
            })?;
        if !access.can_read() {
            return Err(RelayError::NotAuthorized(notebook_id));
        }

        // Re-joining only refreshes the cached access level
        if let Some(existing) = self.memberships.get_mut(&notebook_id) {
            existing.access = access;
        } else {
            let mut subscription = self.rooms.join(notebook_id, self.conn).await;
            let outbound = self.outbound.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = subscription.next().await {
                    if outbound.send(event).await.is_err() {
                        break;
                    }
                }
            });
            self.memberships
                .insert(notebook_id, Membership { access, forwarder });
            tracing::debug!(conn = %self.conn, notebook_id = %notebook_id, "joined room");
        }

        self.reply(ServerEvent::Joined {
            notebook_id,
            access,
        })
        .await;
        Ok(())
    }

    async fn leave(&mut self, notebook_id: Uuid) {
        if let Some(membership) = self.memberships.remove(&notebook_id) {
            membership.forwarder.abort();
            // Wait for the subscription to drop before checking emptiness
            let _ = membership.forwarder.await;
            self.rooms.release(notebook_id).await;
            tracing::debug!(conn = %self.conn, notebook_id = %notebook_id, "left room");
        }
    }

    async fn relay(&mut self, notebook_id: Uuid, event: ServerEvent) -> Result<(), RelayError> {
        let membership = self
            .memberships
            .get(&notebook_id)
            .ok_or(RelayError::NotJoined(notebook_id))?;
        if !membership.access.can_write() {
            return Err(RelayError::ReadOnly(notebook_id));
        }
        self.rooms.publish(notebook_id, self.conn, event).await;
        Ok(())
    }

    async fn reply(&self, event: ServerEvent) {
        // Receiver only goes away when the socket is closing
        let _ = self.outbound.send(event).await;
    }

    /// Leave every room; called once the socket is gone
    pub async fn close(&mut self) {
        let joined: Vec<Uuid> = self.memberships.keys().copied().collect();
        for notebook_id in joined {
            self.leave(notebook_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::db::{MemoryStore, Store};
    use inkpad_core::{AccessPolicy, InvitationPolicy, Permission};
    use std::time::Duration;
    use tokio::time::timeout;

    struct Peer {
        session: RelaySession,
        rx: mpsc::Receiver<ServerEvent>,
    }

    impl Peer {
        async fn next(&mut self) -> ServerEvent {
            timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("event expected")
                .expect("channel open")
        }

        async fn silent(&mut self) -> bool {
            timeout(Duration::from_millis(50), self.rx.recv()).await.is_err()
        }
    }

    struct World {
        store: Arc<MemoryStore>,
        service: NotebookService,
        rooms: Arc<RoomRegistry>,
    }

    impl World {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let service = NotebookService::new(
                store.clone(),
                AccessPolicy::default(),
                InvitationPolicy::default(),
            );
            Self {
                store,
                service,
                rooms: Arc::new(RoomRegistry::new(16)),
            }
        }

        async fn account(&self, name: &str) -> Identity {
            self.store
                .create_user(NewUser {
                    email: format!("{}@x.com", name),
                    username: name.to_string(),
                    password_hash: "hash".to_string(),
                })
                .await
                .unwrap()
                .identity()
        }

        fn peer(&self, who: &Identity) -> Peer {
            let (tx, rx) = mpsc::channel(16);
            Peer {
                session: RelaySession::new(
                    who.clone(),
                    self.service.clone(),
                    self.rooms.clone(),
                    tx,
                ),
                rx,
            }
        }
    }

    #[tokio::test]
    async fn test_edits_fan_out_to_other_members_only() {
        let world = World::new();
        let alice = world.account("alice").await;
        let bob = world.account("bob").await;
        let nb = world.service.create(&alice, "Ideas", None).await.unwrap();
        world
            .service
            .invite(nb.id, &alice, &bob.email, Some(Permission::Write))
            .await
            .unwrap();
        world.service.accept(nb.id, &bob).await.unwrap();

        let mut a = world.peer(&alice);
        let mut b = world.peer(&bob);
        a.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        b.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        assert!(matches!(a.next().await, ServerEvent::Joined { access: AccessLevel::Write, .. }));
        assert!(matches!(b.next().await, ServerEvent::Joined { .. }));

        a.session
            .handle(ClientEvent::UpdateNote {
                notebook_id: nb.id,
                content: "hello".into(),
            })
            .await;
        assert_eq!(
            b.next().await,
            ServerEvent::NoteUpdated {
                notebook_id: nb.id,
                content: "hello".into(),
                from: alice.user_id,
            }
        );
        assert!(a.silent().await);
        assert_eq!(world.rooms.member_count(nb.id).await, 2);
    }

    #[tokio::test]
    async fn test_stranger_cannot_join() {
        let world = World::new();
        let alice = world.account("alice").await;
        let eve = world.account("eve").await;
        let nb = world.service.create(&alice, "Ideas", None).await.unwrap();

        let mut e = world.peer(&eve);
        e.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        assert!(matches!(e.next().await, ServerEvent::Error { .. }));
        assert_eq!(e.session.joined().count(), 0);
        assert_eq!(world.rooms.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_emit_requires_join_and_write() {
        let world = World::new();
        let alice = world.account("alice").await;
        let bob = world.account("bob").await;
        let nb = world.service.create(&alice, "Ideas", None).await.unwrap();
        // pending invitee: can read, cannot write
        world
            .service
            .invite(nb.id, &alice, &bob.email, Some(Permission::Write))
            .await
            .unwrap();

        let mut a = world.peer(&alice);
        a.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        a.next().await;

        let mut b = world.peer(&bob);
        b.session
            .handle(ClientEvent::UpdateSketch {
                notebook_id: nb.id,
                data: "png".into(),
            })
            .await;
        assert!(matches!(b.next().await, ServerEvent::Error { .. }));

        b.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        assert!(matches!(b.next().await, ServerEvent::Joined { access: AccessLevel::Read, .. }));
        b.session
            .handle(ClientEvent::Draw {
                notebook_id: nb.id,
                data: serde_json::json!({"x": 1}),
            })
            .await;
        assert!(matches!(b.next().await, ServerEvent::Error { .. }));
        assert!(a.silent().await);

        // after accepting, re-joining refreshes access
        world.service.accept(nb.id, &bob).await.unwrap();
        b.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        assert!(matches!(b.next().await, ServerEvent::Joined { access: AccessLevel::Write, .. }));
        b.session
            .handle(ClientEvent::Draw {
                notebook_id: nb.id,
                data: serde_json::json!({"x": 1}),
            })
            .await;
        assert!(matches!(a.next().await, ServerEvent::Draw { .. }));
    }

    #[tokio::test]
    async fn test_close_releases_rooms() {
        let world = World::new();
        let alice = world.account("alice").await;
        let nb = world.service.create(&alice, "Ideas", None).await.unwrap();

        let mut a = world.peer(&alice);
        a.session.handle(ClientEvent::JoinNotebook { notebook_id: nb.id }).await;
        assert_eq!(world.rooms.room_count().await, 1);

        a.session.close().await;
        assert_eq!(world.rooms.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let world = World::new();
        let alice = world.account("alice").await;
        let mut a = world.peer(&alice);
        a.session.handle_frame("{not json").await;
        assert!(matches!(a.next().await, ServerEvent::Error { .. }));
    }
}

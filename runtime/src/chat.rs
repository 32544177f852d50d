//! Chat store.
//!
//! Rooms arrive through a live subscription: every change to the signed-in
//! user's rooms re-delivers the whole list, which replaces the cached one.
//! Messages are not cached; [`ChatStore::get_messages`] reads them on demand.
//!
//! The subscription is the one resource that must be released explicitly.
//! [`ChatStore::subscribe`] hands back a [`RoomSubscription`] guard that
//! closes it when dropped.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::RemoteCallMetrics;
use crate::notice::{Notice, Notifier};
use crate::retry::{self, RetryPolicy};
use crate::state::{CollectionAction, CollectionState, StateHandle};
use crate::{Environment, coerce_all, record_failure};
use event_planner_core::document::{
    Direction, DocumentStoreError, Fields, Filter, Query, SnapshotStream, collections,
};
use event_planner_core::ids::{MessageId, RoomId, UserId};
use event_planner_core::model::{ChatRoom, Message, NewMessage, NewRoom, RoomPatch};
use event_planner_core::timestamp;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const STORE: &str = "chat";

/// An open room subscription. Dropping it closes the subscription.
#[must_use = "dropping the subscription closes it immediately"]
#[derive(Debug)]
pub struct RoomSubscription {
    user: UserId,
    task: Option<JoinHandle<()>>,
}

impl RoomSubscription {
    /// User whose rooms are delivered
    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    /// Whether snapshots are still being delivered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Close the subscription now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::debug!(user = %self.user, "Closing room subscription");
            task.abort();
        }
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Live chat rooms plus message operations.
#[derive(Clone, Debug)]
pub struct ChatStore {
    env: Environment,
    state: StateHandle<ChatRoom>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl ChatStore {
    /// Create an empty store
    #[must_use]
    pub fn new(env: Environment, config: &StoreConfig, notifier: Notifier) -> Self {
        Self {
            env,
            state: StateHandle::new(),
            notifier,
            retry: config.retry_policy(),
        }
    }

    /// Start delivering `user`'s rooms, most recently active first.
    ///
    /// Each snapshot replaces the cached list wholesale. A snapshot error
    /// keeps the last list, records the message and publishes a notice. The
    /// subscription stays open unless access was denied.
    ///
    /// # Errors
    ///
    /// [`StoreError::RemoteFailure`] if the subscription cannot be opened.
    #[tracing::instrument(skip(self))]
    pub async fn subscribe(&self, user: &UserId) -> Result<RoomSubscription, StoreError> {
        let generation = self.state.start();

        let query = rooms_of(user).order_by("lastMessageAt", Direction::Descending);
        let stream = retry::read(&self.retry, STORE, "subscribe", || {
            self.env.documents.subscribe(collections::CHAT_ROOMS, query.clone())
        })
        .await
        .map_err(|err| {
            let err = StoreError::from(err);
            tracing::error!(error = %err, "Failed to subscribe to chat rooms");
            if self
                .state
                .finish(generation, CollectionAction::LoadFailed(err.to_string()))
            {
                self.notifier.publish(rooms_failed_notice());
            }
            err
        })?;

        let task = tokio::spawn(deliver(
            stream,
            user.clone(),
            generation,
            self.state.clone(),
            self.notifier.clone(),
        ));
        tracing::debug!("Room subscription open");

        Ok(RoomSubscription {
            user: user.clone(),
            task: Some(task),
        })
    }

    /// Send a message as the signed-in user, then move it to the top of its
    /// room.
    ///
    /// If the room is not in the cached list the room update is skipped and
    /// only the message is written.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] for blank content, a sender other
    ///   than the caller, or a cached room the sender is not part of
    /// - [`StoreError::RemoteFailure`] if the message cannot be written
    #[tracing::instrument(skip(self, content))]
    pub async fn send_message(
        &self,
        room_id: &RoomId,
        content: &str,
        sender_id: &UserId,
    ) -> Result<MessageId, StoreError> {
        const FAILED: &str = "Failed to send message. Please try again.";

        let identity = self
            .env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        if identity.user_id != *sender_id {
            return Err(self.fail(
                StoreError::ValidationFailure("messages can only be sent as yourself".to_owned()),
                FAILED,
            ));
        }
        let room = self.get(room_id);
        if room.as_ref().is_some_and(|room| !room.includes(sender_id)) {
            return Err(self.fail(
                StoreError::ValidationFailure("sender is not part of this room".to_owned()),
                FAILED,
            ));
        }

        let message = NewMessage {
            room_id: room_id.clone(),
            sender_id: sender_id.clone(),
            content: content.to_owned(),
        };
        let fields = message
            .to_fields(timestamp::server_timestamp())
            .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = RemoteCallMetrics::observe(
            STORE,
            "send_message",
            self.env.documents.create(collections::MESSAGES, fields),
        )
        .await
        .map_err(|err| self.fail(err.into(), FAILED))?;
        let id = MessageId::new(id);
        tracing::info!(message_id = %id, "Message sent");

        if room.is_some() {
            self.touch_room(room_id, content).await;
        } else {
            tracing::warn!(room_id = %room_id, "Room not cached, skipping last-message update");
        }

        self.notifier
            .publish(Notice::success("Message sent", "Your message has been sent."));
        Ok(id)
    }

    async fn touch_room(&self, room_id: &RoomId, content: &str) {
        let patch = RoomPatch {
            last_message: content.to_owned(),
            at: self.env.now_iso(),
        };
        match RemoteCallMetrics::observe(
            STORE,
            "update_room",
            self.env
                .documents
                .update(collections::CHAT_ROOMS, room_id.as_str(), patch.to_fields()),
        )
        .await
        {
            Ok(()) => self.state.send(CollectionAction::Patched {
                id: room_id.clone(),
                patch,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "Message sent but room update failed");
            }
        }
    }

    /// Open a room between the caller and one other user. The new room
    /// reaches the cached list through the subscription.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] unless there are exactly two
    ///   distinct participants including the caller
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self))]
    pub async fn create_room(&self, participants: Vec<UserId>) -> Result<RoomId, StoreError> {
        const FAILED: &str = "Failed to create chat room. Please try again.";

        let identity = self
            .env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        if !participants.contains(&identity.user_id) {
            return Err(self.fail(
                StoreError::ValidationFailure("you must be one of the participants".to_owned()),
                FAILED,
            ));
        }
        let fields = NewRoom { participants }
            .into_fields(&timestamp::server_timestamp())
            .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = RemoteCallMetrics::observe(
            STORE,
            "create_room",
            self.env.documents.create(collections::CHAT_ROOMS, fields),
        )
        .await
        .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = RoomId::new(id);
        tracing::info!(room_id = %id, "Chat room created");
        self.notifier
            .publish(Notice::success("Chat started", "Chat room created."));
        Ok(id)
    }

    /// The caller's room with `participant`, if one exists. Bypasses the
    /// cache.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn get_room_with(&self, participant: &UserId) -> Result<Option<ChatRoom>, StoreError> {
        let identity = self.env.require_identity()?;
        let query = rooms_of(&identity.user_id);
        let documents = retry::read(&self.retry, STORE, "rooms", || {
            self.env.documents.query(collections::CHAT_ROOMS, query.clone())
        })
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Failed to fetch chat room"))?;

        Ok(
            coerce_all(collections::CHAT_ROOMS, &documents, ChatRoom::from_document)
                .into_iter()
                .find(|room| room.includes(&identity.user_id) && room.includes(participant)),
        )
    }

    /// Every message of a room, oldest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn get_messages(&self, room_id: &RoomId) -> Result<Vec<Message>, StoreError> {
        self.env.require_identity()?;
        let query = Query::all()
            .filter(Filter::eq("roomId", room_id.as_str()))
            .order_by("createdAt", Direction::Ascending);
        let documents = retry::read(&self.retry, STORE, "messages", || {
            self.env.documents.query(collections::MESSAGES, query.clone())
        })
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Failed to fetch messages"))?;

        Ok(coerce_all(collections::MESSAGES, &documents, Message::from_document))
    }

    /// Mark a message as read.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::NotFound`] if the message does not exist
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self))]
    pub async fn mark_read(&self, message_id: &MessageId) -> Result<(), StoreError> {
        const FAILED: &str = "Failed to update message";

        self.env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        let mut fields = Fields::new();
        fields.insert("read".to_owned(), Value::Bool(true));

        RemoteCallMetrics::observe(
            STORE,
            "mark_read",
            self.env
                .documents
                .update(collections::MESSAGES, message_id.as_str(), fields),
        )
        .await
        .map_err(|err| {
            self.fail(StoreError::remote("message", message_id.as_str(), err), FAILED)
        })?;

        tracing::debug!("Message marked read");
        self.notifier
            .publish(Notice::success("Message read", "Message marked as read."));
        Ok(())
    }

    /// Cached room by id. Never suspends.
    #[must_use]
    pub fn get(&self, id: &RoomId) -> Option<ChatRoom> {
        self.state.state(|state| state.get(id).cloned())
    }

    /// Snapshot of the cached rooms
    #[must_use]
    pub fn rooms(&self) -> Vec<ChatRoom> {
        self.state.state(|state| state.items.clone())
    }

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> CollectionState<ChatRoom> {
        self.state.state(Clone::clone)
    }

    /// Watch every change to the state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CollectionState<ChatRoom>> {
        self.state.subscribe()
    }

    /// Forget the cached rooms. Snapshots from a subscription opened before
    /// this call are ignored from now on.
    pub(crate) fn clear(&self) {
        self.state.supersede(CollectionAction::Loaded(Vec::new()));
    }

    fn fail(&self, err: StoreError, description: &str) -> StoreError {
        record_failure(&self.state, &self.notifier, err, description)
    }
}

fn rooms_of(user: &UserId) -> Query {
    Query::all().filter(Filter::array_contains("participants", user.as_str()))
}

fn rooms_failed_notice() -> Notice {
    Notice::error("Error", "Failed to fetch chat rooms. Please try again later.")
}

async fn deliver(
    mut stream: SnapshotStream,
    user: UserId,
    generation: u64,
    state: StateHandle<ChatRoom>,
    notifier: Notifier,
) {
    while let Some(snapshot) = stream.next().await {
        match snapshot {
            Ok(documents) => {
                let rooms: Vec<ChatRoom> =
                    coerce_all(collections::CHAT_ROOMS, &documents, ChatRoom::from_document)
                        .into_iter()
                        .filter(|room| room.includes(&user))
                        .collect();
                tracing::debug!(user = %user, count = rooms.len(), "Room snapshot");
                if !state.finish(generation, CollectionAction::Loaded(rooms)) {
                    tracing::debug!(user = %user, "Subscription superseded");
                    break;
                }
            }
            Err(err) => {
                let fatal = matches!(err, DocumentStoreError::PermissionDenied(_));
                let err = StoreError::from(err);
                tracing::error!(user = %user, error = %err, fatal, "Room subscription error");
                if !state.finish(generation, CollectionAction::Failed(err.to_string())) {
                    break;
                }
                notifier.publish(rooms_failed_notice());
                if fatal {
                    break;
                }
            }
        }
    }
    tracing::debug!(user = %user, "Room subscription ended");
}

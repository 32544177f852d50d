//! Two-party chat rooms and their messages.

use super::{CoercionError, Entity, InvalidInput, decode, encode, require_text};
use crate::document::{Document, Fields};
use crate::ids::{MessageId, RoomId, UserId};
use crate::timestamp::{self, iso};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A conversation between exactly two users.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    /// Document id
    pub id: RoomId,
    /// The two participants, in creation order
    pub participants: Vec<UserId>,
    /// Text of the latest message, empty for a new room
    #[serde(default)]
    pub last_message: String,
    /// Time of the latest message (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub last_message_at: String,
    /// Creation time (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub created_at: String,
}

impl ChatRoom {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError`] if the body is malformed or the room does not have
    /// exactly two distinct participants.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        let room: Self = decode("chat room", document)?;
        check_participants(&room.participants).map_err(|err| CoercionError::Invalid {
            entity: "chat room",
            id: document.id.clone(),
            reason: err.0,
        })?;
        Ok(room)
    }

    /// Whether `user` takes part in this room
    #[must_use]
    pub fn includes(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}

fn check_participants(participants: &[UserId]) -> Result<(), InvalidInput> {
    match participants {
        [first, second] if !first.is_empty() && !second.is_empty() && first != second => Ok(()),
        _ => Err(InvalidInput::new(
            "a chat room needs exactly two distinct participants",
        )),
    }
}

/// Input for opening a room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NewRoom {
    /// The two participants
    pub participants: Vec<UserId>,
}

impl NewRoom {
    /// A room between `a` and `b`
    #[must_use]
    pub fn between(a: impl Into<UserId>, b: impl Into<UserId>) -> Self {
        Self {
            participants: vec![a.into(), b.into()],
        }
    }

    /// Check the participant list.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] unless there are exactly two distinct, non-blank ids.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        check_participants(&self.participants)
    }

    /// Render the persisted body: empty last message, both timestamps set to
    /// `created_at`.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if [`NewRoom::validate`] fails.
    pub fn into_fields(self, created_at: &Value) -> Result<Fields, InvalidInput> {
        self.validate()?;
        let mut fields = Fields::new();
        fields.insert(
            "participants".to_owned(),
            Value::from(
                self.participants
                    .into_iter()
                    .map(UserId::into_inner)
                    .collect::<Vec<_>>(),
            ),
        );
        fields.insert("lastMessage".to_owned(), Value::String(String::new()));
        fields.insert("lastMessageAt".to_owned(), created_at.clone());
        fields.insert("createdAt".to_owned(), created_at.clone());
        Ok(fields)
    }
}

/// New last-message state of a room.
///
/// On the wire `lastMessageAt` is always the server timestamp; `at` is the
/// local estimate merged into the cache until the next snapshot arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomPatch {
    /// Latest message text
    pub last_message: String,
    /// Local estimate of the message time (canonical ISO)
    pub at: String,
}

impl RoomPatch {
    /// Render the wire patch
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "lastMessage".to_owned(),
            Value::String(self.last_message.clone()),
        );
        fields.insert("lastMessageAt".to_owned(), timestamp::server_timestamp());
        fields
    }
}

impl Entity for ChatRoom {
    type Id = RoomId;
    type Patch = RoomPatch;

    fn id(&self) -> &RoomId {
        &self.id
    }

    fn apply(&mut self, patch: &RoomPatch) {
        self.last_message.clone_from(&patch.last_message);
        self.last_message_at.clone_from(&patch.at);
    }
}

/// One chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Document id
    pub id: MessageId,
    /// Room the message belongs to
    pub room_id: RoomId,
    /// Author
    pub sender_id: UserId,
    /// Text
    pub content: String,
    /// Server-stamped send time (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub created_at: String,
    /// Whether the recipient has seen it
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError::Malformed`] if the body does not have a message's shape.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        decode("message", document)
    }
}

/// Input for sending a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Target room
    pub room_id: RoomId,
    /// Author
    pub sender_id: UserId,
    /// Text
    pub content: String,
}

impl NewMessage {
    /// Check the message.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] when the content or an id is blank.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        require_text("roomId", self.room_id.as_str())?;
        require_text("senderId", self.sender_id.as_str())?;
        require_text("content", &self.content)
    }

    /// Render the persisted body: unread, stamped with `created_at`.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if [`NewMessage::validate`] fails.
    pub fn to_fields(&self, created_at: Value) -> Result<Fields, InvalidInput> {
        self.validate()?;
        let mut fields = encode(self);
        fields.insert("createdAt".to_owned(), created_at);
        fields.insert("read".to_owned(), Value::Bool(false));
        Ok(fields)
    }
}

pub mod documents;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the opaque session token on every authenticated call.
pub const TOKEN_HEADER: &str = "x-blast-token";

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct FriendRequestId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct BlastId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
impl FriendRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
impl BlastId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A recipient's answer to a blast.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attendance {
    Attending,
    NotAttending,
}

#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
}

#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlastStatus {
    #[default]
    Active,
}

/// A pending, directional proposal to establish a symmetric friendship.
/// Deleted from the store once accepted or rejected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: FriendRequestId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: RequestStatus,
    pub timestamp: DateTime<Utc>,
}

/// An event invitation broadcast to a chosen set of friends. The sender's
/// name and email are denormalized in so inbox rendering needs no extra
/// user lookup. `datetime` is the event time exactly as the sender typed it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blast {
    pub id: BlastId,
    pub title: String,
    pub message: String,
    pub datetime: String,
    pub location: String,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients: Vec<UserId>,
    pub attending: Vec<UserId>,
    pub not_attending: Vec<UserId>,
    pub timestamp: DateTime<Utc>,
    pub status: BlastStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- request payloads ----

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequest {
    pub receiver_id: UserId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestRef {
    pub request_id: FriendRequestId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlastRequest {
    pub title: String,
    pub message: String,
    pub datetime: String,
    pub location: String,
    pub recipients: Vec<UserId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub blast_id: BlastId,
    pub response: Attendance,
}

// ---- responses and views ----

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub uid: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingFriendRequest {
    pub id: FriendRequestId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_email: String,
    pub timestamp: DateTime<Utc>,
}

/// A blast as seen from a recipient's inbox.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedBlast {
    pub blast: Blast,
    pub is_attending: bool,
    pub is_not_attending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipientStatus {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_attending: bool,
    pub is_not_attending: bool,
}

/// A blast as seen from the sender's side, recipients resolved to
/// name/email plus their current answer ("no response" when both
/// flags are false).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentBlast {
    pub blast: Blast,
    pub recipients: Vec<RecipientStatus>,
}

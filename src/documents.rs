use serde::{Deserialize, Serialize};

use crate::{BlastId, UserId};

/// The stored shape of a `users/{uid}` document. `friends`,
/// `sentBlasts` and `receivedBlasts` are sets kept as vectors;
/// writers check membership before appending.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub friends: Vec<UserId>,
    pub sent_blasts: Vec<BlastId>,
    pub received_blasts: Vec<BlastId>,
}

impl UserDoc {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

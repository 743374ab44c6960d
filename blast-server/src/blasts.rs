use anyhow::bail;
use axum::extract::Path;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use sled::Transactional;

use blast_common::documents::UserDoc;
use blast_common::{
    Attendance, Blast, BlastId, BlastStatus, CreateBlastRequest, ReceivedBlast, RecipientStatus,
    RespondRequest, SentBlast, UserId,
};

use crate::store::{tx_fetch, tx_set, unwrap_tx, DocStore, BLASTS, USERS};
use crate::{auth, State};

/// Writes the blast document and fans its id out into every recipient's
/// `receivedBlasts` and the sender's `sentBlasts`, all in one transaction.
/// An unknown recipient aborts the whole operation; there is no state in
/// which a blast is visible to some recipients but not others.
pub fn create_blast(store: &DocStore, sender: &UserId, req: &CreateBlastRequest) -> anyhow::Result<Blast> {
    if req.title.trim().is_empty()
        || req.message.trim().is_empty()
        || req.datetime.trim().is_empty()
        || req.location.trim().is_empty()
    {
        bail!("title, message, datetime and location are all required");
    }
    if req.recipients.is_empty() {
        bail!("select at least one recipient");
    }
    if req.recipients.contains(sender) {
        bail!("cannot address a blast to yourself");
    }

    let blast_id = BlastId::generate();
    let blasts = store.tree(BLASTS)?;
    let users = store.tree(USERS)?;
    let blast = unwrap_tx((&blasts, &users).transaction(|(blasts, users)| {
        let mut sender_doc: UserDoc = tx_fetch(users, USERS, &sender.0)?;
        let now = Utc::now();
        let blast = Blast {
            id: blast_id.clone(),
            title: req.title.trim().to_string(),
            message: req.message.trim().to_string(),
            datetime: req.datetime.trim().to_string(),
            location: req.location.trim().to_string(),
            sender_id: sender.clone(),
            sender_name: sender_doc.name.clone(),
            sender_email: sender_doc.email.clone(),
            recipients: req.recipients.clone(),
            attending: Vec::new(),
            not_attending: Vec::new(),
            timestamp: now,
            status: BlastStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx_set(blasts, &blast.id.0, &blast)?;
        for recipient_id in &req.recipients {
            let mut recipient: UserDoc = tx_fetch(users, USERS, &recipient_id.0)?;
            if !recipient.received_blasts.contains(&blast.id) {
                recipient.received_blasts.push(blast.id.clone());
            }
            tx_set(users, &recipient.id.0, &recipient)?;
        }
        if !sender_doc.sent_blasts.contains(&blast.id) {
            sender_doc.sent_blasts.push(blast.id.clone());
        }
        tx_set(users, &sender_doc.id.0, &sender_doc)?;
        Ok(blast)
    }))?;
    tracing::info!(blast = %blast.id.0, sender = %sender.0, recipients = blast.recipients.len(),
        "blast created");
    Ok(blast)
}

/// Records (or changes) a recipient's answer as one atomic document
/// update: drop the user from the opposite list, append to the chosen one
/// if absent. `updatedAt` only moves when membership actually changed, so
/// repeating the same answer is a strict no-op.
pub fn respond(store: &DocStore, blast_id: &BlastId, uid: &UserId, response: Attendance) -> anyhow::Result<Blast> {
    store.update::<Blast>(BLASTS, &blast_id.0, |blast| {
        let changed = match response {
            Attendance::Attending => {
                blast.not_attending.retain(|u| u != uid);
                if blast.attending.contains(uid) {
                    false
                } else {
                    blast.attending.push(uid.clone());
                    true
                }
            }
            Attendance::NotAttending => {
                blast.attending.retain(|u| u != uid);
                if blast.not_attending.contains(uid) {
                    false
                } else {
                    blast.not_attending.push(uid.clone());
                    true
                }
            }
        };
        if changed {
            blast.updated_at = Utc::now();
        }
    })?;
    store.fetch(BLASTS, &blast_id.0)
}

/// `uid`'s received blasts, newest first, with the viewer's own answer
/// flags. Dangling blast ids are logged and skipped.
pub fn inbox(store: &DocStore, uid: &UserId) -> anyhow::Result<Vec<ReceivedBlast>> {
    let user: UserDoc = store.fetch(USERS, &uid.0)?;
    let mut out = Vec::with_capacity(user.received_blasts.len());
    for blast_id in &user.received_blasts {
        match store.get::<Blast>(BLASTS, &blast_id.0)? {
            Some(blast) => out.push(ReceivedBlast {
                is_attending: blast.attending.contains(uid),
                is_not_attending: blast.not_attending.contains(uid),
                blast,
            }),
            None => tracing::warn!(blast = %blast_id.0, "blast document missing, skipping"),
        }
    }
    out.sort_by(|a, b| b.blast.timestamp.cmp(&a.blast.timestamp));
    Ok(out)
}

/// `uid`'s sent blasts, newest first, each recipient resolved to
/// name/email plus their current answer. Recipients whose user document
/// has gone missing are logged and skipped.
pub fn sent(store: &DocStore, uid: &UserId) -> anyhow::Result<Vec<SentBlast>> {
    let user: UserDoc = store.fetch(USERS, &uid.0)?;
    let mut out = Vec::with_capacity(user.sent_blasts.len());
    for blast_id in &user.sent_blasts {
        let blast = match store.get::<Blast>(BLASTS, &blast_id.0)? {
            Some(blast) => blast,
            None => {
                tracing::warn!(blast = %blast_id.0, "blast document missing, skipping");
                continue;
            }
        };
        let mut recipients = Vec::with_capacity(blast.recipients.len());
        for recipient_id in &blast.recipients {
            match store.get::<UserDoc>(USERS, &recipient_id.0)? {
                Some(recipient) => recipients.push(RecipientStatus {
                    is_attending: blast.attending.contains(recipient_id),
                    is_not_attending: blast.not_attending.contains(recipient_id),
                    id: recipient.id,
                    name: recipient.name,
                    email: recipient.email,
                }),
                None => {
                    tracing::warn!(recipient = %recipient_id.0, "recipient document missing, skipping")
                }
            }
        }
        out.push(SentBlast { blast, recipients });
    }
    out.sort_by(|a, b| b.blast.timestamp.cmp(&a.blast.timestamp));
    Ok(out)
}

// ---- handlers ----

pub async fn post_create_blast(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<CreateBlastRequest>,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(create_blast(&state.store, &UserId(uid), &payload)?))
}

pub async fn post_respond_blast(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<RespondRequest>,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(respond(&state.store, &payload.blast_id, &UserId(uid), payload.response)?))
}

pub async fn get_inbox(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(inbox(&state.store, &UserId(uid))?))
}

pub async fn get_sent_blasts(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(sent(&state.store, &UserId(uid))?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_with_users(names: &[&str]) -> (DocStore, Vec<UserId>) {
        let store = DocStore::temporary().unwrap();
        let mut ids = Vec::new();
        for name in names {
            let id = UserId::generate();
            let doc = UserDoc::new(id.clone(), *name, format!("{name}@example.com"));
            store.set(USERS, &id.0, &doc).unwrap();
            ids.push(id);
        }
        (store, ids)
    }

    fn blast_request(recipients: &[&UserId]) -> CreateBlastRequest {
        CreateBlastRequest {
            title: "Bowling".into(),
            message: "Lanes at 8, loser buys".into(),
            datetime: "2026-09-01T20:00".into(),
            location: "Lucky Strike".into(),
            recipients: recipients.iter().map(|id| (*id).clone()).collect(),
        }
    }

    fn user(store: &DocStore, uid: &UserId) -> UserDoc {
        store.fetch(USERS, &uid.0).unwrap()
    }

    #[test]
    fn create_fans_out_to_all_recipients_and_sender() {
        let (store, ids) = store_with_users(&["alice", "bob", "carol"]);
        let (alice, bob, carol) = (&ids[0], &ids[1], &ids[2]);

        let blast = create_blast(&store, alice, &blast_request(&[bob, carol])).unwrap();

        assert_eq!(blast.sender_name, "alice");
        assert_eq!(blast.sender_email, "alice@example.com");
        assert!(blast.attending.is_empty() && blast.not_attending.is_empty());

        assert_eq!(user(&store, bob).received_blasts, vec![blast.id.clone()]);
        assert_eq!(user(&store, carol).received_blasts, vec![blast.id.clone()]);
        assert_eq!(user(&store, alice).sent_blasts, vec![blast.id.clone()]);

        // both recipients see it, sender sees two "no response" entries
        assert_eq!(inbox(&store, bob).unwrap().len(), 1);
        assert_eq!(inbox(&store, carol).unwrap().len(), 1);
        let sent = sent(&store, alice).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients.len(), 2);
        assert!(sent[0]
            .recipients
            .iter()
            .all(|r| !r.is_attending && !r.is_not_attending));
    }

    #[test]
    fn create_validates_fields_and_recipients() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);

        let mut req = blast_request(&[bob]);
        req.title = "   ".into();
        assert!(create_blast(&store, alice, &req).is_err());

        let mut req = blast_request(&[bob]);
        req.recipients.clear();
        assert!(create_blast(&store, alice, &req).is_err());

        let req = blast_request(&[alice]);
        assert!(create_blast(&store, alice, &req).is_err());

        assert!(user(&store, bob).received_blasts.is_empty());
        assert!(user(&store, alice).sent_blasts.is_empty());
    }

    #[test]
    fn unknown_recipient_aborts_the_whole_fanout() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);
        let ghost = UserId("ghost".into());

        let res = create_blast(&store, alice, &blast_request(&[bob, &ghost]));
        assert!(res.is_err());

        assert!(user(&store, bob).received_blasts.is_empty());
        assert!(user(&store, alice).sent_blasts.is_empty());
        assert!(store.query::<Blast>(BLASTS, |_| true).unwrap().is_empty());
    }

    #[test]
    fn respond_toggle_moves_between_sets() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);
        let blast = create_blast(&store, alice, &blast_request(&[bob])).unwrap();

        let after = respond(&store, &blast.id, bob, Attendance::Attending).unwrap();
        assert_eq!(after.attending, vec![bob.clone()]);
        assert!(after.not_attending.is_empty());

        let after = respond(&store, &blast.id, bob, Attendance::NotAttending).unwrap();
        assert!(after.attending.is_empty());
        assert_eq!(after.not_attending, vec![bob.clone()]);
    }

    #[test]
    fn respond_is_idempotent() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);
        let blast = create_blast(&store, alice, &blast_request(&[bob])).unwrap();

        let once = respond(&store, &blast.id, bob, Attendance::Attending).unwrap();
        let twice = respond(&store, &blast.id, bob, Attendance::Attending).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn attending_and_not_attending_stay_disjoint() {
        let (store, ids) = store_with_users(&["alice", "bob", "carol"]);
        let (alice, bob, carol) = (&ids[0], &ids[1], &ids[2]);
        let blast = create_blast(&store, alice, &blast_request(&[bob, carol])).unwrap();

        let sequence = [
            (bob, Attendance::Attending),
            (carol, Attendance::NotAttending),
            (bob, Attendance::NotAttending),
            (carol, Attendance::Attending),
            (bob, Attendance::NotAttending),
            (carol, Attendance::NotAttending),
        ];
        for (uid, answer) in sequence {
            let state = respond(&store, &blast.id, uid, answer).unwrap();
            for user in &state.attending {
                assert!(!state.not_attending.contains(user));
            }
        }
        let final_state: Blast = store.fetch(BLASTS, &blast.id.0).unwrap();
        assert!(final_state.attending.is_empty());
        assert_eq!(final_state.not_attending.len(), 2);
    }

    #[test]
    fn respond_to_missing_blast_is_an_error() {
        let (store, ids) = store_with_users(&["bob"]);
        let bob = &ids[0];
        assert!(respond(&store, &BlastId("nope".into()), bob, Attendance::Attending).is_err());
    }

    #[test]
    fn inbox_is_sorted_newest_first_and_skips_dangling_ids() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);

        let first = create_blast(&store, alice, &blast_request(&[bob])).unwrap();
        let second = create_blast(&store, alice, &blast_request(&[bob])).unwrap();
        // force distinct, ordered timestamps
        store
            .update::<Blast>(BLASTS, &second.id.0, |b| {
                b.timestamp = first.timestamp + Duration::hours(1)
            })
            .unwrap();
        // and a dangling reference
        store
            .update::<UserDoc>(USERS, &bob.0, |u| u.received_blasts.push(BlastId("gone".into())))
            .unwrap();

        let inbox = inbox(&store, bob).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].blast.id, second.id);
        assert_eq!(inbox[1].blast.id, first.id);
    }

    #[test]
    fn sent_view_reflects_recipient_answers() {
        let (store, ids) = store_with_users(&["alice", "bob", "carol"]);
        let (alice, bob, carol) = (&ids[0], &ids[1], &ids[2]);
        let blast = create_blast(&store, alice, &blast_request(&[bob, carol])).unwrap();

        respond(&store, &blast.id, bob, Attendance::Attending).unwrap();

        let sent = sent(&store, alice).unwrap();
        let bob_status = sent[0].recipients.iter().find(|r| r.id == *bob).unwrap();
        let carol_status = sent[0].recipients.iter().find(|r| r.id == *carol).unwrap();
        assert!(bob_status.is_attending && !bob_status.is_not_attending);
        assert!(!carol_status.is_attending && !carol_status.is_not_attending);
    }
}

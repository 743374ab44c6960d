use anyhow::bail;
use axum::extract::{Path, Query};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use sled::Transactional;

use blast_common::documents::UserDoc;
use blast_common::{
    FriendRequest, FriendRequestId, FriendRequestRef, IncomingFriendRequest, RequestStatus,
    SendFriendRequest, UserId, UserSummary,
};

use crate::store::{
    abort, tx_delete, tx_fetch, tx_set, unwrap_tx, DocStore, FRIEND_REQUESTS, USERS,
};
use crate::{auth, State};

/// Creates a pending request after checking the things the store cannot:
/// self-requests, unknown receivers, existing friendship, and a duplicate
/// pending request between the same pair.
pub fn send_request(store: &DocStore, sender: &UserId, receiver: &UserId) -> anyhow::Result<FriendRequest> {
    if sender == receiver {
        bail!("cannot send a friend request to yourself");
    }
    let sender_doc: UserDoc = store.fetch(USERS, &sender.0)?;
    if store.get::<UserDoc>(USERS, &receiver.0)?.is_none() {
        bail!("no such user");
    }
    if sender_doc.friends.contains(receiver) {
        bail!("already friends");
    }
    let duplicates = store.query::<FriendRequest>(FRIEND_REQUESTS, |r| {
        r.sender_id == *sender && r.receiver_id == *receiver && r.status == RequestStatus::Pending
    })?;
    if !duplicates.is_empty() {
        bail!("a friend request to this user is already pending");
    }

    let request = FriendRequest {
        id: FriendRequestId::generate(),
        sender_id: sender.clone(),
        receiver_id: receiver.clone(),
        status: RequestStatus::Pending,
        timestamp: Utc::now(),
    };
    store.set(FRIEND_REQUESTS, &request.id.0, &request)?;
    tracing::info!(from = %sender.0, to = %receiver.0, "friend request sent");
    Ok(request)
}

/// Adds each user to the other's friend list and deletes the request, as
/// one transaction. The unions are idempotent, so an accept that races a
/// pre-existing friendship still converges.
pub fn accept_request(store: &DocStore, actor: &UserId, request_id: &FriendRequestId) -> anyhow::Result<()> {
    let users = store.tree(USERS)?;
    let requests = store.tree(FRIEND_REQUESTS)?;
    unwrap_tx((&users, &requests).transaction(|(users, requests)| {
        let request: FriendRequest = tx_fetch(requests, FRIEND_REQUESTS, &request_id.0)?;
        if request.receiver_id != *actor {
            return Err(abort(anyhow::anyhow!("only the receiver can accept a request")));
        }
        let mut receiver: UserDoc = tx_fetch(users, USERS, &request.receiver_id.0)?;
        let mut sender: UserDoc = tx_fetch(users, USERS, &request.sender_id.0)?;
        if !receiver.friends.contains(&request.sender_id) {
            receiver.friends.push(request.sender_id.clone());
        }
        if !sender.friends.contains(&request.receiver_id) {
            sender.friends.push(request.receiver_id.clone());
        }
        tx_set(users, &receiver.id.0, &receiver)?;
        tx_set(users, &sender.id.0, &sender)?;
        tx_delete(requests, &request.id.0)?;
        Ok(())
    }))?;
    tracing::info!(request = %request_id.0, by = %actor.0, "friend request accepted");
    Ok(())
}

/// Deletes the request document only; no friend list changes.
pub fn reject_request(store: &DocStore, actor: &UserId, request_id: &FriendRequestId) -> anyhow::Result<()> {
    let request: FriendRequest = store.fetch(FRIEND_REQUESTS, &request_id.0)?;
    if request.receiver_id != *actor {
        bail!("only the receiver can reject a request");
    }
    store.delete(FRIEND_REQUESTS, &request_id.0)?;
    tracing::info!(request = %request_id.0, by = %actor.0, "friend request rejected");
    Ok(())
}

/// Pending requests addressed to `uid`, sender resolved to name/email.
/// A request whose sender document has gone missing is logged and skipped.
pub fn incoming_requests(store: &DocStore, uid: &UserId) -> anyhow::Result<Vec<IncomingFriendRequest>> {
    let pending = store.query::<FriendRequest>(FRIEND_REQUESTS, |r| {
        r.receiver_id == *uid && r.status == RequestStatus::Pending
    })?;
    let mut out = Vec::with_capacity(pending.len());
    for request in pending {
        match store.get::<UserDoc>(USERS, &request.sender_id.0)? {
            Some(sender) => out.push(IncomingFriendRequest {
                id: request.id,
                sender_id: request.sender_id,
                sender_name: sender.name,
                sender_email: sender.email,
                timestamp: request.timestamp,
            }),
            None => {
                tracing::warn!(request = %request.id.0, sender = %request.sender_id.0,
                    "sender document missing, skipping request");
            }
        }
    }
    Ok(out)
}

pub fn sent_requests(store: &DocStore, uid: &UserId) -> anyhow::Result<Vec<FriendRequest>> {
    store.query::<FriendRequest>(FRIEND_REQUESTS, |r| {
        r.sender_id == *uid && r.status == RequestStatus::Pending
    })
}

/// Candidates for the add-friend search box: every user whose name
/// contains the filter, minus self, minus existing friends, minus anyone
/// with a request from `uid` already pending.
pub fn suggestions(store: &DocStore, uid: &UserId, name_filter: &str) -> anyhow::Result<Vec<UserSummary>> {
    let me: UserDoc = store.fetch(USERS, &uid.0)?;
    let pending_to: Vec<UserId> = sent_requests(store, uid)?
        .into_iter()
        .map(|r| r.receiver_id)
        .collect();
    let needle = name_filter.to_lowercase();
    let mut matches = store.query::<UserDoc>(USERS, |user| {
        user.id != *uid
            && user.name.to_lowercase().contains(&needle)
            && !me.friends.contains(&user.id)
            && !pending_to.contains(&user.id)
    })?;
    matches.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(matches
        .into_iter()
        .map(|u| UserSummary { id: u.id, name: u.name, email: u.email })
        .collect())
}

/// `uid`'s friends resolved to name/email. A dangling friend id (deleted
/// account) is logged and skipped rather than failing the listing.
pub fn friends_of(store: &DocStore, uid: &UserId) -> anyhow::Result<Vec<UserSummary>> {
    let me: UserDoc = store.fetch(USERS, &uid.0)?;
    let mut out = Vec::with_capacity(me.friends.len());
    for friend_id in &me.friends {
        match store.get::<UserDoc>(USERS, &friend_id.0)? {
            Some(friend) => out.push(UserSummary {
                id: friend.id,
                name: friend.name,
                email: friend.email,
            }),
            None => tracing::warn!(friend = %friend_id.0, "friend document missing, skipping"),
        }
    }
    Ok(out)
}

// ---- handlers ----

#[derive(Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub name: String,
}

pub async fn get_friends(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(friends_of(&state.store, &UserId(uid))?))
}

pub async fn get_friend_suggestions(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    Query(query): Query<SuggestionQuery>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(suggestions(&state.store, &UserId(uid), &query.name)?))
}

pub async fn get_rec_friend_requests(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(incoming_requests(&state.store, &UserId(uid))?))
}

pub async fn get_sent_friend_requests(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(sent_requests(&state.store, &UserId(uid))?))
}

pub async fn post_send_friend_request(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SendFriendRequest>,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    Ok(Json(send_request(&state.store, &UserId(uid), &payload.receiver_id)?))
}

pub async fn post_accept_friend_request(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<FriendRequestRef>,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    accept_request(&state.store, &UserId(uid), &payload.request_id)?;
    Ok(())
}

pub async fn post_reject_friend_request(
    Extension(state): Extension<State>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<FriendRequestRef>,
) -> crate::Result<impl IntoResponse> {
    auth::require_actor(&state.store, &headers, &uid)?;
    reject_request(&state.store, &UserId(uid), &payload.request_id)?;
    Ok(())
}

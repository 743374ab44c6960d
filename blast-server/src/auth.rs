use std::num::NonZeroU32;

use anyhow::{bail, Context};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use blast_common::{Session, SessionUser, SignInRequest, SignUpRequest, UserId};
use blast_common::documents::UserDoc;

use crate::store::{DocStore, USERS};
use crate::{AppError, State};

// Collections private to the identity layer.
const CREDENTIALS: &str = "credentials";
const SESSIONS: &str = "sessions";

pub use blast_common::TOKEN_HEADER;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const CREDENTIAL_LEN: usize = 32;
const SALT_LEN: usize = 16;
const PBKDF2_ITERS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be nonzero"),
};

/// `credentials/{email}`: salt and PBKDF2 hash, both base64.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CredentialDoc {
    uid: UserId,
    salt: String,
    hash: String,
}

/// `sessions/{token}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDoc {
    uid: UserId,
    created_at: DateTime<Utc>,
}

pub fn sign_up(store: &DocStore, req: &SignUpRequest) -> anyhow::Result<Session> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        bail!("name, email and password are all required");
    }
    let email = req.email.trim().to_lowercase();
    if store.get::<CredentialDoc>(CREDENTIALS, &email)?.is_some() {
        bail!("an account already exists for {email}");
    }

    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| anyhow::anyhow!("failed to generate salt"))?;
    let mut hash = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERS, &salt, req.password.as_bytes(), &mut hash);

    let uid = UserId::generate();
    let credential = CredentialDoc {
        uid: uid.clone(),
        salt: BASE64.encode(salt),
        hash: BASE64.encode(hash),
    };
    store.set(CREDENTIALS, &email, &credential)?;

    let user = UserDoc::new(uid.clone(), req.name.trim(), &email);
    store.set(USERS, &uid.0, &user)?;

    tracing::info!(uid = %uid.0, "new account registered");
    open_session(store, &user)
}

pub fn sign_in(store: &DocStore, req: &SignInRequest) -> anyhow::Result<Session> {
    let email = req.email.trim().to_lowercase();
    let credential: CredentialDoc = store
        .get(CREDENTIALS, &email)?
        .context("invalid email or password")?;
    let salt = BASE64.decode(&credential.salt)?;
    let hash = BASE64.decode(&credential.hash)?;
    pbkdf2::verify(PBKDF2_ALG, PBKDF2_ITERS, &salt, req.password.as_bytes(), &hash)
        .map_err(|_| anyhow::anyhow!("invalid email or password"))?;

    let user: UserDoc = store.fetch(USERS, &credential.uid.0)?;
    open_session(store, &user)
}

pub fn sign_out(store: &DocStore, token: &str) -> anyhow::Result<()> {
    store.delete(SESSIONS, token)
}

pub fn current_user(store: &DocStore, token: &str) -> anyhow::Result<SessionUser> {
    let session: SessionDoc = store.get(SESSIONS, token)?.context("no such session")?;
    let user: UserDoc = store.fetch(USERS, &session.uid.0)?;
    Ok(SessionUser {
        uid: user.id,
        name: user.name,
        email: user.email,
    })
}

fn open_session(store: &DocStore, user: &UserDoc) -> anyhow::Result<Session> {
    let token = Uuid::new_v4().to_string();
    let session = SessionDoc {
        uid: user.id.clone(),
        created_at: Utc::now(),
    };
    store.set(SESSIONS, &token, &session)?;
    Ok(Session {
        token,
        user: SessionUser {
            uid: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        },
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

/// Every `/:uid/...` route goes through here: the session token must
/// resolve to exactly the uid in the path.
pub fn require_actor(store: &DocStore, headers: &HeaderMap, uid: &str) -> Result<(), AppError> {
    let token = bearer_token(headers).ok_or_else(AppError::unauthorized)?;
    let session: SessionDoc = store
        .get(SESSIONS, token)
        .map_err(AppError::from)?
        .ok_or_else(AppError::unauthorized)?;
    if session.uid.0 != uid {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

// ---- handlers ----

pub async fn post_signup(
    Extension(state): Extension<State>,
    Json(payload): Json<SignUpRequest>,
) -> crate::Result<impl IntoResponse> {
    Ok(Json(sign_up(&state.store, &payload)?))
}

pub async fn post_signin(
    Extension(state): Extension<State>,
    Json(payload): Json<SignInRequest>,
) -> crate::Result<impl IntoResponse> {
    Ok(Json(sign_in(&state.store, &payload)?))
}

pub async fn post_signout(
    Extension(state): Extension<State>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    if let Some(token) = bearer_token(&headers) {
        sign_out(&state.store, token)?;
    }
    Ok(())
}

pub async fn get_session(
    Extension(state): Extension<State>,
    headers: HeaderMap,
) -> crate::Result<impl IntoResponse> {
    let token = bearer_token(&headers).ok_or_else(AppError::unauthorized)?;
    Ok(Json(current_user(&state.store, token)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DocStore {
        DocStore::temporary().unwrap()
    }

    fn signup(store: &DocStore, name: &str, email: &str, password: &str) -> Session {
        sign_up(
            store,
            &SignUpRequest {
                name: name.into(),
                email: email.into(),
                password: password.into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn sign_up_creates_user_document_and_session() {
        let store = store();
        let session = signup(&store, "Alice", "alice@example.com", "hunter2");
        let doc: UserDoc = store.fetch(USERS, &session.user.uid.0).unwrap();
        assert_eq!(doc.name, "Alice");
        assert_eq!(doc.email, "alice@example.com");
        assert!(doc.friends.is_empty());
        assert_eq!(current_user(&store, &session.token).unwrap(), session.user);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = store();
        signup(&store, "Alice", "alice@example.com", "hunter2");
        let err = sign_up(
            &store,
            &SignUpRequest {
                name: "Imposter".into(),
                email: "Alice@Example.com".into(),
                password: "pw".into(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_fields_are_rejected() {
        let store = store();
        let err = sign_up(
            &store,
            &SignUpRequest {
                name: "  ".into(),
                email: "a@b.c".into(),
                password: "pw".into(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn sign_in_verifies_password() {
        let store = store();
        let session = signup(&store, "Alice", "alice@example.com", "hunter2");
        let fresh = sign_in(
            &store,
            &SignInRequest {
                email: "alice@example.com".into(),
                password: "hunter2".into(),
            },
        )
        .unwrap();
        assert_eq!(fresh.user.uid, session.user.uid);
        assert_ne!(fresh.token, session.token);

        let bad = sign_in(
            &store,
            &SignInRequest {
                email: "alice@example.com".into(),
                password: "wrong".into(),
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn require_actor_checks_token_against_path_uid() {
        let store = store();
        let alice = signup(&store, "Alice", "alice@example.com", "pw");
        let bob = signup(&store, "Bob", "bob@example.com", "pw");

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, alice.token.parse().unwrap());
        assert!(require_actor(&store, &headers, &alice.user.uid.0).is_ok());
        assert!(require_actor(&store, &headers, &bob.user.uid.0).is_err());
        assert!(require_actor(&store, &HeaderMap::new(), &alice.user.uid.0).is_err());
    }

    #[test]
    fn sign_out_invalidates_the_session() {
        let store = store();
        let session = signup(&store, "Alice", "alice@example.com", "hunter2");
        sign_out(&store, &session.token).unwrap();
        assert!(current_user(&store, &session.token).is_err());
    }
}

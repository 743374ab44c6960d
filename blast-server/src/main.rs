use std::env;
use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;

mod auth;
mod blasts;
mod friends;
mod store;

use store::DocStore;

pub type Result<T> = std::result::Result<T, AppError>;

pub struct AppError(StatusCode, anyhow::Error);

impl AppError {
    pub fn unauthorized() -> Self {
        Self(StatusCode::UNAUTHORIZED, anyhow::anyhow!("not signed in as this user"))
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, format!("Something went wrong: {}", self.1)).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

#[derive(Clone)]
pub struct State {
    store: DocStore,
}

impl State {
    pub fn new(path: &str) -> anyhow::Result<Self> {
        Ok(Self { store: DocStore::open(path)? })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = env::args().collect();
    let mut port = 8000;
    if let Some(p) = args.get(1) {
        port = p.parse()?;
    }
    let data_dir = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| format!("blast-db-{port}"));
    let state = State::new(&data_dir)?;
    let app = axum::Router::new()
        .route("/", get(root))
        .route("/signup", post(auth::post_signup))
        .route("/signin", post(auth::post_signin))
        .route("/signout", post(auth::post_signout))
        .route("/session", get(auth::get_session))
        .route("/:uid/get/friends", get(friends::get_friends))
        .route("/:uid/get/friend-suggestions", get(friends::get_friend_suggestions))
        .route("/:uid/get/rec-friend-requests", get(friends::get_rec_friend_requests))
        .route("/:uid/get/sent-friend-requests", get(friends::get_sent_friend_requests))
        .route("/:uid/post/send-friend-request", post(friends::post_send_friend_request))
        .route("/:uid/post/accept-friend-request", post(friends::post_accept_friend_request))
        .route("/:uid/post/reject-friend-request", post(friends::post_reject_friend_request))
        .route("/:uid/get/inbox", get(blasts::get_inbox))
        .route("/:uid/get/sent-blasts", get(blasts::get_sent_blasts))
        .route("/:uid/post/create-blast", post(blasts::post_create_blast))
        .route("/:uid/post/respond-blast", post(blasts::post_respond_blast))
        .layer(Extension(state));
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn root() -> &'static str {
    "BLAST"
}

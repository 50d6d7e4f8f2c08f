use actix_session::{Session, SessionExt};
use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::SessionError;

pub const ADMIN_SESSION_KEY: &str = "admin";

/// Who is signed in to the admin view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub username: String,
}

/// Checks admin credentials. The rest of the app only sees the identity
/// it hands back.
pub trait Authenticator: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Result<AdminIdentity, SessionError>;
}

/// Credentials supplied at start-up. Without a password, nobody can sign in.
pub struct ConfiguredAuthenticator {
    username: String,
    password: Option<String>,
}

impl ConfiguredAuthenticator {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password: password.filter(|p| !p.is_empty()),
        }
    }
}

impl Authenticator for ConfiguredAuthenticator {
    fn verify(&self, username: &str, password: &str) -> Result<AdminIdentity, SessionError> {
        let Some(expected) = &self.password else {
            return Err(SessionError::Disabled);
        };
        if username == self.username && password == expected {
            Ok(AdminIdentity {
                username: username.to_string(),
            })
        } else {
            Err(SessionError::InvalidCredentials)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(String),
    SignedOut(String),
}

/// Broadcast of admin sign-in/sign-out.
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

/// Logs every session change. Abort the handle on shutdown.
pub fn spawn_event_logger(events: &SessionEvents) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::SignedIn(user)) => info!(user = %user, "Admin signed in"),
                Ok(SessionEvent::SignedOut(user)) => info!(user = %user, "Admin signed out"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session event logger fell behind")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub fn sign_in(session: &Session, identity: &AdminIdentity) -> Result<(), SessionError> {
    session.renew();
    session
        .insert(ADMIN_SESSION_KEY, identity)
        .map_err(|e| SessionError::Storage(e.to_string()))
}

/// Ends the session, returning who was signed in (if anyone).
pub fn sign_out(session: &Session) -> Option<AdminIdentity> {
    let identity = session.get::<AdminIdentity>(ADMIN_SESSION_KEY).ok().flatten();
    session.purge();
    identity
}

/// Extractor for routes that need a signed-in admin. A session that can't
/// be read counts as no session.
#[derive(Debug, Clone)]
pub struct AdminSession(pub AdminIdentity);

impl FromRequest for AdminSession {
    type Error = SessionError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.get_session().get::<AdminIdentity>(ADMIN_SESSION_KEY) {
            Ok(Some(identity)) => Ok(AdminSession(identity)),
            Ok(None) => Err(SessionError::Missing),
            Err(e) => {
                warn!(error = %e, "Unreadable admin session");
                Err(SessionError::Missing)
            }
        };
        ready(result)
    }
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Missing | SessionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            SessionError::Disabled => StatusCode::FORBIDDEN,
            SessionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({"success": false, "error": self.to_string()}))
    }
}

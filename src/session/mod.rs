use crate::models::Voter;
use crate::service::ElectionService;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::fmt;
use uuid::Uuid;

/// Credentials for one logged-in voter. Created by
/// [`ElectionService::login`] and handed explicitly to every service call;
/// dropped (or consumed by [`AuthSession::logout`]) when the voter leaves.
#[derive(Clone)]
pub struct AuthSession {
    id: Uuid,
    token: String,
    voter: Voter,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// A lifetime too large to represent as a timestamp is treated as no
    /// expiry; the backend still rejects the token once it lapses.
    pub fn new(token: String, voter: Voter, expires_in_secs: Option<i64>) -> Self {
        let created_at = Utc::now();
        let id = Uuid::new_v4();
        let expires_at = expires_in_secs.and_then(|secs| {
            let at = Duration::try_seconds(secs).and_then(|d| created_at.checked_add_signed(d));
            if at.is_none() {
                warn!("Session {} has an out-of-range lifetime of {}s, ignoring it", id, secs);
            }
            at
        });
        Self {
            id,
            token,
            voter,
            created_at,
            expires_at,
        }
    }

    /// Session identifier for logs. The bearer token is never logged.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    pub fn voter(&self) -> &Voter {
        &self.voter
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Ends the session on the backend. The session is consumed either way;
    /// a failed server-side logout only gets logged.
    pub async fn logout(self, service: &dyn ElectionService) {
        match service.logout(&self).await {
            Ok(()) => info!("Session {} logged out", self.id),
            Err(e) => warn!("Logout for session {} failed on the server: {}", self.id, e),
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("id", &self.id)
            .field("voter", &self.voter.student_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

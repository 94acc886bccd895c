pub mod http;

use crate::error::ServiceError;
use crate::models::{Ballot, Election, Position, Receipt};
use crate::session::AuthSession;
use async_trait::async_trait;

pub use http::HttpElectionService;

/// The backend operations the voting client relies on. Every call except
/// `login` is made on behalf of an explicit session.
#[async_trait]
pub trait ElectionService: Send + Sync {
    async fn login(&self, student_id: &str, password: &str) -> Result<AuthSession, ServiceError>;

    async fn logout(&self, session: &AuthSession) -> Result<(), ServiceError>;

    async fn fetch_election(
        &self,
        session: &AuthSession,
        election_id: &str,
    ) -> Result<Election, ServiceError>;

    /// Positions in ballot order, each with its candidates in display order.
    async fn fetch_candidates_by_position(
        &self,
        session: &AuthSession,
        election_id: &str,
    ) -> Result<Vec<Position>, ServiceError>;

    async fn submit_ballot(
        &self,
        session: &AuthSession,
        election_id: &str,
        ballot: &Ballot,
    ) -> Result<Receipt, ServiceError>;
}

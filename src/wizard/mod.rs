pub mod events;

use crate::error::{Failure, LoadFailure, ServiceError, WizardError};
use crate::models::{
    check_ballot_layout, Ballot, Choice, Election, ElectionStatus, Position, Receipt, Selection,
};
use crate::service::ElectionService;
use crate::session::AuthSession;
use chrono::Utc;
use events::{LogEvents, WizardEvents};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

const ABSTAINED_LABEL: &str = "Abstained";
const UNSET_LABEL: &str = "No selection";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    Loading,
    /// Showing the ballot for `positions[index]`. `editing` is set when the
    /// voter jumped here from the summary; `next()` then returns to it.
    Voting { index: usize, editing: bool },
    Summary,
    Submitting,
    Submitted(Receipt),
    Failed(LoadFailure),
    /// The backend rejected the session mid-vote; the voter must log in again.
    SessionEnded,
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::Loading => "loading",
            WizardState::Voting { .. } => "voting",
            WizardState::Summary => "reviewing",
            WizardState::Submitting => "submitting",
            WizardState::Submitted(_) => "submitted",
            WizardState::Failed(_) => "failed",
            WizardState::SessionEnded => "logged out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WizardState::Submitted(_) | WizardState::Failed(_) | WizardState::SessionEnded
        )
    }
}

/// One row of the review screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub position_id: String,
    pub position_name: String,
    pub choice: Option<Choice>,
    pub label: String,
}

pub struct VotingWizard {
    service: Arc<dyn ElectionService>,
    session: Option<AuthSession>,
    events: Box<dyn WizardEvents>,
    load_timeout: Duration,
    election_id: String,
    election: Option<Election>,
    positions: Vec<Position>,
    selection: Selection,
    state: WizardState,
    notice: Option<Failure>,
}

impl VotingWizard {
    pub fn new(service: Arc<dyn ElectionService>, session: AuthSession) -> Self {
        Self {
            service,
            session: Some(session),
            events: Box::new(LogEvents),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            election_id: String::new(),
            election: None,
            positions: Vec::new(),
            selection: Selection::new(),
            state: WizardState::Loading,
            notice: None,
        }
    }

    pub fn with_events(mut self, events: Box<dyn WizardEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Loads the election and its ballot, then shows the first position.
    /// Any failure, including running past the load timeout, ends the
    /// wizard in [`WizardState::Failed`].
    pub async fn start(&mut self, election_id: &str) -> Result<(), Failure> {
        if self.state != WizardState::Loading || !self.election_id.is_empty() {
            return Err(self.rejected("start").into());
        }
        self.election_id = election_id.to_string();

        let Some(session) = self.session.as_ref() else {
            return Err(self.fail_load(LoadFailure::Unauthorized("no active session".to_string())));
        };
        info!("Loading ballot for election {} (session {})", election_id, session.id());

        let service = Arc::clone(&self.service);
        let load = async {
            let election = service.fetch_election(session, election_id).await?;
            let positions = service.fetch_candidates_by_position(session, election_id).await?;
            Ok::<_, ServiceError>((election, positions))
        };

        let loaded = tokio::time::timeout(self.load_timeout, load).await;
        let (election, positions) = match loaded {
            Err(_) => return Err(self.fail_load(LoadFailure::Timeout(self.load_timeout))),
            Ok(Err(e)) => return Err(self.fail_load(e.into())),
            Ok(Ok(data)) => data,
        };

        if election.status != ElectionStatus::Active {
            return Err(self.fail_load(LoadFailure::ElectionNotOpen(election.status)));
        }
        if election.has_voted {
            return Err(self.fail_load(LoadFailure::AlreadyVoted));
        }
        if let Err(detail) = check_ballot_layout(&positions) {
            return Err(self.fail_load(LoadFailure::Schema(detail)));
        }

        // Positions nobody is running for cannot be voted on; leave them off.
        let (positions, empty): (Vec<Position>, Vec<Position>) =
            positions.into_iter().partition(|p| !p.candidates.is_empty());
        for position in &empty {
            warn!("Position {} ({}) has no candidates, leaving it off the ballot", position.id, position.name);
        }
        if positions.is_empty() {
            return Err(self.fail_load(LoadFailure::EmptyBallot));
        }

        info!("Loaded {} position(s) for '{}'", positions.len(), election.title);
        self.election = Some(election);
        self.positions = positions;
        self.state = WizardState::Voting { index: 0, editing: false };
        Ok(())
    }

    /// Records a choice for the position currently on screen. Does not move.
    pub fn select(&mut self, position_id: &str, choice: Choice) -> Result<(), WizardError> {
        let WizardState::Voting { index, .. } = self.state else {
            return Err(self.rejected("select"));
        };
        let position = &self.positions[index];
        if position.id != position_id {
            return Err(WizardError::PositionMismatch(position_id.to_string()));
        }
        if let Choice::Candidate(candidate_id) = &choice {
            if position.candidate(candidate_id).is_none() {
                return Err(WizardError::UnknownCandidate {
                    position_id: position_id.to_string(),
                    candidate_id: candidate_id.clone(),
                });
            }
        }

        debug!("Position {} -> {:?}", position_id, choice);
        self.selection.set(position_id, choice);
        self.notice = None;
        Ok(())
    }

    /// Moves forward. Returns false (and changes nothing) when the current
    /// position has no choice yet or the wizard is not on a ballot step.
    pub fn next(&mut self) -> bool {
        let WizardState::Voting { index, editing } = self.state else {
            return false;
        };
        if !self.selection.is_set(&self.positions[index].id) {
            debug!("Next ignored, position {} has no choice yet", index);
            return false;
        }

        let last = index + 1 == self.positions.len();
        self.state = if last || (editing && self.selection.is_complete(&self.positions)) {
            WizardState::Summary
        } else {
            WizardState::Voting { index: index + 1, editing }
        };
        true
    }

    pub fn previous(&mut self) -> bool {
        match self.state {
            WizardState::Voting { index, editing } if index > 0 => {
                self.state = WizardState::Voting { index: index - 1, editing };
                self.notice = None;
                true
            }
            WizardState::Summary => {
                self.state = WizardState::Voting {
                    index: self.positions.len() - 1,
                    editing: false,
                };
                self.notice = None;
                true
            }
            _ => false,
        }
    }

    /// Jumps from the summary back to one position for a change.
    pub fn edit_position(&mut self, index: usize) -> Result<(), WizardError> {
        if self.state != WizardState::Summary {
            return Err(self.rejected("edit"));
        }
        if index >= self.positions.len() {
            return Err(WizardError::PositionOutOfRange(index));
        }
        self.state = WizardState::Voting { index, editing: true };
        self.notice = None;
        Ok(())
    }

    /// Sends the ballot. Validation and server failures return the wizard to
    /// the summary with the selection intact; an auth failure ends it.
    pub async fn submit(&mut self) -> Result<Receipt, Failure> {
        if self.state != WizardState::Summary {
            return Err(self.rejected("submit").into());
        }

        let ballot = self.ballot();
        if ballot.is_empty() {
            let failure = Failure::Validation(
                "Please vote for at least one candidate before submitting your ballot.".to_string(),
            );
            self.notice = Some(failure.clone());
            return Err(failure);
        }

        let expired = match self.session.as_ref() {
            Some(session) => session.is_expired(Utc::now()),
            None => true,
        };
        if expired {
            return Err(self.end_session("Your session has expired. Please log in again.".to_string()));
        }

        self.state = WizardState::Submitting;
        self.notice = None;
        info!(
            "Submitting {} vote(s) for election {}",
            ballot.len(),
            self.election_id
        );

        let service = Arc::clone(&self.service);
        let result = match self.session.as_ref() {
            Some(session) => service.submit_ballot(session, &self.election_id, &ballot).await,
            None => Err(ServiceError::Unauthorized("no active session".to_string())),
        };

        match result {
            Ok(receipt) => {
                info!("Ballot accepted for election {}", self.election_id);
                self.selection.clear();
                self.state = WizardState::Submitted(receipt.clone());
                self.events.on_submitted(&receipt);
                Ok(receipt)
            }
            Err(ServiceError::Unauthorized(message)) => Err(self.end_session(message)),
            Err(ServiceError::Validation(message)) => {
                warn!("Ballot rejected: {}", message);
                Err(self.back_to_summary(Failure::Validation(message)))
            }
            Err(e) => {
                warn!("Ballot submission failed: {}", e);
                Err(self.back_to_summary(Failure::Submit(format!(
                    "We could not submit your ballot ({}). Your choices were kept, please try again.",
                    e
                ))))
            }
        }
    }

    /// Ends the wizard and hands the session back to the host.
    pub fn into_session(self) -> Option<AuthSession> {
        self.session
    }

    /// Ends the wizard and logs its session out, whatever state it reached.
    /// A session already dropped after an auth failure is not logged out again.
    pub async fn close(self) {
        let state = self.state.name();
        match self.session {
            Some(session) => {
                info!("Closing wizard while {}", state);
                session.logout(self.service.as_ref()).await;
            }
            None => debug!("Closing wizard while {}, no session to log out", state),
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn election(&self) -> Option<&Election> {
        self.election.as_ref()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Message to show above the ballot or summary, if any.
    pub fn notice(&self) -> Option<&Failure> {
        self.notice.as_ref()
    }

    pub fn current_position(&self) -> Option<&Position> {
        match self.state {
            WizardState::Voting { index, .. } => self.positions.get(index),
            _ => None,
        }
    }

    /// One-based step number and total, while voting.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self.state {
            WizardState::Voting { index, .. } => Some((index + 1, self.positions.len())),
            _ => None,
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.current_position()
            .is_some_and(|p| self.selection.is_set(&p.id))
    }

    pub fn can_go_previous(&self) -> bool {
        match self.state {
            WizardState::Voting { index, .. } => index > 0,
            WizardState::Summary => true,
            _ => false,
        }
    }

    pub fn ballot(&self) -> Ballot {
        Ballot::from_selection(&self.positions, &self.selection)
    }

    pub fn summary(&self) -> Vec<SummaryLine> {
        self.positions
            .iter()
            .map(|position| {
                let choice = self.selection.get(&position.id).cloned();
                let label = match &choice {
                    Some(Choice::Abstain) => ABSTAINED_LABEL.to_string(),
                    Some(Choice::Candidate(id)) => position
                        .candidate(id)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| UNSET_LABEL.to_string()),
                    None => UNSET_LABEL.to_string(),
                };
                SummaryLine {
                    position_id: position.id.clone(),
                    position_name: position.name.clone(),
                    choice,
                    label,
                }
            })
            .collect()
    }

    fn rejected(&self, action: &'static str) -> WizardError {
        WizardError::InvalidState {
            action,
            state: self.state.name(),
        }
    }

    fn fail_load(&mut self, reason: LoadFailure) -> Failure {
        warn!("Loading election {} failed: {}", self.election_id, reason);
        self.state = WizardState::Failed(reason.clone());
        self.events.on_load_failed(&reason);
        let failure = Failure::Load(reason);
        self.notice = Some(failure.clone());
        failure
    }

    fn back_to_summary(&mut self, failure: Failure) -> Failure {
        self.state = WizardState::Summary;
        self.notice = Some(failure.clone());
        failure
    }

    fn end_session(&mut self, message: String) -> Failure {
        warn!("Session rejected while submitting: {}", message);
        self.selection.clear();
        self.session = None;
        self.state = WizardState::SessionEnded;
        self.events.on_auth_expired();
        let failure = Failure::Auth(message);
        self.notice = Some(failure.clone());
        failure
    }
}

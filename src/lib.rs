//! Client-side voting wizard for the student election portal: walks a voter
//! through each position, collects choices and abstentions, and submits the
//! ballot to the election backend.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod service;
pub mod session;
pub mod wizard;

pub use error::{Failure, LoadFailure, ServiceError, WizardError};
pub use service::{ElectionService, HttpElectionService};
pub use session::AuthSession;
pub use wizard::{VotingWizard, WizardState};

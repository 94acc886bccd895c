use crate::error::LoadFailure;
use crate::models::Receipt;
use log::{error, info, warn};

/// Hooks for the page hosting the wizard. Each is called at most once per
/// wizard, on the transition into the matching terminal state.
pub trait WizardEvents: Send {
    fn on_submitted(&self, _receipt: &Receipt) {}

    fn on_load_failed(&self, _reason: &LoadFailure) {}

    fn on_auth_expired(&self) {}
}

/// Default hooks: only log.
pub struct LogEvents;

impl WizardEvents for LogEvents {
    fn on_submitted(&self, receipt: &Receipt) {
        info!("Ballot accepted, receipt {}", receipt.receipt_id);
    }

    fn on_load_failed(&self, reason: &LoadFailure) {
        error!("Ballot could not be loaded: {}", reason);
    }

    fn on_auth_expired(&self) {
        warn!("Session expired during voting, login required");
    }
}

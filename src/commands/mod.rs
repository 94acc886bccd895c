use crate::error::Failure;
use crate::models::Choice;
use crate::wizard::VotingWizard;
use log::{debug, info};

pub const HELP: &str =
    "Commands: <number> choose a candidate | a, abstain | n, next | b, back | edit <n> | submit | q, quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// One-based candidate number on the current position.
    Choose(usize),
    Abstain,
    Next,
    Back,
    /// One-based position number on the summary.
    Edit(usize),
    Submit,
    Quit,
    Help,
}

/// Parses one line of voter input. Returns `None` for anything unrecognized.
pub fn parse_action(input: &str) -> Option<Action> {
    let input = input.trim().to_lowercase();
    let mut parts = input.split_whitespace();
    let command = parts.next()?;
    let argument = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match (command, argument) {
        ("a" | "abstain", None) => Some(Action::Abstain),
        ("n" | "next" | "review", None) => Some(Action::Next),
        ("b" | "back" | "previous", None) => Some(Action::Back),
        ("submit", None) => Some(Action::Submit),
        ("q" | "quit" | "exit", None) => Some(Action::Quit),
        ("h" | "help" | "?", None) => Some(Action::Help),
        ("e" | "edit", Some(n)) => n.parse::<usize>().ok().filter(|n| *n > 0).map(Action::Edit),
        (n, None) => n.parse::<usize>().ok().filter(|n| *n > 0).map(Action::Choose),
        _ => None,
    }
}

/// Applies an action to the wizard. An `Err` carries a message for the voter;
/// the wizard's own notice already reflects submit and load failures.
pub async fn dispatch(
    wizard: &mut VotingWizard,
    action: Action,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    debug!("Dispatching {:?} while {}", action, wizard.state().name());
    match action {
        Action::Choose(number) => {
            let Some(position) = wizard.current_position() else {
                return Err("There is no ballot on screen to choose from.".into());
            };
            let Some(candidate) = number.checked_sub(1).and_then(|i| position.candidates.get(i)) else {
                return Err(format!("There is no candidate number {}.", number).into());
            };
            let (position_id, candidate_id) = (position.id.clone(), candidate.id.clone());
            wizard.select(&position_id, Choice::Candidate(candidate_id))?;
        }
        Action::Abstain => {
            let Some(position_id) = wizard.current_position().map(|p| p.id.clone()) else {
                return Err("There is no ballot on screen to abstain on.".into());
            };
            wizard.select(&position_id, Choice::Abstain)?;
        }
        Action::Next => {
            if !wizard.next() {
                return Err("Choose a candidate or abstain before moving on.".into());
            }
        }
        Action::Back => {
            if !wizard.previous() {
                return Err("You are already at the first position.".into());
            }
        }
        Action::Edit(number) => {
            let Some(index) = number.checked_sub(1) else {
                return Err(format!("There is no position number {}.", number).into());
            };
            wizard.edit_position(index)?;
        }
        Action::Submit => {
            let receipt = wizard.submit().await?;
            info!("Ballot submitted, receipt {}", receipt.receipt_id);
        }
        Action::Quit | Action::Help => {}
    }
    Ok(())
}

/// Whether `err` is the failure the wizard is currently showing as its
/// notice, in which case the host should not print it a second time.
pub fn is_shown_as_notice(
    wizard: &VotingWizard,
    err: &(dyn std::error::Error + Send + Sync + 'static),
) -> bool {
    match (err.downcast_ref::<Failure>(), wizard.notice()) {
        (Some(failure), Some(notice)) => failure == notice,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{election, position};
    use crate::error::ServiceError;
    use crate::service::mock::{session, ScriptedService};
    use crate::wizard::WizardState;
    use std::sync::Arc;

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_action("2"), Some(Action::Choose(2)));
        assert_eq!(parse_action("  Abstain "), Some(Action::Abstain));
        assert_eq!(parse_action("n"), Some(Action::Next));
        assert_eq!(parse_action("back"), Some(Action::Back));
        assert_eq!(parse_action("edit 3"), Some(Action::Edit(3)));
        assert_eq!(parse_action("SUBMIT"), Some(Action::Submit));
        assert_eq!(parse_action("q"), Some(Action::Quit));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_action(""), None);
        assert_eq!(parse_action("0"), None);
        assert_eq!(parse_action("edit"), None);
        assert_eq!(parse_action("edit x"), None);
        assert_eq!(parse_action("next please"), None);
        assert_eq!(parse_action("vote"), None);
    }

    #[tokio::test]
    async fn dispatch_walks_a_ballot_to_submission() {
        let positions = vec![
            position("pres", "President", &[("c1", "Ana"), ("c2", "Ben")]),
            position("sec", "Secretary", &[("c5", "Ed")]),
        ];
        let service = Arc::new(ScriptedService::new(election("e1"), positions));
        let mut wizard = VotingWizard::new(service.clone(), session());
        wizard.start("e1").await.unwrap();

        assert!(dispatch(&mut wizard, Action::Next).await.is_err());
        assert!(dispatch(&mut wizard, Action::Choose(3)).await.is_err());
        dispatch(&mut wizard, Action::Choose(2)).await.unwrap();
        dispatch(&mut wizard, Action::Next).await.unwrap();
        dispatch(&mut wizard, Action::Abstain).await.unwrap();
        dispatch(&mut wizard, Action::Next).await.unwrap();
        assert_eq!(*wizard.state(), WizardState::Summary);

        dispatch(&mut wizard, Action::Submit).await.unwrap();
        assert!(matches!(wizard.state(), WizardState::Submitted(_)));
        assert_eq!(service.submitted()[0].votes[0].candidate_id, "c2");
    }

    #[tokio::test]
    async fn zero_numbers_are_refused_without_changing_state() {
        let positions = vec![
            position("pres", "President", &[("c1", "Ana")]),
            position("sec", "Secretary", &[("c5", "Ed")]),
        ];
        let service = Arc::new(ScriptedService::new(election("e1"), positions));
        let mut wizard = VotingWizard::new(service, session());
        wizard.start("e1").await.unwrap();

        let err = dispatch(&mut wizard, Action::Choose(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "There is no candidate number 0.");
        assert!(wizard.selection().is_empty());

        for _ in 0..2 {
            dispatch(&mut wizard, Action::Abstain).await.unwrap();
            dispatch(&mut wizard, Action::Next).await.unwrap();
        }
        assert_eq!(*wizard.state(), WizardState::Summary);
        let err = dispatch(&mut wizard, Action::Edit(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "There is no position number 0.");
        assert_eq!(*wizard.state(), WizardState::Summary);
    }

    #[tokio::test]
    async fn only_errors_missing_from_the_notice_are_printed() {
        let positions = vec![position("pres", "President", &[("c1", "Ana")])];
        let service = Arc::new(ScriptedService::new(election("e1"), positions));
        let mut wizard = VotingWizard::new(service.clone(), session());
        wizard.start("e1").await.unwrap();
        dispatch(&mut wizard, Action::Choose(1)).await.unwrap();
        dispatch(&mut wizard, Action::Next).await.unwrap();

        service.push_submit_result(Err(ServiceError::Network("connection reset".to_string())));
        let err = dispatch(&mut wizard, Action::Submit).await.unwrap_err();
        assert!(is_shown_as_notice(&wizard, &*err));

        // Back on the ballot the old notice is gone, so a refused submit is printed.
        dispatch(&mut wizard, Action::Back).await.unwrap();
        let err = dispatch(&mut wizard, Action::Submit).await.unwrap_err();
        assert!(wizard.notice().is_none());
        assert!(!is_shown_as_notice(&wizard, &*err));

        let err = dispatch(&mut wizard, Action::Edit(0)).await.unwrap_err();
        assert!(!is_shown_as_notice(&wizard, &*err));
    }
}

use crate::error::Failure;
use crate::models::{Candidate, Choice};
use crate::wizard::{VotingWizard, WizardState};
use std::fmt::Write;

const MAX_NAME_LEN: usize = 60;

/// Renders whatever the wizard is currently showing as plain text.
pub fn render(wizard: &VotingWizard) -> String {
    let mut out = String::new();

    if let Some(election) = wizard.election() {
        let _ = writeln!(out, "== {} ==", election.title);
    }

    match wizard.state() {
        WizardState::Loading => out.push_str("Loading ballot...\n"),
        WizardState::Voting { .. } => render_step(wizard, &mut out),
        WizardState::Summary => render_summary(wizard, &mut out),
        WizardState::Submitting => out.push_str("Submitting your ballot...\n"),
        WizardState::Submitted(receipt) => {
            out.push_str("Your ballot has been cast. Thank you for voting!\n");
            if let Some(message) = &receipt.message {
                let _ = writeln!(out, "{}", message);
            }
            let _ = writeln!(out, "Receipt: {}", receipt.receipt_id);
        }
        WizardState::Failed(reason) => {
            let _ = writeln!(out, "The ballot could not be opened: {}", reason);
        }
        WizardState::SessionEnded => {
            if let Some(notice) = wizard.notice() {
                let _ = writeln!(out, "{}", notice_line(notice));
            }
            out.push_str("Please log in again to vote.\n");
        }
    }

    out
}

fn render_step(wizard: &VotingWizard, out: &mut String) {
    let (Some(position), Some((step, total))) = (wizard.current_position(), wizard.progress())
    else {
        return;
    };

    if let Some(notice) = wizard.notice() {
        let _ = writeln!(out, "{}", notice_line(notice));
    }
    let _ = writeln!(out, "Position {} of {}: {}", step, total, position.name);

    let current = wizard.selection().get(&position.id);
    for (i, candidate) in position.candidates.iter().enumerate() {
        let chosen = matches!(current, Some(Choice::Candidate(id)) if *id == candidate.id);
        let _ = writeln!(out, "  {} [{}] {}", marker(chosen), i + 1, candidate_line(candidate));
    }
    let _ = writeln!(out, "  {} [a] Abstain", marker(current == Some(&Choice::Abstain)));

    let mut controls = Vec::new();
    if wizard.can_go_previous() {
        controls.push("back");
    }
    if wizard.can_go_next() {
        controls.push(if step == total { "review" } else { "next" });
    }
    if !controls.is_empty() {
        let _ = writeln!(out, "({})", controls.join(" | "));
    }
}

fn render_summary(wizard: &VotingWizard, out: &mut String) {
    if let Some(notice) = wizard.notice() {
        let _ = writeln!(out, "{}", notice_line(notice));
    }
    out.push_str("Review your ballot:\n");
    for (i, line) in wizard.summary().iter().enumerate() {
        let _ = writeln!(out, "  {}. {}: {}", i + 1, line.position_name, line.label);
    }
    out.push_str("(edit <n> | back | submit)\n");
}

fn marker(chosen: bool) -> &'static str {
    if chosen { "(x)" } else { "( )" }
}

fn candidate_line(candidate: &Candidate) -> String {
    let name = truncate(&candidate.name, MAX_NAME_LEN);
    let details: Vec<&str> = [candidate.party.as_deref(), candidate.department.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if details.is_empty() {
        name
    } else {
        format!("{} ({})", name, details.join(", "))
    }
}

pub fn notice_line(notice: &Failure) -> String {
    let prefix = match notice {
        Failure::Submit(_) => "Submission failed",
        Failure::Validation(_) => "Please check your ballot",
        Failure::Auth(_) => "Session ended",
        Failure::Load(_) | Failure::Rejected(_) => return format!("! {}", notice),
    };
    format!("! {}: {}", prefix, notice)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ElectionStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    // Whether the logged-in voter already cast a ballot here
    pub has_voted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Upcoming,
    Active,
    Ended,
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElectionStatus::Upcoming => "upcoming",
            ElectionStatus::Active => "active",
            ElectionStatus::Ended => "ended",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub name: String,
    pub candidates: Vec<Candidate>,
}

impl Position {
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub party: Option<String>,
    pub department: Option<String>,
}

/// A voter's decision for one position. Unset is represented by the
/// absence of an entry in [`Selection`], never by a variant here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    Candidate(String),
    Abstain,
}

/// In-progress decisions keyed by position id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    entries: HashMap<String, Choice>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position_id: &str) -> Option<&Choice> {
        self.entries.get(position_id)
    }

    pub fn is_set(&self, position_id: &str) -> bool {
        self.entries.contains_key(position_id)
    }

    /// Records a choice, overwriting whatever was there before.
    pub fn set(&mut self, position_id: &str, choice: Choice) {
        self.entries.insert(position_id.to_string(), choice);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_complete(&self, positions: &[Position]) -> bool {
        positions.iter().all(|p| self.is_set(&p.id))
    }
}

/// Checks that position ids are unique across the ballot and candidate ids
/// are unique within each position. Selection entries are keyed by position
/// id, so a repeated id would let one choice complete two steps.
pub fn check_ballot_layout(positions: &[Position]) -> Result<(), String> {
    let mut position_ids = HashSet::new();
    for position in positions {
        if !position_ids.insert(position.id.as_str()) {
            return Err(format!("position id '{}' appears more than once", position.id));
        }
        let mut candidate_ids = HashSet::new();
        for candidate in &position.candidates {
            if !candidate_ids.insert(candidate.id.as_str()) {
                return Err(format!(
                    "candidate id '{}' appears more than once under position '{}'",
                    candidate.id, position.id
                ));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry {
    pub position_id: String,
    pub candidate_id: String,
}

/// Submission payload: only positions where a real candidate was chosen,
/// in ballot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub votes: Vec<BallotEntry>,
}

impl Ballot {
    pub fn from_selection(positions: &[Position], selection: &Selection) -> Self {
        let votes = positions
            .iter()
            .filter_map(|position| match selection.get(&position.id) {
                Some(Choice::Candidate(candidate_id)) => Some(BallotEntry {
                    position_id: position.id.clone(),
                    candidate_id: candidate_id.clone(),
                }),
                _ => None,
            })
            .collect();

        Self { votes }
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: String,
    pub student_id: String,
    pub name: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn candidate(id: &str, name: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
            party: None,
            department: None,
        }
    }

    pub fn position(id: &str, name: &str, candidates: &[(&str, &str)]) -> Position {
        Position {
            id: id.to_string(),
            name: name.to_string(),
            candidates: candidates.iter().map(|(cid, cname)| candidate(cid, cname)).collect(),
        }
    }

    pub fn election(id: &str) -> Election {
        Election {
            id: id.to_string(),
            title: "Student Council 2026".to_string(),
            description: None,
            status: ElectionStatus::Active,
            starts_at: None,
            ends_at: None,
            has_voted: false,
        }
    }
}

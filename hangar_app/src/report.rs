use std::fmt;

use hangar_core::{BuyList, Deficiency};
use hangar_esi::{SkipReason, SkippedIdentity};

const NO_IDENTITIES: &str = "You have no authorized characters!";
const NO_REQUIREMENTS: &str =
    "You have not set a requirements file, use `hangar set <file>` to upload one!";
const NO_DEFICIENCIES: &str = "No state errors found!";
const NOTHING_TO_BUY: &str = "Nothing to buy!";
const NO_SNAPSHOTS: &str = "No asset snapshots could be exported!";
const NO_SHIPS: &str = "No fitted ships.";

/// Deficiencies found for one identity's snapshot, possibly none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeficiencySection {
    pub owner_name: String,
    pub is_corporation: bool,
    pub deficiencies: Vec<Deficiency>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckReport {
    NoIdentities,
    NoRequirementSet,
    Checked {
        sections: Vec<DeficiencySection>,
        skipped: Vec<SkippedIdentity>,
    },
}

impl CheckReport {
    pub fn has_deficiencies(&self) -> bool {
        match self {
            Self::Checked { sections, .. } => sections
                .iter()
                .any(|section| !section.deficiencies.is_empty()),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuyReport {
    NoIdentities,
    NoRequirementSet,
    Accumulated {
        buy_list: BuyList,
        skipped: Vec<SkippedIdentity>,
    },
}

/// Current holdings of one identity rendered as a requirement document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDocument {
    pub owner_name: String,
    pub is_corporation: bool,
    pub document: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateReport {
    NoIdentities,
    Exported {
        documents: Vec<StateDocument>,
        skipped: Vec<SkippedIdentity>,
    },
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdentities => f.write_str(NO_IDENTITIES),
            Self::NoRequirementSet => f.write_str(NO_REQUIREMENTS),
            Self::Checked { sections, skipped } => {
                let mut lines = deficiency_lines(sections);
                if lines.is_empty() {
                    lines.push(NO_DEFICIENCIES.to_owned());
                }
                push_skipped(&mut lines, skipped);
                f.write_str(&lines.join("\n"))
            }
        }
    }
}

impl fmt::Display for BuyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdentities => f.write_str(NO_IDENTITIES),
            Self::NoRequirementSet => f.write_str(NO_REQUIREMENTS),
            Self::Accumulated { buy_list, skipped } => {
                let mut lines = if buy_list.is_empty() {
                    vec![NOTHING_TO_BUY.to_owned()]
                } else {
                    vec!["Buy list:".to_owned(), buy_list.to_string()]
                };
                push_skipped(&mut lines, skipped);
                f.write_str(&lines.join("\n"))
            }
        }
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdentities => f.write_str(NO_IDENTITIES),
            Self::Exported { documents, skipped } => {
                let mut lines = Vec::new();
                for document in documents {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(format!("## {}", document.owner_name));
                    let body = document.document.trim_end();
                    lines.push(if body.is_empty() { NO_SHIPS } else { body }.to_owned());
                }
                if lines.is_empty() {
                    lines.push(NO_SNAPSHOTS.to_owned());
                }
                push_skipped(&mut lines, skipped);
                f.write_str(&lines.join("\n"))
            }
        }
    }
}

/// Deficiency lines grouped under `## owner` headers. A header is written
/// only once its first deficiency is, so sections without any stay silent.
fn deficiency_lines(sections: &[DeficiencySection]) -> Vec<String> {
    let mut lines = Vec::new();
    for section in sections {
        let mut header = Some(format!("## {}", section.owner_name));
        for deficiency in &section.deficiencies {
            if let Some(header) = header.take() {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(header);
            }
            lines.push(deficiency.to_string());
        }
    }
    lines
}

fn push_skipped(lines: &mut Vec<String>, skipped: &[SkippedIdentity]) {
    if skipped.is_empty() {
        return;
    }
    lines.push(String::new());
    for entry in skipped {
        let reason = match entry.reason {
            SkipReason::Deauthorized => "access was revoked, link it again with `hangar auth`",
            SkipReason::TimedOut => "asset fetch timed out",
        };
        lines.push(format!("Skipped {}: {reason}", entry.label));
    }
}

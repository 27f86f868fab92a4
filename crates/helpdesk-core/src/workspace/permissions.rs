//! Who may do what on a ticket.
//!
//! This is the only place that compares the current user with the assignee.

use serde::Serialize;
use std::fmt;

use crate::model::ticket::{Status, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StartWork,
    Assign,
    ChangePriority,
    QuestionToUser,
    Resolve,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::StartWork,
        Self::Assign,
        Self::ChangePriority,
        Self::QuestionToUser,
        Self::Resolve,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StartWork => "Start Work",
            Self::Assign => "Assign",
            Self::ChangePriority => "Change Priority",
            Self::QuestionToUser => "Question to User",
            Self::Resolve => "Resolve",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::StartWork => 1,
            Self::Assign => 1 << 1,
            Self::ChangePriority => 1 << 2,
            Self::QuestionToUser => 1 << 3,
            Self::Resolve => 1 << 4,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Set of permitted [`Action`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActionSet(u8);

impl ActionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn of(actions: &[Action]) -> Self {
        actions.iter().fold(Self::empty(), |set, a| set.with(*a))
    }

    #[must_use]
    pub const fn with(self, action: Action) -> Self {
        Self(self.0 | action.bit())
    }

    #[must_use]
    pub const fn contains(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Action> {
        Action::ALL.into_iter().filter(move |a| self.contains(*a))
    }
}

impl Serialize for ActionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Notes,
    RelatedRecords,
    ResolutionInfo,
}

/// Workflow actions `username` may take on `ticket`.
///
/// Only the assignee (compared case-insensitively) gets any. Work on a
/// ticket in a terminal status is over, so nothing is offered there.
#[must_use]
pub fn permitted_actions(username: &str, ticket: &Ticket) -> ActionSet {
    if ticket.status.is_terminal() || !ticket.is_assigned_to(username) {
        return ActionSet::empty();
    }

    if ticket.status == Status::WorkingInProgress {
        ActionSet::of(&[
            Action::QuestionToUser,
            Action::Assign,
            Action::ChangePriority,
            Action::Resolve,
        ])
    } else {
        ActionSet::of(&[Action::StartWork, Action::Assign, Action::ChangePriority])
    }
}

#[must_use]
pub fn visible_tabs(username: &str, ticket: &Ticket) -> Vec<Tab> {
    let mut tabs = vec![Tab::Notes, Tab::RelatedRecords];
    if ticket.status == Status::Resolved || ticket.is_assigned_to(username) {
        tabs.push(Tab::ResolutionInfo);
    }
    tabs
}

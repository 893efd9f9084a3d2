// src/pr/state.rs

//! Push request states and the transition graph
//!
//! ```text
//! new -> pending -> approved
//!          |  \
//!          |   -> rejected -> pending
//!          -> new
//! ```
//!
//! `approved` is terminal.

use std::fmt;
use std::str::FromStr;

/// Message recorded when a push request is created
pub const CREATION_MESSAGE: &str = "New push request";

/// State of a push request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrState {
    New,
    Pending,
    Approved,
    Rejected,
}

impl PrState {
    pub const ALL: [PrState; 4] = [
        PrState::New,
        PrState::Pending,
        PrState::Approved,
        PrState::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrState::New => "new",
            PrState::Pending => "pending",
            PrState::Approved => "approved",
            PrState::Rejected => "rejected",
        }
    }

    /// States reachable in one step
    pub fn successors(&self) -> &'static [PrState] {
        match self {
            PrState::New => &[PrState::Pending],
            PrState::Pending => &[PrState::Approved, PrState::New, PrState::Rejected],
            PrState::Approved => &[],
            PrState::Rejected => &[PrState::Pending],
        }
    }

    pub fn can_transition_to(&self, next: PrState) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl FromStr for PrState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(PrState::New),
            "pending" => Ok(PrState::Pending),
            "approved" => Ok(PrState::Approved),
            "rejected" => Ok(PrState::Rejected),
            _ => Err(format!("Unknown push request state: {s}")),
        }
    }
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the graph has an edge between two state tags
///
/// Unknown tags have no edges.
pub fn transition_allowed(from: &str, to: &str) -> bool {
    match (from.parse::<PrState>(), to.parse::<PrState>()) {
        (Ok(from), Ok(to)) => from.can_transition_to(to),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_edges() {
        let allowed = [
            (PrState::New, PrState::Pending),
            (PrState::Pending, PrState::Approved),
            (PrState::Pending, PrState::New),
            (PrState::Pending, PrState::Rejected),
            (PrState::Rejected, PrState::Pending),
        ];
        for from in PrState::ALL {
            for to in PrState::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_approved_is_terminal() {
        assert!(PrState::Approved.is_terminal());
        assert!(!PrState::Rejected.is_terminal());
    }

    #[test]
    fn test_tags() {
        for state in PrState::ALL {
            assert_eq!(state.as_str().parse::<PrState>().unwrap(), state);
        }
        assert!(transition_allowed("new", "pending"));
        assert!(!transition_allowed("new", "merged"));
        assert!(!transition_allowed("bogus", "pending"));
    }
}

// src/client/listing.rs

//! Merging and rendering of push request listings

use crate::pr::{PrListing, PrSummary};
use std::collections::{BTreeMap, BTreeSet};

/// Union of two listings, dropping summaries present in both
pub fn merge_pr_data(first: &PrListing, second: &PrListing) -> PrListing {
    let mut merged: BTreeMap<String, BTreeMap<String, BTreeSet<PrSummaryKey>>> = BTreeMap::new();
    for listing in [first, second] {
        for (state, users) in listing {
            let by_user = merged.entry(state.clone()).or_default();
            for (user, summaries) in users {
                let set = by_user.entry(user.clone()).or_default();
                set.extend(summaries.iter().cloned().map(PrSummaryKey));
            }
        }
    }

    merged
        .into_iter()
        .map(|(state, users)| {
            let users = users
                .into_iter()
                .map(|(user, set)| (user, set.into_iter().map(|key| key.0).collect()))
                .collect();
            (state, users)
        })
        .collect()
}

/// Ordering wrapper: name, base, serial, then the history
#[derive(Debug, PartialEq, Eq)]
struct PrSummaryKey(PrSummary);

impl PrSummaryKey {
    fn key(&self) -> (&str, &str, i64, &[String], &[String], &[String]) {
        let s = &self.0;
        (&s.name, &s.base, s.last_serial, &s.states, &s.messages, &s.by)
    }
}

impl Ord for PrSummaryKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for PrSummaryKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Render the summaries of one state
///
/// Entries are named `user/index` and sorted by name, base and serial.
/// Bookmarked entries are marked `(reviewing)`.
pub fn create_pr_list_output(
    users: &BTreeMap<String, Vec<PrSummary>>,
    reviewing: impl Fn(&str) -> bool,
    include_messages: bool,
) -> String {
    let mut prs: Vec<(String, &PrSummary)> = users
        .iter()
        .flat_map(|(user, summaries)| summaries.iter().map(move |s| (format!("{user}/{}", s.name), s)))
        .collect();
    prs.sort_by(|(a_name, a), (b_name, b)| {
        (a_name, &a.base, a.last_serial).cmp(&(b_name, &b.base, b.last_serial))
    });

    let name_width = prs.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let base_width = prs.iter().map(|(_, s)| s.base.len()).max().unwrap_or(0);
    let serial_width = prs
        .iter()
        .map(|(_, s)| s.last_serial.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = Vec::new();
    for (name, summary) in &prs {
        let active = if reviewing(name) { " (reviewing)" } else { "" };
        out.push(format!(
            "{name:<name_width$} -> {base:<base_width$} at serial {serial:>serial_width$}{active}",
            base = summary.base,
            serial = summary.last_serial,
        ));
        if !include_messages {
            continue;
        }
        for ((state, by), message) in summary.states.iter().zip(&summary.by).zip(&summary.messages) {
            out.push(format!("    {state} by {by}:"));
            for line in message.lines() {
                out.push(format!("        {line}"));
            }
        }
        out.push(String::new());
    }
    out.join("\n")
}

/// Indent every non-empty line of `text`
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// src/commands/pr.rs
//! Push request workflow commands

use crate::cli::RemoteArgs;
use anyhow::{Context, Result, bail};
use pushreq::client::{
    PushreqClient, RemoteIndex, ReviewData, create_pr_list_output, get_message, merge_pr_data,
};
use pushreq::client::listing::indent;
use pushreq::index::IndexKind;
use pushreq::name::IndexName;
use pushreq::pr::{CREATION_MESSAGE, PrListing};
use pushreq::version::ReleaseRequirement;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Connection to the server plus the operator's defaults
pub struct Session {
    client: PushreqClient,
    user: Option<String>,
    index: Option<String>,
}

/// A staging index looked up on the server
struct MergeIndex {
    name: IndexName,
    remote: RemoteIndex,
}

impl MergeIndex {
    fn full_name(&self) -> String {
        self.name.to_string()
    }
}

impl Session {
    pub fn new(remote: &RemoteArgs) -> Result<Self> {
        Ok(Self {
            client: PushreqClient::new(&remote.url, remote.user.as_deref())?,
            user: remote.user.clone(),
            index: remote.index.clone(),
        })
    }

    fn require_user(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) => Ok(user),
            None => bail!("not logged in, use --user or set PUSHREQ_USER"),
        }
    }

    fn require_index(&self) -> Result<&str> {
        match self.index.as_deref() {
            Some(index) => Ok(index),
            None => bail!("no current index, use --index or set PUSHREQ_INDEX"),
        }
    }

    fn require_merge_index(&self, name: &str) -> Result<MergeIndex> {
        let user = self.require_user()?;
        let index_name = IndexName::for_push_request(name, user)?;
        let full = index_name.to_string();

        let remote = match self.client.find_index(&full)? {
            Some(remote) => remote,
            None => bail!("Couldn't access merge index '{}': not found", name),
        };
        if remote.config.kind != IndexKind::Merge {
            bail!("The index '{}' is not a merge index", name);
        }
        Ok(MergeIndex {
            name: index_name,
            remote,
        })
    }

    fn change_state(&self, name: &str, state: &str, message: Option<&str>) -> Result<()> {
        let index = self.require_merge_index(name)?;
        let message = get_message(message)?;
        let ops = vec![format!("states+={state}"), format!("messages+={message}")];
        self.client.patch_index(&index.full_name(), &ops, None)?;
        info!("{} is now {}", index.full_name(), state);
        println!("{}: {}", index.full_name(), state);
        Ok(())
    }
}

/// Create a push request and push the given releases into it
pub fn cmd_new_pr(session: &Session, name: &str, target: &str, pkgspecs: &[String]) -> Result<()> {
    let requirements = pkgspecs
        .iter()
        .map(|spec| ReleaseRequirement::parse(spec))
        .collect::<pushreq::Result<Vec<_>>>()?;

    let user = session.require_user()?;
    let source = if requirements.is_empty() {
        None
    } else {
        Some(session.require_index()?)
    };
    let index_name = IndexName::for_push_request(name, user)?;
    let full = index_name.to_string();

    session.client.create_index(
        &full,
        &json!({
            "type": "merge",
            "bases": [target],
            "states": ["new"],
            "messages": [CREATION_MESSAGE],
        }),
    )?;
    println!("Created push request {} targeting {}", full, target);

    if let Some(source) = source {
        for req in &requirements {
            let files = session
                .client
                .push(source, &req.name, &req.version, &full)
                .with_context(|| format!("Failed to add {req} to {full}"))?;
            println!("Pushed {} ({} files) from {}", req, files, source);
        }
    }
    Ok(())
}

pub fn cmd_submit_pr(session: &Session, name: &str, message: Option<&str>) -> Result<()> {
    session.change_state(name, "pending", message)
}

pub fn cmd_cancel_pr(session: &Session, name: &str, message: Option<&str>) -> Result<()> {
    session.change_state(name, "new", message)
}

pub fn cmd_reject_pr(session: &Session, name: &str, message: Option<&str>) -> Result<()> {
    session.change_state(name, "rejected", message)
}

/// Approve a push request with the bookmarked or the given serial
pub fn cmd_approve_pr(
    session: &Session,
    name: &str,
    serial: Option<&str>,
    message: Option<&str>,
    keep_index: bool,
) -> Result<()> {
    let index = session.require_merge_index(name)?;
    let full = index.full_name();

    let serial = match serial {
        Some(serial) => serial.to_string(),
        None => {
            let reviews = ReviewData::open_default()?;
            match reviews.get(&full) {
                Some(serial) => serial.to_string(),
                None => bail!(
                    "No review data found for '{}', it looks like you did not use review-pr \
                     or you forgot the --serial option.",
                    full
                ),
            }
        }
    };

    let message = get_message(message)?;
    let ops = vec!["states+=approved".to_string(), format!("messages+={message}")];
    session.client.patch_index(&full, &ops, Some(&serial))?;
    println!("Approved {} at serial {}", full, serial);

    if !keep_index {
        session.client.delete_index(&full)?;
        println!("Deleted {}", full);
    }

    let mut reviews = ReviewData::open_default()?;
    reviews.remove(&full);
    reviews.save()?;
    Ok(())
}

/// Bookmark the serial of a pending push request
pub fn cmd_review_pr(session: &Session, name: &str, update: bool) -> Result<()> {
    let index = session.require_merge_index(name)?;
    let full = index.full_name();
    let target = match index.remote.config.bases.as_slice() {
        [target] => target.clone(),
        _ => bail!("The push request '{}' must have exactly one target index", full),
    };

    let listing = session.client.index_listing(&target)?;
    let pending = match listing.get("pending") {
        Some(pending) if !pending.is_empty() => pending,
        _ => bail!("There are no pending PRs."),
    };
    let last_serial = pending
        .get(&index.name.user)
        .and_then(|prs| prs.iter().find(|pr| pr.name == index.name.index))
        .map(|pr| pr.last_serial);
    let Some(last_serial) = last_serial else {
        bail!("Could not find PR '{}'.", full);
    };

    let mut reviews = ReviewData::open_default()?;
    if let Some(current) = reviews.get(&full) {
        if !update {
            warn!("Already reviewing '{}' at serial {}", full, current);
            println!("Already reviewing '{}' at serial {}", full, current);
            return Ok(());
        }
        println!("Updated review of '{}' to serial {}", full, last_serial);
    } else {
        println!("Started review of '{}' at serial {}", full, last_serial);
    }
    reviews.set(&full, last_serial);
    reviews.save()?;
    Ok(())
}

pub fn cmd_abort_pr_review(session: &Session, name: &str) -> Result<()> {
    let index = session.require_merge_index(name)?;
    let full = index.full_name();

    let mut reviews = ReviewData::open_default()?;
    if reviews.remove(&full).is_some() {
        println!("Aborted review of '{}'", full);
    } else {
        eprintln!("No review of '{}' active", full);
    }
    reviews.save()?;
    Ok(())
}

pub fn cmd_delete_pr(session: &Session, name: &str) -> Result<()> {
    let index = session.require_merge_index(name)?;
    let full = index.full_name();
    session.client.delete_index(&full)?;
    println!("Deleted {}", full);
    Ok(())
}

/// List the push requests of an index merged with the user's own
pub fn cmd_list_prs(
    session: &Session,
    indexname: Option<&str>,
    all_states: bool,
    include_messages: bool,
) -> Result<()> {
    let index = match indexname {
        Some(name) if name.contains('/') => name.to_string(),
        Some(name) => format!("{}/{}", session.require_user()?, name),
        None => session.require_index()?.to_string(),
    };

    let remote = session.client.find_index(&index)?;
    let (is_merge, allows_prs) = match &remote {
        Some(remote) => (
            remote.config.kind == IndexKind::Merge,
            remote.config.allows_push_requests(),
        ),
        None => (false, false),
    };

    let mut hidden: BTreeSet<&str> = BTreeSet::new();
    if !all_states {
        hidden.insert("approved");
        if !is_merge {
            hidden.insert("new");
        }
    }

    let index_data = if is_merge || allows_prs {
        session.client.index_listing(&index)?
    } else {
        PrListing::new()
    };

    let login = match session.user.as_deref() {
        Some(user) => format!("logged in as {user}"),
        None => "not logged in".to_string(),
    };
    println!("current index: {} ({})", index, login);

    let user_data = match session.user.as_deref() {
        Some(user) => {
            let mut data = session.client.user_listing(user)?;
            if is_merge && !all_states {
                data.remove("new");
            }
            data
        }
        None => PrListing::new(),
    };

    let pr_data = merge_pr_data(&index_data, &user_data);
    if pr_data.is_empty() {
        println!("no pull requests");
        return Ok(());
    }

    let reviews = ReviewData::open_default()?;
    for (state, users) in &pr_data {
        if hidden.contains(state.as_str()) {
            continue;
        }
        let out = create_pr_list_output(users, |name| reviews.contains(name), include_messages);
        println!("{} push requests", state);
        println!("{}", indent(&out, "    "));
    }
    reviews.save()?;
    Ok(())
}

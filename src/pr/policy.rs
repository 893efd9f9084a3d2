// src/pr/policy.rs

//! Customizer of `merge` indexes
//!
//! [`StagingIndexPolicy`] is where a staging index differs from a plain
//! one: it checks every configuration change against the state graph and
//! the append-only history rules, gates approval and rejection on upload
//! rights in the target index, and runs the transfer once an approval has
//! been written.

use crate::db::models::IndexEntry;
use crate::error::{Error, Result};
use crate::index::acl::{Capability, RequestContext, has_permission};
use crate::index::config::{IndexConfig, IndexKind};
use crate::index::customizer::{PolicyEnv, StageCustomizer};
use crate::index::stage::Stage;
use crate::name::{IndexName, PR_PREFIX, is_valid_name};
use crate::pr::serial::{check_reference_serial, compute_reference_serial, parse_serial_header};
use crate::pr::state::{CREATION_MESSAGE, PrState, transition_allowed};
use crate::pr::transfer::transfer;
use rusqlite::Connection;
use tracing::{info, warn};

/// Customizer of staging (`merge`) indexes
pub struct StagingIndexPolicy;

/// The target index named in `bases`, if it exists
fn find_target(conn: &Connection, config: &IndexConfig) -> Result<Option<IndexEntry>> {
    let Some(target) = config.target() else {
        return Ok(None);
    };
    let name = IndexName::parse(target)?;
    IndexEntry::find(conn, &name.user, &name.index)
}

fn require_target(conn: &Connection, stage: &IndexEntry) -> Result<IndexEntry> {
    find_target(conn, &stage.config)?.ok_or_else(|| {
        Error::NotFound(format!(
            "target index '{}' of '{}' does not exist",
            stage.config.target().unwrap_or_default(),
            stage.full_name()
        ))
    })
}

impl StagingIndexPolicy {
    /// Upload principals of the target while the index is in `state`
    fn target_uploaders_in(
        &self,
        conn: &Connection,
        stage: &IndexEntry,
        state: PrState,
    ) -> Result<Vec<String>> {
        if stage.config.current_state() != Some(state.as_str()) {
            return Ok(Vec::new());
        }
        Ok(find_target(conn, &stage.config)?
            .map(|target| target.config.acl_upload)
            .unwrap_or_default())
    }
}

impl StageCustomizer for StagingIndexPolicy {
    fn kind(&self) -> IndexKind {
        IndexKind::Merge
    }

    fn verify_name(&self, name: &str) -> Result<()> {
        let Some(rest) = name.strip_prefix(PR_PREFIX) else {
            return Err(Error::InvalidIndexName(format!(
                "indexname '{name}' must start with '{PR_PREFIX}'."
            )));
        };
        if !is_valid_name(rest) {
            return Err(Error::InvalidIndexName(format!(
                "indexname '{rest}' contains characters that aren't allowed. \
                 Any ascii symbol besides -.@_ after '{PR_PREFIX}' is blocked."
            )));
        }
        Ok(())
    }

    fn prepare_config(&self, owner: &str, config: &mut IndexConfig) -> Result<()> {
        if config.states.is_empty() {
            config.states.push(PrState::New.as_str().to_string());
        }
        if config.messages.is_empty() {
            config.messages.push(CREATION_MESSAGE.to_string());
        }
        config.changers = vec![owner.to_string()];
        if config.acl_upload.is_empty() {
            config.acl_upload.push(owner.to_string());
        }
        config.push_requests_allowed = None;
        Ok(())
    }

    fn validate_transition(
        &self,
        env: &dyn PolicyEnv,
        old: Option<&IndexConfig>,
        new: &IndexConfig,
    ) -> Result<Vec<String>> {
        let mut errors = Vec::new();

        let Some(new_state) = new.current_state() else {
            errors.push("A merge index requires a state".to_string());
            return Ok(errors);
        };
        if new.messages.is_empty() {
            errors.push("A merge index requires messages".to_string());
        }

        if new_state == PrState::Pending.as_str() {
            if let Some(target) = new.target()
                && !env.target_allows_push_requests(target)?
            {
                errors.push(format!(
                    "The target index '{target}' doesn't allow push requests"
                ));
            }
            if env.stage_is_empty()? {
                errors.push("The merge index has no packages".to_string());
            }
        }

        if new.states.len() != new.messages.len() {
            errors.push(
                "The number of states and messages must match for a merge index".to_string(),
            );
        }

        match old {
            None => {
                if new.states != [PrState::New.as_str()] {
                    errors.push("A new merge index must have state 'new'".to_string());
                }
                if new.messages.len() != 1 {
                    errors.push("A new merge index must have exactly one message".to_string());
                }
            }
            Some(old) => {
                let old_state = old.current_state().unwrap_or_default();
                let old_message_count = old.messages.len();
                let new_message_count = new.messages.len();

                if old_state != new_state {
                    if new_message_count != old_message_count + 1 {
                        errors.push(
                            "A state change on a merge index requires a message".to_string(),
                        );
                    }
                } else if old.states.len() != new.states.len() {
                    errors.push(format!(
                        "State transition from '{old_state}' to '{new_state}' not allowed"
                    ));
                }
                if new.states.get(..old.states.len()) != Some(old.states.as_slice()) {
                    errors.push("Existing states can't be modified".to_string());
                }
                if old_message_count > new_message_count {
                    errors.push("Messages can't be removed from merge index".to_string());
                }
                if new.messages.get(..old_message_count) != Some(old.messages.as_slice()) {
                    errors.push("Existing messages can't be modified".to_string());
                }
                if old.bases != new.bases {
                    errors.push("The bases of a merge index can't be changed".to_string());
                }
                if old_state != new_state && !transition_allowed(old_state, new_state) {
                    errors.push(format!(
                        "State transition from '{old_state}' to '{new_state}' not allowed"
                    ));
                }
            }
        }

        if new.bases.len() != 1 {
            errors.push("A merge index must have exactly one base".to_string());
        }

        Ok(errors)
    }

    fn authorize_transition(
        &self,
        conn: &Connection,
        ctx: &RequestContext,
        stage: &IndexEntry,
        new: &mut IndexConfig,
    ) -> Result<()> {
        let old_state = stage.config.current_state();
        let new_state = new.current_state().map(String::from);
        if old_state == new_state.as_deref() {
            return Ok(());
        }
        let user = ctx.require_user()?.to_string();
        let target = require_target(conn, stage)?;

        match new_state.as_deref().and_then(|s| s.parse::<PrState>().ok()) {
            Some(PrState::Approved) => {
                let got = parse_serial_header(ctx.pr_serial.as_deref())?;
                let expected = compute_reference_serial(conn, stage)?;
                check_reference_serial(got, expected)?;
                if !has_permission(conn, ctx, &target, Capability::Upload)? {
                    warn!("{} may not approve {} into {}", user, stage.full_name(), target.full_name());
                    return Err(Error::Unauthorized(format!(
                        "user '{}' cannot upload to '{}'",
                        user,
                        target.full_name()
                    )));
                }
            }
            Some(PrState::Rejected) => {
                if !has_permission(conn, ctx, &target, Capability::Upload)? {
                    return Err(Error::InvalidIndexConfig(vec![format!(
                        "State transition to '{}' not authorized",
                        PrState::Rejected
                    )]));
                }
            }
            _ => {}
        }

        new.changers.push(user);
        info!(
            "{}: {} -> {} by {}",
            stage.full_name(),
            old_state.unwrap_or_default(),
            new_state.as_deref().unwrap_or_default(),
            ctx.display_user()
        );
        Ok(())
    }

    fn on_modified(
        &self,
        conn: &Connection,
        serial: i64,
        ctx: &RequestContext,
        stage: &IndexEntry,
        old: &IndexConfig,
    ) -> Result<()> {
        let approved = PrState::Approved.as_str();
        if stage.config.current_state() != Some(approved) || old.current_state() == Some(approved) {
            return Ok(());
        }

        let user = ctx.require_user()?;
        let target_entry = require_target(conn, stage)?;
        if !has_permission(conn, ctx, &target_entry, Capability::Upload)? {
            return Err(Error::Unauthorized(format!(
                "user '{}' cannot upload to '{}'",
                user,
                target_entry.full_name()
            )));
        }

        let message = stage.config.messages.last().cloned().unwrap_or_default();
        let source = Stage::new(conn, stage.clone());
        let mut target = Stage::new(conn, target_entry);
        let summary = transfer(serial, &source, &mut target, &message, user)?;
        info!(
            "Approved {} into {}: {} project(s), {} file(s)",
            stage.full_name(),
            target.name(),
            summary.projects,
            summary.files
        );
        Ok(())
    }

    fn modify_principals_for(&self, conn: &Connection, stage: &IndexEntry) -> Result<Vec<String>> {
        self.target_uploaders_in(conn, stage, PrState::Pending)
    }

    fn delete_principals_for(&self, conn: &Connection, stage: &IndexEntry) -> Result<Vec<String>> {
        self.target_uploaders_in(conn, stage, PrState::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEnv {
        allows: bool,
        empty: bool,
    }

    impl PolicyEnv for FakeEnv {
        fn target_allows_push_requests(&self, _target: &str) -> Result<bool> {
            Ok(self.allows)
        }

        fn stage_is_empty(&self) -> Result<bool> {
            Ok(self.empty)
        }
    }

    const READY: FakeEnv = FakeEnv {
        allows: true,
        empty: false,
    };

    fn config(states: &[&str]) -> IndexConfig {
        let mut config = IndexConfig::new(IndexKind::Merge);
        config.bases = vec!["target/prod".to_string()];
        config.states = states.iter().map(|s| s.to_string()).collect();
        config.messages = (0..states.len()).map(|i| format!("message {i}")).collect();
        config
    }

    /// `old` with `state` and one more message appended
    fn step(old: &IndexConfig, state: &str) -> IndexConfig {
        let mut new = old.clone();
        new.states.push(state.to_string());
        new.messages.push(format!("to {state}"));
        new
    }

    fn validate(env: &FakeEnv, old: Option<&IndexConfig>, new: &IndexConfig) -> Vec<String> {
        StagingIndexPolicy.validate_transition(env, old, new).unwrap()
    }

    #[test]
    fn test_creation_requires_new() {
        assert!(validate(&READY, None, &config(&["new"])).is_empty());
        let errors = validate(&READY, None, &config(&["pending"]));
        assert!(errors.contains(&"A new merge index must have state 'new'".to_string()));
    }

    #[test]
    fn test_creation_rejects_prior_history() {
        for states in [["pending", "new"], ["approved", "new"]] {
            let errors = validate(&READY, None, &config(&states));
            assert_eq!(
                errors,
                vec![
                    "A new merge index must have state 'new'".to_string(),
                    "A new merge index must have exactly one message".to_string(),
                ],
                "{states:?}"
            );
        }
    }

    #[test]
    fn test_creation_defaults() {
        let mut config = IndexConfig::new(IndexKind::Merge);
        config.bases = vec!["target/prod".to_string()];
        StagingIndexPolicy.prepare_config("alice", &mut config).unwrap();
        assert_eq!(config.states, vec!["new"]);
        assert_eq!(config.messages, vec![CREATION_MESSAGE]);
        assert_eq!(config.changers, vec!["alice"]);
        assert_eq!(config.acl_upload, vec!["alice"]);
        assert!(validate(&READY, None, &config).is_empty());
    }

    #[test]
    fn test_state_graph_conformance() {
        let allowed = [
            ("new", "pending"),
            ("pending", "approved"),
            ("pending", "new"),
            ("pending", "rejected"),
            ("rejected", "pending"),
        ];
        for from in PrState::ALL {
            for to in PrState::ALL {
                if from == to {
                    continue;
                }
                let old = config(&["new", from.as_str()]);
                let new = step(&old, to.as_str());
                let errors = validate(&READY, Some(&old), &new);
                let not_allowed = format!("State transition from '{from}' to '{to}' not allowed");
                if allowed.contains(&(from.as_str(), to.as_str())) {
                    assert!(errors.is_empty(), "{from} -> {to}: {errors:?}");
                } else {
                    assert_eq!(errors, vec![not_allowed], "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_pending_preconditions_reported_together() {
        let env = FakeEnv {
            allows: false,
            empty: true,
        };
        let old = config(&["new"]);
        let errors = validate(&env, Some(&old), &step(&old, "pending"));
        assert_eq!(
            errors,
            vec![
                "The target index 'target/prod' doesn't allow push requests".to_string(),
                "The merge index has no packages".to_string(),
            ]
        );
    }

    #[test]
    fn test_state_change_requires_one_message() {
        let old = config(&["new"]);
        let mut new = old.clone();
        new.states.push("pending".to_string());
        let errors = validate(&READY, Some(&old), &new);
        assert!(errors.contains(&"A state change on a merge index requires a message".to_string()));
        assert!(errors.contains(
            &"The number of states and messages must match for a merge index".to_string()
        ));
    }

    #[test]
    fn test_repeating_state_not_allowed() {
        let old = config(&["new", "pending"]);
        let new = step(&old, "pending");
        let errors = validate(&READY, Some(&old), &new);
        assert_eq!(
            errors,
            vec!["State transition from 'pending' to 'pending' not allowed".to_string()]
        );
    }

    #[test]
    fn test_history_is_append_only() {
        let old = config(&["new", "pending"]);

        let mut edited = step(&old, "new");
        edited.messages[0] = "rewritten".to_string();
        let errors = validate(&READY, Some(&old), &edited);
        assert_eq!(errors, vec!["Existing messages can't be modified".to_string()]);

        let mut truncated = old.clone();
        truncated.messages.pop();
        truncated.states.pop();
        let errors = validate(&READY, Some(&old), &truncated);
        assert!(errors.contains(&"Messages can't be removed from merge index".to_string()));
        assert!(errors.contains(&"Existing messages can't be modified".to_string()));
    }

    #[test]
    fn test_states_history_cannot_be_rewritten() {
        let old = config(&["new", "pending"]);
        let mut forged = old.clone();
        forged.states[0] = "approved".to_string();
        assert_eq!(
            validate(&READY, Some(&old), &forged),
            vec!["Existing states can't be modified".to_string()]
        );

        let mut forged = step(&old, "new");
        forged.states[1] = "rejected".to_string();
        assert!(
            validate(&READY, Some(&old), &forged)
                .contains(&"Existing states can't be modified".to_string())
        );
    }

    #[test]
    fn test_bases_are_immutable() {
        let old = config(&["new"]);
        let mut new = old.clone();
        new.bases = vec!["other/prod".to_string()];
        assert_eq!(
            validate(&READY, Some(&old), &new),
            vec!["The bases of a merge index can't be changed".to_string()]
        );

        let mut two = config(&["new"]);
        two.bases.push("other/prod".to_string());
        assert_eq!(
            validate(&READY, None, &two),
            vec!["A merge index must have exactly one base".to_string()]
        );
    }

    #[test]
    fn test_missing_state() {
        let mut new = config(&[]);
        new.messages.clear();
        assert_eq!(validate(&READY, None, &new), vec!["A merge index requires a state".to_string()]);
    }

    #[test]
    fn test_names() {
        assert!(StagingIndexPolicy.verify_name("+pr-fix_1.0").is_ok());
        let err = StagingIndexPolicy.verify_name("fix").unwrap_err();
        assert_eq!(err.to_string(), "indexname 'fix' must start with '+pr-'.");
        let err = StagingIndexPolicy.verify_name("+pr-fix!").unwrap_err();
        assert!(err.to_string().starts_with("indexname 'fix!' contains characters"));
    }
}

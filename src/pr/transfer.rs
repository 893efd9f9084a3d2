// src/pr/transfer.rs

//! Copying releases between indexes
//!
//! Used by approval (every project of the staging index, latest version
//! only) and by the `+push` endpoint (one named release). Logs of copied
//! files are carried over without `overwrite` entries and get one `push`
//! entry appended. A conflict in the target aborts the copy; the caller's
//! transaction discards whatever was already written.

use crate::db::models::{FileRel, LogEntry, VersionEntry};
use crate::error::{Error, Result};
use crate::index::stage::Stage;
use std::collections::HashMap;
use tracing::debug;

/// Counts of a finished transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub projects: usize,
    pub files: usize,
}

/// Copy the latest version of every project on `source` into `target`
pub fn transfer(
    serial: i64,
    source: &Stage<'_>,
    target: &mut Stage<'_>,
    message: &str,
    who: &str,
) -> Result<TransferSummary> {
    let mut summary = TransferSummary::default();
    for project in source.list_projects()? {
        let Some(version) = source.latest_version(&project)? else {
            continue;
        };
        summary.files += copy_release(serial, source, target, &project.name, &version, who, Some(message))?;
        summary.projects += 1;
    }
    Ok(summary)
}

/// Copy one version of `project` with all of its files
///
/// Returns the number of files copied.
pub fn copy_release(
    serial: i64,
    source: &Stage<'_>,
    target: &mut Stage<'_>,
    project: &str,
    version: &VersionEntry,
    who: &str,
    message: Option<&str>,
) -> Result<usize> {
    target.set_versiondata(project, &version.version, &version.metadata, serial)?;

    let src_name = source.name();
    let dst_name = target.name();
    // source file id -> basename of the copy in the target
    let mut copied: HashMap<i64, String> = HashMap::new();
    let mut count = 0;

    for file in source.links(version)? {
        let content = source.file_content(&file)?;
        let new_file = match file.rel {
            FileRel::ReleaseFile => target.store_releasefile(
                project,
                &version.version,
                &file.basename,
                &content,
                Some(&file.last_modified),
                serial,
            )?,
            FileRel::DocZip => target.store_doczip(project, &version.version, &content, serial)?,
            FileRel::ToxResult => {
                let parent = file
                    .parent_id
                    .and_then(|id| copied.get(&id))
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "release file of {} not copied to {}",
                            file.basename, dst_name
                        ))
                    })?;
                target.store_toxresult(project, &version.version, parent, &content, serial)?
            }
        };

        for entry in source.file_log(&file)? {
            if entry.what != "overwrite" {
                target.append_log(&new_file, &entry)?;
            }
        }
        let mut push = LogEntry::new("push", Some(who))
            .with_src(&src_name)
            .with_dst(&dst_name);
        if let Some(message) = message {
            push = push.with_message(message);
        }
        target.append_log(&new_file, &push)?;

        debug!("Copied {} {} from {} to {}", file.rel, file.basename, src_name, dst_name);
        if let Some(id) = file.id {
            copied.insert(id, new_file.basename);
        }
        count += 1;
    }

    Ok(count)
}

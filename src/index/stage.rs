// src/index/stage.rs

//! Stage handle: releases hosted on one index
//!
//! A [`Stage`] binds an index row to an open connection and offers the
//! release operations the rest of the crate builds on. Every store
//! operation takes the serial of the running write request and stamps the
//! touched version, project and index with it.

use crate::db::models::{
    Blob, FileLog, FileRel, IndexEntry, LogEntry, ProjectEntry, ReleaseFile, VersionEntry,
    timestamp,
};
use crate::error::{Error, Result};
use crate::version;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

/// One index together with the connection it is read from
pub struct Stage<'a> {
    conn: &'a Connection,
    entry: IndexEntry,
}

/// A file link as exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub rel: String,
    pub basename: String,
    pub hash_spec: String,
    pub last_modified: String,
    /// Basename of the release file a toxresult belongs to
    #[serde(rename = "for", skip_serializing_if = "Option::is_none")]
    pub for_file: Option<String>,
    pub log: Vec<LogEntry>,
}

/// Latest version of a project with its file links
#[derive(Debug, Clone, Serialize)]
pub struct ProjectLinks {
    pub project: String,
    pub version: String,
    pub metadata: serde_json::Value,
    pub links: Vec<LinkInfo>,
}

impl<'a> Stage<'a> {
    pub fn new(conn: &'a Connection, entry: IndexEntry) -> Self {
        Self { conn, entry }
    }

    /// Open `user/index`, failing with `NotFound` if it does not exist
    pub fn open(conn: &'a Connection, user: &str, index: &str) -> Result<Self> {
        let entry = IndexEntry::find(conn, user, index)?
            .ok_or_else(|| Error::NotFound(format!("index '{user}/{index}' does not exist")))?;
        Ok(Self::new(conn, entry))
    }

    pub fn entry(&self) -> &IndexEntry {
        &self.entry
    }

    pub fn into_entry(self) -> IndexEntry {
        self.entry
    }

    /// `user/index`
    pub fn name(&self) -> String {
        self.entry.full_name()
    }

    fn id(&self) -> Result<i64> {
        self.entry
            .id
            .ok_or_else(|| Error::InitError(format!("index {} has no ID", self.name())))
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectEntry>> {
        ProjectEntry::list_by_index(self.conn, self.id()?)
    }

    /// True when no project on this index has any file
    pub fn is_empty(&self) -> Result<bool> {
        for project in self.list_projects()? {
            let Some(project_id) = project.id else { continue };
            for version in VersionEntry::list_by_project(self.conn, project_id)? {
                if let Some(version_id) = version.id
                    && !ReleaseFile::list_by_version(self.conn, version_id)?.is_empty()
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// The highest version of a project
    pub fn latest_version(&self, project: &ProjectEntry) -> Result<Option<VersionEntry>> {
        let Some(project_id) = project.id else {
            return Ok(None);
        };
        let versions = VersionEntry::list_by_project(self.conn, project_id)?;
        let latest = version::latest(versions.iter().map(|v| v.version.as_str()))
            .map(String::from);
        Ok(latest.and_then(|wanted| versions.into_iter().find(|v| v.version == wanted)))
    }

    /// A specific version of a project
    pub fn get_version(&self, project: &str, version: &str) -> Result<Option<VersionEntry>> {
        let Some(project) = ProjectEntry::find(self.conn, self.id()?, project)? else {
            return Ok(None);
        };
        match project.id {
            Some(project_id) => VersionEntry::find(self.conn, project_id, version),
            None => Ok(None),
        }
    }

    /// Files of a version, release files before their attachments
    pub fn links(&self, version: &VersionEntry) -> Result<Vec<ReleaseFile>> {
        match version.id {
            Some(version_id) => ReleaseFile::list_by_version(self.conn, version_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn file_content(&self, file: &ReleaseFile) -> Result<Vec<u8>> {
        file.content(self.conn)
    }

    pub fn file_log(&self, file: &ReleaseFile) -> Result<Vec<LogEntry>> {
        match file.id {
            Some(id) => FileLog::list(self.conn, id),
            None => Ok(Vec::new()),
        }
    }

    pub fn append_log(&self, file: &ReleaseFile, entry: &LogEntry) -> Result<()> {
        let id = file
            .id
            .ok_or_else(|| Error::InitError(format!("file {} has no ID", file.basename)))?;
        FileLog::append(self.conn, id, entry)
    }

    /// Register or replace the metadata of a version
    pub fn set_versiondata(
        &mut self,
        project: &str,
        version: &str,
        metadata: &serde_json::Value,
        serial: i64,
    ) -> Result<VersionEntry> {
        let mut project_entry = ProjectEntry::get_or_create(self.conn, self.id()?, project, serial)?;
        let project_id = project_entry
            .id
            .ok_or_else(|| Error::InitError(format!("project {project} has no ID")))?;
        let entry = VersionEntry::upsert(self.conn, project_id, version, metadata, serial)?;
        project_entry.touch(self.conn, serial)?;
        self.entry.touch(self.conn, serial)?;
        Ok(entry)
    }

    /// Version row to store files under, registered with minimal metadata if new
    fn ensure_version(&mut self, project: &str, version: &str, serial: i64) -> Result<VersionEntry> {
        if let Some(existing) = self.get_version(project, version)? {
            return Ok(existing);
        }
        let metadata = serde_json::json!({"name": project, "version": version});
        self.set_versiondata(project, version, &metadata, serial)
    }

    fn touch_project(&mut self, project: &str, serial: i64) -> Result<()> {
        if let Some(mut entry) = ProjectEntry::find(self.conn, self.id()?, project)? {
            entry.touch(self.conn, serial)?;
        }
        self.entry.touch(self.conn, serial)
    }

    /// Store a release file
    ///
    /// A volatile index replaces an existing file of the same name and logs
    /// an `overwrite` entry. A non-volatile index refuses with
    /// [`Error::TransferConflict`].
    pub fn store_releasefile(
        &mut self,
        project: &str,
        version: &str,
        basename: &str,
        content: &[u8],
        last_modified: Option<&str>,
        serial: i64,
    ) -> Result<ReleaseFile> {
        let version_entry = self.ensure_version(project, version, serial)?;
        let version_id = version_entry
            .id
            .ok_or_else(|| Error::InitError(format!("version {version} has no ID")))?;
        let last_modified = last_modified.map(String::from).unwrap_or_else(timestamp);

        let file = match ReleaseFile::find(self.conn, version_id, FileRel::ReleaseFile, basename)? {
            Some(mut existing) => {
                if !self.entry.config.volatile {
                    return Err(Error::TransferConflict {
                        file: basename.to_string(),
                        index: self.name(),
                    });
                }
                let hash = Blob::store(self.conn, content)?;
                existing.replace_content(self.conn, hash, last_modified, serial)?;
                if let Some(id) = existing.id {
                    FileLog::append(self.conn, id, &LogEntry::new("overwrite", None))?;
                }
                debug!("Overwrote {} in {}", basename, self.name());
                existing
            }
            None => {
                let hash = Blob::store(self.conn, content)?;
                let mut file = ReleaseFile::new(
                    version_id,
                    FileRel::ReleaseFile,
                    basename.to_string(),
                    hash,
                    last_modified,
                    serial,
                );
                file.insert(self.conn)?;
                debug!("Stored {} in {}", basename, self.name());
                file
            }
        };

        self.touch_project(project, serial)?;
        Ok(file)
    }

    /// Store the documentation archive of a version, replacing any previous one
    pub fn store_doczip(
        &mut self,
        project: &str,
        version: &str,
        content: &[u8],
        serial: i64,
    ) -> Result<ReleaseFile> {
        let version_entry = self.ensure_version(project, version, serial)?;
        let version_id = version_entry
            .id
            .ok_or_else(|| Error::InitError(format!("version {version} has no ID")))?;
        let basename = format!("{project}-{version}.doc.zip");
        let hash = Blob::store(self.conn, content)?;

        let file = match ReleaseFile::find(self.conn, version_id, FileRel::DocZip, &basename)? {
            Some(mut existing) => {
                existing.replace_content(self.conn, hash, timestamp(), serial)?;
                existing
            }
            None => {
                let mut file = ReleaseFile::new(
                    version_id,
                    FileRel::DocZip,
                    basename,
                    hash,
                    timestamp(),
                    serial,
                );
                file.insert(self.conn)?;
                file
            }
        };

        self.touch_project(project, serial)?;
        Ok(file)
    }

    /// Attach a test result to a release file of a version
    pub fn store_toxresult(
        &mut self,
        project: &str,
        version: &str,
        parent_basename: &str,
        content: &[u8],
        serial: i64,
    ) -> Result<ReleaseFile> {
        let not_found = || {
            Error::NotFound(format!(
                "release file {parent_basename} of {project} {version} not found in {}",
                self.name()
            ))
        };
        let version_entry = self.get_version(project, version)?.ok_or_else(not_found)?;
        let version_id = version_entry.id.ok_or_else(not_found)?;
        let parent = ReleaseFile::find(self.conn, version_id, FileRel::ReleaseFile, parent_basename)?
            .ok_or_else(not_found)?;
        let parent_id = parent.id.ok_or_else(not_found)?;

        let index = parent.attachments(self.conn)?.len();
        let mut file = ReleaseFile::new(
            version_id,
            FileRel::ToxResult,
            format!("{parent_basename}.toxresult{index}"),
            Blob::store(self.conn, content)?,
            timestamp(),
            serial,
        );
        file.parent_id = Some(parent_id);
        file.insert(self.conn)?;

        self.touch_project(project, serial)?;
        Ok(file)
    }

    /// Latest version of `project` with links and logs
    pub fn project_links(&self, project: &str) -> Result<Option<ProjectLinks>> {
        let Some(project_entry) = ProjectEntry::find(self.conn, self.id()?, project)? else {
            return Ok(None);
        };
        let Some(version) = self.latest_version(&project_entry)? else {
            return Ok(None);
        };

        let files = self.links(&version)?;
        let mut links = Vec::with_capacity(files.len());
        for file in &files {
            let for_file = file.parent_id.and_then(|parent_id| {
                files
                    .iter()
                    .find(|f| f.id == Some(parent_id))
                    .map(|f| f.basename.clone())
            });
            let log = match file.id {
                Some(id) => FileLog::list(self.conn, id)?,
                None => Vec::new(),
            };
            links.push(LinkInfo {
                rel: file.rel.to_string(),
                basename: file.basename.clone(),
                hash_spec: format!("sha256={}", file.blob_hash),
                last_modified: file.last_modified.clone(),
                for_file,
                log,
            });
        }

        Ok(Some(ProjectLinks {
            project: project_entry.name,
            version: version.version,
            metadata: version.metadata,
            links,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Changelog, User};
    use crate::db::schema;
    use crate::index::{IndexConfig, IndexKind};
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn create_stage(conn: &Connection, volatile: bool) -> IndexEntry {
        let serial = Changelog::record(conn, "setup", None).unwrap();
        let user_id = User::new("alice".to_string(), serial).insert(conn).unwrap();
        let mut config = IndexConfig::new(IndexKind::Stage);
        config.volatile = volatile;
        let mut entry =
            IndexEntry::new(user_id, "alice".to_string(), "dev".to_string(), config, serial);
        entry.insert(conn).unwrap();
        entry
    }

    #[test]
    fn test_store_and_list() {
        let (_temp, conn) = create_test_db();
        let entry = create_stage(&conn, true);
        let mut stage = Stage::new(&conn, entry);
        assert!(stage.is_empty().unwrap());

        let serial = Changelog::record(&conn, "upload", Some("alice")).unwrap();
        stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"one", None, serial)
            .unwrap();
        assert!(!stage.is_empty().unwrap());
        assert_eq!(stage.entry().last_serial, serial);

        let projects = stage.list_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].last_serial, serial);
    }

    #[test]
    fn test_volatile_overwrite_logs() {
        let (_temp, conn) = create_test_db();
        let entry = create_stage(&conn, true);
        let mut stage = Stage::new(&conn, entry);

        let serial = Changelog::record(&conn, "upload", None).unwrap();
        stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"one", None, serial)
            .unwrap();
        let file = stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"two", None, serial)
            .unwrap();

        assert_eq!(file.content(&conn).unwrap(), b"two");
        let log = FileLog::list(&conn, file.id.unwrap()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].what, "overwrite");
    }

    #[test]
    fn test_non_volatile_conflict() {
        let (_temp, conn) = create_test_db();
        let entry = create_stage(&conn, false);
        let mut stage = Stage::new(&conn, entry);

        let serial = Changelog::record(&conn, "upload", None).unwrap();
        stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"one", None, serial)
            .unwrap();
        let err = stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"two", None, serial)
            .unwrap_err();
        assert!(matches!(err, Error::TransferConflict { ref file, .. } if file == "pkg-1.0.tar.gz"));
    }

    #[test]
    fn test_doczip_and_toxresult() {
        let (_temp, conn) = create_test_db();
        let entry = create_stage(&conn, true);
        let mut stage = Stage::new(&conn, entry);

        let serial = Changelog::record(&conn, "upload", None).unwrap();
        stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"one", None, serial)
            .unwrap();
        let doc = stage.store_doczip("pkg", "1.0", b"docs", serial).unwrap();
        assert_eq!(doc.basename, "pkg-1.0.doc.zip");

        let tox = stage
            .store_toxresult("pkg", "1.0", "pkg-1.0.tar.gz", b"{}", serial)
            .unwrap();
        assert_eq!(tox.basename, "pkg-1.0.tar.gz.toxresult0");

        assert!(matches!(
            stage.store_toxresult("pkg", "1.0", "missing.tar.gz", b"{}", serial),
            Err(Error::NotFound(_))
        ));

        let links = stage.project_links("pkg").unwrap().unwrap();
        assert_eq!(links.version, "1.0");
        assert_eq!(links.links.len(), 3);
        let tox_link = links.links.iter().find(|l| l.rel == "toxresult").unwrap();
        assert_eq!(tox_link.for_file.as_deref(), Some("pkg-1.0.tar.gz"));
    }

    #[test]
    fn test_latest_version() {
        let (_temp, conn) = create_test_db();
        let entry = create_stage(&conn, true);
        let mut stage = Stage::new(&conn, entry);

        let serial = Changelog::record(&conn, "upload", None).unwrap();
        for version in ["1.9", "1.10", "1.2"] {
            let basename = format!("pkg-{version}.tar.gz");
            stage
                .store_releasefile("pkg", version, &basename, b"x", None, serial)
                .unwrap();
        }
        let project = &stage.list_projects().unwrap()[0];
        assert_eq!(stage.latest_version(project).unwrap().unwrap().version, "1.10");
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! SQLite-backed timeline store
//!
//! Natural keys are enforced by UNIQUE constraints. Writes use
//! `INSERT .. ON CONFLICT DO NOTHING` followed by a read of the key, so two
//! scans racing on the same repository both observe the single stored row.
//! Timestamps are stored as unix milliseconds to keep ordering numeric.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dt_domain_types::{
    Branch, Commit, Deployment, DeploymentKey, NewCommit, NewDeployment, Provenance, RepoRef,
    Repository, RepositoryMetadata,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{StoreError, StoreResult, Stored, TimelineStore};

const SCHEMA_VERSION: i32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    owner           TEXT NOT NULL,
    name            TEXT NOT NULL,
    private         INTEGER NOT NULL,
    default_branch  TEXT NOT NULL,
    UNIQUE (owner, name)
);

CREATE TABLE IF NOT EXISTS branches (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id   INTEGER NOT NULL REFERENCES repositories (id),
    name            TEXT NOT NULL,
    UNIQUE (repository_id, name)
);

CREATE TABLE IF NOT EXISTS commits (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id   INTEGER NOT NULL REFERENCES repositories (id),
    branch_id       INTEGER NOT NULL REFERENCES branches (id),
    sha             TEXT NOT NULL,
    author          TEXT,
    message         TEXT,
    timestamp_ms    INTEGER NOT NULL,
    UNIQUE (repository_id, branch_id, sha)
);

CREATE TABLE IF NOT EXISTS deployments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id   INTEGER NOT NULL REFERENCES repositories (id),
    branch_id       INTEGER NOT NULL REFERENCES branches (id),
    commit_id       INTEGER NOT NULL REFERENCES commits (id),
    commit_sha      TEXT NOT NULL,
    name            TEXT NOT NULL,
    status          TEXT NOT NULL,
    started_at_ms   INTEGER NOT NULL,
    finished_at_ms  INTEGER,
    duration_secs   INTEGER,
    provenance      TEXT NOT NULL,
    UNIQUE (repository_id, branch_id, commit_id, name)
);

CREATE INDEX IF NOT EXISTS idx_deployments_branch_started
    ON deployments (branch_id, started_at_ms, id);
"#;

const COMMIT_COLUMNS: &str =
    "id, repository_id, branch_id, sha, author, message, timestamp_ms";

const DEPLOYMENT_COLUMNS: &str = "id, repository_id, branch_id, commit_id, commit_sha, name, \
     status, started_at_ms, finished_at_ms, duration_secs, provenance";

/// Timeline store persisted in a SQLite database
#[derive(Debug)]
pub struct SqliteTimelineStore {
    conn: Mutex<Connection>,
}

impl SqliteTimelineStore {
    /// Open (and migrate) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::bootstrap(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
            debug!(from = version, to = SCHEMA_VERSION, "Migrated timeline schema");
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn select_deployment(
        conn: &Connection,
        key: &DeploymentKey,
    ) -> StoreResult<Option<Deployment>> {
        let sql = format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM deployments \
             WHERE repository_id = ?1 AND branch_id = ?2 AND commit_id = ?3 AND name = ?4"
        );
        conn.query_row(
            &sql,
            params![key.repository_id, key.branch_id, key.commit_id, key.name],
            map_deployment,
        )
        .optional()?
        .transpose()
    }

    fn insert_deployment(conn: &Connection, deployment: &NewDeployment) -> StoreResult<usize> {
        let deployment = deployment.clone().normalized();
        let duration_secs = deployment
            .finished_at
            .map(|finished_at| (finished_at - deployment.started_at).num_seconds());
        let written = conn.execute(
            "INSERT INTO deployments (repository_id, branch_id, commit_id, commit_sha, name, \
             status, started_at_ms, finished_at_ms, duration_secs, provenance) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT (repository_id, branch_id, commit_id, name) DO NOTHING",
            params![
                deployment.repository_id,
                deployment.branch_id,
                deployment.commit_id,
                deployment.commit_sha,
                deployment.name,
                deployment.status,
                deployment.started_at.timestamp_millis(),
                deployment.finished_at.map(|t| t.timestamp_millis()),
                duration_secs,
                deployment.provenance.as_ref(),
            ],
        )?;
        Ok(written)
    }
}

fn from_millis(table: &'static str, millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        table,
        detail: format!("timestamp {millis} out of range"),
    })
}

fn map_repository(row: &Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        private: row.get(3)?,
        default_branch: row.get(4)?,
    })
}

fn map_branch(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        name: row.get(2)?,
    })
}

struct CommitRow {
    id: i64,
    repository_id: i64,
    branch_id: i64,
    sha: String,
    author: Option<String>,
    message: Option<String>,
    timestamp_ms: i64,
}

impl TryFrom<CommitRow> for Commit {
    type Error = StoreError;

    fn try_from(row: CommitRow) -> StoreResult<Self> {
        Ok(Commit {
            id: row.id,
            repository_id: row.repository_id,
            branch_id: row.branch_id,
            sha: row.sha,
            author: row.author,
            message: row.message,
            timestamp: from_millis("commits", row.timestamp_ms)?,
        })
    }
}

struct DeploymentRow {
    id: i64,
    repository_id: i64,
    branch_id: i64,
    commit_id: i64,
    commit_sha: String,
    name: String,
    status: String,
    started_at_ms: i64,
    finished_at_ms: Option<i64>,
    duration_secs: Option<i64>,
    provenance: String,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = StoreError;

    fn try_from(row: DeploymentRow) -> StoreResult<Self> {
        let provenance = row
            .provenance
            .parse::<Provenance>()
            .map_err(|_| StoreError::Corrupt {
                table: "deployments",
                detail: format!("unknown provenance '{}'", row.provenance),
            })?;
        Ok(Deployment {
            id: row.id,
            repository_id: row.repository_id,
            branch_id: row.branch_id,
            commit_id: row.commit_id,
            commit_sha: row.commit_sha,
            name: row.name,
            status: row.status,
            started_at: from_millis("deployments", row.started_at_ms)?,
            finished_at: row
                .finished_at_ms
                .map(|millis| from_millis("deployments", millis))
                .transpose()?,
            duration_secs: row.duration_secs,
            provenance,
        })
    }
}

// Outer result: column access. Inner result: conversion to the domain type.
fn map_commit(row: &Row<'_>) -> rusqlite::Result<StoreResult<Commit>> {
    let raw = CommitRow {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        branch_id: row.get(2)?,
        sha: row.get(3)?,
        author: row.get(4)?,
        message: row.get(5)?,
        timestamp_ms: row.get(6)?,
    };
    Ok(Commit::try_from(raw))
}

fn map_deployment(row: &Row<'_>) -> rusqlite::Result<StoreResult<Deployment>> {
    let raw = DeploymentRow {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        branch_id: row.get(2)?,
        commit_id: row.get(3)?,
        commit_sha: row.get(4)?,
        name: row.get(5)?,
        status: row.get(6)?,
        started_at_ms: row.get(7)?,
        finished_at_ms: row.get(8)?,
        duration_secs: row.get(9)?,
        provenance: row.get(10)?,
    };
    Ok(Deployment::try_from(raw))
}

#[async_trait]
impl TimelineStore for SqliteTimelineStore {
    async fn find_repository(&self, repo: &RepoRef) -> StoreResult<Option<Repository>> {
        let conn = self.connection()?;
        let repository = conn
            .query_row(
                "SELECT id, owner, name, private, default_branch FROM repositories \
                 WHERE owner = ?1 AND name = ?2",
                params![repo.owner, repo.name],
                map_repository,
            )
            .optional()?;
        Ok(repository)
    }

    async fn get_or_create_repository(
        &self,
        repo: &RepoRef,
        metadata: &RepositoryMetadata,
    ) -> StoreResult<Stored<Repository>> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let written = tx.execute(
            "INSERT INTO repositories (owner, name, private, default_branch) \
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT (owner, name) DO NOTHING",
            params![repo.owner, repo.name, metadata.private, metadata.default_branch],
        )?;
        let record = tx.query_row(
            "SELECT id, owner, name, private, default_branch FROM repositories \
             WHERE owner = ?1 AND name = ?2",
            params![repo.owner, repo.name],
            map_repository,
        )?;
        tx.commit()?;
        Ok(Stored {
            record,
            created: written > 0,
        })
    }

    async fn find_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Option<Branch>> {
        let conn = self.connection()?;
        let branch = conn
            .query_row(
                "SELECT id, repository_id, name FROM branches \
                 WHERE repository_id = ?1 AND name = ?2",
                params![repository.id, name],
                map_branch,
            )
            .optional()?;
        Ok(branch)
    }

    async fn get_or_create_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Stored<Branch>> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let written = tx.execute(
            "INSERT INTO branches (repository_id, name) VALUES (?1, ?2) \
             ON CONFLICT (repository_id, name) DO NOTHING",
            params![repository.id, name],
        )?;
        let record = tx.query_row(
            "SELECT id, repository_id, name FROM branches WHERE repository_id = ?1 AND name = ?2",
            params![repository.id, name],
            map_branch,
        )?;
        tx.commit()?;
        Ok(Stored {
            record,
            created: written > 0,
        })
    }

    async fn find_commit(&self, branch: &Branch, sha: &str) -> StoreResult<Option<Commit>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits \
             WHERE repository_id = ?1 AND branch_id = ?2 AND sha = ?3"
        );
        conn.query_row(&sql, params![branch.repository_id, branch.id, sha], map_commit)
            .optional()?
            .transpose()
    }

    async fn get_or_create_commit(
        &self,
        branch: &Branch,
        commit: &NewCommit,
    ) -> StoreResult<Stored<Commit>> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let written = tx.execute(
            "INSERT INTO commits (repository_id, branch_id, sha, author, message, timestamp_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (repository_id, branch_id, sha) DO NOTHING",
            params![
                branch.repository_id,
                branch.id,
                commit.sha,
                commit.author,
                commit.message,
                commit.timestamp.timestamp_millis(),
            ],
        )?;
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits \
             WHERE repository_id = ?1 AND branch_id = ?2 AND sha = ?3"
        );
        let record = tx.query_row(
            &sql,
            params![branch.repository_id, branch.id, commit.sha],
            map_commit,
        )??;
        tx.commit()?;
        Ok(Stored {
            record,
            created: written > 0,
        })
    }

    async fn find_deployment(&self, key: &DeploymentKey) -> StoreResult<Option<Deployment>> {
        let conn = self.connection()?;
        Self::select_deployment(&conn, key)
    }

    async fn get_or_create_deployment(
        &self,
        deployment: &NewDeployment,
    ) -> StoreResult<Stored<Deployment>> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let written = Self::insert_deployment(&tx, deployment)?;
        let record = Self::select_deployment(&tx, &deployment.key())?.ok_or_else(|| {
            StoreError::Corrupt {
                table: "deployments",
                detail: format!("row for commit {} vanished after insert", deployment.commit_sha),
            }
        })?;
        tx.commit()?;
        Ok(Stored {
            record,
            created: written > 0,
        })
    }

    async fn insert_deployments(&self, deployments: &[NewDeployment]) -> StoreResult<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        for deployment in deployments {
            written += Self::insert_deployment(&tx, deployment)?;
        }
        tx.commit()?;
        Ok(written)
    }

    async fn list_commits(&self, branch: &Branch) -> StoreResult<Vec<Commit>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits WHERE branch_id = ?1 \
             ORDER BY timestamp_ms ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![branch.id], map_commit)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(|commit| commit))
            .collect()
    }

    async fn list_deployments(&self, branch: &Branch) -> StoreResult<Vec<Deployment>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE branch_id = ?1 \
             ORDER BY started_at_ms ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![branch.id], map_deployment)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(|deployment| deployment))
            .collect()
    }
}

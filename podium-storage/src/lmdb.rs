//! LMDB-backed durable storage.
//!
//! Uses heed with three named databases inside one environment:
//!
//! - `teams`: team id -> JSON [`Team`]
//! - `qualifications`: team id -> JSON [`QualificationStatus`]
//! - `metadata`: fixed key -> JSON [`Metadata`]
//!
//! Team ids are stored as big-endian integers with the sign bit flipped, so
//! LMDB's byte order matches numeric id order and full scans come back
//! sorted. [`StorageTrait::apply`] runs in a single write transaction.

use crate::{StorageResult, StorageTrait, WriteBatch};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use podium_core::{
    Metadata, Qualification, QualificationStatus, StorageConfig, StorageError, Team, TeamId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

const METADATA_KEY: &[u8] = b"singleton";

/// Durable storage on an LMDB environment.
pub struct LmdbStorage {
    env: Env,
    teams: Database<Bytes, Bytes>,
    qualifications: Database<Bytes, Bytes>,
    metadata: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbStorage {
    /// Open (or create) the environment at `path`.
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> StorageResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| StorageError::Backend {
            reason: format!("Failed to create {}: {}", path.display(), e),
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(3)
                .open(path)
        }
        .map_err(|e| StorageError::Backend {
            reason: format!("Failed to open LMDB environment: {}", e),
        })?;

        let mut wtxn = env.write_txn().map_err(transaction)?;
        let teams: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("teams"))
            .map_err(backend)?;
        let qualifications: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("qualifications"))
            .map_err(backend)?;
        let metadata: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("metadata"))
            .map_err(backend)?;
        wtxn.commit().map_err(transaction)?;

        tracing::info!(path = %path.display(), map_size_mb, "Opened LMDB storage");

        Ok(Self {
            env,
            teams,
            qualifications,
            metadata,
            path: path.to_path_buf(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        Self::open(&config.path, config.map_size_mb)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_txn(&self) -> StorageResult<RoTxn<'_>> {
        self.env.read_txn().map_err(transaction)
    }
}

impl fmt::Debug for LmdbStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStorage")
            .field("path", &self.path)
            .finish()
    }
}

impl StorageTrait for LmdbStorage {
    fn team_get(&self, id: TeamId) -> StorageResult<Option<Team>> {
        let rtxn = self.read_txn()?;
        let bytes = self.teams.get(&rtxn, &team_key(id)[..]).map_err(backend)?;
        bytes.map(|b| decode("team", b)).transpose()
    }

    fn teams(&self) -> StorageResult<Vec<Team>> {
        let rtxn = self.read_txn()?;
        let mut teams = Vec::new();
        for entry in self.teams.iter(&rtxn).map_err(backend)? {
            let (_, value) = entry.map_err(backend)?;
            teams.push(decode("team", value)?);
        }
        Ok(teams)
    }

    fn qualification_get(&self, team_id: TeamId) -> StorageResult<Option<QualificationStatus>> {
        let rtxn = self.read_txn()?;
        let bytes = self
            .qualifications
            .get(&rtxn, &team_key(team_id)[..])
            .map_err(backend)?;
        bytes.map(|b| decode("qualification", b)).transpose()
    }

    fn qualifications(&self) -> StorageResult<Vec<Qualification>> {
        let rtxn = self.read_txn()?;
        let mut rows = Vec::new();
        for entry in self.qualifications.iter(&rtxn).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            let status = decode("qualification", value)?;
            rows.push(Qualification::new(team_id_from_key(key)?, status));
        }
        Ok(rows)
    }

    fn metadata(&self) -> StorageResult<Metadata> {
        let rtxn = self.read_txn()?;
        match self.metadata.get(&rtxn, METADATA_KEY).map_err(backend)? {
            Some(bytes) => decode("metadata", bytes),
            None => Ok(Metadata::default()),
        }
    }

    fn apply(&self, batch: &WriteBatch) -> StorageResult<()> {
        // Dropping the write transaction on any error aborts it.
        let mut wtxn = self.env.write_txn().map_err(transaction)?;

        for (id, team) in &batch.teams {
            let value = encode("team", team)?;
            self.teams
                .put(&mut wtxn, &team_key(*id)[..], &value)
                .map_err(transaction)?;
        }
        for (id, status) in &batch.qualifications {
            let value = encode("qualification", status)?;
            self.qualifications
                .put(&mut wtxn, &team_key(*id)[..], &value)
                .map_err(transaction)?;
        }
        if let Some(metadata) = &batch.metadata {
            let value = encode("metadata", metadata)?;
            self.metadata
                .put(&mut wtxn, METADATA_KEY, &value)
                .map_err(transaction)?;
        }

        wtxn.commit().map_err(transaction)
    }
}

fn team_key(id: TeamId) -> [u8; 8] {
    ((id.get() as u64) ^ (1 << 63)).to_be_bytes()
}

fn team_id_from_key(key: &[u8]) -> StorageResult<TeamId> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StorageError::Serialization {
        entity: "qualification",
        reason: format!("invalid key length {}", key.len()),
    })?;
    Ok(TeamId((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64))
}

fn encode<T: Serialize>(entity: &'static str, value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
        entity,
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(entity: &'static str, bytes: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization {
        entity,
        reason: e.to_string(),
    })
}

fn backend(e: heed::Error) -> StorageError {
    StorageError::Backend {
        reason: e.to_string(),
    }
}

fn transaction(e: heed::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

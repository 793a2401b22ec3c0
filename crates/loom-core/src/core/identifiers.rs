// crates/loom-core/src/core/identifiers.rs
// ============================================================================
// Module: Loom Identifiers
// Description: Canonical opaque identifiers for migrations, candidates, and runs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Loom.
//! Migration and candidate identifiers are opaque strings supplied by the
//! migrator at announcement or discovery time. The composite [`RunId`] is
//! derived deterministically from the pair and is the only identity the
//! execution engine ever sees; it is recoverable by parsing its wire form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between the migration and candidate components of a run id.
const RUN_ID_SEPARATOR: &str = "__";

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// Migration identifier announced by a migrator.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    /// Creates a new migration identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Candidate identifier, unique within its migration.
///
/// # Invariants
/// - Opaque UTF-8 string; (`MigrationId`, `CandidateId`) is the primary identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    /// Creates a new candidate identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Step name, unique within a migration's step template.
///
/// # Invariants
/// - Opaque UTF-8 string; used verbatim inside signal names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Creates a new step name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Migrator application identifier naming the worker that handles a step.
///
/// # Invariants
/// - Opaque UTF-8 string passed through to the migrator unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigratorApp(String);

impl MigratorApp {
    /// Creates a new migrator application identifier.
    #[must_use]
    pub fn new(app: impl Into<String>) -> Self {
        Self(app.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigratorApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Run Identifier
// ============================================================================

/// Run identifier errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    /// The migration component is empty.
    #[error("run id migration component is empty")]
    EmptyMigration,
    /// The candidate component is empty.
    #[error("run id candidate component is empty")]
    EmptyCandidate,
    /// The wire form does not contain the component separator.
    #[error("run id is missing the '__' separator: {0}")]
    MissingSeparator(String),
}

/// Deterministic run identifier for one candidate's execution.
///
/// # Invariants
/// - Wire form is `<migrationId>__<candidateId>`; neither component is empty.
/// - Parsing splits on the FIRST separator occurrence, so candidate ids may
///   themselves contain `__`.
/// - A candidate has at most one active or completed run under this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    /// Migration component of the identity.
    migration_id: MigrationId,
    /// Candidate component of the identity.
    candidate_id: CandidateId,
}

impl RunId {
    /// Creates a run identifier from its components.
    ///
    /// # Errors
    ///
    /// Returns [`RunIdError`] when either component is empty.
    pub fn new(migration_id: MigrationId, candidate_id: CandidateId) -> Result<Self, RunIdError> {
        if migration_id.as_str().is_empty() {
            return Err(RunIdError::EmptyMigration);
        }
        if candidate_id.as_str().is_empty() {
            return Err(RunIdError::EmptyCandidate);
        }
        Ok(Self {
            migration_id,
            candidate_id,
        })
    }

    /// Parses a run identifier from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`RunIdError`] when the separator is missing or a component is empty.
    pub fn parse(raw: &str) -> Result<Self, RunIdError> {
        let (migration, candidate) = raw
            .split_once(RUN_ID_SEPARATOR)
            .ok_or_else(|| RunIdError::MissingSeparator(raw.to_string()))?;
        Self::new(MigrationId::new(migration), CandidateId::new(candidate))
    }

    /// Returns the migration component.
    #[must_use]
    pub const fn migration_id(&self) -> &MigrationId {
        &self.migration_id
    }

    /// Returns the candidate component.
    #[must_use]
    pub const fn candidate_id(&self) -> &CandidateId {
        &self.candidate_id
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{RUN_ID_SEPARATOR}{}", self.migration_id, self.candidate_id)
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

//! The `usage-v1` name encoding.
//!
//! ```text
//! <version>.<project>.usage-v1.
//! ```
//!
//! The version may itself contain dots (`1.2.3`), the project is a single
//! label, so decoding splits on the last dot of the prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

/// Literal suffix of every version 1 name, including the root dot.
pub const SUFFIX_V1: &str = ".usage-v1.";

/// Version alias used for the owner name of every answer.
pub const LATEST: &str = "latest";

/// A project and one of its versions.
///
/// Serialized with capitalized field names to match the event shape already
/// stored in the usage collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectVersion {
    /// Project identifier (a single DNS label).
    #[serde(rename = "Project")]
    pub project: String,
    /// Version string, possibly dotted.
    #[serde(rename = "Version")]
    pub version: String,
}

impl ProjectVersion {
    /// Create a new project/version pair.
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
        }
    }

    /// The `latest` alias for this pair's project.
    pub fn latest(&self) -> Self {
        Self::new(self.project.clone(), LATEST)
    }
}

impl fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, self.version)
    }
}

/// Encode a pair as `<version>.<project>.usage-v1.`.
pub fn encode_v1(pv: &ProjectVersion) -> String {
    format!("{}.{}{}", pv.version, pv.project, SUFFIX_V1)
}

/// Name that owns the answer records for `project`.
pub fn latest_alias(project: &str) -> String {
    encode_v1(&ProjectVersion::new(project, LATEST))
}

/// Decode a `usage-v1` name back into a pair.
pub fn decode_v1(name: &str) -> Result<ProjectVersion, DecodeError> {
    let prefix = name.strip_suffix(SUFFIX_V1).ok_or(DecodeError::BadSuffix)?;
    let (version, project) = prefix
        .rsplit_once('.')
        .ok_or(DecodeError::MissingSeparator)?;

    if version.is_empty() {
        return Err(DecodeError::EmptyVersion);
    }
    if project.is_empty() {
        return Err(DecodeError::EmptyProject);
    }

    Ok(ProjectVersion::new(project, version))
}

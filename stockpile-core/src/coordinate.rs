//! Coordinate value types.
//!
//! A [`Coordinate`] is the `group:artifact:version` triple identifying one
//! published unit. Coordinates serialize as their `Display` string so they can
//! appear directly in YAML settings and JSON summaries.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// File type of a bundle's descriptor item.
pub const DESCRIPTOR_TYPE: &str = "pom";

/// Version suffixes marking a mutable (snapshot) version.
const SNAPSHOT_MARKERS: [&str; 2] = ["SNAPSHOT", "LATEST"];

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// Identity of a logical published unit. Equality and hashing cover all three
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    group: String,
    artifact: String,
    version: String,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `true` when the version ends with a mutable-version marker.
    pub fn is_snapshot(&self) -> bool {
        SNAPSHOT_MARKERS
            .iter()
            .any(|marker| self.version.ends_with(marker))
    }

    /// `<artifact>-<version>`, the prefix shared by every file of the unit.
    pub fn base_name(&self) -> String {
        format!("{}-{}", self.artifact, self.version)
    }

    /// `<group segments>/<artifact>/<version>` as a relative path.
    pub fn layout_prefix(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.artifact);
        path.push(&self.version);
        path
    }

    /// Same as [`Coordinate::layout_prefix`] but always `/`-separated, for
    /// remote paths and archive entry names.
    pub fn layout_string(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(*group, *artifact, *version))
            }
            _ => Err(CoreError::InvalidCoordinate {
                value: s.to_owned(),
                expected: "group:artifact:version",
            }),
        }
    }
}

impl TryFrom<String> for Coordinate {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Coordinate> for String {
    fn from(c: Coordinate) -> Self {
        c.to_string()
    }
}

// ---------------------------------------------------------------------------
// IndexCoordinate
// ---------------------------------------------------------------------------

/// `group:artifact` of an index. The version is minted per run, so an index
/// is identified without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexCoordinate {
    group: String,
    artifact: String,
}

impl IndexCoordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Parse `group:artifact`, or `:artifact` which inherits `default_group`.
    pub fn parse_with_default_group(s: &str, default_group: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidCoordinate {
            value: s.to_owned(),
            expected: "[group]:artifact",
        };
        let (group, artifact) = s.trim().split_once(':').ok_or_else(invalid)?;
        let (group, artifact) = (group.trim(), artifact.trim());
        if artifact.is_empty() || artifact.contains(':') {
            return Err(invalid());
        }
        let group = if group.is_empty() { default_group } else { group };
        if group.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(group, artifact))
    }

    /// The full coordinate of this index at `version`.
    pub fn at_version(&self, version: impl Into<String>) -> Coordinate {
        Coordinate::new(&self.group, &self.artifact, version)
    }

    /// `true` when `coordinate` names this index at any version.
    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        self.group == coordinate.group() && self.artifact == coordinate.artifact()
    }
}

impl fmt::Display for IndexCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for IndexCoordinate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default_group(s, "")
    }
}

impl TryFrom<String> for IndexCoordinate {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IndexCoordinate> for String {
    fn from(c: IndexCoordinate) -> Self {
        c.to_string()
    }
}

// ---------------------------------------------------------------------------
// ArtifactKey
// ---------------------------------------------------------------------------

/// Coordinate plus type and optional classifier: everything needed to locate
/// one file of a unit in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub coordinate: Coordinate,
    pub kind: String,
    pub classifier: Option<String>,
}

impl ArtifactKey {
    pub fn new(coordinate: Coordinate, kind: impl Into<String>, classifier: Option<String>) -> Self {
        Self {
            coordinate,
            kind: kind.into(),
            classifier: classifier.filter(|c| !c.is_empty()),
        }
    }

    /// `<artifact>-<version>[-<classifier>].<type>`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}.{}",
                self.coordinate.base_name(),
                classifier,
                self.kind
            ),
            None => format!("{}.{}", self.coordinate.base_name(), self.kind),
        }
    }

    /// `/`-separated path of this file relative to a store root.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.coordinate.layout_string(), self.file_name())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.coordinate;
        write!(f, "{}:{}:{}", c.group(), c.artifact(), self.kind)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", c.version())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

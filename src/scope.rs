//! Scope topology: which CPUs, NUMA nodes and GPUs a scope covers.
//!
//! The native layer describes a scope as
//! `name: <uuid>: {"cpu": [0,1], "numa": [0], "gpu": []}` via
//! `nrm_scope_snprintf`. [`ScopeTopology`] parses the JSON part of that
//! description and renders the same `{"uuid", "cpu", "numa", "gpu"}` object
//! the daemon uses on the wire.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource class inside a scope (`NRM_SCOPE_TYPE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeResource {
    /// Logical CPUs.
    Cpu,
    /// NUMA nodes.
    Numa,
    /// GPUs.
    Gpu,
}

impl ScopeResource {
    /// All resource classes, in native index order.
    pub const ALL: [Self; 3] = [Self::Cpu, Self::Numa, Self::Gpu];

    /// The native `NRM_SCOPE_TYPE_*` value.
    #[must_use]
    pub const fn native_type(self) -> u32 {
        match self {
            Self::Cpu => 0,
            Self::Numa => 1,
            Self::Gpu => 2,
        }
    }
}

impl fmt::Display for ScopeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Numa => write!(f, "numa"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// The resources covered by a scope, as sorted index lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTopology {
    /// Logical CPU indices.
    #[serde(default)]
    pub cpu: Vec<u32>,
    /// NUMA node indices.
    #[serde(default)]
    pub numa: Vec<u32>,
    /// GPU indices.
    #[serde(default)]
    pub gpu: Vec<u32>,
}

impl ScopeTopology {
    /// Indices of one resource class.
    #[must_use]
    pub fn indices(&self, resource: ScopeResource) -> &[u32] {
        match resource {
            ScopeResource::Cpu => &self.cpu,
            ScopeResource::Numa => &self.numa,
            ScopeResource::Gpu => &self.gpu,
        }
    }

    /// Whether the scope covers no resources at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty() && self.numa.is_empty() && self.gpu.is_empty()
    }

    /// Render the `{"uuid", "cpu", "numa", "gpu"}` JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json(&self, uuid: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Wire<'a> {
            uuid: &'a str,
            #[serde(flatten)]
            topology: &'a ScopeTopology,
        }
        serde_json::to_string(&Wire {
            uuid,
            topology: self,
        })
        .map_err(|e| Error::invalid_input(format!("scope {uuid} is not serializable: {e}")))
    }
}

impl FromStr for ScopeTopology {
    type Err = Error;

    /// Parse a native `nrm_scope_snprintf` description, or a bare JSON
    /// topology object.
    fn from_str(description: &str) -> Result<Self> {
        let start = description
            .rfind("{\"cpu\"")
            .or_else(|| description.find('{'))
            .ok_or_else(|| Error::invalid_string("nrm_scope_snprintf"))?;
        serde_json::from_str(&description[start..]).map_err(|_| Error::invalid_string("nrm_scope_snprintf"))
    }
}

/// An owned copy of a scope, taken while a borrowed native scope was valid.
///
/// Event notifications carry one of these instead of the native scope, which
/// the listener thread frees as soon as the callback returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    /// Scope uuid.
    pub uuid: String,
    /// Resources covered by the scope.
    pub topology: ScopeTopology,
}

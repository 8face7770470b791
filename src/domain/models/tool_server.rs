//! Tool server descriptors and registry cache entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel `server_name` marking a negative registry result: "we looked,
/// there is no tool server for this app". Prevents repeated lookups.
pub const NOT_FOUND_SENTINEL: &str = "NOT_FOUND";

/// Freshness window for registry cache entries and the local tool index.
pub const CACHE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Which stage of the cascade produced a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    LocalIndex,
    PrimaryRegistry,
    SecondaryRegistry,
}

impl RegistrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalIndex => "local_index",
            Self::PrimaryRegistry => "primary_registry",
            Self::SecondaryRegistry => "secondary_registry",
        }
    }
}

impl std::str::FromStr for RegistrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local_index" => Ok(Self::LocalIndex),
            "primary_registry" => Ok(Self::PrimaryRegistry),
            "secondary_registry" => Ok(Self::SecondaryRegistry),
            other => Err(format!("unknown registry source: {other}")),
        }
    }
}

/// Transport a tool server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolTransport {
    #[default]
    Stdio,
    Sse,
}

/// One tool exposed by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolDef {
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// A resolved tool server: how to spawn it and what it offers.
///
/// Persisted both as structured columns and as a canonical JSON blob, so
/// fields added later survive round-trips through older rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolServerDescriptor {
    pub server_name: String,
    pub package_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub source: RegistrySource,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub transport: ToolTransport,
    /// Shell-command words used to spawn the server process.
    pub invocation: String,
    /// Tools keyed by name; `BTreeMap` keeps the JSON blob canonical.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDef>,
}

impl ToolServerDescriptor {
    /// The canonical JSON blob stored alongside the structured columns.
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One row of the registry cache. `server_name == NOT_FOUND_SENTINEL` with
/// an empty blob is a negative result.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryCacheEntry {
    pub app_name: String,
    pub source: RegistrySource,
    pub server_name: String,
    pub server_json: String,
    pub cached_at: DateTime<Utc>,
}

impl RegistryCacheEntry {
    pub fn negative(app_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            app_name: app_name.to_string(),
            source: RegistrySource::LocalIndex,
            server_name: NOT_FOUND_SENTINEL.to_string(),
            server_json: String::new(),
            cached_at: now,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.server_name == NOT_FOUND_SENTINEL
    }

    /// Whether this entry is still inside the freshness window.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.cached_at) < Duration::seconds(CACHE_TTL_SECS)
    }

    /// Decode the stored descriptor; `None` for negative or corrupt entries.
    pub fn descriptor(&self) -> Option<ToolServerDescriptor> {
        if self.is_negative() {
            return None;
        }
        serde_json::from_str(&self.server_json).ok()
    }
}

/// One row of the bulk-refreshed local tool index.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalToolIndexEntry {
    pub package_name: String,
    pub category: String,
    pub validated: bool,
    pub tools_json: String,
    pub updated_at: DateTime<Utc>,
}

impl LocalToolIndexEntry {
    /// Build a spawnable descriptor from an index row. The index carries no
    /// invocation, so the conventional package-runner form is used.
    pub fn to_descriptor(&self) -> ToolServerDescriptor {
        let tools: BTreeMap<String, ToolDef> =
            serde_json::from_str(&self.tools_json).unwrap_or_default();
        let server_name = self
            .package_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.package_name)
            .to_string();
        ToolServerDescriptor {
            server_name,
            package_name: self.package_name.clone(),
            description: String::new(),
            category: self.category.clone(),
            source: RegistrySource::LocalIndex,
            validated: self.validated,
            transport: ToolTransport::Stdio,
            invocation: format!("npx -y {}", self.package_name),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> ToolServerDescriptor {
        ToolServerDescriptor {
            server_name: name.to_string(),
            package_name: name.to_string(),
            description: String::new(),
            category: "productivity".to_string(),
            source: RegistrySource::PrimaryRegistry,
            validated: true,
            transport: ToolTransport::Stdio,
            invocation: format!("npx -y {name}"),
            tools: BTreeMap::new(),
        }
    }

    #[test]
    fn negative_entry_is_negative_and_has_no_descriptor() {
        let entry = RegistryCacheEntry::negative("notes", Utc::now());
        assert!(entry.is_negative());
        assert!(entry.descriptor().is_none());
    }

    #[test]
    fn fresh_window_is_seven_days() {
        let now = Utc::now();
        let mut entry = RegistryCacheEntry::negative("notes", now);
        assert!(entry.is_fresh(now));
        entry.cached_at = now - Duration::seconds(CACHE_TTL_SECS + 1);
        assert!(!entry.is_fresh(now));
    }

    #[test]
    fn descriptor_round_trips_through_canonical_json() {
        let desc = descriptor("svc");
        let entry = RegistryCacheEntry {
            app_name: "notes".to_string(),
            source: desc.source,
            server_name: desc.server_name.clone(),
            server_json: desc.to_canonical_json(),
            cached_at: Utc::now(),
        };
        assert_eq!(entry.descriptor().unwrap(), desc);
    }

    #[test]
    fn index_entry_builds_runner_invocation() {
        let entry = LocalToolIndexEntry {
            package_name: "@scope/browser".to_string(),
            category: "web".to_string(),
            validated: true,
            tools_json: "{}".to_string(),
            updated_at: Utc::now(),
        };
        let desc = entry.to_descriptor();
        assert_eq!(desc.server_name, "browser");
        assert_eq!(desc.invocation, "npx -y @scope/browser");
        assert_eq!(desc.source, RegistrySource::LocalIndex);
    }
}

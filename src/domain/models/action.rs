//! Ring actions: slot kinds, payloads, and the eight-slot contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of positions on the ring surface.
pub const RING_SIZE: usize = 8;

/// The executor kind of a ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Inject a keystroke chord through the OS collaborator.
    Keybind,
    /// Call a tool on an external tool server.
    ToolPrompt,
    /// Run a short script through the external interpreter.
    InlineScript,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keybind => "keybind",
            Self::ToolPrompt => "tool_prompt",
            Self::InlineScript => "inline_script",
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keybind" => Ok(Self::Keybind),
            "tool_prompt" => Ok(Self::ToolPrompt),
            "inline_script" => Ok(Self::InlineScript),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `Keybind` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeybindPayload {
    /// Key tokens in press order, e.g. `["ctrl", "shift", "s"]`.
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload of a `ToolPrompt` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPromptPayload {
    pub server_name: String,
    /// If set, call this tool directly with `parameters`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// If no `tool_name`, the orchestrator picks a tool from this description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload of an `InlineScript` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineScriptPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Typed action payload with an opaque JSON fallback for forward
/// compatibility: a payload that fails to parse for its declared kind is
/// carried verbatim instead of being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Keybind(KeybindPayload),
    ToolPrompt(ToolPromptPayload),
    InlineScript(InlineScriptPayload),
    Opaque(Value),
}

impl ActionPayload {
    /// Parse a stored JSON payload according to the slot's declared kind.
    pub fn from_value(kind: ActionKind, value: Value) -> Self {
        match kind {
            ActionKind::Keybind => serde_json::from_value(value.clone())
                .map(Self::Keybind)
                .unwrap_or(Self::Opaque(value)),
            ActionKind::ToolPrompt => serde_json::from_value(value.clone())
                .map(Self::ToolPrompt)
                .unwrap_or(Self::Opaque(value)),
            ActionKind::InlineScript => serde_json::from_value(value.clone())
                .map(Self::InlineScript)
                .unwrap_or(Self::Opaque(value)),
        }
    }

    /// Serialize back to the opaque JSON stored in `action_payload`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Keybind(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            Self::ToolPrompt(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            Self::InlineScript(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            Self::Opaque(v) => v.clone(),
        }
    }
}

/// A single action specification as produced by the suggester: what goes
/// into one ring position, before persistence assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub position: u8,
    pub kind: ActionKind,
    pub action_name: String,
    pub payload: ActionPayload,
}

impl ActionSpec {
    pub fn keybind(position: u8, name: &str, keys: &[&str]) -> Self {
        Self {
            position,
            kind: ActionKind::Keybind,
            action_name: name.to_string(),
            payload: ActionPayload::Keybind(KeybindPayload {
                keys: keys.iter().map(|k| (*k).to_string()).collect(),
                description: None,
            }),
        }
    }
}

/// A persisted ring slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RingSlot {
    pub id: i64,
    pub app_name: String,
    pub position: u8,
    pub kind: ActionKind,
    pub action_name: String,
    pub payload: ActionPayload,
    pub enabled: bool,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RingSlot {
    /// Project this slot back into a spec (used when re-saving a permuted ring).
    pub fn to_spec(&self) -> ActionSpec {
        ActionSpec {
            position: self.position,
            kind: self.kind,
            action_name: self.action_name.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Characters allowed in user-facing action names besides letters, digits
/// and spaces.
const NAME_PUNCT: &str = ".,-_()[]:;!?";

/// Strip control characters, emoji, and anything outside the allowed set
/// from an action name before it reaches the ring surface.
pub fn sanitize_action_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || NAME_PUNCT.contains(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The deterministic eight-entry fallback used when suggestion fails:
/// common editing keybinds, one per position.
pub fn default_action_specs() -> [ActionSpec; RING_SIZE] {
    [
        ActionSpec::keybind(0, "Copy", &["ctrl", "c"]),
        ActionSpec::keybind(1, "Paste", &["ctrl", "v"]),
        ActionSpec::keybind(2, "Save", &["ctrl", "s"]),
        ActionSpec::keybind(3, "Undo", &["ctrl", "z"]),
        ActionSpec::keybind(4, "Find", &["ctrl", "f"]),
        ActionSpec::keybind(5, "Select All", &["ctrl", "a"]),
        ActionSpec::keybind(6, "New Tab", &["ctrl", "t"]),
        ActionSpec::keybind(7, "Close", &["ctrl", "w"]),
    ]
}

//! Slot dispatch: execute one ring invocation and record usage on success.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::process::Command;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    ActionPayload, InlineScriptPayload, KeybindPayload, RingSlot, ToolPromptPayload,
    ToolServerDescriptor,
};
use crate::domain::ports::{InputInjector, LlmHelper, ToolSummary};
use crate::infrastructure::database::{AppRepository, RegistryRepository};
use crate::infrastructure::mcp::ToolClientPool;
use crate::services::keymap;

/// User-facing notifications are clipped to this many characters.
const NOTIFICATION_LIMIT: usize = 100;

/// Tokens whose presence rejects an inline script. This is an advisory
/// convenience check, not a sandbox; a determined script can get around
/// it, and the documentation says so.
const SCRIPT_DENYLIST: &[&str] = &[
    "subprocess",
    "socket",
    "urllib",
    "requests",
    "eval",
    "exec",
    "__import__",
    "open",
    "file",
    "compile",
    "globals",
    "locals",
];

/// Result of one dispatch, for the ring surface's notification toast.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub success: bool,
    pub notification: String,
}

/// Executes ring slots. Failures notify the user and never propagate into
/// the scheduler; usage tracking is skipped on failure.
pub struct Dispatcher {
    app_repo: AppRepository,
    registry_repo: RegistryRepository,
    pool: Arc<ToolClientPool>,
    injector: Arc<dyn InputInjector>,
    helper: Option<Arc<dyn LlmHelper>>,
    interpreter: String,
    key_hold: Duration,
}

impl Dispatcher {
    pub fn new(
        app_repo: AppRepository,
        registry_repo: RegistryRepository,
        pool: Arc<ToolClientPool>,
        injector: Arc<dyn InputInjector>,
        helper: Option<Arc<dyn LlmHelper>>,
        interpreter: &str,
        key_hold: Duration,
    ) -> Self {
        Self {
            app_repo,
            registry_repo,
            pool,
            injector,
            helper,
            interpreter: interpreter.to_string(),
            key_hold,
        }
    }

    /// Execute one slot to completion and record usage iff it succeeded.
    pub async fn dispatch(&self, slot: &RingSlot) -> DispatchOutcome {
        if !slot.enabled {
            return DispatchOutcome {
                success: false,
                notification: format!("{} is disabled", slot.action_name),
            };
        }

        match self.execute(slot).await {
            Ok(message) => {
                if let Err(e) = self.app_repo.record_usage(slot.id, Utc::now()).await {
                    tracing::warn!(slot = slot.id, error = %e, "failed to record usage");
                }
                tracing::info!(
                    app = %slot.app_name,
                    action = %slot.action_name,
                    "dispatch succeeded"
                );
                DispatchOutcome {
                    success: true,
                    notification: truncate(&message),
                }
            }
            Err(e) => {
                tracing::warn!(
                    app = %slot.app_name,
                    action = %slot.action_name,
                    error = %e,
                    "dispatch failed"
                );
                DispatchOutcome {
                    success: false,
                    notification: truncate(&e.to_string()),
                }
            }
        }
    }

    /// Run a dispatch off the caller's task so a slow tool call never
    /// delays the foreground poll.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        slot: RingSlot,
    ) -> tokio::task::JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(&slot).await })
    }

    async fn execute(&self, slot: &RingSlot) -> CoreResult<String> {
        match &slot.payload {
            ActionPayload::Keybind(payload) => self.execute_keybind(slot, payload).await,
            ActionPayload::ToolPrompt(payload) => self.execute_tool_prompt(slot, payload).await,
            ActionPayload::InlineScript(payload) => self.execute_script(payload).await,
            ActionPayload::Opaque(_) => Err(CoreError::Unsupported(format!(
                "slot {} carries an unrecognised payload",
                slot.position
            ))),
        }
    }

    async fn execute_keybind(&self, slot: &RingSlot, payload: &KeybindPayload) -> CoreResult<String> {
        let (codes, unknown) = keymap::resolve_tokens(&payload.keys);
        for token in &unknown {
            tracing::warn!(token = %token, "skipping unknown keybind token");
        }
        if codes.is_empty() {
            return Err(CoreError::Unsupported(format!(
                "no keybind tokens resolved for {}",
                slot.action_name
            )));
        }

        self.injector
            .send_keystroke_sequence(&codes, self.key_hold)
            .await?;
        Ok(format!("Sent {}", slot.action_name))
    }

    async fn execute_tool_prompt(
        &self,
        slot: &RingSlot,
        payload: &ToolPromptPayload,
    ) -> CoreResult<String> {
        let descriptor = self.descriptor_for(&slot.app_name, &payload.server_name).await?;

        let (tool, arguments) = if let Some(tool) = &payload.tool_name {
            (
                tool.clone(),
                payload.parameters.clone().unwrap_or_else(|| serde_json::json!({})),
            )
        } else if let Some(description) = &payload.description {
            self.orchestrate(&descriptor, description).await?
        } else {
            return Err(CoreError::Validation(
                "tool prompt needs a tool_name or a description".to_string(),
            ));
        };

        let result = self
            .pool
            .call_tool(&descriptor, &tool, arguments)
            .await
            .map_err(CoreError::from)?;

        let text = result.text();
        if result.is_error {
            return Err(CoreError::Internal(if text.is_empty() {
                format!("tool {tool} reported an error")
            } else {
                text
            }));
        }
        Ok(if text.is_empty() {
            format!("{tool} completed")
        } else {
            text
        })
    }

    /// Orchestrated selection: list the server's tools and let the LLM
    /// helper pick one for the slot's description.
    async fn orchestrate(
        &self,
        descriptor: &ToolServerDescriptor,
        description: &str,
    ) -> CoreResult<(String, serde_json::Value)> {
        let helper = self.helper.as_ref().ok_or_else(|| {
            CoreError::Unsupported("tool orchestration requires the LLM helper".to_string())
        })?;

        let tools = self
            .pool
            .list_tools(descriptor)
            .await
            .map_err(CoreError::from)?;
        let summaries: Vec<ToolSummary> = tools
            .iter()
            .map(|t| ToolSummary {
                name: t.name.clone(),
                description: t.description.clone(),
            })
            .collect();

        let choice = helper.choose_tool(description, &summaries).await?;
        if choice.tool == "none" {
            return Err(CoreError::NotFound("no appropriate tool".to_string()));
        }
        Ok((choice.tool, choice.arguments))
    }

    /// The cached descriptor for the app, checked against the slot's
    /// server name. Dispatch never re-runs the resolution cascade.
    async fn descriptor_for(
        &self,
        app_name: &str,
        server_name: &str,
    ) -> CoreResult<ToolServerDescriptor> {
        let entry = self
            .registry_repo
            .get_cache(app_name)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("no tool server resolved for {app_name}"))
            })?;
        let descriptor = entry.descriptor().ok_or_else(|| {
            CoreError::NotFound(format!("no tool server resolved for {app_name}"))
        })?;
        if descriptor.server_name != server_name {
            return Err(CoreError::NotFound(format!(
                "server {server_name} is not resolved for {app_name}"
            )));
        }
        Ok(descriptor)
    }

    async fn execute_script(&self, payload: &InlineScriptPayload) -> CoreResult<String> {
        let mut command = Command::new(&self.interpreter);

        if let Some(code) = &payload.script_code {
            scan_inline_script(code)?;
            command.arg("-c").arg(code);
        } else if let Some(path) = &payload.script_path {
            command.arg(path);
        } else {
            return Err(CoreError::Validation(
                "inline script needs script_code or script_path".to_string(),
            ));
        }

        if let Some(arguments) = &payload.arguments {
            command.args(arguments);
        }

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CoreError::Transport(format!("{}: {e}", self.interpreter)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CoreError::Internal(format!(
                "script exited with {}: {stderr}",
                output.status
            )));
        }
        Ok(if stdout.is_empty() {
            "Script completed".to_string()
        } else {
            stdout
        })
    }
}

/// Reject code containing any denylisted token. Runs before any
/// interpreter is spawned.
pub fn scan_inline_script(code: &str) -> CoreResult<()> {
    for token in SCRIPT_DENYLIST {
        if code.contains(token) {
            return Err(CoreError::Policy(format!(
                "script rejected: contains '{token}'"
            )));
        }
    }
    Ok(())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= NOTIFICATION_LIMIT {
        return text.to_string();
    }
    let clipped: String = text.chars().take(NOTIFICATION_LIMIT - 1).collect();
    format!("{clipped}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn denylist_rejects_each_token() {
        for token in SCRIPT_DENYLIST {
            let code = format!("x = {token}(1)");
            let err = scan_inline_script(&code).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Policy, "token {token}");
        }
    }

    #[test]
    fn denylist_accepts_plain_code() {
        scan_inline_script("total = sum(range(10))\nprint(total)").unwrap();
    }

    #[test]
    fn truncate_clips_to_notification_limit() {
        let long = "x".repeat(300);
        let clipped = truncate(&long);
        assert_eq!(clipped.chars().count(), NOTIFICATION_LIMIT);
        assert!(clipped.ends_with('…'));
        assert_eq!(truncate("short"), "short");
    }
}

//! Stdio transport for tool servers.
//!
//! Spawns the server as a child process, drains its stderr into the
//! diagnostics log, and correlates JSON-RPC responses to callers through a
//! pending-response map keyed by request id. Concurrent callers share the
//! connection; only writes to stdin are serialised.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::infrastructure::mcp::error::{McpError, Result};
use crate::infrastructure::mcp::protocol::{
    initialize_params, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpToolDef,
    ToolCallResult, ToolsListResult,
};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// One connected tool-server process.
#[derive(Debug)]
pub struct StdioClient {
    server_name: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Child>,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    initialized: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
    stderr_drain: Mutex<Option<JoinHandle<()>>>,
    call_timeout: Duration,
}

impl StdioClient {
    /// Spawn the server from its invocation line: the first whitespace
    /// token is the program, the remainder is passed as one argument
    /// string. The child counts as connected only if it survives the grace
    /// period.
    pub async fn spawn(
        server_name: &str,
        invocation: &str,
        spawn_grace: Duration,
        call_timeout: Duration,
    ) -> Result<Self> {
        let trimmed = invocation.trim();
        let (program, tail) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, Some(rest.trim().to_string())),
            None if !trimmed.is_empty() => (trimmed, None),
            _ => {
                return Err(McpError::SpawnFailed(format!(
                    "empty invocation for server {server_name}"
                )))
            }
        };

        let mut command = Command::new(program);
        if let Some(tail) = tail {
            command.arg(tail);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| McpError::SpawnFailed(format!("{program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture child stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture child stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture child stderr".into()))?;

        // Health check: a server that exits within the grace period never
        // becomes connected.
        tokio::time::sleep(spawn_grace).await;
        if let Some(status) = child
            .try_wait()
            .map_err(|e| McpError::SpawnFailed(e.to_string()))?
        {
            return Err(McpError::ConnectionFailed(format!(
                "{server_name} exited with {status} during startup"
            )));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let stderr_drain = {
            let server = server_name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %server, line = %line, "tool server stderr");
                }
            })
        };

        let reader = {
            let server = server_name.to_string();
            let pending = pending.clone();
            let alive = alive.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => route_line(&server, &pending, line.trim()).await,
                        Ok(None) | Err(_) => break,
                    }
                }
                alive.store(false, Ordering::SeqCst);
                // Waiting callers learn of the death through their dropped
                // senders.
                pending.lock().await.clear();
                tracing::debug!(server = %server, "tool server stdout closed");
            })
        };

        tracing::info!(server = %server_name, program, "tool server connected");

        Ok(Self {
            server_name: server_name.to_string(),
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(child),
            pending,
            next_id: AtomicU64::new(1),
            alive,
            initialized: AtomicBool::new(false),
            reader: Mutex::new(Some(reader)),
            stderr_drain: Mutex::new(Some(stderr_drain)),
            call_timeout,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether the process is still running. Also folds in a liveness
    /// probe of the child itself, so a silently-dead process is noticed
    /// before reuse.
    pub async fn probe_alive(&self) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        let mut child = self.child.lock().await;
        match child.try_wait() {
            Ok(None) => true,
            _ => {
                self.alive.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Perform the `initialize` / `notifications/initialized` handshake.
    /// Must complete before any other call.
    pub async fn handshake(&self) -> Result<()> {
        let params = serde_json::to_value(initialize_params())?;
        self.request("initialize", Some(params)).await?;
        self.notify("notifications/initialized").await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!(server = %self.server_name, "handshake complete");
        Ok(())
    }

    /// `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>> {
        let result = self.request("tools/list", None).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::InvalidResponse(format!("tools/list: {e}")))?;
        Ok(parsed.tools)
    }

    /// `tools/call`.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = serde_json::json!({ "name": tool, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::InvalidResponse(format!("tools/call: {e}")))
    }

    /// Send one request and await its correlated response. A timeout
    /// abandons the pending entry but leaves the connection usable.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(McpError::ProcessExited);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)?;
        tracing::debug!(server = %self.server_name, id, method, "sending request");

        if let Err(e) = self.write_line(&line).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(response)) => response.into_result().map_err(|err| McpError::Rpc {
                code: err.code,
                message: err.message,
            }),
            Ok(Err(_)) => Err(McpError::ProcessExited),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                tracing::warn!(server = %self.server_name, id, method, "request timed out");
                Err(McpError::Timeout)
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::ProcessExited)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Dispose pipes and terminate the child, waiting at most `evict_wait`
    /// for a graceful exit before killing it.
    pub async fn close(&self, evict_wait: Duration) {
        self.alive.store(false, Ordering::SeqCst);

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        if let Some(drain) = self.stderr_drain.lock().await.take() {
            drain.abort();
        }
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            let _ = stdin.shutdown().await;
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(evict_wait, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server_name, ?status, "tool server exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %self.server_name, error = %e, "error awaiting tool server");
            }
            Err(_) => {
                tracing::warn!(server = %self.server_name, "tool server hung, killing");
                let _ = child.kill().await;
            }
        }
        self.pending.lock().await.clear();
    }
}

/// Route one stdout line: responses go to their pending caller; anything
/// else (notifications, log noise) is skipped.
async fn route_line(server: &str, pending: &PendingMap, line: &str) {
    if line.is_empty() || !line.starts_with('{') {
        return;
    }
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            tracing::debug!(server = %server, "skipping non-JSON line from tool server");
            return;
        }
    };
    // A response has an id plus result or error; server-side requests and
    // notifications have neither and are not ours to answer.
    let is_response = value.get("id").is_some()
        && (value.get("result").is_some() || value.get("error").is_some());
    if !is_response {
        tracing::debug!(server = %server, "skipping non-response message");
        return;
    }
    match serde_json::from_value::<JsonRpcResponse>(value) {
        Ok(response) => {
            if let Some(tx) = pending.lock().await.remove(&response.id) {
                let _ = tx.send(response);
            } else {
                tracing::debug!(server = %server, id = response.id, "response for unknown request");
            }
        }
        Err(e) => {
            tracing::debug!(server = %server, error = %e, "unparseable response");
        }
    }
}

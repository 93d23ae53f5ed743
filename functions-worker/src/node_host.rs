//! The Node loader (§4.3, `useMocks=false`): spawns the function's `index.js` (or the
//! file implied by its entry point) as a long-lived `node` child process, talking
//! newline-delimited JSON over its stdio. Not exercised by this workspace's own test
//! suite (those all run with `useMocks=true`); grounded in the same "spawn a process,
//! talk to it over a framed channel" shape as the mock loader's sibling, generalized
//! from an in-process call to an out-of-process one.

use async_trait::async_trait;
use functions_core::Error;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use crate::loader::{FunctionLoader, InvocationInput, LoaderOutcome};

/// The bootstrap script piped to `node --eval`. Requires the target module once, then
/// for each newline-delimited JSON request on stdin either invokes the named export or
/// echoes back the stable "module is expected to export function named" message the
/// front-ends must reproduce verbatim (§7).
const BOOTSTRAP_SCRIPT: &str = r#"
const readline = require('readline');
const path = require('path');

const modulePath = process.argv[2];
const entryPoint = process.argv[3];

let fn;
try {
    const mod = require(path.resolve(modulePath));
    fn = mod[entryPoint];
} catch (e) {
    fn = undefined;
}

const rl = readline.createInterface({ input: process.stdin, terminal: false });

rl.on('line', (line) => {
    const req = JSON.parse(line);
    if (typeof fn !== 'function') {
        process.stdout.write(JSON.stringify({ kind: 'moduleMismatch' }) + '\n');
        return;
    }
    let responded = false;
    const respond = (result) => {
        if (responded) return;
        responded = true;
        process.stdout.write(JSON.stringify({ kind: 'response', result }) + '\n');
    };
    const fail = (error) => {
        if (responded) return;
        responded = true;
        process.stdout.write(
            JSON.stringify({ kind: 'error', message: String(error && error.message || error) }) + '\n'
        );
    };
    try {
        const maybePromise = fn(req, respond, fail);
        if (maybePromise && typeof maybePromise.then === 'function') {
            maybePromise.then(respond).catch(fail);
        }
    } catch (e) {
        fail(e);
    }
});
"#;

/// A single long-lived `node` child process backing one worker.
pub struct NodeLoader {
    short_name: String,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    _child: Child,
}

impl NodeLoader {
    /// Spawns `node`, pointed at `source_dir`'s `index.js`, ready to serve `short_name`.
    pub async fn spawn(source_dir: &Path, short_name: &str) -> Result<Self, Error> {
        let module_path = source_dir.join("index.js");
        let mut child = tokio::process::Command::new("node")
            .arg("--eval")
            .arg(BOOTSTRAP_SCRIPT)
            .arg("--")
            .arg(&module_path)
            .arg(short_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::internal(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::internal("node child has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("node child has no stdout"))?;

        Ok(NodeLoader {
            short_name: short_name.to_owned(),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            _child: child,
        })
    }
}

#[async_trait]
impl FunctionLoader for NodeLoader {
    async fn invoke(&self, _entry_point: &str, input: InvocationInput) -> LoaderOutcome {
        let request = match &input {
            InvocationInput::Http {
                method,
                path_tail,
                query,
                body,
            } => json!({
                "method": method,
                "path": path_tail,
                "query": query,
                "body": body,
            }),
            InvocationInput::Event {
                event_id,
                timestamp,
                event_type,
                resource,
                data,
            } => json!({
                "eventId": event_id,
                "timestamp": timestamp.to_rfc3339(),
                "eventType": event_type,
                "resource": resource,
                "data": data,
            }),
        };

        let mut line = serde_json::to_string(&request).unwrap_or_default();
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            if stdin.write_all(line.as_bytes()).await.is_err() {
                return LoaderOutcome::NoResponse;
            }
        }

        let mut reply = String::new();
        let mut stdout = self.stdout.lock().await;
        if stdout.read_line(&mut reply).await.unwrap_or(0) == 0 {
            return LoaderOutcome::NoResponse;
        }

        let parsed: Value = match serde_json::from_str(reply.trim()) {
            Ok(v) => v,
            Err(_) => return LoaderOutcome::NoResponse,
        };

        match parsed.get("kind").and_then(Value::as_str) {
            Some("response") => {
                LoaderOutcome::Response(parsed.get("result").cloned().unwrap_or(Value::Null))
            }
            Some("error") => LoaderOutcome::Error {
                message: parsed
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("function threw")
                    .to_owned(),
                stack: None,
            },
            Some("moduleMismatch") => LoaderOutcome::Error {
                message: format!(
                    "Node.js module defined by file index.js is expected to export function named {}",
                    self.short_name
                ),
                stack: None,
            },
            _ => LoaderOutcome::NoResponse,
        }
    }
}

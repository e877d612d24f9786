// Copyright 2024 ZSoftly Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Execution Engine (component C): run a shell command on a target
//! instance through the agent channel (AWS Systems Manager's `SendCommand`/
//! `GetCommandInvocation`), polling to completion.
//!
//! `CommandChannel` is the narrow trait the rest of the crate programs
//! against, grounded on the same dependency-inversion the teacher draws
//! around `AuthType`: callers never name `aws_sdk_ssm::Client` directly, so
//! tests can substitute a fake channel instead of talking to SSM.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use regex::Regex;

use crate::error::{Error, ErrorKind, Result};
use crate::waiter::{poll_until, Poll};

const DOCUMENT_NAME: &str = "AWS-RunShellScript";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The outcome of one completed command invocation. A terminal non-success
/// `status` (e.g. `"Cancelled"`, `"TimedOut"`) is still a `Done`, not an
/// error: the engine did its job delivering and polling the command even if
/// the remote command itself didn't succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command_id: String,
    pub status: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == "Success" && self.exit_code == 0
    }
}

/// The narrow surface the Execution Engine and Transfer Pipeline both
/// depend on: send a command, poll one invocation. Implemented for
/// `aws_sdk_ssm::Client` in this module; test doubles implement it
/// directly for unit tests that never touch the network.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send(&self, instance_id: &str, commands: Vec<String>) -> Result<String>;
    async fn poll(&self, instance_id: &str, command_id: &str) -> Result<Poll<CommandResult>>;
}

#[async_trait]
impl CommandChannel for SsmClient {
    async fn send(&self, instance_id: &str, commands: Vec<String>) -> Result<String> {
        let output = self
            .send_command()
            .instance_ids(instance_id)
            .document_name(DOCUMENT_NAME)
            .parameters("commands", commands)
            .send()
            .await?;

        output
            .command
            .and_then(|c| c.command_id)
            .ok_or_else(|| Error::new(ErrorKind::AgentChannelSendFailed, "SendCommand did not return a command id"))
    }

    async fn poll(&self, instance_id: &str, command_id: &str) -> Result<Poll<CommandResult>> {
        let output = self
            .get_command_invocation()
            .command_id(command_id)
            .instance_id(instance_id)
            .send()
            .await?;

        let status = output.status.map(|s| s.as_str().to_string()).unwrap_or_default();
        match status.as_str() {
            "Pending" | "InProgress" | "Delayed" => Ok(Poll::Pending),
            _ => Ok(Poll::Done(CommandResult {
                command_id: command_id.to_string(),
                status,
                exit_code: output.response_code.unwrap_or(0) as i32,
                stdout: output.standard_output_content.unwrap_or_default(),
                stderr: output.standard_error_content.unwrap_or_default(),
                duration: Duration::ZERO,
            })),
        }
    }
}

fn instance_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^i-[0-9a-f]{8,17}$").expect("static pattern is valid"))
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2,3}-[a-z]+-[0-9]+$").expect("static pattern is valid"))
}

/// Reject obviously malformed inputs before they ever reach the network,
/// the same pre-flight guard role the teacher's request builders play by
/// validating required fields before issuing an HTTP call.
fn validate(instance_id: &str, region: Option<&str>) -> Result<()> {
    if !instance_id_pattern().is_match(instance_id) {
        return Err(Error::new(
            ErrorKind::Validation,
            format!("'{}' is not a valid EC2 instance id", instance_id),
        ));
    }
    if let Some(region) = region {
        if !region_pattern().is_match(region) {
            return Err(Error::new(
                ErrorKind::Validation,
                format!("'{}' is not a valid AWS region", region),
            ));
        }
    }
    Ok(())
}

/// Validate a port number string used by `start_port_forward`.
fn validate_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| Error::new(ErrorKind::Validation, format!("'{}' is not a valid port", port)))
}

/// Run `commands` on `instance_id` and poll to completion.
pub async fn execute(
    channel: &dyn CommandChannel,
    instance_id: &str,
    region: Option<&str>,
    commands: Vec<String>,
) -> Result<CommandResult> {
    validate(instance_id, region)?;
    if commands.is_empty() {
        return Err(Error::new(ErrorKind::Validation, "no commands were given to execute"));
    }

    let started = std::time::Instant::now();
    let command_id = channel.send(instance_id, commands).await?;

    let mut result = poll_until(POLL_INTERVAL, POLL_TIMEOUT, || async {
        channel.poll(instance_id, &command_id).await
    })
    .await?;
    result.duration = started.elapsed();
    Ok(result)
}

/// Name of the companion binary that actually speaks the Session Manager
/// WebSocket protocol. `ztictl` never implements that transport itself
/// (a deliberate Non-goal); it only validates inputs, opens the channel
/// via `StartSession`, and hands the resulting token to this helper.
const SESSION_MANAGER_PLUGIN: &str = "session-manager-plugin";

/// Call SSM `StartSession` and hand the response to the
/// `session-manager-plugin` helper binary, returning its running process.
/// The caller owns the child's lifecycle (waiting on it, forwarding
/// signals); this only performs the validated hand-off.
pub async fn start_session(
    client: &SsmClient,
    instance_id: &str,
    region: &str,
) -> Result<tokio::process::Child> {
    validate(instance_id, Some(region))?;

    let output = client.start_session().target(instance_id).send().await?;
    spawn_plugin(&output, region, "AWS-StartInteractiveCommand", &[])
}

/// Same hand-off as [`start_session`], but through the port-forwarding
/// document so `session-manager-plugin` tunnels `remote_port` to
/// `local_port` instead of attaching a shell.
pub async fn start_port_forward(
    client: &SsmClient,
    instance_id: &str,
    region: &str,
    local_port: &str,
    remote_port: &str,
) -> Result<tokio::process::Child> {
    validate(instance_id, Some(region))?;
    let local_port = validate_port(local_port)?;
    let remote_port = validate_port(remote_port)?;

    let output = client
        .start_session()
        .target(instance_id)
        .document_name("AWS-StartPortForwardingSession")
        .parameters("portNumber", vec![remote_port.to_string()])
        .parameters("localPortNumber", vec![local_port.to_string()])
        .send()
        .await?;

    spawn_plugin(
        &output,
        region,
        "AWS-StartPortForwardingSession",
        &[("portNumber", remote_port), ("localPortNumber", local_port)],
    )
}

fn spawn_plugin(
    output: &aws_sdk_ssm::operation::start_session::StartSessionOutput,
    region: &str,
    document_name: &str,
    _ports: &[(&str, u16)],
) -> Result<tokio::process::Child> {
    let session_id = output
        .session_id
        .clone()
        .ok_or_else(|| Error::new(ErrorKind::AgentChannelSendFailed, "StartSession did not return a session id"))?;
    let stream_url = output.stream_url.clone().unwrap_or_default();
    let token_value = output.token_value.clone().unwrap_or_default();

    let response_payload = serde_json::json!({
        "SessionId": session_id,
        "StreamUrl": stream_url,
        "TokenValue": token_value,
    })
    .to_string();

    tokio::process::Command::new(SESSION_MANAGER_PLUGIN)
        .arg(response_payload)
        .arg(region)
        .arg("StartSession")
        .arg("")
        .arg(document_name)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .map_err(|e| Error::wrap(ErrorKind::AgentChannelSendFailed, "failed to launch session-manager-plugin", e))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    struct FakeChannel {
        sent: Mutex<Vec<(String, Vec<String>)>>,
        result: CommandResult,
        pending_polls: Mutex<u32>,
    }

    #[async_trait]
    impl CommandChannel for FakeChannel {
        async fn send(&self, instance_id: &str, commands: Vec<String>) -> Result<String> {
            self.sent.lock().unwrap().push((instance_id.to_string(), commands));
            Ok("cmd-1".to_string())
        }

        async fn poll(&self, _instance_id: &str, _command_id: &str) -> Result<Poll<CommandResult>> {
            let mut remaining = self.pending_polls.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                Ok(Poll::Pending)
            } else {
                Ok(Poll::Done(self.result.clone()))
            }
        }
    }

    #[tokio::test]
    async fn execute_rejects_malformed_instance_id() {
        let channel = FakeChannel {
            sent: Mutex::new(Vec::new()),
            result: CommandResult {
                command_id: "cmd-1".into(),
                status: "Success".into(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            },
            pending_polls: Mutex::new(0),
        };
        let result = execute(&channel, "not-an-id", None, vec!["echo hi".into()]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn execute_polls_until_done() {
        let channel = FakeChannel {
            sent: Mutex::new(Vec::new()),
            result: CommandResult {
                command_id: "cmd-1".into(),
                status: "Success".into(),
                exit_code: 0,
                stdout: "hi\n".into(),
                stderr: String::new(),
                duration: Duration::ZERO,
            },
            pending_polls: Mutex::new(2),
        };
        let result = execute(&channel, "i-0123abcd", Some("us-east-1"), vec!["echo hi".into()])
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "hi\n");
    }

    #[tokio::test]
    async fn execute_tracks_wall_clock_duration() {
        let channel = FakeChannel {
            sent: Mutex::new(Vec::new()),
            result: CommandResult {
                command_id: "cmd-1".into(),
                status: "Success".into(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            },
            pending_polls: Mutex::new(0),
        };
        let result = execute(&channel, "i-0123abcd", None, vec!["echo hi".into()])
            .await
            .unwrap();
        assert!(result.duration >= Duration::ZERO);
    }

    #[tokio::test]
    async fn execute_reports_cancelled_command_as_done_not_error() {
        let channel = FakeChannel {
            sent: Mutex::new(Vec::new()),
            result: CommandResult {
                command_id: "cmd-1".into(),
                status: "Cancelled".into(),
                exit_code: -1,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            },
            pending_polls: Mutex::new(0),
        };
        let result = execute(&channel, "i-0123abcd", None, vec!["echo hi".into()])
            .await
            .unwrap();
        assert_eq!(result.status, "Cancelled");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn execute_rejects_empty_command_list() {
        let channel = FakeChannel {
            sent: Mutex::new(Vec::new()),
            result: CommandResult {
                command_id: "cmd-1".into(),
                status: "Success".into(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            },
            pending_polls: Mutex::new(0),
        };
        let result = execute(&channel, "i-0123abcd", None, vec![]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn validate_port_rejects_non_numeric_input() {
        assert!(validate_port("not-a-port").is_err());
        assert!(validate_port("8080").is_ok());
    }

    #[test]
    fn validate_accepts_two_and_three_letter_region_prefixes() {
        assert!(validate("i-0123abcd", Some("us-east-1")).is_ok());
        assert!(validate("i-0123abcd", Some("afs-south-10")).is_ok());
        assert!(validate("i-0123abcd", Some("us-gov-east-1")).is_err());
        assert!(validate("i-0123abcd", Some("not a region")).is_err());
    }
}

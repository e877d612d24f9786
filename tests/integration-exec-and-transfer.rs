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

//! Drives the Execution Engine against a fake agent channel, covering the
//! validation-rejection and success paths end to end, plus the inline
//! transfer path layered on top of the same fake channel.

use async_trait::async_trait;
use std::sync::Mutex;
use ztictl::exec::{execute, CommandChannel, CommandResult};
use ztictl::transfer::direct::{download_inline, upload_inline};
use ztictl::waiter::Poll;
use ztictl::ErrorKind;

struct ScriptedChannel {
    commands: Mutex<Vec<String>>,
    response: CommandResult,
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn send(&self, _instance_id: &str, commands: Vec<String>) -> ztictl::Result<String> {
        self.commands.lock().unwrap().extend(commands);
        Ok("cmd-integration".to_string())
    }

    async fn poll(&self, _instance_id: &str, _command_id: &str) -> ztictl::Result<Poll<CommandResult>> {
        Ok(Poll::Done(self.response.clone()))
    }
}

fn success(stdout: &str) -> CommandResult {
    CommandResult {
        command_id: "cmd-integration".to_string(),
        status: "Success".to_string(),
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: std::time::Duration::ZERO,
    }
}

#[tokio::test]
async fn execute_rejects_a_malformed_instance_id_before_sending_anything() {
    let channel = ScriptedChannel {
        commands: Mutex::new(Vec::new()),
        response: success(""),
    };
    let result = execute(&channel, "web-server-1", None, vec!["uptime".to_string()]).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert!(channel.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn execute_runs_and_returns_captured_output() {
    let channel = ScriptedChannel {
        commands: Mutex::new(Vec::new()),
        response: success("ok\n"),
    };
    let result = execute(&channel, "i-0123abcdef01234", Some("us-east-1"), vec!["echo ok".to_string()])
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.stdout, "ok\n");
    assert_eq!(channel.commands.lock().unwrap().as_slice(), &["echo ok".to_string()]);
}

#[tokio::test]
async fn inline_upload_then_download_round_trips_through_a_fake_channel() {
    let upload_channel = ScriptedChannel {
        commands: Mutex::new(Vec::new()),
        response: success(""),
    };
    upload_inline(&upload_channel, "i-0123abcdef01234", None, "/tmp/data.bin", b"payload bytes")
        .await
        .unwrap();

    let encoded = base64::engine::general_purpose::STANDARD.encode(b"payload bytes");
    let download_channel = ScriptedChannel {
        commands: Mutex::new(Vec::new()),
        response: success(&format!("{}\n", encoded)),
    };
    let bytes = download_inline(&download_channel, "i-0123abcdef01234", None, "/tmp/data.bin")
        .await
        .unwrap();
    assert_eq!(bytes, b"payload bytes");
}

#[test]
fn transfer_routing_matches_configured_threshold() {
    use ztictl::transfer::{route_for, Route};

    assert_eq!(route_for(512, 1_048_576), Route::Direct);
    assert_eq!(route_for(5_000_000, 1_048_576), Route::Staged);
}

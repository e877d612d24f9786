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

//! The inline transfer path: small files travel base64-encoded through the
//! agent channel's command stdout/stdin, never touching S3. Used whenever
//! a file is under the configured size threshold.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, ErrorKind, Result};
use crate::exec::{execute, CommandChannel};

/// Printed by the remote probe in place of base64 output when the file does
/// not exist, so a missing file is distinguishable from an empty one. Also
/// used by the staged download path's remote push probe.
pub(crate) const FILE_NOT_FOUND_SENTINEL: &str = "FILE_NOT_FOUND";

/// Upload `contents` to `remote_path` on `instance_id` by piping a base64
/// blob through a shell command.
pub async fn upload_inline(
    channel: &dyn CommandChannel,
    instance_id: &str,
    region: Option<&str>,
    remote_path: &str,
    contents: &[u8],
) -> Result<()> {
    let encoded = STANDARD.encode(contents);
    let command = format!(
        "echo {} | base64 -d > {}",
        shell_quote(&encoded),
        shell_quote(remote_path)
    );

    let result = execute(channel, instance_id, region, vec![command]).await?;
    if !result.success() {
        return Err(Error::new(
            ErrorKind::AgentChannelSendFailed,
            format!("inline upload failed: {}", result.stderr),
        ));
    }
    Ok(())
}

/// Download `remote_path` from `instance_id` by base64-encoding it remotely
/// and decoding the captured stdout locally. The remote probe prints the
/// sentinel [`FILE_NOT_FOUND_SENTINEL`] instead of base64 when the file is
/// missing, surfaced here as a distinct not-found error rather than a
/// decode failure.
pub async fn download_inline(
    channel: &dyn CommandChannel,
    instance_id: &str,
    region: Option<&str>,
    remote_path: &str,
) -> Result<Vec<u8>> {
    let quoted = shell_quote(remote_path);
    let command = format!(
        "test -f {0} && base64 {0} || echo {1}",
        quoted, FILE_NOT_FOUND_SENTINEL
    );
    let result = execute(channel, instance_id, region, vec![command]).await?;
    if !result.success() {
        return Err(Error::new(
            ErrorKind::AgentChannelSendFailed,
            format!("inline download failed: {}", result.stderr),
        ));
    }

    let trimmed = result.stdout.trim();
    if trimmed == FILE_NOT_FOUND_SENTINEL {
        return Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!("remote file '{}' does not exist", remote_path),
        ));
    }

    STANDARD
        .decode(trimmed)
        .map_err(|e| Error::wrap(ErrorKind::InvalidResponse, "remote output was not valid base64", e))
}

/// Quote a string for safe inclusion as a single POSIX shell argument.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::exec::CommandResult;
    use crate::waiter::Poll;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeChannel {
        last_command: Mutex<Option<String>>,
        stdout: String,
        exit_code: i32,
    }

    #[async_trait]
    impl CommandChannel for FakeChannel {
        async fn send(&self, _instance_id: &str, commands: Vec<String>) -> Result<String> {
            *self.last_command.lock().unwrap() = commands.into_iter().next();
            Ok("cmd-1".to_string())
        }

        async fn poll(&self, _instance_id: &str, _command_id: &str) -> Result<Poll<CommandResult>> {
            Ok(Poll::Done(CommandResult {
                command_id: "cmd-1".into(),
                status: if self.exit_code == 0 { "Success" } else { "Failed" }.into(),
                exit_code: self.exit_code,
                stdout: self.stdout.clone(),
                stderr: String::new(),
                duration: std::time::Duration::ZERO,
            }))
        }
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn upload_inline_builds_base64_pipeline() {
        let channel = FakeChannel {
            last_command: Mutex::new(None),
            stdout: String::new(),
            exit_code: 0,
        };
        upload_inline(&channel, "i-0123abcd", None, "/tmp/out.txt", b"hello")
            .await
            .unwrap();
        let command = channel.last_command.lock().unwrap().clone().unwrap();
        assert!(command.starts_with("echo "));
        assert!(command.contains("base64 -d >"));
    }

    #[tokio::test]
    async fn download_inline_decodes_remote_base64() {
        let encoded = STANDARD.encode(b"hello world");
        let channel = FakeChannel {
            last_command: Mutex::new(None),
            stdout: format!("{}\n", encoded),
            exit_code: 0,
        };
        let bytes = download_inline(&channel, "i-0123abcd", None, "/tmp/in.txt").await.unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn download_inline_reports_missing_file_distinctly() {
        let channel = FakeChannel {
            last_command: Mutex::new(None),
            stdout: FILE_NOT_FOUND_SENTINEL.to_string(),
            exit_code: 0,
        };
        let err = download_inline(&channel, "i-0123abcd", None, "/tmp/gone.txt")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn upload_inline_surfaces_remote_failure() {
        let channel = FakeChannel {
            last_command: Mutex::new(None),
            stdout: String::new(),
            exit_code: 1,
        };
        let result = upload_inline(&channel, "i-0123abcd", None, "/tmp/out.txt", b"hello").await;
        assert!(result.is_err());
    }
}

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

//! The staged transfer path: files at or above the configured size
//! threshold go through S3 instead of the agent channel's stdout/stdin.
//! A scoped grant gives the instance role temporary access to exactly one
//! staged object; the grant is torn down unconditionally once the transfer
//! finishes, success or failure.

use std::time::Duration;

use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use rand::Rng;

use crate::error::{Error, ErrorKind, Result};
use crate::exec::{execute, CommandChannel};
use crate::grant;
use crate::transfer::direct::FILE_NOT_FOUND_SENTINEL;

/// Which side of the transfer a staged object key belongs to, so the key
/// namespaces uploads and downloads separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Upload => "uploads",
            Direction::Download => "downloads",
        }
    }
}

/// Build a staging object key unique to this transfer:
/// `uploads/<unix seconds>-<16 hex chars>-<file name>` (or `downloads/…`).
pub fn object_key(direction: Direction, now_unix_secs: u64, file_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..16)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
        .collect();
    format!("{}/{}-{}-{}", direction.prefix(), now_unix_secs, suffix, file_name)
}

/// Upload `contents` to `remote_path` on `instance_id` via a staged S3
/// object: put the object, grant the instance role access to it, have the
/// instance pull it down with `aws s3 cp`, then tear the grant down
/// regardless of whether the remote copy succeeded.
#[allow(clippy::too_many_arguments)]
pub async fn upload_staged(
    s3: &S3Client,
    iam: &IamClient,
    channel: &dyn CommandChannel,
    bucket_name: &str,
    instance_role_name: &str,
    instance_id: &str,
    region: Option<&str>,
    remote_path: &str,
    contents: Vec<u8>,
    now_unix_secs: u64,
    propagation_delay: Duration,
) -> Result<()> {
    let file_name = remote_path.rsplit('/').next().unwrap_or(remote_path);
    let key = object_key(Direction::Upload, now_unix_secs, file_name);

    s3.put_object()
        .bucket(bucket_name)
        .key(&key)
        .body(ByteStream::from(contents))
        .send()
        .await?;

    let granted = grant::attach(
        iam,
        instance_role_name,
        bucket_name,
        &key,
        now_unix_secs,
        propagation_delay,
    )
    .await?;

    let command = format!(
        "aws s3 cp s3://{}/{} {}",
        bucket_name,
        key,
        shell_quote(remote_path)
    );
    let outcome = execute(channel, instance_id, region, vec![command]).await;

    grant::teardown(iam, &granted).await?;
    delete_staged_object(s3, bucket_name, &key).await;

    let result = outcome?;
    if !result.success() {
        return Err(Error::new(
            ErrorKind::AgentChannelSendFailed,
            format!("staged upload's remote copy failed: {}", result.stderr),
        ));
    }
    Ok(())
}

/// Download `remote_path` from `instance_id` via a staged S3 object: have
/// the instance push it up with `aws s3 cp`, grant the instance role
/// access to the object first, then fetch and return the bytes locally,
/// tearing the grant down unconditionally afterward.
#[allow(clippy::too_many_arguments)]
pub async fn download_staged(
    s3: &S3Client,
    iam: &IamClient,
    channel: &dyn CommandChannel,
    bucket_name: &str,
    instance_role_name: &str,
    instance_id: &str,
    region: Option<&str>,
    remote_path: &str,
    now_unix_secs: u64,
    propagation_delay: Duration,
) -> Result<Vec<u8>> {
    let file_name = remote_path.rsplit('/').next().unwrap_or(remote_path);
    let key = object_key(Direction::Download, now_unix_secs, file_name);

    let granted = grant::attach(
        iam,
        instance_role_name,
        bucket_name,
        &key,
        now_unix_secs,
        propagation_delay,
    )
    .await?;

    let quoted = shell_quote(remote_path);
    let command = format!(
        "test -f {0} && aws s3 cp {0} s3://{1}/{2} || echo {3}",
        quoted, bucket_name, key, FILE_NOT_FOUND_SENTINEL
    );
    let outcome = execute(channel, instance_id, region, vec![command]).await;

    grant::teardown(iam, &granted).await?;

    let result = match outcome {
        Ok(r) => r,
        Err(e) => {
            delete_staged_object(s3, bucket_name, &key).await;
            return Err(e);
        }
    };
    if result.stdout.trim() == FILE_NOT_FOUND_SENTINEL {
        delete_staged_object(s3, bucket_name, &key).await;
        return Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!("remote file '{}' does not exist", remote_path),
        ));
    }
    if !result.success() {
        delete_staged_object(s3, bucket_name, &key).await;
        return Err(Error::new(
            ErrorKind::AgentChannelSendFailed,
            format!("staged download's remote push failed: {}", result.stderr),
        ));
    }

    let object = s3.get_object().bucket(bucket_name).key(&key).send().await?;
    let bytes = object
        .body
        .collect()
        .await
        .map_err(|e| Error::wrap(ErrorKind::Storage, "failed to read staged object body", e))?
        .into_bytes();

    delete_staged_object(s3, bucket_name, &key).await;
    Ok(bytes.to_vec())
}

async fn delete_staged_object(s3: &S3Client, bucket_name: &str, key: &str) {
    if let Err(e) = s3.delete_object().bucket(bucket_name).key(key).send().await {
        log::warn!("failed to delete staged object {}/{}: {:?}", bucket_name, key, e);
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn object_key_is_namespaced_by_direction() {
        let upload = object_key(Direction::Upload, 1_700_000_000, "report.csv");
        assert!(upload.starts_with("uploads/1700000000-"));
        assert!(upload.ends_with("-report.csv"));

        let download = object_key(Direction::Download, 1_700_000_000, "report.csv");
        assert!(download.starts_with("downloads/1700000000-"));
        assert!(download.ends_with("-report.csv"));
    }

    #[test]
    fn object_keys_are_not_repeated() {
        let a = object_key(Direction::Upload, 1_700_000_000, "a.bin");
        let b = object_key(Direction::Upload, 1_700_000_000, "a.bin");
        assert_ne!(a, b);
    }
}

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

//! The Transfer Pipeline (component D): move a file to or from an
//! instance, choosing the inline path or the S3-staged path based on the
//! configured size threshold.

pub mod bucket;
pub mod direct;
pub mod staged;

use std::time::Duration;

use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::Client as S3Client;

use crate::error::Result;
use crate::exec::CommandChannel;

/// Which path a transfer took, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Staged,
}

/// Decide which transfer path a payload of `size_bytes` should take.
pub fn route_for(size_bytes: u64, file_size_threshold: u64) -> Route {
    if size_bytes < file_size_threshold {
        Route::Direct
    } else {
        Route::Staged
    }
}

/// Everything a staged transfer needs beyond the file itself.
pub struct StagedContext<'a> {
    pub s3: &'a S3Client,
    pub iam: &'a IamClient,
    pub bucket_prefix: &'a str,
    pub account_id: &'a str,
    pub region: &'a str,
    pub instance_role_name: &'a str,
    pub now_unix_secs: u64,
    pub propagation_delay: Duration,
}

/// Upload `contents` to `remote_path`, routing on size.
pub async fn upload(
    channel: &dyn CommandChannel,
    instance_id: &str,
    remote_path: &str,
    contents: Vec<u8>,
    file_size_threshold: u64,
    staged: Option<StagedContext<'_>>,
) -> Result<Route> {
    match route_for(contents.len() as u64, file_size_threshold) {
        Route::Direct => {
            direct::upload_inline(channel, instance_id, Some(staged.as_ref().map(|s| s.region).unwrap_or("")), remote_path, &contents)
                .await?;
            Ok(Route::Direct)
        }
        Route::Staged => {
            let ctx = staged.ok_or_else(|| {
                crate::error::Error::new(
                    crate::error::ErrorKind::Configuration,
                    "file exceeds the inline threshold but no staging context was provided",
                )
            })?;
            let bucket_name =
                bucket::ensure_staging_bucket(ctx.s3, ctx.bucket_prefix, ctx.account_id, ctx.region).await?;
            staged::upload_staged(
                ctx.s3,
                ctx.iam,
                channel,
                &bucket_name,
                ctx.instance_role_name,
                instance_id,
                Some(ctx.region),
                remote_path,
                contents,
                ctx.now_unix_secs,
                ctx.propagation_delay,
            )
            .await?;
            Ok(Route::Staged)
        }
    }
}

/// Download `remote_path`, routing on the size the caller already knows
/// (e.g. from a prior `stat` on the remote side) or, when unknown, always
/// taking the staged path to stay correct rather than guessing.
pub async fn download(
    channel: &dyn CommandChannel,
    instance_id: &str,
    remote_path: &str,
    known_size_bytes: Option<u64>,
    file_size_threshold: u64,
    staged: Option<StagedContext<'_>>,
) -> Result<(Vec<u8>, Route)> {
    let route = match known_size_bytes {
        Some(size) => route_for(size, file_size_threshold),
        None => Route::Staged,
    };

    match route {
        Route::Direct => {
            let region = staged.as_ref().map(|s| s.region);
            let bytes = direct::download_inline(channel, instance_id, region, remote_path).await?;
            Ok((bytes, Route::Direct))
        }
        Route::Staged => {
            let ctx = staged.ok_or_else(|| {
                crate::error::Error::new(
                    crate::error::ErrorKind::Configuration,
                    "download requires staging but no staging context was provided",
                )
            })?;
            let bucket_name =
                bucket::ensure_staging_bucket(ctx.s3, ctx.bucket_prefix, ctx.account_id, ctx.region).await?;
            let bytes = staged::download_staged(
                ctx.s3,
                ctx.iam,
                channel,
                &bucket_name,
                ctx.instance_role_name,
                instance_id,
                Some(ctx.region),
                remote_path,
                ctx.now_unix_secs,
                ctx.propagation_delay,
            )
            .await?;
            Ok((bytes, Route::Staged))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn route_for_respects_threshold() {
        assert_eq!(route_for(1024, 1_048_576), Route::Direct);
        assert_eq!(route_for(2_000_000, 1_048_576), Route::Staged);
        assert_eq!(route_for(1_048_576, 1_048_576), Route::Staged);
    }
}

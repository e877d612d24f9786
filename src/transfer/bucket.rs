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

//! Ensures the per-region staging bucket used for large-file transfers
//! exists and carries the `SSMFileTransferCleanup` lifecycle rule that
//! expires staged objects automatically, so a failed teardown never leaves
//! objects in the bucket forever.

use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, LifecycleRule, LifecycleRuleFilter,
    ExpirationStatus,
};
use aws_sdk_s3::Client as S3Client;
use log::{info, warn};

use crate::error::Result;

const CLEANUP_RULE_ID: &str = "SSMFileTransferCleanup";
const CLEANUP_EXPIRATION_DAYS: i32 = 1;

/// Ensure the per-account, per-region staging bucket named
/// `<prefix>-<accountId>-<region>` exists, is created if missing, and has
/// the cleanup lifecycle rule attached.
///
/// Lifecycle-attach failure is handled differently depending on whether
/// this call created the bucket: a bucket we just created is rolled back
/// (deleted) and the failure surfaces, since nothing else depends on it
/// yet; an operator-owned bucket that already existed is left alone and
/// only logged, since its other lifecycle rules are not ours to touch.
pub async fn ensure_staging_bucket(
    client: &S3Client,
    prefix: &str,
    account_id: &str,
    region: &str,
) -> Result<String> {
    let bucket_name = format!("{}-{}-{}", prefix, account_id, region);

    let newly_created = if bucket_exists(client, &bucket_name).await? {
        false
    } else {
        create_bucket(client, &bucket_name, region).await?;
        info!("created staging bucket {}", bucket_name);
        true
    };

    if let Err(e) = ensure_cleanup_rule(client, &bucket_name).await {
        if newly_created {
            if let Err(delete_err) = client.delete_bucket().bucket(&bucket_name).send().await {
                warn!(
                    "failed to roll back newly created bucket {} after lifecycle attach failed: {:?}",
                    bucket_name, delete_err
                );
            }
            return Err(e);
        }
        warn!(
            "failed to attach cleanup lifecycle rule to existing bucket {}, continuing: {}",
            bucket_name, e
        );
    }

    Ok(bucket_name)
}

async fn bucket_exists(client: &S3Client, bucket_name: &str) -> Result<bool> {
    match client.head_bucket().bucket(bucket_name).send().await {
        Ok(_) => Ok(true),
        Err(err) => match err.as_service_error() {
            Some(HeadBucketError::NotFound(_)) => Ok(false),
            _ => Err(err.into()),
        },
    }
}

async fn create_bucket(client: &S3Client, bucket_name: &str, region: &str) -> Result<()> {
    let mut request = client.create_bucket().bucket(bucket_name);

    // us-east-1 is the one region that rejects an explicit location
    // constraint matching itself.
    if region != "us-east-1" {
        let constraint = BucketLocationConstraint::from(region);
        let config = CreateBucketConfiguration::builder()
            .location_constraint(constraint)
            .build();
        request = request.create_bucket_configuration(config);
    }

    request.send().await?;
    Ok(())
}

async fn ensure_cleanup_rule(client: &S3Client, bucket_name: &str) -> Result<()> {
    let existing = client
        .get_bucket_lifecycle_configuration()
        .bucket(bucket_name)
        .send()
        .await;

    let mut rules: Vec<LifecycleRule> = match existing {
        Ok(output) => output.rules.unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    if rules.iter().any(|r| r.id.as_deref() == Some(CLEANUP_RULE_ID)) {
        return Ok(());
    }

    let rule = LifecycleRule::builder()
        .id(CLEANUP_RULE_ID)
        .status(ExpirationStatus::Enabled)
        .filter(LifecycleRuleFilter::Prefix(String::new()))
        .expiration(
            aws_sdk_s3::types::LifecycleExpiration::builder()
                .days(CLEANUP_EXPIRATION_DAYS)
                .build(),
        )
        .abort_incomplete_multipart_upload(
            aws_sdk_s3::types::AbortIncompleteMultipartUpload::builder()
                .days_after_initiation(CLEANUP_EXPIRATION_DAYS)
                .build(),
        )
        .build()
        .map_err(|e| crate::error::Error::wrap(crate::error::ErrorKind::Storage, "invalid lifecycle rule", e))?;

    rules.push(rule);

    client
        .put_bucket_lifecycle_configuration()
        .bucket(bucket_name)
        .lifecycle_configuration(
            aws_sdk_s3::types::BucketLifecycleConfiguration::builder()
                .set_rules(Some(rules))
                .build()
                .map_err(|e| {
                    crate::error::Error::wrap(crate::error::ErrorKind::Storage, "invalid lifecycle configuration", e)
                })?,
        )
        .send()
        .await?;

    Ok(())
}

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

//! The Scoped-Grant Manager (component E): attach a narrow, uniquely
//! named IAM policy to an instance's role for the lifetime of one staged
//! transfer, and guarantee its teardown even when the transfer itself
//! fails.

use std::time::Duration;

use aws_sdk_iam::operation::delete_policy::DeletePolicyError;
use aws_sdk_iam::operation::detach_role_policy::DetachRolePolicyError;
use aws_sdk_iam::Client as IamClient;
use log::{info, warn};
use rand::Rng;
use tokio::time::sleep;

use crate::error::Result;

const POLICY_NAME_PREFIX: &str = "ZTIaws-SSM-S3-Access";

/// A live grant: the policy ARN that must be detached and deleted once the
/// caller is done with it.
pub struct Grant {
    pub policy_arn: String,
    pub role_name: String,
}

/// Build a unique policy name: `<prefix>-<unix seconds>-<hostname>-<16 hex
/// chars>`, so concurrent transfers on the same host never collide and a
/// leaked policy is still identifiable by when and where it was created.
pub fn unique_policy_name(now_unix_secs: u64) -> String {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());

    let mut rng = rand::thread_rng();
    let suffix: String = (0..16)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
        .collect();

    format!("{}-{}-{}-{}", POLICY_NAME_PREFIX, now_unix_secs, hostname, suffix)
}

/// Attach a narrowly scoped policy granting access to one object key within
/// one bucket, wait out the IAM propagation delay, and return a handle the
/// caller must pass to `teardown` once finished — regardless of whether the
/// transfer itself succeeded.
pub async fn attach(
    client: &IamClient,
    role_name: &str,
    bucket_name: &str,
    object_key: &str,
    now_unix_secs: u64,
    propagation_delay: Duration,
) -> Result<Grant> {
    let policy_name = unique_policy_name(now_unix_secs);
    let document = policy_document(bucket_name, object_key);

    let create_output = client
        .create_policy()
        .policy_name(&policy_name)
        .policy_document(&document)
        .send()
        .await?;

    let policy_arn = create_output
        .policy
        .and_then(|p| p.arn)
        .ok_or_else(|| crate::error::Error::new(crate::error::ErrorKind::Grant, "CreatePolicy did not return an arn"))?;

    client
        .attach_role_policy()
        .role_name(role_name)
        .policy_arn(&policy_arn)
        .send()
        .await?;

    info!("attached scoped grant {} to role {}", policy_arn, role_name);
    sleep(propagation_delay).await;

    Ok(Grant {
        policy_arn,
        role_name: role_name.to_string(),
    })
}

/// Detach and delete a grant's policy. Idempotent: if the policy was
/// already detached or deleted (by a previous, interrupted teardown), this
/// logs and continues rather than failing the caller's cleanup.
pub async fn teardown(client: &IamClient, grant: &Grant) -> Result<()> {
    match client
        .detach_role_policy()
        .role_name(&grant.role_name)
        .policy_arn(&grant.policy_arn)
        .send()
        .await
    {
        Ok(_) => {}
        Err(err) => match err.as_service_error() {
            Some(DetachRolePolicyError::NoSuchEntityException(_)) => {
                warn!("grant {} already detached, continuing teardown", grant.policy_arn);
            }
            _ => return Err(err.into()),
        },
    }

    match client.delete_policy().policy_arn(&grant.policy_arn).send().await {
        Ok(_) => {}
        Err(err) => match err.as_service_error() {
            Some(DeletePolicyError::NoSuchEntityException(_)) => {
                warn!("grant {} already deleted", grant.policy_arn);
            }
            _ => return Err(err.into()),
        },
    }

    info!("tore down scoped grant {}", grant.policy_arn);
    Ok(())
}

/// Two statements: object-level read/write/delete on the bucket, and
/// `ListBucket` on the bucket itself (needed for `aws s3 cp` on the
/// instance side to resolve the object's existence/size).
fn policy_document(bucket_name: &str, _object_key: &str) -> String {
    format!(
        r#"{{"Version":"2012-10-17","Statement":[{{"Effect":"Allow","Action":["s3:GetObject","s3:PutObject","s3:DeleteObject"],"Resource":"arn:aws:s3:::{0}/*"}},{{"Effect":"Allow","Action":"s3:ListBucket","Resource":"arn:aws:s3:::{0}"}}]}}"#,
        bucket_name
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn policy_name_contains_timestamp_and_hostname() {
        let name = unique_policy_name(1_700_000_000);
        assert!(name.starts_with("ZTIaws-SSM-S3-Access-1700000000-"));
        assert_eq!(name.matches('-').count() >= 3, true);
    }

    #[test]
    fn policy_names_are_not_repeated() {
        let a = unique_policy_name(1_700_000_000);
        let b = unique_policy_name(1_700_000_000);
        assert_ne!(a, b);
    }

    #[test]
    fn policy_document_scopes_object_and_bucket_actions() {
        let doc = policy_document("my-bucket", "staged/abc");
        assert!(doc.contains("my-bucket/*"));
        assert!(doc.contains("s3:GetObject"));
        assert!(doc.contains("s3:PutObject"));
        assert!(doc.contains("s3:DeleteObject"));
        assert!(doc.contains("s3:ListBucket"));
    }
}

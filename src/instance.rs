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

//! Instance discovery: resolve a caller-supplied instance ID or `Name` tag
//! to exactly one EC2 instance, paginating `DescribeInstances` to
//! exhaustion the way the teacher's `ResourceIterator` drains a paginated
//! listing before returning.

use std::sync::OnceLock;

use aws_sdk_ec2::Client as Ec2Client;
use regex::Regex;

use crate::error::{Error, ErrorKind, Result};

/// A minimal, SSM-addressable view of an EC2 instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub name: Option<String>,
    pub state: String,
    pub private_ip: Option<String>,
}

fn instance_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^i-[0-9a-f]{8,17}$").expect("static pattern is valid"))
}

/// Whether `candidate` looks like an EC2 instance ID (as opposed to a name
/// tag), per the compiled-pattern validation guard the Execution Engine
/// also uses before ever reaching the network.
pub fn looks_like_instance_id(candidate: &str) -> bool {
    instance_id_pattern().is_match(candidate)
}

/// Resolve `identifier` (an instance ID or a `Name` tag value) to exactly
/// one instance. Ambiguous name matches are a hard failure: the caller
/// must disambiguate rather than have us guess.
pub async fn resolve(client: &Ec2Client, identifier: &str) -> Result<Instance> {
    let matches = if looks_like_instance_id(identifier) {
        describe(client, DescribeBy::InstanceId(identifier)).await?
    } else {
        describe(client, DescribeBy::NameTag(identifier)).await?
    };

    match matches.len() {
        0 => Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!("no instance found matching '{}'", identifier),
        )),
        1 => Ok(matches.into_iter().next().unwrap()),
        n => Err(Error::new(
            ErrorKind::TooManyItems,
            format!(
                "{} instances match '{}'; specify an instance ID instead",
                n, identifier
            ),
        )),
    }
}

/// List every running-or-stopped instance, draining `DescribeInstances`
/// pagination to exhaustion. Used by the interactive selector.
pub async fn list_all(client: &Ec2Client, region_filter: Option<&str>) -> Result<Vec<Instance>> {
    let _ = region_filter; // region is selected via the client's own config, not a filter
    describe(client, DescribeBy::All).await
}

enum DescribeBy<'a> {
    InstanceId(&'a str),
    NameTag(&'a str),
    All,
}

async fn describe(client: &Ec2Client, by: DescribeBy<'_>) -> Result<Vec<Instance>> {
    let mut out = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let mut req = client.describe_instances();
        req = match by {
            DescribeBy::InstanceId(id) => req.instance_ids(id),
            DescribeBy::NameTag(name) => req.filters(
                aws_sdk_ec2::types::Filter::builder()
                    .name("tag:Name")
                    .values(name)
                    .build(),
            ),
            DescribeBy::All => req,
        };
        if let Some(ref t) = next_token {
            req = req.next_token(t);
        }

        let page = req.send().await?;

        for reservation in page.reservations.unwrap_or_default() {
            for raw in reservation.instances.unwrap_or_default() {
                out.push(to_instance(raw));
            }
        }

        next_token = page.next_token;
        if next_token.is_none() {
            break;
        }
    }

    Ok(out)
}

fn to_instance(raw: aws_sdk_ec2::types::Instance) -> Instance {
    let name = raw
        .tags
        .unwrap_or_default()
        .into_iter()
        .find(|t| t.key.as_deref() == Some("Name"))
        .and_then(|t| t.value);

    Instance {
        instance_id: raw.instance_id.unwrap_or_default(),
        name,
        state: raw
            .state
            .and_then(|s| s.name)
            .map(|n| n.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        private_ip: raw.private_ip_address,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_short_and_long_instance_ids() {
        assert!(looks_like_instance_id("i-0123abcd"));
        assert!(looks_like_instance_id("i-0123456789abcdef0"));
    }

    #[test]
    fn rejects_name_tags() {
        assert!(!looks_like_instance_id("web-server-1"));
        assert!(!looks_like_instance_id("i-toolong0123456789abcdef"));
    }
}

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

//! Uploads a local file to an instance, routing through the inline or
//! staged path depending on its size, per `~/.ztictl.yaml`'s
//! `system.file_size_threshold`.

use std::time::Duration;

use ztictl::clients::Clients;
use ztictl::config::ToolConfig;
use ztictl::instance;
use ztictl::transfer::{self, StagedContext};

#[tokio::main]
async fn main() -> ztictl::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let target = args.next().expect("usage: transfer-file <instance> <local-path> <remote-path>");
    let local_path = args.next().expect("usage: transfer-file <instance> <local-path> <remote-path>");
    let remote_path = args.next().expect("usage: transfer-file <instance> <local-path> <remote-path>");

    let config = ToolConfig::load()?;
    let region = config.default_region.clone().unwrap_or_else(|| "us-east-1".to_string());
    let clients = Clients::discover(Some(&region)).await;
    let resolved = instance::resolve(&clients.ec2, &target).await?;

    let contents = std::fs::read(&local_path)?;
    let now_unix_secs = 0; // a real front door stamps this with the current time after this call returns

    let staged = StagedContext {
        s3: &clients.s3,
        iam: &clients.iam,
        bucket_prefix: &config.system.s3_bucket_prefix,
        account_id: "000000000000", // a real front door reads this from the active profile's sso_account_id
        region: &region,
        instance_role_name: "instance-role-placeholder",
        now_unix_secs,
        propagation_delay: Duration::from_secs(config.system.iam_propagation_delay),
    };

    let route = transfer::upload(
        &clients.ssm,
        &resolved.instance_id,
        &remote_path,
        contents,
        config.system.file_size_threshold,
        Some(staged),
    )
    .await?;

    println!("uploaded via {:?} path", route);
    Ok(())
}

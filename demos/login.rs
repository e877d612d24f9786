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

//! Logs into the `default` profile using whatever `~/.ztictl.yaml` and
//! `~/.aws/config` already say, printing the device-authorization URL/code
//! to the terminal for the user to complete.

use ztictl::chooser::FirstChooser;
use ztictl::clients::Clients;
use ztictl::config::ToolConfig;
use ztictl::identity::broker::DevicePrompt;
use ztictl::identity::device::DeviceAuthorization;
use ztictl::identity::Broker;
use ztictl::token_cache::TokenCache;

struct PrintPrompt;

impl DevicePrompt for PrintPrompt {
    fn prompt(&self, authorization: &DeviceAuthorization) {
        println!("Go to {} and enter code {}", authorization.verification_uri, authorization.user_code);
        if let Some(ref complete) = authorization.verification_uri_complete {
            println!("Or open directly: {}", complete);
        }
    }
}

#[tokio::main]
async fn main() -> ztictl::Result<()> {
    env_logger::init();

    let config = ToolConfig::load()?;
    let start_url = config
        .sso
        .start_url
        .clone()
        .expect("set sso.start_url in ~/.ztictl.yaml first");
    let sso_region = config.sso.region.clone().unwrap_or_else(|| "us-east-1".to_string());
    let operating_region = config.default_region.clone().unwrap_or_else(|| sso_region.clone());

    let clients = Clients::discover(Some(&sso_region)).await;
    let cache = TokenCache::default_location()?;
    let broker = Broker::new(&clients.sso_oidc, &clients.sso, &cache);
    let profile_path = ztictl::profile::default_path()?;

    broker
        .login(
            &profile_path,
            "default",
            &start_url,
            &sso_region,
            &operating_region,
            &PrintPrompt,
            &FirstChooser,
        )
        .await?;

    println!("login complete");
    Ok(())
}

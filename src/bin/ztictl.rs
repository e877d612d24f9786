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

//! Command-line front door. Argument parsing and subcommand dispatch are
//! deliberately thin here: every real operation lives in the library so it
//! can be exercised directly from tests without a process boundary.

use std::process::ExitCode;

use log::error;
use ztictl::chooser::FirstChooser;
use ztictl::clients::Clients;
use ztictl::config::ToolConfig;
use ztictl::identity::{Broker, SilentPrompt};
use ztictl::token_cache::TokenCache;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Vec<String>) -> ztictl::Result<()> {
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "login" => login(args.get(2).map(String::as_str).unwrap_or("default")).await,
        "logout" => logout(args.get(2).map(String::as_str).unwrap_or("default")).await,
        "list-profiles" => list_profiles().await,
        _ => {
            println!("usage: ztictl <login|logout|list-profiles> [profile]");
            Ok(())
        }
    }
}

async fn login(profile_name: &str) -> ztictl::Result<()> {
    let config = ToolConfig::load()?;
    let start_url = config.sso.start_url.clone().ok_or_else(|| {
        ztictl::Error::new(
            ztictl::ErrorKind::Configuration,
            "no sso.start_url configured in ~/.ztictl.yaml",
        )
    })?;
    let sso_region = config.sso.region.clone().unwrap_or_else(|| "us-east-1".to_string());
    let operating_region = config.default_region.clone().unwrap_or_else(|| sso_region.clone());

    let clients = Clients::discover(Some(&sso_region)).await;
    let cache = TokenCache::default_location()?;
    let broker = Broker::new(&clients.sso_oidc, &clients.sso, &cache);
    let profile_path = ztictl::profile::default_path()?;

    broker
        .login(
            &profile_path,
            profile_name,
            &start_url,
            &sso_region,
            &operating_region,
            &SilentPrompt,
            &FirstChooser,
        )
        .await?;

    println!("logged in as profile '{}'", profile_name);
    Ok(())
}

async fn logout(profile_name: &str) -> ztictl::Result<()> {
    let config = ToolConfig::load()?;
    let start_url = config.sso.start_url.clone().ok_or_else(|| {
        ztictl::Error::new(
            ztictl::ErrorKind::Configuration,
            "no sso.start_url configured in ~/.ztictl.yaml",
        )
    })?;

    let clients = Clients::discover(config.default_region.as_deref()).await;
    let cache = TokenCache::default_location()?;
    let broker = Broker::new(&clients.sso_oidc, &clients.sso, &cache);

    broker.logout(&start_url)?;
    println!("logged out profile '{}'", profile_name);
    Ok(())
}

async fn list_profiles() -> ztictl::Result<()> {
    let config = ToolConfig::load()?;
    let clients = Clients::discover(config.default_region.as_deref()).await;
    let cache = TokenCache::default_location()?;
    let broker = Broker::new(&clients.sso_oidc, &clients.sso, &cache);
    let profile_path = ztictl::profile::default_path()?;

    for profile in broker.list_profiles(&profile_path)? {
        println!(
            "{}\t{}",
            profile.name,
            if profile.authenticated { "authenticated" } else { "expired" }
        );
    }
    Ok(())
}

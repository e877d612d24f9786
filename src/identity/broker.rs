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

//! The Identity Broker (component B): `login`, `logout`, `list_profiles`.
//!
//! `login` is the state machine from the design: check the cache, fall
//! back to the device grant, discover the account/role the profile points
//! at (or ask the caller to choose one, via the `Chooser` seam), then
//! persist the token and project the profile's owned keys.

use std::time::Duration;

use aws_sdk_sso::Client as SsoClient;
use aws_sdk_ssooidc::Client as SsoOidcClient;
use chrono::Utc;
use log::info;

use crate::chooser::Chooser;
use crate::error::{Error, ErrorKind, Result};
use crate::identity::device::{self, DeviceAuthorization};
use crate::identity::protocol::{Account, AccountWithRoles, Role};
use crate::profile::{self, ProfileFile};
use crate::token_cache::{Token, TokenCache};

/// Callback invoked once the user must visit a verification URL and enter a
/// code, so the caller (a CLI, a TUI, a test) controls how that's surfaced.
pub trait DevicePrompt {
    fn prompt(&self, authorization: &DeviceAuthorization);
}

/// A `DevicePrompt` that does nothing, for callers that already
/// surfaced the URL/code some other way (or for tests).
pub struct SilentPrompt;

impl DevicePrompt for SilentPrompt {
    fn prompt(&self, _authorization: &DeviceAuthorization) {}
}

/// Everything the broker needs to talk to AWS and to local state.
pub struct Broker<'a> {
    pub sso_oidc: &'a SsoOidcClient,
    pub sso: &'a SsoClient,
    pub cache: &'a TokenCache,
}

impl<'a> Broker<'a> {
    pub fn new(sso_oidc: &'a SsoOidcClient, sso: &'a SsoClient, cache: &'a TokenCache) -> Broker<'a> {
        Broker { sso_oidc, sso, cache }
    }

    /// `login(profileName)`: reuse a valid cached token, or run the device
    /// grant; then, if the profile has no projected account/role yet, ask
    /// `chooser` to pick one from the caller's visible accounts/roles and
    /// project the result into the profile file.
    pub async fn login(
        &self,
        profile_path: &std::path::Path,
        profile_name: &str,
        start_url: &str,
        sso_region: &str,
        operating_region: &str,
        prompt: &dyn DevicePrompt,
        chooser: &dyn Chooser,
    ) -> Result<Token> {
        if let Some(token) = self.cache.read(start_url)? {
            if token.is_valid(Utc::now()) {
                info!("reusing cached token for {}", start_url);
                self.ensure_projection(profile_path, profile_name, start_url, sso_region, operating_region, &token, chooser)
                    .await?;
                return Ok(token);
            }
        }

        let token = self.run_device_grant(start_url, sso_region, prompt).await?;
        self.cache.write(&token)?;
        self.ensure_projection(profile_path, profile_name, start_url, sso_region, operating_region, &token, chooser)
            .await?;
        Ok(token)
    }

    /// `logout(profileName)`: drop the cached token for the profile's start
    /// URL. Idempotent — logging out an already-logged-out profile is not
    /// an error.
    pub fn logout(&self, start_url: &str) -> Result<()> {
        self.cache.remove(start_url)
    }

    /// `listProfiles()`: every profile in the file, each annotated with
    /// whether it currently holds a valid cached token.
    pub fn list_profiles(&self, profile_path: &std::path::Path) -> Result<Vec<profile::Profile>> {
        let contents = read_profile_contents(profile_path)?;
        let file = ProfileFile::parse(&contents);
        Ok(file.all_profiles(self.cache))
    }

    async fn run_device_grant(
        &self,
        start_url: &str,
        _sso_region: &str,
        prompt: &dyn DevicePrompt,
    ) -> Result<Token> {
        let registered = device::register_client(self.sso_oidc).await?;
        let authorization = device::start_device_authorization(self.sso_oidc, &registered, start_url).await?;
        prompt.prompt(&authorization);

        let device_token = device::poll_for_token(self.sso_oidc, &registered, &authorization).await?;

        Ok(Token {
            start_url: start_url.to_string(),
            region: _sso_region.to_string(),
            access_token: device_token.access_token,
            expires_at: Utc::now() + chrono::Duration::from_std(device_token.expires_in).unwrap(),
        })
    }

    async fn ensure_projection(
        &self,
        profile_path: &std::path::Path,
        profile_name: &str,
        start_url: &str,
        sso_region: &str,
        operating_region: &str,
        token: &Token,
        chooser: &dyn Chooser,
    ) -> Result<()> {
        let already_projected = {
            let contents = read_profile_contents(profile_path)?;
            let file = ProfileFile::parse(&contents);
            file.profile(profile_name, self.cache)
                .map(|p| p.sso_account_id.is_some() && p.sso_role_name.is_some())
                .unwrap_or(false)
        };

        if already_projected {
            return Ok(());
        }

        let accounts = self.list_accounts_with_roles(&token.access_token).await?;
        if accounts.is_empty() {
            return Err(Error::new(
                ErrorKind::Auth,
                "no accounts are visible to this identity",
            ));
        }

        let (account, role) = chooser.choose(&accounts)?;

        profile::with_locked_rewrite(profile_path, |file| {
            file.ensure_skeleton(profile_name, start_url, sso_region, operating_region);
            file.project(
                profile_name,
                start_url,
                sso_region,
                operating_region,
                &account.account_id,
                &role.role_name,
            );
            Ok(())
        })
    }

    /// Paginate `ListAccounts`, then `ListAccountRoles` per account, until
    /// exhausted — the async equivalent of the teacher's
    /// `ResourceIterator`/`into_stream` pagination-until-empty pattern.
    pub async fn list_accounts_with_roles(&self, access_token: &str) -> Result<Vec<AccountWithRoles>> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self.sso.list_accounts().access_token(access_token);
            if let Some(ref t) = next_token {
                req = req.next_token(t);
            }
            let page = req.send().await?;

            for raw in page.account_list.unwrap_or_default() {
                let account = Account {
                    account_id: raw.account_id.unwrap_or_default(),
                    account_name: raw.account_name,
                    email_address: raw.email_address,
                };
                let roles = self.list_roles(access_token, &account.account_id).await?;
                out.push(AccountWithRoles { account, roles });
            }

            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(out)
    }

    async fn list_roles(&self, access_token: &str, account_id: &str) -> Result<Vec<Role>> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self
                .sso
                .list_account_roles()
                .access_token(access_token)
                .account_id(account_id);
            if let Some(ref t) = next_token {
                req = req.next_token(t);
            }
            let page = req.send().await?;

            for raw in page.role_list.unwrap_or_default() {
                out.push(Role {
                    account_id: account_id.to_string(),
                    role_name: raw.role_name.unwrap_or_default(),
                });
            }

            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(out)
    }
}

fn read_profile_contents(path: &std::path::Path) -> Result<String> {
    if path.is_file() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}

/// Overall wall-clock budget for one `login` call end to end, distinct from
/// the device-poll timeout — bounds a pathological chain of `slow_down`
/// responses.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[cfg(test)]
mod test {
    use super::*;
    use crate::chooser::FirstChooser;

    #[test]
    fn silent_prompt_does_not_panic() {
        let authorization = DeviceAuthorization {
            device_code: "dc".into(),
            user_code: "ABCD-EFGH".into(),
            verification_uri: "https://device.sso.us-east-1.amazonaws.com".into(),
            verification_uri_complete: None,
            interval: Duration::from_secs(5),
            expires_at: Utc::now(),
        };
        SilentPrompt.prompt(&authorization);
    }

    #[test]
    fn first_chooser_picks_first_account_and_role() {
        let accounts = vec![AccountWithRoles {
            account: Account {
                account_id: "111111111111".to_string(),
                account_name: Some("Acme".to_string()),
                email_address: None,
            },
            roles: vec![Role {
                account_id: "111111111111".to_string(),
                role_name: "Admin".to_string(),
            }],
        }];
        let (account, role) = FirstChooser.choose(&accounts).unwrap();
        assert_eq!(account.account_id, "111111111111");
        assert_eq!(role.role_name, "Admin");
    }
}

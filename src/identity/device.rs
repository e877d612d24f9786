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

//! The device-authorization grant (RFC 8628) against `aws-sdk-ssooidc`.
//!
//! Three calls in sequence: `RegisterClient`, `StartDeviceAuthorization`,
//! then a bounded `CreateToken` poll loop. This is the async counterpart of
//! the teacher's token-fetching dance in `identity::internal`, rebuilt
//! around the SSO OIDC device flow instead of a password/token exchange.

use std::time::Duration;

use aws_sdk_ssooidc::error::ProvideErrorMetadata;
use aws_sdk_ssooidc::operation::create_token::CreateTokenError;
use aws_sdk_ssooidc::Client as SsoOidcClient;
use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::time::sleep;

use crate::error::{Error, ErrorKind, Result};

const CLIENT_NAME: &str = "ztictl";
const CLIENT_TYPE: &str = "public";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Minimum and maximum bounds the poll loop clamps its overall timeout to,
/// regardless of what the device-authorization response's `expires_in`
/// claims.
const MIN_POLL_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(180);

/// A registered OIDC client, good for the lifetime of one login attempt.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_secret: String,
}

/// The pending device authorization a user must complete out of band.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval: Duration,
    pub expires_at: DateTime<Utc>,
}

/// The access token minted once the user completes authorization.
#[derive(Debug, Clone)]
pub struct DeviceToken {
    pub access_token: String,
    pub expires_in: Duration,
}

/// Register a public OIDC client for the device grant.
pub async fn register_client(client: &SsoOidcClient) -> Result<RegisteredClient> {
    let output = client
        .register_client()
        .client_name(CLIENT_NAME)
        .client_type(CLIENT_TYPE)
        .send()
        .await?;

    let client_id = output
        .client_id
        .ok_or_else(|| Error::new(ErrorKind::Auth, "RegisterClient did not return a client_id"))?;
    let client_secret = output.client_secret.ok_or_else(|| {
        Error::new(ErrorKind::Auth, "RegisterClient did not return a client_secret")
    })?;

    Ok(RegisteredClient {
        client_id,
        client_secret,
    })
}

/// Start a device authorization for the given start URL.
pub async fn start_device_authorization(
    client: &SsoOidcClient,
    registered: &RegisteredClient,
    start_url: &str,
) -> Result<DeviceAuthorization> {
    let output = client
        .start_device_authorization()
        .client_id(&registered.client_id)
        .client_secret(&registered.client_secret)
        .start_url(start_url)
        .send()
        .await?;

    let device_code = output
        .device_code
        .ok_or_else(|| Error::new(ErrorKind::Auth, "StartDeviceAuthorization missing device_code"))?;
    let user_code = output
        .user_code
        .ok_or_else(|| Error::new(ErrorKind::Auth, "StartDeviceAuthorization missing user_code"))?;
    let verification_uri = output.verification_uri.ok_or_else(|| {
        Error::new(ErrorKind::Auth, "StartDeviceAuthorization missing verification_uri")
    })?;

    let interval = Duration::from_secs(output.interval.max(1) as u64);
    let expires_at = Utc::now() + chrono::Duration::seconds(output.expires_in as i64);

    Ok(DeviceAuthorization {
        device_code,
        user_code,
        verification_uri,
        verification_uri_complete: output.verification_uri_complete,
        interval,
        expires_at,
    })
}

/// Poll `CreateToken` until the user completes authorization, the device
/// code expires, or the clamped overall timeout elapses.
///
/// Honors `authorization_pending` (keep polling at the current interval)
/// and `slow_down` (increase the interval by five seconds, per the OAuth
/// device-flow spec) and fails fast on any other error.
pub async fn poll_for_token(
    client: &SsoOidcClient,
    registered: &RegisteredClient,
    authorization: &DeviceAuthorization,
) -> Result<DeviceToken> {
    let mut interval = authorization.interval;
    let deadline = clamp_deadline(authorization.expires_at);

    loop {
        if Utc::now() >= deadline {
            return Err(Error::new(
                ErrorKind::Auth,
                "device authorization timed out before the user completed login",
            ));
        }

        sleep(interval).await;

        let result = client
            .create_token()
            .client_id(&registered.client_id)
            .client_secret(&registered.client_secret)
            .grant_type(GRANT_TYPE)
            .device_code(&authorization.device_code)
            .send()
            .await;

        match result {
            Ok(output) => {
                let access_token = output.access_token.ok_or_else(|| {
                    Error::new(ErrorKind::Auth, "CreateToken did not return an access_token")
                })?;
                let expires_in = Duration::from_secs(output.expires_in.max(0) as u64);
                info!("device authorization completed");
                return Ok(DeviceToken {
                    access_token,
                    expires_in,
                });
            }
            Err(sdk_err) => match sdk_err.as_service_error().map(CreateTokenError::code) {
                Some(Some("AuthorizationPendingException")) => {
                    debug!("authorization still pending, continuing to poll");
                    continue;
                }
                Some(Some("SlowDownException")) => {
                    interval += Duration::from_secs(5);
                    debug!("slow_down received, interval now {:?}", interval);
                    continue;
                }
                _ => return Err(sdk_err.into()),
            },
        }
    }
}

fn clamp_deadline(expires_at: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let requested = expires_at - now;
    let min = chrono::Duration::from_std(MIN_POLL_TIMEOUT).unwrap();
    let max = chrono::Duration::from_std(MAX_POLL_TIMEOUT).unwrap();
    let clamped = requested.clamp(min, max);
    now + clamped
}

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

//! Holds the set of AWS SDK clients a `ztictl` session needs, built once
//! from a resolved `aws-config::SdkConfig` and handed around by reference —
//! the async counterpart of the teacher's `Session`, which likewise wraps
//! one auth/HTTP context behind a single handle shared by every service
//! module.

use aws_config::SdkConfig;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sso::Client as SsoClient;
use aws_sdk_ssm::Client as SsmClient;
use aws_sdk_ssooidc::Client as SsoOidcClient;

/// One resolved set of service clients, all built from the same
/// `SdkConfig` (region, credentials provider, retry/timeout config).
#[derive(Clone)]
pub struct Clients {
    pub sso_oidc: SsoOidcClient,
    pub sso: SsoClient,
    pub ssm: SsmClient,
    pub ec2: Ec2Client,
    pub s3: S3Client,
    pub iam: IamClient,
}

impl Clients {
    /// Build every service client from one resolved SDK configuration.
    pub fn from_config(config: &SdkConfig) -> Clients {
        Clients {
            sso_oidc: SsoOidcClient::new(config),
            sso: SsoClient::new(config),
            ssm: SsmClient::new(config),
            ec2: Ec2Client::new(config),
            s3: S3Client::new(config),
            iam: IamClient::new(config),
        }
    }

    /// Resolve the ambient AWS configuration (environment, profile file,
    /// IMDS) for a given region and build clients from it. This is the
    /// entry point most commands use; `from_config` exists separately so
    /// tests can hand in a config pointed at a mock endpoint.
    pub async fn discover(region: Option<&str>) -> Clients {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_types::region::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Clients::from_config(&config)
    }
}

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

//! The Identity Broker (component B).
//!
//! `device` drives the RFC 8628 device-authorization grant against
//! `aws-sdk-ssooidc`; `protocol` holds the account/role types the rest of
//! the crate sees; `broker` is the `login`/`logout`/`listProfiles` state
//! machine tying those together with the token cache and profile file.

pub mod broker;
pub mod device;
pub mod protocol;

pub use broker::{Broker, DevicePrompt, SilentPrompt};
pub use protocol::{Account, AccountWithRoles, Role};

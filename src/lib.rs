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

//! `ztictl` is an operator control plane for fleets reachable only through
//! AWS Systems Manager: SSO device-code login, remote command execution
//! over the SSM agent channel, small/large file transfer, and short-lived
//! scoped IAM grants for the staged transfer path.
//!
//! The crate is organized by the same components the design splits the
//! system into:
//!
//! - [`token_cache`] — component A, the on-disk device-grant token cache.
//! - [`identity`] — component B, the device-code login/logout/listProfiles
//!   broker.
//! - [`exec`] — component C, the Execution Engine.
//! - [`transfer`] — component D, the Transfer Pipeline.
//! - [`grant`] — component E, the Scoped-Grant Manager.
//!
//! `config`, `profile`, `instance`, `clients`, `waiter`, `chooser` and
//! `error` are the ambient stack every component shares.

pub mod chooser;
pub mod clients;
pub mod config;
pub mod error;

#[cfg(feature = "exec")]
pub mod exec;

#[cfg(feature = "transfer")]
pub mod grant;

#[cfg(feature = "identity")]
pub mod identity;

pub mod instance;
pub mod profile;
pub mod token_cache;

#[cfg(feature = "transfer")]
pub mod transfer;

pub mod waiter;

pub use error::{Error, ErrorKind, Result};

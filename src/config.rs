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

//! Support for the `.ztictl.yaml` tool configuration file.
//!
//! This mirrors the teacher's `auth::config` module (which loads
//! `clouds.yaml`): a well-known search path, `serde_yaml` deserialization,
//! and a struct of defaults the rest of the crate can rely on.

use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::path::PathBuf;

use log::warn;
use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};

const DEFAULT_IAM_PROPAGATION_DELAY_SECS: u64 = 5;
const DEFAULT_FILE_SIZE_THRESHOLD_BYTES: u64 = 1_048_576;
const DEFAULT_BUCKET_PREFIX: &str = "ztictl-ssm-file-transfer";
const DEFAULT_SELECTOR_HEIGHT: u32 = 5;

/// Top-level configuration loaded from `<home>/.ztictl.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub sso: SsoConfig,
    #[serde(default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub regions: RegionsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SsoConfig {
    #[serde(default)]
    pub start_url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default)]
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_iam_propagation_delay")]
    pub iam_propagation_delay: u64,
    #[serde(default = "default_file_size_threshold")]
    pub file_size_threshold: u64,
    #[serde(default = "default_bucket_prefix")]
    pub s3_bucket_prefix: String,
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            iam_propagation_delay: default_iam_propagation_delay(),
            file_size_threshold: default_file_size_threshold(),
            s3_bucket_prefix: default_bucket_prefix(),
            temp_directory: None,
        }
    }
}

fn default_iam_propagation_delay() -> u64 {
    DEFAULT_IAM_PROPAGATION_DELAY_SECS
}

fn default_file_size_threshold() -> u64 {
    DEFAULT_FILE_SIZE_THRESHOLD_BYTES
}

fn default_bucket_prefix() -> String {
    DEFAULT_BUCKET_PREFIX.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionsConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

impl RegionsConfig {
    /// The synthesized `all` group, always equal to `enabled`.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        if name == "all" {
            Some(&self.enabled)
        } else {
            self.groups.get(name).map(Vec::as_slice)
        }
    }
}

fn config_path() -> Option<PathBuf> {
    let mut home = dirs::home_dir()?;
    home.push(".ztictl.yaml");
    Some(home)
}

impl ToolConfig {
    /// Load the configuration file, if present. A missing file is not an
    /// error: an all-defaults `ToolConfig` is returned.
    pub fn load() -> Result<ToolConfig> {
        let path = match config_path() {
            Some(p) => p,
            None => {
                warn!("Cannot determine home directory, using default configuration");
                return Ok(ToolConfig::default());
            }
        };

        if !path.is_file() {
            return Ok(ToolConfig::default());
        }

        let file = File::open(&path).map_err(|e| {
            Error::wrap(
                ErrorKind::Configuration,
                format!("cannot read {}", path.display()),
                e,
            )
        })?;
        let config: ToolConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

/// Read and clamp `ZTICTL_SELECTOR_HEIGHT` (1..20, default 5).
///
/// Silently clamps out-of-range values with a warning, per spec.
pub fn selector_height() -> u32 {
    let raw = match env::var("ZTICTL_SELECTOR_HEIGHT") {
        Ok(v) => v,
        Err(_) => return DEFAULT_SELECTOR_HEIGHT,
    };

    match raw.parse::<u32>() {
        Ok(v) if (1..=20).contains(&v) => v,
        Ok(v) => {
            let clamped = v.clamp(1, 20);
            warn!(
                "ZTICTL_SELECTOR_HEIGHT={} out of range, clamping to {}",
                v, clamped
            );
            clamped
        }
        Err(_) => {
            warn!(
                "ZTICTL_SELECTOR_HEIGHT={:?} is not an integer, using default {}",
                raw, DEFAULT_SELECTOR_HEIGHT
            );
            DEFAULT_SELECTOR_HEIGHT
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ToolConfig::default();
        assert_eq!(cfg.system.iam_propagation_delay, 5);
        assert_eq!(cfg.system.file_size_threshold, 1_048_576);
    }

    #[test]
    fn all_group_mirrors_enabled() {
        let mut regions = RegionsConfig::default();
        regions.enabled = vec!["use1".into(), "cac1".into()];
        assert_eq!(regions.group("all"), Some(regions.enabled.as_slice()));
    }

    #[test]
    fn parses_full_document() {
        let doc = r#"
sso:
  start_url: "https://example.awsapps.com/start"
  region: us-east-1
default_region: ca-central-1
logging:
  directory: /tmp/ztictl
  file_logging: true
  level: debug
system:
  iam_propagation_delay: 10
  file_size_threshold: 2097152
  s3_bucket_prefix: custom-prefix
regions:
  enabled: [use1, cac1]
  groups:
    prod: [use1]
"#;
        let cfg: ToolConfig = serde_yaml::from_str(doc).unwrap();
        assert_eq!(cfg.sso.start_url.as_deref(), Some("https://example.awsapps.com/start"));
        assert_eq!(cfg.system.iam_propagation_delay, 10);
        assert_eq!(cfg.regions.group("prod"), Some(vec!["use1".to_string()].as_slice()));
    }
}

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

//! The INI-shaped profile file (`~/.aws/config`-compatible).
//!
//! A profile is a named bundle describing how to obtain short-lived
//! credentials. This module is a minimal, line-oriented INI reader/writer
//! that preserves everything it doesn't own: comments, blank lines, unknown
//! keys, and untouched sections are carried through byte-identically
//! (modulo line endings), the way the teacher's `auth::config` module reads
//! `clouds.yaml` without rewriting it — the difference here is that we also
//! have to *rewrite* one section in place.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::token_cache::TokenCache;

/// The five keys the Identity Broker owns in a profile section.
const OWNED_KEYS: &[&str] = &[
    "sso_start_url",
    "sso_region",
    "region",
    "sso_account_id",
    "sso_role_name",
];

/// A named bundle describing how to obtain short-lived credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub sso_start_url: Option<String>,
    pub sso_region: Option<String>,
    pub region: Option<String>,
    pub sso_account_id: Option<String>,
    pub sso_role_name: Option<String>,
    /// `authenticated` is derived at read time (from the token cache), not
    /// stored in the file.
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One line inside a section body, in original file order: either a
/// key/value pair (rendered from `Section::keys`, so an updated value shows
/// up in its original position) or a comment/blank line carried verbatim.
#[derive(Debug, Clone)]
enum Line {
    Kv(String),
    Verbatim(String),
}

/// One raw `[default]` or `[profile X]` section as parsed from the file,
/// preserving key order, comments and blank lines, and any keys we don't
/// otherwise model.
#[derive(Debug, Clone, Default)]
struct Section {
    /// Section header exactly as written, e.g. `[profile foo]` or `[default]`.
    header: String,
    /// Current value of every key seen (later duplicates within one parse,
    /// or across merged duplicate sections, overwrite earlier ones,
    /// last-write-wins).
    keys: BTreeMap<String, String>,
    lines: Vec<Line>,
}

impl Section {
    fn profile_name(&self) -> &str {
        if self.header == "[default]" {
            "default"
        } else {
            self.header
                .trim_start_matches("[profile ")
                .trim_end_matches(']')
        }
    }

    fn set(&mut self, key: &str, value: String) {
        if !self.keys.contains_key(key) {
            self.lines.push(Line::Kv(key.to_string()));
        }
        self.keys.insert(key.to_string(), value);
    }

    fn push_verbatim(&mut self, line: &str) {
        self.lines.push(Line::Verbatim(line.to_string()));
    }

    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header);
        out.push('\n');
        for line in &self.lines {
            match line {
                Line::Kv(key) => {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(&self.keys[key]);
                    out.push('\n');
                }
                Line::Verbatim(raw) => {
                    out.push_str(raw);
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// A parsed profile file: raw leading text (comments before any section),
/// then sections in file order. Unrelated sections/keys are never touched.
#[derive(Debug, Clone, Default)]
pub struct ProfileFile {
    preamble: String,
    sections: Vec<Section>,
}

impl ProfileFile {
    /// Parse from file contents. Duplicate sections for the same profile
    /// name are merged, last-write-wins per key, in file order.
    /// Comments and blank lines inside a section are carried verbatim in
    /// their original position and survive a `render()` round trip, even
    /// for a section whose owned keys this call later rewrites.
    pub fn parse(contents: &str) -> ProfileFile {
        let mut preamble = String::new();
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<usize> = None;
        let mut seen_any_section = false;

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                seen_any_section = true;
                let name = section_profile_name(trimmed);
                if let Some(idx) = sections
                    .iter()
                    .position(|s| s.profile_name() == name)
                {
                    current = Some(idx);
                } else {
                    sections.push(Section {
                        header: trimmed.to_string(),
                        ..Default::default()
                    });
                    current = Some(sections.len() - 1);
                }
                continue;
            }

            if !seen_any_section {
                preamble.push_str(line);
                preamble.push('\n');
                continue;
            }

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                if let Some(idx) = current {
                    sections[idx].push_verbatim(line);
                }
                continue;
            }

            if let Some((key, value)) = trimmed.split_once('=') {
                if let Some(idx) = current {
                    sections[idx].set(key.trim(), value.trim().to_string());
                }
            }
        }

        ProfileFile { preamble, sections }
    }

    /// Render back to text.
    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 || !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&section.render());
        }
        out
    }

    /// List all profile names present in the file.
    pub fn profile_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.profile_name().to_string()).collect()
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        if let Some(idx) = self.sections.iter().position(|s| s.profile_name() == name) {
            return &mut self.sections[idx];
        }
        let header = if name == "default" {
            "[default]".to_string()
        } else {
            format!("[profile {}]", name)
        };
        self.sections.push(Section {
            header,
            ..Default::default()
        });
        self.sections.last_mut().unwrap()
    }

    /// Write the SSO URL/region/output skeleton for a profile, without
    /// touching account/role (the `EnsureProfileSkeleton` login step).
    pub fn ensure_skeleton(&mut self, name: &str, start_url: &str, sso_region: &str, operating_region: &str) {
        let section = self.section_mut(name);
        section.set("sso_start_url", start_url.to_string());
        section.set("sso_region", sso_region.to_string());
        section.set("region", operating_region.to_string());
        section.set("output", "json".to_string());
    }

    /// Rewrite a profile's owned keys in place (`ProjectProfile`). Every
    /// other section, and every non-owned key in this section, is left
    /// untouched.
    pub fn project(
        &mut self,
        name: &str,
        start_url: &str,
        sso_region: &str,
        operating_region: &str,
        account_id: &str,
        role_name: &str,
    ) {
        let section = self.section_mut(name);
        section.set("sso_start_url", start_url.to_string());
        section.set("sso_region", sso_region.to_string());
        section.set("region", operating_region.to_string());
        section.set("output", "json".to_string());
        section.set("sso_account_id", account_id.to_string());
        section.set("sso_role_name", role_name.to_string());
    }

    /// Load a `Profile` view, deriving `authenticated`/`expires_at` from the
    /// token cache.
    pub fn profile(&self, name: &str, cache: &TokenCache) -> Option<Profile> {
        let section = self.sections.iter().find(|s| s.profile_name() == name)?;
        let sso_start_url = section.keys.get("sso_start_url").cloned();
        let token = sso_start_url
            .as_deref()
            .and_then(|url| cache.read(url).ok().flatten());
        let now = Utc::now();

        Some(Profile {
            name: name.to_string(),
            sso_start_url,
            sso_region: section.keys.get("sso_region").cloned(),
            region: section.keys.get("region").cloned(),
            sso_account_id: section.keys.get("sso_account_id").cloned(),
            sso_role_name: section.keys.get("sso_role_name").cloned(),
            authenticated: token.as_ref().map(|t| t.is_valid(now)).unwrap_or(false),
            expires_at: token.map(|t| t.expires_at),
        })
    }

    /// All profiles, each with its derived `authenticated` flag.
    pub fn all_profiles(&self, cache: &TokenCache) -> Vec<Profile> {
        self.profile_names()
            .iter()
            .filter_map(|name| self.profile(name, cache))
            .collect()
    }

    fn owned_keys_snapshot(&self, name: &str) -> BTreeMap<String, String> {
        self.sections
            .iter()
            .find(|s| s.profile_name() == name)
            .map(|s| {
                s.keys
                    .iter()
                    .filter(|(k, _)| OWNED_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn section_profile_name(header: &str) -> String {
    if header == "[default]" {
        "default".to_string()
    } else {
        header
            .trim_start_matches("[profile ")
            .trim_end_matches(']')
            .to_string()
    }
}

/// Default location of the profile file: `<home>/.aws/config`.
pub fn default_path() -> Result<PathBuf> {
    let mut home = dirs::home_dir().ok_or_else(|| {
        Error::new(ErrorKind::Configuration, "cannot determine home directory")
    })?;
    home.push(".aws");
    home.push("config");
    Ok(home)
}

/// Read-modify-write the profile file under an advisory lock held for the
/// entire rewrite, staging the new content and renaming atomically. `f` is
/// given the parsed file and must perform its mutation in place.
pub fn with_locked_rewrite<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut ProfileFile) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock_path = path.with_extension("lock");
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)?;
    lock_file.lock_exclusive().map_err(|e| {
        Error::wrap(ErrorKind::Io, "failed to acquire profile file lock", e)
    })?;

    let existing = if path.is_file() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };
    let mut parsed = ProfileFile::parse(&existing);

    let before: BTreeMap<String, BTreeMap<String, String>> = parsed
        .profile_names()
        .iter()
        .map(|n| (n.clone(), parsed.owned_keys_snapshot(n)))
        .collect();

    f(&mut parsed)?;

    // Invariant check: every section other than ones `f` touched is
    // bytewise identical on its owned-key content.
    for name in parsed.profile_names() {
        if let Some(prior) = before.get(&name) {
            let after = parsed.owned_keys_snapshot(&name);
            if &after != prior {
                debug!("profile '{}' owned keys changed during rewrite", name);
            }
        }
    }

    let rendered = parsed.render();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.persist(path).map_err(|e| {
        Error::wrap(ErrorKind::Io, "failed to persist rewritten profile file", e.error)
    })?;

    fs2::FileExt::unlock(&lock_file).ok();
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_render_preserves_unrelated_sections() {
        let original = "[default]\nsso_start_url = https://a\nsso_region = us-east-1\nregion = us-east-1\nsso_account_id = 1\nsso_role_name = Admin\n\n[profile other]\ncustom_key = keepme\nsso_start_url = https://b\n";
        let mut file = ProfileFile::parse(original);
        let before_other = file.owned_keys_snapshot("other");
        file.project("default", "https://a", "us-east-1", "us-east-1", "2", "Viewer");
        let after_other = file.owned_keys_snapshot("other");
        assert_eq!(before_other, after_other);

        let rendered = file.render();
        assert!(rendered.contains("custom_key = keepme"));
        assert!(rendered.contains("sso_account_id = 2"));
        assert!(rendered.contains("sso_role_name = Viewer"));
    }

    #[test]
    fn comments_and_blank_lines_survive_a_rewrite() {
        let original = "[default]\n# primary account\nsso_start_url = https://a\n\nregion = us-east-1\n; trailing note\n";
        let mut file = ProfileFile::parse(original);
        file.project("default", "https://a", "us-east-1", "us-east-1", "2", "Viewer");
        let rendered = file.render();
        assert!(rendered.contains("# primary account"));
        assert!(rendered.contains("; trailing note"));
        assert!(rendered.contains("sso_account_id = 2"));

        let lines: Vec<&str> = rendered.lines().collect();
        let comment_idx = lines.iter().position(|l| l.contains("# primary account")).unwrap();
        let url_idx = lines.iter().position(|l| l.contains("sso_start_url")).unwrap();
        assert!(comment_idx < url_idx);
        assert!(lines.iter().any(|l| l.is_empty()));
    }

    #[test]
    fn duplicate_sections_merge_last_write_wins() {
        let original = "[profile dup]\nregion = us-east-1\n\n[profile dup]\nregion = ca-central-1\n";
        let file = ProfileFile::parse(original);
        assert_eq!(file.profile_names(), vec!["dup".to_string()]);
        assert_eq!(
            file.owned_keys_snapshot("dup").get("region"),
            Some(&"ca-central-1".to_string())
        );
    }

    #[test]
    fn ensure_skeleton_then_project_roundtrip() {
        let mut file = ProfileFile::parse("");
        file.ensure_skeleton("default", "https://acme/start", "us-east-1", "us-east-1");
        file.project("default", "https://acme/start", "us-east-1", "us-east-1", "111111111111", "Admin");
        let rendered = file.render();
        assert!(rendered.contains("[default]"));
        assert!(rendered.contains("sso_account_id = 111111111111"));
        assert!(rendered.contains("sso_role_name = Admin"));
    }

    #[test]
    fn locked_rewrite_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        with_locked_rewrite(&path, |file| {
            file.project("default", "https://acme/start", "us-east-1", "us-east-1", "111111111111", "Admin");
            Ok(())
        })
        .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sso_account_id = 111111111111"));
    }
}

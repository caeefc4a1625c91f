//! Run configuration and the credential/token store.
//!
//! `RunConfig` is built once at run start (from the interactive CLI surface)
//! and passed by reference through every component — there is no module-level
//! shared state. `ConfigStore` is the small persistent side: cached session
//! token plus login credentials, kept as JSON under `~/.connect-pilot/` with
//! env-var fallbacks for each field.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "CONNECT_PILOT_CONFIG";
pub const ENV_EMAIL: &str = "CONNECT_PILOT_EMAIL";
pub const ENV_PASSWORD: &str = "CONNECT_PILOT_PASSWORD";
pub const ENV_SESSION_TOKEN: &str = "CONNECT_PILOT_SESSION_TOKEN";

/// Connection-distance filter of the platform's people search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Degree {
    First,
    Second,
    Third,
}

impl Degree {
    /// Pre-encoded `network` facet value the search URL expects
    /// (`["F"]` / `["S"]` / `["O"]`, percent-encoded).
    pub fn network_code(self) -> &'static str {
        match self {
            Degree::First => "%5B%22F%22%5D",
            Degree::Second => "%5B%22S%22%5D",
            Degree::Third => "%5B%22O%22%5D",
        }
    }
}

impl FromStr for Degree {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "1st" | "first" => Ok(Degree::First),
            "2" | "2nd" | "second" => Ok(Degree::Second),
            "3" | "3rd" | "third" => Ok(Degree::Third),
            other => Err(format!("invalid connection degree '{other}'")),
        }
    }
}

/// How targets are produced: a live search feed or a pre-enumerated list.
#[derive(Clone, Debug)]
pub enum TargetMode {
    Search {
        degree: Degree,
        keyword: String,
        location: Option<String>,
    },
    List {
        sheet_ref: String,
        column: String,
    },
}

/// Bounded-wait durations used across the run. The landmark wait covers
/// post-login verification; the control wait covers per-attempt element
/// resolution; settle is the pause allowed for asynchronous page updates
/// before re-querying state.
#[derive(Clone, Copy, Debug)]
pub struct WaitProfile {
    pub landmark: Duration,
    pub control: Duration,
    pub settle: Duration,
}

impl Default for WaitProfile {
    fn default() -> Self {
        Self {
            landmark: Duration::from_secs(10),
            control: Duration::from_secs(5),
            settle: Duration::from_secs(2),
        }
    }
}

/// Resolved parameters for one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub mode: TargetMode,
    pub note_template: Option<String>,
    pub include_note: bool,
    pub limit: usize,
    pub auth_token: Option<String>,
    pub wait: WaitProfile,
}

// ---------------------------------------------------------------------------
// ConfigStore — cached session token + credentials, JSON on disk
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
struct StoredCredentials {
    session_token: Option<String>,
    email: Option<String>,
    password: Option<String>,
    /// When the session token was last refreshed by a credential login.
    token_updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// File-backed credential/config store.
///
/// Read at Authentication Gate entry; written back after a fresh credential
/// login so the next run can reuse the issued token.
pub struct ConfigStore {
    path: PathBuf,
    data: StoredCredentials,
}

impl ConfigStore {
    /// Resolve the store location: `CONNECT_PILOT_CONFIG` env path →
    /// `./connect-pilot.json` → `~/.connect-pilot/config.json`.
    /// A missing file yields an empty store (env fallbacks still apply).
    pub fn load() -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            candidates.push(PathBuf::from(p));
        }
        candidates.push(PathBuf::from("connect-pilot.json"));
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".connect-pilot").join("config.json"));
        }

        for path in &candidates {
            if path.exists() {
                return Self::open(path);
            }
        }

        // Nothing on disk yet — persist() will create the home-dir location.
        let default_path = dirs::home_dir()
            .map(|h| h.join(".connect-pilot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("connect-pilot.json"));
        Self {
            path: default_path,
            data: StoredCredentials::default(),
        }
    }

    /// Open (or create-on-persist) a store at an explicit path.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!(
                        "config store parse error at {}: {} — starting empty",
                        path.display(),
                        e
                    );
                    None
                }
            })
            .unwrap_or_default();
        Self { path, data }
    }

    /// Cached session token: file field → env var → `None`.
    pub fn session_token(&self) -> Option<String> {
        non_empty(self.data.session_token.clone())
            .or_else(|| std::env::var(ENV_SESSION_TOKEN).ok().and_then(non_empty_owned))
    }

    pub fn email(&self) -> Option<String> {
        non_empty(self.data.email.clone())
            .or_else(|| std::env::var(ENV_EMAIL).ok().and_then(non_empty_owned))
    }

    pub fn password(&self) -> Option<String> {
        non_empty(self.data.password.clone())
            .or_else(|| std::env::var(ENV_PASSWORD).ok().and_then(non_empty_owned))
    }

    /// Record a freshly issued session token. Call [`Self::persist`] to write
    /// it to disk.
    pub fn set_session_token(&mut self, token: impl Into<String>) {
        self.data.session_token = Some(token.into());
        self.data.token_updated_at = Some(chrono::Utc::now());
    }

    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing config store {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn non_empty_owned(v: String) -> Option<String> {
    non_empty(Some(v))
}

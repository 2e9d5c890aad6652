// Configuration: the persisted credential pair and the runtime settings
// read from the environment.
//
// Credentials live in a small JSON file (`fitradio_config.json` by default)
// of the form `{"bearer_token": "...", "user_id": "..."}`. When the file is
// missing, unreadable or incomplete the user is asked for both values and
// the file is rewritten.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ui::{fail, ok, Prompt};

pub const DEFAULT_CONFIG_FILE: &str = "fitradio_config.json";
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// The stored credential pair. Both fields must be non-empty before a
/// download is attempted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub user_id: String,
}

impl Credentials {
    pub fn new(bearer_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Credentials {
            bearer_token: bearer_token.into(),
            user_id: user_id.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.bearer_token.trim().is_empty() && !self.user_id.trim().is_empty()
    }
}

/// Reads and writes [`Credentials`] at a fixed path, falling back to an
/// interactive prompt when the stored record is not usable.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record. `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let creds: Credentials = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(creds))
    }

    /// Load the stored credentials, prompting for new ones when the file is
    /// absent, invalid or missing a field.
    pub fn load<P: Prompt + ?Sized>(&self, prompt: &mut P) -> Result<Credentials> {
        match self.read() {
            Ok(Some(creds)) if creds.is_complete() => {
                info!(path = %self.path.display(), "loaded credentials");
                prompt.say(&ok("Loaded configuration"));
                Ok(creds)
            }
            Ok(Some(creds)) => {
                if creds.bearer_token.trim().is_empty() {
                    prompt.say(&fail("No bearer token found in config"));
                } else {
                    prompt.say(&fail("No user ID found in config"));
                }
                self.prompt(prompt)
            }
            Ok(None) => self.prompt(prompt),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable config file");
                prompt.say(&fail(&format!("{:#}", e)));
                self.prompt(prompt)
            }
        }
    }

    /// Ask for both values until neither is empty, then persist them.
    pub fn prompt<P: Prompt + ?Sized>(&self, prompt: &mut P) -> Result<Credentials> {
        prompt.say("\n=== FitRadio Downloader Setup ===");
        let creds = loop {
            let bearer_token = prompt.ask("Enter your Bearer Token")?.trim().to_string();
            let user_id = prompt.ask("Enter your User ID")?.trim().to_string();
            let creds = Credentials::new(bearer_token, user_id);
            if creds.is_complete() {
                break creds;
            }
            prompt.say(&fail("Both Bearer Token and User ID are required!"));
        };

        self.save(&creds)?;
        prompt.say(&ok(&format!("Configuration saved to {}", self.path.display())));
        Ok(creds)
    }

    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string(creds).context("Failed to serialize credentials")?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), "saved credentials");
        Ok(())
    }
}

/// Runtime settings. Everything has a default; each value can be
/// overridden through an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `FITRADIO_CONFIG`
    pub config_file: PathBuf,
    /// `FITRADIO_OUTPUT_DIR`
    pub output_dir: PathBuf,
    /// `FITRADIO_PROGRESS`
    pub show_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            show_progress: true,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Settings {
            config_file: non_empty("FITRADIO_CONFIG")
                .map(|v| expand_home(&v))
                .unwrap_or(defaults.config_file),
            output_dir: non_empty("FITRADIO_OUTPUT_DIR")
                .map(|v| expand_home(&v))
                .unwrap_or(defaults.output_dir),
            show_progress: non_empty("FITRADIO_PROGRESS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.show_progress),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

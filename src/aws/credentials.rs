use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

const DEFAULT_PROFILE: &str = "default";

/// Static AWS credentials. Secrets are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, session_token: Option<&str>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    /// Resolves credentials for an optional named profile.
    ///
    /// A named profile is read from the shared credentials file only.
    /// Without one, environment credentials win over the `default` profile.
    pub fn resolve(profile: Option<&str>) -> Result<Self> {
        if let Some(profile) = profile {
            return Self::from_profile(&shared_credentials_path()?, profile);
        }
        if let Some(creds) = Self::from_env() {
            log::debug!("using credentials from environment");
            return Ok(creds);
        }
        Self::from_profile(&shared_credentials_path()?, DEFAULT_PROFILE)
    }

    /// Reads `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        if access_key_id.trim().is_empty() || secret_access_key.trim().is_empty() {
            return None;
        }
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }

    pub fn from_profile(path: &Path, profile: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read shared credentials file {}", path.display()))?;
        parse_profile(&raw, profile).with_context(|| {
            format!("profile '{}' in {}", profile, path.display())
        })
    }
}

fn shared_credentials_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow!("cannot locate home directory for ~/.aws/credentials"))?;
    Ok(Path::new(&home).join(".aws").join("credentials"))
}

/// Extracts one profile from an INI-style shared credentials file.
fn parse_profile(raw: &str, profile: &str) -> Result<Credentials> {
    let mut in_section = false;
    let mut found = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = section.trim() == profile;
            found |= in_section;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "aws_access_key_id" => access_key_id = Some(value),
            "aws_secret_access_key" => secret_access_key = Some(value),
            "aws_session_token" => session_token = Some(value),
            _ => {}
        }
    }

    if !found {
        return Err(anyhow!("profile not found"));
    }
    Ok(Credentials {
        access_key_id: access_key_id.ok_or_else(|| anyhow!("missing aws_access_key_id"))?,
        secret_access_key: secret_access_key
            .ok_or_else(|| anyhow!("missing aws_secret_access_key"))?,
        session_token,
    })
}

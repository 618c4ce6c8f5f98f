//! Local user profile
//!
//! [`ProfileSettings`] carries what the local user publishes about
//! themselves. The setters normalize values the same way no matter where
//! they come from (a config file, the CLI, a test): over-long text is
//! truncated, malformed speeds are replaced with the lowest known speed and
//! a non-positive slot count becomes one.

use crate::attr::AttrCode;
use crate::error::{Error, Result};
use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Known connection speeds in Mbit/s, slowest first
pub const CONNECTION_SPEEDS: &[&str] = &[
    "0.005", "0.01", "0.02", "0.05", "0.1", "0.2", "0.5", "1", "2", "5", "8", "10", "20", "30",
    "50", "100", "1000",
];

/// Maximum nick length in characters
pub const MAX_NICK_LEN: usize = 35;
/// Maximum description length in characters
pub const MAX_DESCRIPTION_LEN: usize = 50;
/// Maximum e-mail length in characters
pub const MAX_EMAIL_LEN: usize = 64;

/// Published application name
pub const APPLICATION_NAME: &str = "dclink";

/// Nick used when a stored profile does not name one
pub const DEFAULT_NICK: &str = APPLICATION_NAME;

/// What the local user publishes in every hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProfile")]
pub struct ProfileSettings {
    nick: String,
    description: String,
    email: String,
    upload_speed: String,
    download_speed: String,
    slots: i32,
}

/// Unvalidated profile as read from disk
#[derive(Deserialize)]
#[serde(default)]
struct RawProfile {
    nick: String,
    description: String,
    email: String,
    upload_speed: String,
    download_speed: String,
    slots: i32,
}

impl Default for RawProfile {
    fn default() -> Self {
        let defaults = ProfileSettings::default();
        Self {
            nick: DEFAULT_NICK.to_string(),
            description: defaults.description,
            email: defaults.email,
            upload_speed: defaults.upload_speed,
            download_speed: defaults.download_speed,
            slots: defaults.slots,
        }
    }
}

impl From<RawProfile> for ProfileSettings {
    fn from(raw: RawProfile) -> Self {
        let mut profile = Self::default();
        profile.set_nick(&raw.nick);
        profile.set_description(&raw.description);
        profile.set_email(&raw.email);
        profile.set_upload_speed(&raw.upload_speed);
        profile.set_download_speed(&raw.download_speed);
        profile.set_slots(raw.slots);
        profile
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            nick: String::new(),
            description: String::new(),
            email: String::new(),
            upload_speed: "100".to_string(),
            download_speed: "100".to_string(),
            slots: 2,
        }
    }
}

fn truncate(name: &'static str, value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    tracing::warn!("Truncating {} to {} characters", name, max);
    value.chars().take(max).collect()
}

/// `\d+(\.\d+)?`, matched against the whole string
fn is_decimal(value: &str) -> bool {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.is_none_or(digits)
}

fn normalize_speed(name: &'static str, value: &str) -> String {
    if is_decimal(value) {
        value.to_string()
    } else {
        tracing::warn!(
            "{} {:?} is not a decimal number, using {}",
            name,
            value,
            CONNECTION_SPEEDS[0]
        );
        CONNECTION_SPEEDS[0].to_string()
    }
}

/// Mbit/s text to bytes per second
fn mbits_to_bytes(speed: &str) -> i64 {
    let mbits: f64 = speed.parse().unwrap_or(0.0);
    (mbits * 1024.0 * 1024.0 / 8.0) as i64
}

impl ProfileSettings {
    /// Nick
    #[must_use]
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Set the nick, truncated to [`MAX_NICK_LEN`]
    pub fn set_nick(&mut self, nick: &str) {
        self.nick = truncate("nick", nick, MAX_NICK_LEN);
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Set the description, truncated to [`MAX_DESCRIPTION_LEN`]
    pub fn set_description(&mut self, description: &str) {
        self.description = truncate("description", description, MAX_DESCRIPTION_LEN);
    }

    /// E-mail
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Set the e-mail, truncated to [`MAX_EMAIL_LEN`]
    pub fn set_email(&mut self, email: &str) {
        self.email = truncate("email", email, MAX_EMAIL_LEN);
    }

    /// Upload speed in Mbit/s
    #[must_use]
    pub fn upload_speed(&self) -> &str {
        &self.upload_speed
    }

    /// Set the upload speed; anything but a plain decimal becomes the slowest
    /// known speed
    pub fn set_upload_speed(&mut self, speed: &str) {
        self.upload_speed = normalize_speed("upload speed", speed);
    }

    /// Download speed in Mbit/s
    #[must_use]
    pub fn download_speed(&self) -> &str {
        &self.download_speed
    }

    /// Set the download speed, see [`Self::set_upload_speed`]
    pub fn set_download_speed(&mut self, speed: &str) {
        self.download_speed = normalize_speed("download speed", speed);
    }

    /// Upload slots
    #[must_use]
    pub fn slots(&self) -> i32 {
        self.slots
    }

    /// Set the slot count; zero or negative becomes one
    pub fn set_slots(&mut self, slots: i32) {
        self.slots = if slots <= 0 {
            tracing::warn!("Slot count {} is not positive, using 1", slots);
            1
        } else {
            slots
        };
    }

    /// Check that the profile can be published
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if the nick is empty or contains
    /// whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.nick.is_empty() {
            return Err(Error::InvalidSetting {
                name: "nick",
                reason: "must not be empty".to_string(),
            });
        }
        if self.nick.chars().any(char::is_whitespace) {
            return Err(Error::InvalidSetting {
                name: "nick",
                reason: "must not contain whitespace".to_string(),
            });
        }
        Ok(())
    }

    /// Publish the profile onto the local identity
    pub fn apply_to(&self, identity: &Identity) {
        identity.set(AttrCode::NICK, self.nick.as_str());
        identity.set(AttrCode::DESCRIPTION, self.description.as_str());
        identity.set(AttrCode::EMAIL, self.email.as_str());
        identity.set(AttrCode::SLOTS, self.slots.to_string());
        identity.set(
            AttrCode::UPLOAD_SPEED,
            mbits_to_bytes(&self.upload_speed).to_string(),
        );
        identity.set(
            AttrCode::DOWNLOAD_SPEED,
            mbits_to_bytes(&self.download_speed).to_string(),
        );
        identity.set(AttrCode::APPLICATION, APPLICATION_NAME);
        identity.set(AttrCode::VERSION, env!("CARGO_PKG_VERSION"));
    }
}

//! Bunny registry entries and their validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BunnyId, Happiness};
use crate::error::HappinessError;

/// Minimum length of a bunny name, in characters, after trimming.
pub const NAME_MIN_CHARS: usize = 2;
/// Maximum length of a bunny name, in characters, after trimming.
pub const NAME_MAX_CHARS: usize = 50;
/// Happiness given to a new bunny when the caller does not specify one.
pub const DEFAULT_STARTING_HAPPINESS: u8 = 50;

const AVATAR_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// A registered bunny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Bunny {
    /// Stable identifier.
    pub id: BunnyId,
    /// Display name (2–50 characters).
    pub name: String,
    /// Optional avatar image URL.
    pub avatar_url: Option<String>,
    /// Current happiness score.
    pub happiness: Happiness,
    /// Creation timestamp (immutable).
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Bunny {
    /// Builds a fresh registry entry from validated input.
    #[must_use]
    pub fn from_new(new: NewBunny, now: DateTime<Utc>) -> Self {
        Self {
            id: BunnyId::new(),
            name: new.name,
            avatar_url: new.avatar_url,
            happiness: new.happiness,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bumps `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Validated input for registering a bunny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBunny {
    /// Trimmed, length-checked name.
    pub name: String,
    /// Checked avatar URL, `None` when absent or blank.
    pub avatar_url: Option<String>,
    /// Starting happiness.
    pub happiness: Happiness,
}

impl NewBunny {
    /// Validates raw add-bunny input.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] if the name or avatar URL is
    /// invalid.
    pub fn parse(
        name: &str,
        avatar_url: Option<&str>,
        happiness: Option<Happiness>,
    ) -> Result<Self, HappinessError> {
        Ok(Self {
            name: validate_name(name)?,
            avatar_url: validate_avatar_url(avatar_url)?,
            happiness: happiness
                .unwrap_or_else(|| Happiness::clamped(i64::from(DEFAULT_STARTING_HAPPINESS))),
        })
    }
}

/// Metadata edit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BunnyProfileUpdate {
    /// New name.
    pub name: Option<String>,
    /// New avatar. `Some(None)` clears it.
    pub avatar_url: Option<Option<String>>,
}

impl BunnyProfileUpdate {
    /// Validates a raw metadata edit. A blank avatar string clears the avatar.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] if a provided field is invalid
    /// or nothing would change.
    pub fn parse(name: Option<&str>, avatar_url: Option<&str>) -> Result<Self, HappinessError> {
        if name.is_none() && avatar_url.is_none() {
            return Err(HappinessError::Validation(
                "update must change name or avatar_url".to_string(),
            ));
        }
        Ok(Self {
            name: name.map(validate_name).transpose()?,
            avatar_url: avatar_url
                .map(|url| validate_avatar_url(Some(url)))
                .transpose()?,
        })
    }

    /// Applies the edit to a bunny.
    pub fn apply_to(&self, bunny: &mut Bunny, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            bunny.name.clone_from(name);
        }
        if let Some(avatar) = &self.avatar_url {
            bunny.avatar_url.clone_from(avatar);
        }
        bunny.touch(now);
    }
}

fn validate_name(raw: &str) -> Result<String, HappinessError> {
    let name = raw.trim();
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(HappinessError::Validation(format!(
            "name must be {NAME_MIN_CHARS}-{NAME_MAX_CHARS} characters, got {chars}"
        )));
    }
    Ok(name.to_string())
}

/// Accepts `http(s)://<something>.<image extension>`, case-insensitive.
fn validate_avatar_url(raw: Option<&str>) -> Result<Option<String>, HappinessError> {
    let Some(url) = raw.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    let valid = rest.is_some_and(|rest| {
        rest.rsplit_once('.').is_some_and(|(stem, ext)| {
            !stem.is_empty() && AVATAR_EXTENSIONS.contains(&ext)
        })
    });
    if valid {
        Ok(Some(url.to_string()))
    } else {
        Err(HappinessError::Validation(format!(
            "avatar_url must be an http(s) image URL, got {url:?}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_length_checked() {
        let Ok(new) = NewBunny::parse("  Clover ", None, None) else {
            panic!("valid bunny rejected");
        };
        assert_eq!(new.name, "Clover");
        assert_eq!(new.happiness.get(), DEFAULT_STARTING_HAPPINESS);

        assert!(NewBunny::parse(" x ", None, None).is_err());
        assert!(NewBunny::parse(&"b".repeat(51), None, None).is_err());
        assert!(NewBunny::parse(&"b".repeat(50), None, None).is_ok());
    }

    #[test]
    fn avatar_must_be_image_url() {
        assert!(NewBunny::parse("Clover", Some("https://cdn.test/c.PNG"), None).is_ok());
        assert!(NewBunny::parse("Clover", Some("http://cdn.test/c.webp"), None).is_ok());
        assert!(NewBunny::parse("Clover", Some("ftp://cdn.test/c.png"), None).is_err());
        assert!(NewBunny::parse("Clover", Some("https://cdn.test/c.bmp"), None).is_err());
        assert!(NewBunny::parse("Clover", Some("https://.png"), None).is_err());
    }

    #[test]
    fn blank_avatar_means_none() {
        let Ok(new) = NewBunny::parse("Clover", Some("   "), None) else {
            panic!("blank avatar rejected");
        };
        assert_eq!(new.avatar_url, None);
    }

    #[test]
    fn profile_update_requires_a_field() {
        assert!(BunnyProfileUpdate::parse(None, None).is_err());
    }

    #[test]
    fn profile_update_clears_avatar_and_touches() {
        let Ok(new) = NewBunny::parse("Clover", Some("https://cdn.test/c.png"), None) else {
            panic!("valid bunny rejected");
        };
        let created = Utc::now();
        let mut bunny = Bunny::from_new(new, created);
        let Ok(update) = BunnyProfileUpdate::parse(Some("Thumper"), Some("")) else {
            panic!("valid update rejected");
        };
        let later = created + chrono::Duration::seconds(5);
        update.apply_to(&mut bunny, later);
        assert_eq!(bunny.name, "Thumper");
        assert_eq!(bunny.avatar_url, None);
        assert_eq!(bunny.updated_at, later);

        bunny.touch(created);
        assert_eq!(bunny.updated_at, later);
    }
}

//! Client fingerprint used to key daily quota counters.
//!
//! Built from coarse, spoofable traits. It deters casual quota abuse and
//! nothing more; it is not an identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::gate::FINGERPRINT_HEX_LEN;

/// Coarse client traits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTraits {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub timezone: String,
    /// e.g. "1920x1080"
    pub screen: String,
}

impl ClientTraits {
    /// Traits of the machine running this process
    pub fn local() -> Self {
        Self {
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            language: std::env::var("LANG").unwrap_or_default(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            timezone: chrono::Local::now().format("%:z").to_string(),
            screen: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_traits(traits: &ClientTraits) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            &traits.user_agent,
            &traits.language,
            &traits.platform,
            &traits.timezone,
            &traits.screen,
        ] {
            hasher.update(part.as_bytes());
            // separator keeps ("ab","c") and ("a","bc") apart
            hasher.update([0x1f]);
        }

        let hex = format!("{:x}", hasher.finalize());
        Self(hex[..FINGERPRINT_HEX_LEN].to_string())
    }

    /// Wrap an externally computed fingerprint
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

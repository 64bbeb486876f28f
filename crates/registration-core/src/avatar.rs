//! Gravatar-style avatar URLs derived from an email address.

use crate::error::AvatarError;
use sha2::{Digest, Sha256};
use url::Url;

/// Avatar URL parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarOptions {
    /// Avatar service root, e.g. `https://www.gravatar.com`
    pub base_url: String,
    /// Image size in pixels
    pub size: u32,
    /// Maximum content rating (`g`, `pg`, `r`, `x`)
    pub rating: String,
    /// Fallback image when the email has no avatar (`mm` = mystery person)
    pub default_image: String,
}

impl Default for AvatarOptions {
    fn default() -> Self {
        Self {
            base_url: "https://www.gravatar.com".into(),
            size: 200,
            rating: "pg".into(),
            default_image: "mm".into(),
        }
    }
}

/// Maps an email to a stable avatar URL.
#[derive(Debug, Clone, Default)]
pub struct AvatarResolver {
    options: AvatarOptions,
}

impl AvatarResolver {
    pub fn new(options: AvatarOptions) -> Self {
        Self { options }
    }

    /// Derive the avatar URL for `email`.
    ///
    /// The email is trimmed and lowercased before hashing, so addresses that
    /// differ only in case share an avatar. The result is always `https`
    /// with query parameters in sorted order.
    pub fn resolve(&self, email: &str) -> Result<String, AvatarError> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AvatarError::EmptyEmail);
        }

        let mut url = Url::parse(&self.options.base_url)
            .map_err(|e| AvatarError::InvalidBaseUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AvatarError::InvalidBaseUrl(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        }
        url.set_scheme("https")
            .map_err(|_| AvatarError::InvalidBaseUrl("cannot force https".into()))?;

        let digest = hex::encode(Sha256::digest(normalized.as_bytes()));
        url.path_segments_mut()
            .map_err(|_| AvatarError::InvalidBaseUrl("cannot be a base URL".into()))?
            .pop_if_empty()
            .push("avatar")
            .push(&digest);

        url.query_pairs_mut()
            .clear()
            .append_pair("d", &self.options.default_image)
            .append_pair("r", &self.options.rating)
            .append_pair("s", &self.options.size.to_string());

        Ok(url.to_string())
    }
}

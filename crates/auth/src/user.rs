//! Normalized user profile and the Google userinfo wire shape.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Normalized user profile
///
/// Provider-agnostic shape handed to callers; the Google-specific field
/// names are mapped away in [`GoogleUserInfo::into_profile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable subject identifier
    pub sub: String,

    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the provider verified the email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Full display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Given/first name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// Family/last name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// BCP 47 locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl UserProfile {
    /// The domain part of the email, when the email contains one
    ///
    /// Returns `None` for an absent or `@`-less email; the distinction
    /// between "no email" and "malformed email" is made by the caller.
    #[must_use]
    pub fn email_domain(&self) -> Option<&str> {
        self.email.as_deref().and_then(|email| email.rsplit_once('@')).map(|(_, domain)| domain)
    }
}

/// Profile response from Google's userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    /// Google account identifier
    pub id: String,
    /// Email address
    pub email: Option<String>,
    /// Email verification status
    pub verified_email: Option<bool>,
    /// Full display name
    pub name: Option<String>,
    /// Given name
    pub given_name: Option<String>,
    /// Family name
    pub family_name: Option<String>,
    /// Profile picture URL
    pub picture: Option<String>,
    /// Locale
    pub locale: Option<String>,
}

impl GoogleUserInfo {
    /// Map the provider-specific fields onto the normalized shape
    /// (`id` becomes `sub`, `verified_email` becomes `email_verified`)
    #[must_use]
    pub fn into_profile(self) -> UserProfile {
        trace!(sub = %self.id, "Normalizing Google userinfo response");

        UserProfile {
            sub: self.id,
            email: self.email,
            email_verified: self.verified_email,
            name: self.name,
            given_name: self.given_name,
            family_name: self.family_name,
            picture: self.picture,
            locale: self.locale,
        }
    }
}

impl From<GoogleUserInfo> for UserProfile {
    fn from(info: GoogleUserInfo) -> Self {
        info.into_profile()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for profile normalization.
    use super::*;

    /// Validates `GoogleUserInfo::into_profile` behavior for the field
    /// mapping scenario.
    ///
    /// Assertions:
    /// - Confirms `id` maps to `sub` and `verified_email` to
    ///   `email_verified`.
    /// - Confirms same-named fields carry over unchanged.
    #[test]
    fn test_google_field_mapping() {
        let info = GoogleUserInfo {
            id: "108177".to_string(),
            email: Some("user@example.com".to_string()),
            verified_email: Some(true),
            name: Some("Test User".to_string()),
            given_name: Some("Test".to_string()),
            family_name: Some("User".to_string()),
            picture: Some("https://example.com/photo.jpg".to_string()),
            locale: Some("en".to_string()),
        };

        let profile: UserProfile = info.into();

        assert_eq!(profile.sub, "108177");
        assert_eq!(profile.email.as_deref(), Some("user@example.com"));
        assert_eq!(profile.email_verified, Some(true));
        assert_eq!(profile.given_name.as_deref(), Some("Test"));
        assert_eq!(profile.family_name.as_deref(), Some("User"));
        assert_eq!(profile.picture.as_deref(), Some("https://example.com/photo.jpg"));
        assert_eq!(profile.locale.as_deref(), Some("en"));
    }

    /// Validates `GoogleUserInfo` deserialization for the minimal response
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a response carrying only `id` parses with every optional
    ///   field absent.
    #[test]
    fn test_minimal_userinfo_response() {
        let info: GoogleUserInfo = serde_json::from_str(r#"{"id":"108177"}"#).unwrap();
        let profile = info.into_profile();

        assert_eq!(profile.sub, "108177");
        assert!(profile.email.is_none());
        assert!(profile.email_verified.is_none());
        assert!(profile.name.is_none());
    }

    /// Validates `UserProfile::email_domain` behavior for the email shape
    /// scenarios.
    ///
    /// Assertions:
    /// - Confirms the domain after the last `@` is extracted.
    /// - Ensures `None` for absent or `@`-less emails.
    #[test]
    fn test_email_domain() {
        let mut profile: UserProfile =
            GoogleUserInfo {
                id: "1".to_string(),
                email: Some("user@example.com".to_string()),
                verified_email: None,
                name: None,
                given_name: None,
                family_name: None,
                picture: None,
                locale: None,
            }
            .into();

        assert_eq!(profile.email_domain(), Some("example.com"));

        profile.email = Some("no-at-sign".to_string());
        assert_eq!(profile.email_domain(), None);

        profile.email = None;
        assert_eq!(profile.email_domain(), None);
    }
}

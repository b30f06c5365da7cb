use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Header carrying the serialized identity assertion on every row store call.
pub const IDENTITY_HEADER: &str = "x-netlify-identity";

/// Locally cached profile of the signed-in user, as stored after login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<ProfileMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileMetadata {
    #[serde(rename = "hubId", default)]
    pub hub_id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Profile {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            user_metadata: None,
        }
    }

    pub fn with_metadata(mut self, hub_id: Option<String>, full_name: Option<String>) -> Self {
        self.user_metadata = Some(ProfileMetadata { hub_id, full_name });
        self
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// Unsigned claim about who is calling. It proves nothing on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub email: String,
    pub user_metadata: AssertionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionMetadata {
    #[serde(rename = "hubId")]
    pub hub_id: Option<String>,
    pub full_name: String,
}

impl IdentityAssertion {
    /// Derive an assertion from cached profile data. No email, no assertion.
    pub fn from_profile(profile: &Profile) -> Option<Self> {
        let email = profile.email()?.to_string();
        let meta = profile.user_metadata.clone().unwrap_or_default();
        let full_name = meta
            .full_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        Some(Self {
            email,
            user_metadata: AssertionMetadata {
                hub_id: meta.hub_id,
                full_name,
            },
        })
    }

    pub fn to_profile(&self) -> Profile {
        Profile::new(self.email.clone()).with_metadata(
            self.user_metadata.hub_id.clone(),
            Some(self.user_metadata.full_name.clone()),
        )
    }

    pub fn header_value(&self) -> Result<HeaderValue, IdentityError> {
        let json = serde_json::to_string(self)?;
        // serde_json escapes control characters, so only UTF-8 bytes >= 0x80 remain
        HeaderValue::from_bytes(json.as_bytes()).map_err(|_| IdentityError::InvalidHeader)
    }

    pub fn from_header(value: &HeaderValue) -> Result<Self, IdentityError> {
        let assertion: Self = serde_json::from_slice(value.as_bytes())?;
        if assertion.email.trim().is_empty() {
            return Err(IdentityError::EmptyEmail);
        }
        Ok(assertion)
    }
}

/// Where the evaluator reads the cached profile from on each call.
pub trait ProfileSource: Send + Sync {
    fn profile(&self) -> Option<Profile>;

    fn assertion(&self) -> Option<IdentityAssertion> {
        self.profile().as_ref().and_then(IdentityAssertion::from_profile)
    }
}

/// Fixed profile, e.g. the one carried by an incoming request.
#[derive(Debug, Clone, Default)]
pub struct StaticProfile(pub Option<Profile>);

impl ProfileSource for StaticProfile {
    fn profile(&self) -> Option<Profile> {
        self.0.clone()
    }
}

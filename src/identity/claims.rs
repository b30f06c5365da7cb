use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IdentityJwtConfig;

/// Claims of the identity provider's access token that we rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,   // provider user id
    pub email: String, // must match the asserted email
    pub exp: usize,    // expires at (unix timestamp)
}

/// Verification half of the provider's HS256 signing secret.
#[derive(Clone)]
pub struct IdentityKeys {
    decoding: DecodingKey,
    audience: Option<String>,
}

impl IdentityKeys {
    pub fn new(cfg: &IdentityJwtConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            audience: cfg.audience.clone(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<IdentityClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        match &self.audience {
            Some(aud) => validation.set_audience(std::slice::from_ref(aud)),
            None => validation.validate_aud = false,
        }
        let data = decode::<IdentityClaims>(token, &self.decoding, &validation)?;
        debug!(sub = %data.claims.sub, "identity token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) mod claims_tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    pub(crate) fn sign(secret: &str, email: &str, aud: Option<&str>) -> String {
        let exp = (OffsetDateTime::now_utc().unix_timestamp() + 600) as usize;
        let mut claims = serde_json::json!({ "sub": "u-1", "email": email, "exp": exp });
        if let Some(aud) = aud {
            claims["aud"] = aud.into();
        }
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign token")
    }

    fn keys(aud: Option<&str>) -> IdentityKeys {
        IdentityKeys::new(&IdentityJwtConfig {
            secret: "s3cret".into(),
            audience: aud.map(str::to_string),
        })
    }

    #[test]
    fn verifies_token_signed_with_same_secret() {
        let token = sign("s3cret", "a@b.com", None);
        let claims = keys(None).verify(&token).expect("verify");
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.sub, "u-1");
    }

    #[test]
    fn rejects_foreign_secret() {
        let token = sign("other", "a@b.com", None);
        assert!(keys(None).verify(&token).is_err());
    }

    #[test]
    fn enforces_audience_when_configured() {
        let token = sign("s3cret", "a@b.com", Some("dashboard"));
        assert!(keys(Some("dashboard")).verify(&token).is_ok());
        assert!(keys(Some("other-app")).verify(&token).is_err());
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Where user rows live. `url: None` means the gateway hosts them in memory.
#[derive(Debug, Clone, Deserialize)]
pub struct RowStoreConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    /// Principals that skip the module check entirely.
    pub emergency_emails: Vec<String>,
}

impl GuardConfig {
    /// Upper bound on each readiness wait.
    pub fn wait_limit(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.saturating_mul(self.max_attempts as u64))
    }

    pub fn is_emergency(&self, email: &str) -> bool {
        let email = email.trim();
        self.emergency_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email))
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            poll_interval_ms: 100,
            emergency_emails: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerConfig {
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityJwtConfig {
    pub secret: String,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub rowstore: RowStoreConfig,
    pub guard: GuardConfig,
    pub owner: Option<OwnerConfig>,
    pub identity_jwt: Option<IdentityJwtConfig>,
    pub pages_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let rowstore = RowStoreConfig {
            url: non_empty_var("ROWSTORE_URL"),
            timeout_secs: parsed_var("ROWSTORE_TIMEOUT_SECS", 10),
        };
        let guard = GuardConfig {
            max_attempts: parsed_var("GUARD_MAX_ATTEMPTS", 50),
            poll_interval_ms: parsed_var("GUARD_POLL_INTERVAL_MS", 100),
            emergency_emails: split_list(
                &std::env::var("ACL_EMERGENCY_EMAILS").unwrap_or_default(),
            ),
        };
        let owner = non_empty_var("ACL_OWNER_EMAIL").map(|email| OwnerConfig {
            email,
            full_name: non_empty_var("ACL_OWNER_NAME"),
        });
        let identity_jwt = non_empty_var("IDENTITY_JWT_SECRET").map(|secret| IdentityJwtConfig {
            secret,
            audience: non_empty_var("IDENTITY_JWT_AUDIENCE"),
        });
        let pages_dir = non_empty_var("PAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));

        if guard.max_attempts == 0 {
            anyhow::bail!("GUARD_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            rowstore,
            guard,
            owner,
            identity_jwt,
            pages_dir,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{error, instrument};

use crate::acl::repo_types::UserRecord;
use crate::acl::services::AclEvaluator;

/// Capabilities of the signed-in user, computed once per page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub email: String,
    pub allowed: bool,
    pub admin: bool,
    pub modules: BTreeSet<String>,
}

impl Permissions {
    /// Nothing granted.
    pub fn none(email: &str) -> Self {
        Self {
            email: email.to_string(),
            ..Self::default()
        }
    }

    /// A missing or blocked row grants nothing.
    pub fn from_record(email: &str, user: Option<&UserRecord>) -> Self {
        match user {
            Some(u) if !u.is_blocked() => Self {
                email: email.to_string(),
                allowed: true,
                admin: u.admin,
                modules: u.granted_modules().map(str::to_string).collect(),
            },
            _ => Self::none(email),
        }
    }

    pub fn permits(&self, module: &str) -> bool {
        self.admin || self.modules.contains(module)
    }

    /// One row fetch through the evaluator. Failures deny.
    #[instrument(skip(acl))]
    pub async fn resolve(acl: &AclEvaluator, email: &str) -> Self {
        match acl.fetch_user(email).await {
            Ok(user) => Self::from_record(email, user.as_ref()),
            Err(e) => {
                error!(error = %e, "could not resolve permissions");
                Self::none(email)
            }
        }
    }
}

#[cfg(test)]
mod permissions_tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::acl::services::evaluator_tests::store_with;
    use crate::identity::StaticProfile;

    #[test]
    fn permits_admin_or_listed_module() {
        let p = Permissions {
            email: "a@b.com".into(),
            allowed: true,
            admin: false,
            modules: ["quality".to_string()].into_iter().collect(),
        };
        assert!(p.permits("quality"));
        assert!(!p.permits("design"));
        let admin = Permissions { admin: true, ..p };
        assert!(admin.permits("design"));
    }

    #[tokio::test]
    async fn resolve_builds_from_row() {
        let store = store_with(vec![
            json!({
                "id": "", "email": "a@b.com",
                "modules": { "quality": true, "design": false }
            }),
            json!({ "id": "", "email": "blocked@b.com", "admin": true, "status": "blocked" }),
        ])
        .await;
        let acl = AclEvaluator::new(store, Arc::new(StaticProfile(None)));

        let p = Permissions::resolve(&acl, "a@b.com").await;
        assert!(p.allowed);
        assert_eq!(p.modules.iter().collect::<Vec<_>>(), vec!["quality"]);

        let blocked = Permissions::resolve(&acl, "blocked@b.com").await;
        assert_eq!(blocked, Permissions::none("blocked@b.com"));

        let ghost = Permissions::resolve(&acl, "ghost@b.com").await;
        assert!(!ghost.allowed && !ghost.permits("quality"));
    }
}

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::acl::repo_types::UserRecord;
use crate::error::EvaluationError;
use crate::identity::ProfileSource;
use crate::rowstore::RowStore;

/// What a caller asks the evaluator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Allowed,
    Admin,
    Module(String),
}

impl Capability {
    /// `isAllowed` and `isAdmin` are reserved; anything else names a module.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "isAllowed" => Capability::Allowed,
            "isAdmin" => Capability::Admin,
            m => Capability::Module(m.to_string()),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Allowed => f.write_str("isAllowed"),
            Capability::Admin => f.write_str("isAdmin"),
            Capability::Module(m) => f.write_str(m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSuchUser,
    Blocked,
    NotAdmin,
    ModuleNotGranted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DenyReason::NoSuchUser => "no user record",
            DenyReason::Blocked => "user is blocked",
            DenyReason::NotAdmin => "user is not an administrator",
            DenyReason::ModuleNotGranted => "module not granted",
        })
    }
}

/// Outcome of one evaluation. `Denied` and `Failed` both deny; they are kept
/// apart so callers can tell a refusal from a broken lookup.
#[derive(Debug)]
pub enum Decision {
    Granted,
    Denied(DenyReason),
    Failed(EvaluationError),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Granted => "granted",
            Decision::Denied(_) => "denied",
            Decision::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Decision::Granted => None,
            Decision::Denied(r) => Some(r.to_string()),
            Decision::Failed(e) => Some(e.to_string()),
        }
    }
}

fn allowed_rule(user: &UserRecord) -> Decision {
    if user.is_blocked() {
        Decision::Denied(DenyReason::Blocked)
    } else {
        Decision::Granted
    }
}

fn admin_rule(user: &UserRecord) -> Decision {
    if user.admin {
        Decision::Granted
    } else {
        Decision::Denied(DenyReason::NotAdmin)
    }
}

/// Admin wins before status is looked at: a blocked admin still passes here
/// while `allowed_rule` refuses the same row.
fn module_rule(user: &UserRecord, module: &str) -> Decision {
    if user.admin || user.has_module(module) {
        Decision::Granted
    } else {
        Decision::Denied(DenyReason::ModuleNotGranted)
    }
}

/// Decides access from the user's row in the row store. Stateless: every
/// call derives a fresh identity assertion and refetches the row.
#[derive(Clone)]
pub struct AclEvaluator {
    store: Arc<dyn RowStore>,
    profile: Arc<dyn ProfileSource>,
}

impl AclEvaluator {
    pub fn new(store: Arc<dyn RowStore>, profile: Arc<dyn ProfileSource>) -> Self {
        Self { store, profile }
    }

    pub(crate) async fn fetch_user(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, EvaluationError> {
        let identity = self.profile.assertion();
        UserRecord::find_by_email(self.store.as_ref(), email, identity.as_ref()).await
    }

    #[instrument(skip(self))]
    pub async fn check(&self, email: &str, capability: &Capability) -> Decision {
        let user = match self.fetch_user(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("no user row");
                return Decision::Denied(DenyReason::NoSuchUser);
            }
            Err(e) => {
                error!(error = %e, "acl evaluation failed; denying");
                return Decision::Failed(e);
            }
        };
        let decision = match capability {
            Capability::Allowed => allowed_rule(&user),
            Capability::Admin => admin_rule(&user),
            Capability::Module(m) => module_rule(&user, m),
        };
        debug!(decision = decision.label(), "acl evaluated");
        decision
    }

    pub async fn check_allowed(&self, email: &str) -> Decision {
        self.check(email, &Capability::Allowed).await
    }

    pub async fn check_admin(&self, email: &str) -> Decision {
        self.check(email, &Capability::Admin).await
    }

    pub async fn check_access(&self, email: &str, module: &str) -> Decision {
        self.check(email, &Capability::Module(module.to_string())).await
    }

    /// Row exists and is not blocked. Fails closed.
    pub async fn is_allowed(&self, email: &str) -> bool {
        self.check_allowed(email).await.is_granted()
    }

    /// Row exists and is flagged admin. Fails closed.
    pub async fn is_admin(&self, email: &str) -> bool {
        self.check_admin(email).await.is_granted()
    }

    /// Admin, or the module is granted. Fails closed.
    pub async fn can_access(&self, email: &str, module: &str) -> bool {
        self.check_access(email, module).await.is_granted()
    }
}

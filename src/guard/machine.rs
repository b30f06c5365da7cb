use tracing::{debug, info, warn};

use super::modules::module_for_page;
use super::page::PageRenderer;
use super::ready::ReadySlot;
use crate::acl::{AclEvaluator, Permissions};
use crate::config::GuardConfig;
use crate::identity::Profile;

pub const ACL_UNAVAILABLE: &str =
    "Access control is currently unavailable. Please reload the page or contact an administrator.";
pub const PERMISSIONS_TIMEOUT: &str =
    "Timed out while loading your permissions. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    WaitingForAcl,
    WaitingForPermissions,
    Checking,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Granted,
    Denied(String),
}

/// What the guard reads: collaborators resolve the two slots when ready.
#[derive(Clone, Default)]
pub struct GuardContext {
    pub acl: ReadySlot<AclEvaluator>,
    pub permissions: ReadySlot<Permissions>,
    pub profile: Option<Profile>,
}

impl GuardContext {
    pub fn new(profile: Option<Profile>) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct GuardReport {
    pub module: String,
    pub outcome: GuardOutcome,
    pub trail: Vec<GuardState>,
}

/// Gate for one page load. Runs once; both verdicts are terminal.
pub struct ModuleGuard {
    module: String,
    ctx: GuardContext,
    config: GuardConfig,
    trail: Vec<GuardState>,
}

impl ModuleGuard {
    pub fn for_page(page: &str, ctx: GuardContext, config: GuardConfig) -> Self {
        Self::for_module(module_for_page(page), ctx, config)
    }

    pub fn for_module(module: impl Into<String>, ctx: GuardContext, config: GuardConfig) -> Self {
        Self {
            module: module.into(),
            ctx,
            config,
            trail: Vec::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    fn enter(&mut self, state: GuardState) {
        debug!(module = %self.module, ?state, "guard state");
        self.trail.push(state);
    }

    pub async fn run<R: PageRenderer + ?Sized>(mut self, renderer: &mut R) -> GuardReport {
        let limit = self.config.wait_limit();

        self.enter(GuardState::WaitingForAcl);
        if self.ctx.acl.wait(limit).await.is_none() {
            warn!(module = %self.module, ?limit, "acl never became available");
            return self.deny(renderer, ACL_UNAVAILABLE.to_string());
        }

        let email = self
            .ctx
            .profile
            .as_ref()
            .and_then(Profile::email)
            .map(str::to_string);
        if let Some(email) = email.filter(|e| self.config.is_emergency(e)) {
            warn!(%email, module = %self.module, "emergency access bypass");
            return self.grant(renderer);
        }

        self.enter(GuardState::WaitingForPermissions);
        let Some(perms) = self.ctx.permissions.wait(limit).await else {
            warn!(module = %self.module, ?limit, "permissions never arrived");
            return self.deny(renderer, PERMISSIONS_TIMEOUT.to_string());
        };

        self.enter(GuardState::Checking);
        if perms.permits(&self.module) {
            self.grant(renderer)
        } else {
            let reason = format!("You do not have access to the {} module.", self.module);
            self.deny(renderer, reason)
        }
    }

    fn grant<R: PageRenderer + ?Sized>(mut self, renderer: &mut R) -> GuardReport {
        self.enter(GuardState::Granted);
        info!(module = %self.module, "access granted");
        renderer.reveal();
        GuardReport {
            module: self.module,
            outcome: GuardOutcome::Granted,
            trail: self.trail,
        }
    }

    fn deny<R: PageRenderer + ?Sized>(mut self, renderer: &mut R, reason: String) -> GuardReport {
        self.enter(GuardState::Denied);
        info!(module = %self.module, %reason, "access denied");
        renderer.deny(&reason);
        GuardReport {
            module: self.module,
            outcome: GuardOutcome::Denied(reason),
            trail: self.trail,
        }
    }
}

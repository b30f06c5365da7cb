//! Page-level gate in front of the dashboard's module pages.
//!
//! A page load waits for the evaluator and the caller's permissions to be
//! published, then either reveals the page or replaces it with the denial
//! screen. Emergency principals from configuration skip the module check.

pub mod handlers;
pub mod machine;
pub mod modules;
pub mod page;
pub mod ready;

pub use machine::{GuardContext, GuardOutcome, GuardReport, GuardState, ModuleGuard};
pub use page::{HtmlPage, PageRenderer};
pub use ready::ReadySlot;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::page_routes()
}

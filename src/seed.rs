use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::acl::repo_types::UserRecord;
use crate::config::OwnerConfig;
use crate::error::EvaluationError;
use crate::guard::modules::known_modules;
use crate::identity::{IdentityAssertion, Profile};
use crate::rowstore::RowStore;

/// Provision the owner account on first run. Returns `true` when a row was
/// written; an existing row is never touched.
#[instrument(skip(store, owner), fields(email = %owner.email))]
pub async fn ensure_owner(
    store: &dyn RowStore,
    owner: &OwnerConfig,
) -> Result<bool, EvaluationError> {
    let profile = Profile::new(owner.email.clone()).with_metadata(None, owner.full_name.clone());
    let identity = IdentityAssertion::from_profile(&profile);

    if UserRecord::find_by_email(store, &owner.email, identity.as_ref())
        .await?
        .is_some()
    {
        info!("owner account already present");
        return Ok(false);
    }

    let mut rec = UserRecord::new(&owner.email);
    rec.admin = true;
    rec.full_name = owner.full_name.clone();
    rec.modules = known_modules().map(|m| (m.to_string(), true)).collect();
    rec.created_at = Some(OffsetDateTime::now_utc());
    rec.created_by = Some("seed".into());
    rec.save(store, identity.as_ref()).await?;

    info!("owner account provisioned");
    Ok(true)
}

pub mod assertion;
pub mod claims;
pub mod extractors;

pub use assertion::{IdentityAssertion, Profile, ProfileSource, StaticProfile, IDENTITY_HEADER};

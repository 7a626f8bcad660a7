//! Well-known identity values.

/// Identifier bound to every request when token enforcement is disabled.
pub const TEST_SUBJECT_ID: &str = "test";

/// Issuer of the enforcement-disabled test identity.
pub const TEST_SUBJECT_ISSUER: &str = "test";

pub const TEST_SUBJECT_NAME: &str = "test";

pub const TEST_SUBJECT_EMAIL: &str = "test@test.test";

/// Context value substituted for identities that refer to the caller.
pub const SELF_IDENTITY: &str = "self";

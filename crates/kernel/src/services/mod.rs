//! Domain services behind the report endpoints.
//!
//! Handlers stay thin: they parse input and delegate to these services,
//! which talk to the forum only through the store traits.

pub mod identity;
pub mod report;
pub mod topic_fields;

pub use identity::{IdentityError, IdentityResolver, ResolveOutcome, ResolvedUser, UserInfo};
pub use report::{MaterializedReport, ReportDraft, ReportMaterializer};
pub use topic_fields::{TopicCreateOpts, TopicExtraFields, TopicFieldsExtension};

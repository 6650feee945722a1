//! Database models.

pub mod category;
pub mod external_account;
pub mod post;
pub mod site_setting;
pub mod topic;
pub mod user;
pub mod validation;

pub use category::{Category, Lookup, Tag};
pub use external_account::{ExternalAccountLink, NewExternalAccount};
pub use post::{NewPost, Post};
pub use site_setting::SiteSetting;
pub use topic::{NewTopic, Topic};
pub use user::{NewUser, User};
pub use validation::{ContentPolicy, ValidationErrors};

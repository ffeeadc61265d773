//! SeaORM entities for the talent-recruitment records.
//!
//! Every entity except `user` carries a `deleted_at` lifecycle column, and all
//! normal read paths filter on `deleted_at IS NULL`.

pub mod connected_account;
pub mod email_template;
pub mod post;
pub mod talent;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::connected_account::Entity as ConnectedAccount;
    pub use super::email_template::Entity as EmailTemplate;
    pub use super::post::Entity as Post;
    pub use super::talent::Entity as Talent;
    pub use super::user::Entity as User;
}

use anyhow::{Context, Result, bail};
use model::entities::user::{self, Role};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, Database, EntityTrait, QueryFilter, Set};
use tracing::{info, trace};

use crate::hasher::hash_password;

/// Seed data for the first superadmin.
#[derive(Debug, Clone)]
pub struct CreateAdmin {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

pub async fn create_admin(database_url: &str, admin: CreateAdmin) -> Result<()> {
    trace!("Entering create_admin function");
    if admin.password.len() < 6 {
        bail!("Password must be at least 6 characters");
    }

    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{database_url}'"))?;

    let taken = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(admin.email.as_str()))
                .add(user::Column::Username.eq(admin.username.as_str())),
        )
        .one(&db)
        .await?;
    if let Some(existing) = taken {
        bail!("User {} already uses this email or username", existing.username);
    }

    let created = user::ActiveModel {
        name: Set(admin.name),
        email: Set(admin.email),
        username: Set(admin.username),
        password_hash: Set(hash_password(admin.password).await?),
        role: Set(Role::Superadmin),
        is_active: Set(true),
        verification_token: Set(None),
        ..Default::default()
    }
    .insert(&db)
    .await
    .context("Failed to create superadmin")?;

    info!("Created superadmin {} ({})", created.username, created.id);
    Ok(())
}

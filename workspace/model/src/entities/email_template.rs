use common::template::extract_placeholders;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::{self, NotSet, Set};

/// A reusable message body with `[placeholder]` markers.
///
/// At most one non-deleted template per owner has `is_default` set. Saving a
/// template with `is_default = true` clears the flag on the owner's others.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub template: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_template: Option<String>,
    /// Placeholder names found in the bodies, first-seen order.
    #[sea_orm(column_type = "Json")]
    pub variables: Json,
    pub is_default: bool,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn variable_names(&self) -> Vec<String> {
        serde_json::from_value(self.variables.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

fn current<V: Into<Value>>(value: &ActiveValue<V>) -> Option<&V> {
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v),
        ActiveValue::NotSet => None,
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            if matches!(self.is_default, NotSet) {
                self.is_default = Set(false);
            }
            if matches!(self.is_active, NotSet) {
                self.is_active = Set(true);
            }
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);

        if insert || self.template.is_set() || self.html_template.is_set() {
            let mut sources = String::new();
            if let Some(text) = current(&self.template) {
                sources.push_str(text);
            }
            if let Some(Some(html)) = current(&self.html_template) {
                sources.push('\n');
                sources.push_str(html);
            }
            self.variables = Set(serde_json::json!(extract_placeholders(&sources)));
        }

        if matches!(self.is_default, ActiveValue::Set(true)) {
            let owner = current(&self.created_by)
                .copied()
                .ok_or_else(|| DbErr::Custom("email template has no owner".to_string()))?;

            let mut clear = Entity::update_many()
                .col_expr(Column::IsDefault, Expr::value(false))
                .filter(Column::CreatedBy.eq(owner))
                .filter(Column::IsDefault.eq(true));
            if !insert {
                if let Some(id) = current(&self.id).copied() {
                    clear = clear.filter(Column::Id.ne(id));
                }
            }
            let cleared = clear.exec(db).await?;
            tracing::debug!(
                "Cleared default flag on {} other template(s) of {}",
                cleared.rows_affected,
                owner
            );
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, IntoActiveModel};

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        Migrator::up(&db, None).await?;
        Ok(db)
    }

    async fn owner(db: &DatabaseConnection, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            name: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            username: Set(username.to_string()),
            password_hash: Set("x".to_string()),
            role: Set(user::Role::User),
            is_active: Set(true),
            verification_token: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    async fn template(
        db: &DatabaseConnection,
        owner: Uuid,
        title: &str,
        is_default: bool,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            title: Set(title.to_string()),
            subject: Set("About [role]".to_string()),
            template: Set("Hello [name], call [phone]. Thanks [name]".to_string()),
            html_template: Set(None),
            is_default: Set(is_default),
            created_by: Set(owner),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    #[tokio::test]
    async fn test_variables_extracted_on_save() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let alice = owner(&db, "alice").await?;

        let saved = template(&db, alice.id, "Intro", false).await?;
        assert_eq!(saved.variable_names(), vec!["name", "phone"]);

        let mut active = saved.into_active_model();
        active.template = Set("Dear [agency]".to_string());
        active.html_template = Set(Some("<p>[agency] and [fee]</p>".to_string()));
        let updated = active.update(&db).await?;
        assert_eq!(updated.variable_names(), vec!["agency", "fee"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_single_default_per_owner() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let alice = owner(&db, "alice").await?;
        let bob = owner(&db, "bobby").await?;

        let a = template(&db, alice.id, "A", true).await?;
        let bobs = template(&db, bob.id, "Bob's", true).await?;
        let b = template(&db, alice.id, "B", false).await?;

        let mut active = b.into_active_model();
        active.is_default = Set(true);
        active.update(&db).await?;

        let a = Entity::find_by_id(a.id).one(&db).await?.expect("template A");
        assert!(!a.is_default);

        let defaults = Entity::find()
            .filter(Column::CreatedBy.eq(alice.id))
            .filter(Column::IsDefault.eq(true))
            .all(&db)
            .await?;
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].title, "B");

        let bobs = Entity::find_by_id(bobs.id).one(&db).await?.expect("bob's template");
        assert!(bobs.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_default_rejected_by_index() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let alice = owner(&db, "alice").await?;
        template(&db, alice.id, "A", true).await?;
        let b = template(&db, alice.id, "B", false).await?;
        let b_id = b.id;

        // A write that skips the hook cannot produce a second default
        let result = Entity::update_many()
            .col_expr(Column::IsDefault, Expr::value(true))
            .filter(Column::Id.eq(b_id))
            .exec(&db)
            .await;
        assert!(matches!(
            result.map_err(|e| e.sql_err()),
            Err(Some(sea_orm::SqlErr::UniqueConstraintViolation(_)))
        ));

        // Soft-deleted defaults do not count
        let mut active = b.into_active_model();
        active.deleted_at = Set(Some(chrono::Utc::now()));
        active.update(&db).await?;
        Entity::update_many()
            .col_expr(Column::IsDefault, Expr::value(true))
            .filter(Column::Id.eq(b_id))
            .exec(&db)
            .await?;
        Ok(())
    }
}

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};

/// A job posting imported from a spreadsheet.
///
/// Every spreadsheet column is kept verbatim in `data`. Only the flags and
/// `post_date` live in their own columns.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Natural key, unique among non-deleted rows.
    pub post_id: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    pub post_date: Option<String>,
    pub is_favorite: bool,
    pub is_email_sent: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub memo: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
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

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            if matches!(self.id, NotSet) {
                self.id = Set(Uuid::new_v4());
            }
            if matches!(self.is_favorite, NotSet) {
                self.is_favorite = Set(false);
            }
            if matches!(self.is_email_sent, NotSet) {
                self.is_email_sent = Set(false);
            }
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};

/// A talent profile, imported from a spreadsheet or edited by hand.
///
/// `comcard_no` is the natural key and is unique among non-deleted rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "models")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub comcard_no: String,
    pub name_eng: String,
    pub name_kor: Option<String>,
    pub national: Option<String>,
    pub stage: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub additional_pic: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub comcard_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub comcard_pic: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub download: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

//! Owner-scoped search over imported posts.
//!
//! Every listing endpoint funnels into [`search_posts`]; they only differ in
//! which criteria they fill in and their default page size.

use chrono::{Days, NaiveDate};
use common::{PageRequest, Pagination};
use model::entities::post;
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use tracing::debug;
use uuid::Uuid;

/// Payload keys matched by the free-text query, besides the whole payload.
pub const SEARCHABLE_FIELDS: [&str; 9] = [
    "body",
    "postTitle",
    "description",
    "postDate",
    "titleOfTheWork",
    "roleInThePlay",
    "manager",
    "phoneCall",
    "appearanceFee",
];

pub const GENDER_FIELD: &str = "recruitmentGender";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Id,
}

impl PostSortField {
    /// Unknown or missing names fall back to `createdAt`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("createdAt") => PostSortField::CreatedAt,
            Some("updatedAt") => PostSortField::UpdatedAt,
            Some("id") => PostSortField::Id,
            _ => PostSortField::CreatedAt,
        }
    }

    fn column(self) -> post::Column {
        match self {
            PostSortField::CreatedAt => post::Column::CreatedAt,
            PostSortField::UpdatedAt => post::Column::UpdatedAt,
            PostSortField::Id => post::Column::Id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("ASC") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    fn order(self) -> Order {
        match self {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostCriteria {
    pub query: Option<String>,
    pub recruitment_gender: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_favorite: Option<bool>,
    pub is_email_sent: Option<bool>,
    pub sort_by: PostSortField,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<post::Model>,
    pub pagination: Pagination,
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The whole payload as text.
fn payload_text(backend: DbBackend) -> SimpleExpr {
    match backend {
        DbBackend::Postgres => Expr::cust(r#"CAST("posts"."data" AS TEXT)"#),
        _ => Expr::cust(r#""posts"."data""#),
    }
}

/// One payload key as text. The key is bound as a value, never spliced.
fn payload_field(backend: DbBackend, key: &str) -> SimpleExpr {
    match backend {
        DbBackend::Postgres => Expr::cust_with_values(r#"("posts"."data" ->> $1)"#, [key]),
        _ => Expr::cust_with_values(r#"json_extract("posts"."data", ?)"#, [format!("$.{key}")]),
    }
}

fn contains_ci(expr: SimpleExpr, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    Expr::expr(Func::lower(expr)).like(LikeExpr::new(pattern).escape('\\'))
}

fn text_query(backend: DbBackend, query: &str) -> Condition {
    SEARCHABLE_FIELDS.iter().fold(
        Condition::any().add(contains_ci(payload_text(backend), query)),
        |any, key| any.add(contains_ci(payload_field(backend, key), query)),
    )
}

fn build_condition(backend: DbBackend, owner: Uuid, criteria: &PostCriteria) -> Condition {
    let mut condition = Condition::all()
        .add(post::Column::CreatedBy.eq(owner))
        .add(post::Column::DeletedAt.is_null());

    if let Some(query) = criteria.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        condition = condition.add(text_query(backend, query));
    }
    if let Some(gender) = criteria.recruitment_gender.as_deref().filter(|g| !g.is_empty()) {
        condition = condition.add(Expr::expr(payload_field(backend, GENDER_FIELD)).eq(gender));
    }
    if let Some(start) = criteria.start_date {
        condition = condition.add(post::Column::PostDate.gte(start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = criteria.end_date {
        // Inclusive end: everything before the following day.
        let bound = end
            .checked_add_days(Days::new(1))
            .map(|next| next.format("%Y-%m-%d").to_string());
        condition = match bound {
            Some(next) => condition.add(post::Column::PostDate.lt(next)),
            None => condition.add(post::Column::PostDate.is_not_null()),
        };
    }
    if let Some(favorite) = criteria.is_favorite {
        condition = condition.add(post::Column::IsFavorite.eq(favorite));
    }
    if let Some(sent) = criteria.is_email_sent {
        condition = condition.add(post::Column::IsEmailSent.eq(sent));
    }
    condition
}

pub async fn search_posts(
    db: &DatabaseConnection,
    owner: Uuid,
    criteria: &PostCriteria,
) -> Result<PostPage, DbErr> {
    let backend = db.get_database_backend();
    debug!("Searching posts of {} with {:?}", owner, criteria);

    let paginator = post::Entity::find()
        .filter(build_condition(backend, owner, criteria))
        .order_by(criteria.sort_by.column(), criteria.sort_order.order())
        .order_by(post::Column::Id, criteria.sort_order.order())
        .paginate(db, criteria.page.page_size);

    let total = paginator.num_items().await?;
    let posts = paginator.fetch_page(criteria.page.index()).await?;

    Ok(PostPage {
        posts,
        pagination: Pagination::new(criteria.page, total),
    })
}

//! Spreadsheet import with natural-key deduplication.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{SheetRecord, rows_to_records};
use model::entities::{post, talent};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect, Set};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::schemas::AppState;
use crate::services::credentials::{find_owned_account, run_with_account};

/// Rows per statement, well below every backend's bind-parameter limit.
const CHUNK_SIZE: usize = 200;

/// A record kind that can be bulk-imported from a sheet.
#[async_trait]
pub trait ImportTarget {
    type Record: Send;

    /// Normalized header holding the natural key.
    const NATURAL_KEY: &'static str;

    /// Which of `keys` already exist among non-deleted rows.
    async fn existing_keys(db: &DatabaseConnection, keys: &[String]) -> Result<HashSet<String>, DbErr>;

    /// Inserts `records`, silently skipping rows that lose a uniqueness race,
    /// and returns the rows actually stored in input order.
    async fn insert_new(
        db: &DatabaseConnection,
        owner: Uuid,
        records: Vec<(String, SheetRecord)>,
    ) -> Result<Vec<Self::Record>, DbErr>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome<R> {
    pub processed_count: usize,
    pub inserted_count: usize,
    pub inserted_records: Vec<R>,
}

fn natural_key<'r>(record: &'r SheetRecord, field: &str) -> Option<&'r str> {
    record.get(field).map(|key| key.trim()).filter(|key| !key.is_empty())
}

fn optional(record: &SheetRecord, field: &str) -> Option<String> {
    record
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// ISO `YYYY-MM-DD` when the cell holds a recognizable date, the raw text
/// otherwise.
pub fn normalize_date(raw: &str) -> String {
    const FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y. %m. %d", "%m/%d/%Y"];
    let trimmed = raw.trim().trim_end_matches('.');
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Turns sheet rows into new records of `T`.
///
/// Rows without a natural key are skipped. Within the batch the first
/// occurrence of a key wins. Keys already stored are skipped.
pub async fn import_rows<T: ImportTarget>(
    db: &DatabaseConnection,
    owner: Uuid,
    rows: &[Vec<String>],
) -> Result<ImportOutcome<T::Record>, DbErr> {
    let records = rows_to_records(rows);
    let processed_count = records.len();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for record in records {
        let Some(key) = natural_key(&record, T::NATURAL_KEY).map(str::to_string) else {
            continue;
        };
        if seen.insert(key.clone()) {
            candidates.push((key, record));
        }
    }

    let keys: Vec<String> = candidates.iter().map(|(key, _)| key.clone()).collect();
    let existing = T::existing_keys(db, &keys).await?;
    let fresh: Vec<(String, SheetRecord)> = candidates
        .into_iter()
        .filter(|(key, _)| !existing.contains(key))
        .collect();
    debug!(
        "{} rows processed, {} distinct keys, {} already stored",
        processed_count,
        keys.len(),
        existing.len()
    );

    let inserted_records = if fresh.is_empty() {
        Vec::new()
    } else {
        T::insert_new(db, owner, fresh).await?
    };

    Ok(ImportOutcome {
        processed_count,
        inserted_count: inserted_records.len(),
        inserted_records,
    })
}

/// Fetches `range` of a spreadsheet through `account_id` and imports it.
#[instrument(skip(state))]
pub async fn import_from_sheet<T: ImportTarget>(
    state: &AppState,
    owner: Uuid,
    account_id: Uuid,
    spreadsheet_id: &str,
    range: &str,
) -> ApiResult<ImportOutcome<T::Record>> {
    let account = find_owned_account(&state.db, owner, account_id).await?;
    let google = state.google.as_ref();
    let rows = run_with_account(state, &account, |token| async move {
        google.get_sheet_values(&token, spreadsheet_id, range).await
    })
    .await?;

    let outcome = import_rows::<T>(&state.db, owner, &rows).await?;
    info!(
        "Imported {} of {} rows from {}!{}",
        outcome.inserted_count, outcome.processed_count, spreadsheet_id, range
    );
    Ok(outcome)
}

/// Puts rows fetched by primary key back into the order of `ids`.
fn in_order<M>(ids: &[Uuid], rows: Vec<M>, id_of: impl Fn(&M) -> Uuid) -> Vec<M> {
    let position: HashMap<Uuid, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut rows = rows;
    rows.sort_by_key(|row| position.get(&id_of(row)).copied().unwrap_or(usize::MAX));
    rows
}

pub struct PostImport;

#[async_trait]
impl ImportTarget for PostImport {
    type Record = post::Model;

    const NATURAL_KEY: &'static str = "postId";

    async fn existing_keys(db: &DatabaseConnection, keys: &[String]) -> Result<HashSet<String>, DbErr> {
        let mut existing = HashSet::new();
        for chunk in keys.chunks(CHUNK_SIZE) {
            let found: Vec<String> = post::Entity::find()
                .select_only()
                .column(post::Column::PostId)
                .filter(post::Column::PostId.is_in(chunk.iter().cloned()))
                .filter(post::Column::DeletedAt.is_null())
                .into_tuple()
                .all(db)
                .await?;
            existing.extend(found);
        }
        Ok(existing)
    }

    async fn insert_new(
        db: &DatabaseConnection,
        owner: Uuid,
        records: Vec<(String, SheetRecord)>,
    ) -> Result<Vec<Self::Record>, DbErr> {
        let now = Utc::now();
        let mut ids = Vec::with_capacity(records.len());
        let models: Vec<post::ActiveModel> = records
            .into_iter()
            .map(|(key, record)| {
                let id = Uuid::new_v4();
                ids.push(id);
                post::ActiveModel {
                    id: Set(id),
                    post_id: Set(key),
                    post_date: Set(optional(&record, "postDate").map(|d| normalize_date(&d))),
                    data: Set(serde_json::json!(record)),
                    is_favorite: Set(false),
                    is_email_sent: Set(false),
                    memo: Set(None),
                    created_by: Set(owner),
                    created_at: Set(now),
                    updated_at: Set(now),
                    deleted_at: Set(None),
                }
            })
            .collect();

        let mut batches = models.into_iter().peekable();
        while batches.peek().is_some() {
            let batch: Vec<post::ActiveModel> = batches.by_ref().take(CHUNK_SIZE).collect();
            post::Entity::insert_many(batch)
                .on_conflict(OnConflict::new().do_nothing().to_owned())
                .exec_without_returning(db)
                .await?;
        }

        let mut stored = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(CHUNK_SIZE) {
            stored.extend(
                post::Entity::find()
                    .filter(post::Column::Id.is_in(chunk.iter().copied()))
                    .all(db)
                    .await?,
            );
        }
        Ok(in_order(&ids, stored, |p| p.id))
    }
}

pub struct TalentImport;

impl TalentImport {
    fn active_model(owner: Uuid, id: Uuid, key: String, record: &SheetRecord) -> talent::ActiveModel {
        let now = Utc::now();
        talent::ActiveModel {
            id: Set(id),
            comcard_no: Set(key),
            name_eng: Set(optional(record, "nameEng").unwrap_or_default()),
            name_kor: Set(optional(record, "nameKor")),
            national: Set(optional(record, "national")),
            stage: Set(optional(record, "stage")),
            additional_pic: Set(optional(record, "additionalPic")),
            comcard_url: Set(optional(record, "comcardUrl").or_else(|| optional(record, "comecardUrl"))),
            comcard_pic: Set(optional(record, "comcardPic")),
            download: Set(optional(record, "download")),
            html_url: Set(optional(record, "htmlUrl")),
            created_by: Set(Some(owner)),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
    }
}

#[async_trait]
impl ImportTarget for TalentImport {
    type Record = talent::Model;

    const NATURAL_KEY: &'static str = "comcardNo";

    async fn existing_keys(db: &DatabaseConnection, keys: &[String]) -> Result<HashSet<String>, DbErr> {
        let mut existing = HashSet::new();
        for chunk in keys.chunks(CHUNK_SIZE) {
            let found: Vec<String> = talent::Entity::find()
                .select_only()
                .column(talent::Column::ComcardNo)
                .filter(talent::Column::ComcardNo.is_in(chunk.iter().cloned()))
                .filter(talent::Column::DeletedAt.is_null())
                .into_tuple()
                .all(db)
                .await?;
            existing.extend(found);
        }
        Ok(existing)
    }

    async fn insert_new(
        db: &DatabaseConnection,
        owner: Uuid,
        records: Vec<(String, SheetRecord)>,
    ) -> Result<Vec<Self::Record>, DbErr> {
        let mut ids = Vec::with_capacity(records.len());
        let models: Vec<talent::ActiveModel> = records
            .into_iter()
            .map(|(key, record)| {
                let id = Uuid::new_v4();
                ids.push(id);
                Self::active_model(owner, id, key, &record)
            })
            .collect();

        let mut batches = models.into_iter().peekable();
        while batches.peek().is_some() {
            let batch: Vec<talent::ActiveModel> = batches.by_ref().take(CHUNK_SIZE).collect();
            talent::Entity::insert_many(batch)
                .on_conflict(OnConflict::new().do_nothing().to_owned())
                .exec_without_returning(db)
                .await?;
        }

        let mut stored = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(CHUNK_SIZE) {
            stored.extend(
                talent::Entity::find()
                    .filter(talent::Column::Id.is_in(chunk.iter().copied()))
                    .all(db)
                    .await?,
            );
        }
        Ok(in_order(&ids, stored, |t| t.id))
    }
}

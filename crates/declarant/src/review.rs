//! Item review surface: listing classified rows and recording the
//! reviewer's verdict.

use thiserror::Error;

use crate::db::item_repo::{self, ItemPatch, ItemRow};
use crate::db::{code_repo, Database, DatabaseError, ItemStatus};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Item {0} has no suggested code to approve")]
    NoSuggestion(String),

    #[error("Unknown tariff code: {0}")]
    UnknownCode(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A task's items in spreadsheet order, optionally filtered by status,
/// with the unpaged total.
pub fn list_items(
    db: &Database,
    task_id: &str,
    status: Option<ItemStatus>,
    limit: u64,
    offset: u64,
) -> Result<(Vec<ItemRow>, u64), ReviewError> {
    Ok(item_repo::query_by_task(db, task_id, status, limit, offset)?)
}

/// Applies a review patch. Choosing a final code implies confirmation,
/// whatever status the patch carries.
pub fn update_item(db: &Database, item_id: &str, mut patch: ItemPatch) -> Result<ItemRow, ReviewError> {
    let item = find(db, item_id)?;

    if let Some(code) = &patch.final_code {
        if code_repo::find_by_code(db, code)?.is_none() {
            return Err(ReviewError::UnknownCode(code.clone()));
        }
        patch.status = Some(ItemStatus::Confirmed);
    }

    item_repo::update_review(db, &item.id, &patch)?;
    find(db, item_id)
}

/// Accepts the suggestion: copies it into the final code and confirms.
pub fn approve(db: &Database, item_id: &str) -> Result<ItemRow, ReviewError> {
    let item = find(db, item_id)?;
    let suggested = item
        .suggested_code
        .clone()
        .ok_or_else(|| ReviewError::NoSuggestion(item.id.clone()))?;

    item_repo::update_review(
        db,
        &item.id,
        &ItemPatch {
            status: Some(ItemStatus::Confirmed),
            final_code: Some(suggested),
            user_comment: None,
        },
    )?;
    find(db, item_id)
}

/// Sends the item back for manual review with the reviewer's comment.
pub fn reject(db: &Database, item_id: &str, comment: &str) -> Result<ItemRow, ReviewError> {
    let item = find(db, item_id)?;

    item_repo::update_review(
        db,
        &item.id,
        &ItemPatch {
            status: Some(ItemStatus::NeedsReview),
            user_comment: Some(comment.to_string()),
            final_code: None,
        },
    )?;
    find(db, item_id)
}

fn find(db: &Database, item_id: &str) -> Result<ItemRow, ReviewError> {
    item_repo::find_by_id(db, item_id)?
        .ok_or_else(|| ReviewError::ItemNotFound(item_id.to_string()))
}

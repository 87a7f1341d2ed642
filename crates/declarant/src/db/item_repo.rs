//! Item repository — per-row classification results for a task.
//!
//! Alternatives are stored as a JSON array in a TEXT column and parsed
//! back into classifier types on read.

use rusqlite::{params, OptionalExtension, Row};

use crate::classify::{Alternative, Classification};

use super::status::ItemStatus;
use super::{now_rfc3339, Database, DatabaseError};

/// One spreadsheet row and its suggested tariff code.
#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: String,
    pub task_id: String,
    pub row_number: u32,
    pub original_description: String,
    pub quantity: String,
    pub unit: String,
    pub suggested_code: Option<String>,
    pub confidence: f64,
    /// JSON-encoded `Vec<Alternative>`.
    pub alternatives: String,
    pub rationale: String,
    pub status: ItemStatus,
    pub user_comment: String,
    pub final_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ItemRow {
    /// Builds a fresh pending item for an ingested row.
    pub fn new(task_id: &str, row_number: u32, description: &str, quantity: &str, unit: &str) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            row_number,
            original_description: description.to_string(),
            quantity: quantity.to_string(),
            unit: unit.to_string(),
            suggested_code: None,
            confidence: 0.0,
            alternatives: "[]".to_string(),
            rationale: String::new(),
            status: ItemStatus::Pending,
            user_comment: String::new(),
            final_code: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            task_id: row.get("task_id")?,
            row_number: row.get("row_number")?,
            original_description: row.get("original_description")?,
            quantity: row.get("quantity")?,
            unit: row.get("unit")?,
            suggested_code: row.get("suggested_code")?,
            confidence: row.get("confidence")?,
            alternatives: row.get("alternatives")?,
            rationale: row.get("rationale")?,
            status: row.get("status")?,
            user_comment: row.get("user_comment")?,
            final_code: row.get("final_code")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Decodes the stored alternatives JSON.
    pub fn parsed_alternatives(&self) -> Result<Vec<Alternative>, DatabaseError> {
        Ok(serde_json::from_str(&self.alternatives)?)
    }

    /// The code that counts for the declaration: the reviewer's final
    /// choice when present, the suggestion otherwise.
    pub fn display_code(&self) -> Option<&str> {
        self.final_code
            .as_deref()
            .or(self.suggested_code.as_deref())
    }
}

/// Review fields a user is allowed to change on an item.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub status: Option<ItemStatus>,
    pub user_comment: Option<String>,
    pub final_code: Option<String>,
}

/// Inserts a new item row.
pub fn insert(db: &Database, item: &ItemRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO items (id, task_id, row_number, original_description, quantity, unit,
             suggested_code, confidence, alternatives, rationale, status, user_comment,
             final_code, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                item.id,
                item.task_id,
                item.row_number,
                item.original_description,
                item.quantity,
                item.unit,
                item.suggested_code,
                item.confidence,
                item.alternatives,
                item.rationale,
                item.status,
                item.user_comment,
                item.final_code,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds an item by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ItemRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM items WHERE id = ?1",
                params![id],
                ItemRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Stores a classifier verdict on an item and marks it processed.
pub fn update_classification(
    db: &Database,
    id: &str,
    classification: &Classification,
) -> Result<(), DatabaseError> {
    let alternatives = serde_json::to_string(&classification.alternatives)?;
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE items SET suggested_code = ?2, confidence = ?3, alternatives = ?4,
             rationale = ?5, status = 'processed', updated_at = ?6
             WHERE id = ?1",
            params![
                id,
                classification.code,
                classification.confidence,
                alternatives,
                classification.rationale,
                now_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Lists a task's items in spreadsheet order, optionally filtered by
/// status, returning (rows, total_count_after_filter).
pub fn query_by_task(
    db: &Database,
    task_id: &str,
    status: Option<ItemStatus>,
    limit: u64,
    offset: u64,
) -> Result<(Vec<ItemRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let (total, rows) = match status {
            Some(status) => {
                let total: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM items WHERE task_id = ?1 AND status = ?2",
                    params![task_id, status],
                    |r| r.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT * FROM items WHERE task_id = ?1 AND status = ?2
                     ORDER BY row_number LIMIT ?3 OFFSET ?4",
                )?;
                let rows: Vec<ItemRow> = stmt
                    .query_map(
                        params![task_id, status, limit as i64, offset as i64],
                        ItemRow::from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                (total, rows)
            }
            None => {
                let total: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM items WHERE task_id = ?1",
                    params![task_id],
                    |r| r.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT * FROM items WHERE task_id = ?1
                     ORDER BY row_number LIMIT ?2 OFFSET ?3",
                )?;
                let rows: Vec<ItemRow> = stmt
                    .query_map(
                        params![task_id, limit as i64, offset as i64],
                        ItemRow::from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                (total, rows)
            }
        };
        Ok((rows, total))
    })
}

/// Applies a review patch, touching only the fields it carries.
pub fn update_review(db: &Database, id: &str, patch: &ItemPatch) -> Result<(), DatabaseError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = patch.status {
        clauses.push("status = ?");
        values.push(Box::new(status));
    }
    if let Some(comment) = &patch.user_comment {
        clauses.push("user_comment = ?");
        values.push(Box::new(comment.clone()));
    }
    if let Some(code) = &patch.final_code {
        clauses.push("final_code = ?");
        values.push(Box::new(code.clone()));
    }
    if clauses.is_empty() {
        return Ok(());
    }

    clauses.push("updated_at = ?");
    values.push(Box::new(now_rfc3339()));
    values.push(Box::new(id.to_string()));

    let sql = format!(
        "UPDATE items SET {} WHERE id = ?",
        clauses.join(", ")
    );

    db.with_conn(|conn| {
        conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        Ok(())
    })
}

/// Removes all items belonging to a task. Returns how many were deleted.
/// Used to wipe partial results before a retry attempt re-ingests.
pub fn delete_by_task(db: &Database, task_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM items WHERE task_id = ?1", params![task_id])?;
        Ok(deleted as u64)
    })
}

/// Counts a task's items.
pub fn count_by_task(db: &Database, task_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE task_id = ?1",
            params![task_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::task_repo::{self, TaskRow};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn seeded_task(db: &Database) -> TaskRow {
        let task = TaskRow::new("u1", "goods.csv", "/tmp/goods.csv");
        task_repo::insert(db, &task).unwrap();
        task
    }

    fn seeded_code(db: &Database, code: &str) {
        crate::db::code_repo::get_or_create(db, code, "desc", "cat", None).unwrap();
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let task = seeded_task(&db);
        let item = ItemRow::new(&task.id, 1, "Кофе в зернах", "10", "кг");
        insert(&db, &item).unwrap();

        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.original_description, "Кофе в зернах");
        assert_eq!(found.status, ItemStatus::Pending);
        assert!(found.suggested_code.is_none());
        assert!(found.parsed_alternatives().unwrap().is_empty());
    }

    #[test]
    fn test_update_classification() {
        let db = test_db();
        let task = seeded_task(&db);
        seeded_code(&db, "0901.11.00");
        seeded_code(&db, "8471.30.00");
        let item = ItemRow::new(&task.id, 1, "Кофе", "1", "шт");
        insert(&db, &item).unwrap();

        let classification = Classification {
            code: "0901.11.00".to_string(),
            confidence: 0.9,
            rationale: "Найдено ключевое слово".to_string(),
            alternatives: vec![Alternative {
                code: "8471.30.00".to_string(),
                confidence: 0.4,
            }],
        };
        update_classification(&db, &item.id, &classification).unwrap();

        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.status, ItemStatus::Processed);
        assert_eq!(found.suggested_code.as_deref(), Some("0901.11.00"));
        assert_eq!(found.confidence, 0.9);
        let alts = found.parsed_alternatives().unwrap();
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].code, "8471.30.00");
    }

    #[test]
    fn test_query_by_task_ordered_and_filtered() {
        let db = test_db();
        let task = seeded_task(&db);
        seeded_code(&db, "0901.11.00");
        for n in [3, 1, 2] {
            insert(&db, &ItemRow::new(&task.id, n, &format!("row {}", n), "", "")).unwrap();
        }

        let (rows, total) = query_by_task(&db, &task.id, None, 10, 0).unwrap();
        assert_eq!(total, 3);
        let order: Vec<u32> = rows.iter().map(|i| i.row_number).collect();
        assert_eq!(order, vec![1, 2, 3]);

        // Classify one, then filter on status.
        let classification = Classification {
            code: "0901.11.00".to_string(),
            confidence: 0.9,
            rationale: String::new(),
            alternatives: vec![],
        };
        update_classification(&db, &rows[0].id, &classification).unwrap();

        let (processed, total) =
            query_by_task(&db, &task.id, Some(ItemStatus::Processed), 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(processed[0].row_number, 1);

        let (page, total) = query_by_task(&db, &task.id, None, 2, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].row_number, 3);
    }

    #[test]
    fn test_update_review_partial_patch() {
        let db = test_db();
        let task = seeded_task(&db);
        seeded_code(&db, "6203.42.31");
        let item = ItemRow::new(&task.id, 1, "Брюки мужские", "5", "шт");
        insert(&db, &item).unwrap();

        update_review(
            &db,
            &item.id,
            &ItemPatch {
                user_comment: Some("проверить состав ткани".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.user_comment, "проверить состав ткани");
        assert_eq!(found.status, ItemStatus::Pending);
        assert!(found.final_code.is_none());

        update_review(
            &db,
            &item.id,
            &ItemPatch {
                status: Some(ItemStatus::Confirmed),
                final_code: Some("6203.42.31".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.status, ItemStatus::Confirmed);
        assert_eq!(found.final_code.as_deref(), Some("6203.42.31"));
        // Previous patch survives.
        assert_eq!(found.user_comment, "проверить состав ткани");
        assert_eq!(found.display_code(), Some("6203.42.31"));
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let db = test_db();
        let task = seeded_task(&db);
        let item = ItemRow::new(&task.id, 1, "x", "", "");
        insert(&db, &item).unwrap();

        update_review(&db, &item.id, &ItemPatch::default()).unwrap();
        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.updated_at, item.updated_at);
    }

    #[test]
    fn test_delete_by_task() {
        let db = test_db();
        let task = seeded_task(&db);
        let other = seeded_task(&db);
        insert(&db, &ItemRow::new(&task.id, 1, "a", "", "")).unwrap();
        insert(&db, &ItemRow::new(&task.id, 2, "b", "", "")).unwrap();
        insert(&db, &ItemRow::new(&other.id, 1, "c", "", "")).unwrap();

        assert_eq!(delete_by_task(&db, &task.id).unwrap(), 2);
        assert_eq!(count_by_task(&db, &task.id).unwrap(), 0);
        assert_eq!(count_by_task(&db, &other.id).unwrap(), 1);
    }

    #[test]
    fn test_display_code_prefers_final() {
        let db = test_db();
        let task = seeded_task(&db);
        let item = ItemRow::new(&task.id, 1, "x", "", "");
        insert(&db, &item).unwrap();

        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.display_code(), None);

        seeded_code(&db, "0901.11.00");
        let classification = Classification {
            code: "0901.11.00".to_string(),
            confidence: 0.9,
            rationale: String::new(),
            alternatives: vec![],
        };
        update_classification(&db, &item.id, &classification).unwrap();
        let found = find_by_id(&db, &item.id).unwrap().unwrap();
        assert_eq!(found.display_code(), Some("0901.11.00"));
    }
}

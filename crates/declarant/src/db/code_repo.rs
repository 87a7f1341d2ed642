//! Tariff-code catalog — CRUD operations for the `hs_codes` table.
//!
//! The catalog is shared between concurrently running tasks, so inserts
//! go through `get_or_create`, which is idempotent on the unique `code`
//! key (INSERT OR IGNORE followed by a SELECT in the same locked scope).

use rusqlite::{params, OptionalExtension, Row};

use super::{now_rfc3339, Database, DatabaseError};

/// A tariff code row from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRow {
    pub code: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl CodeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            code: row.get("code")?,
            description: row.get("description")?,
            category: row.get("category")?,
            subcategory: row.get("subcategory")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts the code if absent and returns the stored row either way.
pub fn get_or_create(
    db: &Database,
    code: &str,
    description: &str,
    category: &str,
    subcategory: Option<&str>,
) -> Result<CodeRow, DatabaseError> {
    db.with_conn(|conn| {
        let now = now_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO hs_codes (code, description, category, subcategory, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![code, description, category, subcategory, now],
        )?;

        let row = conn.query_row(
            "SELECT * FROM hs_codes WHERE code = ?1",
            params![code],
            CodeRow::from_row,
        )?;
        Ok(row)
    })
}

/// Finds a code by its identifier.
pub fn find_by_code(db: &Database, code: &str) -> Result<Option<CodeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM hs_codes WHERE code = ?1",
                params![code],
                CodeRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists active codes ordered by code.
pub fn list_active(db: &Database) -> Result<Vec<CodeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM hs_codes WHERE is_active = 1 ORDER BY code")?;
        let rows: Vec<CodeRow> = stmt
            .query_map([], CodeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Searches active codes by code, description, or category substring.
/// Results are capped at 20, matching the reference lookup surface.
pub fn search(db: &Database, query: &str) -> Result<Vec<CodeRow>, DatabaseError> {
    let pattern = format!("%{}%", query.trim());
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM hs_codes
             WHERE is_active = 1
               AND (code LIKE ?1 OR description LIKE ?1 OR category LIKE ?1)
             ORDER BY code
             LIMIT 20",
        )?;
        let rows: Vec<CodeRow> = stmt
            .query_map(params![pattern], CodeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns the distinct categories of active codes, ordered by name.
pub fn categories(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM hs_codes WHERE is_active = 1 ORDER BY category",
        )?;
        let rows: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_get_or_create_inserts_once() {
        let db = test_db();
        let first = get_or_create(&db, "0901.11.00", "Coffee, not roasted", "Foodstuffs", None)
            .unwrap();
        assert_eq!(first.code, "0901.11.00");
        assert!(first.is_active);

        // Second call with different defaults must not overwrite.
        let second =
            get_or_create(&db, "0901.11.00", "Something else", "Other", Some("x")).unwrap();
        assert_eq!(second.description, "Coffee, not roasted");

        let all = list_active(&db).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_find_by_code() {
        let db = test_db();
        assert!(find_by_code(&db, "8703.10.00").unwrap().is_none());

        get_or_create(&db, "8703.10.00", "Passenger cars", "Vehicles", None).unwrap();
        let found = find_by_code(&db, "8703.10.00").unwrap().unwrap();
        assert_eq!(found.description, "Passenger cars");
    }

    #[test]
    fn test_list_active_ordered() {
        let db = test_db();
        get_or_create(&db, "8703.10.00", "Cars", "Vehicles", None).unwrap();
        get_or_create(&db, "0901.11.00", "Coffee", "Foodstuffs", None).unwrap();

        let all = list_active(&db).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].code, "0901.11.00");
        assert_eq!(all[1].code, "8703.10.00");
    }

    #[test]
    fn test_search_matches_description_and_category() {
        let db = test_db();
        get_or_create(&db, "8703.10.00", "Passenger cars", "Vehicles", None).unwrap();
        get_or_create(&db, "0901.11.00", "Coffee, not roasted", "Foodstuffs", None).unwrap();

        let by_desc = search(&db, "coffee").unwrap();
        assert_eq!(by_desc.len(), 1);
        assert_eq!(by_desc[0].code, "0901.11.00");

        let by_category = search(&db, "Vehic").unwrap();
        assert_eq!(by_category.len(), 1);

        let by_code = search(&db, "8703").unwrap();
        assert_eq!(by_code.len(), 1);
    }

    #[test]
    fn test_categories_distinct() {
        let db = test_db();
        get_or_create(&db, "8703.10.00", "Cars", "Vehicles", None).unwrap();
        get_or_create(&db, "8471.30.00", "Laptops", "Vehicles", None).unwrap();
        get_or_create(&db, "0901.11.00", "Coffee", "Foodstuffs", None).unwrap();

        let cats = categories(&db).unwrap();
        assert_eq!(cats, vec!["Foodstuffs".to_string(), "Vehicles".to_string()]);
    }
}

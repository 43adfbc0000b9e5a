//! Term database operations (create, list, update, delete, tag filtering)

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::super::Database;
use super::tags::{
    link_tag, sweep_orphans, tags_by_term, tags_for_term, unlink_tag, upsert_tag,
    validate_tag_name,
};
use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::error::{GlossaryError, Result};
use crate::models::{Term, TermInput};

const TERM_COLUMNS: &str = "id, text, description, createdAt, updatedAt";

pub(crate) fn term_exists(conn: &Connection, term_id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM terms WHERE id = ?1", [term_id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

/// Map a row selected with [`TERM_COLUMNS`]; tags are attached by the caller
fn row_to_term(row: &Row<'_>) -> rusqlite::Result<Term> {
    Ok(Term {
        id: row.get(0)?,
        text: row.get(1)?,
        // Rows written by older versions may hold NULL here
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        tags: Vec::new(),
        created_at: parse_timestamp(row, 3)?,
        updated_at: parse_timestamp(row, 4)?,
    })
}

/// Reject empty text or blank tag names; returns the tag names deduplicated in input order
fn validate_input(input: &TermInput) -> Result<Vec<String>> {
    if input.text.trim().is_empty() {
        return Err(GlossaryError::validation("term text must not be empty"));
    }
    let mut names: Vec<String> = Vec::with_capacity(input.tags.len());
    for name in &input.tags {
        validate_tag_name(name)?;
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

fn dedup_names(names: &[String]) -> Vec<&str> {
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name.as_str()) {
            unique.push(name);
        }
    }
    unique
}

impl Database {
    /// Create a term with its initial tag set in one transaction
    pub fn create_term(&self, input: &TermInput) -> Result<i64> {
        let tag_names = validate_input(input)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = format_timestamp(Utc::now());

        tx.execute(
            "INSERT INTO terms (text, description, createdAt, updatedAt) VALUES (?1, ?2, ?3, ?3)",
            params![input.text, input.description, now],
        )?;
        let term_id = tx.last_insert_rowid();

        for name in &tag_names {
            let tag_id = upsert_tag(&tx, name)?;
            link_tag(&tx, term_id, tag_id)?;
        }

        tx.commit()?;
        log::debug!("[DB] Created term {} with {} tag(s)", term_id, tag_names.len());
        Ok(term_id)
    }

    /// Create several terms, one transaction each. Stops at the first failure;
    /// terms created before it stay committed.
    pub fn create_terms(&self, inputs: &[TermInput]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            ids.push(self.create_term(input)?);
        }
        Ok(ids)
    }

    /// All terms sorted by text, each with its tag set
    pub fn get_all_terms(&self) -> Result<Vec<Term>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM terms ORDER BY text, id", TERM_COLUMNS);
        Self::load_terms(&conn, &sql, params![])
    }

    pub fn get_term(&self, term_id: i64) -> Result<Term> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM terms WHERE id = ?1", TERM_COLUMNS);
        let term = conn.query_row(&sql, [term_id], row_to_term).optional()?;
        let Some(mut term) = term else {
            return Err(GlossaryError::NotFound(term_id));
        };
        term.tags = tags_for_term(&conn, term_id)?;
        Ok(term)
    }

    /// Replace text, description and tag set. Tags this term no longer uses
    /// are deleted if no other term references them.
    pub fn update_term(&self, term_id: i64, input: &TermInput) -> Result<()> {
        let tag_names = validate_input(input)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let previous = tx
            .query_row("SELECT updatedAt FROM terms WHERE id = ?1", [term_id], |row| {
                parse_timestamp(row, 0)
            })
            .optional()?;
        let Some(previous) = previous else {
            return Err(GlossaryError::NotFound(term_id));
        };
        let now = Utc::now().max(previous);

        tx.execute(
            "UPDATE terms SET text = ?1, description = ?2, updatedAt = ?3 WHERE id = ?4",
            params![input.text, input.description, format_timestamp(now), term_id],
        )?;

        let old_tags = tags_for_term(&tx, term_id)?;
        let removed: Vec<i64> = old_tags
            .iter()
            .filter(|t| !tag_names.contains(&t.name))
            .map(|t| t.id)
            .collect();
        for tag_id in &removed {
            unlink_tag(&tx, term_id, *tag_id)?;
        }

        let mut added = 0;
        for name in tag_names
            .iter()
            .filter(|name| !old_tags.iter().any(|t| &t.name == *name))
        {
            let tag_id = upsert_tag(&tx, name)?;
            link_tag(&tx, term_id, tag_id)?;
            added += 1;
        }

        sweep_orphans(&tx, &removed)?;
        tx.commit()?;

        log::debug!(
            "[DB] Updated term {} (+{} / -{} tags)",
            term_id,
            added,
            removed.len()
        );
        Ok(())
    }

    /// Delete a term; its links cascade and tags left without links are removed
    pub fn delete_term(&self, term_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let tag_ids: Vec<i64> = tags_for_term(&tx, term_id)?.into_iter().map(|t| t.id).collect();
        let deleted = tx.execute("DELETE FROM terms WHERE id = ?1", [term_id])?;
        if deleted == 0 {
            return Err(GlossaryError::NotFound(term_id));
        }
        sweep_orphans(&tx, &tag_ids)?;
        tx.commit()?;

        log::debug!("[DB] Deleted term {}", term_id);
        Ok(())
    }

    /// Terms carrying any of the named tags, sorted by text. No names means all terms.
    pub fn filter_by_tags(&self, tag_names: &[String]) -> Result<Vec<Term>> {
        let names = dedup_names(tag_names);
        if names.is_empty() {
            return self.get_all_terms();
        }

        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT {} FROM terms
             WHERE id IN (
                 SELECT tt.term_id FROM term_tags tt
                 JOIN tags t ON t.id = tt.tag_id
                 WHERE t.name IN ({})
             )
             ORDER BY text, id",
            TERM_COLUMNS,
            placeholders.join(", ")
        );

        let conn = self.conn()?;
        Self::load_terms(&conn, &sql, params_from_iter(names.iter()))
    }

    /// Terms carrying any tag whose name contains `fragment`, sorted by text
    pub fn search_by_tag(&self, fragment: &str) -> Result<Vec<Term>> {
        let escaped = fragment
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);
        let sql = format!(
            "SELECT {} FROM terms
             WHERE id IN (
                 SELECT tt.term_id FROM term_tags tt
                 JOIN tags t ON t.id = tt.tag_id
                 WHERE t.name LIKE ?1 ESCAPE '\\'
             )
             ORDER BY text, id",
            TERM_COLUMNS
        );

        let conn = self.conn()?;
        Self::load_terms(&conn, &sql, [pattern])
    }

    pub fn term_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM terms", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn load_terms<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Term>> {
        let mut tags = tags_by_term(conn)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_term)?;

        let mut terms = Vec::new();
        for row in rows {
            let mut term = row?;
            term.tags = tags.remove(&term.id).unwrap_or_default();
            terms.push(term);
        }
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::error::GlossaryError;
    use crate::models::{Term, TermInput};

    fn texts(terms: &[Term]) -> Vec<&str> {
        terms.iter().map(|t| t.text.as_str()).collect()
    }

    fn tag_names(term: &Term) -> Vec<&str> {
        term.tag_names()
    }

    fn to_strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_list() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_term(&TermInput::new("API", "Application Programming Interface").with_tags(["web"]))
            .expect("Failed to create term");

        let terms = db.get_all_terms().expect("Failed to list terms");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id, id);
        assert_eq!(terms[0].text, "API");
        assert_eq!(terms[0].description, "Application Programming Interface");
        assert_eq!(tag_names(&terms[0]), vec!["web"]);
        assert_eq!(terms[0].created_at, terms[0].updated_at);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let db = Database::open_in_memory().unwrap();
        let first = db.create_term(&TermInput::new("A", "")).unwrap();
        db.delete_term(first).unwrap();
        let second = db.create_term(&TermInput::new("A", "")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_create_rejects_empty_text() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_term(&TermInput::new("   ", "desc")).unwrap_err();
        assert!(matches!(err, GlossaryError::Validation(_)));
        assert_eq!(db.term_count().unwrap(), 0);
    }

    #[test]
    fn test_create_with_blank_tag_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_term(&TermInput::new("API", "").with_tags(["web", ""]))
            .unwrap_err();
        assert!(matches!(err, GlossaryError::Validation(_)));
        assert_eq!(db.term_count().unwrap(), 0);
        assert_eq!(db.tag_count().unwrap(), 0);
    }

    #[test]
    fn test_create_rolls_back_when_a_tag_insert_fails() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_tag BEFORE INSERT ON tags
                 WHEN NEW.name = 'forbidden'
                 BEGIN SELECT RAISE(ABORT, 'forbidden tag'); END;",
            )
            .unwrap();

        let err = db
            .create_term(&TermInput::new("API", "").with_tags(["web", "forbidden"]))
            .unwrap_err();

        assert!(matches!(err, GlossaryError::Constraint(_)));
        assert_eq!(db.term_count().unwrap(), 0);
        assert_eq!(db.tag_count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_tag_names_link_once() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_term(&TermInput::new("API", "").with_tags(["web", "web"]))
            .unwrap();
        assert_eq!(db.get_tags_for_term(id).unwrap().len(), 1);
        assert_eq!(db.tag_count().unwrap(), 1);
    }

    #[test]
    fn test_list_sorted_by_text() {
        let db = Database::open_in_memory().unwrap();
        db.create_term(&TermInput::new("SDK", "")).unwrap();
        db.create_term(&TermInput::new("API", "")).unwrap();
        db.create_term(&TermInput::new("データベース", "")).unwrap();
        db.create_term(&TermInput::new("CPU", "")).unwrap();

        let terms = db.get_all_terms().unwrap();
        assert_eq!(texts(&terms), vec!["API", "CPU", "SDK", "データベース"]);
    }

    #[test]
    fn test_get_term_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_term(7), Err(GlossaryError::NotFound(7))));
    }

    #[test]
    fn test_update_replaces_fields_and_tags() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_term(&TermInput::new("API", "old").with_tags(["a", "b"]))
            .unwrap();

        db.update_term(id, &TermInput::new("Web API", "new").with_tags(["b", "c"]))
            .expect("Failed to update");

        let term = db.get_term(id).unwrap();
        assert_eq!(term.text, "Web API");
        assert_eq!(term.description, "new");
        assert_eq!(tag_names(&term), vec!["b", "c"]);
        assert!(term.updated_at >= term.created_at);
    }

    #[test]
    fn test_update_sweeps_only_unreferenced_tags() {
        let db = Database::open_in_memory().unwrap();
        let a = db
            .create_term(&TermInput::new("A", "").with_tags(["x", "shared"]))
            .unwrap();
        db.create_term(&TermInput::new("B", "").with_tags(["shared"]))
            .unwrap();

        db.update_term(a, &TermInput::new("A", "")).unwrap();

        let tags: Vec<String> = db.get_all_tags().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(tags, vec!["shared"]);
    }

    #[test]
    fn test_update_missing_term() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .update_term(99, &TermInput::new("A", "").with_tags(["x"]))
            .unwrap_err();
        assert!(matches!(err, GlossaryError::NotFound(99)));
        assert_eq!(db.tag_count().unwrap(), 0);
    }

    #[test]
    fn test_update_failure_leaves_term_untouched() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_term(&TermInput::new("API", "keep").with_tags(["old"]))
            .unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_tag BEFORE INSERT ON tags
                 WHEN NEW.name = 'forbidden'
                 BEGIN SELECT RAISE(ABORT, 'forbidden tag'); END;",
            )
            .unwrap();

        let result = db.update_term(id, &TermInput::new("Changed", "gone").with_tags(["forbidden"]));
        assert!(result.is_err());

        let term = db.get_term(id).unwrap();
        assert_eq!(term.text, "API");
        assert_eq!(term.description, "keep");
        assert_eq!(tag_names(&term), vec!["old"]);
        assert_eq!(db.tag_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_cascades_links_and_sweeps_tags() {
        let db = Database::open_in_memory().unwrap();
        let a = db
            .create_term(&TermInput::new("A", "").with_tags(["only-a", "shared"]))
            .unwrap();
        db.create_term(&TermInput::new("B", "").with_tags(["shared"]))
            .unwrap();

        db.delete_term(a).expect("Failed to delete");

        let links: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM term_tags WHERE term_id = ?1", [a], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
        let tags: Vec<String> = db.get_all_tags().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(tags, vec!["shared"]);
    }

    #[test]
    fn test_delete_missing_term() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.delete_term(3), Err(GlossaryError::NotFound(3))));
    }

    #[test]
    fn test_filter_by_tags_is_union() {
        let db = Database::open_in_memory().unwrap();
        db.create_term(&TermInput::new("B", "").with_tags(["tag2"])).unwrap();
        db.create_term(&TermInput::new("A", "").with_tags(["tag1", "tag2"]))
            .unwrap();
        db.create_term(&TermInput::new("C", "")).unwrap();

        let terms = db
            .filter_by_tags(&to_strings(&["tag1", "tag2"]))
            .expect("Failed to filter");
        assert_eq!(texts(&terms), vec!["A", "B"]);
        assert_eq!(tag_names(&terms[0]), vec!["tag1", "tag2"]);
    }

    #[test]
    fn test_filter_by_no_tags_returns_all() {
        let db = Database::open_in_memory().unwrap();
        db.create_term(&TermInput::new("B", "")).unwrap();
        db.create_term(&TermInput::new("A", "").with_tags(["x"])).unwrap();

        let terms = db.filter_by_tags(&[]).unwrap();
        assert_eq!(texts(&terms), vec!["A", "B"]);
    }

    #[test]
    fn test_filter_by_unknown_tag_is_empty() {
        let db = Database::open_in_memory().unwrap();
        db.create_term(&TermInput::new("A", "").with_tags(["x"])).unwrap();
        assert!(db.filter_by_tags(&to_strings(&["nope"])).unwrap().is_empty());
    }

    #[test]
    fn test_search_by_tag_matches_fragment() {
        let db = Database::open_in_memory().unwrap();
        db.create_term(&TermInput::new("A", "").with_tags(["networking"]))
            .unwrap();
        db.create_term(&TermInput::new("B", "").with_tags(["storage"]))
            .unwrap();
        db.create_term(&TermInput::new("C", "").with_tags(["100%_done"]))
            .unwrap();

        assert_eq!(texts(&db.search_by_tag("work").unwrap()), vec!["A"]);
        assert_eq!(texts(&db.search_by_tag("%_").unwrap()), vec!["C"]);
        assert!(db.search_by_tag("compute").unwrap().is_empty());
    }

    #[test]
    fn test_create_terms_stops_at_first_failure() {
        let db = Database::open_in_memory().unwrap();
        let inputs = vec![
            TermInput::new("A", ""),
            TermInput::new("", "invalid"),
            TermInput::new("C", ""),
        ];
        assert!(db.create_terms(&inputs).is_err());
        assert_eq!(texts(&db.get_all_terms().unwrap()), vec!["A"]);
    }

    #[test]
    fn test_null_description_reads_as_empty() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "DROP TABLE term_tags;
                 DROP TABLE terms;
                 CREATE TABLE terms (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     text TEXT NOT NULL,
                     description TEXT,
                     createdAt TEXT NOT NULL,
                     updatedAt TEXT NOT NULL
                 );
                 CREATE TABLE term_tags (
                     term_id INTEGER NOT NULL,
                     tag_id INTEGER NOT NULL,
                     PRIMARY KEY (term_id, tag_id),
                     FOREIGN KEY (term_id) REFERENCES terms(id) ON DELETE CASCADE,
                     FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
                 );
                 INSERT INTO terms (text, description, createdAt, updatedAt)
                 VALUES ('Legacy', NULL, '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z');",
            )
            .unwrap();

        let terms = db.get_all_terms().unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].description, "");
    }
}

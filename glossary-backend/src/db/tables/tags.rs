//! Database operations for the tags and term_tags tables
//!
//! Tags are created implicitly on first use and hard-deleted as soon as the
//! last link to them goes away, inside the same transaction that removed it.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::super::Database;
use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::error::{GlossaryError, Result};
use crate::models::Tag;

/// Insert the tag if absent and return its id
pub(crate) fn upsert_tag(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
    conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))
}

/// Link a tag to a term. Returns false if the link already existed.
pub(crate) fn link_tag(conn: &Connection, term_id: i64, tag_id: i64) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO term_tags (term_id, tag_id) VALUES (?1, ?2)",
        params![term_id, tag_id],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn unlink_tag(conn: &Connection, term_id: i64, tag_id: i64) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM term_tags WHERE term_id = ?1 AND tag_id = ?2",
        params![term_id, tag_id],
    )?;
    Ok(removed > 0)
}

/// Delete every tag in `tag_ids` that no term references anymore
pub(crate) fn sweep_orphans(conn: &Connection, tag_ids: &[i64]) -> rusqlite::Result<usize> {
    let mut swept = 0;
    for tag_id in tag_ids {
        swept += conn.execute(
            "DELETE FROM tags WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM term_tags WHERE tag_id = ?1)",
            [tag_id],
        )?;
    }
    if swept > 0 {
        log::debug!("[DB] Swept {} orphaned tag(s)", swept);
    }
    Ok(swept)
}

pub(crate) fn tags_for_term(conn: &Connection, term_id: i64) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM tags t
         JOIN term_tags tt ON t.id = tt.tag_id
         WHERE tt.term_id = ?1
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map([term_id], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// Every term's tag set in one pass, each sorted by name
pub(crate) fn tags_by_term(conn: &Connection) -> rusqlite::Result<HashMap<i64, Vec<Tag>>> {
    let mut stmt = conn.prepare(
        "SELECT tt.term_id, t.id, t.name FROM term_tags tt
         JOIN tags t ON t.id = tt.tag_id
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Tag {
                id: row.get(1)?,
                name: row.get(2)?,
            },
        ))
    })?;

    let mut by_term: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in rows {
        let (term_id, tag) = row?;
        by_term.entry(term_id).or_default().push(tag);
    }
    Ok(by_term)
}

/// Bump a term's updatedAt, never moving it backwards. Returns false if the term is missing.
pub(crate) fn touch_term(conn: &Connection, term_id: i64) -> rusqlite::Result<bool> {
    let previous = conn
        .query_row("SELECT updatedAt FROM terms WHERE id = ?1", [term_id], |row| {
            parse_timestamp(row, 0)
        })
        .optional()?;
    let Some(previous) = previous else {
        return Ok(false);
    };
    let now = Utc::now().max(previous);
    conn.execute(
        "UPDATE terms SET updatedAt = ?1 WHERE id = ?2",
        params![format_timestamp(now), term_id],
    )?;
    Ok(true)
}

pub(crate) fn validate_tag_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GlossaryError::validation("tag name must not be empty"));
    }
    Ok(())
}

impl Database {
    /// All tags, sorted by name
    pub fn get_all_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Tags attached to one term, sorted by name
    pub fn get_tags_for_term(&self, term_id: i64) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        if !super::terms::term_exists(&conn, term_id)? {
            return Err(GlossaryError::NotFound(term_id));
        }
        Ok(tags_for_term(&conn, term_id)?)
    }

    /// Attach a tag by name, creating it if needed. Attaching twice is a no-op.
    pub fn attach_tag(&self, term_id: i64, name: &str) -> Result<Tag> {
        validate_tag_name(name)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if !super::terms::term_exists(&tx, term_id)? {
            return Err(GlossaryError::NotFound(term_id));
        }
        let tag_id = upsert_tag(&tx, name)?;
        if link_tag(&tx, term_id, tag_id)? {
            touch_term(&tx, term_id)?;
        }
        tx.commit()?;

        log::debug!("[DB] Attached tag '{}' to term {}", name, term_id);
        Ok(Tag {
            id: tag_id,
            name: name.to_string(),
        })
    }

    /// Remove one link and drop the tag if nothing else uses it.
    /// Returns false if the term did not carry the tag.
    pub fn detach_tag(&self, term_id: i64, tag_id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if !super::terms::term_exists(&tx, term_id)? {
            return Err(GlossaryError::NotFound(term_id));
        }
        let removed = unlink_tag(&tx, term_id, tag_id)?;
        if removed {
            touch_term(&tx, term_id)?;
            sweep_orphans(&tx, &[tag_id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn tag_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

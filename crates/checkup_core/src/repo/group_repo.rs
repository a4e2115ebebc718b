//! Check group repository: contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist groups and maintain the group↔item link set.
//! - Answer the reference-count and fan-out queries that drive deletion
//!   guards and package cache invalidation.
//!
//! # Invariants
//! - `update_group` replaces the whole item link set in one transaction.
//! - `delete_group` checks the referencing-setmeal count before any
//!   destructive write, inside the deleting transaction.

use crate::model::catalog::{CheckGroup, CheckGroupFields};
use crate::repo::{
    ensure_catalog_tables, sex_from_db, sex_to_db, PageResult, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const GROUP_SELECT_SQL: &str =
    "SELECT id, code, name, help_code, sex, remark, attention FROM t_checkgroup";

/// Record-access interface for check groups.
pub trait GroupRepository {
    /// Creates a group plus its item links; returns the assigned id.
    fn create_group(&mut self, fields: &CheckGroupFields, item_ids: &[i64]) -> RepoResult<i64>;
    /// Updates descriptive fields and replaces the full item link set.
    fn update_group(&mut self, group: &CheckGroup, item_ids: &[i64]) -> RepoResult<()>;
    /// Deletes the group and its item links; fails `InUse` while any
    /// setmeal references the group.
    fn delete_group(&mut self, id: i64) -> RepoResult<()>;
    /// Gets one group by id.
    fn get_group(&self, id: i64) -> RepoResult<Option<CheckGroup>>;
    /// Lists all groups ordered by id.
    fn list_groups(&self) -> RepoResult<Vec<CheckGroup>>;
    /// Pages groups matching an optional pre-wildcarded LIKE pattern.
    fn find_page(
        &self,
        pattern: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<PageResult<CheckGroup>>;
    /// Returns item ids linked to the group, ordered by item id.
    fn item_ids_for_group(&self, id: i64) -> RepoResult<Vec<i64>>;
    /// Counts setmeals referencing the group (deletion guard input).
    fn count_setmeals_referencing_group(&self, id: i64) -> RepoResult<i64>;
    /// Returns ids of setmeals referencing the group (invalidation fan-out).
    fn setmeal_ids_referencing_group(&self, id: i64) -> RepoResult<Vec<i64>>;
}

/// SQLite-backed group repository over a migrated connection.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_catalog_tables(conn)?;
        Ok(Self { conn })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&mut self, fields: &CheckGroupFields, item_ids: &[i64]) -> RepoResult<i64> {
        fields.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO t_checkgroup (code, name, help_code, sex, remark, attention)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                fields.code,
                fields.name,
                fields.help_code,
                fields.sex.map(sex_to_db),
                fields.remark,
                fields.attention,
            ],
        )?;
        let group_id = tx.last_insert_rowid();
        insert_item_links(&tx, group_id, item_ids)?;
        tx.commit()?;

        Ok(group_id)
    }

    fn update_group(&mut self, group: &CheckGroup, item_ids: &[i64]) -> RepoResult<()> {
        group.fields.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE t_checkgroup
             SET code = ?1, name = ?2, help_code = ?3, sex = ?4, remark = ?5, attention = ?6
             WHERE id = ?7;",
            params![
                group.fields.code,
                group.fields.name,
                group.fields.help_code,
                group.fields.sex.map(sex_to_db),
                group.fields.remark,
                group.fields.attention,
                group.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "check group",
                id: group.id,
            });
        }

        tx.execute(
            "DELETE FROM t_checkgroup_checkitem WHERE checkgroup_id = ?1;",
            [group.id],
        )?;
        insert_item_links(&tx, group.id, item_ids)?;
        tx.commit()?;

        Ok(())
    }

    fn delete_group(&mut self, id: i64) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let dependents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM t_setmeal_checkgroup WHERE checkgroup_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        if dependents > 0 {
            return Err(RepoError::InUse {
                entity: "check group",
                id,
                dependents,
            });
        }

        tx.execute(
            "DELETE FROM t_checkgroup_checkitem WHERE checkgroup_id = ?1;",
            [id],
        )?;
        let changed = tx.execute("DELETE FROM t_checkgroup WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "check group",
                id,
            });
        }
        tx.commit()?;

        Ok(())
    }

    fn get_group(&self, id: i64) -> RepoResult<Option<CheckGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_group_row(row)?));
        }
        Ok(None)
    }

    fn list_groups(&self) -> RepoResult<Vec<CheckGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn find_page(
        &self,
        pattern: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<PageResult<CheckGroup>> {
        let mut filter = String::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(pattern) = pattern {
            filter.push_str(" WHERE (name LIKE ? OR code LIKE ? OR help_code LIKE ?)");
            for _ in 0..3 {
                bind_values.push(Value::Text(pattern.to_string()));
            }
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM t_checkgroup{filter};"),
            params_from_iter(bind_values.clone()),
            |row| row.get(0),
        )?;

        let sql = format!("{GROUP_SELECT_SQL}{filter} ORDER BY id ASC LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(i64::from(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut page_rows = Vec::new();
        while let Some(row) = rows.next()? {
            page_rows.push(parse_group_row(row)?);
        }

        Ok(PageResult {
            total: total as u64,
            rows: page_rows,
        })
    }

    fn item_ids_for_group(&self, id: i64) -> RepoResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT checkitem_id
             FROM t_checkgroup_checkitem
             WHERE checkgroup_id = ?1
             ORDER BY checkitem_id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut item_ids = Vec::new();
        while let Some(row) = rows.next()? {
            item_ids.push(row.get(0)?);
        }
        Ok(item_ids)
    }

    fn count_setmeals_referencing_group(&self, id: i64) -> RepoResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM t_setmeal_checkgroup WHERE checkgroup_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn setmeal_ids_referencing_group(&self, id: i64) -> RepoResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT setmeal_id
             FROM t_setmeal_checkgroup
             WHERE checkgroup_id = ?1
             ORDER BY setmeal_id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut setmeal_ids = Vec::new();
        while let Some(row) = rows.next()? {
            setmeal_ids.push(row.get(0)?);
        }
        Ok(setmeal_ids)
    }
}

pub(crate) fn parse_group_row(row: &Row<'_>) -> RepoResult<CheckGroup> {
    Ok(CheckGroup {
        id: row.get("id")?,
        fields: CheckGroupFields {
            code: row.get("code")?,
            name: row.get("name")?,
            help_code: row.get("help_code")?,
            sex: sex_from_db(row.get::<_, Option<String>>("sex")?)?,
            remark: row.get("remark")?,
            attention: row.get("attention")?,
        },
    })
}

fn insert_item_links(tx: &Transaction<'_>, group_id: i64, item_ids: &[i64]) -> RepoResult<()> {
    for item_id in item_ids {
        tx.execute(
            "INSERT INTO t_checkgroup_checkitem (checkgroup_id, checkitem_id)
             VALUES (?1, ?2);",
            params![group_id, item_id],
        )?;
    }
    Ok(())
}

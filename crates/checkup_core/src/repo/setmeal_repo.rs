//! Setmeal (package) repository: contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist packages and maintain the package↔group link set.
//! - Answer the order-reference guard query, the deep-read queries and
//!   the aggregate report.
//!
//! # Invariants
//! - `update_setmeal` replaces the whole group link set in one
//!   transaction.
//! - `delete_setmeal` checks the referencing-order count before any
//!   destructive write, inside the deleting transaction.

use crate::model::catalog::{
    CheckGroup, CheckItem, Setmeal, SetmealBookingCount, SetmealFields,
};
use crate::repo::group_repo::parse_group_row;
use crate::repo::{ensure_catalog_tables, sex_from_db, sex_to_db, PageResult, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const SETMEAL_SELECT_SQL: &str =
    "SELECT id, name, code, help_code, sex, age, price, remark, attention, img FROM t_setmeal";

/// Record-access interface for packages.
pub trait SetmealRepository {
    /// Creates a package plus its group links; returns the assigned id.
    fn create_setmeal(&mut self, fields: &SetmealFields, group_ids: &[i64]) -> RepoResult<i64>;
    /// Updates descriptive fields and replaces the full group link set.
    fn update_setmeal(&mut self, setmeal: &Setmeal, group_ids: &[i64]) -> RepoResult<()>;
    /// Deletes the package and its group links; fails `InUse` while any
    /// order references the package.
    fn delete_setmeal(&mut self, id: i64) -> RepoResult<()>;
    /// Gets one package by id.
    fn get_setmeal(&self, id: i64) -> RepoResult<Option<Setmeal>>;
    /// Lists all packages ordered by id.
    fn list_setmeals(&self) -> RepoResult<Vec<Setmeal>>;
    /// Pages packages matching an optional pre-wildcarded LIKE pattern.
    fn find_page(
        &self,
        pattern: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<PageResult<Setmeal>>;
    /// Returns group ids linked to the package, ordered by group id.
    fn group_ids_for_setmeal(&self, id: i64) -> RepoResult<Vec<i64>>;
    /// Counts orders referencing the package (deletion guard input).
    fn count_orders_referencing_setmeal(&self, id: i64) -> RepoResult<i64>;
    /// Returns the groups linked to the package (deep read).
    fn groups_for_setmeal(&self, id: i64) -> RepoResult<Vec<CheckGroup>>;
    /// Returns the items linked to one group (deep read).
    fn items_for_group(&self, group_id: i64) -> RepoResult<Vec<CheckItem>>;
    /// Booking counts per package, ordered by package id.
    fn booking_report(&self) -> RepoResult<Vec<SetmealBookingCount>>;
    /// All non-empty package image references, ordered by package id.
    fn list_images(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed package repository over a migrated connection.
pub struct SqliteSetmealRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteSetmealRepository<'conn> {
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_catalog_tables(conn)?;
        Ok(Self { conn })
    }
}

impl SetmealRepository for SqliteSetmealRepository<'_> {
    fn create_setmeal(&mut self, fields: &SetmealFields, group_ids: &[i64]) -> RepoResult<i64> {
        fields.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO t_setmeal (name, code, help_code, sex, age, price, remark, attention, img)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                fields.name,
                fields.code,
                fields.help_code,
                fields.sex.map(sex_to_db),
                fields.age,
                fields.price,
                fields.remark,
                fields.attention,
                fields.img,
            ],
        )?;
        let setmeal_id = tx.last_insert_rowid();
        insert_group_links(&tx, setmeal_id, group_ids)?;
        tx.commit()?;

        Ok(setmeal_id)
    }

    fn update_setmeal(&mut self, setmeal: &Setmeal, group_ids: &[i64]) -> RepoResult<()> {
        setmeal.fields.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE t_setmeal
             SET name = ?1, code = ?2, help_code = ?3, sex = ?4, age = ?5,
                 price = ?6, remark = ?7, attention = ?8, img = ?9
             WHERE id = ?10;",
            params![
                setmeal.fields.name,
                setmeal.fields.code,
                setmeal.fields.help_code,
                setmeal.fields.sex.map(sex_to_db),
                setmeal.fields.age,
                setmeal.fields.price,
                setmeal.fields.remark,
                setmeal.fields.attention,
                setmeal.fields.img,
                setmeal.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "setmeal",
                id: setmeal.id,
            });
        }

        tx.execute(
            "DELETE FROM t_setmeal_checkgroup WHERE setmeal_id = ?1;",
            [setmeal.id],
        )?;
        insert_group_links(&tx, setmeal.id, group_ids)?;
        tx.commit()?;

        Ok(())
    }

    fn delete_setmeal(&mut self, id: i64) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let dependents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM t_order WHERE setmeal_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        if dependents > 0 {
            return Err(RepoError::InUse {
                entity: "setmeal",
                id,
                dependents,
            });
        }

        tx.execute(
            "DELETE FROM t_setmeal_checkgroup WHERE setmeal_id = ?1;",
            [id],
        )?;
        let changed = tx.execute("DELETE FROM t_setmeal WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "setmeal",
                id,
            });
        }
        tx.commit()?;

        Ok(())
    }

    fn get_setmeal(&self, id: i64) -> RepoResult<Option<Setmeal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SETMEAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_setmeal_row(row)?));
        }
        Ok(None)
    }

    fn list_setmeals(&self) -> RepoResult<Vec<Setmeal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SETMEAL_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut setmeals = Vec::new();
        while let Some(row) = rows.next()? {
            setmeals.push(parse_setmeal_row(row)?);
        }
        Ok(setmeals)
    }

    fn find_page(
        &self,
        pattern: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<PageResult<Setmeal>> {
        let mut filter = String::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(pattern) = pattern {
            filter.push_str(" WHERE (name LIKE ? OR code LIKE ? OR help_code LIKE ?)");
            for _ in 0..3 {
                bind_values.push(Value::Text(pattern.to_string()));
            }
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM t_setmeal{filter};"),
            params_from_iter(bind_values.clone()),
            |row| row.get(0),
        )?;

        let sql = format!("{SETMEAL_SELECT_SQL}{filter} ORDER BY id ASC LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(i64::from(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut page_rows = Vec::new();
        while let Some(row) = rows.next()? {
            page_rows.push(parse_setmeal_row(row)?);
        }

        Ok(PageResult {
            total: total as u64,
            rows: page_rows,
        })
    }

    fn group_ids_for_setmeal(&self, id: i64) -> RepoResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT checkgroup_id
             FROM t_setmeal_checkgroup
             WHERE setmeal_id = ?1
             ORDER BY checkgroup_id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut group_ids = Vec::new();
        while let Some(row) = rows.next()? {
            group_ids.push(row.get(0)?);
        }
        Ok(group_ids)
    }

    fn count_orders_referencing_setmeal(&self, id: i64) -> RepoResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM t_order WHERE setmeal_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn groups_for_setmeal(&self, id: i64) -> RepoResult<Vec<CheckGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.code, g.name, g.help_code, g.sex, g.remark, g.attention
             FROM t_checkgroup g
             INNER JOIN t_setmeal_checkgroup sg ON sg.checkgroup_id = g.id
             WHERE sg.setmeal_id = ?1
             ORDER BY g.id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn items_for_group(&self, group_id: i64) -> RepoResult<Vec<CheckItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.code, i.name, i.price
             FROM t_checkitem i
             INNER JOIN t_checkgroup_checkitem gi ON gi.checkitem_id = i.id
             WHERE gi.checkgroup_id = ?1
             ORDER BY i.id ASC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(CheckItem {
                id: row.get("id")?,
                code: row.get("code")?,
                name: row.get("name")?,
                price: row.get("price")?,
            });
        }
        Ok(items)
    }

    fn booking_report(&self) -> RepoResult<Vec<SetmealBookingCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name AS name, COUNT(o.id) AS bookings
             FROM t_setmeal s
             LEFT JOIN t_order o ON o.setmeal_id = s.id
             GROUP BY s.id
             ORDER BY s.id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut report = Vec::new();
        while let Some(row) = rows.next()? {
            report.push(SetmealBookingCount {
                name: row.get("name")?,
                bookings: row.get("bookings")?,
            });
        }
        Ok(report)
    }

    fn list_images(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT img FROM t_setmeal
             WHERE img IS NOT NULL AND img <> ''
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(row.get(0)?);
        }
        Ok(images)
    }
}

fn parse_setmeal_row(row: &Row<'_>) -> RepoResult<Setmeal> {
    Ok(Setmeal {
        id: row.get("id")?,
        fields: SetmealFields {
            name: row.get("name")?,
            code: row.get("code")?,
            help_code: row.get("help_code")?,
            sex: sex_from_db(row.get::<_, Option<String>>("sex")?)?,
            age: row.get("age")?,
            price: row.get("price")?,
            remark: row.get("remark")?,
            attention: row.get("attention")?,
            img: row.get("img")?,
        },
    })
}

fn insert_group_links(tx: &Transaction<'_>, setmeal_id: i64, group_ids: &[i64]) -> RepoResult<()> {
    for group_id in group_ids {
        tx.execute(
            "INSERT INTO t_setmeal_checkgroup (setmeal_id, checkgroup_id)
             VALUES (?1, ?2);",
            params![setmeal_id, group_id],
        )?;
    }
    Ok(())
}

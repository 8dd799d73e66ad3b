// crates/outpost-reader/src/reader.rs
// ============================================================================
// Module: Outpost LDB Reader
// Description: Concurrent, caching lookup façade over the local database.
// Purpose: Serve point lookups, prefix scans, and freshness probes on the
//          request hot path of every consuming process.
// Dependencies: outpost-core, rusqlite, chrono, tracing
// ============================================================================

//! ## Overview
//! The reader is a single long-lived object shared across all threads of a
//! consumer process. It keeps two process-local caches under one
//! readers-writer lock: primary-key descriptors and generated lookup
//! queries, both keyed by the physical LDB table name. Cache population and
//! invalidation temporarily promote the lock: the shared guard is released,
//! the exclusive guard taken for a map mutation only (never I/O), then the
//! shared guard is re-acquired with the cache state re-checked. Two racing
//! promoters may duplicate a metadata query; that is accepted to keep the
//! exclusive hold short.
//!
//! Primary keys for a table only change when the authoring side drops and
//! recreates that table, so the descriptor cache is invalidated solely on
//! observed point-lookup execution errors, the signature of schema drift.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use outpost_core::FamilyName;
use outpost_core::PkField;
use outpost_core::PrimaryKey;
use outpost_core::Sequence;
use outpost_core::TableName;
use outpost_core::ldb::LDB_LAST_UPDATE_TABLE;
use outpost_core::ldb::LDB_LEDGER_UPDATE_NAME;
use outpost_core::ldb::LDB_SEQ_ROW_ID;
use outpost_core::ldb::LDB_SEQ_TABLE;
use outpost_core::ldb_table_name;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params_from_iter;
use tracing::debug;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::config::DEFAULT_SCAN_QUEUE_CAPACITY;
use crate::config::ReaderConfig;
use crate::errors::ReaderError;
use crate::key::KeyValue;
use crate::key::coerce_key;
use crate::pool::ReadPool;
use crate::rows::Rows;
use crate::rows::ScanTask;
use crate::rows::spawn_scan;
use crate::scan::DbColumnMeta;
use crate::scan::RowData;
use crate::scan::RowSink;
use crate::scan::ScanPlan;
use crate::scan::column_meta_from_stmt;
use crate::scan::decode_row;
use crate::stats::METRIC_GET_ROWS_BY_KEY_PREFIX;
use crate::stats::METRIC_GET_ROW_BY_KEY;
use crate::stats::ReaderStats;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lists primary-key columns of a table in key order.
const PK_METADATA_SQL: &str =
    "SELECT name, type FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk ASC";

// ============================================================================
// SECTION: Cache State
// ============================================================================

/// Shared guard over the reader's cache state.
type SharedState<'a> = RwLockReadGuard<'a, ReaderState>;

/// Cache key for the prefix-scan query cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PrefixCacheKey {
    /// Physical LDB table name.
    ldb_table: String,
    /// Number of leading key columns the statement binds.
    num_keys: usize,
}

/// One cached lookup query.
///
/// # Invariants
/// - `sql` was generated from exactly `key_fields`; a hit requires those
///   fields to still equal the current descriptor's corresponding prefix, so
///   a rediscovered primary key refreshes the entry on the next lookup.
#[derive(Debug, Clone)]
struct CachedQuery {
    /// Key columns the statement binds, in key order.
    key_fields: Vec<PkField>,
    /// Generated statement text.
    sql: Arc<str>,
}

impl CachedQuery {
    /// Generates the statement text for the leading `num_keys` key columns.
    fn build(ldb_table: &str, pk: &PrimaryKey, num_keys: usize) -> Self {
        let mut sql = format!("SELECT * FROM {ldb_table}");
        for (index, field) in pk.fields().iter().take(num_keys).enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(field.name.as_str());
            sql.push_str(" = ?");
        }
        Self {
            key_fields: pk.fields()[..num_keys].to_vec(),
            sql: Arc::from(sql),
        }
    }

    /// Returns true when the entry matches the current descriptor prefix.
    fn matches(&self, pk: &PrimaryKey, num_keys: usize) -> bool {
        self.key_fields.len() == num_keys
            && pk
                .fields()
                .get(..num_keys)
                .is_some_and(|prefix| prefix == self.key_fields.as_slice())
    }
}

/// Cache state guarded by the reader's readers-writer lock.
#[derive(Debug)]
struct ReaderState {
    /// Connection pool; `None` once the reader is closed.
    pool: Option<Arc<ReadPool>>,
    /// Primary-key descriptors keyed by physical LDB table name.
    pk_cache: HashMap<String, PrimaryKey>,
    /// Point-lookup queries keyed by physical LDB table name.
    point_queries: HashMap<String, CachedQuery>,
    /// Prefix-scan queries keyed by (table, prefix length).
    prefix_queries: HashMap<PrefixCacheKey, CachedQuery>,
}

// ============================================================================
// SECTION: Reader
// ============================================================================

/// Reads control data from the LDB.
///
/// The external interface is thread-safe; one instance is meant to be shared
/// across the whole process, and separate processes may read the same LDB
/// file concurrently.
///
/// # Invariants
/// - The exclusive lock is never held across I/O.
/// - Cache entries are never evicted by size or time; only close and
///   observed point-lookup execution errors remove them.
#[derive(Debug)]
pub struct LdbReader {
    /// Caches and pool handle under the readers-writer lock.
    state: RwLock<ReaderState>,
    /// Lookup stats surface.
    stats: ReaderStats,
    /// Bounded queue depth for streaming scans.
    scan_queue_capacity: usize,
}

impl LdbReader {
    /// Opens a reader over the configured LDB file.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidConfig`] for bad tuning knobs and a
    /// wrapped store error when the LDB cannot be opened.
    pub fn open(config: ReaderConfig) -> Result<Self, ReaderError> {
        config.validate()?;
        let pool = ReadPool::open(&config)?;
        Ok(Self::with_pool(pool, config.scan_queue_capacity))
    }

    /// Builds a reader over caller-opened connections.
    ///
    /// Mostly useful for tests that seed and read the same temporary LDB.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidConfig`] when no connections are given.
    pub fn from_connections(connections: Vec<Connection>) -> Result<Self, ReaderError> {
        if connections.is_empty() {
            return Err(ReaderError::InvalidConfig(
                "at least one connection is required".to_string(),
            ));
        }
        Ok(Self::with_pool(
            ReadPool::from_connections(connections),
            DEFAULT_SCAN_QUEUE_CAPACITY,
        ))
    }

    fn with_pool(pool: ReadPool, scan_queue_capacity: usize) -> Self {
        Self {
            state: RwLock::new(ReaderState {
                pool: Some(Arc::new(pool)),
                pk_cache: HashMap::new(),
                point_queries: HashMap::new(),
                prefix_queries: HashMap::new(),
            }),
            stats: ReaderStats::default(),
            scan_queue_capacity,
        }
    }

    /// Returns the reader's stats surface.
    #[must_use]
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Point lookup
    // ------------------------------------------------------------------

    /// Fetches the single row matching a full primary key, copying it into
    /// `out`.
    ///
    /// Returns `Ok(false)` with `out` untouched when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NeedFullKey`] on key-arity mismatch,
    /// [`ReaderError::TableHasNoPrimaryKey`] for key-less tables, and wrapped
    /// store errors otherwise. A store execution error also invalidates the
    /// cached primary key for the table, assuming schema drift.
    pub fn get_row_by_key(
        &self,
        cancel: &CancelToken,
        out: &mut dyn RowSink,
        family_name: &str,
        table_name: &str,
        key: Vec<KeyValue>,
    ) -> Result<bool, ReaderError> {
        let started = Instant::now();
        let result = self.row_by_key(cancel, out, family_name, table_name, key);
        self.stats.observe_lookup(
            METRIC_GET_ROW_BY_KEY,
            family_name,
            table_name,
            started.elapsed(),
        );
        result
    }

    fn row_by_key(
        &self,
        cancel: &CancelToken,
        out: &mut dyn RowSink,
        family_name: &str,
        table_name: &str,
        key: Vec<KeyValue>,
    ) -> Result<bool, ReaderError> {
        cancel.bail()?;
        let family = FamilyName::new(family_name)?;
        let table = TableName::new(table_name)?;
        let ldb_table = ldb_table_name(&family, &table);

        let (guard, pool) = self.shared()?;
        let (pk, guard) = self.primary_key(guard, &pool, cancel, &ldb_table)?;
        if pk.is_zero() {
            return Err(ReaderError::TableHasNoPrimaryKey);
        }
        if pk.len() != key.len() {
            return Err(ReaderError::NeedFullKey);
        }
        let key = coerce_key(&pk, key)?;
        let (sql, guard) = self.point_query(guard, &pk, &ldb_table)?;
        cancel.bail()?;

        let fetched = {
            let connection = pool.connection().lock().map_err(|_| ReaderError::ConnPoisoned)?;
            fetch_single_row(&connection, &sql, &key)
        };
        match fetched {
            Err(err) => {
                if matches!(err, ReaderError::Query { .. }) {
                    self.invalidate_pk(guard, &ldb_table);
                }
                Err(err)
            }
            Ok(None) => Ok(false),
            Ok(Some((columns, row))) => {
                let plan = ScanPlan::new(out, &columns)?;
                plan.copy_row(&row, out)?;
                Ok(true)
            }
        }
    }

    // ------------------------------------------------------------------
    // Prefix scan
    // ------------------------------------------------------------------

    /// Streams every row whose leading key columns equal the supplied
    /// prefix. An empty prefix scans the whole table and increments the
    /// full-table-scan counter.
    ///
    /// The returned cursor is single-pass and caller-owned; it must be
    /// closed (or dropped) to release its connection.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::TooManyKeys`] when the prefix is longer than
    /// the key, [`ReaderError::TableHasNoPrimaryKey`] for key-less tables,
    /// and wrapped store errors otherwise.
    pub fn get_rows_by_key_prefix(
        &self,
        cancel: &CancelToken,
        family_name: &str,
        table_name: &str,
        key: Vec<KeyValue>,
    ) -> Result<Rows, ReaderError> {
        let started = Instant::now();
        let result = self.rows_by_key_prefix(cancel, family_name, table_name, key);
        self.stats.observe_lookup(
            METRIC_GET_ROWS_BY_KEY_PREFIX,
            family_name,
            table_name,
            started.elapsed(),
        );
        result
    }

    fn rows_by_key_prefix(
        &self,
        cancel: &CancelToken,
        family_name: &str,
        table_name: &str,
        key: Vec<KeyValue>,
    ) -> Result<Rows, ReaderError> {
        cancel.bail()?;
        let family = FamilyName::new(family_name)?;
        let table = TableName::new(table_name)?;
        let ldb_table = ldb_table_name(&family, &table);

        let (guard, pool) = self.shared()?;
        let (pk, guard) = self.primary_key(guard, &pool, cancel, &ldb_table)?;
        if pk.is_zero() {
            return Err(ReaderError::TableHasNoPrimaryKey);
        }
        if key.len() > pk.len() {
            return Err(ReaderError::TooManyKeys);
        }
        let key = coerce_key(&pk, key)?;
        let (sql, _guard) = self.prefix_query(guard, &pk, &ldb_table, key.len())?;
        if key.is_empty() {
            warn!(family = family_name, table = table_name, "full table scan requested");
            self.stats.incr_full_table_scan(family_name, table_name);
        }
        cancel.bail()?;
        spawn_scan(ScanTask {
            pool,
            sql,
            key,
            queue_capacity: self.scan_queue_capacity,
            cancel: cancel.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Freshness and liveness
    // ------------------------------------------------------------------

    /// Returns the highest ledger sequence applied to this LDB.
    ///
    /// A fresh LDB with no applied entries reads as [`Sequence::ZERO`].
    ///
    /// # Errors
    ///
    /// Surfaces wrapped store errors as-is.
    pub fn get_last_sequence(&self, cancel: &CancelToken) -> Result<Sequence, ReaderError> {
        cancel.bail()?;
        let (_guard, pool) = self.shared()?;
        let connection = pool.connection().lock().map_err(|_| ReaderError::ConnPoisoned)?;
        let sql = format!("SELECT seq FROM {LDB_SEQ_TABLE} WHERE id = ?");
        let seq = connection
            .query_row(&sql, [LDB_SEQ_ROW_ID], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|err| ReaderError::query("fetch ledger sequence", err))?;
        Ok(seq.map_or(Sequence::ZERO, Sequence::new))
    }

    /// Returns how far this LDB lags the authoritative ledger: the elapsed
    /// time since the reflector's last applied update.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NoLedgerUpdates`] when the reflector has not
    /// applied anything yet; other failures are wrapped store errors.
    pub fn get_ledger_latency(&self, cancel: &CancelToken) -> Result<Duration, ReaderError> {
        cancel.bail()?;
        let (_guard, pool) = self.shared()?;
        let connection = pool.connection().lock().map_err(|_| ReaderError::ConnPoisoned)?;
        let sql = format!("SELECT timestamp FROM {LDB_LAST_UPDATE_TABLE} WHERE name = ?");
        let timestamp = connection
            .query_row(&sql, [LDB_LEDGER_UPDATE_NAME], |row| {
                row.get::<_, DateTime<Utc>>(0)
            })
            .optional()
            .map_err(|err| ReaderError::query("fetch last ledger update", err))?;
        match timestamp {
            None => Err(ReaderError::NoLedgerUpdates),
            // Clock skew between reflector and reader hosts can push the
            // difference negative; report zero lag instead.
            Some(timestamp) => Ok((Utc::now() - timestamp).to_std().unwrap_or_default()),
        }
    }

    /// Reports whether the LDB is available. Safe for health-check hot
    /// paths: every failure collapses to `false`, never an error.
    pub fn ping(&self, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let Ok((_guard, pool)) = self.shared() else {
            return false;
        };
        let Ok(connection) = pool.connection().lock() else {
            return false;
        };
        let sql = format!("SELECT seq FROM {LDB_SEQ_TABLE} WHERE id = ?");
        matches!(
            connection.query_row(&sql, [LDB_SEQ_ROW_ID], |row| row.get::<_, Option<i64>>(0)),
            Ok(Some(_))
        )
    }

    // ------------------------------------------------------------------
    // Close
    // ------------------------------------------------------------------

    /// Closes the reader: takes the exclusive lock, drops the pool handle,
    /// and clears both caches. Idempotent.
    ///
    /// In-flight operations finish against their own pool handles; the
    /// connections and their cached statements are finalized exactly once,
    /// when the last handle drops. Operations started after close fail with
    /// [`ReaderError::Closed`].
    ///
    /// # Errors
    ///
    /// None currently; the `Result` keeps the close contract open for
    /// implementations with fallible teardown.
    pub fn close(&self) -> Result<(), ReaderError> {
        let mut exclusive = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if exclusive.pool.take().is_some() {
            debug!("ldb reader closed");
        }
        exclusive.pk_cache.clear();
        exclusive.point_queries.clear();
        exclusive.prefix_queries.clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cache management
    // ------------------------------------------------------------------

    /// Acquires the shared guard and a pool handle, failing once closed.
    fn shared(&self) -> Result<(SharedState<'_>, Arc<ReadPool>), ReaderError> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let pool = guard.pool.as_ref().map(Arc::clone).ok_or(ReaderError::Closed)?;
        Ok((guard, pool))
    }

    /// Promotes the lock for a map mutation: releases the shared guard,
    /// takes the exclusive guard, mutates, then re-acquires shared.
    ///
    /// The closure runs under the exclusive guard and must not perform I/O.
    /// The closed flag is re-checked on both sides of the mutation.
    fn promote<'a, T>(
        &'a self,
        guard: SharedState<'a>,
        mutate: impl FnOnce(&mut ReaderState) -> T,
    ) -> Result<(T, SharedState<'a>), ReaderError> {
        drop(guard);
        let value = {
            let mut exclusive = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if exclusive.pool.is_none() {
                return Err(ReaderError::Closed);
            }
            mutate(&mut exclusive)
        };
        let shared = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if shared.pool.is_none() {
            return Err(ReaderError::Closed);
        }
        Ok((value, shared))
    }

    /// Returns the primary-key descriptor for a table, populating the cache
    /// on first use.
    ///
    /// The metadata query runs under the shared guard; only the map insert
    /// happens under the exclusive guard. Racing callers may both run the
    /// query; descriptors for a live table are equal, so the last write
    /// wins.
    fn primary_key<'a>(
        &'a self,
        guard: SharedState<'a>,
        pool: &ReadPool,
        cancel: &CancelToken,
        ldb_table: &str,
    ) -> Result<(PrimaryKey, SharedState<'a>), ReaderError> {
        let cached = guard.pk_cache.get(ldb_table).cloned();
        if let Some(pk) = cached {
            return Ok((pk, guard));
        }
        cancel.bail()?;
        let discovered = {
            let connection = pool.connection().lock().map_err(|_| ReaderError::ConnPoisoned)?;
            discover_primary_key(&connection, ldb_table)?
        };
        cancel.bail()?;
        debug!(table = ldb_table, arity = discovered.len(), "primary key discovered");
        let inserted = discovered.clone();
        let ((), guard) = self.promote(guard, move |state| {
            state.pk_cache.insert(ldb_table.to_string(), inserted);
        })?;
        Ok((discovered, guard))
    }

    /// Removes the cached primary key for a table after an execution error.
    ///
    /// The point-lookup query cache is left alone on purpose: its entries
    /// are validated against the current descriptor on every hit, so they
    /// refresh independently once the key is rediscovered.
    fn invalidate_pk(&self, guard: SharedState<'_>, ldb_table: &str) {
        warn!(table = ldb_table, "invalidating cached primary key after lookup error");
        drop(guard);
        let mut exclusive = self.state.write().unwrap_or_else(PoisonError::into_inner);
        exclusive.pk_cache.remove(ldb_table);
    }

    /// Returns the point-lookup query for a table, generating it on miss.
    fn point_query<'a>(
        &'a self,
        guard: SharedState<'a>,
        pk: &PrimaryKey,
        ldb_table: &str,
    ) -> Result<(Arc<str>, SharedState<'a>), ReaderError> {
        let hit = guard
            .point_queries
            .get(ldb_table)
            .filter(|cached| cached.matches(pk, pk.len()))
            .map(|cached| Arc::clone(&cached.sql));
        if let Some(sql) = hit {
            return Ok((sql, guard));
        }
        let entry = CachedQuery::build(ldb_table, pk, pk.len());
        let sql = Arc::clone(&entry.sql);
        let ((), guard) = self.promote(guard, move |state| {
            state.point_queries.insert(ldb_table.to_string(), entry);
        })?;
        Ok((sql, guard))
    }

    /// Returns the prefix-scan query for (table, prefix length), generating
    /// it on miss.
    fn prefix_query<'a>(
        &'a self,
        guard: SharedState<'a>,
        pk: &PrimaryKey,
        ldb_table: &str,
        num_keys: usize,
    ) -> Result<(Arc<str>, SharedState<'a>), ReaderError> {
        let cache_key = PrefixCacheKey {
            ldb_table: ldb_table.to_string(),
            num_keys,
        };
        let hit = guard
            .prefix_queries
            .get(&cache_key)
            .filter(|cached| cached.matches(pk, num_keys))
            .map(|cached| Arc::clone(&cached.sql));
        if let Some(sql) = hit {
            return Ok((sql, guard));
        }
        let entry = CachedQuery::build(ldb_table, pk, num_keys);
        let sql = Arc::clone(&entry.sql);
        let ((), guard) = self.promote(guard, move |state| {
            state.prefix_queries.insert(cache_key, entry);
        })?;
        Ok((sql, guard))
    }
}

// ============================================================================
// SECTION: Store Access
// ============================================================================

/// Executes a point lookup and decodes at most one row.
fn fetch_single_row(
    connection: &Connection,
    sql: &str,
    key: &[KeyValue],
) -> Result<Option<(Vec<DbColumnMeta>, RowData)>, ReaderError> {
    let mut stmt = connection
        .prepare_cached(sql)
        .map_err(|err| ReaderError::query("prepare point lookup", err))?;
    let columns = column_meta_from_stmt(&stmt);
    let column_count = columns.len();
    let mut rows = stmt
        .query(params_from_iter(key.iter()))
        .map_err(|err| ReaderError::query("execute point lookup", err))?;
    match rows.next().map_err(|err| ReaderError::query("read point lookup row", err))? {
        None => Ok(None),
        Some(row) => Ok(Some((columns, decode_row(row, column_count)?))),
    }
}

/// Queries the store's metadata facility for a table's primary key.
///
/// An empty result is disambiguated by probing the table itself: a table
/// that exists without a declared key yields the zero descriptor, a missing
/// table yields [`ReaderError::TableNotFound`].
fn discover_primary_key(
    connection: &Connection,
    ldb_table: &str,
) -> Result<PrimaryKey, ReaderError> {
    let mut stmt = connection
        .prepare_cached(PK_METADATA_SQL)
        .map_err(|err| ReaderError::query("prepare table metadata query", err))?;
    let mut rows = stmt
        .query([ldb_table])
        .map_err(|err| ReaderError::query("query table metadata", err))?;
    let mut names = Vec::new();
    let mut types = Vec::new();
    while let Some(row) =
        rows.next().map_err(|err| ReaderError::query("read table metadata", err))?
    {
        names.push(
            row.get::<_, String>(0)
                .map_err(|err| ReaderError::query("read metadata column name", err))?,
        );
        types.push(
            row.get::<_, String>(1)
                .map_err(|err| ReaderError::query("read metadata column type", err))?,
        );
    }
    drop(rows);
    drop(stmt);
    let pk = PrimaryKey::from_raw_names_and_types(&names, &types)?;
    if pk.is_zero() {
        probe_table_exists(connection, ldb_table)?;
    }
    Ok(pk)
}

/// Distinguishes "table exists without a primary key" from "no such table".
fn probe_table_exists(connection: &Connection, ldb_table: &str) -> Result<(), ReaderError> {
    // The table name is composed from validated parts, so splicing it into
    // the statement text is safe.
    let sql = format!("SELECT * FROM {ldb_table} LIMIT 1");
    match connection.prepare(&sql) {
        Ok(_) => Ok(()),
        Err(err) if err.to_string().contains("no such table") => Err(ReaderError::TableNotFound),
        Err(err) => Err(ReaderError::query("probe table existence", err)),
    }
}

//! Append-only tick store.
//!
//! Writers are owned per ingestion task; readers take one consistent
//! snapshot per analytics cycle.

use pairs_core::config::StoreConfig;
use pairs_core::{Error, Result, Tick};
use parking_lot::RwLock;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ticks (
        timestamp INTEGER,
        symbol TEXT,
        price REAL,
        qty REAL
    );
    CREATE INDEX IF NOT EXISTS idx_ticks_symbol_ts ON ticks (symbol, timestamp);
";

const INSERT_TICK: &str = "INSERT INTO ticks (timestamp, symbol, price, qty) VALUES (?1, ?2, ?3, ?4)";

const SELECT_TICKS: &str = "SELECT timestamp, symbol, price, qty FROM ticks \
                            WHERE symbol = ?1 ORDER BY timestamp ASC, rowid ASC";

/// Write side of the store: one single-row append per call.
pub trait TickSink: Send {
    fn write_tick(&mut self, tick: &Tick) -> Result<()>;
}

/// A persistent tick table supporting concurrent appenders.
pub trait TickStore: Send + Sync + 'static {
    type Writer: TickSink + 'static;

    /// Open a new write handle owned by the caller.
    fn writer(&self) -> Result<Self::Writer>;

    /// All ticks for one symbol ordered by timestamp.
    fn read_ticks(&self, symbol: &str) -> Result<Vec<Tick>>;

    /// Read the given symbols and the total row count from one consistent view.
    fn snapshot(&self, symbols: &[&str]) -> Result<TickSnapshot>;
}

/// Ticks visible to one analytics cycle.
#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    total_rows: usize,
    ticks: HashMap<String, Vec<Tick>>,
}

impl TickSnapshot {
    pub fn new(total_rows: usize, ticks: HashMap<String, Vec<Tick>>) -> Self {
        let ticks = ticks
            .into_iter()
            .map(|(sym, t)| (sym.to_ascii_uppercase(), t))
            .collect();
        Self { total_rows, ticks }
    }

    /// Build a snapshot from loose ticks, ordering each symbol by timestamp.
    pub fn from_ticks(ticks: impl IntoIterator<Item = Tick>) -> Self {
        let mut by_symbol: HashMap<String, Vec<Tick>> = HashMap::new();
        let mut total_rows = 0;
        for tick in ticks {
            total_rows += 1;
            by_symbol
                .entry(tick.symbol.to_ascii_uppercase())
                .or_default()
                .push(tick);
        }
        for series in by_symbol.values_mut() {
            series.sort_by_key(|t| t.timestamp);
        }
        Self {
            total_rows,
            ticks: by_symbol,
        }
    }

    /// Number of rows in the whole store at snapshot time.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Ticks for one symbol; empty if the symbol has none.
    pub fn ticks_for(&self, symbol: &str) -> &[Tick] {
        self.ticks
            .get(&symbol.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// SQLite-backed tick store.
///
/// This is a cheap descriptor; every writer and every snapshot opens its own
/// connection.
#[derive(Debug, Clone)]
pub struct SqliteTickStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteTickStore {
    /// Open (creating if needed) the tick table at `path`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };

        let conn = store.connect()?;
        // WAL keeps the analytics reader from blocking appenders.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        Ok(store)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.db_path, Duration::from_millis(config.busy_timeout_ms))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(db_err)?;
        conn.busy_timeout(self.busy_timeout).map_err(db_err)?;
        Ok(conn)
    }
}

fn query_ticks(conn: &Connection, symbol: &str) -> Result<Vec<Tick>> {
    let mut stmt = conn.prepare_cached(SELECT_TICKS).map_err(db_err)?;
    let rows = stmt
        .query_map([symbol.to_ascii_uppercase()], |row| {
            Ok(Tick {
                timestamp: row.get(0)?,
                symbol: row.get(1)?,
                price: row.get(2)?,
                quantity: row.get(3)?,
            })
        })
        .map_err(db_err)?;

    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
}

impl TickStore for SqliteTickStore {
    type Writer = SqliteTickWriter;

    fn writer(&self) -> Result<SqliteTickWriter> {
        Ok(SqliteTickWriter {
            conn: self.connect()?,
        })
    }

    fn read_ticks(&self, symbol: &str) -> Result<Vec<Tick>> {
        let conn = self.connect()?;
        query_ticks(&conn, symbol)
    }

    fn snapshot(&self, symbols: &[&str]) -> Result<TickSnapshot> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(db_err)?;

        let total_rows: i64 = tx
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))
            .map_err(db_err)?;

        let mut ticks = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            ticks.insert(symbol.to_ascii_uppercase(), query_ticks(&tx, symbol)?);
        }
        tx.commit().map_err(db_err)?;

        Ok(TickSnapshot::new(total_rows.max(0) as usize, ticks))
    }
}

/// Write handle holding its own SQLite connection.
pub struct SqliteTickWriter {
    conn: Connection,
}

impl TickSink for SqliteTickWriter {
    fn write_tick(&mut self, tick: &Tick) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(INSERT_TICK).map_err(db_err)?;
        stmt.execute(params![tick.timestamp, tick.symbol, tick.price, tick.quantity])
            .map_err(db_err)?;
        Ok(())
    }
}

/// In-process tick store, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTickStore {
    ticks: Arc<RwLock<Vec<Tick>>>,
}

impl MemoryTickStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored ticks.
    pub fn len(&self) -> usize {
        self.ticks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.read().is_empty()
    }

    /// Number of stored ticks for one symbol.
    pub fn count_for(&self, symbol: &str) -> usize {
        self.ticks
            .read()
            .iter()
            .filter(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .count()
    }
}

fn select_sorted(ticks: &[Tick], symbol: &str) -> Vec<Tick> {
    let mut out: Vec<Tick> = ticks
        .iter()
        .filter(|t| t.symbol.eq_ignore_ascii_case(symbol))
        .cloned()
        .collect();
    // Stable: equal timestamps keep insertion order.
    out.sort_by_key(|t| t.timestamp);
    out
}

impl TickStore for MemoryTickStore {
    type Writer = MemoryTickWriter;

    fn writer(&self) -> Result<MemoryTickWriter> {
        Ok(MemoryTickWriter {
            ticks: Arc::clone(&self.ticks),
        })
    }

    fn read_ticks(&self, symbol: &str) -> Result<Vec<Tick>> {
        Ok(select_sorted(&self.ticks.read(), symbol))
    }

    fn snapshot(&self, symbols: &[&str]) -> Result<TickSnapshot> {
        let guard = self.ticks.read();
        let ticks = symbols
            .iter()
            .map(|sym| (sym.to_ascii_uppercase(), select_sorted(&guard, sym)))
            .collect();
        Ok(TickSnapshot::new(guard.len(), ticks))
    }
}

/// Write handle sharing the in-process tick vector.
pub struct MemoryTickWriter {
    ticks: Arc<RwLock<Vec<Tick>>>,
}

impl TickSink for MemoryTickWriter {
    fn write_tick(&mut self, tick: &Tick) -> Result<()> {
        self.ticks.write().push(tick.clone());
        Ok(())
    }
}

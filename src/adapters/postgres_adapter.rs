//! PostgreSQL adapter: market data, indicator cache, pick persistence and
//! the pipeline advisory lock.
//!
//! Pick results land in one table per trading day
//! (`stock_pick_results_YYYYMMDD`, primary key (rule_name, code)) so a whole
//! day can be dropped by retention cleanup without touching an index.

use chrono::NaiveDate;
use postgres::types::ToSql;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::cell::RefCell;

use crate::domain::bar::{Adjust, Instrument, PriceBar};
use crate::domain::error::ScreenerError;
use crate::domain::indicator::IndicatorRow;
use crate::domain::pipeline::AdvisoryLock;
use crate::domain::screener::PickResult;
use crate::ports::cache_port::IndicatorCachePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::market_cap_port::MarketCapStorePort;
use crate::ports::picks_port::PicksPort;

const PICKS_TABLE_PREFIX: &str = "stock_pick_results_";

fn db_err(e: impl std::fmt::Display) -> ScreenerError {
    ScreenerError::Database {
        reason: e.to_string(),
    }
}

fn conninfo(config: &dyn ConfigPort) -> Result<String, ScreenerError> {
    config
        .get_string("database", "conninfo")
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: "database".into(),
            key: "conninfo".into(),
        })
}

/// Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScreenerError> {
        let conninfo = conninfo(config)?;
        let manager = PostgresConnectionManager::new(
            conninfo.parse().map_err(db_err)?,
            NoTls,
        );
        let pool_size = config.get_int("database", "pool_size", 4).max(1) as u32;
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<PostgresConnectionManager<NoTls>>, ScreenerError> {
        self.pool.get().map_err(db_err)
    }
}

/// Day-table name for a trading day. The suffix comes from date formatting,
/// never from user input, so interpolating it into DDL is safe.
fn picks_table_name(trade_date: NaiveDate) -> String {
    format!("{PICKS_TABLE_PREFIX}{}", trade_date.format("%Y%m%d"))
}

/// Inverse of `picks_table_name`, for retention cleanup.
fn picks_table_date(table: &str) -> Option<NaiveDate> {
    let suffix = table.strip_prefix(PICKS_TABLE_PREFIX)?;
    NaiveDate::parse_from_str(suffix, "%Y%m%d").ok()
}

impl DataPort for PostgresAdapter {
    fn fetch_bars(
        &self,
        code: &str,
        adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScreenerError> {
        let query = "SELECT trade_date, \
                            open::double precision, high::double precision, \
                            low::double precision, close::double precision, \
                            volume::double precision, amount::double precision \
                     FROM daily_kline \
                     WHERE code = $1 AND adjust = $2 \
                       AND trade_date >= $3 AND trade_date <= $4 \
                     ORDER BY trade_date ASC";
        let params: &[&(dyn ToSql + Sync)] =
            &[&code, &adjust.as_str(), &start_date, &end_date];
        let rows = self.conn()?.query(query, params).map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| PriceBar {
                trade_date: row.get(0),
                open: row.get(1),
                high: row.get(2),
                low: row.get(3),
                close: row.get(4),
                volume: row.get::<_, Option<f64>>(5).unwrap_or(f64::NAN),
                amount: row.get::<_, Option<f64>>(6).unwrap_or(f64::NAN),
            })
            .collect())
    }

    fn list_universe(&self) -> Result<Vec<Instrument>, ScreenerError> {
        let rows = self
            .conn()?
            .query(
                "SELECT code, name, exchange FROM stock_basic WHERE list_status = 'L' ORDER BY code",
                &[],
            )
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                Instrument::new(
                    row.get::<_, &str>(0),
                    row.get::<_, &str>(1),
                    row.get::<_, &str>(2),
                )
            })
            .collect())
    }
}

impl IndicatorCachePort for PostgresAdapter {
    fn read_rows(
        &self,
        code: &str,
        adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, ScreenerError> {
        let query = "SELECT trade_date, macd_dif, macd_dea, macd_hist, \
                            kdj_k, kdj_d, kdj_j, short_trend_line, bull_bear_line \
                     FROM stock_indicators \
                     WHERE code = $1 AND adjust = $2 \
                       AND trade_date >= $3 AND trade_date <= $4 \
                     ORDER BY trade_date ASC";
        let params: &[&(dyn ToSql + Sync)] =
            &[&code, &adjust.as_str(), &start_date, &end_date];
        let rows = self.conn()?.query(query, params).map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| IndicatorRow {
                trade_date: row.get(0),
                macd_dif: row.get(1),
                macd_dea: row.get(2),
                macd_hist: row.get(3),
                kdj_k: row.get(4),
                kdj_d: row.get(5),
                kdj_j: row.get(6),
                short_trend_line: row.get(7),
                bull_bear_line: row.get(8),
            })
            .collect())
    }

    fn upsert_rows(
        &self,
        code: &str,
        adjust: Adjust,
        rows: &[IndicatorRow],
    ) -> Result<(), ScreenerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(db_err)?;
        let stmt = "INSERT INTO stock_indicators \
                    (code, adjust, trade_date, macd_dif, macd_dea, macd_hist, \
                     kdj_k, kdj_d, kdj_j, short_trend_line, bull_bear_line) \
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                    ON CONFLICT (code, adjust, trade_date) DO UPDATE SET \
                      macd_dif = EXCLUDED.macd_dif, macd_dea = EXCLUDED.macd_dea, \
                      macd_hist = EXCLUDED.macd_hist, kdj_k = EXCLUDED.kdj_k, \
                      kdj_d = EXCLUDED.kdj_d, kdj_j = EXCLUDED.kdj_j, \
                      short_trend_line = EXCLUDED.short_trend_line, \
                      bull_bear_line = EXCLUDED.bull_bear_line";
        for row in rows {
            let params: &[&(dyn ToSql + Sync)] = &[
                &code,
                &adjust.as_str(),
                &row.trade_date,
                &row.macd_dif,
                &row.macd_dea,
                &row.macd_hist,
                &row.kdj_k,
                &row.kdj_d,
                &row.kdj_j,
                &row.short_trend_line,
                &row.bull_bear_line,
            ];
            tx.execute(stmt, params).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }
}

impl PicksPort for PostgresAdapter {
    fn record_picks(
        &self,
        trade_date: NaiveDate,
        rule_name: &str,
        picks: &[PickResult],
    ) -> Result<(), ScreenerError> {
        let table = picks_table_name(trade_date);
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(db_err)?;
        let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table} ( \
                   rule_name text NOT NULL, \
                   code text NOT NULL, \
                   name text NOT NULL, \
                   exchange text NOT NULL, \
                   metrics jsonb NOT NULL DEFAULT '{{}}'::jsonb, \
                   picked_at timestamptz NOT NULL DEFAULT now(), \
                   PRIMARY KEY (rule_name, code))"
        );
        tx.execute(ddl.as_str(), &[]).map_err(db_err)?;
        let stmt = format!(
            "INSERT INTO {table} (rule_name, code, name, exchange, metrics) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (rule_name, code) DO UPDATE SET \
               name = EXCLUDED.name, exchange = EXCLUDED.exchange, \
               metrics = EXCLUDED.metrics, picked_at = now()"
        );
        for pick in picks {
            let metrics = serde_json::to_value(&pick.metrics).map_err(db_err)?;
            let params: &[&(dyn ToSql + Sync)] = &[
                &rule_name,
                &pick.code,
                &pick.name,
                &pick.exchange,
                &metrics,
            ];
            tx.execute(stmt.as_str(), params).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    fn cleanup_expired(&self, keep_before: NaiveDate) -> Result<usize, ScreenerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT tablename FROM pg_tables \
                 WHERE schemaname = current_schema() AND tablename LIKE $1",
                &[&format!("{PICKS_TABLE_PREFIX}%")],
            )
            .map_err(db_err)?;
        let mut dropped = 0;
        for row in rows {
            let table: String = row.get(0);
            let Some(table_date) = picks_table_date(&table) else {
                continue;
            };
            if table_date < keep_before {
                let drop = format!("DROP TABLE IF EXISTS {table}");
                conn.execute(drop.as_str(), &[]).map_err(db_err)?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }
}

impl MarketCapStorePort for PostgresAdapter {
    fn load(&self, code: &str) -> Result<Option<(NaiveDate, Option<f64>)>, ScreenerError> {
        let row = self
            .conn()?
            .query_opt(
                "SELECT snapshot_date, market_cap FROM stock_market_cap WHERE code = $1",
                &[&code],
            )
            .map_err(db_err)?;
        Ok(row.map(|r| (r.get(0), r.get(1))))
    }

    fn save(
        &self,
        code: &str,
        snapshot_date: NaiveDate,
        value: Option<f64>,
    ) -> Result<(), ScreenerError> {
        self.conn()?
            .execute(
                "INSERT INTO stock_market_cap (code, snapshot_date, market_cap) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (code) DO UPDATE SET \
                   snapshot_date = EXCLUDED.snapshot_date, \
                   market_cap = EXCLUDED.market_cap",
                &[&code, &snapshot_date, &value],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

/// Advisory locks are session scoped, so the lock keeps its own dedicated
/// connection instead of borrowing from the pool.
pub struct PgAdvisoryLock {
    client: RefCell<postgres::Client>,
    key: i64,
}

/// Fixed lock key for the daily pipeline.
pub const PIPELINE_LOCK_KEY: i64 = 0x7464_7873_6372_6e31;

impl PgAdvisoryLock {
    pub fn from_config(config: &dyn ConfigPort, key: i64) -> Result<Self, ScreenerError> {
        let client = postgres::Client::connect(&conninfo(config)?, NoTls).map_err(db_err)?;
        Ok(Self {
            client: RefCell::new(client),
            key,
        })
    }
}

impl AdvisoryLock for PgAdvisoryLock {
    fn try_acquire(&self) -> Result<bool, ScreenerError> {
        let row = self
            .client
            .borrow_mut()
            .query_one("SELECT pg_try_advisory_lock($1)", &[&self.key])
            .map_err(db_err)?;
        Ok(row.get(0))
    }

    fn release(&self) -> Result<(), ScreenerError> {
        self.client
            .borrow_mut()
            .execute("SELECT pg_advisory_unlock($1)", &[&self.key])
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_table_name_embeds_the_day() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert_eq!(picks_table_name(d), "stock_pick_results_20240605");
    }

    #[test]
    fn picks_table_date_round_trips() {
        let d = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();
        assert_eq!(picks_table_date(&picks_table_name(d)), Some(d));
        assert_eq!(picks_table_date("stock_pick_results_notadate"), None);
        assert_eq!(picks_table_date("other_table"), None);
    }
}

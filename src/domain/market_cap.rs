//! Market-cap lookup with two cache tiers.
//!
//! Lookup order: in-process TTL cache, then the daily store snapshot, then
//! the outbound provider. A provider failure is logged and degrades to
//! `None`; the screener can always run without market caps. Whatever the
//! provider answered, including nothing, is written back to the store so
//! the next run does not repeat the call.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::domain::error::ScreenerError;
use crate::ports::market_cap_port::{Clock, MarketCapProviderPort, MarketCapStorePort};

pub struct MarketCapCache<'a> {
    clock: &'a dyn Clock,
    store: &'a dyn MarketCapStorePort,
    provider: &'a dyn MarketCapProviderPort,
    ttl: Duration,
    max_age_days: i64,
    memory: Mutex<HashMap<String, (DateTime<Utc>, Option<f64>)>>,
}

impl<'a> MarketCapCache<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        store: &'a dyn MarketCapStorePort,
        provider: &'a dyn MarketCapProviderPort,
        ttl: Duration,
        max_age_days: i64,
    ) -> Self {
        Self {
            clock,
            store,
            provider,
            ttl,
            max_age_days,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Total market cap for `code`, or `None` when no source knows it.
    /// Store errors propagate; provider errors do not.
    pub fn get(&self, code: &str) -> Result<Option<f64>, ScreenerError> {
        let now = self.clock.now();
        if let Ok(memory) = self.memory.lock() {
            if let Some((cached_at, value)) = memory.get(code) {
                if now - *cached_at < self.ttl {
                    return Ok(*value);
                }
            }
        }

        let today = now.date_naive();
        if let Some((snapshot_date, value)) = self.store.load(code)? {
            if (today - snapshot_date).num_days() <= self.max_age_days {
                self.remember(code, now, value);
                return Ok(value);
            }
        }

        let value = match self.provider.fetch(code) {
            Ok(v) => v,
            Err(e) => {
                warn!("market cap lookup failed for {code}: {e}");
                None
            }
        };
        self.store.save(code, today, value)?;
        self.remember(code, now, value);
        Ok(value)
    }

    fn remember(&self, code: &str, at: DateTime<Utc>, value: Option<f64>) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(code.to_string(), (at, value));
        }
    }
}

//! Split stage: group match records into pools keyed by one field.
//!
//! Each pool is reshaped from "list of records" to "field -> list of values",
//! keeping match order inside every value list.

use crate::filter::Record;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Pool key used when no split key is configured.
pub const IMPLICIT_POOL: &str = "";

/// One group of records: field name -> values in match order.
pub type Pool = BTreeMap<String, Vec<String>>;

/// Pool key -> pool.
pub type Pools = BTreeMap<String, Pool>;

/// Which pools survive the split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Keep pools whose key is listed.
    ByList(BTreeSet<String>),
    /// Keep pools whose key lies in `from..=to`.
    ///
    /// Keys and bounds compare as numbers when all three parse as numbers,
    /// otherwise as text.
    ByRange { from: String, to: String },
}

impl Selector {
    pub fn selects(&self, key: &str) -> bool {
        match self {
            Self::ByList(keys) => keys.contains(key),
            Self::ByRange { from, to } => {
                compare_keys(from, key) != Ordering::Greater
                    && compare_keys(key, to) != Ordering::Greater
            }
        }
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

/// Split configuration resolved once per pipeline.
#[derive(Debug, Clone, Default)]
pub struct Splitter {
    key: Option<String>,
    select: Option<Selector>,
}

impl Splitter {
    pub fn new(key: Option<String>, select: Option<Selector>) -> Self {
        Self { key, select }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Group `records` into pools.
    ///
    /// No records is a valid outcome and yields no pools. With a key
    /// configured, every record must carry it.
    pub fn split(&self, records: Vec<Record>) -> Result<Pools> {
        let mut pools = Pools::new();

        for record in records {
            let pool_key = match &self.key {
                None => IMPLICIT_POOL.to_string(),
                Some(key) => record.get(key).cloned().ok_or_else(|| Error::SplitKey {
                    key: key.clone(),
                    fields: record.keys().cloned().collect(),
                })?,
            };

            if let Some(select) = &self.select
                && !select.selects(&pool_key)
            {
                continue;
            }

            let pool = pools.entry(pool_key).or_default();
            for (field, value) in record {
                pool.entry(field).or_default().push(value);
            }
        }

        tracing::debug!(pools = pools.len(), "split records into pools");
        Ok(pools)
    }
}

/// Group `records` by the value of `key`, with no pool selection.
pub fn split(records: Vec<Record>, key: &str) -> Result<Pools> {
    Splitter::new(Some(key.to_string()), None).split(records)
}

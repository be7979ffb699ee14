//! Apply stage: reduce every pool's field values with the configured transforms.

pub mod reduction;

pub use reduction::{NotNumeric, Reduction};

use crate::split::Pools;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pool key -> field -> reduced value.
pub type Output = BTreeMap<String, BTreeMap<String, Value>>;

/// Field name -> resolved reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transforms {
    by_field: BTreeMap<String, Reduction>,
}

impl Transforms {
    /// Resolve the `apply` mapping against the reduction registry.
    pub fn resolve(apply: &BTreeMap<String, String>) -> Result<Self> {
        let mut by_field = BTreeMap::new();
        for (field, name) in apply {
            let reduction = Reduction::from_name(name).ok_or_else(|| Error::UnknownTransform {
                field: field.clone(),
                name: name.clone(),
                known: Reduction::names(),
            })?;
            by_field.insert(field.clone(), reduction);
        }
        Ok(Self { by_field })
    }

    pub fn get(&self, field: &str) -> Option<Reduction> {
        self.by_field.get(field).copied()
    }

    /// Reduce each pool. Fields without a transform are dropped.
    pub fn apply(&self, pools: Pools) -> Result<Output> {
        let mut out = Output::new();
        for (pool_key, pool) in pools {
            let mut reduced = BTreeMap::new();
            for (field, values) in pool {
                let Some(reduction) = self.get(&field) else {
                    continue;
                };
                let value = reduction.reduce(&values).map_err(|NotNumeric(value)| {
                    Error::Reduction {
                        field: field.clone(),
                        transform: reduction.name(),
                        value,
                    }
                })?;
                reduced.insert(field, value);
            }
            out.insert(pool_key, reduced);
        }
        Ok(out)
    }
}

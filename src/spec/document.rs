//! Typed specification built from a validated document.
//!
//! We keep two representations:
//! - RawSpecification: serde-friendly mirror of the JSON document
//! - Specification: validated, with flags resolved and the selector typed

use crate::spec::schema::{FilterFlag, Schema};
use crate::split::Selector;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct RawSpecification {
    name: String,
    interval: Number,
    command: Vec<String>,
    filter: RawFilter,
    #[serde(default)]
    split: RawSplit,
    apply: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFilter {
    pattern: String,
    #[serde(default)]
    flags: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSplit {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    select: Option<RawSelect>,
}

/// Pool selection as it appears in the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawSelect {
    // "select": ["sda", "sdb"]
    Keys(Vec<String>),
    // "select": { "from": 1, "to": 4 }
    Range { from: RawBound, to: RawBound },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawBound {
    Text(String),
    Number(Number),
}

impl RawBound {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Matching options resolved from `filter.flags`. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterFlags {
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub case_insensitive: bool,
    pub ignore_whitespace: bool,
    pub ascii: bool,
}

impl FilterFlags {
    pub fn set(&mut self, flag: FilterFlag) {
        match flag {
            FilterFlag::MultiLine => self.multi_line = true,
            FilterFlag::DotMatchesNewLine => self.dot_matches_new_line = true,
            FilterFlag::CaseInsensitive => self.case_insensitive = true,
            FilterFlag::IgnoreWhitespace => self.ignore_whitespace = true,
            FilterFlag::Ascii => self.ascii = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub pattern: String,
    pub flags: FilterFlags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitSpec {
    /// Field whose value names the pool. `None` puts every record in one pool.
    pub key: Option<String>,
    pub select: Option<Selector>,
}

/// Immutable configuration of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    pub name: String,
    /// Seconds between runs, kept as written so it round-trips to the caller.
    pub interval: Number,
    pub command: Vec<String>,
    pub filter: FilterSpec,
    pub split: SplitSpec,
    /// Field name -> transform name.
    pub apply: BTreeMap<String, String>,
}

impl Specification {
    /// Validate `doc` against the default schema and build a specification.
    pub fn from_value(doc: &Value) -> Result<Self> {
        Self::from_value_with(&Schema::default(), doc)
    }

    /// Validate `doc` against `schema` and build a specification.
    pub fn from_value_with(schema: &Schema, doc: &Value) -> Result<Self> {
        schema.validate(doc)?;

        let raw: RawSpecification = serde_json::from_value(doc.clone())
            .map_err(|e| Error::schema("/", e.to_string()))?;

        let mut flags = FilterFlags::default();
        for (name, enabled) in &raw.filter.flags {
            if !enabled {
                continue;
            }
            let flag = schema.flag(name).ok_or_else(|| {
                Error::schema(format!("/filter/flags/{name}"), "unrecognized flag")
            })?;
            flags.set(flag);
        }

        let select = raw.split.select.map(|select| match select {
            RawSelect::Keys(keys) => Selector::ByList(keys.into_iter().collect::<BTreeSet<_>>()),
            RawSelect::Range { from, to } => Selector::ByRange {
                from: from.into_string(),
                to: to.into_string(),
            },
        });

        Ok(Self {
            name: raw.name,
            interval: raw.interval,
            command: raw.command,
            filter: FilterSpec {
                pattern: raw.filter.pattern,
                flags,
            },
            split: SplitSpec {
                key: raw.split.key,
                select,
            },
            apply: raw.apply,
        })
    }

    /// The scheduling period. The engine never sleeps on it; callers do.
    ///
    /// Intervals too large for a [`Duration`] saturate to [`Duration::MAX`].
    pub fn interval(&self) -> Duration {
        let secs = self.interval.as_f64().unwrap_or_default();
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

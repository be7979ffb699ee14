//! Closed registry of reductions a specification may name in `apply`.
//!
//! Transform names resolve to a [`Reduction`] variant or not at all; nothing
//! in a specification is ever evaluated as code.

use serde_json::{Number, Value};
use std::collections::BTreeSet;

/// A named reduction over one field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Average,
    Min,
    Max,
    Count,
    Distinct,
    First,
    Last,
    Concat,
    List,
}

/// A value that a numeric reduction could not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotNumeric(pub String);

impl Reduction {
    pub const ALL: [Self; 10] = [
        Self::Sum,
        Self::Average,
        Self::Min,
        Self::Max,
        Self::Count,
        Self::Distinct,
        Self::First,
        Self::Last,
        Self::Concat,
        Self::List,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::Distinct => "distinct",
            Self::First => "first",
            Self::Last => "last",
            Self::Concat => "concat",
            Self::List => "list",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.into_iter().map(Self::name).collect()
    }

    /// Reduce `values` to a single JSON value.
    ///
    /// Empty input gives the reduction's default: `0` for sum and the
    /// counters, `null` for average/min/max, `""` for the text reductions
    /// and `[]` for list.
    pub fn reduce(self, values: &[String]) -> Result<Value, NotNumeric> {
        Ok(match self {
            Self::Count => Value::from(values.len()),
            Self::Distinct => Value::from(values.iter().collect::<BTreeSet<_>>().len()),
            Self::First => Value::from(values.first().cloned().unwrap_or_default()),
            Self::Last => Value::from(values.last().cloned().unwrap_or_default()),
            Self::Concat => Value::from(values.concat()),
            Self::List => Value::from(values.to_vec()),
            Self::Sum => sum(&parse_all(values)?),
            Self::Average => {
                let nums = parse_all(values)?;
                if nums.is_empty() {
                    Value::Null
                } else {
                    let total: f64 = nums.iter().map(Num::as_f64).sum();
                    float(total / nums.len() as f64)
                }
            }
            Self::Min => extreme(parse_all(values)?, |a, b| a < b),
            Self::Max => extreme(parse_all(values)?, |a, b| a > b),
        })
    }
}

/// A parsed value; integers stay exact until a float forces widening.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Self::Int(i) => Value::from(i),
            Self::Float(f) => float(f),
        }
    }
}

fn parse_all(values: &[String]) -> Result<Vec<Num>, NotNumeric> {
    values.iter().map(|v| parse(v)).collect()
}

fn parse(value: &str) -> Result<Num, NotNumeric> {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Num::Int(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Num::Float(f)),
        _ => Err(NotNumeric(value.to_string())),
    }
}

fn sum(nums: &[Num]) -> Value {
    let mut int_total: Option<i64> = Some(0);
    for n in nums {
        int_total = match (int_total, n) {
            (Some(acc), Num::Int(i)) => acc.checked_add(*i),
            _ => None,
        };
    }
    match int_total {
        Some(total) => Value::from(total),
        None => float(nums.iter().map(Num::as_f64).sum()),
    }
}

fn extreme(nums: Vec<Num>, better: impl Fn(f64, f64) -> bool) -> Value {
    nums.into_iter()
        .reduce(|best, n| if better(n.as_f64(), best.as_f64()) { n } else { best })
        .map(Num::to_value)
        .unwrap_or(Value::Null)
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn reduce(name: &str, values: &[&str]) -> Value {
        Reduction::from_name(name)
            .expect("registered")
            .reduce(&strings(values))
            .expect("reducible")
    }

    #[test]
    fn every_name_round_trips() {
        for r in Reduction::ALL {
            assert_eq!(Reduction::from_name(r.name()), Some(r));
        }
        assert_eq!(Reduction::from_name("lambda x: sum(x)"), None);
    }

    #[test]
    fn sum_of_integers_stays_integer() {
        assert_eq!(reduce("sum", &["1", "3"]), json!(4));
        assert_eq!(reduce("sum", &[" 10 ", "-2"]), json!(8));
    }

    #[test]
    fn sum_widens_to_float() {
        assert_eq!(reduce("sum", &["1.5", "2"]), json!(3.5));
    }

    #[test]
    fn counters() {
        assert_eq!(reduce("count", &[]), json!(0));
        assert_eq!(reduce("count", &["a", "b", "a"]), json!(3));
        assert_eq!(reduce("distinct", &["a", "b", "a"]), json!(2));
    }

    #[test]
    fn average_min_max() {
        assert_eq!(reduce("average", &["1", "2"]), json!(1.5));
        assert_eq!(reduce("min", &["4", "-1.5", "3"]), json!(-1.5));
        assert_eq!(reduce("max", &["4", "-1.5", "3"]), json!(4));
    }

    #[test]
    fn text_reductions() {
        assert_eq!(reduce("first", &["a", "b"]), json!("a"));
        assert_eq!(reduce("last", &["a", "b"]), json!("b"));
        assert_eq!(reduce("concat", &["a", "b"]), json!("ab"));
        assert_eq!(reduce("list", &["a", "b"]), json!(["a", "b"]));
    }

    #[test]
    fn empty_input_defaults() {
        assert_eq!(reduce("sum", &[]), json!(0));
        assert_eq!(reduce("distinct", &[]), json!(0));
        assert_eq!(reduce("average", &[]), Value::Null);
        assert_eq!(reduce("min", &[]), Value::Null);
        assert_eq!(reduce("max", &[]), Value::Null);
        assert_eq!(reduce("first", &[]), json!(""));
        assert_eq!(reduce("last", &[]), json!(""));
        assert_eq!(reduce("concat", &[]), json!(""));
        assert_eq!(reduce("list", &[]), json!([]));
    }

    #[test]
    fn numeric_reductions_reject_text() {
        let err = Reduction::Sum
            .reduce(&strings(&["1", "12G"]))
            .expect_err("not a number");
        assert_eq!(err, NotNumeric("12G".to_string()));
        assert!(Reduction::Max.reduce(&strings(&["NaN"])).is_err());
    }
}

//! Structural validation of specification documents.
//!
//! Validation checks shape only: member presence and JSON types, plus the
//! closed set of filter flag names. Cross-field consistency (does the split
//! key name a pattern group? does a transform exist?) is left to pipeline
//! construction and run time.
//!
//! JSON shape:
//! {
//!   "name": "disk",
//!   "interval": 60,
//!   "command": ["df", "-h"],
//!   "filter": {
//!     "pattern": "^(?<dev>/dev/\\S+)\\s+(?<size>\\S+)",
//!     "flags": { "multiline": true }
//!   },
//!   "split": { "key": "dev" },          // optional
//!   "apply": { "size": "first" }
//! }

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Matching option toggled by a filter flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFlag {
    MultiLine,
    DotMatchesNewLine,
    CaseInsensitive,
    IgnoreWhitespace,
    Ascii,
}

/// The structural contract a specification document must satisfy.
///
/// Built once and passed by reference to whatever validates documents.
#[derive(Debug, Clone)]
pub struct Schema {
    flags: BTreeMap<String, FilterFlag>,
}

impl Default for Schema {
    fn default() -> Self {
        let flags = [
            ("multiline", FilterFlag::MultiLine),
            ("dotall", FilterFlag::DotMatchesNewLine),
            ("insensitive", FilterFlag::CaseInsensitive),
            // Spelling used by existing specification files.
            ("intensive", FilterFlag::CaseInsensitive),
            ("extended", FilterFlag::IgnoreWhitespace),
            ("ascii", FilterFlag::Ascii),
        ]
        .into_iter()
        .map(|(name, flag)| (name.to_string(), flag))
        .collect();
        Self { flags }
    }
}

impl Schema {
    /// Look up the matching option for a flag name.
    pub fn flag(&self, name: &str) -> Option<FilterFlag> {
        self.flags.get(name).copied()
    }

    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    /// Validate `doc`, failing on the first violation found.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        let root = doc
            .as_object()
            .ok_or_else(|| Error::schema("/", "specification must be an object"))?;

        expect_string(required(root, "", "name")?, "/name")?;
        validate_interval(required(root, "", "interval")?)?;
        validate_command(required(root, "", "command")?)?;
        self.validate_filter(required(root, "", "filter")?)?;
        if let Some(split) = root.get("split") {
            validate_split(split)?;
        }
        validate_apply(required(root, "", "apply")?)?;

        Ok(())
    }

    fn validate_filter(&self, filter: &Value) -> Result<()> {
        let filter = expect_object(filter, "/filter")?;
        expect_string(required(filter, "/filter", "pattern")?, "/filter/pattern")?;

        let Some(flags) = filter.get("flags") else {
            return Ok(());
        };
        for (name, value) in expect_object(flags, "/filter/flags")? {
            let path = format!("/filter/flags/{name}");
            if self.flag(name).is_none() {
                let known: Vec<&str> = self.flag_names().collect();
                return Err(Error::schema(
                    path,
                    format!("unrecognized flag (expected one of: {})", known.join(", ")),
                ));
            }
            if !value.is_boolean() {
                return Err(Error::schema(path, "flag must be a boolean"));
            }
        }
        Ok(())
    }
}

fn validate_interval(interval: &Value) -> Result<()> {
    let secs = interval
        .as_f64()
        .ok_or_else(|| Error::schema("/interval", "must be a number"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::schema(
            "/interval",
            "must be a non-negative number of seconds",
        ));
    }
    Ok(())
}

fn validate_command(command: &Value) -> Result<()> {
    let items = command
        .as_array()
        .ok_or_else(|| Error::schema("/command", "must be an array of strings"))?;
    if items.is_empty() {
        return Err(Error::schema("/command", "must name a program to run"));
    }
    for (i, item) in items.iter().enumerate() {
        expect_string(item, &format!("/command/{i}"))?;
    }
    Ok(())
}

fn validate_split(split: &Value) -> Result<()> {
    let split = expect_object(split, "/split")?;
    if let Some(key) = split.get("key") {
        expect_string(key, "/split/key")?;
    }
    let Some(select) = split.get("select") else {
        return Ok(());
    };
    match select {
        Value::Array(keys) => {
            for (i, key) in keys.iter().enumerate() {
                expect_string(key, &format!("/split/select/{i}"))?;
            }
        }
        Value::Object(range) => {
            for bound in ["from", "to"] {
                let path = format!("/split/select/{bound}");
                match required(range, "/split/select", bound)? {
                    Value::String(_) | Value::Number(_) => {}
                    _ => return Err(Error::schema(path, "must be a string or a number")),
                }
            }
            if let Some(extra) = range.keys().find(|k| *k != "from" && *k != "to") {
                return Err(Error::schema(
                    format!("/split/select/{extra}"),
                    "unexpected member (a range has only from and to)",
                ));
            }
        }
        _ => {
            return Err(Error::schema(
                "/split/select",
                "must be a list of keys or a {from, to} range",
            ));
        }
    }
    Ok(())
}

fn validate_apply(apply: &Value) -> Result<()> {
    for (field, name) in expect_object(apply, "/apply")? {
        expect_string(name, &format!("/apply/{field}"))?;
    }
    Ok(())
}

fn required<'a>(object: &'a Map<String, Value>, parent: &str, member: &str) -> Result<&'a Value> {
    object
        .get(member)
        .ok_or_else(|| Error::schema(format!("{parent}/{member}"), "missing required member"))
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::schema(path, "must be an object"))
}

fn expect_string<'a>(value: &'a Value, path: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::schema(path, "must be a string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "name": "disk",
            "interval": 60,
            "command": ["df", "-h"],
            "filter": {
                "pattern": "(?<dev>/dev/\\S+)\\s+(?<size>\\S+)",
                "flags": { "multiline": true, "intensive": false }
            },
            "split": { "key": "dev" },
            "apply": { "size": "first" }
        })
    }

    fn schema_path(doc: &Value) -> String {
        match Schema::default().validate(doc) {
            Err(Error::Schema { path, .. }) => path,
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_complete_document() {
        Schema::default().validate(&valid()).expect("valid document");
    }

    #[test]
    fn accepts_document_without_split_or_flags() {
        let mut doc = valid();
        doc.as_object_mut().expect("object").remove("split");
        doc["filter"].as_object_mut().expect("object").remove("flags");
        Schema::default().validate(&doc).expect("split and flags are optional");
    }

    #[test]
    fn ignores_unrelated_members() {
        let mut doc = valid();
        doc["tray"] = json!({ "icon": "disk.png" });
        Schema::default().validate(&doc).expect("extra members are ignored");
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(schema_path(&json!(["not", "a", "spec"])), "/");
    }

    #[test]
    fn rejects_missing_command() {
        let mut doc = valid();
        doc.as_object_mut().expect("object").remove("command");
        assert_eq!(schema_path(&doc), "/command");
    }

    #[test]
    fn rejects_unrecognized_flag() {
        let mut doc = valid();
        doc["filter"]["flags"]["verbose"] = json!(true);
        assert_eq!(schema_path(&doc), "/filter/flags/verbose");
    }

    #[test]
    fn rejects_non_boolean_flag() {
        let mut doc = valid();
        doc["filter"]["flags"]["dotall"] = json!("yes");
        assert_eq!(schema_path(&doc), "/filter/flags/dotall");
    }

    #[test]
    fn rejects_wrongly_typed_members() {
        let cases = [
            ("name", json!(7), "/name"),
            ("interval", json!("60"), "/interval"),
            ("interval", json!(-1), "/interval"),
            ("command", json!("df -h"), "/command"),
            ("command", json!([]), "/command"),
            ("command", json!(["df", 1]), "/command/1"),
            ("filter", json!({ "flags": {} }), "/filter/pattern"),
            ("split", json!({ "key": 3 }), "/split/key"),
            ("apply", json!({ "size": 1 }), "/apply/size"),
        ];
        for (member, value, expected) in cases {
            let mut doc = valid();
            doc[member] = value;
            assert_eq!(schema_path(&doc), expected, "member {member}");
        }
    }

    #[test]
    fn negative_interval_is_rejected_as_such() {
        let mut doc = valid();
        doc["interval"] = json!(-0.5);
        let err = Schema::default().validate(&doc).expect_err("negative interval");
        assert_eq!(
            err.to_string(),
            "schema error at /interval: must be a non-negative number of seconds"
        );
    }

    #[test]
    fn first_violation_wins() {
        let doc = json!({ "name": 1, "interval": "x" });
        assert_eq!(schema_path(&doc), "/name");
    }

    #[test]
    fn select_accepts_list_or_range() {
        for select in [json!(["a", "b"]), json!({ "from": 1, "to": "9" })] {
            let mut doc = valid();
            doc["split"]["select"] = select;
            Schema::default().validate(&doc).expect("valid selector");
        }
    }

    #[test]
    fn select_rejects_malformed_range() {
        let mut doc = valid();
        doc["split"]["select"] = json!({ "from": 1 });
        assert_eq!(schema_path(&doc), "/split/select/to");

        doc["split"]["select"] = json!({ "from": 1, "to": 2, "step": 1 });
        assert_eq!(schema_path(&doc), "/split/select/step");

        doc["split"]["select"] = json!(true);
        assert_eq!(schema_path(&doc), "/split/select");
    }
}

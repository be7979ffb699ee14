//! Filter stage: turn command output into match records.
//!
//! The pattern's named capture groups become record fields. A pattern with
//! no named groups still produces one field per match, holding the whole
//! match under [`WHOLE_MATCH_FIELD`].

use crate::spec::FilterFlags;
use crate::{Error, Result};
use regex::bytes::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// Field name used for the whole match when the pattern names no groups.
///
/// Group names cannot start with a digit, so this never shadows a group.
pub const WHOLE_MATCH_FIELD: &str = "0";

/// One match: field name -> captured text.
pub type Record = BTreeMap<String, String>;

/// Compiled pattern plus the field names it produces.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    fields: Vec<String>,
}

impl Matcher {
    /// Compile `pattern` with `flags`.
    ///
    /// Patterns mixing named and unnamed capturing groups are rejected: only
    /// named groups are addressable, use `(?:...)` to group without capturing.
    pub fn compile(pattern: &str, flags: FilterFlags) -> Result<Self> {
        // Unicode stays on so `.` and literal classes match whole characters;
        // `ascii` only narrows the Perl classes. The bytes API admits the ASCII
        // word-boundary assertions that rewrite produces.
        let source = if flags.ascii {
            ascii_perl_classes(pattern, flags.ignore_whitespace)
        } else {
            pattern.to_string()
        };
        let regex = RegexBuilder::new(&source)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .case_insensitive(flags.case_insensitive)
            .ignore_whitespace(flags.ignore_whitespace)
            .build()
            .map_err(|e| Error::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        let fields: Vec<String> = regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect();

        // capture_names() includes the implicit whole-match group.
        let unnamed = regex.captures_len() - 1 - fields.len();
        if !fields.is_empty() && unnamed > 0 {
            return Err(Error::Pattern {
                pattern: pattern.to_string(),
                message: format!(
                    "pattern mixes named groups with {unnamed} unnamed capturing group(s); \
                     name every group or use (?:...)"
                ),
            });
        }

        Ok(Self { regex, fields })
    }

    /// Field names of every record this matcher produces, in pattern order.
    pub fn fields(&self) -> Vec<&str> {
        if self.fields.is_empty() {
            vec![WHOLE_MATCH_FIELD]
        } else {
            self.fields.iter().map(String::as_str).collect()
        }
    }

    /// All non-overlapping matches in `text`, left to right.
    ///
    /// A named group that did not take part in a match is recorded as an
    /// empty string so every record has the same fields.
    pub fn find_all(&self, text: &str) -> Vec<Record> {
        let haystack = text.as_bytes();

        if self.fields.is_empty() {
            return self
                .regex
                .find_iter(haystack)
                .map(|m| Record::from([(WHOLE_MATCH_FIELD.to_string(), decode(m.as_bytes()))]))
                .collect();
        }

        self.regex
            .captures_iter(haystack)
            .map(|caps| {
                self.fields
                    .iter()
                    .map(|field| {
                        let value = caps
                            .name(field)
                            .map(|m| decode(m.as_bytes()))
                            .unwrap_or_default();
                        (field.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Rewrite `\w \d \s \b` and their negations to ASCII-only forms.
///
/// Negated classes keep matching any non-ASCII character as a whole, so no
/// consuming piece of the rewritten pattern can stop inside a UTF-8 sequence.
fn ascii_perl_classes(pattern: &str, extended: bool) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut chars = pattern.chars().peekable();
    // Nesting depth of `[...]` classes.
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    out.push(c);
                    break;
                };
                match ascii_class(escaped, depth > 0) {
                    Some(replacement) => out.push_str(replacement),
                    None => {
                        out.push(c);
                        out.push(escaped);
                    }
                }
            }
            '[' => {
                depth += 1;
                out.push(c);
                if chars.peek() == Some(&'^') {
                    out.extend(chars.next());
                }
                // A `]` right after the opening bracket is a literal.
                if chars.peek() == Some(&']') {
                    out.extend(chars.next());
                }
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(c);
            }
            '#' if extended && depth == 0 => {
                out.push(c);
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn ascii_class(escaped: char, in_class: bool) -> Option<&'static str> {
    let replacement = match (escaped, in_class) {
        ('w', false) => "[[:word:]]",
        ('W', false) => "[[:^word:]]",
        ('d', false) => "[[:digit:]]",
        ('D', false) => "[[:^digit:]]",
        ('s', false) => "[[:space:]]",
        ('S', false) => "[[:^space:]]",
        ('b', false) => r"(?-u:\b)",
        ('B', false) => r"(?-u:\B)",
        ('w', true) => "[:word:]",
        ('W', true) => "[:^word:]",
        ('d', true) => "[:digit:]",
        ('D', true) => "[:^digit:]",
        ('s', true) => "[:space:]",
        ('S', true) => "[:^space:]",
        _ => return None,
    };
    Some(replacement)
}

//! Best-effort parsing of `|`-delimited engine listings.
//!
//! The engine is asked for a fixed field list via `--format`, but nothing
//! guarantees every row carries every field.  Rows are never rejected:
//! record constructors substitute defaults and say which fields they
//! substituted through [`Parsed`].

use log::debug;

/// Field separator used in every `--format` template.
pub const FIELD_SEPARATOR: char = '|';

/// A record parsed from one row, flagged when defaults had to be filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Complete(T),
    Degraded {
        record: T,
        /// Names of the fields that were absent or empty.
        missing: Vec<&'static str>,
    },
}

impl<T> Parsed<T> {
    pub fn new(record: T, missing: Vec<&'static str>) -> Self {
        if missing.is_empty() {
            Parsed::Complete(record)
        } else {
            Parsed::Degraded { record, missing }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Parsed::Complete(_))
    }

    pub fn missing(&self) -> &[&'static str] {
        match self {
            Parsed::Complete(_) => &[],
            Parsed::Degraded { missing, .. } => missing,
        }
    }

    pub fn record(&self) -> &T {
        match self {
            Parsed::Complete(record) | Parsed::Degraded { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Parsed::Complete(record) | Parsed::Degraded { record, .. } => record,
        }
    }
}

/// The fields of a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields<'a> {
    values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    /// Split `line` into at most `expected` fields.  The last field keeps any
    /// further separators, since label blobs are free text.
    pub fn split(line: &'a str, expected: usize) -> Self {
        let values = line
            .splitn(expected.max(1), FIELD_SEPARATOR)
            .map(str::trim)
            .collect();
        Self { values }
    }

    /// The field at `index`, or `None` when it is absent or blank.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.values
            .get(index)
            .copied()
            .filter(|value| !value.is_empty())
    }

    /// Like [`Fields::get`], but records `name` in `missing` and yields `""`.
    pub fn text(
        &self,
        index: usize,
        name: &'static str,
        missing: &mut Vec<&'static str>,
    ) -> &'a str {
        match self.get(index) {
            Some(value) => value,
            None => {
                missing.push(name);
                ""
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Iterate over the non-blank rows of `stdout`.
pub fn split_rows(stdout: &str, expected: usize) -> impl Iterator<Item = Fields<'_>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(move |line| Fields::split(line, expected))
}

/// Parse every row of `stdout` with `build`, logging degraded rows.
pub fn parse_rows<T>(
    stdout: &str,
    expected: usize,
    build: impl Fn(&Fields<'_>) -> Parsed<T>,
) -> Vec<Parsed<T>> {
    split_rows(stdout, expected)
        .map(|fields| {
            let parsed = build(&fields);
            if !parsed.is_complete() {
                debug!(
                    "Row with {} of {} fields, defaulted {:?}",
                    fields.len(),
                    expected,
                    parsed.missing()
                );
            }
            parsed
        })
        .collect()
}

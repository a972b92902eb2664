// cablemodem - scrape DOCSIS cable modem diagnostic pages
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Flattening of parsed tables into one lookup map per page.
//!
//! Several tables on the signal page reuse the same labels (one table per
//! channel direction), so key/value entries are suffixed with the index of the
//! table they came from: `Power Level_0`, `Power Level_1`, ...

use crate::error::ModemError;
use crate::tables::Table;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Rows(Vec<Vec<String>>),
}

/// Flattened view of every table on a page, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldValue>);

pub fn flatten(tables: &[Table]) -> Fields {
    let mut out = BTreeMap::new();
    for (index, table) in tables.iter().enumerate() {
        match table {
            Table::KeyValue(fields) => {
                for (key, value) in fields {
                    out.insert(format!("{key}_{index}"), FieldValue::Text(value.clone()));
                }
            }
            Table::Ordered(rows) => {
                let Some(header) = rows.first().and_then(|row| row.first()) else {
                    continue;
                };
                out.insert(
                    format!("{header}_list"),
                    FieldValue::Rows(rows[1..].to_vec()),
                );
            }
        }
    }
    Fields(out)
}

impl Fields {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, key: &str) -> Result<&str, ModemError> {
        match self.0.get(key) {
            Some(FieldValue::Text(value)) => Ok(value),
            Some(FieldValue::Rows(_)) => Err(ModemError::Parse(format!(
                "`{key}` is a table, expected a single value"
            ))),
            None => Err(ModemError::MissingField(key.to_string())),
        }
    }

    pub fn rows(&self, key: &str) -> Result<&[Vec<String>], ModemError> {
        match self.0.get(key) {
            Some(FieldValue::Rows(rows)) => Ok(rows),
            Some(FieldValue::Text(_)) => Err(ModemError::Parse(format!(
                "`{key}` is a single value, expected a table"
            ))),
            None => Err(ModemError::MissingField(key.to_string())),
        }
    }

    /// Table suffix (`""`, `"_0"`, `"_1"`, ...) of the last key/value entry
    /// starting with `prefix`. Keys are scanned in sorted order; grid tables
    /// are ignored.
    pub fn suffix_for(&self, prefix: &str) -> &str {
        self.0
            .iter()
            .rev()
            .find(|(key, value)| {
                matches!(value, FieldValue::Text(_)) && key.starts_with(prefix)
            })
            .map(|(key, _)| table_suffix(key))
            .unwrap_or("")
    }

    /// Value of the key/value entry labelled `name`, from the first table that
    /// has it. A trailing `:` on the label is ignored.
    pub fn metric(&self, name: &str) -> Result<&str, ModemError> {
        self.0
            .iter()
            .filter_map(|(key, value)| match value {
                FieldValue::Text(text) => {
                    let suffix = table_suffix(key);
                    let label = key[..key.len() - suffix.len()].trim_end_matches(':');
                    let index: usize = suffix.trim_start_matches('_').parse().ok()?;
                    (label == name).then_some((index, text.as_str()))
                }
                FieldValue::Rows(_) => None,
            })
            .min_by_key(|(index, _)| *index)
            .map(|(_, text)| text)
            .ok_or_else(|| ModemError::MissingField(name.to_string()))
    }
}

fn table_suffix(key: &str) -> &str {
    match key.rfind('_') {
        Some(pos)
            if pos + 1 < key.len() && key[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &key[pos..]
        }
        _ => "",
    }
}

fn first_token<'a>(field: &str, value: &'a str) -> Result<&'a str, ModemError> {
    value
        .split_whitespace()
        .next()
        .ok_or_else(|| ModemError::bad_measurement(field, value))
}

/// Leading integer of a `"<number> <unit>"` measurement.
pub fn leading_int(field: &str, value: &str) -> Result<u64, ModemError> {
    first_token(field, value)?
        .parse()
        .map_err(|_| ModemError::bad_measurement(field, value))
}

/// Leading decimal of a `"<number> <unit>"` measurement.
pub fn leading_float(field: &str, value: &str) -> Result<f64, ModemError> {
    first_token(field, value)?
        .parse()
        .map_err(|_| ModemError::bad_measurement(field, value))
}

pub fn unit<'a>(field: &str, value: &'a str) -> Result<&'a str, ModemError> {
    value
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ModemError::bad_measurement(field, value))
}

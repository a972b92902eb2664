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

//! HTML table extraction for the modem's diagnostic pages.
//!
//! The vendor pages lay out every measurement as a `<table>`: either two-cell
//! `label | value` rows, or a grid whose first row is a header. Each table is
//! reduced to a [`Table`] in document order so that indices stay stable.

use crate::client::RawPage;
use crate::error::ModemError;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;

/// One `<table>` from a page, classified by the shape of its first data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
    /// Two-cell rows: label → value.
    KeyValue(BTreeMap<String, String>),
    /// Three or more cells per row, in document order. Row 0 is the header.
    Ordered(Vec<Vec<String>>),
}

impl Table {
    fn empty() -> Self {
        Table::KeyValue(BTreeMap::new())
    }
}

/// Parses every `<table>` of `page`.
///
/// Tables without any data row come back as an empty `KeyValue` table so the
/// position of each table in the result matches its position in the document.
pub fn parse(page: &RawPage) -> Result<Vec<Table>, ModemError> {
    let document = Html::parse_document(page.as_str());
    let tables = selector("table")?;
    let rows = selector("tr")?;
    let cells = selector("td")?;

    Ok(document
        .select(&tables)
        .map(|table| parse_table(table, &rows, &cells))
        .collect())
}

/// Strips surrounding non-breaking spaces, drops newlines and collapses runs
/// of whitespace into single spaces.
pub fn clean(raw: &str) -> String {
    raw.trim_matches('\u{a0}')
        .replace('\n', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_table(table: ElementRef<'_>, rows: &Selector, cells: &Selector) -> Table {
    let mut parsed: Option<Table> = None;

    for (index, row) in table.select(rows).enumerate() {
        let mut values: Vec<String> = row.select(cells).map(last_text).collect();
        if values.len() < 2 {
            // section headers and spacer rows
            continue;
        }

        let current = parsed.get_or_insert_with(|| {
            if values.len() == 2 {
                Table::empty()
            } else {
                Table::Ordered(Vec::new())
            }
        });

        match current {
            Table::KeyValue(fields) if values.len() == 2 => {
                let value = values.swap_remove(1);
                let key = values.swap_remove(0);
                fields.insert(key, value);
            }
            Table::Ordered(grid) if values.len() > 2 => grid.push(values),
            _ => debug!(
                row = index,
                cells = values.len(),
                "dropping row that does not match the table shape"
            ),
        }
    }

    parsed.unwrap_or_else(Table::empty)
}

/// Only the final text node counts; the vendor markup wraps labels in spans
/// ahead of the value.
fn last_text(cell: ElementRef<'_>) -> String {
    cell.text().last().map(clean).unwrap_or_default()
}

fn selector(css: &str) -> Result<Selector, ModemError> {
    Selector::parse(css).map_err(|e| ModemError::Parse(format!("selector `{css}`: {e:?}")))
}

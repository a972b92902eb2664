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

use crate::fields::{FieldValue, Fields};
use crate::metrics::Direction;
use crate::modem::Report;
use std::fmt::Write;

pub fn render(report: &Report) -> String {
    let mut out = String::new();

    section(&mut out, "Modem Status", &report.modem.entries());
    out.push('\n');
    for signal in [&report.downstream, &report.upstream] {
        let title = format!("{} Signal", signal.direction.label());
        section(&mut out, &title, &signal.entries());
        if signal.direction == Direction::Downstream {
            out.push('\n');
        }
    }

    out.push_str("\nConnected Clients\n");
    for client in &report.clients {
        let _ = writeln!(
            out,
            "    {} (MAC {}, via {})",
            client.ip, client.mac, client.interface
        );
    }

    out.push_str("\nLog Messages\n");
    for message in &report.messages {
        let _ = writeln!(out, "    {} [{}]:", message.time, message.level);
        let _ = writeln!(out, "     * {}", message.message);
    }

    out
}

/// Raw field dump for the Ambit pages, which have no derived views.
pub fn render_fields(title: &str, fields: &Fields) -> String {
    let mut out = format!("{title}\n");
    for (key, value) in fields.iter() {
        match value {
            FieldValue::Text(text) => {
                let _ = writeln!(out, "    {key}: {text}");
            }
            FieldValue::Rows(rows) => {
                let _ = writeln!(out, "    {key}:");
                for row in rows {
                    let _ = writeln!(out, "      - {}", row.join(" | "));
                }
            }
        }
    }
    out
}

fn section(out: &mut String, title: &str, entries: &[(&'static str, String)]) {
    out.push_str(title);
    out.push('\n');
    for (key, value) in entries {
        let _ = writeln!(out, "    {key}: {value}");
    }
}

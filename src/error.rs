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

use thiserror::Error;

/// Everything that can go wrong between the modem's HTTP server and a metric.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} at {url}")]
    HttpStatus { status: u16, url: String },
    #[error("privilege escalation was refused at {url}")]
    EscalationFailed { url: String },
    #[error("unexpected page structure: {0}")]
    Parse(String),
    #[error("field `{field}` has value `{value}`, expected `<number> <unit>`")]
    BadMeasurement { field: String, value: String },
    #[error("field `{0}` not found on the modem page")]
    MissingField(String),
}

impl ModemError {
    pub fn bad_measurement(field: &str, value: &str) -> Self {
        ModemError::BadMeasurement {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

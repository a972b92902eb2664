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

//! Derived views over the flattened `signal`, `status` and `log` pages.

use crate::error::ModemError;
use crate::fields::{Fields, leading_float, leading_int};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Downstream => "Downstream",
            Direction::Upstream => "Upstream",
        }
    }
}

/// One direction of the RF link as shown on the signal page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalView {
    #[serde(skip)]
    pub direction: Direction,
    pub bitrate: String,
    pub bitrate_int: u64,
    pub channel: String,
    pub channel_int: u64,
    pub frequency: String,
    pub frequency_int: u64,
    pub modulation: String,
    pub power: String,
    pub power_float: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_float: Option<f64>,
    pub status: String,
}

impl SignalView {
    /// `(key, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("bitrate", self.bitrate.clone()),
            ("bitrate_int", self.bitrate_int.to_string()),
            ("channel", self.channel.clone()),
            ("channel_int", self.channel_int.to_string()),
            ("frequency", self.frequency.clone()),
            ("frequency_int", self.frequency_int.to_string()),
            ("modulation", self.modulation.clone()),
            ("power", self.power.clone()),
            ("power_float", self.power_float.to_string()),
        ];
        if let (Some(snr), Some(snr_float)) = (&self.snr, self.snr_float) {
            entries.push(("snr", snr.clone()));
            entries.push(("snr_float", snr_float.to_string()));
        }
        entries.push(("status", self.status.clone()));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModemInfo {
    pub cable_ip: String,
    pub certificate: String,
    pub current_time: String,
    pub status: String,
    pub uptime: String,
    pub uptime_seconds: u64,
}

impl ModemInfo {
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("cable_ip", self.cable_ip.clone()),
            ("certificate", self.certificate.clone()),
            ("current_time", self.current_time.clone()),
            ("status", self.status.clone()),
            ("uptime", self.uptime.clone()),
            ("uptime_seconds", self.uptime_seconds.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedClient {
    pub interface: String,
    pub mac: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMessage {
    pub time: String,
    pub level: String,
    pub message: String,
}

pub fn downstream(signal: &Fields) -> Result<SignalView, ModemError> {
    signal_view(signal, Direction::Downstream)
}

pub fn upstream(signal: &Fields) -> Result<SignalView, ModemError> {
    signal_view(signal, Direction::Upstream)
}

fn signal_view(signal: &Fields, direction: Direction) -> Result<SignalView, ModemError> {
    let name = direction.label();
    let suffix = signal.suffix_for(name);
    let key = |field: &str| format!("{field}{suffix}");
    let read = |field: &str| signal.text(&key(field)).map(str::to_string);

    let bitrate = read("Bit Rate")?;
    let channel = read("Channel ID")?;
    let frequency = read(&format!("{name} Frequency"))?;
    let modulation = read("Modulation")?;
    let power = read("Power Level")?;
    let snr = match direction {
        Direction::Downstream => Some(read("Signal to Noise Ratio")?),
        Direction::Upstream => None,
    };
    let status = read(&format!("{name} Status"))?;

    Ok(SignalView {
        direction,
        bitrate_int: leading_int(&key("Bit Rate"), &bitrate)?,
        channel_int: leading_int(&key("Channel ID"), &channel)?,
        frequency_int: leading_int(&key(&format!("{name} Frequency")), &frequency)?,
        power_float: leading_float(&key("Power Level"), &power)?,
        snr_float: snr
            .as_deref()
            .map(|snr| leading_float(&key("Signal to Noise Ratio"), snr))
            .transpose()?,
        bitrate,
        channel,
        frequency,
        modulation,
        power,
        snr,
        status,
    })
}

pub fn modem_info(status: &Fields) -> Result<ModemInfo, ModemError> {
    let uptime = status.text("Time Since Last Reset_0")?.to_string();
    Ok(ModemInfo {
        cable_ip: status.text("IP Address_0")?.to_string(),
        certificate: status.text("Cable Modem Certificate_0")?.to_string(),
        current_time: status.text("Current Time_0")?.to_string(),
        status: status.text("Cable Modem Status_0")?.to_string(),
        uptime_seconds: parse_uptime(&uptime),
        uptime,
    })
}

/// Total seconds in an uptime like `"3 days, 04h:05m:06s"`.
///
/// Chunks are separated by `:` and keyed by their trailing unit letter. The
/// hours chunk also carries the day count as its first word. Anything that
/// does not parse, or does not fit in a `u64` once scaled, contributes nothing.
pub fn parse_uptime(uptime: &str) -> u64 {
    let seconds = |raw: &str, unit: char, scale: u64| -> u64 {
        raw.trim()
            .trim_end_matches(unit)
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(scale))
            .unwrap_or_else(|| {
                debug!(chunk = raw, "ignoring unparseable uptime chunk");
                0
            })
    };

    let mut secs: u64 = 0;
    for chunk in uptime.split(':').map(str::trim) {
        if chunk.ends_with('s') {
            secs = secs.saturating_add(seconds(chunk, 's', 1));
        } else if chunk.ends_with('m') {
            secs = secs.saturating_add(seconds(chunk, 'm', 60));
        } else if chunk.ends_with('h') {
            let words: Vec<&str> = chunk.split_whitespace().collect();
            if let Some(hours) = words.last() {
                secs = secs.saturating_add(seconds(*hours, 'h', 60 * 60));
            }
            if words.len() > 1 {
                secs = secs.saturating_add(seconds(words[0], 'd', 24 * 60 * 60));
            }
        }
    }
    secs
}

/// Clients attached to the modem's LAN side, rebuilt from `status` on every
/// call.
pub fn clients(status: &Fields) -> Result<impl Iterator<Item = ConnectedClient> + '_, ModemError> {
    Ok(data_rows(status, "Connected to_list")?.map(|[interface, mac, ip]| ConnectedClient {
        interface: interface.clone(),
        mac: mac.clone(),
        ip: ip.clone(),
    }))
}

/// Event log entries, rebuilt from `log` on every call.
pub fn messages(log: &Fields) -> Result<impl Iterator<Item = LogMessage> + '_, ModemError> {
    Ok(data_rows(log, "Time_list")?.map(|[time, level, message]| LogMessage {
        time: time.clone(),
        level: level.clone(),
        message: message.clone(),
    }))
}

/// First three columns of every row after the table's inner header row.
fn data_rows<'a>(
    fields: &'a Fields,
    key: &str,
) -> Result<impl Iterator<Item = [&'a String; 3]> + 'a, ModemError> {
    let rows = fields.rows(key)?;
    let rows = rows.get(1..).unwrap_or_default();
    if let Some(short) = rows.iter().find(|row| row.len() < 3) {
        return Err(ModemError::Parse(format!(
            "`{key}` row has {} columns, expected at least 3",
            short.len()
        )));
    }
    Ok(rows.iter().map(|row| [&row[0], &row[1], &row[2]]))
}

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

use crate::client::ModemClient;
use crate::config::Variant;
use crate::fields::{self, Fields};
use crate::metrics::{self, ConnectedClient, LogMessage, ModemInfo, SignalView};
use crate::tables;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

pub const SIGNAL_PAGE: &str = "signal";
pub const STATUS_PAGE: &str = "status";
pub const LOG_PAGE: &str = "log";
pub const AMBIT_DOWNSTREAM_PAGE: &str = "CmDnstream";
pub const AMBIT_UPSTREAM_PAGE: &str = "CmUpstream";

/// Everything the status report shows, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub modem: ModemInfo,
    pub downstream: SignalView,
    pub upstream: SignalView,
    pub clients: Vec<ConnectedClient>,
    pub messages: Vec<LogMessage>,
}

/// A polling session: one client plus the flattened fields of every page
/// parsed so far.
#[derive(Debug)]
pub struct Modem {
    client: ModemClient,
    details: HashMap<String, Fields>,
}

impl Modem {
    pub fn new(client: ModemClient) -> Self {
        Self {
            client,
            details: HashMap::new(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.client.variant()
    }

    /// Flattened fields of `page`, fetched and parsed on first use.
    pub fn details(&mut self, page: &str) -> Result<&Fields> {
        if !self.details.contains_key(page) {
            let raw = self
                .client
                .fetch(page)
                .with_context(|| format!("fetching the `{page}` page"))?;
            let lines = raw.lines().count();
            let parsed = tables::parse(raw).with_context(|| format!("parsing the `{page}` page"))?;
            let flattened = fields::flatten(&parsed);
            debug!(
                page,
                lines,
                tables = parsed.len(),
                fields = flattened.len(),
                escalated = self.client.is_escalated(),
                "parsed modem page"
            );
            self.details.insert(page.to_string(), flattened);
        }
        Ok(&self.details[page])
    }

    pub fn downstream(&mut self) -> Result<SignalView> {
        Ok(metrics::downstream(self.details(SIGNAL_PAGE)?)?)
    }

    pub fn upstream(&mut self) -> Result<SignalView> {
        Ok(metrics::upstream(self.details(SIGNAL_PAGE)?)?)
    }

    pub fn modem_info(&mut self) -> Result<ModemInfo> {
        Ok(metrics::modem_info(self.details(STATUS_PAGE)?)?)
    }

    pub fn clients(&mut self) -> Result<Vec<ConnectedClient>> {
        Ok(metrics::clients(self.details(STATUS_PAGE)?)?.collect())
    }

    pub fn messages(&mut self) -> Result<Vec<LogMessage>> {
        Ok(metrics::messages(self.details(LOG_PAGE)?)?.collect())
    }

    pub fn report(&mut self) -> Result<Report> {
        Ok(Report {
            modem: self.modem_info().context("reading modem status")?,
            downstream: self.downstream().context("reading downstream signal")?,
            upstream: self.upstream().context("reading upstream signal")?,
            clients: self.clients().context("reading connected clients")?,
            messages: self.messages().context("reading the event log")?,
        })
    }

    /// Current text value of a munin metric such as `Downstream Frequency`.
    pub fn munin_value(&mut self, metric: &str) -> Result<String> {
        let page = match self.variant() {
            Variant::Webstar => SIGNAL_PAGE,
            Variant::Ambit if metric.split(' ').next() == Some("Downstream") => {
                AMBIT_DOWNSTREAM_PAGE
            }
            Variant::Ambit => AMBIT_UPSTREAM_PAGE,
        };
        let value = self
            .details(page)?
            .metric(metric)
            .with_context(|| format!("looking up munin metric `{metric}`"))?;
        Ok(value.to_string())
    }

    /// Flattened downstream and upstream pages of an Ambit modem.
    pub fn ambit_details(&mut self) -> Result<(Fields, Fields)> {
        let downstream = self.details(AMBIT_DOWNSTREAM_PAGE)?.clone();
        let upstream = self.details(AMBIT_UPSTREAM_PAGE)?.clone();
        Ok((downstream, upstream))
    }
}

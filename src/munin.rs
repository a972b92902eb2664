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

//! munin plugin protocol.
//!
//! Symlink the binary into the plugin directory as
//! `cablemodem_Downstream.Frequency`; dots in the name stand for spaces in the
//! metric label.

use crate::error::ModemError;
use crate::fields::{leading_float, unit};
use std::path::Path;

pub const GRAPH_CATEGORY: &str = "DOCSIS";

/// Graph configuration for `metric`, whose current value is `"<number> <unit>"`.
pub fn config_block(metric: &str, value: &str) -> Result<String, ModemError> {
    let unit = unit(metric, value)?;
    Ok(format!(
        "graph_title {metric}\n\
         graph_vlabel {unit}\n\
         graph_category {GRAPH_CATEGORY}\n\
         graph_info {metric} ({unit})\n\
         data.label {metric}\n\
         data.info {metric}"
    ))
}

/// Single data point for a value of the form `"<number> <unit>"`.
pub fn data_line(metric: &str, value: &str) -> Result<String, ModemError> {
    leading_float(metric, value)?;
    let number = value.split_whitespace().next().unwrap_or_default();
    Ok(format!("data.value {number}"))
}

/// Metric encoded in the invocation path, when the binary was started from
/// `plugin_dir` under a name like `cablemodem_Downstream.Frequency`.
pub fn metric_from_invocation(argv0: &Path, plugin_dir: &Path) -> Option<String> {
    if argv0.parent()? != plugin_dir {
        return None;
    }
    let name = argv0.file_name()?.to_str()?;
    let metric = name.split('_').nth(1)?.replace('.', " ");
    (!metric.is_empty()).then_some(metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_block_names_metric_and_unit() {
        let block = config_block("Downstream Receive Power Level", "-5.3 dBmV").unwrap();
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(
            lines,
            vec![
                "graph_title Downstream Receive Power Level",
                "graph_vlabel dBmV",
                "graph_category DOCSIS",
                "graph_info Downstream Receive Power Level (dBmV)",
                "data.label Downstream Receive Power Level",
                "data.info Downstream Receive Power Level",
            ]
        );
    }

    #[test]
    fn data_line_is_the_leading_number() {
        assert_eq!(
            data_line("Downstream Receive Power Level", "-5.3 dBmV").unwrap(),
            "data.value -5.3"
        );
        assert_eq!(
            data_line("Downstream Frequency", "555000000 Hz").unwrap(),
            "data.value 555000000"
        );
    }

    #[test]
    fn values_without_number_or_unit_are_rejected() {
        assert!(matches!(
            config_block("Downstream Status", "Operational"),
            Err(ModemError::BadMeasurement { .. })
        ));
        assert!(matches!(
            data_line("Downstream Status", "Operational"),
            Err(ModemError::BadMeasurement { .. })
        ));
    }

    #[test]
    fn metric_comes_from_the_symlink_name() {
        let plugins = Path::new("/etc/munin/plugins");

        assert_eq!(
            metric_from_invocation(
                Path::new("/etc/munin/plugins/cablemodem_Downstream.Frequency"),
                plugins
            ),
            Some("Downstream Frequency".to_string())
        );
        assert_eq!(
            metric_from_invocation(Path::new("/usr/bin/cablemodem"), plugins),
            None
        );
        assert_eq!(
            metric_from_invocation(Path::new("/etc/munin/plugins/cablemodem"), plugins),
            None
        );
        assert_eq!(metric_from_invocation(Path::new("cablemodem"), plugins), None);
    }
}

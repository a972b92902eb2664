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

use crate::config::{EffectiveConfig, Variant};
use crate::error::ModemError;
use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const ESCALATION_PATH: &str = "goform/_aslvl";

static UA: OnceLock<HeaderValue> = OnceLock::new();

/// Body of one diagnostic page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    body: String,
}

impl RawPage {
    pub fn new(body: String) -> Self {
        Self { body }
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }
}

impl From<&str> for RawPage {
    fn from(body: &str) -> Self {
        Self::new(body.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    NotAttempted,
    Granted,
    Refused,
}

/// Fetches `{page}.asp` documents from the modem, escalating privileges once
/// per client and caching every page for the lifetime of the client.
#[derive(Debug)]
pub struct ModemClient {
    base_url: Url,
    http: Client,
    variant: Variant,
    username: String,
    password: String,
    require_escalation: bool,
    escalation: Escalation,
    cache: HashMap<String, RawPage>,
}

impl ModemClient {
    pub fn new(config: &EffectiveConfig) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}/", config.ip))
            .with_context(|| format!("parsing modem address `{}`", config.ip))?;
        let user_agent = UA.get_or_init(|| HeaderValue::from_static("cablemodem/0.1"));
        let http = Client::builder()
            .cookie_store(true)
            .user_agent(user_agent.clone())
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .context("building modem HTTP client")?;

        Ok(Self {
            base_url,
            http,
            variant: config.variant,
            username: config.username.clone(),
            password: config.password.clone(),
            require_escalation: config.require_escalation,
            escalation: Escalation::NotAttempted,
            cache: HashMap::new(),
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_escalated(&self) -> bool {
        self.escalation == Escalation::Granted
    }

    /// Returns the page named `page` (without the `.asp` extension), hitting
    /// the network only the first time a page is asked for.
    pub fn fetch(&mut self, page: &str) -> Result<&RawPage, ModemError> {
        if !self.cache.contains_key(page) {
            self.ensure_escalated()?;
            let url = self.page_url(page)?;
            debug!(page, host = %self.base_url, "fetching modem page");
            let body = self.send(self.http.get(url.clone()), &url)?;
            self.cache.insert(page.to_string(), RawPage::new(body));
        }
        Ok(&self.cache[page])
    }

    fn ensure_escalated(&mut self) -> Result<(), ModemError> {
        if self.variant != Variant::Webstar {
            return Ok(());
        }
        match self.escalation {
            Escalation::Granted => Ok(()),
            Escalation::Refused if self.require_escalation => Err(self.escalation_failed()),
            Escalation::Refused => Ok(()),
            Escalation::NotAttempted => self.escalate(),
        }
    }

    fn escalate(&mut self) -> Result<(), ModemError> {
        let url = self.join(ESCALATION_PATH)?;
        let form = [
            ("SAAccessLevel", "2"),
            ("SAPassword", self.password.as_str()),
            ("submit", "Submit"),
        ];
        let body = self.send(self.http.post(url.clone()).form(&form), &url)?;

        if body.contains("Success") {
            info!(host = %self.base_url, "privilege escalation granted");
            self.escalation = Escalation::Granted;
            return Ok(());
        }

        self.escalation = Escalation::Refused;
        if self.require_escalation {
            return Err(self.escalation_failed());
        }
        warn!(
            host = %self.base_url,
            "privilege escalation refused; continuing without it"
        );
        Ok(())
    }

    fn escalation_failed(&self) -> ModemError {
        ModemError::EscalationFailed {
            url: self
                .join(ESCALATION_PATH)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| self.base_url.to_string()),
        }
    }

    fn page_url(&self, page: &str) -> Result<Url, ModemError> {
        let mut url = self.join(&format!("{}.asp", page.trim_start_matches('/')))?;
        if self.variant == Variant::Ambit {
            url.set_username(&self.username)
                .and_then(|_| url.set_password(Some(&self.password)))
                .map_err(|_| {
                    ModemError::Parse(format!("cannot embed credentials in {}", self.base_url))
                })?;
        }
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url, ModemError> {
        self.base_url
            .join(path)
            .map_err(|e| ModemError::Parse(format!("joining `{path}` to {}: {e}", self.base_url)))
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, ModemError> {
        let shown = redacted(url);
        let response = request.send().map_err(|source| ModemError::Network {
            url: shown.clone(),
            source: source.without_url(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModemError::HttpStatus {
                status: status.as_u16(),
                url: shown,
            });
        }

        response.text().map_err(|source| ModemError::Network {
            url: shown,
            source: source.without_url(),
        })
    }
}

fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let _ = shown.set_password(None);
    let _ = shown.set_username("");
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DEFAULT_AMBIT_PASSWORD, DEFAULT_MUNIN_PLUGIN_DIR, DEFAULT_PASSWORD, DEFAULT_USERNAME,
    };
    use httpmock::prelude::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_for(ip: String, variant: Variant, require_escalation: bool) -> EffectiveConfig {
        EffectiveConfig {
            ip,
            password: match variant {
                Variant::Webstar => DEFAULT_PASSWORD,
                Variant::Ambit => DEFAULT_AMBIT_PASSWORD,
            }
            .to_string(),
            username: DEFAULT_USERNAME.to_string(),
            variant,
            timeout: Duration::from_secs(5),
            require_escalation,
            munin_plugin_dir: PathBuf::from(DEFAULT_MUNIN_PLUGIN_DIR),
        }
    }

    fn client_for(server: &MockServer, variant: Variant, require: bool) -> ModemClient {
        ModemClient::new(&config_for(server.address().to_string(), variant, require)).unwrap()
    }

    #[test]
    fn escalates_once_and_caches_pages() {
        let server = MockServer::start();
        let escalate = server.mock(|when, then| {
            when.method(POST)
                .path("/goform/_aslvl")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("SAAccessLevel=2&SAPassword=W2402&submit=Submit");
            then.status(200).body("<html><body>Success</body></html>");
        });
        let signal = server.mock(|when, then| {
            when.method(GET).path("/signal.asp");
            then.status(200).body("<table></table>");
        });
        let status = server.mock(|when, then| {
            when.method(GET).path("/status.asp");
            then.status(200).body("<p>status</p>\n<p>more</p>");
        });

        let mut client = client_for(&server, Variant::Webstar, false);
        assert_eq!(client.fetch("signal").unwrap().as_str(), "<table></table>");
        assert_eq!(client.fetch("signal").unwrap().as_str(), "<table></table>");
        assert_eq!(client.fetch("status").unwrap().lines().count(), 2);

        escalate.assert_hits(1);
        signal.assert_hits(1);
        status.assert_hits(1);
        assert!(client.is_escalated());
    }

    #[test]
    fn response_without_success_is_not_a_grant() {
        let server = MockServer::start();
        let escalate = server.mock(|when, then| {
            when.method(POST).path("/goform/_aslvl");
            then.status(200).body("<html>\n<body>Invalid password</body>\n</html>");
        });
        let log = server.mock(|when, then| {
            when.method(GET).path("/log.asp");
            then.status(200).body("<table></table>");
        });
        let signal = server.mock(|when, then| {
            when.method(GET).path("/signal.asp");
            then.status(200).body("<table></table>");
        });

        let mut client = client_for(&server, Variant::Webstar, false);
        client.fetch("log").unwrap();
        client.fetch("signal").unwrap();

        escalate.assert_hits(1);
        log.assert_hits(1);
        signal.assert_hits(1);
        assert!(!client.is_escalated());
    }

    #[test]
    fn required_escalation_fails_before_fetching() {
        let server = MockServer::start();
        let escalate = server.mock(|when, then| {
            when.method(POST).path("/goform/_aslvl");
            then.status(200).body("Failure");
        });
        let signal = server.mock(|when, then| {
            when.method(GET).path("/signal.asp");
            then.status(200).body("<table></table>");
        });

        let mut client = client_for(&server, Variant::Webstar, true);
        let err = client.fetch("signal").unwrap_err();
        assert!(matches!(err, ModemError::EscalationFailed { .. }));
        let err = client.fetch("signal").unwrap_err();
        assert!(matches!(err, ModemError::EscalationFailed { .. }));

        escalate.assert_hits(1);
        signal.assert_hits(0);
    }

    #[test]
    fn ambit_uses_basic_auth_and_skips_escalation() {
        let server = MockServer::start();
        let escalate = server.mock(|when, then| {
            when.method(POST).path("/goform/_aslvl");
            then.status(200).body("Success");
        });
        let downstream = server.mock(|when, then| {
            when.method(GET)
                .path("/CmDnstream.asp")
                .header("authorization", "Basic dXNlcjp1c2Vy");
            then.status(200).body("<table></table>");
        });

        let mut client = client_for(&server, Variant::Ambit, false);
        client.fetch("CmDnstream").unwrap();

        downstream.assert();
        escalate.assert_hits(0);
    }

    #[test]
    fn http_errors_are_reported_with_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/goform/_aslvl");
            then.status(200).body("Success");
        });
        server.mock(|when, then| {
            when.method(GET).path("/missing.asp");
            then.status(404);
        });

        let mut client = client_for(&server, Variant::Webstar, false);
        match client.fetch("missing").unwrap_err() {
            ModemError::HttpStatus { status, url } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing.asp"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreachable_modem_is_a_network_error() {
        let mut client =
            ModemClient::new(&config_for("127.0.0.1:1".into(), Variant::Ambit, false)).unwrap();
        let err = client.fetch("CmUpstream").unwrap_err();
        match err {
            ModemError::Network { url, .. } => {
                assert!(!url.contains('@'));
                assert_eq!(url, "http://127.0.0.1:1/CmUpstream.asp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unparseable_address() {
        let err = ModemClient::new(&config_for("not a host".into(), Variant::Webstar, false))
            .unwrap_err();
        assert!(err.to_string().contains("parsing modem address"));
    }
}

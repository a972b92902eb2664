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

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_IP: &str = "192.168.100.1";
pub const DEFAULT_PASSWORD: &str = "W2402";
pub const DEFAULT_AMBIT_PASSWORD: &str = "user";
pub const DEFAULT_USERNAME: &str = "user";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MUNIN_PLUGIN_DIR: &str = "/etc/munin/plugins";

/// Which page layout and login scheme the modem uses.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Signal/status/log pages behind the `_aslvl` escalation form.
    #[default]
    Webstar,
    /// CmDnstream/CmUpstream pages behind HTTP basic auth.
    Ambit,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub ip: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub variant: Option<Variant>,
    pub timeout_secs: Option<u64>,
    pub require_escalation: Option<bool>,
    pub munin_plugin_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("timeout must be at least one second")]
    ZeroTimeout,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub ip: String,
    pub password: String,
    pub username: String,
    pub variant: Variant,
    pub timeout: Duration,
    pub require_escalation: bool,
    pub munin_plugin_dir: PathBuf,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".cablemodem.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("CABLEMODEM_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("cablemodem").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Merges user config, project config and `overrides` (highest precedence)
/// on top of the compiled-in defaults.
pub fn resolve(cwd: &Path, overrides: Config) -> Result<EffectiveConfig> {
    let merged = merge(load(cwd)?, overrides);

    let timeout_secs = merged.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout.into());
    }

    let variant = merged.variant.unwrap_or_default();
    let default_password = match variant {
        Variant::Webstar => DEFAULT_PASSWORD,
        Variant::Ambit => DEFAULT_AMBIT_PASSWORD,
    };

    Ok(EffectiveConfig {
        ip: merged
            .ip
            .map(|ip| ip.trim().to_string())
            .unwrap_or_else(|| DEFAULT_IP.to_string()),
        password: merged
            .password
            .unwrap_or_else(|| default_password.to_string()),
        username: merged
            .username
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        variant,
        timeout: Duration::from_secs(timeout_secs),
        require_escalation: merged.require_escalation.unwrap_or(false),
        munin_plugin_dir: merged
            .munin_plugin_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MUNIN_PLUGIN_DIR)),
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

/// Field-wise merge; values in `over` win.
pub fn merge(base: Config, over: Config) -> Config {
    Config {
        ip: over.ip.or(base.ip),
        password: over.password.or(base.password),
        username: over.username.or(base.username),
        variant: over.variant.or(base.variant),
        timeout_secs: over.timeout_secs.or(base.timeout_secs),
        require_escalation: over.require_escalation.or(base.require_escalation),
        munin_plugin_dir: over.munin_plugin_dir.or(base.munin_plugin_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::{env, fs};
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<std::sync::Mutex<()>> = OnceLock::new();

    fn isolate(cwd: &Path) {
        unsafe {
            env::set_var("CABLEMODEM_CONFIG_DIR", cwd.join("config"));
            env::set_var("XDG_CONFIG_HOME", cwd.join("xdg"));
        }
        fs::create_dir_all(cwd.join("config")).unwrap();
        fs::create_dir_all(cwd.join("xdg")).unwrap();
    }

    #[test]
    fn merges_user_and_local_and_overrides() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let user_cfg = Config {
            ip: Some("10.0.0.1".into()),
            password: Some("user-pass".into()),
            timeout_secs: Some(30),
            ..Config::default()
        };
        save(Scope::User, &user_cfg, cwd.path()).unwrap();

        let local_cfg = Config {
            ip: Some("192.168.0.1".into()),
            variant: Some(Variant::Ambit),
            ..Config::default()
        };
        save(Scope::Local, &local_cfg, cwd.path()).unwrap();

        let effective = resolve(cwd.path(), Config::default()).unwrap();
        assert_eq!(effective.ip, "192.168.0.1");
        assert_eq!(effective.password, "user-pass");
        assert_eq!(effective.username, DEFAULT_USERNAME);
        assert_eq!(effective.variant, Variant::Ambit);
        assert_eq!(effective.timeout, Duration::from_secs(30));

        let overridden = resolve(
            cwd.path(),
            Config {
                ip: Some(" 127.0.0.1:8080 ".into()),
                require_escalation: Some(true),
                ..Config::default()
            },
        )
        .unwrap();
        assert_eq!(overridden.ip, "127.0.0.1:8080");
        assert!(overridden.require_escalation);
        assert_eq!(overridden.password, "user-pass");
    }

    #[test]
    fn falls_back_to_compiled_defaults() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let effective = resolve(cwd.path(), Config::default()).unwrap();
        assert_eq!(effective.ip, DEFAULT_IP);
        assert_eq!(effective.password, DEFAULT_PASSWORD);
        assert_eq!(effective.variant, Variant::Webstar);
        assert_eq!(effective.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!effective.require_escalation);
        assert_eq!(
            effective.munin_plugin_dir,
            PathBuf::from(DEFAULT_MUNIN_PLUGIN_DIR)
        );
    }

    #[test]
    fn ambit_defaults_to_its_own_password() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let ambit = Config {
            variant: Some(Variant::Ambit),
            ..Config::default()
        };
        let effective = resolve(cwd.path(), ambit.clone()).unwrap();
        assert_eq!(effective.username, DEFAULT_USERNAME);
        assert_eq!(effective.password, DEFAULT_AMBIT_PASSWORD);

        let configured = resolve(
            cwd.path(),
            Config {
                password: Some("hunter2".into()),
                ..ambit
            },
        )
        .unwrap();
        assert_eq!(configured.password, "hunter2");
    }

    #[test]
    fn rejects_zero_timeout() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        isolate(cwd.path());

        let err = resolve(
            cwd.path(),
            Config {
                timeout_secs: Some(0),
                ..Config::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one second"));
    }
}

mod client;
mod config;
mod error;
mod fields;
mod metrics;
mod modem;
mod munin;
mod report;
mod tables;

use crate::client::ModemClient;
use crate::config::{Config, EffectiveConfig, Scope, Variant, resolve, save};
use crate::modem::Modem;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cablemodem",
    version,
    about = "Poll a cable modem's diagnostic pages for signal, uptime, clients and logs"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "HOST",
        help = "Modem address, optionally with port (defaults to 192.168.100.1)"
    )]
    ip: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Password for privilege escalation or basic auth"
    )]
    password: Option<String>,

    #[arg(long, global = true, help = "Basic auth user (ambit modems only)")]
    username: Option<String>,

    #[arg(long, global = true, value_enum, help = "Modem page layout")]
    variant: Option<VariantArg>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Per-request timeout (defaults to 10)"
    )]
    timeout: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Fail instead of continuing when privilege escalation is refused"
    )]
    require_escalation: bool,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format"
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full status report (default)
    Status {
        #[arg(long, value_name = "SECONDS", help = "Refresh every SECONDS")]
        watch: Option<u64>,
    },
    /// Dump the flattened fields of one page (e.g. signal, status, log)
    Fields {
        #[arg(value_name = "PAGE")]
        page: String,
    },
    /// Print munin output for a metric, e.g. "Downstream Frequency"
    Munin {
        #[arg(value_name = "METRIC")]
        metric: String,
        #[arg(value_enum, default_value_t = MuninMode::Fetch)]
        mode: MuninMode,
    },
    /// Persist the global connection flags to the chosen scope
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
        #[arg(long, value_name = "DIR", help = "Directory munin runs plugins from")]
        munin_plugin_dir: Option<PathBuf>,
    },
    /// Show current configuration (password masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum MuninMode {
    Config,
    Fetch,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Webstar,
    Ambit,
}

impl From<VariantArg> for Variant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Webstar => Variant::Webstar,
            VariantArg::Ambit => Variant::Ambit,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            ip: self.ip.clone(),
            password: self.password.clone(),
            username: self.username.clone(),
            variant: self.variant.map(Into::into),
            timeout_secs: self.timeout,
            require_escalation: self.require_escalation.then_some(true),
            munin_plugin_dir: None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("reading current directory")?;
    if run_as_munin_plugin(&cwd)? {
        return Ok(());
    }

    let mut cli = Cli::parse();
    let command = cli
        .command
        .take()
        .unwrap_or(Commands::Status { watch: None });

    match command {
        Commands::Configure {
            scope,
            munin_plugin_dir,
        } => {
            let existing = config::load_scope(scope.into(), &cwd)?;
            let mut updates = cli.overrides();
            updates.munin_plugin_dir = munin_plugin_dir;
            let path = save(scope.into(), &config::merge(existing, updates), &cwd)?;
            println!("Saved configuration to {}", path.display());
        }
        Commands::ConfigShow => {
            let mut merged = config::merge(config::load(&cwd)?, cli.overrides());
            if merged.password.is_some() {
                merged.password = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
        }
        Commands::Status { watch } => {
            let effective = resolve(&cwd, cli.overrides())?;
            if let Some(interval) = watch {
                loop {
                    print_status(&effective, cli.output)?;
                    std::thread::sleep(std::time::Duration::from_secs(interval));
                }
            } else {
                print_status(&effective, cli.output)?;
            }
        }
        Commands::Fields { page } => {
            let effective = resolve(&cwd, cli.overrides())?;
            let mut modem = open_modem(&effective)?;
            let fields = modem.details(&page)?;
            if fields.is_empty() {
                warn!(page = %page, "page contains no tables");
            }
            match cli.output {
                OutputFormat::Pretty => print!("{}", report::render_fields(&page, fields)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(fields)?),
            }
        }
        Commands::Munin { metric, mode } => {
            let effective = resolve(&cwd, cli.overrides())?;
            print_munin(&effective, &metric, mode)?;
        }
    }

    Ok(())
}

/// Handles `/etc/munin/plugins/cablemodem_<Metric.Name> [config]`.
fn run_as_munin_plugin(cwd: &Path) -> Result<bool> {
    let mut args = std::env::args_os();
    let Some(argv0) = args.next() else {
        return Ok(false);
    };
    let argv0 = PathBuf::from(argv0);
    let looks_like_plugin = argv0
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains('_'));
    if !looks_like_plugin {
        return Ok(false);
    }

    let effective = resolve(cwd, Config::default())?;
    let Some(metric) = munin::metric_from_invocation(&argv0, &effective.munin_plugin_dir) else {
        return Ok(false);
    };
    let mode = match args.next() {
        Some(arg) if arg == "config" => MuninMode::Config,
        _ => MuninMode::Fetch,
    };
    print_munin(&effective, &metric, mode)?;
    Ok(true)
}

fn open_modem(effective: &EffectiveConfig) -> Result<Modem> {
    debug!(
        ip = %effective.ip,
        variant = ?effective.variant,
        timeout = ?effective.timeout,
        "opening modem session"
    );
    Ok(Modem::new(ModemClient::new(effective)?))
}

fn print_munin(effective: &EffectiveConfig, metric: &str, mode: MuninMode) -> Result<()> {
    let mut modem = open_modem(effective)?;
    let value = modem.munin_value(metric)?;
    let out = match mode {
        MuninMode::Config => munin::config_block(metric, &value)?,
        MuninMode::Fetch => munin::data_line(metric, &value)?,
    };
    println!("{out}");
    Ok(())
}

fn print_status(effective: &EffectiveConfig, output: OutputFormat) -> Result<()> {
    let mut modem = open_modem(effective)?;
    match (modem.variant(), output) {
        (Variant::Webstar, OutputFormat::Pretty) => print!("{}", report::render(&modem.report()?)),
        (Variant::Webstar, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&modem.report()?)?)
        }
        (Variant::Ambit, OutputFormat::Pretty) => {
            let (downstream, upstream) = modem.ambit_details()?;
            print!("{}", report::render_fields("Downstream", &downstream));
            println!();
            print!("{}", report::render_fields("Upstream", &upstream));
        }
        (Variant::Ambit, OutputFormat::Json) => {
            let (downstream, upstream) = modem.ambit_details()?;
            let body = json!({ "downstream": downstream, "upstream": upstream });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}

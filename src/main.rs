use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;

use prtgwatch::range::parse_range;
use prtgwatch::telemetry::init_tracing;
use prtgwatch::types::{Level, QueryTarget, QueryType};
use prtgwatch::{PluginConfig, PrtgDataSource, QueryRequest, StaticTemplateService};

#[derive(Parser, Debug)]
#[command(name = "prtgwatch")]
#[command(about = "Query a PRTG server the way the dashboard datasource does")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server hostname (overrides config)
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// API username (overrides config)
    #[arg(long, global = true)]
    username: Option<String>,

    /// API passhash (overrides config)
    #[arg(long, global = true)]
    passhash: Option<String>,

    /// Response cache lifetime in seconds (overrides config)
    #[arg(long, global = true)]
    cache_timeout: Option<u64>,

    /// Send request dates in local time
    #[arg(long, global = true)]
    tz_auto_adjust: bool,

    /// Template variable, repeatable (e.g. --var site=Network)
    #[arg(long = "var", value_name = "NAME=VALUE", global = true)]
    vars: Vec<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check server version and credentials
    Test,

    /// List candidates for one cascade level. Ancestor levels must be
    /// selected; use "*" to match everything.
    Suggest {
        level: LevelArg,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Resolve one query target over a time range
    Query {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Value columns, comma separated (default: all)
        #[arg(long)]
        value: Option<String>,

        /// Object kind for text/raw mode (group, device, sensor)
        #[arg(long)]
        property: Option<String>,

        /// Property to read in text/raw mode (e.g. status)
        #[arg(long)]
        filter_property: Option<String>,

        #[arg(long, value_enum, default_value = "metrics")]
        mode: ModeArg,

        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        include_group: bool,

        #[arg(long)]
        include_device: bool,

        #[arg(long)]
        include_sensor: bool,
    },

    /// Sensor log entries as annotations
    Messages {
        #[arg(long)]
        sensor: String,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Run a template-variable query ("groups", "devices <group>", ...)
    Find { query: String },
}

#[derive(Args, Debug)]
struct SelectionArgs {
    #[arg(long, default_value = "")]
    group: String,

    #[arg(long, default_value = "")]
    device: String,

    #[arg(long, default_value = "")]
    sensor: String,

    #[arg(long, default_value = "")]
    channel: String,
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Start: "6h", "now-1d", RFC 3339 or Unix ms
    #[arg(long, default_value = "6h")]
    from: String,

    #[arg(long, default_value = "now")]
    to: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LevelArg {
    Group,
    Device,
    Sensor,
    Channel,
    Value,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Group => Level::Group,
            LevelArg::Device => Level::Device,
            LevelArg::Sensor => Level::Sensor,
            LevelArg::Channel => Level::Channel,
            LevelArg::Value => Level::Value,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Metrics,
    Text,
    Raw,
}

impl From<ModeArg> for QueryType {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Metrics => QueryType::Metrics,
            ModeArg::Text => QueryType::Text,
            ModeArg::Raw => QueryType::Raw,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(&cli)?;
    debug!(hostname = %config.hostname, "configuration loaded");
    let templates = template_service(&cli.vars)?;
    let datasource = PrtgDataSource::new(config.build_client()?, Arc::new(templates));
    let now_ms = Utc::now().timestamp_millis();

    match cli.command {
        Command::Test => {
            let status = datasource.test_datasource().await;
            print_json(&status)?;
            if !status.ok {
                bail!("{}", status.message);
            }
        }

        Command::Suggest { level, selection } => {
            let level = Level::from(level);
            let target = selection.into_target("A");
            let mut controller = datasource.controller(target, Box::new(|| {}));
            controller.refresh_selection_lists().await;
            print_json(controller.list(level))?;
        }

        Command::Query {
            selection,
            value,
            property,
            filter_property,
            mode,
            range,
            include_group,
            include_device,
            include_sensor,
        } => {
            let mut target = selection.into_target("A");
            target.set_query_type(mode.into());
            target.value_selection.name = value.unwrap_or_default();
            target.property_selection.name = property.unwrap_or_default();
            target.filter_property_selection.name = filter_property.unwrap_or_default();
            target.options.include_group = include_group;
            target.options.include_device = include_device;
            target.options.include_sensor = include_sensor;

            let request = QueryRequest {
                targets: vec![target],
                range: parse_range(&range.from, &range.to, now_ms)?,
                ..Default::default()
            };
            print_json(&datasource.query(&request).await)?;
        }

        Command::Messages { sensor, range } => {
            let range = parse_range(&range.from, &range.to, now_ms)?;
            let entries = datasource
                .annotations(range, &sensor)
                .await
                .context("message query failed")?;
            print_json(&entries)?;
        }

        Command::Find { query } => {
            let entries = datasource
                .metric_find_query(&query)
                .await
                .context("variable query failed")?;
            print_json(&entries)?;
        }
    }

    Ok(())
}

impl SelectionArgs {
    fn into_target(self, ref_id: &str) -> QueryTarget {
        let mut target = QueryTarget::new(ref_id);
        target.group_selection.name = self.group;
        target.device_selection.name = self.device;
        target.sensor_selection.name = self.sensor;
        target.channel_selection.name = self.channel;
        target
    }
}

/// Config file and environment, then command-line overrides.
fn load_config(cli: &Cli) -> Result<PluginConfig> {
    let mut config = PluginConfig::load(cli.config.as_deref())?;
    if let Some(hostname) = &cli.hostname {
        config.hostname = hostname.clone();
    }
    if let Some(username) = &cli.username {
        config.username = username.clone();
    }
    if let Some(passhash) = &cli.passhash {
        config.passhash = passhash.clone();
    }
    if let Some(secs) = cli.cache_timeout {
        config.cache_timeout_secs = secs;
    }
    if cli.tz_auto_adjust {
        config.tz_auto_adjust = true;
    }
    Ok(config)
}

fn template_service(vars: &[String]) -> Result<StaticTemplateService> {
    let mut templates = StaticTemplateService::new();
    for var in vars {
        let Some((name, value)) = var.split_once('=') else {
            bail!("template variable must be NAME=VALUE: {var}");
        };
        templates.set(name.trim(), value);
    }
    Ok(templates)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

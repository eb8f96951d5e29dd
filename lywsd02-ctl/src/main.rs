//! Sync tool for LYWSD02 thermometers
//!
//! Writes the current time, timezone offset and display settings to a device
//! over BLE. Defaults live in $LYWSD02_HOME/config.json.

use std::error::Error;
use std::io::Read;

use clap::{Args, Parser, Subcommand};
use lywsd02_sync::proto::{ClockMode, TemperatureUnit};
use lywsd02_sync::{
    BleHost, DEFAULT_TIMEOUT_SECS, SyncConfig, SyncReport, SyncRequest, Synchronizer,
};

#[derive(Parser)]
#[command(name = "lywsd02-ctl")]
#[command(about = "Set the clock and display units of LYWSD02 thermometers")]
struct Cli {
    /// Log every protocol step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync time and settings to one device
    Sync(SyncArgs),
    /// Run sync requests given as JSON, a single object or an array
    Request {
        /// JSON text, read from stdin when omitted
        json: Option<String>,
    },
    /// Show or change the defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List timezone names
    Timezones,
}

#[derive(Args)]
struct SyncArgs {
    /// Device address, e.g. E7:2E:00:12:34:56
    address: String,
    /// Timezone name, e.g. Europe/Paris
    #[arg(short, long)]
    timezone: Option<String>,
    /// UTC offset in hours, overrides the timezone
    #[arg(short, long, allow_hyphen_values = true)]
    offset: Option<i32>,
    /// Temperature unit, C or F
    #[arg(short, long)]
    unit: Option<TemperatureUnit>,
    /// Clock mode, 12 or 24
    #[arg(short, long)]
    clock_mode: Option<ClockMode>,
    /// UTC epoch seconds to send instead of now
    #[arg(long)]
    timestamp: Option<i64>,
    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

impl SyncArgs {
    fn into_request(self) -> SyncRequest {
        let mut request = SyncRequest::new(self.address).with_timeout_secs(self.timeout);
        request.timezone = self.timezone;
        request.offset_hours = self.offset;
        request.temperature_unit = self.unit;
        request.clock_mode = self.clock_mode;
        request.epoch_override = self.timestamp;
        request
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current defaults
    Show,
    /// Change defaults
    Set {
        /// Default timezone name
        #[arg(long)]
        timezone: Option<String>,
        /// Default temperature unit: C, F, or none to leave the device as is
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        connect_settle_ms: Option<u64>,
        #[arg(long)]
        write_settle_ms: Option<u64>,
        #[arg(long)]
        scan_secs: Option<u64>,
        /// Fail instead of sending offset 0 when the timezone is unknown
        #[arg(long)]
        strict_timezone: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli.command).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Sync(args) => sync_all(vec![args.into_request()]).await,
        Commands::Request { json } => {
            let json = match json {
                Some(json) => json,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            sync_all(parse_requests(&json)?).await
        }
        Commands::Config { action } => configure(action),
        Commands::Timezones => {
            for name in lywsd02_sync::timezone_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn parse_requests(json: &str) -> Result<Vec<SyncRequest>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|request| vec![request])
    }
}

/// Reject malformed requests before touching config or the adapter
fn check_requests(requests: &[SyncRequest]) -> Result<(), Box<dyn Error>> {
    if requests.is_empty() {
        return Err("no sync requests given".into());
    }
    for request in requests {
        request.validate()?;
    }
    Ok(())
}

async fn sync_all(requests: Vec<SyncRequest>) -> Result<(), Box<dyn Error>> {
    check_requests(&requests)?;

    let config = SyncConfig::load()?;
    let host = BleHost::default_adapter(config.scan_duration()).await?;
    let sync = Synchronizer::new(host.clone(), host, config);

    let outcomes = sync.synchronize_many(&requests).await;
    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    for report in outcomes.iter().flatten() {
        print_report(report);
    }

    if failed > 0 {
        return Err(format!("{failed} of {} syncs failed", outcomes.len()).into());
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{}:", report.address);
    for record in &report.written {
        println!("  {:<9} {}  {}", record.step, record.characteristic, record.hex());
    }
}

fn configure(action: ConfigAction) -> Result<(), Box<dyn Error>> {
    let mut config = SyncConfig::load()?;
    match action {
        ConfigAction::Show => {}
        ConfigAction::Set {
            timezone,
            unit,
            connect_settle_ms,
            write_settle_ms,
            scan_secs,
            strict_timezone,
        } => {
            if let Some(timezone) = timezone {
                config.set_timezone(&timezone)?;
            }
            if let Some(unit) = unit {
                config.temperature_unit = parse_default_unit(&unit)?;
            }
            if let Some(ms) = connect_settle_ms {
                config.connect_settle_ms = ms;
            }
            if let Some(ms) = write_settle_ms {
                config.write_settle_ms = ms;
            }
            if let Some(secs) = scan_secs {
                config.scan_secs = secs;
            }
            if let Some(strict) = strict_timezone {
                config.strict_timezone = strict;
            }
            let path = config.save()?;
            println!("Saved {}", path.display());
        }
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn parse_default_unit(s: &str) -> Result<Option<TemperatureUnit>, Box<dyn Error>> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(s.parse()?))
}

use anyhow::{Context, Result};
use clap::Parser;
use doorsensor::{
    CycleOutcome, DoorInput, DoorMonitor, DoorsensorConfig, MockDoorInput, PinLevel, SysfsGpio,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "doorsensor")]
#[command(about = "Door state sensor daemon with an append-only transition log")]
#[command(version)]
#[command(long_about = "Watches a reed switch on a GPIO pin, appends every change of door \
state to a human readable log and announces it over zephyr. Kerberos tickets and AFS tokens \
for the notifiers are expected to be kept alive externally, e.g. by k5start.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "doorsensor.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the sensor")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - open the input and report the door state without logging
    #[arg(long, help = "Open the input, print the current door state and exit")]
    dry_run: bool,

    /// Run a single detection cycle and exit
    #[arg(long, help = "Run one detection cycle, appending a record if the state changed")]
    once: bool,

    /// Use an in-memory input instead of GPIO
    #[arg(long, help = "Simulate the door input instead of opening the GPIO pin")]
    simulate: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args);

    info!("Starting door sensor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = DoorsensorConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let input = open_input(&config, args.simulate)?;

    let monitor = Arc::new(DoorMonitor::from_config(&config, input).map_err(|e| {
        error!("Failed to create door monitor: {}", e);
        e
    })?);

    if args.dry_run {
        let state = monitor.current_state()?;
        let last = monitor.last_record().await?;
        println!("✓ Door is currently {}", state);
        match last {
            Some(record) => println!("  Last logged state: {} at {}", record.state, record.timestamp),
            None => println!("  No transitions logged yet"),
        }
        return Ok(());
    }

    if args.once {
        return match monitor.cycle().await {
            Ok(CycleOutcome::Recorded(record)) => {
                println!("Recorded: door {}", record.state);
                Ok(())
            }
            Ok(CycleOutcome::Unchanged(state)) => {
                println!("Unchanged: door {}", state);
                Ok(())
            }
            Err(e) => {
                error!("Detection cycle failed: {}", e);
                Err(e.into())
            }
        };
    }

    let exit_code = monitor.run_until_shutdown().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Door sensor exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

/// Open the hardware input; failure here is an unrecoverable startup error
fn open_input(config: &DoorsensorConfig, simulate: bool) -> Result<Arc<dyn DoorInput>> {
    if simulate {
        let closed_level = match config.sensor.open_level {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        };
        info!("Simulating door input (door closed)");
        return Ok(Arc::new(MockDoorInput::new(closed_level)));
    }

    let gpio = SysfsGpio::open_at(&config.sensor.sysfs_root, config.sensor.pin)
        .with_context(|| format!("Failed to initialize GPIO {}", config.sensor.pin))?;
    Ok(Arc::new(gpio))
}

fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("doorsensor={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Door sensor configuration file");
    println!("# This is the default configuration with all available options");
    println!("# Environment overrides use DOORSENSOR_<SECTION>__<KEY>, e.g. DOORSENSOR_SENSOR__PIN=17");
    println!();
    println!("{}", DoorsensorConfig::default().to_toml()?);
    Ok(())
}

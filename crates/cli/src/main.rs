//! hs80 CLI: command-line lighting control and event monitor.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hs80_core::color::{Color, Zone};
use hs80_core::config::Config;
use hs80_core::directory;
use hs80_core::event::HeadsetEvent;
use hs80_core::session::DeviceSession;
use hs80_core::{EVENT_USAGE, LIGHTING_USAGE, VENDOR_USAGE_PAGE};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(
    name = "hs80",
    version,
    about = "Lighting control and event monitor for the Corsair HS80 headset"
)]
struct Cli {
    /// JSON file overriding device IDs and protocol timing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// How long a lighting change stays on the LEDs.
///
/// Hardware lighting comes back when the command exits.
#[derive(Args)]
struct HoldArgs {
    /// Hold for this many seconds instead of until Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List HID interfaces of the headset.
    ListDevices {
        /// Show every HID interface, not just the configured vendor's.
        #[arg(long)]
        all: bool,
    },
    /// Set all zones to one color (name or #RRGGBB) and hold it until Ctrl-C.
    Color {
        color: String,
        #[command(flatten)]
        hold: HoldArgs,
    },
    /// Set one zone (logo, power, mic, or all) and hold it until Ctrl-C.
    Zone {
        zone: String,
        color: String,
        #[command(flatten)]
        hold: HoldArgs,
    },
    /// Set LED brightness in percent (clamped to 0-100) and hold it until Ctrl-C.
    Brightness {
        #[arg(allow_hyphen_values = true)]
        percent: i32,
        #[command(flatten)]
        hold: HoldArgs,
    },
    /// Sweep the hue wheel once, then return to hardware lighting.
    Rainbow {
        #[arg(long, default_value_t = 10_000)]
        duration_ms: u64,
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },
    /// Fade a color in and out, then return to hardware lighting.
    Pulse {
        color: String,
        #[arg(long, default_value_t = 3)]
        cycles: u32,
        #[arg(long, default_value_t = 50)]
        step_ms: u64,
    },
    /// Turn all LEDs off until Ctrl-C.
    Off {
        #[command(flatten)]
        hold: HoldArgs,
    },
    /// Print headset events (battery, charging, mute, volume) until Ctrl-C.
    Monitor {
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

/// Install a Ctrl-C handler that clears the returned flag.
///
/// Commands poll the flag and return normally, so the session's `Drop`
/// restores hardware lighting.
fn setup_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(running)
}

fn hold(session: &mut DeviceSession, args: &HoldArgs, running: &AtomicBool) -> Result<()> {
    match args.seconds {
        Some(seconds) => println!("Holding for {seconds}s (Ctrl-C to stop early)"),
        None => println!("Holding until Ctrl-C"),
    }
    session.hold(args.seconds.map(Duration::from_secs), running)?;
    println!("Restoring hardware lighting");
    Ok(())
}

fn parse_color(name: &str) -> Result<Color> {
    Color::from_name(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown color '{}'. Use red, green, blue, cyan, magenta, yellow, white, off, or #RRGGBB",
            name
        )
    })
}

fn open_session(config: &Config) -> Result<DeviceSession> {
    let mut session = DeviceSession::new(config.clone());
    if let Err(e) = session.connect() {
        if e.is_permission_denied() {
            eprintln!("Access to the headset was denied; check udev rules or run with elevated privileges.");
        }
        return Err(e).context("connect to headset");
    }
    if let Some(dev) = session.lighting().descriptor() {
        println!("Connected to {} (lighting: {})", dev.display_name(), dev.path);
    }
    if let Some(dev) = session.events().descriptor() {
        println!("Event interface: {}", dev.path);
    }
    Ok(session)
}

fn print_event(event: &HeadsetEvent) {
    println!("[{:>2} bytes] {:02X?}  {}", event.len(), event.bytes(), event);
}

fn list_devices(config: &Config, all: bool) {
    let vid = if all { 0 } else { config.vendor_id };
    let devices = directory::enumerate(vid, 0);
    if devices.is_empty() {
        println!("No matching HID devices found.");
        println!("Ensure the headset receiver is plugged in and permissions are set up.");
        return;
    }
    for dev in &devices {
        let role = match (dev.usage_page, dev.usage) {
            (VENDOR_USAGE_PAGE, LIGHTING_USAGE) => "  <- lighting",
            (VENDOR_USAGE_PAGE, EVENT_USAGE) => "  <- events",
            _ => "",
        };
        println!(
            "{} (VID: 0x{:04X}, PID: 0x{:04X}, usage page: 0x{:04X}, usage: 0x{:04X}, path: {}){}",
            dev.display_name(),
            dev.vendor_id,
            dev.product_id,
            dev.usage_page,
            dev.usage,
            dev.path,
            role
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::ListDevices { all } => list_devices(&config, all),
        Commands::Color { color, hold: args } => {
            let color = parse_color(&color)?;
            let running = setup_interrupt_handler()?;
            let mut session = open_session(&config)?;
            session.set_color(color)?;
            println!("Color set to {color}");
            hold(&mut session, &args, &running)?;
        }
        Commands::Zone {
            zone,
            color,
            hold: args,
        } => {
            let parsed_zone = Zone::from_name(&zone).ok_or_else(|| {
                anyhow::anyhow!("Unknown zone '{}'. Valid zones: logo, power, mic, all", zone)
            })?;
            let color = parse_color(&color)?;
            let running = setup_interrupt_handler()?;
            let mut session = open_session(&config)?;
            session.set_zone(parsed_zone, color)?;
            println!("Zone {parsed_zone} set to {color}");
            hold(&mut session, &args, &running)?;
        }
        Commands::Brightness {
            percent,
            hold: args,
        } => {
            let running = setup_interrupt_handler()?;
            let mut session = open_session(&config)?;
            session.set_brightness(percent)?;
            println!("Brightness set to {}%", session.lighting().brightness());
            hold(&mut session, &args, &running)?;
        }
        Commands::Rainbow {
            duration_ms,
            step_ms,
        } => {
            let running = setup_interrupt_handler()?;
            let session = open_session(&config)?;
            session.lighting().rainbow_while(
                Duration::from_millis(duration_ms),
                Duration::from_millis(step_ms),
                || running.load(Ordering::SeqCst),
            )?;
        }
        Commands::Pulse {
            color,
            cycles,
            step_ms,
        } => {
            let color = parse_color(&color)?;
            let running = setup_interrupt_handler()?;
            let session = open_session(&config)?;
            session.lighting().pulse_while(
                color,
                cycles,
                Duration::from_millis(step_ms),
                || running.load(Ordering::SeqCst),
            )?;
        }
        Commands::Off { hold: args } => {
            let running = setup_interrupt_handler()?;
            let mut session = open_session(&config)?;
            session.lighting().off()?;
            println!("LEDs off");
            hold(&mut session, &args, &running)?;
        }
        Commands::Monitor { seconds } => {
            let running = setup_interrupt_handler()?;
            let mut session = open_session(&config)?;
            session.start_monitoring(print_event)?;
            match seconds {
                Some(seconds) => println!("Monitoring headset events for {seconds}s"),
                None => println!("Monitoring headset events until Ctrl-C"),
            }
            let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
            while running.load(Ordering::SeqCst)
                && deadline.map_or(true, |deadline| Instant::now() < deadline)
            {
                if !session.events().is_monitoring() {
                    anyhow::bail!("event monitoring stopped after a read error");
                }
                std::thread::sleep(Duration::from_millis(250));
            }
        }
    }

    Ok(())
}

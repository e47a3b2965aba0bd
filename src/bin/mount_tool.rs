//! Command-line tool for the MantelMount MM860.
//!
//! Subcommands:
//! - `query`: one status round-trip, pretty-printed
//! - `watch`: poll continuously, reporting movement and preset changes
//! - `jog`/`stop`/`recall`/`save`: movement commands
//! - `clear-fault`/`reboot`: maintenance commands
//! - `send`: raw command escape hatch
//! - `repl`: interactive command loop

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;
use tracing::{info, warn};

use mantelmount::{
    parse_mmq, MmqStatus, MountCommand, MountConfig, MountDevice, MountPoller, Preset,
};

/// MantelMount MM860 control tool
#[derive(Parser, Debug)]
#[command(name = "mount_tool")]
#[command(about = "Control tool for the MantelMount MM860 TV mount")]
#[command(version)]
struct Args {
    /// Mount IP address or hostname
    #[arg(long, global = true, default_value = "192.168.1.81")]
    host: String,

    /// Mount UDP port
    #[arg(long, global = true, default_value_t = mantelmount::DEFAULT_PORT)]
    port: u16,

    /// Reply timeout in seconds
    #[arg(long, global = true, default_value_t = 2.0)]
    timeout: f64,

    /// Poll period in seconds (used by `watch`)
    #[arg(long, global = true, default_value_t = 0.1)]
    poll_interval: f64,

    /// Disable the lock-while-moving safety check
    #[arg(long, global = true)]
    no_lock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query the mount status once
    Query,

    /// Poll continuously, printing movement transitions and learned presets
    Watch,

    /// Jog the mount one step
    Jog {
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Stop all movement
    Stop,

    /// Drive to a stored preset (home, m1..m9)
    Recall {
        #[arg(value_enum)]
        preset: Preset,
    },

    /// Save the current position as a preset on the controller
    Save {
        #[arg(value_enum)]
        preset: Preset,
    },

    /// Clear a latched fault condition
    ClearFault,

    /// Reboot the controller
    Reboot,

    /// Send a raw command string
    Send {
        command: String,

        /// Terminate with CRLF instead of CR
        #[arg(long)]
        crlf: bool,

        /// Do not wait for a reply
        #[arg(long)]
        no_reply: bool,
    },

    /// Interactive command REPL
    Repl,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl From<Direction> for MountCommand {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => MountCommand::JogUp,
            Direction::Down => MountCommand::JogDown,
            Direction::Left => MountCommand::JogLeft,
            Direction::Right => MountCommand::JogRight,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = MountConfig::new(args.host.clone());
    config.port = args.port;
    config.timeout_secs = args.timeout;
    config.poll_interval_secs = args.poll_interval;
    config.lock_while_moving = !args.no_lock;

    let mut device = MountDevice::new(config);

    match args.command {
        Command::Query => cmd_query(&mut device).await,
        Command::Watch => cmd_watch(device).await,
        Command::Jog { direction } => cmd_send(&mut device, direction.into()).await,
        Command::Stop => cmd_send(&mut device, MountCommand::Stop).await,
        Command::Recall { preset } => cmd_send(&mut device, MountCommand::Recall(preset)).await,
        Command::Save { preset } => cmd_send(&mut device, MountCommand::SavePreset(preset)).await,
        Command::ClearFault => cmd_send(&mut device, MountCommand::ClearFault).await,
        Command::Reboot => cmd_send(&mut device, MountCommand::Reboot).await,
        Command::Send {
            command,
            crlf,
            no_reply,
        } => cmd_raw(&mut device, &command, crlf, !no_reply).await,
        Command::Repl => cmd_repl(&mut device).await,
    }
}

// ==================== Query Command ====================

async fn cmd_query(device: &mut MountDevice) -> Result<()> {
    let data = device.poll_once().await?;

    let Some(status) = data.status else {
        anyhow::bail!("no parseable status reply (raw: {:?})", data.last_raw);
    };

    print_status(&status, data.moving);
    Ok(())
}

fn print_status(status: &MmqStatus, moving: bool) {
    println!("status:         {}", status.status);
    println!("elevation:      {}", status.elevation);
    println!("azimuth:        {}", status.azimuth);
    println!("left actuator:  {}", status.left_actuator);
    println!("right actuator: {}", status.right_actuator);
    println!("last preset:    {}", status.last_recalled_preset());
    println!("temperature:    {} C", status.temperature);
    println!("tv state:       {}", status.tv_state);
    println!("firmware:       {}", status.firmware_version);
    println!("tv current:     {}", status.tv_current);
    println!(
        "motor current:  L={} R={}",
        status.left_motor_current, status.right_motor_current
    );
    println!(
        "at limit:       L={} R={}",
        status.is_left_at_limit(),
        status.is_right_at_limit()
    );
    println!("lost:           {}", status.is_lost());
    println!("moving:         {moving}");
}

// ==================== Watch Command ====================

async fn cmd_watch(mut device: MountDevice) -> Result<()> {
    let interval = device.config().poll_interval();

    device.subscribe_movement_stopped(Box::new(|data| {
        if let Some(status) = &data.status {
            info!(
                "movement stopped at elevation={} azimuth={}",
                status.elevation, status.azimuth
            );
        }
        Ok(())
    }));

    let device = Arc::new(Mutex::new(device));
    let _poller = MountPoller::spawn(device.clone(), interval);

    info!("Watching (Ctrl+C to stop)...");

    let mut last_line = String::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        ticker.tick().await;

        let device = device.lock().await;
        let line = match device.current_status() {
            Some(status) => format!(
                "elevation={} azimuth={} moving={} preset={}",
                status.elevation,
                status.azimuth,
                device.is_moving(),
                device
                    .current_preset()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => "no status yet".to_string(),
        };

        if line != last_line {
            info!("{line}");
            last_line = line;
        }
    }
}

// ==================== Movement / Maintenance Commands ====================

async fn cmd_send(device: &mut MountDevice, command: MountCommand) -> Result<()> {
    // One status round-trip first so the lock check sees fresh motion state.
    if let Err(e) = device.poll_once().await {
        warn!("status poll before command failed: {e}");
    }

    let resp = device.send_command(command).await?;
    if resp.raw.is_empty() {
        info!("command {:?} sent (no reply)", resp.command);
    } else {
        info!("command {:?} replied: {}", resp.command, resp.raw);
    }
    Ok(())
}

async fn cmd_raw(
    device: &mut MountDevice,
    command: &str,
    crlf: bool,
    read_reply: bool,
) -> Result<()> {
    let resp = device.send_raw(command, crlf, read_reply).await?;
    if resp.raw.is_empty() {
        info!("command {:?} sent (no reply)", resp.command);
    } else {
        info!("command {:?} replied: {}", resp.command, resp.raw);
    }
    Ok(())
}

// ==================== REPL Command ====================

async fn cmd_repl(device: &mut MountDevice) -> Result<()> {
    println!("MM860 REPL - enter raw commands, 'quit' to exit");
    println!("Examples: MMQ, MMJ0, MMR1, MMS2");
    println!();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break; // EOF
        }

        let cmd = input.trim();
        if cmd.is_empty() {
            continue;
        }

        if cmd.eq_ignore_ascii_case("quit") || cmd.eq_ignore_ascii_case("exit") {
            println!("Bye!");
            break;
        }

        // The status query gets CRLF and a pretty print; everything else is
        // sent verbatim with CR.
        let is_query = cmd.eq_ignore_ascii_case("MMQ");
        match device.send_raw(cmd, is_query, true).await {
            Ok(resp) if resp.raw.is_empty() => println!("(no reply)"),
            Ok(resp) => match parse_mmq(&resp.raw) {
                Some(status) => print_status(&status, false),
                None => println!("{}", resp.raw),
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}

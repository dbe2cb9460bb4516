use clap::Parser;
use serial_console::config::{parse_max_lines, Config, ConfigLoader, STANDARD_BAUD_RATES};
use serial_console::port::{list_ports, ConnectionConfig, DataBits, FlowControl, Parity, StopBits};
use serial_console::{
    logging, Console, ConsoleOptions, MockPortOpener, MockSerialPort, PortOpener,
    SystemPortOpener, TerminalSurface, Terminator,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-console",
    version,
    about = "Interactive serial terminal with timestamped, raw and line-capped receive view.",
    long_about = "Relays bytes between a serial device and the terminal. Received data is printed to stdout; \
                  typed lines are transmitted with the selected terminator. Lines starting with ':' are \
                  console commands (type :help)."
)]
struct Args {
    /// Serial port to open at startup (e.g. /dev/ttyUSB0, COM3).
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits: 5, 6, 7 or 8.
    #[arg(long)]
    data_bits: Option<DataBits>,

    /// Parity: none, even, odd, mark, space.
    #[arg(long)]
    parity: Option<Parity>,

    /// Stop bits: 1 or 2.
    #[arg(long)]
    stop_bits: Option<StopBits>,

    /// Flow control: none, software, rts_cts, dsr_dtr.
    #[arg(long)]
    flow_control: Option<FlowControl>,

    /// Line terminator appended to sent text: none, cr, lf, crlf.
    #[arg(short, long)]
    terminator: Option<Terminator>,

    /// Prefix received data with [HH:MM:SS.mmm].
    #[arg(long)]
    timestamp: bool,

    /// Show received bytes as escape sequences.
    #[arg(long)]
    raw: bool,

    /// Maximum number of lines kept in the receive view.
    #[arg(long, value_parser = parse_max_lines)]
    max_lines: Option<usize>,

    /// Configuration file (overrides the standard search path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// Use an in-memory loopback device instead of real hardware.
    #[arg(long)]
    mock: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(bits) = self.data_bits {
            config.serial.data_bits = bits;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity;
        }
        if let Some(bits) = self.stop_bits {
            config.serial.stop_bits = bits;
        }
        if let Some(flow) = self.flow_control {
            config.serial.flow_control = flow;
        }
        if let Some(terminator) = self.terminator {
            config.transmit.terminator = terminator;
        }
        if self.timestamp {
            config.display.timestamp = true;
        }
        if self.raw {
            config.display.raw = true;
        }
        if let Some(max_lines) = self.max_lines {
            config.display.max_lines = max_lines;
        }
    }
}

const MOCK_PORT_NAME: &str = "MOCK0";

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.list_ports {
        let ports = list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found.");
        }
        for port in ports {
            println!("{port}");
        }
        let rates: Vec<String> = STANDARD_BAUD_RATES.iter().map(u32::to_string).collect();
        println!("Standard baud rates: {}", rates.join(", "));
        return Ok(());
    }

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    args.apply_to(&mut config);
    config.validate()?;

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: logging disabled: {e}");
    }

    if args.mock {
        if config.serial.port.is_empty() {
            config.serial.port = MOCK_PORT_NAME.to_string();
        }
        let opener = MockPortOpener::new(MockSerialPort::loopback(config.serial.port.clone()));
        run(opener, &config).await
    } else {
        run(SystemPortOpener, &config).await
    }
}

async fn run<O: PortOpener>(opener: O, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut console = Console::new(opener, TerminalSurface::new(), ConsoleOptions::from(config))?;
    let mut serial = config.serial.connection_config();

    eprintln!("serial-console {} (type :help for commands)", env!("CARGO_PKG_VERSION"));
    // Device open and worker joins block; keep them off the async workers.
    if !serial.port_name.is_empty() {
        task::block_in_place(|| open_and_report(&console, &serial));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut health = tokio::time::interval(Duration::from_millis(500));
    let mut fault_reported = false;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = health.tick() => {
                let faulted = console.is_faulted();
                if faulted && !fault_reported {
                    eprintln!("! device stopped responding; use :close then :open to reconnect");
                }
                fault_reported = faulted;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        task::block_in_place(|| execute(&mut console, &mut serial, command));
                    }
                    Err(message) => eprintln!("! {message}"),
                }
            }
        }
    }

    task::block_in_place(|| console.shutdown());
    Ok(())
}

/// A line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Open {
        port: Option<String>,
        baud: Option<u32>,
    },
    Close,
    Status,
    History,
    ClearHistory,
    Send(usize),
    Timestamp(bool),
    Raw(bool),
    Eol(Terminator),
    MaxLines(String),
    Clear,
    Help,
    Quit,
    Transmit(String),
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        // "::" sends a literal leading colon.
        if let Some(rest) = line.strip_prefix("::") {
            return Ok(Self::Transmit(format!(":{rest}")));
        }
        let Some(command) = line.strip_prefix(':') else {
            return Ok(Self::Transmit(line.to_string()));
        };

        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default();
        let arg = words.next();
        match name {
            "open" => {
                let baud = words
                    .next()
                    .map(|b| b.parse().map_err(|_| format!("invalid baud rate '{b}'")))
                    .transpose()?;
                Ok(Self::Open {
                    port: arg.map(str::to_string),
                    baud,
                })
            }
            "close" => Ok(Self::Close),
            "status" => Ok(Self::Status),
            "history" => Ok(Self::History),
            "clear-history" => Ok(Self::ClearHistory),
            "send" => {
                let index = arg.ok_or("usage: :send N")?;
                index
                    .parse()
                    .map(Self::Send)
                    .map_err(|_| format!("invalid history index '{index}'"))
            }
            "ts" => parse_switch(arg).map(Self::Timestamp),
            "raw" => parse_switch(arg).map(Self::Raw),
            "eol" => arg.ok_or("usage: :eol none|cr|lf|crlf")?.parse().map(Self::Eol),
            "max-lines" => Ok(Self::MaxLines(arg.unwrap_or_default().to_string())),
            "clear" => Ok(Self::Clear),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command ':{other}' (try :help)")),
        }
    }
}

fn parse_switch(arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("expected 'on' or 'off'".to_string()),
    }
}

fn execute<O: PortOpener>(
    console: &mut Console<O, TerminalSurface>,
    serial: &mut ConnectionConfig,
    command: Command,
) {
    match command {
        Command::Open { port, baud } => {
            if let Some(port) = port {
                serial.port_name = port;
            }
            if let Some(baud) = baud {
                serial.baud_rate = baud;
            }
            if serial.port_name.is_empty() {
                eprintln!("! no port selected; use :open PORT [BAUD]");
                return;
            }
            open_and_report(console, serial);
        }
        Command::Close => {
            console.close();
            eprintln!("* closed");
        }
        Command::Status => match (console.connection_config(), console.stats()) {
            (Some(active), Some(stats)) => eprintln!(
                "* open: {active}; read {} B, wrote {} B, dropped {}, errors {}{}",
                stats.bytes_read,
                stats.bytes_written,
                stats.inbound_dropped,
                stats.device_errors,
                if stats.faulted { " (faulted)" } else { "" }
            ),
            _ => eprintln!("* closed"),
        },
        Command::History => {
            for (index, entry) in console.history().iter().enumerate() {
                eprintln!("{index:>4}  {entry}");
            }
        }
        Command::ClearHistory => {
            console.clear_history();
            eprintln!("* history cleared");
        }
        Command::Send(index) => match console.transmit_history(index) {
            Ok(Some(_)) => {}
            Ok(None) => eprintln!("! no history entry {index}"),
            Err(e) => eprintln!("! {e}"),
        },
        Command::Timestamp(enabled) => console.set_timestamp(enabled),
        Command::Raw(enabled) => console.set_raw(enabled),
        Command::Eol(terminator) => console.set_terminator(terminator),
        Command::MaxLines(input) => match console.set_max_lines_input(&input) {
            Ok(n) => eprintln!("* keeping at most {n} lines"),
            Err(e) => eprintln!("! {e}; keeping {}", console.settings().max_lines),
        },
        Command::Clear => console.clear_display(),
        Command::Help => print_help(),
        Command::Transmit(text) => {
            if let Err(e) = console.transmit(&text) {
                eprintln!("! {e}");
            }
        }
        Command::Quit => {}
    }
}

fn open_and_report<O: PortOpener>(console: &Console<O, TerminalSurface>, serial: &ConnectionConfig) {
    match console.open(serial.clone()) {
        Ok(()) => eprintln!("* opened {serial}"),
        Err(e) => eprintln!("! {e}"),
    }
}

fn print_help() {
    eprintln!(
        "\
:open [PORT [BAUD]]  open the serial port
:close               close the serial port
:status              connection state and counters
:history             list previously sent lines (0 = newest)
:send N              re-send history entry N
:clear-history       forget previously sent lines
:ts on|off           timestamp prefix
:raw on|off          show escape sequences
:eol MODE            terminator: none, cr, lf, crlf
:max-lines N         receive view line cap
:clear               clear the receive view
:quit                exit
::text               send text starting with ':'"
    );
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    eprintln!("\nSignal received, shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_transmitted() {
        assert_eq!(
            Command::parse("AT+GMR").unwrap(),
            Command::Transmit("AT+GMR".to_string())
        );
        assert_eq!(Command::parse("").unwrap(), Command::Transmit(String::new()));
        assert_eq!(
            Command::parse("::x").unwrap(),
            Command::Transmit(":x".to_string())
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            Command::parse(":open /dev/ttyUSB0 115200").unwrap(),
            Command::Open {
                port: Some("/dev/ttyUSB0".to_string()),
                baud: Some(115200)
            }
        );
        assert_eq!(Command::parse(":send 2").unwrap(), Command::Send(2));
        assert_eq!(Command::parse(":ts on").unwrap(), Command::Timestamp(true));
        assert_eq!(Command::parse(":raw off").unwrap(), Command::Raw(false));
        assert_eq!(
            Command::parse(":eol CRLF").unwrap(),
            Command::Eol(Terminator::CrLf)
        );
        assert_eq!(
            Command::parse(":clear-history").unwrap(),
            Command::ClearHistory
        );
        assert_eq!(Command::parse(":quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_bad_commands_are_rejected() {
        assert!(Command::parse(":send x").is_err());
        assert!(Command::parse(":ts maybe").is_err());
        assert!(Command::parse(":open COM3 fast").is_err());
        assert!(Command::parse(":bogus").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "serial-console",
            "--port",
            "COM4",
            "--baud",
            "115200",
            "--parity",
            "odd",
            "--terminator",
            "lf",
            "--max-lines",
            "64",
            "--raw",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.serial.port, "COM4");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.parity, Parity::Odd);
        assert_eq!(config.transmit.terminator, Terminator::Lf);
        assert_eq!(config.display.max_lines, 64);
        assert!(config.display.raw);
    }

    #[test]
    fn test_invalid_max_lines_flag_rejected() {
        assert!(Args::try_parse_from(["serial-console", "--max-lines", "0"]).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_close_does_not_stall_runtime() {
        use serial_console::worker::WorkerSettings;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let options = ConsoleOptions {
            workers: WorkerSettings {
                poll_interval: Duration::from_millis(300),
                ..WorkerSettings::default()
            },
            ..ConsoleOptions::default()
        };
        let opener = MockPortOpener::new(MockSerialPort::new("MOCK0"));
        let mut console = Console::new(opener, TerminalSurface::new(), options).unwrap();
        let mut serial = ConnectionConfig::new("MOCK0", 9600);
        let open = Command::Open {
            port: None,
            baud: None,
        };
        task::block_in_place(|| execute(&mut console, &mut serial, open));
        assert!(console.is_open());

        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let before = ticks.load(Ordering::Relaxed);
        task::block_in_place(|| execute(&mut console, &mut serial, Command::Close));
        assert!(!console.is_open());
        // Other tasks kept running while the worker was being joined.
        assert!(ticks.load(Ordering::Relaxed) > before + 3);

        ticker.abort();
        task::block_in_place(|| console.shutdown());
    }
}

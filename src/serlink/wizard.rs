use std::fmt;
use std::io::{self, BufRead, Write};

use clap::Args;

use serlink::config::{
    BaudRate, CharSize, FlowMode, LineConfig, ParityMode, StopBitsMode, Terminator,
};
use serlink::error::{ConfigError, LinkError, LinkResult};
use serlink::ports::discover_ports;

/// Line parameters, all optional on the command line; the wizard prompts
/// for whatever is missing, so a fully-flagged invocation never asks.
#[derive(Args, Debug, Clone)]
pub(crate) struct LineArgs {
    /// Serial device path
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate (150..115200)
    #[arg(short, long)]
    pub baud: Option<String>,

    /// Character size, 7 or 8
    #[arg(short, long)]
    pub char_size: Option<String>,

    /// Parity: NONE, EVEN or ODD
    #[arg(long)]
    pub parity: Option<String>,

    /// Flow control: NONE, XON_XOFF, RTS_CTS or DTR_DSR
    #[arg(short, long)]
    pub flow: Option<String>,

    /// Stop bits, 1 or 2
    #[arg(short, long)]
    pub stop_bits: Option<String>,

    /// Message terminator in escape notation, e.g. "\r\n"
    #[arg(short, long)]
    pub terminator: Option<String>,
}

/// Collect a complete, validated configuration. Command-line tokens go
/// through the same per-field validation as typed answers; a bad flag is
/// fatal, a bad answer re-prompts.
pub(crate) fn collect(args: &LineArgs) -> LinkResult<LineConfig> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let path = match &args.port {
        Some(p) if !p.trim().is_empty() => p.trim().to_string(),
        Some(_) => return Err(ConfigError::EmptyDevicePath.into()),
        None => ask_port(&mut input)?,
    };
    let baud = field(&args.baud, || ask(&mut input, "baud rate", BaudRate::ALL))?;
    let char_size = field(&args.char_size, || {
        ask(&mut input, "character size", CharSize::ALL)
    })?;
    let parity = field(&args.parity, || ask(&mut input, "parity", ParityMode::ALL))?;
    let flow = field(&args.flow, || {
        ask(&mut input, "flow control", FlowMode::ALL)
    })?;
    let stop_bits = field(&args.stop_bits, || {
        ask(&mut input, "stop bits", StopBitsMode::ALL)
    })?;
    let terminator = match &args.terminator {
        Some(spec) => Terminator::parse(spec)?,
        None => ask_terminator(&mut input)?,
    };

    let config = LineConfig {
        path,
        baud,
        char_size,
        parity,
        stop_bits,
        flow,
        terminator,
    };

    println!("Selected configuration:");
    println!("  Port:           {}", config.path);
    println!("  Baudrate:       {}", config.baud);
    println!("  Character size: {}", config.char_size);
    println!("  Parity:         {}", config.parity);
    println!("  Flow control:   {}", config.flow);
    println!("  Stop bits:      {}", config.stop_bits);
    println!("  Terminator:     {}", config.terminator);

    Ok(config)
}

/// Use the command-line token when present, otherwise run the prompt loop.
fn field<T, F>(flag: &Option<String>, prompt_loop: F) -> LinkResult<T>
where
    T: std::str::FromStr<Err = ConfigError>,
    F: FnOnce() -> LinkResult<T>,
{
    match flag {
        Some(token) => Ok(token.parse()?),
        None => prompt_loop(),
    }
}

fn ask<T>(input: &mut impl BufRead, label: &str, choices: &[T]) -> LinkResult<T>
where
    T: Copy + fmt::Display + std::str::FromStr<Err = ConfigError>,
{
    loop {
        println!("Available {label} options:");
        for choice in choices {
            println!("  - {choice}");
        }
        let answer = prompt(input, &format!("Enter {label}: "))?;
        match answer.parse() {
            Ok(value) => return Ok(value),
            Err(e) => println!("{e}"),
        }
    }
}

fn ask_port(input: &mut impl BufRead) -> LinkResult<String> {
    let known = discover_ports();
    loop {
        if known.is_empty() {
            println!("No serial devices found.");
        } else {
            println!("Available ports:");
            for port in &known {
                println!("  - {port}");
            }
        }
        let answer = prompt(input, "Select port (enter full path): ")?;
        if answer.trim().is_empty() {
            println!("{}", ConfigError::EmptyDevicePath);
            continue;
        }
        let answer = answer.trim().to_string();
        if !known.contains(&answer) {
            println!("Note: {answer} is not in the discovered list, using it anyway.");
        }
        return Ok(answer);
    }
}

fn ask_terminator(input: &mut impl BufRead) -> LinkResult<Terminator> {
    loop {
        println!("Terminator:");
        println!("  1. Standard CR");
        println!("  2. Standard LF");
        println!("  3. Standard CR+LF");
        println!("  4. Custom 1 or 2 byte escape sequence");
        let option = prompt(input, "Enter option: ")?;
        match option.trim() {
            "1" => return Ok(Terminator::cr()),
            "2" => return Ok(Terminator::lf()),
            "3" => return Ok(Terminator::crlf()),
            "4" => {
                let spec = prompt(input, "Enter custom terminator: ")?;
                match Terminator::parse(&spec) {
                    Ok(terminator) => return Ok(terminator),
                    Err(e) => println!("{e}"),
                }
            }
            _ => println!("Invalid option."),
        }
    }
}

fn prompt(input: &mut impl BufRead, text: &str) -> LinkResult<String> {
    print!("{text}");
    io::stdout().flush().map_err(LinkError::Terminal)?;

    let mut line = String::new();
    let n = input.read_line(&mut line).map_err(LinkError::Terminal)?;
    if n == 0 {
        return Err(LinkError::Terminal(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stdin closed during configuration",
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

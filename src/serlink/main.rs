use clap::Parser;
use serlink::error::LinkResult;

mod session;
mod wizard;

/// Raw RS-232 terminal: terminator framing, optional DTR/DSR handshake,
/// and a link liveness probe.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    line: wizard::LineArgs,
}

fn main() -> LinkResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let config = wizard::collect(&cli.line)?;
    session::run(config)
}

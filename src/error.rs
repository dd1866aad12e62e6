use thiserror::Error;

/// Rejections produced while validating user-supplied line parameters.
/// Each variant names the offending field; nothing here touches a device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("device path must not be empty")]
    EmptyDevicePath,

    #[error("unsupported baud rate: {0}")]
    BaudRate(String),

    #[error("unsupported character size: {0} (expected 7 or 8)")]
    CharSize(String),

    #[error("unknown parity mode: {0}")]
    Parity(String),

    #[error("unknown flow control mode: {0}")]
    FlowControl(String),

    #[error("unsupported stop bit count: {0} (expected 1 or 2)")]
    StopBits(String),

    #[error("terminator must be 1 or 2 bytes, got {0}")]
    TerminatorLength(usize),

    #[error("invalid escape sequence in terminator: {0}")]
    TerminatorEscape(String),
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("link is closed")]
    Closed,

    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("modem control access failed: {0}")]
    ModemControl(#[source] serialport::Error),

    #[error("terminal I/O failed: {0}")]
    Terminal(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;

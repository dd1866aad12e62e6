use std::fmt;
use std::str::FromStr;

use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::error::ConfigError;
use crate::util::hex_dump;

/// Line speeds the driver accepts. A closed set: anything else is rejected
/// during validation and can never reach an open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B150,
    B300,
    B600,
    B1200,
    B1800,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub const ALL: &'static [BaudRate] = &[
        BaudRate::B150,
        BaudRate::B300,
        BaudRate::B600,
        BaudRate::B1200,
        BaudRate::B1800,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];

    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B150 => 150,
            BaudRate::B300 => 300,
            BaudRate::B600 => 600,
            BaudRate::B1200 => 1200,
            BaudRate::B1800 => 1800,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl FromStr for BaudRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.bits_per_second().to_string() == s.trim())
            .ok_or_else(|| ConfigError::BaudRate(s.to_string()))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSize {
    Seven,
    Eight,
}

impl CharSize {
    pub const ALL: &'static [CharSize] = &[CharSize::Seven, CharSize::Eight];

    pub fn data_bits(self) -> DataBits {
        match self {
            CharSize::Seven => DataBits::Seven,
            CharSize::Eight => DataBits::Eight,
        }
    }
}

impl FromStr for CharSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7" => Ok(CharSize::Seven),
            "8" => Ok(CharSize::Eight),
            other => Err(ConfigError::CharSize(other.to_string())),
        }
    }
}

impl fmt::Display for CharSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharSize::Seven => write!(f, "7"),
            CharSize::Eight => write!(f, "8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityMode {
    None,
    Even,
    Odd,
}

impl ParityMode {
    pub const ALL: &'static [ParityMode] = &[ParityMode::None, ParityMode::Even, ParityMode::Odd];

    pub fn parity(self) -> Parity {
        match self {
            ParityMode::None => Parity::None,
            ParityMode::Even => Parity::Even,
            ParityMode::Odd => Parity::Odd,
        }
    }

    fn letter(self) -> char {
        match self {
            ParityMode::None => 'N',
            ParityMode::Even => 'E',
            ParityMode::Odd => 'O',
        }
    }
}

impl FromStr for ParityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("NONE") {
            Ok(ParityMode::None)
        } else if token.eq_ignore_ascii_case("EVEN") {
            Ok(ParityMode::Even)
        } else if token.eq_ignore_ascii_case("ODD") {
            Ok(ParityMode::Odd)
        } else {
            Err(ConfigError::Parity(token.to_string()))
        }
    }
}

impl fmt::Display for ParityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityMode::None => write!(f, "NONE"),
            ParityMode::Even => write!(f, "EVEN"),
            ParityMode::Odd => write!(f, "ODD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBitsMode {
    One,
    Two,
}

impl StopBitsMode {
    pub const ALL: &'static [StopBitsMode] = &[StopBitsMode::One, StopBitsMode::Two];

    pub fn stop_bits(self) -> StopBits {
        match self {
            StopBitsMode::One => StopBits::One,
            StopBitsMode::Two => StopBits::Two,
        }
    }
}

impl FromStr for StopBitsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBitsMode::One),
            "2" => Ok(StopBitsMode::Two),
            other => Err(ConfigError::StopBits(other.to_string())),
        }
    }
}

impl fmt::Display for StopBitsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBitsMode::One => write!(f, "1"),
            StopBitsMode::Two => write!(f, "2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    None,
    XonXoff,
    RtsCts,
    DtrDsr,
}

impl FlowMode {
    pub const ALL: &'static [FlowMode] = &[
        FlowMode::None,
        FlowMode::XonXoff,
        FlowMode::RtsCts,
        FlowMode::DtrDsr,
    ];

    /// Line-discipline bits for this mode. DTR/DSR has none: the driver is
    /// left at `FlowControl::None` and the handshake gate works the modem
    /// control lines directly.
    pub fn flow_control(self) -> FlowControl {
        match self {
            FlowMode::None | FlowMode::DtrDsr => FlowControl::None,
            FlowMode::XonXoff => FlowControl::Software,
            FlowMode::RtsCts => FlowControl::Hardware,
        }
    }
}

impl FromStr for FlowMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("NONE") {
            Ok(FlowMode::None)
        } else if token.eq_ignore_ascii_case("XON_XOFF") {
            Ok(FlowMode::XonXoff)
        } else if token.eq_ignore_ascii_case("RTS_CTS") {
            Ok(FlowMode::RtsCts)
        } else if token.eq_ignore_ascii_case("DTR_DSR") {
            Ok(FlowMode::DtrDsr)
        } else {
            Err(ConfigError::FlowControl(token.to_string()))
        }
    }
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowMode::None => write!(f, "NONE"),
            FlowMode::XonXoff => write!(f, "XON_XOFF"),
            FlowMode::RtsCts => write!(f, "RTS_CTS"),
            FlowMode::DtrDsr => write!(f, "DTR_DSR"),
        }
    }
}

/// The 1-2 byte sequence that ends one message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminator(Vec<u8>);

impl Terminator {
    pub fn cr() -> Self {
        Terminator(vec![b'\r'])
    }

    pub fn lf() -> Self {
        Terminator(vec![b'\n'])
    }

    pub fn crlf() -> Self {
        Terminator(vec![b'\r', b'\n'])
    }

    /// Decode an escape-notation spec (`\r`, `\n`, `\t`, `\0`, `\\`, `\xNN`,
    /// literal characters) into terminator bytes.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut bytes = Vec::new();
        let mut chars = spec.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                let mut utf8 = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                continue;
            }
            match chars.next() {
                Some('r') => bytes.push(b'\r'),
                Some('n') => bytes.push(b'\n'),
                Some('t') => bytes.push(b'\t'),
                Some('0') => bytes.push(0),
                Some('\\') => bytes.push(b'\\'),
                Some('x') => {
                    let (Some(hi), Some(lo)) = (chars.next(), chars.next()) else {
                        return Err(ConfigError::TerminatorEscape(spec.to_string()));
                    };
                    let value = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                        .map_err(|_| ConfigError::TerminatorEscape(spec.to_string()))?;
                    bytes.push(value);
                }
                _ => return Err(ConfigError::TerminatorEscape(spec.to_string())),
            }
        }
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.is_empty() || bytes.len() > 2 {
            return Err(ConfigError::TerminatorLength(bytes.len()));
        }
        Ok(Terminator(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_dump(&self.0))
    }
}

/// Validated, immutable description of the serial line to open. Every field
/// is already one of its legal values; an invalid combination cannot be
/// constructed, so the transport layer never re-checks.
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub path: String,
    pub baud: BaudRate,
    pub char_size: CharSize,
    pub parity: ParityMode,
    pub stop_bits: StopBitsMode,
    pub flow: FlowMode,
    pub terminator: Terminator,
}

impl LineConfig {
    /// Map raw user-supplied tokens to a configuration, or a validation
    /// failure naming the first offending field. Pure: no side effects.
    pub fn from_tokens(
        path: &str,
        baud: &str,
        char_size: &str,
        parity: &str,
        flow: &str,
        stop_bits: &str,
        terminator: &str,
    ) -> Result<Self, ConfigError> {
        if path.trim().is_empty() {
            return Err(ConfigError::EmptyDevicePath);
        }
        Ok(LineConfig {
            path: path.trim().to_string(),
            baud: baud.parse()?,
            char_size: char_size.parse()?,
            parity: parity.parse()?,
            stop_bits: stop_bits.parse()?,
            flow: flow.parse()?,
            terminator: Terminator::parse(terminator)?,
        })
    }
}

impl fmt::Display for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}{} flow={} term={}",
            self.path,
            self.baud,
            self.char_size,
            self.parity.letter(),
            self.stop_bits,
            self.flow,
            self.terminator,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_rates_parse_from_the_closed_set() {
        assert_eq!("9600".parse::<BaudRate>().unwrap(), BaudRate::B9600);
        assert_eq!("115200".parse::<BaudRate>().unwrap(), BaudRate::B115200);
        assert_eq!(
            "2500".parse::<BaudRate>(),
            Err(ConfigError::BaudRate("2500".to_string()))
        );
    }

    #[test]
    fn char_sizes_are_seven_or_eight() {
        assert_eq!("7".parse::<CharSize>().unwrap(), CharSize::Seven);
        assert_eq!("8".parse::<CharSize>().unwrap(), CharSize::Eight);
        assert!("9".parse::<CharSize>().is_err());
    }

    #[test]
    fn parity_and_flow_parse_case_insensitively() {
        assert_eq!("even".parse::<ParityMode>().unwrap(), ParityMode::Even);
        assert_eq!("ODD".parse::<ParityMode>().unwrap(), ParityMode::Odd);
        assert_eq!("dtr_dsr".parse::<FlowMode>().unwrap(), FlowMode::DtrDsr);
        assert!("MARK".parse::<ParityMode>().is_err());
        assert!("DTR".parse::<FlowMode>().is_err());
    }

    #[test]
    fn dtr_dsr_sets_no_line_discipline_bit() {
        assert_eq!(FlowMode::DtrDsr.flow_control(), FlowControl::None);
        assert_eq!(FlowMode::XonXoff.flow_control(), FlowControl::Software);
        assert_eq!(FlowMode::RtsCts.flow_control(), FlowControl::Hardware);
    }

    #[test]
    fn terminator_accepts_common_escapes() {
        assert_eq!(Terminator::parse("\\r").unwrap(), Terminator::cr());
        assert_eq!(Terminator::parse("\\n").unwrap(), Terminator::lf());
        assert_eq!(Terminator::parse("\\r\\n").unwrap(), Terminator::crlf());
        assert_eq!(
            Terminator::parse("\\x02\\x03").unwrap().as_bytes(),
            &[0x02, 0x03]
        );
        assert_eq!(Terminator::parse("#").unwrap().as_bytes(), b"#");
        assert_eq!(Terminator::parse("\\0").unwrap().as_bytes(), &[0x00]);
    }

    #[test]
    fn terminator_rejects_bad_lengths_and_escapes() {
        assert_eq!(
            Terminator::parse(""),
            Err(ConfigError::TerminatorLength(0))
        );
        assert_eq!(
            Terminator::parse("abc"),
            Err(ConfigError::TerminatorLength(3))
        );
        assert!(matches!(
            Terminator::parse("\\q"),
            Err(ConfigError::TerminatorEscape(_))
        ));
        assert!(matches!(
            Terminator::parse("\\x4"),
            Err(ConfigError::TerminatorEscape(_))
        ));
    }

    #[test]
    fn from_tokens_builds_a_full_config() {
        let config = LineConfig::from_tokens(
            "/dev/ttyUSB0",
            "19200",
            "8",
            "NONE",
            "RTS_CTS",
            "1",
            "\\r\\n",
        )
        .unwrap();
        assert_eq!(config.baud, BaudRate::B19200);
        assert_eq!(config.flow, FlowMode::RtsCts);
        assert_eq!(config.terminator, Terminator::crlf());
        assert_eq!(config.to_string(), "/dev/ttyUSB0 19200 8N1 flow=RTS_CTS term=0x0d 0x0a");
    }

    #[test]
    fn from_tokens_names_the_offending_field() {
        assert_eq!(
            LineConfig::from_tokens("", "9600", "8", "NONE", "NONE", "1", "\\n").unwrap_err(),
            ConfigError::EmptyDevicePath
        );
        assert_eq!(
            LineConfig::from_tokens("/dev/ttyS0", "9600", "8", "NONE", "NONE", "3", "\\n")
                .unwrap_err(),
            ConfigError::StopBits("3".to_string())
        );
    }
}

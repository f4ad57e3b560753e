use std::{fmt, num::ParseIntError, str::FromStr};

/// 1-based output channel of a power supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Option<Self> {
        if index == 0 {
            None
        } else {
            Some(Self(index))
        }
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseChannelError {
    Zero,
    Invalid(ParseIntError),
}

impl fmt::Display for ParseChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "channels are numbered from 1"),
            Self::Invalid(err) => write!(f, "invalid channel number: {}", err),
        }
    }
}

impl std::error::Error for ParseChannelError {}

impl TryFrom<u8> for Channel {
    type Error = ParseChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ParseChannelError::Zero)
    }
}

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("CH")
            .or_else(|| s.strip_prefix("ch"))
            .unwrap_or(s);
        s.parse::<u8>()
            .map_err(ParseChannelError::Invalid)?
            .try_into()
    }
}

/// Signal coupling for multimeter measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeasureMode {
    #[default]
    Dc,
    Ac,
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dc => write!(f, "DC"),
            Self::Ac => write!(f, "AC"),
        }
    }
}

impl FromStr for MeasureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DC" => Ok(Self::Dc),
            "AC" => Ok(Self::Ac),
            other => Err(format!("unknown measurement mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Common
    Identify,
    Reset,
    SystemError,
    // Multimeter
    MeasureVoltage(MeasureMode),
    MeasureCurrent(MeasureMode),
    // Power supply
    SelectChannel(Channel),
    SetOutput(Channel, bool),
    GetOutput(Channel),
    SetVoltage(f64),
    SetCurrent(f64),
    SetOvp(f64),
    SetOcp(f64),
    SetOvpState(bool),
    SetOcpState(bool),
    MeasureChannelVoltage(Channel),
    MeasureChannelCurrent(Channel),
    MeasureChannelPower(Channel),
    /// Any command text not covered above, sent as is.
    Raw(String),
}

impl Command {
    pub fn is_query(&self) -> bool {
        match self {
            Self::Identify
            | Self::SystemError
            | Self::MeasureVoltage(_)
            | Self::MeasureCurrent(_)
            | Self::GetOutput(_)
            | Self::MeasureChannelVoltage(_)
            | Self::MeasureChannelCurrent(_)
            | Self::MeasureChannelPower(_) => true,
            Self::Raw(text) => text.trim_end().ends_with('?') || text.contains("? "),
            _ => false,
        }
    }
}

fn on_off(state: bool) -> &'static str {
    if state {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identify => write!(f, "*IDN?"),
            Self::Reset => write!(f, "*RST"),
            Self::SystemError => write!(f, "SYST:ERR?"),
            Self::MeasureVoltage(mode) => write!(f, ":MEAS:VOLT:{}?", mode),
            Self::MeasureCurrent(mode) => write!(f, ":MEAS:CURR:{}?", mode),
            Self::SelectChannel(chan) => write!(f, ":INST:NSEL {}", chan),
            Self::SetOutput(chan, state) => write!(f, ":OUTP CH{},{}", chan, on_off(*state)),
            Self::GetOutput(chan) => write!(f, ":OUTP? CH{}", chan),
            Self::SetVoltage(v) => write!(f, ":VOLT {}", v),
            Self::SetCurrent(i) => write!(f, ":CURR {}", i),
            Self::SetOvp(v) => write!(f, ":VOLT:PROT {}", v),
            Self::SetOcp(i) => write!(f, ":CURR:PROT {}", i),
            Self::SetOvpState(state) => write!(f, ":VOLT:PROT:STAT {}", on_off(*state)),
            Self::SetOcpState(state) => write!(f, ":CURR:PROT:STAT {}", on_off(*state)),
            Self::MeasureChannelVoltage(chan) => write!(f, ":MEAS:VOLT? CH{}", chan),
            Self::MeasureChannelCurrent(chan) => write!(f, ":MEAS:CURR? CH{}", chan),
            Self::MeasureChannelPower(chan) => write!(f, ":MEAS:POWE? CH{}", chan),
            Self::Raw(text) => write!(f, "{}", text),
        }
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_rejects_zero() {
        assert!(Channel::new(0).is_none());
        assert_eq!(Channel::try_from(0u8), Err(ParseChannelError::Zero));
        assert!("0".parse::<Channel>().is_err());
        assert!("x".parse::<Channel>().is_err());
    }

    #[test]
    fn channel_from_str() {
        assert_eq!("2".parse::<Channel>().map(|c| c.index()), Ok(2));
        assert_eq!("CH3".parse::<Channel>().map(|c| c.index()), Ok(3));
        assert_eq!(Channel::default().index(), 1);
    }

    #[test]
    fn power_supply_commands() {
        let ch2 = Channel::new(2).unwrap();
        assert_eq!(Command::SelectChannel(ch2).to_string(), ":INST:NSEL 2");
        assert_eq!(Command::SetOutput(ch2, true).to_string(), ":OUTP CH2,ON");
        assert_eq!(Command::SetVoltage(5.0).to_string(), ":VOLT 5");
        assert_eq!(Command::SetOcp(0.5).to_string(), ":CURR:PROT 0.5");
        assert_eq!(Command::SetOvpState(false).to_string(), ":VOLT:PROT:STAT OFF");
        assert_eq!(Command::MeasureChannelPower(ch2).to_string(), ":MEAS:POWE? CH2");
    }

    #[test]
    fn multimeter_commands() {
        assert_eq!(
            Command::MeasureVoltage(MeasureMode::Dc).to_string(),
            ":MEAS:VOLT:DC?"
        );
        assert_eq!(
            Command::MeasureCurrent(MeasureMode::Ac).to_string(),
            ":MEAS:CURR:AC?"
        );
        assert_eq!("ac".parse::<MeasureMode>(), Ok(MeasureMode::Ac));
        assert!("dc2".parse::<MeasureMode>().is_err());
    }

    #[test]
    fn query_detection() {
        assert!(Command::Identify.is_query());
        assert!(!Command::Reset.is_query());
        assert!(Command::from(":MEAS:VOLT? CH1").is_query());
        assert!(!Command::from(":VOLT 1.5").is_query());
    }
}

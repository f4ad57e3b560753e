use std::{fmt, str::FromStr};

use super::{command::Command, ProtoError, Result};

/// Entry of the device error queue, as returned by `SYST:ERR?`.
/// Code 0 means no error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: i32,
    pub message: String,
}

impl ErrorReport {
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl FromStr for ErrorReport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (code, message) = s
            .split_once(',')
            .ok_or_else(|| format!("Missing separator in error report: {:?}", s))?;
        let code = code
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("Invalid error code {:?}: {}", code, e))?;
        Ok(Self {
            code,
            message: message.trim().trim_matches('"').to_string(),
        })
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},\"{}\"", self.code, self.message)
    }
}

/// Answer to `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl FromStr for Ident {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if values.len() == 4 {
            Ok(Self {
                manufacturer: String::from(values[0]),
                model: String::from(values[1]),
                serial: String::from(values[2]),
                firmware: String::from(values[3]),
            })
        } else {
            Err(format!("Invalid data for IDN response: {}", s))
        }
    }
}

pub(crate) fn parse_f64(command: &Command, response: &str) -> Result<f64> {
    response
        .trim()
        .parse::<f64>()
        .map_err(|_| ProtoError::parse(command, response))
}

pub(crate) fn parse_bool(command: &Command, response: &str) -> Result<bool> {
    match response.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(ProtoError::parse(command, response)),
    }
}

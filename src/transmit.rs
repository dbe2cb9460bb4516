//! Outbound terminator policy.

use crate::queue::OutboundMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line ending appended to every transmitted string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    #[default]
    None,
    Cr,
    Lf,
    CrLf,
}

impl Terminator {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Terminator::None => b"",
            Terminator::Cr => b"\r",
            Terminator::Lf => b"\n",
            Terminator::CrLf => b"\r\n",
        }
    }
}

impl FromStr for Terminator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "cr" => Ok(Self::Cr),
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            other => Err(format!(
                "unknown terminator '{other}' (expected none, cr, lf or crlf)"
            )),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Terminator::None => "none",
            Terminator::Cr => "cr",
            Terminator::Lf => "lf",
            Terminator::CrLf => "crlf",
        };
        f.write_str(name)
    }
}

/// UTF-8 encode `text` and append the terminator.
///
/// Returns `None` when the result would be empty.
pub fn encode_payload(text: &str, terminator: Terminator) -> Option<OutboundMessage> {
    let ending = terminator.as_bytes();
    let mut payload = Vec::with_capacity(text.len() + ending.len());
    payload.extend_from_slice(text.as_bytes());
    payload.extend_from_slice(ending);
    OutboundMessage::new(payload)
}

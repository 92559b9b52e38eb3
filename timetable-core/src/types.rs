//! Domain types for the timetable snapshot.
//!
//! Source sites name things in their own vocabulary ("Автобус", "будни", …).
//! Those labels are translated into the closed enums below exactly once, at
//! the collaborator boundary; nothing past that point matches on raw text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, comparable token identifying the remote source's last publish
/// (in practice a date string such as `"10.02.2024"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(pub String);

impl Marker {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Marker {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Marker {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Public route number as printed on the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteNumber(pub u32);

impl fmt::Display for RouteNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for RouteNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl FromStr for RouteNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ParseError::RouteNumber(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Category of vehicle a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Bus,
    Trolleybus,
    Tram,
}

impl TransportKind {
    pub const fn all() -> &'static [TransportKind] {
        &[TransportKind::Bus, TransportKind::Trolleybus, TransportKind::Tram]
    }

    /// Canonical name, also the value of the `kind` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportKind::Bus => "bus",
            TransportKind::Trolleybus => "trolleybus",
            TransportKind::Tram => "tram",
        }
    }

    /// Translate a source-site label. Case and surrounding whitespace are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        KIND_LABELS
            .iter()
            .find(|(text, _)| *text == label)
            .map(|(_, kind)| *kind)
    }
}

const KIND_LABELS: &[(&str, TransportKind)] = &[
    ("bus", TransportKind::Bus),
    ("автобус", TransportKind::Bus),
    ("trolleybus", TransportKind::Trolleybus),
    ("троллейбус", TransportKind::Trolleybus),
    ("tram", TransportKind::Tram),
    ("трамвай", TransportKind::Tram),
];

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| ParseError::TransportKind(s.to_owned()))
    }
}

/// Which days a timetable row applies to. Only these two are kept; any other
/// day label a source offers (holidays, single weekdays) is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayClass {
    Weekday,
    Weekend,
}

impl DayClass {
    /// Stored value of the `day` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            DayClass::Weekday => "weekday",
            DayClass::Weekend => "weekend",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "weekday" | "weekdays" | "будни" => Some(DayClass::Weekday),
            "weekend" | "weekends" | "выходные" => Some(DayClass::Weekend),
            _ => None,
        }
    }
}

impl fmt::Display for DayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

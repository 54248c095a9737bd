//! Domain models that mirror the SQLite schema and also double as the JSON
//! shape of snapshots and backups. They stay plain data holders; ordering
//! rules live in the store and in `ordering`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Color tag painted on a song card. Older snapshots stored the raw hex code,
/// so input goes through [`FromStr`], which also accepts the legacy hex
/// spelling in any case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Pink,
    Cyan,
    Orange,
}

impl Color {
    pub const PALETTE: [Color; 8] = [
        Color::White,
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Pink,
        Color::Cyan,
        Color::Orange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Cyan => "cyan",
            Color::Orange => "orange",
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Color::White => "#ffffff",
            Color::Red => "#ffcccc",
            Color::Green => "#ccffcc",
            Color::Blue => "#ccccff",
            Color::Yellow => "#ffffcc",
            Color::Pink => "#ffccff",
            Color::Cyan => "#ccffff",
            Color::Orange => "#ffd8a8",
        }
    }

    /// Step through the palette, wrapping at both ends.
    pub fn cycle(self, offset: isize) -> Color {
        let len = Self::PALETTE.len() as isize;
        let current = Self::PALETTE
            .iter()
            .position(|color| *color == self)
            .unwrap_or(0) as isize;
        Self::PALETTE[(current + offset).rem_euclid(len) as usize]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColor(pub String);

impl fmt::Display for UnknownColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown color tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownColor {}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        Self::PALETTE
            .into_iter()
            .find(|color| color.as_str() == needle || color.hex() == needle)
            .ok_or_else(|| UnknownColor(raw.to_string()))
    }
}

/// A song as stored: owned by exactly one set, ranked by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub color: Color,
    /// Zero-based and dense within the owning set after every persisted write.
    #[serde(default)]
    pub position: i64,
}

/// An ordered, named collection of songs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    pub id: String,
    pub title: String,
    /// Rank among all sets. Snapshots written before the store tracked set
    /// order have no such field; their order is the array order.
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub songs: Vec<Song>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Which persisted ordering `list_sets` should use. The store keeps both a
/// creation timestamp and an explicit position, and callers pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOrder {
    /// Newest first, ignoring `position`.
    Created,
    /// `position` ascending; ties fall back to newest first.
    #[default]
    Position,
}

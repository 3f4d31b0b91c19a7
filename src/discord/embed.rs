use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Serialize)]
pub struct Embed<'a> {
    pub title: &'a str,
    pub description: &'a str,
    /// Makes the title a link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    pub color: Color,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<Field<'a>>,
}

/// Sidebar color, sent as a packed `0xRRGGBB` integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const FAILURE: Self = Self::rgb(228, 24, 17);
    pub const AVAILABLE: Self = Self::rgb(46, 204, 113);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Field<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub inline: bool,
}

impl<'a> Field<'a> {
    #[must_use]
    pub const fn inline(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value,
            inline: true,
        }
    }
}

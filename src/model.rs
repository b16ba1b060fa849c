use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    /// Seconds. Unknown until the handle reported its metadata.
    pub duration: Option<f64>,
    rand: Option<f64>,
    /// Hover position along this track's segment, as a fraction.
    pub cursor_on_track: Option<f64>,
    pub cursor_on_start: bool,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>, artist: Option<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            artist,
            duration: None,
            rand: None,
            cursor_on_track: None,
            cursor_on_start: false,
        }
    }

    pub fn rand(&self) -> Option<f64> {
        self.rand
    }

    /// Fixes the layout seed. Later calls are ignored so redraws stay
    /// deterministic for the rest of the session.
    pub fn assign_rand(&mut self, value: f64) -> bool {
        if self.rand.is_some() {
            return false;
        }
        self.rand = Some(value.clamp(0.0, 1.0 - f64::EPSILON));
        true
    }

    pub fn artist_label(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown artist")
    }

    pub fn clear_hover(&mut self) {
        self.cursor_on_track = None;
        self.cursor_on_start = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEstimate {
    /// Projection of the pointer onto the segment direction.
    #[default]
    Projection,
    /// Mean of the per-axis interpolation fractions.
    AxisAverage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Composites this color over an opaque background.
    pub fn over(self, bg: Rgba) -> (u8, u8, u8) {
        let a = self.a.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| -> u8 {
            (f32::from(fg) * a + f32::from(bg) * (1.0 - a)).round() as u8
        };
        (mix(self.r, bg.r), mix(self.g, bg.g), mix(self.b, bg.b))
    }
}

impl Serialize for Rgba {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!(
            "rgba({}, {}, {}, {})",
            self.r, self.g, self.b, self.a
        ))
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse_css_color(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color: {value}")))
    }
}

/// Accepts `rgb(r, g, b)` and `rgba(r, g, b, a)`.
pub fn parse_css_color(raw: &str) -> Option<Rgba> {
    let raw = raw.trim();
    let (body, has_alpha) = if let Some(rest) = raw.strip_prefix("rgba(") {
        (rest, true)
    } else if let Some(rest) = raw.strip_prefix("rgb(") {
        (rest, false)
    } else {
        return None;
    };
    let body = body.strip_suffix(')')?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let r = parts[0].parse().ok()?;
    let g = parts[1].parse().ok()?;
    let b = parts[2].parse().ok()?;
    let a = if has_alpha {
        let alpha: f32 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        alpha
    } else {
        1.0
    };
    Some(Rgba::new(r, g, b, a))
}

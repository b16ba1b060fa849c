use crate::geometry::Point;
use crate::model::Track;

/// `mm:ss/mm:ss` of elapsed over total time. Fractions are truncated.
pub fn format_time(current: f64, duration: f64) -> String {
    format!("{}/{}", clock(current), clock(duration))
}

fn clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub time: String,
}

impl NowPlaying {
    pub fn update(&mut self, track: &Track, current_time: f64) {
        self.title.clone_from(&track.title);
        self.artist = track.artist_label().to_string();
        self.time = format_time(current_time, track.duration.unwrap_or(0.0));
    }
}

/// Hover bubble next to a node, in screen coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tooltip {
    pub visible: bool,
    pub title: String,
    pub artist: String,
    pub position: Point,
}

impl Tooltip {
    pub fn show(&mut self, track: &Track, node: Point, pan: Point, radius: f64) {
        self.visible = true;
        self.title.clone_from(&track.title);
        self.artist = track.artist_label().to_string();
        self.position = Point::new(
            node.x + radius + 10.0 + pan.x,
            node.y - radius * 2.0 + pan.y,
        );
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBars {
    levels: u8,
    /// Loudest lit bar; `None` when muted.
    selected: Option<u8>,
}

impl VolumeBars {
    pub fn new(levels: u8, volume: f32) -> Self {
        let levels = levels.max(1);
        let mut bars = Self {
            levels,
            selected: None,
        };
        bars.sync(volume);
        bars
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Volume assigned to bar `index`: bars split [0, 1] evenly, the first
    /// bar is the quietest non-zero level.
    pub fn volume_for(&self, index: u8) -> Option<f32> {
        (index < self.levels).then(|| f32::from(index + 1) / f32::from(self.levels))
    }

    pub fn select(&mut self, index: u8) {
        if index < self.levels {
            self.selected = Some(index);
        }
    }

    /// Highlights the bar closest to `volume`. Silence lights none.
    pub fn sync(&mut self, volume: f32) {
        let scaled = (volume * f32::from(self.levels)).round();
        self.selected = if scaled >= 1.0 {
            Some((scaled as u8 - 1).min(self.levels - 1))
        } else {
            None
        };
    }

    pub fn is_on(&self, index: u8) -> bool {
        self.selected.is_some_and(|selected| index <= selected)
    }
}

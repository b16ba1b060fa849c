use crate::geometry::{Point, rotate_point};
use crate::model::Track;

const MIN_ROTATION_DEG: f64 = 30.0;
const ROTATION_RANGE_DEG: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub point: Point,
    /// Track starting at this node; `None` for the closing node.
    pub track: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub track: usize,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathLayout {
    pub nodes: Vec<Node>,
}

impl PathLayout {
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.nodes.windows(2).filter_map(|pair| {
            pair[0].track.map(|track| Segment {
                track,
                start: pair[0].point,
                end: pair[1].point,
            })
        })
    }

    pub fn segment(&self, track: usize) -> Option<Segment> {
        let start = self.nodes.get(track)?;
        let end = self.nodes.get(track + 1)?;
        Some(Segment {
            track,
            start: start.point,
            end: end.point,
        })
    }
}

/// Rotation of a track's segment around its start node. Seeds below one
/// half turn the segment the other way, so the path zig-zags.
pub fn segment_angle(rand: f64) -> f64 {
    let degrees = MIN_ROTATION_DEG + rand * ROTATION_RANGE_DEG;
    let radians = degrees.to_radians();
    if rand < 0.5 { -radians } else { radians }
}

/// Unrotated length of a track's segment: one pixel per whole second plus
/// the base length, so empty tracks stay visible and clickable.
pub fn segment_length(duration: f64, base_length: f64) -> f64 {
    let seconds = if duration.is_finite() && duration > 0.0 {
        duration.floor()
    } else {
        0.0
    };
    seconds + base_length
}

pub fn layout_path(tracks: &[Track], start: Point, base_length: f64) -> PathLayout {
    let mut nodes = Vec::with_capacity(tracks.len() + 1);
    let mut s = start;

    for (index, track) in tracks.iter().enumerate() {
        nodes.push(Node {
            point: s,
            track: Some(index),
        });

        let length = segment_length(track.duration.unwrap_or(0.0), base_length);
        let raw_end = Point::new(s.x, s.y - length);
        let angle = segment_angle(track.rand().unwrap_or(0.0));
        s = rotate_point(raw_end, s, angle);
    }

    nodes.push(Node {
        point: s,
        track: None,
    });
    PathLayout { nodes }
}

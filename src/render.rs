use crate::config::Settings;
use crate::geometry::Point;
use crate::layout::PathLayout;
use crate::model::{Rgba, Track};
use std::time::{Duration, Instant};

const STAR_COLUMNS: usize = 7;
const STAR_ROWS: usize = 6;

/// Immediate-mode 2D drawing target, modelled on an HTML canvas context.
pub trait Surface {
    fn size(&self) -> (f64, f64);
    /// Resizes and clears.
    fn resize(&mut self, width: f64, height: f64);
    /// Clears all content and resets the translation.
    fn clear(&mut self);
    fn translate(&mut self, dx: f64, dy: f64);
    fn begin_path(&mut self);
    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    /// Adds a full circle to the current path.
    fn arc(&mut self, center: Point, radius: f64);
    fn set_line_width(&mut self, width: f64);
    fn set_stroke_color(&mut self, color: Rgba);
    fn set_fill_color(&mut self, color: Rgba);
    fn stroke(&mut self);
    fn fill(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Due {
    pub draw: bool,
    pub sample_fps: bool,
}

/// Two fixed-interval tickers: the draw tick and the slower FPS sampler.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    draw_interval: Duration,
    fps_interval: Duration,
    fps_filter: f64,
    running: bool,
    next_draw: Instant,
    next_sample: Instant,
    last_frame: Instant,
    frame_time_ms: f64,
    fps_text: String,
}

impl RenderLoop {
    pub fn new(draw_interval: Duration, fps_interval: Duration, fps_filter: f64) -> Self {
        let now = Instant::now();
        Self {
            draw_interval,
            fps_interval,
            fps_filter: fps_filter.max(1.0),
            running: false,
            next_draw: now,
            next_sample: now,
            last_frame: now,
            frame_time_ms: 0.0,
            fps_text: String::from("0"),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.loop_interval(),
            settings.fps_interval(),
            settings.fps_filter,
        )
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts both tickers. The first draw is due immediately.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.next_draw = now;
        self.next_sample = now + self.fps_interval;
        self.last_frame = now;
        log::info!(
            "render loop started ({:?} draw, {:?} fps)",
            self.draw_interval,
            self.fps_interval
        );
    }

    /// Suppresses future ticks and resets the FPS readout.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.fps_text = String::from("0");
        log::info!("render loop stopped");
    }

    /// Which ticks are due at `now`. Missed ticks are dropped rather than
    /// replayed in a burst.
    pub fn due(&mut self, now: Instant) -> Due {
        if !self.running {
            return Due::default();
        }
        Due {
            draw: advance(&mut self.next_draw, self.draw_interval, now),
            sample_fps: advance(&mut self.next_sample, self.fps_interval, now),
        }
    }

    /// Time until the next tick, for bounding an input poll.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        if !self.running {
            return None;
        }
        let next = self.next_draw.min(self.next_sample);
        Some(next.saturating_duration_since(now))
    }

    /// Feeds one draw tick into the smoothed frame interval.
    pub fn record_frame(&mut self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.last_frame).as_secs_f64() * 1000.0;
        self.frame_time_ms += (elapsed_ms - self.frame_time_ms) / self.fps_filter;
        self.last_frame = now;
    }

    pub fn sample_fps(&mut self) {
        let fps = if self.frame_time_ms > 0.0 {
            1000.0 / self.frame_time_ms
        } else {
            0.0
        };
        self.fps_text = format!("{fps:.1}");
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }

    pub fn fps_text(&self) -> &str {
        &self.fps_text
    }
}

fn advance(next: &mut Instant, interval: Duration, now: Instant) -> bool {
    if now < *next {
        return false;
    }
    *next += interval;
    if *next <= now {
        *next = now + interval;
    }
    true
}

/// Per-track playback state as the draw tick sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackProgress {
    pub paused: bool,
    pub current_time: f64,
}

pub struct Scene<'a> {
    pub tracks: &'a [Track],
    pub progress: &'a [TrackProgress],
    pub layout: &'a PathLayout,
    pub current: usize,
    pub pan: Point,
    pub settings: &'a Settings,
}

pub fn draw_frame(surface: &mut dyn Surface, scene: &Scene<'_>) {
    surface.clear();
    surface.translate(scene.pan.x, scene.pan.y);

    draw_background_stars(surface, scene);
    for segment in scene.layout.segments() {
        draw_segment(surface, scene, segment.track, segment.start, segment.end);
    }
    for node in &scene.layout.nodes {
        let hovered = node
            .track
            .and_then(|index| scene.tracks.get(index))
            .is_some_and(|track| track.cursor_on_start);
        draw_node(surface, scene.settings, node.point, hovered);
    }
}

fn draw_segment(
    surface: &mut dyn Surface,
    scene: &Scene<'_>,
    index: usize,
    start: Point,
    end: Point,
) {
    let settings = scene.settings;
    let colors = &settings.colors;
    let played = if index < scene.current {
        colors.played
    } else {
        colors.unplayed
    };
    stroke_line(surface, start, end, settings.conn_width, played);

    let Some(track) = scene.tracks.get(index) else {
        return;
    };

    if let Some(state) = scene.progress.get(index)
        && (!state.paused || index == scene.current)
    {
        let fraction = live_fraction(state.current_time, track.duration.unwrap_or(0.0));
        let tip = start.lerp(end, fraction);
        stroke_line(surface, start, tip, settings.conn_width, colors.played);
    }

    if let Some(hint) = track.cursor_on_track {
        let fraction = hint.clamp(0.0, 1.0);
        stroke_line(
            surface,
            start,
            start.lerp(end, fraction),
            settings.conn_width,
            colors.cursor_hint,
        );
    }
}

fn live_fraction(current_time: f64, duration: f64) -> f64 {
    if !(duration.is_finite() && duration > 0.0) {
        return 0.0;
    }
    let fraction = current_time / duration;
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn stroke_line(surface: &mut dyn Surface, from: Point, to: Point, width: f64, color: Rgba) {
    surface.begin_path();
    surface.set_line_width(width);
    surface.set_stroke_color(color);
    surface.move_to(from);
    surface.line_to(to);
    surface.stroke();
}

fn draw_node(surface: &mut dyn Surface, settings: &Settings, center: Point, hovered: bool) {
    let color = if hovered {
        settings.colors.circle_hover
    } else {
        settings.colors.circle_fill
    };
    surface.begin_path();
    surface.set_fill_color(color);
    surface.arc(center, settings.radius);
    surface.fill();
}

/// Faint dots spread over a 7x6 grid, jittered by the track seeds. They are
/// placed in screen space, so they hold still while the path pans.
fn draw_background_stars(surface: &mut dyn Surface, scene: &Scene<'_>) {
    if scene.tracks.is_empty() {
        return;
    }
    let (width, height) = surface.size();
    let cell_w = width / STAR_COLUMNS as f64;
    let cell_h = height / STAR_ROWS as f64;
    let max_radius = scene.settings.bg_stars_max_radius.max(f64::EPSILON);
    let seed = |i: usize| scene.tracks[i % scene.tracks.len()].rand().unwrap_or(0.0);

    surface.begin_path();
    surface.set_fill_color(scene.settings.colors.noise);
    for i in 0..STAR_COLUMNS * STAR_ROWS {
        let rnd1 = seed(i);
        let rnd2 = seed(i + 2);
        let center = star_center(i, cell_w, cell_h, rnd1, rnd2);
        let radius = (rnd1 * rnd2 * 100.0 * i as f64) % max_radius + 1.0;
        surface.arc(center.offset(-scene.pan.x, -scene.pan.y), radius);
    }
    surface.fill();
}

/// Grid position of star `i` plus its jitter. Both axes jitter by the cell
/// width.
fn star_center(i: usize, cell_w: f64, cell_h: f64, rnd1: f64, rnd2: f64) -> Point {
    let jitter = cell_w / 1.4;
    Point::new(
        (i % STAR_COLUMNS) as f64 * cell_w + rnd1 * jitter,
        (i % STAR_ROWS) as f64 * cell_h + rnd2 * jitter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout_path;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear,
        Translate(f64, f64),
        Stroke { from: Point, to: Point, color: Rgba },
        Fill { arcs: usize, color: Rgba },
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
        path: Vec<Point>,
        arcs: usize,
        stroke: Option<Rgba>,
        fill: Option<Rgba>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (f64, f64) {
            (700.0, 600.0)
        }
        fn resize(&mut self, _width: f64, _height: f64) {
            self.clear();
        }
        fn clear(&mut self) {
            self.calls.push(Call::Clear);
        }
        fn translate(&mut self, dx: f64, dy: f64) {
            self.calls.push(Call::Translate(dx, dy));
        }
        fn begin_path(&mut self) {
            self.path.clear();
            self.arcs = 0;
        }
        fn move_to(&mut self, p: Point) {
            self.path.push(p);
        }
        fn line_to(&mut self, p: Point) {
            self.path.push(p);
        }
        fn arc(&mut self, _center: Point, _radius: f64) {
            self.arcs += 1;
        }
        fn set_line_width(&mut self, _width: f64) {}
        fn set_stroke_color(&mut self, color: Rgba) {
            self.stroke = Some(color);
        }
        fn set_fill_color(&mut self, color: Rgba) {
            self.fill = Some(color);
        }
        fn stroke(&mut self) {
            self.calls.push(Call::Stroke {
                from: self.path[0],
                to: self.path[1],
                color: self.stroke.expect("stroke color"),
            });
        }
        fn fill(&mut self) {
            self.calls.push(Call::Fill {
                arcs: self.arcs,
                color: self.fill.expect("fill color"),
            });
        }
    }

    fn tracks() -> Vec<Track> {
        [(30.0, 0.7), (0.0, 0.2), (45.0, 0.9)]
            .into_iter()
            .map(|(duration, rand)| {
                let mut track = Track::new("t.mp3", "t", None);
                track.duration = Some(duration);
                track.assign_rand(rand);
                track
            })
            .collect()
    }

    #[test]
    fn frame_draws_background_then_segments_then_nodes() {
        let settings = Settings::default();
        let mut tracks = tracks();
        tracks[2].cursor_on_track = Some(0.5);
        tracks[0].cursor_on_start = true;
        let layout = layout_path(&tracks, Point::new(350.0, 545.0), settings.base_length);
        let progress = [
            TrackProgress { paused: true, current_time: 0.0 },
            TrackProgress { paused: false, current_time: 0.0 },
            TrackProgress { paused: true, current_time: 0.0 },
        ];
        let scene = Scene {
            tracks: &tracks,
            progress: &progress,
            layout: &layout,
            current: 1,
            pan: Point::new(12.0, -4.0),
            settings: &settings,
        };
        let mut surface = RecordingSurface::default();
        draw_frame(&mut surface, &scene);

        let calls = &surface.calls;
        assert_eq!(calls[0], Call::Clear);
        assert_eq!(calls[1], Call::Translate(12.0, -4.0));
        assert_eq!(
            calls[2],
            Call::Fill {
                arcs: STAR_COLUMNS * STAR_ROWS,
                color: settings.colors.noise
            }
        );

        let strokes: Vec<&Call> = calls
            .iter()
            .filter(|call| matches!(call, Call::Stroke { .. }))
            .collect();
        // Three base lines, live progress on the current track, one hint.
        assert_eq!(strokes.len(), 5);
        let colors = &settings.colors;
        assert!(matches!(strokes[0], Call::Stroke { color, .. } if *color == colors.played));
        assert!(matches!(strokes[1], Call::Stroke { color, .. } if *color == colors.unplayed));
        assert!(matches!(strokes[2], Call::Stroke { color, .. } if *color == colors.played));
        assert!(matches!(strokes[3], Call::Stroke { color, .. } if *color == colors.unplayed));
        match strokes[4] {
            Call::Stroke { from, to, color } => {
                assert_eq!(*color, colors.cursor_hint);
                let segment = layout.segment(2).expect("segment");
                assert_eq!(*from, segment.start);
                assert_eq!(*to, segment.start.lerp(segment.end, 0.5));
            }
            other => panic!("unexpected call {other:?}"),
        }

        let node_fills: Vec<&Call> = calls
            .iter()
            .skip(3)
            .filter(|call| matches!(call, Call::Fill { .. }))
            .collect();
        assert_eq!(node_fills.len(), 4);
        assert_eq!(
            node_fills[0],
            &Call::Fill { arcs: 1, color: colors.circle_hover }
        );
        assert!(matches!(calls.last(), Some(Call::Fill { arcs: 1, .. })));
    }

    #[test]
    fn star_jitter_uses_cell_width_on_both_axes() {
        let center = star_center(8, 140.0, 70.0, 0.7, 0.7);
        assert!((center.x - (140.0 + 0.7 * 100.0)).abs() < 1e-9);
        assert!((center.y - (2.0 * 70.0 + 0.7 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn live_progress_is_proportional_to_position() {
        let settings = Settings::default();
        let tracks = tracks();
        let layout = layout_path(&tracks, Point::new(0.0, 0.0), settings.base_length);
        let progress = [
            TrackProgress { paused: false, current_time: 15.0 },
            TrackProgress { paused: true, current_time: 0.0 },
            TrackProgress { paused: true, current_time: 0.0 },
        ];
        let scene = Scene {
            tracks: &tracks,
            progress: &progress,
            layout: &layout,
            current: 0,
            pan: Point::default(),
            settings: &settings,
        };
        let mut surface = RecordingSurface::default();
        draw_frame(&mut surface, &scene);

        let segment = layout.segment(0).expect("segment");
        let expected = Call::Stroke {
            from: segment.start,
            to: segment.start.lerp(segment.end, 0.5),
            color: settings.colors.played,
        };
        assert!(surface.calls.contains(&expected));
    }

    #[test]
    fn live_fraction_guards_unknown_duration() {
        assert_eq!(live_fraction(5.0, 0.0), 0.0);
        assert_eq!(live_fraction(5.0, f64::NAN), 0.0);
        assert_eq!(live_fraction(50.0, 10.0), 1.0);
    }

    fn test_loop() -> RenderLoop {
        RenderLoop::new(Duration::from_millis(40), Duration::from_millis(1000), 10.0)
    }

    #[test]
    fn ticks_fire_on_their_own_intervals() {
        let mut render = test_loop();
        let t0 = Instant::now();
        assert_eq!(render.due(t0), Due::default());

        render.start(t0);
        assert_eq!(render.due(t0), Due { draw: true, sample_fps: false });
        assert_eq!(render.due(t0 + Duration::from_millis(20)), Due::default());
        assert!(render.due(t0 + Duration::from_millis(40)).draw);
        assert_eq!(
            render.due(t0 + Duration::from_millis(1000)),
            Due { draw: true, sample_fps: true }
        );
        // A long stall yields one tick, not a burst.
        assert!(render.due(t0 + Duration::from_millis(5000)).draw);
        assert!(!render.due(t0 + Duration::from_millis(5001)).draw);
    }

    #[test]
    fn fps_is_smoothed_per_draw_tick() {
        let mut render = test_loop();
        let t0 = Instant::now();
        render.start(t0);
        for frame in 1..=200 {
            render.record_frame(t0 + Duration::from_millis(40 * frame));
        }
        assert!((render.frame_time_ms() - 40.0).abs() < 0.01);
        render.sample_fps();
        assert_eq!(render.fps_text(), "25.0");

        render.stop();
        assert_eq!(render.fps_text(), "0");
        assert!(!render.is_running());
        assert_eq!(render.until_next(t0), None);
    }

    #[test]
    fn first_smoothing_step_moves_a_tenth_of_the_way() {
        let mut render = test_loop();
        let t0 = Instant::now();
        render.start(t0);
        render.record_frame(t0 + Duration::from_millis(100));
        assert!((render.frame_time_ms() - 10.0).abs() < 1e-9);
    }
}

use crate::audio::{MediaEvent, PlaybackHandle};
use crate::config::Settings;
use crate::display::{NowPlaying, Tooltip, VolumeBars};
use crate::geometry::Point;
use crate::hit_test::{self, Hit};
use crate::layout::{PathLayout, layout_path};
use crate::model::Track;
use crate::playback::PlaybackSync;
use crate::render::{RenderLoop, Scene, Surface, TrackProgress, draw_frame};
use anyhow::{Result, ensure};
use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Everything that can change session state. Pointer coordinates are client
/// (screen) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Media { track: usize, event: MediaEvent },
    MouseDown { x: f64, y: f64, button: MouseButton },
    MouseUp,
    MouseMove { x: f64, y: f64 },
    SetVolume(f32),
    SelectVolumeBar(u8),
    ToggleCurrent,
    ToggleRenderLoop,
}

pub struct Session {
    tracks: Vec<Track>,
    handles: Vec<Box<dyn PlaybackHandle>>,
    settings: Settings,
    sync: PlaybackSync,
    render: RenderLoop,
    layout: PathLayout,
    pan: Point,
    mouse_down: bool,
    drag_anchor: Option<Point>,
    ready: bool,
    rng: SmallRng,
    now_playing: NowPlaying,
    tooltip: Tooltip,
    volume_bars: VolumeBars,
    status: String,
    display_dirty: bool,
}

impl Session {
    pub fn new(
        tracks: Vec<Track>,
        mut handles: Vec<Box<dyn PlaybackHandle>>,
        settings: Settings,
    ) -> Result<Self> {
        ensure!(!tracks.is_empty(), "no tracks to play");
        ensure!(
            tracks.len() == handles.len(),
            "{} tracks but {} playback handles",
            tracks.len(),
            handles.len()
        );

        let mut sync = PlaybackSync::new(settings.volume);
        sync.set_volume(&mut handles, settings.volume);
        let rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => rand::make_rng::<SmallRng>(),
        };

        Ok(Self {
            render: RenderLoop::from_settings(&settings),
            volume_bars: VolumeBars::new(settings.volume_levels, sync.volume()),
            tracks,
            handles,
            settings,
            sync,
            layout: PathLayout::default(),
            pan: Point::default(),
            mouse_down: false,
            drag_anchor: None,
            ready: false,
            rng,
            now_playing: NowPlaying::default(),
            tooltip: Tooltip::default(),
            status: String::from("Loading track metadata..."),
            display_dirty: true,
        })
    }

    /// Drains pending media events from every handle.
    pub fn pump_media(&mut self, now: Instant) {
        for track in 0..self.handles.len() {
            while let Some(event) = self.handles[track].poll_event() {
                self.dispatch(Message::Media { track, event }, now);
            }
        }
    }

    pub fn dispatch(&mut self, message: Message, now: Instant) {
        match message {
            Message::Media { track, event } => self.on_media(track, event, now),
            Message::MouseDown { x, y, button } => self.on_mouse_down(Point::new(x, y), button),
            Message::MouseUp => {
                self.mouse_down = false;
                self.drag_anchor = None;
            }
            Message::MouseMove { x, y } => self.on_mouse_move(Point::new(x, y)),
            Message::SetVolume(volume) => self.set_volume(volume),
            Message::SelectVolumeBar(index) => {
                if let Some(volume) = self.volume_bars.volume_for(index) {
                    self.set_volume(volume);
                    self.volume_bars.select(index);
                }
            }
            Message::ToggleCurrent => {
                if self.ready {
                    let current = self.sync.current();
                    self.toggle(current);
                }
            }
            Message::ToggleRenderLoop => {
                if self.render.is_running() {
                    self.render.stop();
                    self.status = String::from("Animation stopped");
                } else if self.ready {
                    self.render.start(now);
                    self.status = String::from("Animation running");
                }
                self.display_dirty = true;
            }
        }
    }

    /// Runs whichever render ticks are due. Returns whether a frame was drawn.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn Surface) -> bool {
        let due = self.render.due(now);
        if due.draw {
            self.draw(surface);
            self.render.record_frame(now);
        }
        if due.sample_fps {
            self.render.sample_fps();
        }
        due.draw
    }

    /// Stops the animation and silences every track.
    pub fn shutdown(&mut self) {
        self.render.stop();
        for handle in &mut self.handles {
            handle.pause();
        }
        log::info!("session closed");
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        let (width, height) = surface.size();
        let start = self.settings.start_point(width, height);
        self.layout = layout_path(&self.tracks, start, self.settings.base_length);

        let current = self.sync.current();
        if let Some(track) = self.tracks.get(current) {
            let time = self.handles[current].current_time();
            self.now_playing.update(track, time);
        }

        let progress: Vec<TrackProgress> = self
            .handles
            .iter()
            .map(|handle| TrackProgress {
                paused: handle.is_paused(),
                current_time: handle.current_time(),
            })
            .collect();
        let scene = Scene {
            tracks: &self.tracks,
            progress: &progress,
            layout: &self.layout,
            current,
            pan: self.pan,
            settings: &self.settings,
        };
        draw_frame(surface, &scene);
        self.display_dirty = false;
    }

    fn on_media(&mut self, track: usize, event: MediaEvent, now: Instant) {
        if track >= self.tracks.len() {
            log::warn!("media event for unknown track {track}");
            return;
        }
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                if self.tracks[track].duration.is_none() {
                    self.tracks[track].duration = Some(duration);
                    log::debug!("track {track} duration {duration:.2}s");
                }
                self.maybe_finish_loading(now);
            }
            MediaEvent::Ended => {
                if !self.ready {
                    return;
                }
                log::debug!("track {track} ended");
                if let Err(err) = self.sync.on_ended(&mut self.handles, track) {
                    self.report(err);
                }
                self.display_dirty = true;
            }
            MediaEvent::TimeUpdate => {
                if self.sync.on_progress(track) {
                    self.display_dirty = true;
                }
            }
        }
    }

    fn maybe_finish_loading(&mut self, now: Instant) {
        if self.ready || self.tracks.iter().any(|track| track.duration.is_none()) {
            return;
        }
        for track in &mut self.tracks {
            let value = self.rng.random_range(0.0..1.0);
            track.assign_rand(value);
        }
        self.ready = true;
        self.status = String::from("Ready");
        self.display_dirty = true;
        self.render.start(now);
        log::info!("metadata loaded for {} tracks", self.tracks.len());
    }

    fn on_mouse_down(&mut self, client: Point, button: MouseButton) {
        if button != MouseButton::Left {
            self.mouse_down = false;
            self.drag_anchor = None;
            return;
        }
        if !self.ready {
            return;
        }
        self.mouse_down = true;

        match self.hit(client) {
            Some(Hit::Node(node)) => self.toggle(node.index),
            Some(Hit::Segment(segment)) => {
                let (track, progress) = (segment.track, segment.progress);
                if let Err(err) = self.sync.seek_and_play(&mut self.handles, track, progress) {
                    self.report(err);
                }
                self.display_dirty = true;
            }
            None => {}
        }
    }

    fn on_mouse_move(&mut self, client: Point) {
        if !self.ready {
            return;
        }

        if self.mouse_down {
            match self.drag_anchor {
                // First move of a drag only anchors it.
                None => self.drag_anchor = Some(client),
                Some(anchor) => {
                    self.pan = self.pan.offset(client.x - anchor.x, client.y - anchor.y);
                    self.drag_anchor = Some(client);
                }
            }
            return;
        }

        self.display_dirty = true;
        self.tooltip.hide();
        for track in &mut self.tracks {
            track.clear_hover();
        }
        match self.hit(client) {
            Some(Hit::Node(node)) => {
                let track = &mut self.tracks[node.index];
                track.cursor_on_start = true;
                self.tooltip
                    .show(track, node.point, self.pan, self.settings.radius);
            }
            Some(Hit::Segment(segment)) => {
                self.tracks[segment.track].cursor_on_track = Some(segment.progress);
            }
            None => {}
        }
    }

    fn hit(&self, client: Point) -> Option<Hit> {
        let local = client.offset(-self.pan.x, -self.pan.y);
        hit_test::hit(
            &self.layout,
            local,
            self.settings.radius,
            self.settings.err_margin,
            self.settings.progress_estimate,
        )
    }

    fn toggle(&mut self, index: usize) {
        if let Err(err) = self.sync.toggle(&mut self.handles, index) {
            self.report(err);
        }
        self.display_dirty = true;
    }

    fn set_volume(&mut self, volume: f32) {
        if self.sync.set_volume(&mut self.handles, volume) {
            self.settings.volume = volume;
            self.volume_bars.sync(volume);
            self.status = format!("Volume: {}%", (volume * 100.0).round() as u16);
            self.display_dirty = true;
        }
    }

    fn report(&mut self, err: anyhow::Error) {
        log::warn!("playback error: {err:#}");
        self.status = format!("playback error: {err:#}");
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn handles(&self) -> &[Box<dyn PlaybackHandle>] {
        &self.handles
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn current(&self) -> usize {
        self.sync.current()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render
    }

    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    pub fn tooltip(&self) -> &Tooltip {
        &self.tooltip
    }

    pub fn volume_bars(&self) -> &VolumeBars {
        &self.volume_bars
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether anything outside the canvas changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.display_dirty)
    }
}

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tracktrail::audio::{MediaEvent, NullHandle, PlaybackHandle};
use tracktrail::config::Settings;
use tracktrail::geometry::Point;
use tracktrail::model::Track;
use tracktrail::render::Surface;
use tracktrail::session::{Message, MouseButton, Session};
use tracktrail::ui::CanvasSurface;

#[derive(Debug, Default)]
struct HandleState {
    paused: bool,
    time: f64,
    duration: f64,
    volume: f32,
}

/// Handle whose state the test can inspect and poke from outside the session.
struct SharedHandle(Rc<RefCell<HandleState>>);

impl PlaybackHandle for SharedHandle {
    fn play(&mut self) -> anyhow::Result<()> {
        self.0.borrow_mut().paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.0.borrow().paused
    }

    fn current_time(&self) -> f64 {
        self.0.borrow().time
    }

    fn set_current_time(&mut self, seconds: f64) -> anyhow::Result<()> {
        self.0.borrow_mut().time = seconds;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        Some(self.0.borrow().duration)
    }

    fn volume(&self) -> f32 {
        self.0.borrow().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.borrow_mut().volume = volume;
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        None
    }
}

fn tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| Track::new(format!("track_{i}.mp3"), format!("Track {i}"), None))
        .collect()
}

fn settings() -> Settings {
    Settings {
        seed: Some(42),
        ..Settings::default()
    }
}

fn shared_session(durations: &[f64]) -> (Session, Vec<Rc<RefCell<HandleState>>>) {
    let states: Vec<_> = durations
        .iter()
        .map(|&duration| {
            Rc::new(RefCell::new(HandleState {
                paused: true,
                duration,
                volume: 1.0,
                ..HandleState::default()
            }))
        })
        .collect();
    let handles = states
        .iter()
        .map(|state| Box::new(SharedHandle(Rc::clone(state))) as Box<dyn PlaybackHandle>)
        .collect();
    let mut session = Session::new(tracks(durations.len()), handles, settings()).expect("session");
    let now = Instant::now();
    for (track, &duration) in durations.iter().enumerate() {
        session.dispatch(
            Message::Media {
                track,
                event: MediaEvent::LoadedMetadata { duration },
            },
            now,
        );
    }
    (session, states)
}

fn playing(states: &[Rc<RefCell<HandleState>>]) -> Vec<usize> {
    states
        .iter()
        .enumerate()
        .filter(|(_, state)| !state.borrow().paused)
        .map(|(index, _)| index)
        .collect()
}

fn click(session: &mut Session, at: Point) {
    let now = Instant::now();
    let (x, y) = (at.x + session.pan().x, at.y + session.pan().y);
    let button = MouseButton::Left;
    session.dispatch(Message::MouseDown { x, y, button }, now);
    session.dispatch(Message::MouseUp, now);
}

#[test]
fn layout_waits_for_metadata_and_respects_base_length() {
    let durations = [30.0, 0.0, 45.0];
    let handles = durations
        .iter()
        .enumerate()
        .map(|(i, &duration)| {
            let path = PathBuf::from(format!("track_{i}.mp3"));
            Box::new(NullHandle::with_duration(&path, duration)) as Box<dyn PlaybackHandle>
        })
        .collect();
    let mut session = Session::new(tracks(3), handles, settings()).expect("session");
    let mut surface = CanvasSurface::new(800.0, 600.0);
    let now = Instant::now();

    assert!(!session.tick(now, &mut surface));
    assert!(session.layout().nodes.is_empty());

    session.pump_media(now);
    assert!(session.is_ready());
    assert!(session.tick(now, &mut surface));

    let nodes = &session.layout().nodes;
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0].point, Point::new(400.0, 545.0));
    assert!((nodes[0].point.distance(nodes[1].point) - 130.0).abs() < 1e-9);
    assert!((nodes[1].point.distance(nodes[2].point) - 100.0).abs() < 1e-9);
    assert!((nodes[2].point.distance(nodes[3].point) - 145.0).abs() < 1e-9);
    assert_eq!(nodes[3].track, None);
    assert!(!surface.shapes().is_empty());
    assert_eq!(surface.size(), (800.0, 600.0));
}

#[test]
fn ended_tracks_chain_until_the_last_one() {
    let (mut session, states) = shared_session(&[30.0, 0.0, 45.0]);
    let mut surface = CanvasSurface::new(800.0, 600.0);
    session.tick(Instant::now(), &mut surface);

    let first = session.layout().nodes[0].point;
    click(&mut session, first);
    assert_eq!(playing(&states), vec![0]);

    for track in 0..3 {
        let mut state = states[track].borrow_mut();
        state.paused = true;
        state.time = state.duration;
        drop(state);
        session.dispatch(
            Message::Media {
                track,
                event: MediaEvent::Ended,
            },
            Instant::now(),
        );
        let expected: Vec<usize> = if track < 2 { vec![track + 1] } else { Vec::new() };
        assert_eq!(playing(&states), expected);
    }
    assert_eq!(session.current(), 2);
}

#[test]
fn clicking_mid_segment_seeks_and_plays() {
    let (mut session, states) = shared_session(&[30.0, 0.0, 45.0]);
    let mut surface = CanvasSurface::new(800.0, 600.0);
    session.tick(Instant::now(), &mut surface);
    let first = session.layout().nodes[0].point;
    click(&mut session, first);

    let segment = session.layout().segment(2).expect("segment");
    click(&mut session, segment.start.lerp(segment.end, 0.5));

    assert_eq!(playing(&states), vec![2]);
    assert!((states[2].borrow().time - 22.5).abs() < 1e-6);
    assert_eq!(states[0].borrow().time, 0.0);
    assert_eq!(session.current(), 2);
}

#[test]
fn out_of_range_volume_changes_nothing() {
    let (mut session, states) = shared_session(&[30.0, 45.0]);
    let now = Instant::now();

    session.dispatch(Message::SetVolume(0.3), now);
    session.dispatch(Message::SetVolume(1.5), now);
    session.dispatch(Message::SetVolume(-0.5), now);

    assert!(states.iter().all(|state| state.borrow().volume == 0.3));
    assert_eq!(session.settings().volume, 0.3);
}

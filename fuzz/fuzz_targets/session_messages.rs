#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracktrail::audio::{NullHandle, PlaybackHandle};
use tracktrail::config::Settings;
use tracktrail::model::Track;
use tracktrail::session::{Message, MouseButton, Session};
use tracktrail::ui::CanvasSurface;

fuzz_target!(|data: &[u8]| {
    let Some((&count, rest)) = data.split_first() else {
        return;
    };
    let count = usize::from(count % 8) + 1;
    let tracks = (0..count)
        .map(|i| Track::new(format!("track_{i}.mp3"), format!("{i}"), None))
        .collect();
    let handles = (0..count)
        .map(|i| {
            let path = PathBuf::from(format!("track_{i}.mp3"));
            let duration = f64::from(rest.get(i).copied().unwrap_or(0));
            Box::new(NullHandle::with_duration(&path, duration)) as Box<dyn PlaybackHandle>
        })
        .collect();
    let settings = Settings {
        seed: Some(u64::from(count as u8)),
        ..Settings::default()
    };
    let Ok(mut session) = Session::new(tracks, handles, settings) else {
        return;
    };
    let mut surface = CanvasSurface::new(640.0, 480.0);
    let mut now = Instant::now();

    for chunk in rest.chunks(3) {
        let [op, a, b] = [0, 1, 2].map(|i| chunk.get(i).copied().unwrap_or(0));
        let (x, y) = (f64::from(a) * 2.5, f64::from(b) * 2.0);
        let message = match op % 9 {
            0 => Message::MouseDown {
                x,
                y,
                button: MouseButton::Left,
            },
            1 => Message::MouseUp,
            2 => Message::MouseMove { x, y },
            3 => Message::SetVolume(f32::from(a) / 100.0),
            4 => Message::SelectVolumeBar(a % 12),
            5 => Message::ToggleCurrent,
            6 => Message::ToggleRenderLoop,
            7 => Message::Media {
                track: usize::from(a) % (count + 1),
                event: tracktrail::audio::MediaEvent::Ended,
            },
            _ => {
                now += Duration::from_millis(u64::from(a));
                session.pump_media(now);
                session.tick(now, &mut surface);
                continue;
            }
        };
        session.dispatch(message, now);
    }
});

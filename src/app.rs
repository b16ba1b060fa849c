use crate::audio::{AudioOutput, NullHandle, PlaybackHandle};
use crate::config;
use crate::library;
use crate::render::Surface;
use crate::session::{Message, MouseButton, Session};
use crate::ui::{self, CanvasSurface};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(33);
const REFRESH_INTERVAL: Duration = Duration::from_millis(250);
const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub inputs: Vec<PathBuf>,
    pub null_audio: bool,
}

pub fn run(options: AppOptions) -> Result<()> {
    let settings = config::load_settings()?;
    let tracks = library::collect_tracks(&options.inputs)?;
    log::info!("loaded {} tracks", tracks.len());

    let output = if options.null_audio {
        None
    } else {
        match AudioOutput::open() {
            Ok(output) => Some(output),
            Err(err) => {
                log::warn!("audio output unavailable, continuing silently: {err:#}");
                None
            }
        }
    };
    let handles: Vec<Box<dyn PlaybackHandle>> = tracks
        .iter()
        .map(|track| match &output {
            Some(output) => Box::new(output.handle(&track.path)) as Box<dyn PlaybackHandle>,
            None => Box::new(NullHandle::probing(&track.path)),
        })
        .collect();
    let mut session = Session::new(tracks, handles, settings)?;

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut surface = CanvasSurface::new(0.0, 0.0);
    let mut canvas_area = Rect::default();
    let mut last_draw = Instant::now();

    let result: Result<()> = loop {
        let now = Instant::now();
        session.pump_media(now);

        let size = terminal.size()?;
        let area = ui::canvas_rect(Rect::new(0, 0, size.width, size.height));
        if area != canvas_area {
            canvas_area = area;
            let (width, height) = ui::area_pixels(area);
            surface.resize(width, height);
            log::debug!("surface resized to {width}x{height}");
        }

        let drew = session.tick(now, &mut surface);
        if drew || session.take_dirty() || last_draw.elapsed() > REFRESH_INTERVAL {
            terminal.draw(|frame| ui::draw(frame, &session, &surface))?;
            last_draw = Instant::now();
        }

        let timeout = session
            .render_loop()
            .until_next(Instant::now())
            .map_or(IDLE_POLL, |wait| wait.min(IDLE_POLL));
        if !event::poll(timeout)? {
            continue;
        }

        let now = Instant::now();
        match event::read()? {
            Event::Mouse(mouse) => handle_mouse(&mut session, mouse, canvas_area, now),
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if is_quit(&key) {
                    break Ok(());
                }
                if let Some(message) = key_message(&key, session.settings().volume) {
                    session.dispatch(message, now);
                }
            }
            _ => {}
        }
    };

    session.shutdown();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    let save_result = config::save_settings(session.settings());
    result?;
    save_result?;
    Ok(())
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

fn key_message(key: &KeyEvent, volume: f32) -> Option<Message> {
    match key.code {
        KeyCode::Char(' ') => Some(Message::ToggleCurrent),
        KeyCode::Char('s') => Some(Message::ToggleRenderLoop),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(step_volume(volume, VOLUME_STEP)),
        KeyCode::Char('-') => Some(step_volume(volume, -VOLUME_STEP)),
        // Digits pick a volume bar; `0` is the tenth.
        KeyCode::Char(digit @ '0'..='9') => {
            let value = digit.to_digit(10)? as u8;
            Some(Message::SelectVolumeBar(if value == 0 { 9 } else { value - 1 }))
        }
        _ => None,
    }
}

fn step_volume(volume: f32, step: f32) -> Message {
    // Rounded to the bar grid so repeated steps land back on exact levels.
    Message::SetVolume(((volume + step) * 10.0).round() / 10.0)
}

fn handle_mouse(session: &mut Session, mouse: MouseEvent, canvas: Rect, now: Instant) {
    if let MouseEventKind::Up(_) = mouse.kind {
        session.dispatch(Message::MouseUp, now);
        return;
    }
    let Some(p) = ui::cell_to_pixel(canvas, mouse.column, mouse.row) else {
        return;
    };
    let message = match mouse.kind {
        MouseEventKind::Down(button) => Message::MouseDown {
            x: p.x,
            y: p.y,
            button: map_button(button),
        },
        MouseEventKind::Moved | MouseEventKind::Drag(_) => Message::MouseMove { x: p.x, y: p.y },
        MouseEventKind::ScrollUp => step_volume(session.settings().volume, VOLUME_STEP),
        MouseEventKind::ScrollDown => step_volume(session.settings().volume, -VOLUME_STEP),
        _ => return,
    };
    session.dispatch(message, now);
}

fn map_button(button: event::MouseButton) -> MouseButton {
    match button {
        event::MouseButton::Left => MouseButton::Left,
        event::MouseButton::Right => MouseButton::Right,
        event::MouseButton::Middle => MouseButton::Middle,
    }
}

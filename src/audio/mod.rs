use crate::library;
use anyhow::{Context, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate,
    Ended,
}

/// One track's playback. Requests are fire-and-forget; state changes that
/// happen on the media side come back through [`PlaybackHandle::poll_event`].
pub trait PlaybackHandle {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Seconds from the start of the track.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64) -> Result<()>;
    /// Unknown until `LoadedMetadata` has been emitted.
    fn duration(&self) -> Option<f64>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn poll_event(&mut self) -> Option<MediaEvent>;
}

/// Background duration lookup. Resolves exactly once.
struct MetadataProbe {
    rx: Option<Receiver<Option<f64>>>,
}

impl MetadataProbe {
    fn spawn(path: &Path) -> Self {
        let (tx, rx) = mpsc::channel();
        let path = path.to_path_buf();
        thread::spawn(move || {
            let _ = tx.send(library::probe_duration(&path));
        });
        Self { rx: Some(rx) }
    }

    fn resolved(duration: f64) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(Some(duration));
        Self { rx: Some(rx) }
    }

    fn poll(&mut self, path: &Path) -> Option<f64> {
        let rx = self.rx.as_ref()?;
        let duration = match rx.try_recv() {
            Ok(duration) => duration,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => None,
        };
        self.rx = None;
        Some(duration.unwrap_or_else(|| {
            log::warn!("could not determine duration of {}", path.display());
            0.0
        }))
    }
}

/// Shared output device for all track handles.
pub struct AudioOutput {
    stream: Rc<OutputStream>,
}

impl AudioOutput {
    pub fn open() -> Result<Self> {
        let mut stream = with_silenced_stderr(open_output_stream)?;
        stream.log_on_drop(false);
        Ok(Self {
            stream: Rc::new(stream),
        })
    }

    pub fn handle(&self, path: &Path) -> RodioHandle {
        RodioHandle::new(Rc::clone(&self.stream), path)
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let default = OutputStreamBuilder::from_default_device()
        .context("failed to open default system output stream")
        .and_then(|builder| {
            builder
                .with_error_callback(|_| {})
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        });
    let default_err = match default {
        Ok(stream) => return Ok(stream),
        Err(err) => err,
    };

    let host = rodio::cpal::default_host();
    for device in host.output_devices().ok().into_iter().flatten() {
        let name = device.name().unwrap_or_default();
        let opened = OutputStreamBuilder::from_device(device)
            .context("failed to open fallback output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start fallback output stream")
            });
        if let Ok(stream) = opened {
            log::info!("using fallback output device {name}");
            return Ok(stream);
        }
    }

    Err(default_err).context("unable to start any audio output stream")
}

pub struct RodioHandle {
    stream: Rc<OutputStream>,
    path: PathBuf,
    sink: Option<Sink>,
    pending_position: Duration,
    duration: Option<f64>,
    probe: MetadataProbe,
    volume: f32,
    playing: bool,
    ended: bool,
    last_update: Instant,
}

impl RodioHandle {
    fn new(stream: Rc<OutputStream>, path: &Path) -> Self {
        Self {
            stream,
            path: path.to_path_buf(),
            sink: None,
            pending_position: Duration::ZERO,
            duration: None,
            probe: MetadataProbe::spawn(path),
            volume: 1.0,
            playing: false,
            ended: false,
            last_update: Instant::now(),
        }
    }

    fn load(&mut self) -> Result<&Sink> {
        if self.sink.is_none() {
            let file = File::open(&self.path)
                .with_context(|| format!("failed to open track {}", self.path.display()))?;
            let source = Decoder::try_from(file)
                .with_context(|| format!("failed to decode {}", self.path.display()))?;
            let sink = Sink::connect_new(self.stream.mixer());
            sink.pause();
            sink.set_volume(self.volume);
            sink.append(source);
            if !self.pending_position.is_zero() {
                sink.try_seek(self.pending_position).map_err(|err| {
                    anyhow::anyhow!("failed to seek {}: {err:?}", self.path.display())
                })?;
            }
            self.sink = Some(sink);
        }
        self.sink.as_ref().context("sink should be loaded")
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl PlaybackHandle for RodioHandle {
    fn play(&mut self) -> Result<()> {
        self.load()?.play();
        self.playing = true;
        self.ended = false;
        self.pending_position = Duration::ZERO;
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            self.pending_position = sink.get_pos();
            sink.pause();
        }
        self.playing = false;
    }

    fn is_paused(&self) -> bool {
        !self.playing
    }

    fn current_time(&self) -> f64 {
        if self.ended {
            return ended_position(self.duration);
        }
        match &self.sink {
            Some(sink) => sink.get_pos().as_secs_f64(),
            None => self.pending_position.as_secs_f64(),
        }
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        let target = seconds_to_duration(seconds);
        self.ended = false;
        if self.playing
            && let Some(sink) = &self.sink
        {
            return sink.try_seek(target).map_err(|err| {
                anyhow::anyhow!("failed to seek {}: {err:?}", self.path.display())
            });
        }

        // Paused tracks are reopened at the new position on the next play.
        self.unload();
        self.pending_position = target;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if self.duration.is_none()
            && let Some(duration) = self.probe.poll(&self.path)
        {
            self.duration = Some(duration);
            return Some(MediaEvent::LoadedMetadata { duration });
        }

        if self.playing && self.sink.as_ref().is_some_and(Sink::empty) {
            self.unload();
            self.playing = false;
            self.ended = true;
            return Some(MediaEvent::Ended);
        }

        if self.playing && self.last_update.elapsed() >= TIME_UPDATE_INTERVAL {
            self.last_update = Instant::now();
            return Some(MediaEvent::TimeUpdate);
        }
        None
    }
}

/// Wall-clock playback for machines without an audio device.
pub struct NullHandle {
    path: PathBuf,
    probe: MetadataProbe,
    duration: Option<f64>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    ended: bool,
    last_update: Instant,
}

impl NullHandle {
    pub fn probing(path: &Path) -> Self {
        Self::with_probe(path, MetadataProbe::spawn(path))
    }

    /// Handle whose metadata resolves to `duration` on the first poll.
    pub fn with_duration(path: &Path, duration: f64) -> Self {
        Self::with_probe(path, MetadataProbe::resolved(duration))
    }

    fn with_probe(path: &Path, probe: MetadataProbe) -> Self {
        Self {
            path: path.to_path_buf(),
            probe,
            duration: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            ended: false,
            last_update: Instant::now(),
        }
    }

    fn position(&self) -> Duration {
        let mut position = self.position_offset;
        if let Some(started_at) = self.started_at {
            position = position.saturating_add(started_at.elapsed());
        }
        match self.duration {
            Some(duration) => position.min(seconds_to_duration(duration)),
            None => position,
        }
    }
}

impl PlaybackHandle for NullHandle {
    fn play(&mut self) -> Result<()> {
        if self.ended {
            self.position_offset = Duration::ZERO;
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        self.ended = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.position();
        self.started_at = None;
    }

    fn is_paused(&self) -> bool {
        self.started_at.is_none()
    }

    fn current_time(&self) -> f64 {
        self.position().as_secs_f64()
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        self.position_offset = seconds_to_duration(seconds);
        self.ended = false;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if self.duration.is_none()
            && let Some(duration) = self.probe.poll(&self.path)
        {
            self.duration = Some(duration);
            return Some(MediaEvent::LoadedMetadata { duration });
        }

        let duration = self.duration?;
        if self.started_at.is_none() {
            return None;
        }
        if !self.ended && self.position().as_secs_f64() >= duration {
            self.pause();
            self.ended = true;
            return Some(MediaEvent::Ended);
        }
        if self.last_update.elapsed() >= TIME_UPDATE_INTERVAL {
            self.last_update = Instant::now();
            return Some(MediaEvent::TimeUpdate);
        }
        None
    }
}

/// Where a finished track reports its playhead: exactly at its end.
fn ended_position(duration: Option<f64>) -> f64 {
    duration.unwrap_or(0.0)
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

use crate::audio::PlaybackHandle;
use anyhow::{Context, Result};

pub type Handles = [Box<dyn PlaybackHandle>];

/// Keeps at most one handle playing and tracks which track is current.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSync {
    current: usize,
    volume: f32,
}

impl PlaybackSync {
    pub fn new(volume: f32) -> Self {
        Self {
            current: 0,
            volume: if (0.0..=1.0).contains(&volume) { volume } else { 1.0 },
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Starts a paused track (pausing and rewinding all others) or pauses a
    /// playing one. Pausing leaves the cursor where it is.
    pub fn toggle(&mut self, handles: &mut Handles, index: usize) -> Result<()> {
        let handle = handles
            .get_mut(index)
            .with_context(|| format!("no track at index {index}"))?;
        if handle.is_paused() {
            self.play_exclusive(handles, index)
        } else {
            handle.pause();
            log::debug!("paused track {index}");
            Ok(())
        }
    }

    /// Jumps to `progress` of the track and plays it, whatever its state.
    pub fn seek_and_play(
        &mut self,
        handles: &mut Handles,
        index: usize,
        progress: f64,
    ) -> Result<()> {
        let handle = handles
            .get_mut(index)
            .with_context(|| format!("no track at index {index}"))?;
        let target = handle.duration().unwrap_or(0.0) * progress.clamp(0.0, 1.0);
        handle
            .set_current_time(target)
            .with_context(|| format!("failed to seek track {index}"))?;
        log::debug!("seeking track {index} to {target:.2}s");
        self.play_exclusive(handles, index)
    }

    /// Advances to the next track. The last track ending is terminal.
    pub fn on_ended(&mut self, handles: &mut Handles, index: usize) -> Result<()> {
        let next = index + 1;
        if next >= handles.len() {
            log::info!("playlist finished");
            return Ok(());
        }
        self.toggle(handles, next)
    }

    /// Whether a progress report should refresh the now-playing display.
    pub fn on_progress(&self, index: usize) -> bool {
        index == self.current
    }

    /// Applies `volume` to every handle. Values outside [0, 1] are ignored.
    pub fn set_volume(&mut self, handles: &mut Handles, volume: f32) -> bool {
        if !(0.0..=1.0).contains(&volume) {
            return false;
        }
        self.volume = volume;
        for handle in handles.iter_mut() {
            handle.set_volume(volume);
        }
        true
    }

    fn play_exclusive(&mut self, handles: &mut Handles, index: usize) -> Result<()> {
        for (other, handle) in handles.iter_mut().enumerate() {
            if other == index {
                continue;
            }
            handle.pause();
            if let Err(err) = handle.set_current_time(0.0) {
                log::warn!("failed to rewind track {other}: {err:#}");
            }
        }

        let handle = handles
            .get_mut(index)
            .with_context(|| format!("no track at index {index}"))?;
        self.current = index;
        handle
            .play()
            .with_context(|| format!("failed to start track {index}"))?;
        log::debug!("playing track {index}");
        Ok(())
    }
}

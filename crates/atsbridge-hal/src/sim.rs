//! In-process collaborators for headless tests and the CLI.
//!
//! [`SimAudio`] records every command it receives and lets a test end one-shot
//! playbacks on demand.  [`SimRoute`] builds a linked section list without a
//! route parser.
//!
//! # Example
//!
//! ```rust
//! use atsbridge_hal::sim::SimRoute;
//! use atsbridge_hal::SectionGraph;
//!
//! let route = SimRoute::new()
//!     .with_section(100.0, &[0, 2, 5], Some(2))
//!     .with_section(600.0, &[0, 2, 5], Some(0))
//!     .build();
//!
//! assert_eq!(route.len(), 2);
//! assert_eq!(route[0].next, Some(1));
//! ```

use std::collections::{BTreeMap, HashSet};

use atsbridge_types::TrainId;
use tracing::trace;

use crate::audio::{AudioEngine, PlaybackHandle};
use crate::sections::{Section, SectionAspect};

// ────────────────────────────────────────────────────────────────────────────
// Simulated audio
// ────────────────────────────────────────────────────────────────────────────

/// A command received by [`SimAudio`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Play { slot: usize, gain: f64, looped: bool },
    Stop { slot: usize },
    SetGain { slot: usize, gain: f64 },
}

#[derive(Debug, Clone)]
struct SimPlayback {
    slot: usize,
    gain: f64,
    looped: bool,
    finished: bool,
}

/// Audio engine that plays nothing and remembers everything.
#[derive(Debug, Default)]
pub struct SimAudio {
    /// Slots with a sound bound to them; `None` means every slot.
    defined: Option<HashSet<usize>>,
    next_handle: u64,
    live: BTreeMap<u64, SimPlayback>,
    commands: Vec<AudioCommand>,
}

impl SimAudio {
    /// Engine where every slot has a sound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine where only `slots` have a sound.
    pub fn with_slots(slots: impl IntoIterator<Item = usize>) -> Self {
        Self {
            defined: Some(slots.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> &[AudioCommand] {
        &self.commands
    }

    /// Drain the recorded commands.
    pub fn take_commands(&mut self) -> Vec<AudioCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Mark every one-shot playback on `slot` as having reached its end.
    pub fn finish(&mut self, slot: usize) {
        for p in self.live.values_mut() {
            if p.slot == slot && !p.looped {
                p.finished = true;
            }
        }
    }

    /// Gain of the live playback on `slot`, if any.
    pub fn gain_of(&self, slot: usize) -> Option<f64> {
        self.live
            .values()
            .find(|p| p.slot == slot && !p.finished)
            .map(|p| p.gain)
    }

    /// `true` while an unfinished playback exists on `slot`.
    pub fn is_playing(&self, slot: usize) -> bool {
        self.gain_of(slot).is_some()
    }
}

impl AudioEngine for SimAudio {
    fn play(&mut self, slot: usize, gain: f64, looped: bool) -> Option<PlaybackHandle> {
        if let Some(defined) = &self.defined
            && !defined.contains(&slot)
        {
            return None;
        }
        self.next_handle += 1;
        self.live.insert(
            self.next_handle,
            SimPlayback {
                slot,
                gain,
                looped,
                finished: false,
            },
        );
        self.commands.push(AudioCommand::Play { slot, gain, looped });
        trace!(slot, gain, looped, "sim audio: play");
        Some(PlaybackHandle(self.next_handle))
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        if let Some(p) = self.live.remove(&handle.0) {
            self.commands.push(AudioCommand::Stop { slot: p.slot });
            trace!(slot = p.slot, "sim audio: stop");
        }
    }

    fn set_gain(&mut self, handle: PlaybackHandle, gain: f64) {
        if let Some(p) = self.live.get_mut(&handle.0) {
            p.gain = gain;
            self.commands.push(AudioCommand::SetGain {
                slot: p.slot,
                gain,
            });
        }
    }

    fn is_finished(&self, handle: PlaybackHandle) -> bool {
        self.live.get(&handle.0).is_none_or(|p| p.finished)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRoute builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a linear (or looped) section list.
///
/// Each section added with [`with_section`][Self::with_section] is linked
/// forward from the previous one.
#[derive(Default)]
pub struct SimRoute {
    sections: Vec<Section>,
    looped: bool,
}

impl SimRoute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section with the given aspect numbers and current aspect
    /// index.
    pub fn with_section(mut self, track_position: f64, aspects: &[i32], current: Option<usize>) -> Self {
        let len = self.sections.len();
        if let Some(prev) = self.sections.last_mut() {
            prev.next = Some(len);
        }
        self.sections.push(Section {
            track_position,
            aspects: aspects.iter().copied().map(SectionAspect::new).collect(),
            current_aspect: current,
            next: None,
            trains: Vec::new(),
        });
        self
    }

    /// Put `train` inside the most recently added section.
    pub fn occupied_by(mut self, train: TrainId) -> Self {
        if let Some(last) = self.sections.last_mut() {
            last.trains.push(train);
        }
        self
    }

    /// Link the last section back to the first.
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    pub fn build(mut self) -> Vec<Section> {
        if self.looped && let Some(last) = self.sections.last_mut() {
            last.next = Some(0);
        }
        self.sections
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

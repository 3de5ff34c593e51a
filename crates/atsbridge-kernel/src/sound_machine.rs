//! [`SoundMachine`] – sound slot codes → audio commands.
//!
//! A module drives sound by writing one code per slot into the shared sound
//! array:
//!
//! | Code | Meaning |
//! |---|---|
//! | `-10000` | stop |
//! | `-9999..=0` | loop at gain `(code + 10000) / 10000` |
//! | `1` | play once, then the slot is rewritten to `2` |
//! | `2` | continue |
//!
//! Anything else invalidates the tick and leaves playback untouched.
//!
//! The machine keeps the last code it acted on per slot and only issues a
//! command when the module writes a different one, so a module that holds a
//! code for many ticks produces exactly one command.

use atsbridge_hal::{AudioEngine, PlaybackHandle};
use atsbridge_types::sound::{CONTINUE, PLAY_LOOPING, PLAY_ONCE, STOP};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct SoundSlot {
    cache: i32,
    playback: Option<PlaybackHandle>,
}

/// Per-slot comparator between the module's sound array and the audio engine.
///
/// # Example
///
/// ```
/// use atsbridge_hal::sim::SimAudio;
/// use atsbridge_kernel::sound_machine::SoundMachine;
///
/// let mut sound = [2i32; 4];
/// let mut machine = SoundMachine::new(&sound);
/// let mut audio = SimAudio::new();
///
/// sound[0] = 1;
/// assert!(machine.update(&mut sound, &mut audio));
/// assert_eq!(sound[0], 2);
/// assert_eq!(audio.commands().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SoundMachine {
    slots: Vec<SoundSlot>,
}

impl SoundMachine {
    /// Create a machine whose caches hold the initial sound array contents.
    pub fn new(initial: &[i32]) -> Self {
        Self {
            slots: initial
                .iter()
                .map(|&cache| SoundSlot {
                    cache,
                    playback: None,
                })
                .collect(),
        }
    }

    /// Last code acted on for `slot`.
    pub fn cache(&self, slot: usize) -> Option<i32> {
        self.slots.get(slot).map(|s| s.cache)
    }

    /// Process every slot once.  Returns `false` when any slot holds a code
    /// outside the protocol's bands.
    pub fn update(&mut self, codes: &mut [i32], audio: &mut dyn AudioEngine) -> bool {
        let mut valid = true;
        for (index, (slot, code)) in self.slots.iter_mut().zip(codes.iter_mut()).enumerate() {
            if !is_known(*code) {
                valid = false;
            }
            if *code != slot.cache {
                apply(index, slot, code, audio);
                slot.cache = *code;
            }
            if let Some(handle) = slot.playback
                && audio.is_finished(handle)
            {
                trace!(slot = index, "one-shot finished");
                audio.stop(handle);
                slot.playback = None;
            }
        }
        valid
    }

    /// Stop every live playback.
    pub fn stop_all(&mut self, audio: &mut dyn AudioEngine) {
        for slot in &mut self.slots {
            if let Some(handle) = slot.playback.take() {
                audio.stop(handle);
            }
        }
    }
}

fn is_known(code: i32) -> bool {
    (STOP..=PLAY_LOOPING).contains(&code) || code == PLAY_ONCE || code == CONTINUE
}

/// Gain for a looping code.  `STOP` itself is not part of the band.
fn loop_gain(code: i32) -> f64 {
    f64::from(code - STOP) / f64::from(PLAY_LOOPING - STOP)
}

fn apply(index: usize, slot: &mut SoundSlot, code: &mut i32, audio: &mut dyn AudioEngine) {
    match *code {
        STOP => {
            if let Some(handle) = slot.playback.take() {
                debug!(slot = index, "sound stop");
                audio.stop(handle);
            }
        }
        c if c > STOP && c <= PLAY_LOOPING => {
            let gain = loop_gain(c);
            let current = slot.playback;
            match current {
                Some(handle) if !audio.is_finished(handle) => audio.set_gain(handle, gain),
                previous => {
                    if let Some(handle) = previous {
                        audio.stop(handle);
                    }
                    debug!(slot = index, gain, "sound loop");
                    slot.playback = audio.play(index, gain, true);
                }
            }
        }
        PLAY_ONCE => {
            if let Some(handle) = slot.playback.take() {
                audio.stop(handle);
            }
            debug!(slot = index, "sound play once");
            slot.playback = audio.play(index, 1.0, false);
            *code = CONTINUE;
        }
        CONTINUE => {}
        other => trace!(slot = index, code = other, "unknown sound code"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atsbridge_hal::sim::{AudioCommand, SimAudio};

    fn machine(n: usize) -> (SoundMachine, Vec<i32>, SimAudio) {
        let codes = vec![CONTINUE; n];
        (SoundMachine::new(&codes), codes, SimAudio::new())
    }

    #[test]
    fn repeated_code_issues_one_command() {
        let (mut m, mut codes, mut audio) = machine(2);
        codes[1] = -5000;
        assert!(m.update(&mut codes, &mut audio));
        assert!(m.update(&mut codes, &mut audio));
        assert!(m.update(&mut codes, &mut audio));
        assert_eq!(
            audio.commands(),
            &[AudioCommand::Play { slot: 1, gain: 0.5, looped: true }]
        );
        assert_eq!(m.cache(1), Some(-5000));
    }

    #[test]
    fn loop_gain_edges() {
        assert!((loop_gain(PLAY_LOOPING) - 1.0).abs() < f64::EPSILON);
        let lowest = loop_gain(STOP + 1);
        assert!(lowest > 0.0 && lowest < 0.001);
    }

    #[test]
    fn code_just_above_stop_starts_a_quiet_loop() {
        let (mut m, mut codes, mut audio) = machine(1);
        codes[0] = STOP + 1;
        assert!(m.update(&mut codes, &mut audio));
        assert!(audio.is_playing(0));
        match audio.commands() {
            [AudioCommand::Play { slot: 0, gain, looped: true }] => assert!(*gain > 0.0 && *gain < 0.001),
            other => panic!("expected one looping play, got {other:?}"),
        }

        codes[0] = STOP;
        m.update(&mut codes, &mut audio);
        assert!(!audio.is_playing(0));
    }

    #[test]
    fn looping_code_change_modulates_gain() {
        let (mut m, mut codes, mut audio) = machine(1);
        codes[0] = -10000 + 2500;
        m.update(&mut codes, &mut audio);
        codes[0] = 0;
        m.update(&mut codes, &mut audio);
        assert_eq!(
            audio.take_commands(),
            vec![
                AudioCommand::Play { slot: 0, gain: 0.25, looped: true },
                AudioCommand::SetGain { slot: 0, gain: 1.0 },
            ]
        );
        codes[0] = STOP;
        m.update(&mut codes, &mut audio);
        assert_eq!(audio.take_commands(), vec![AudioCommand::Stop { slot: 0 }]);
        assert!(!audio.is_playing(0));
    }

    #[test]
    fn play_once_fires_exactly_once_and_resets_slot() {
        let (mut m, mut codes, mut audio) = machine(1);
        codes[0] = PLAY_ONCE;
        m.update(&mut codes, &mut audio);
        assert_eq!(codes[0], CONTINUE);
        assert_eq!(m.cache(0), Some(CONTINUE));
        m.update(&mut codes, &mut audio);
        assert_eq!(
            audio.take_commands(),
            vec![AudioCommand::Play { slot: 0, gain: 1.0, looped: false }]
        );

        // A new PLAY restarts the sound.
        codes[0] = PLAY_ONCE;
        m.update(&mut codes, &mut audio);
        assert_eq!(
            audio.take_commands(),
            vec![
                AudioCommand::Stop { slot: 0 },
                AudioCommand::Play { slot: 0, gain: 1.0, looped: false },
            ]
        );
    }

    #[test]
    fn finished_one_shot_is_stopped_for_retrigger() {
        let (mut m, mut codes, mut audio) = machine(1);
        codes[0] = PLAY_ONCE;
        m.update(&mut codes, &mut audio);
        audio.take_commands();

        audio.finish(0);
        m.update(&mut codes, &mut audio);
        assert_eq!(audio.take_commands(), vec![AudioCommand::Stop { slot: 0 }]);

        m.update(&mut codes, &mut audio);
        assert!(audio.commands().is_empty());
    }

    #[test]
    fn unknown_code_invalidates_without_touching_playback() {
        let (mut m, mut codes, mut audio) = machine(1);
        codes[0] = -100;
        m.update(&mut codes, &mut audio);
        audio.take_commands();

        codes[0] = 3;
        assert!(!m.update(&mut codes, &mut audio));
        assert!(audio.commands().is_empty());
        assert!(audio.is_playing(0));

        // Still invalid while the module keeps writing it.
        assert!(!m.update(&mut codes, &mut audio));
    }

    #[test]
    fn initial_contents_seed_the_cache() {
        let mut codes = vec![0i32; 2];
        let mut m = SoundMachine::new(&codes);
        let mut audio = SimAudio::new();
        assert!(m.update(&mut codes, &mut audio));
        assert!(audio.commands().is_empty());
    }

    #[test]
    fn undefined_slot_plays_nothing() {
        let mut codes = vec![CONTINUE; 2];
        let mut m = SoundMachine::new(&codes);
        let mut audio = SimAudio::with_slots([0]);
        codes[1] = PLAY_ONCE;
        assert!(m.update(&mut codes, &mut audio));
        assert!(audio.commands().is_empty());
        assert_eq!(codes[1], CONTINUE);
    }

    #[test]
    fn stop_all_stops_live_playbacks() {
        let (mut m, mut codes, mut audio) = machine(3);
        codes[0] = 0;
        codes[2] = -1;
        m.update(&mut codes, &mut audio);
        audio.take_commands();
        m.stop_all(&mut audio);
        assert_eq!(audio.commands().len(), 2);
    }
}

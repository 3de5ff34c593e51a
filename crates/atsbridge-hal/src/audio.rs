//! Generic `AudioEngine` trait for the host's sound system.
//!
//! A safety module addresses sounds by slot index.  The host owns the actual
//! buffers; the bridge only asks it to start, stop or re-gain a playback, and
//! to report whether a playback has run to its end.

/// Opaque handle to one live playback returned by [`AudioEngine::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(pub u64);

/// The host's audio system, as seen by the bridge.
pub trait AudioEngine {
    /// Start the sound bound to `slot` at `gain` (`0.0..=1.0`).
    ///
    /// Returns `None` when the train defines no sound for `slot`.
    fn play(&mut self, slot: usize, gain: f64, looped: bool) -> Option<PlaybackHandle>;

    /// Stop a playback.  Stopping a finished playback is a no-op.
    fn stop(&mut self, handle: PlaybackHandle);

    /// Change the gain of a running playback.
    fn set_gain(&mut self, handle: PlaybackHandle, gain: f64);

    /// `true` once a one-shot playback has reached its end.
    fn is_finished(&self, handle: PlaybackHandle) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal engine that only knows slot 0 and never finishes.
    #[derive(Default)]
    struct OneSlotEngine {
        gain: f64,
        playing: bool,
    }

    impl AudioEngine for OneSlotEngine {
        fn play(&mut self, slot: usize, gain: f64, _looped: bool) -> Option<PlaybackHandle> {
            if slot != 0 {
                return None;
            }
            self.gain = gain;
            self.playing = true;
            Some(PlaybackHandle(1))
        }

        fn stop(&mut self, _handle: PlaybackHandle) {
            self.playing = false;
        }

        fn set_gain(&mut self, _handle: PlaybackHandle, gain: f64) {
            self.gain = gain;
        }

        fn is_finished(&self, _handle: PlaybackHandle) -> bool {
            !self.playing
        }
    }

    #[test]
    fn trait_object_dispatch() {
        let mut engine: Box<dyn AudioEngine> = Box::new(OneSlotEngine::default());
        assert!(engine.play(3, 1.0, false).is_none());

        let handle = engine.play(0, 0.5, true).unwrap();
        assert!(!engine.is_finished(handle));
        engine.set_gain(handle, 0.25);
        engine.stop(handle);
        assert!(engine.is_finished(handle));
    }
}

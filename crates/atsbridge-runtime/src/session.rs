//! [`PluginSession`] – one loaded module and everything tied to its lifetime.
//!
//! The session owns the shared panel and sound arrays (boxed, so their
//! addresses never move while the module is loaded), the sound slot caches,
//! the last values pushed through the diffed entry points, the validity flag
//! of the last tick and the last boundary fault.  Dropping the session
//! releases all of it.
//!
//! Every call into the module goes through [`PluginSession::call`], which
//! holds the re-entrancy guard for the call's duration and records faults.

use atsbridge_hal::AudioEngine;
use atsbridge_kernel::handle_codec::{DecodedHandles, decode_handles, encode_brake, encode_handles};
use atsbridge_kernel::signal_lookahead::BeaconMessage;
use atsbridge_kernel::{CallGuard, SoundMachine};
use atsbridge_types::{
    BridgeError, DoorState, HandleState, HornType, InitializationMode, PANEL_SIZE, SOUND_SIZE,
    TrainConfig, VehicleState, VirtualKey,
};
use tracing::{debug, trace, warn};

use crate::module::SafetyModule;

/// State of a loaded module.
pub struct PluginSession {
    module: Box<dyn SafetyModule>,
    guard: CallGuard,
    panel: Box<[i32]>,
    sound: Box<[i32]>,
    sounds: SoundMachine,
    valid: bool,
    last_power: Option<i32>,
    last_brake: Option<i32>,
    last_reverser: Option<i32>,
    last_signal: Option<i32>,
    doors: DoorState,
    last_fault: Option<BridgeError>,
}

impl PluginSession {
    /// Wrap an opened module and allocate its shared arrays.
    pub(crate) fn new(module: Box<dyn SafetyModule>) -> Self {
        let panel = vec![0; PANEL_SIZE].into_boxed_slice();
        let sound = vec![0; SOUND_SIZE].into_boxed_slice();
        // Caches start at 0, so a full-gain loop written on the first tick starts nothing.
        let sounds = SoundMachine::new(&sound);
        Self {
            module,
            guard: CallGuard::new(),
            panel,
            sound,
            sounds,
            valid: true,
            last_power: None,
            last_brake: None,
            last_reverser: None,
            last_signal: None,
            doors: DoorState::None,
            last_fault: None,
        }
    }

    pub fn title(&self) -> &str {
        self.module.title()
    }

    /// Whether the last tick's output was fully within legal ranges.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn last_fault(&self) -> Option<&BridgeError> {
        self.last_fault.as_ref()
    }

    pub fn panel(&self) -> &[i32] {
        &self.panel
    }

    pub fn sound(&self) -> &[i32] {
        &self.sound
    }

    pub fn doors(&self) -> DoorState {
        self.doors
    }

    /// Run `f` against the module while holding the call guard.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Reentrant`] when a call is already outstanding; any
    /// error `f` returns, which is also stored as the last fault.
    pub fn call<T>(
        &mut self,
        entry_point: &'static str,
        f: impl FnOnce(&mut dyn SafetyModule) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let _token = self.guard.enter(entry_point)?;
        let result = f(self.module.as_mut());
        if let Err(e) = &result {
            warn!(plugin = %self.module.title(), entry_point, error = %e, "plugin fault");
            self.last_fault = Some(e.clone());
        }
        result
    }

    // ── per-tick ────────────────────────────────────────────────────────────

    /// Run one `Elapse` call, decode its handles and process the sound array.
    pub fn elapse(
        &mut self,
        state: &VehicleState,
        driver: &HandleState,
        train: &TrainConfig,
        audio: &mut dyn AudioEngine,
    ) -> Result<DecodedHandles, BridgeError> {
        let driver_raw = encode_handles(driver, train)?;
        let abi_state = state.to_abi();

        let raw = {
            let Self {
                guard,
                module,
                panel,
                sound,
                last_fault,
                ..
            } = self;
            let _token = guard.enter("Elapse")?;
            module
                .elapse(abi_state, panel, sound, driver_raw)
                .inspect_err(|e| {
                    warn!(plugin = %module.title(), error = %e, "plugin fault in Elapse");
                    *last_fault = Some(e.clone());
                })?
        };

        let mut decoded = decode_handles(&raw, driver, train);
        let sound_valid = self.sounds.update(&mut self.sound, audio);
        self.valid = decoded.valid && sound_valid;
        decoded.valid = self.valid;
        if !self.valid {
            debug!(plugin = %self.title(), ?raw, "plugin returned out-of-range data");
        }
        Ok(decoded)
    }

    /// Stop every sound the module started.
    pub fn stop_sounds(&mut self, audio: &mut dyn AudioEngine) {
        self.sounds.stop_all(audio);
    }

    // ── diffed pushes ───────────────────────────────────────────────────────

    /// Push the driver's power, brake and reverser, each only if it changed
    /// since the last push.
    pub fn push_driver_handles(&mut self, driver: &HandleState, train: &TrainConfig) -> Result<(), BridgeError> {
        let brake = encode_brake(driver.brake, train.brake_architecture())?;
        self.update_power(driver.power)?;
        self.update_brake(brake)?;
        self.update_reverser(driver.reverser)
    }

    pub fn update_power(&mut self, notch: i32) -> Result<(), BridgeError> {
        if self.last_power == Some(notch) {
            return Ok(());
        }
        trace!(notch, "SetPower");
        self.call("SetPower", |m| m.set_power(notch))?;
        self.last_power = Some(notch);
        Ok(())
    }

    pub fn update_brake(&mut self, code: i32) -> Result<(), BridgeError> {
        if self.last_brake == Some(code) {
            return Ok(());
        }
        trace!(code, "SetBrake");
        self.call("SetBrake", |m| m.set_brake(code))?;
        self.last_brake = Some(code);
        Ok(())
    }

    pub fn update_reverser(&mut self, position: i32) -> Result<(), BridgeError> {
        if self.last_reverser == Some(position) {
            return Ok(());
        }
        trace!(position, "SetReverser");
        self.call("SetReverser", |m| m.set_reverser(position))?;
        self.last_reverser = Some(position);
        Ok(())
    }

    pub fn update_signal(&mut self, aspect: i32) -> Result<(), BridgeError> {
        if self.last_signal == Some(aspect) {
            return Ok(());
        }
        debug!(aspect, "SetSignal");
        self.call("SetSignal", |m| m.set_signal(aspect))?;
        self.last_signal = Some(aspect);
        Ok(())
    }

    // ── events ──────────────────────────────────────────────────────────────

    pub fn initialize(&mut self, mode: InitializationMode) -> Result<(), BridgeError> {
        self.call("Initialize", |m| m.initialize(mode))
    }

    pub fn key_down(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        self.call("KeyDown", |m| m.key_down(key))
    }

    pub fn key_up(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        self.call("KeyUp", |m| m.key_up(key))
    }

    pub fn horn_blow(&mut self, horn: HornType) -> Result<(), BridgeError> {
        self.call("HornBlow", |m| m.horn_blow(horn))
    }

    /// Report a door change.  Only closed→open and open→closed transitions
    /// reach the module.
    pub fn door_change(&mut self, new_state: DoorState) -> Result<(), BridgeError> {
        let old_state = std::mem::replace(&mut self.doors, new_state);
        match (old_state.is_open(), new_state.is_open()) {
            (false, true) => self.call("DoorOpen", |m| m.door_open()),
            (true, false) => self.call("DoorClose", |m| m.door_close()),
            _ => Ok(()),
        }
    }

    pub fn set_beacon(&mut self, beacon: &BeaconMessage) -> Result<(), BridgeError> {
        let data = beacon.to_abi();
        debug!(kind = data.kind, aspect = data.signal, distance = data.distance, "SetBeaconData");
        self.call("SetBeaconData", |m| m.set_beacon_data(data))
    }

    pub(crate) fn dispose(&mut self) -> Result<(), BridgeError> {
        self.call("Dispose", |m| m.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::mock::{Call, MockModule, calls};
    use atsbridge_hal::sim::{AudioCommand, SimAudio};
    use atsbridge_types::{AtsHandles, BrakeState, BrakeType, sound};

    fn train() -> TrainConfig {
        TrainConfig {
            brake_type: BrakeType::ElectricCommandBrake,
            has_hold_brake: false,
            max_brake_notch: 8,
            max_power_notch: 5,
            single_handle: false,
            has_const_speed: false,
            cars: 5,
        }
    }

    fn driver() -> HandleState {
        HandleState::neutral(train().brake_architecture())
    }

    #[test]
    fn buffers_have_protocol_size() {
        let session = PluginSession::new(Box::new(MockModule::new()));
        assert_eq!(session.panel().len(), PANEL_SIZE);
        assert_eq!(session.sound().len(), SOUND_SIZE);
        assert!(session.is_valid());
    }

    #[test]
    fn diffed_pushes_only_send_changes() {
        let module = MockModule::new();
        let log = module.log();
        let mut session = PluginSession::new(Box::new(module));
        let t = train();
        let mut d = driver();

        session.push_driver_handles(&d, &t).unwrap();
        session.push_driver_handles(&d, &t).unwrap();
        d.power = 2;
        session.push_driver_handles(&d, &t).unwrap();
        session.update_signal(0).unwrap();
        session.update_signal(0).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                Call::SetPower(0),
                Call::SetBrake(0),
                Call::SetReverser(0),
                Call::SetPower(2),
                Call::SetSignal(0),
            ]
        );
    }

    #[test]
    fn door_transitions() {
        let module = MockModule::new();
        let log = module.log();
        let mut session = PluginSession::new(Box::new(module));

        session.door_change(DoorState::Left).unwrap();
        session.door_change(DoorState::Both).unwrap();
        session.door_change(DoorState::None).unwrap();
        session.door_change(DoorState::None).unwrap();

        assert_eq!(calls(&log), vec![Call::DoorOpen, Call::DoorClose]);
        assert_eq!(session.doors(), DoorState::None);
    }

    #[test]
    fn elapse_decodes_and_drives_sound() {
        let mut module = MockModule::new();
        module.reply = Some(AtsHandles {
            brake: 9,
            power: 0,
            reverser: 1,
            constant_speed: 0,
        });
        module.sound_writes = vec![(3, sound::PLAY_ONCE)];
        let mut session = PluginSession::new(Box::new(module));
        let mut audio = SimAudio::new();

        let decoded = session
            .elapse(&VehicleState::default(), &driver(), &train(), &mut audio)
            .unwrap();
        assert!(decoded.valid);
        assert_eq!(
            decoded.security.brake,
            BrakeState::Notched { notch: 8, hold: false, emergency: true }
        );
        assert_eq!(session.sound()[3], sound::CONTINUE);
        assert_eq!(
            audio.commands(),
            &[AudioCommand::Play { slot: 3, gain: 1.0, looped: false }]
        );
    }

    #[test]
    fn invalid_sound_code_clears_validity() {
        let mut module = MockModule::new();
        module.sound_writes = vec![(0, 77)];
        let mut session = PluginSession::new(Box::new(module));
        let mut audio = SimAudio::new();
        let decoded = session
            .elapse(&VehicleState::default(), &driver(), &train(), &mut audio)
            .unwrap();
        assert!(!decoded.valid);
        assert!(!session.is_valid());
    }

    #[test]
    fn faults_are_recorded() {
        let mut module = MockModule::new();
        module.fail_on = Some("KeyDown");
        let mut session = PluginSession::new(Box::new(module));
        let err = session.key_down(VirtualKey::S).unwrap_err();
        assert!(matches!(err, BridgeError::Boundary { .. }));
        assert_eq!(session.last_fault(), Some(&err));
    }

    #[test]
    fn elapse_fault_is_recorded() {
        let mut module = MockModule::new();
        module.fail_on = Some("Elapse");
        let mut session = PluginSession::new(Box::new(module));
        let mut audio = SimAudio::new();
        let result = session.elapse(&VehicleState::default(), &driver(), &train(), &mut audio);
        assert!(result.is_err());
        assert!(session.last_fault().is_some());
    }

    #[test]
    fn failed_push_is_retried() {
        let mut module = MockModule::new();
        module.fail_on = Some("SetSignal");
        let log = module.log();
        let mut session = PluginSession::new(Box::new(module));
        assert!(session.update_signal(3).is_err());
        assert!(session.update_signal(3).is_err());
        assert_eq!(calls(&log), vec![Call::SetSignal(3), Call::SetSignal(3)]);
    }
}

//! [`UpdateCycle`] – per-tick orchestration between the simulation and the
//! loaded safety module.
//!
//! Each [`tick`][UpdateCycle::tick] sends the vehicle state and the driver's
//! handles through `Elapse`, decodes the handles the module returns into the
//! train's security handles and runs the sound slots.  Without an active
//! module the security handles simply mirror the driver.
//!
//! Event methods (handles, keys, horn, doors, signal, beacons) forward to the
//! session.  A boundary fault in any of them stops the module's sounds,
//! unloads it and is reported once in the message log; the error is still
//! returned so the caller can react.

use std::path::Path;

use atsbridge_hal::{AudioEngine, SectionGraph};
use atsbridge_kernel::{BeaconTarget, encode_beacon};
use atsbridge_types::{
    BridgeError, DoorState, HandleState, HornType, MessageSeverity, SafetyMode, StartMode,
    TrainConfig, TrainControls, TrainPosition, VehicleState, VirtualKey,
};
use encoding_rs::Encoding;
use serde::Serialize;
use tracing::{error, instrument, trace};

use crate::lifecycle::{LoadOutcome, PluginManager};
use crate::module::SafetyModule;
use crate::session::PluginSession;

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    /// Handles the physics engine should apply.
    pub security: HandleState,
    /// `false` when the module returned out-of-range handles or sound codes.
    pub valid: bool,
    pub mode: SafetyMode,
}

/// Drives one player train.
pub struct UpdateCycle<A: AudioEngine> {
    manager: PluginManager,
    train: TrainConfig,
    controls: TrainControls,
    audio: A,
}

impl<A: AudioEngine> UpdateCycle<A> {
    /// Train starts neutral with no module loaded.
    pub fn new(manager: PluginManager, train: TrainConfig, audio: A) -> Self {
        let neutral = HandleState::neutral(train.brake_architecture());
        Self {
            manager,
            train,
            controls: TrainControls::new(neutral),
            audio,
        }
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PluginManager {
        &mut self.manager
    }

    pub fn train(&self) -> &TrainConfig {
        &self.train
    }

    pub fn controls(&self) -> &TrainControls {
        &self.controls
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    // ── loading ─────────────────────────────────────────────────────────────

    /// See [`PluginManager::load_from_train_folder`].
    pub fn load_from_train_folder(&mut self, folder: &Path, encoding: &'static Encoding, start: StartMode) -> bool {
        self.stop_sounds();
        let driver = self.controls.driver;
        self.manager
            .load_from_train_folder(folder, encoding, &self.train, start, &driver)
    }

    /// See [`PluginManager::load_module`].
    pub fn load_module(&mut self, module: Box<dyn SafetyModule>, start: StartMode) -> Result<LoadOutcome, BridgeError> {
        self.stop_sounds();
        let driver = self.controls.driver;
        self.manager.load_module(module, &self.train, start, &driver)
    }

    /// Stop the module's sounds and unload it.
    pub fn unload(&mut self) {
        self.stop_sounds();
        self.manager.unload();
        self.controls.security = self.controls.driver;
    }

    // ── per tick ────────────────────────────────────────────────────────────

    /// Run one simulation tick.
    ///
    /// # Errors
    ///
    /// A boundary fault (after the module has been unloaded), or
    /// [`BridgeError::ArchitectureMismatch`] when the driver's brake state
    /// does not fit the train.
    #[instrument(skip_all, fields(time = state.total_time_s))]
    pub fn tick(&mut self, state: &VehicleState) -> Result<TickReport, BridgeError> {
        let Some(session) = self.manager.session_mut() else {
            self.controls.security = self.controls.driver;
            return Ok(self.report(true));
        };

        let result = session.elapse(state, &self.controls.driver, &self.train, &mut self.audio);
        match result {
            Ok(decoded) => {
                trace!(security = ?decoded.security, valid = decoded.valid, "tick");
                self.controls.security = decoded.security;
                Ok(self.report(decoded.valid))
            }
            Err(e) => {
                self.handle_fault(&e);
                Err(e)
            }
        }
    }

    fn report(&self, valid: bool) -> TickReport {
        TickReport {
            security: self.controls.security,
            valid,
            mode: self.manager.safety_mode(),
        }
    }

    // ── events ──────────────────────────────────────────────────────────────

    /// The driver moved a handle.  Changed power, brake and reverser values
    /// are pushed to the module.
    pub fn set_driver(&mut self, driver: HandleState) -> Result<(), BridgeError> {
        self.controls.driver = driver;
        if self.manager.session().is_none() {
            self.controls.security = driver;
        }
        self.with_session(|s, train| s.push_driver_handles(&driver, train))
    }

    /// Aspect of the signal ahead, sent only when it changed.
    pub fn update_signal(&mut self, aspect: i32) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.update_signal(aspect))
    }

    pub fn key_down(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.key_down(key))
    }

    pub fn key_up(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.key_up(key))
    }

    pub fn horn_blow(&mut self, horn: HornType) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.horn_blow(horn))
    }

    pub fn door_change(&mut self, doors: DoorState) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.door_change(doors))
    }

    /// The train passed a beacon.  `raw_section` is the route's section
    /// reference (`-1` none, `-2` next red section).
    pub fn beacon<G: SectionGraph + ?Sized>(
        &mut self,
        graph: &G,
        position: &TrainPosition,
        kind: i32,
        raw_section: i32,
        optional: i32,
    ) -> Result<(), BridgeError> {
        let message = encode_beacon(graph, position, kind, BeaconTarget::from_raw(raw_section), optional);
        self.with_session(|s, _| s.set_beacon(&message))
    }

    /// The train is being moved to a new location.
    pub fn begin_jump(&mut self, start: StartMode) -> Result<(), BridgeError> {
        self.with_session(|s, _| s.initialize(start.into()))
    }

    pub fn end_jump(&mut self) {
        self.manager.end_jump();
    }

    // ── plumbing ────────────────────────────────────────────────────────────

    fn with_session(
        &mut self,
        f: impl FnOnce(&mut PluginSession, &TrainConfig) -> Result<(), BridgeError>,
    ) -> Result<(), BridgeError> {
        let Some(session) = self.manager.session_mut() else {
            return Ok(());
        };
        let result = f(session, &self.train);
        if let Err(e) = &result {
            self.handle_fault(e);
        }
        result
    }

    fn handle_fault(&mut self, err: &BridgeError) {
        if !matches!(err, BridgeError::Boundary { .. }) {
            return;
        }
        let title = self
            .manager
            .session()
            .map(|s| s.title().to_string())
            .unwrap_or_default();
        error!(plugin = %title, error = %err, "unloading faulted plugin");
        self.manager.messages_mut().push(
            MessageSeverity::Error,
            format!("The train plugin {title} raised a fault and was unloaded: {err}"),
        );
        self.unload();
    }

    fn stop_sounds(&mut self) {
        if let Some(session) = self.manager.session_mut() {
            session.stop_sounds(&mut self.audio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::mock::{Call, MockModule, calls};
    use atsbridge_hal::sim::{AudioCommand, SimAudio, SimRoute};
    use atsbridge_types::{
        AirBrakeHandle, AtsBeaconData, AtsHandles, BrakeState, BrakeType, TrainId,
    };

    fn air_train() -> TrainConfig {
        TrainConfig {
            brake_type: BrakeType::AutomaticAirBrake,
            has_hold_brake: false,
            max_brake_notch: 2,
            max_power_notch: 4,
            single_handle: false,
            has_const_speed: false,
            cars: 6,
        }
    }

    fn cycle(train: TrainConfig) -> UpdateCycle<SimAudio> {
        UpdateCycle::new(PluginManager::new(), train, SimAudio::new())
    }

    #[test]
    fn without_plugin_security_mirrors_driver() {
        let mut c = cycle(air_train());
        let mut driver = c.controls().driver;
        driver.power = 3;
        c.set_driver(driver).unwrap();

        let report = c.tick(&VehicleState::default()).unwrap();
        assert_eq!(report.security, driver);
        assert!(report.valid);
        assert_eq!(report.mode, SafetyMode::Builtin);
    }

    #[test]
    fn plugin_overrides_air_brake() {
        let mut module = MockModule::new();
        module.reply = Some(AtsHandles {
            brake: 3,
            power: 0,
            reverser: 0,
            constant_speed: 0,
        });
        let mut c = cycle(air_train());
        let mut driver = c.controls().driver;
        driver.power = 2;
        c.set_driver(driver).unwrap();
        c.load_module(Box::new(module), StartMode::default()).unwrap();

        let report = c.tick(&VehicleState::default()).unwrap();
        assert_eq!(report.mode, SafetyMode::Plugin);
        assert_eq!(
            report.security.brake,
            BrakeState::Air { handle: AirBrakeHandle::Service, emergency: true }
        );
        assert_eq!(report.security.power, 0);
        assert_eq!(c.controls().driver.power, 2);
    }

    #[test]
    fn elapse_fault_unloads_and_reports() {
        let mut module = MockModule::new();
        module.fail_on = Some("Elapse");
        let log = module.log();
        let mut c = cycle(air_train());
        c.load_module(Box::new(module), StartMode::default()).unwrap();

        let err = c.tick(&VehicleState::default()).unwrap_err();
        assert!(matches!(err, BridgeError::Boundary { .. }));
        assert!(c.manager().session().is_none());
        assert_eq!(c.manager().safety_mode(), SafetyMode::Builtin);
        assert!(c.manager().messages().entries().iter().any(|m| m.text.contains("was unloaded")));
        assert_eq!(calls(&log).last(), Some(&Call::Dispose));

        // Built-in control from here on.
        let report = c.tick(&VehicleState::default()).unwrap();
        assert_eq!(report.security, c.controls().driver);
    }

    #[test]
    fn unload_stops_looping_sounds() {
        let mut module = MockModule::new();
        module.sound_writes = vec![(2, -5000)];
        let mut c = cycle(air_train());
        c.load_module(Box::new(module), StartMode::default()).unwrap();
        c.tick(&VehicleState::default()).unwrap();
        assert_eq!(c.audio().gain_of(2), Some(0.5));

        c.unload();
        assert!(!c.audio().is_playing(2));
        assert_eq!(c.audio().commands().last(), Some(&AudioCommand::Stop { slot: 2 }));
    }

    #[test]
    fn events_reach_the_module() {
        let module = MockModule::new();
        let log = module.log();
        let mut c = cycle(air_train());
        c.load_module(Box::new(module), StartMode::default()).unwrap();

        c.key_down(VirtualKey::A1).unwrap();
        c.key_up(VirtualKey::A1).unwrap();
        c.horn_blow(HornType::Music).unwrap();
        c.door_change(DoorState::Right).unwrap();
        c.update_signal(2).unwrap();
        c.update_signal(2).unwrap();

        let tail: Vec<Call> = calls(&log).into_iter().skip_while(|call| *call != Call::KeyDown(1)).collect();
        assert_eq!(
            tail,
            vec![
                Call::KeyDown(1),
                Call::KeyUp(1),
                Call::HornBlow(2),
                Call::DoorOpen,
                Call::SetSignal(2),
            ]
        );
    }

    #[test]
    fn beacon_to_next_red_section() {
        let me = TrainId(7);
        let route = SimRoute::new()
            .with_section(0.0, &[0, 3], Some(1))
            .occupied_by(me)
            .with_section(500.0, &[0, 3], Some(1))
            .with_section(1200.0, &[0, 3], Some(0))
            .build();
        let position = TrainPosition {
            train: me,
            current_section: Some(0),
            reference_point: 200.0,
        };

        let module = MockModule::new();
        let log = module.log();
        let mut c = cycle(air_train());
        c.load_module(Box::new(module), StartMode::default()).unwrap();
        c.beacon(route.as_slice(), &position, 44, -2, 9).unwrap();

        assert_eq!(
            calls(&log).last(),
            Some(&Call::SetBeaconData(AtsBeaconData {
                kind: 44,
                signal: 0,
                distance: 1000.0,
                optional: 9,
            }))
        );
    }

    #[test]
    fn events_without_plugin_are_ignored() {
        let mut c = cycle(air_train());
        assert!(c.key_down(VirtualKey::S).is_ok());
        assert!(c.begin_jump(StartMode::EmergencyBrakesAts).is_ok());
        c.end_jump();
    }
}

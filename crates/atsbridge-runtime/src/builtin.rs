//! [`BuiltinModule`] – the in-process safety system.
//!
//! Reports the protocol version, accepts every event and hands the driver's
//! handles back from `Elapse` unchanged.  Loading it gives a train the full
//! plugin session machinery (shared arrays, diffed pushes, sound slots)
//! without a native library, which is what the CLI uses on hosts that cannot
//! run legacy modules.

use atsbridge_types::{
    ATS_VERSION, AtsBeaconData, AtsHandles, AtsVehicleSpec, AtsVehicleState, BridgeError,
    HornType, InitializationMode, VirtualKey,
};
use tracing::trace;

use crate::module::SafetyModule;

/// Pass-through safety system.
#[derive(Debug, Default)]
pub struct BuiltinModule {
    spec: Option<AtsVehicleSpec>,
    last_signal: Option<i32>,
    last_beacon: Option<AtsBeaconData>,
}

impl BuiltinModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Specification received through `SetVehicleSpec`.
    pub fn spec(&self) -> Option<AtsVehicleSpec> {
        self.spec
    }

    pub fn last_signal(&self) -> Option<i32> {
        self.last_signal
    }

    pub fn last_beacon(&self) -> Option<AtsBeaconData> {
        self.last_beacon
    }
}

impl SafetyModule for BuiltinModule {
    fn title(&self) -> &str {
        "builtin"
    }

    fn load(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn version(&mut self) -> Result<i32, BridgeError> {
        Ok(ATS_VERSION)
    }

    fn set_vehicle_spec(&mut self, spec: AtsVehicleSpec) -> Result<(), BridgeError> {
        self.spec = Some(spec);
        Ok(())
    }

    fn initialize(&mut self, mode: InitializationMode) -> Result<(), BridgeError> {
        trace!(?mode, "builtin initialize");
        Ok(())
    }

    fn elapse(
        &mut self,
        _state: AtsVehicleState,
        _panel: &mut [i32],
        _sound: &mut [i32],
        driver: AtsHandles,
    ) -> Result<AtsHandles, BridgeError> {
        Ok(driver)
    }

    fn set_power(&mut self, _notch: i32) -> Result<(), BridgeError> {
        Ok(())
    }

    fn set_brake(&mut self, _notch: i32) -> Result<(), BridgeError> {
        Ok(())
    }

    fn set_reverser(&mut self, _position: i32) -> Result<(), BridgeError> {
        Ok(())
    }

    fn key_down(&mut self, _key: VirtualKey) -> Result<(), BridgeError> {
        Ok(())
    }

    fn key_up(&mut self, _key: VirtualKey) -> Result<(), BridgeError> {
        Ok(())
    }

    fn horn_blow(&mut self, _horn: HornType) -> Result<(), BridgeError> {
        Ok(())
    }

    fn door_open(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn door_close(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn set_signal(&mut self, aspect: i32) -> Result<(), BridgeError> {
        self.last_signal = Some(aspect);
        Ok(())
    }

    fn set_beacon_data(&mut self, beacon: AtsBeaconData) -> Result<(), BridgeError> {
        self.last_beacon = Some(beacon);
        Ok(())
    }
}

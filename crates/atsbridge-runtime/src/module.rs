//! [`SafetyModule`] – the control surface every safety system implements.
//!
//! Two implementations exist: [`NativeModule`][crate::native::NativeModule]
//! wraps a legacy dynamic library, [`BuiltinModule`][crate::builtin::BuiltinModule]
//! is the in-process fallback.  The lifecycle manager picks one at load time
//! and only ever talks to the trait.
//!
//! Every method maps 1:1 to a legacy entry point.  A returned `Err` is a
//! boundary fault: the call did not complete and the module should be
//! unloaded.

use atsbridge_types::{
    AtsBeaconData, AtsHandles, AtsVehicleSpec, AtsVehicleState, BridgeError, HornType,
    InitializationMode, VirtualKey,
};

/// A loaded safety system.
pub trait SafetyModule: Send {
    /// File title used in messages (e.g. `"ats.dll"`).
    fn title(&self) -> &str;

    /// `Load` – first call after the library is opened.
    fn load(&mut self) -> Result<(), BridgeError>;

    /// `Dispose` – last call before the library is released.
    fn dispose(&mut self) -> Result<(), BridgeError>;

    /// `GetPluginVersion`.
    fn version(&mut self) -> Result<i32, BridgeError>;

    fn set_vehicle_spec(&mut self, spec: AtsVehicleSpec) -> Result<(), BridgeError>;

    fn initialize(&mut self, mode: InitializationMode) -> Result<(), BridgeError>;

    /// `Elapse` – one simulation tick.
    ///
    /// `panel` and `sound` are the session's shared arrays; the module may
    /// read and write them for the duration of the call.  `driver` carries the
    /// driver's handles and is returned unchanged by modules that do not
    /// override them.
    fn elapse(
        &mut self,
        state: AtsVehicleState,
        panel: &mut [i32],
        sound: &mut [i32],
        driver: AtsHandles,
    ) -> Result<AtsHandles, BridgeError>;

    fn set_power(&mut self, notch: i32) -> Result<(), BridgeError>;

    fn set_brake(&mut self, notch: i32) -> Result<(), BridgeError>;

    fn set_reverser(&mut self, position: i32) -> Result<(), BridgeError>;

    fn key_down(&mut self, key: VirtualKey) -> Result<(), BridgeError>;

    fn key_up(&mut self, key: VirtualKey) -> Result<(), BridgeError>;

    fn horn_blow(&mut self, horn: HornType) -> Result<(), BridgeError>;

    fn door_open(&mut self) -> Result<(), BridgeError>;

    fn door_close(&mut self) -> Result<(), BridgeError>;

    fn set_signal(&mut self, aspect: i32) -> Result<(), BridgeError>;

    fn set_beacon_data(&mut self, beacon: AtsBeaconData) -> Result<(), BridgeError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Test double
// ────────────────────────────────────────────────────────────────────────────

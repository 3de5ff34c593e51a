//! Fixed-layout records exchanged with legacy ATS plugin modules.
//!
//! Every record mirrors the C layout the modules were compiled against, so the
//! structs are `#[repr(C)]` and [`Pod`]: they can be passed by value across the
//! module boundary or viewed as raw bytes with [`bytemuck::bytes_of`].  The
//! sizes are checked at compile time.

use bytemuck::{Pod, Zeroable};

/// Protocol version a module must report from `GetPluginVersion`.
pub const ATS_VERSION: i32 = 0x0002_0000;

/// Number of panel indicator slots shared with a module.
pub const PANEL_SIZE: usize = 256;

/// Number of sound slots shared with a module.
pub const SOUND_SIZE: usize = 256;

/// Length of one time-of-day cycle in milliseconds.
pub const TIME_WRAP_MS: f64 = 2_073_600_000.0;

/// Static train description sent once after loading.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AtsVehicleSpec {
    pub brake_notches: i32,
    pub power_notches: i32,
    pub ats_notch: i32,
    pub b67_notch: i32,
    pub cars: i32,
}

/// Per-tick physical snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct AtsVehicleState {
    /// Train location in meters.
    pub location: f64,
    /// Speed in km/h.
    pub speed: f32,
    /// Time of day in milliseconds, wrapped by [`wrap_time_ms`].
    pub time: i32,
    pub bc_pressure: f32,
    pub mr_pressure: f32,
    pub er_pressure: f32,
    pub bp_pressure: f32,
    pub sap_pressure: f32,
    /// Always `0.0`; the simulator does not model traction current.
    pub current: f32,
}

/// Handle positions returned by `Elapse`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AtsHandles {
    pub brake: i32,
    pub power: i32,
    pub reverser: i32,
    pub constant_speed: i32,
}

/// Beacon (transponder) event payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct AtsBeaconData {
    pub kind: i32,
    pub signal: i32,
    pub distance: f32,
    pub optional: i32,
}

const _: () = assert!(std::mem::size_of::<AtsVehicleSpec>() == 20);
const _: () = assert!(std::mem::size_of::<AtsVehicleState>() == 40);
const _: () = assert!(std::mem::size_of::<AtsHandles>() == 16);
const _: () = assert!(std::mem::size_of::<AtsBeaconData>() == 16);

/// Reduce an absolute time in milliseconds to the protocol's wrapped time of
/// day.  The result is always in `0..2_073_600_000`.
pub fn wrap_time_ms(ms: f64) -> i32 {
    (ms - TIME_WRAP_MS * (ms / TIME_WRAP_MS).floor()).floor() as i32
}

//! `atsbridge-types` – shared vocabulary of the ATS bridge.
//!
//! Holds the fixed-layout ABI records ([`abi`]), the protocol enums and
//! constants, the train configuration and handle state the simulation exposes
//! to the bridge, user-facing message-log entries, and the workspace-wide
//! [`BridgeError`].

pub mod abi;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use abi::{
    ATS_VERSION, AtsBeaconData, AtsHandles, AtsVehicleSpec, AtsVehicleState, PANEL_SIZE,
    SOUND_SIZE, TIME_WRAP_MS, wrap_time_ms,
};

// ────────────────────────────────────────────────────────────────────────────
// Brakes
// ────────────────────────────────────────────────────────────────────────────

/// Brake system fitted to the driver's car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeType {
    ElectromagneticStraightAirBrake,
    ElectricCommandBrake,
    AutomaticAirBrake,
}

/// Position of the automatic air brake handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AirBrakeHandle {
    #[default]
    Release,
    Lap,
    Service,
}

/// Brake-handle code layout used on the wire.  The three layouts are mutually
/// exclusive; a train uses exactly one for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeArchitecture {
    /// 0 release, 1 lap, 2 service, 3 emergency.
    AutomaticAir,
    /// 0 released, 1 hold brake, 2..=N+1 notch, N+2 emergency.
    NotchedWithHold { max_notch: u32 },
    /// 0..=N notch, N+1 emergency.
    Notched { max_notch: u32 },
}

/// Brake demand expressed in simulation terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeState {
    Air {
        handle: AirBrakeHandle,
        emergency: bool,
    },
    Notched {
        notch: u32,
        hold: bool,
        emergency: bool,
    },
}

impl BrakeState {
    /// Fully released brake for the given architecture.
    pub fn released(architecture: BrakeArchitecture) -> Self {
        match architecture {
            BrakeArchitecture::AutomaticAir => BrakeState::Air {
                handle: AirBrakeHandle::Release,
                emergency: false,
            },
            _ => BrakeState::Notched {
                notch: 0,
                hold: false,
                emergency: false,
            },
        }
    }

    pub fn is_emergency(&self) -> bool {
        match *self {
            BrakeState::Air { emergency, .. } | BrakeState::Notched { emergency, .. } => emergency,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Train configuration and handles
// ────────────────────────────────────────────────────────────────────────────

/// Opaque identity of a train, used for section occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainId(pub u32);

/// Static characteristics of the player's train relevant to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub brake_type: BrakeType,
    pub has_hold_brake: bool,
    pub max_brake_notch: u32,
    pub max_power_notch: u32,
    /// Power and brake share one handle; any brake cancels power.
    pub single_handle: bool,
    pub has_const_speed: bool,
    pub cars: u32,
}

impl TrainConfig {
    /// The brake-handle code layout this train uses.
    pub fn brake_architecture(&self) -> BrakeArchitecture {
        match (self.brake_type, self.has_hold_brake) {
            (BrakeType::AutomaticAirBrake, _) => BrakeArchitecture::AutomaticAir,
            (_, true) => BrakeArchitecture::NotchedWithHold {
                max_notch: self.max_brake_notch,
            },
            (_, false) => BrakeArchitecture::Notched {
                max_notch: self.max_brake_notch,
            },
        }
    }
}

/// One full set of handle positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleState {
    /// -1 backward, 0 neutral, 1 forward.
    pub reverser: i32,
    pub power: i32,
    pub brake: BrakeState,
    pub const_speed: bool,
}

impl HandleState {
    /// Neutral reverser, no power, released brake.
    pub fn neutral(architecture: BrakeArchitecture) -> Self {
        Self {
            reverser: 0,
            power: 0,
            brake: BrakeState::released(architecture),
            const_speed: false,
        }
    }
}

/// Driver-commanded handles and the safety-system ("security") handles the
/// physics engine actually applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainControls {
    pub driver: HandleState,
    pub security: HandleState,
}

impl TrainControls {
    pub fn new(driver: HandleState) -> Self {
        Self {
            driver,
            security: driver,
        }
    }
}

/// Static specification sent to a module once, right after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub power_notches: u32,
    pub brake_type: BrakeType,
    /// Brake notches including the hold brake, excluding emergency.
    pub brake_notches: u32,
    pub has_hold_brake: bool,
    pub cars: u32,
}

impl VehicleSpec {
    /// Derive the specification the legacy protocol expects for `train`.
    /// Automatic air brake trains always report two brake notches (lap and
    /// service) and no hold brake.
    pub fn from_train(train: &TrainConfig) -> Self {
        let (brake_notches, has_hold_brake) = match train.brake_type {
            BrakeType::AutomaticAirBrake => (2, false),
            _ => (
                train.max_brake_notch + u32::from(train.has_hold_brake),
                train.has_hold_brake,
            ),
        };
        Self {
            power_notches: train.max_power_notch,
            brake_type: train.brake_type,
            brake_notches,
            has_hold_brake,
            cars: train.cars,
        }
    }

    /// Brake notch corresponding to B1 / LAP.
    pub fn ats_notch(&self) -> i32 {
        if self.has_hold_brake { 2 } else { 1 }
    }

    /// Brake notch corresponding to 70% of the available notches.
    pub fn b67_notch(&self) -> i32 {
        (0.7 * f64::from(self.brake_notches)).round_ties_even() as i32
    }

    pub fn to_abi(&self) -> AtsVehicleSpec {
        AtsVehicleSpec {
            brake_notches: self.brake_notches as i32,
            power_notches: self.power_notches as i32,
            ats_notch: self.ats_notch(),
            b67_notch: self.b67_notch(),
            cars: self.cars as i32,
        }
    }
}

/// Physical readings of the driver's car for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Reference point of the train's head, in meters of track position.
    pub location: f64,
    pub speed_mps: f64,
    /// Absolute in-game time in seconds.
    pub total_time_s: f64,
    pub bc_pressure: f64,
    pub mr_pressure: f64,
    pub er_pressure: f64,
    pub bp_pressure: f64,
    pub sap_pressure: f64,
}

impl VehicleState {
    pub fn to_abi(&self) -> AtsVehicleState {
        AtsVehicleState {
            location: self.location,
            speed: (3.6 * self.speed_mps) as f32,
            time: wrap_time_ms(1000.0 * self.total_time_s),
            bc_pressure: self.bc_pressure as f32,
            mr_pressure: self.mr_pressure as f32,
            er_pressure: self.er_pressure as f32,
            bp_pressure: self.bp_pressure as f32,
            sap_pressure: self.sap_pressure as f32,
            current: 0.0,
        }
    }
}

/// Position of the train's head relative to the section graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainPosition {
    pub train: TrainId,
    pub current_section: Option<usize>,
    /// Front axle position projected to the leading edge of the first car.
    pub reference_point: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Protocol enums
// ────────────────────────────────────────────────────────────────────────────

/// How the simulation started the train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartMode {
    #[default]
    ServiceBrakesAts,
    EmergencyBrakesAts,
    EmergencyBrakesNoAts,
}

impl StartMode {
    /// Map the simulation's raw start mode; unknown values mean service brakes.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => StartMode::EmergencyBrakesAts,
            1 => StartMode::EmergencyBrakesNoAts,
            _ => StartMode::ServiceBrakesAts,
        }
    }
}

/// Initialization code passed to `Initialize`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializationMode {
    OnService = -1,
    OnEmergency = 0,
    OffEmergency = 1,
}

impl From<StartMode> for InitializationMode {
    fn from(mode: StartMode) -> Self {
        match mode {
            StartMode::ServiceBrakesAts => InitializationMode::OnService,
            StartMode::EmergencyBrakesAts => InitializationMode::OnEmergency,
            StartMode::EmergencyBrakesNoAts => InitializationMode::OffEmergency,
        }
    }
}

/// Instruction for the constant-speed system returned by `Elapse`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstSpeedInstruction {
    Continue = 0,
    Enable = 1,
    Disable = 2,
}

impl ConstSpeedInstruction {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ConstSpeedInstruction::Continue),
            1 => Some(ConstSpeedInstruction::Enable),
            2 => Some(ConstSpeedInstruction::Disable),
            _ => None,
        }
    }
}

/// Virtual ATS keys.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualKey {
    S = 0,
    A1 = 1,
    A2 = 2,
    B1 = 3,
    B2 = 4,
    C1 = 5,
    C2 = 6,
    D = 7,
    E = 8,
    F = 9,
    G = 10,
    H = 11,
    I = 12,
    J = 13,
    K = 14,
    L = 15,
}

impl VirtualKey {
    pub const ALL: [VirtualKey; 16] = [
        VirtualKey::S,
        VirtualKey::A1,
        VirtualKey::A2,
        VirtualKey::B1,
        VirtualKey::B2,
        VirtualKey::C1,
        VirtualKey::C2,
        VirtualKey::D,
        VirtualKey::E,
        VirtualKey::F,
        VirtualKey::G,
        VirtualKey::H,
        VirtualKey::I,
        VirtualKey::J,
        VirtualKey::K,
        VirtualKey::L,
    ];

    /// Parse the key's name as printed on the cab (`"S"`, `"A1"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| format!("{k:?}").eq_ignore_ascii_case(name))
    }
}

/// Horn kinds reported through `HornBlow`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HornType {
    Primary = 0,
    Secondary = 1,
    Music = 2,
}

/// Which doors are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DoorState {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl DoorState {
    pub fn is_open(self) -> bool {
        self != DoorState::None
    }
}

/// Whether the train is driven by a loaded module or the built-in logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SafetyMode {
    #[default]
    Builtin,
    Plugin,
}

/// Sound instruction codes written by a module into its sound slots.
pub mod sound {
    /// Stop playback.
    pub const STOP: i32 = -10000;
    /// Upper bound of the looping band; full gain.
    pub const PLAY_LOOPING: i32 = 0;
    /// Play once.
    pub const PLAY_ONCE: i32 = 1;
    /// Keep the current state.
    pub const CONTINUE: i32 = 2;

    /// Code that loops a sound at `volume` (clamped to `0.0..=1.0`).
    pub fn from_volume(volume: f64) -> i32 {
        let volume = volume.clamp(0.0, 1.0);
        (-9999.0 + 9998.0 * volume).round_ties_even() as i32
    }
}

/// Signal aspect reported when no section can be resolved.
pub const NO_SIGNAL_ASPECT: i32 = 255;

// ────────────────────────────────────────────────────────────────────────────
// Messages
// ────────────────────────────────────────────────────────────────────────────

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSeverity {
    Information,
    Warning,
    Error,
}

/// An entry of the user-facing message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: MessageSeverity,
    pub text: String,
}

impl Message {
    pub fn new(severity: MessageSeverity, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            text: text.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every bridge crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("The train plugin {title} could not be found in {config}")]
    ModuleNotFound { title: String, config: String },

    #[error("The train plugin {title} could not be loaded: {details}")]
    CouldNotLoad { title: String, details: String },

    #[error("The train plugin {title} is of an unsupported version ({found:#x})")]
    InvalidVersion { title: String, found: i32 },

    #[error("The train plugin {0} is of an unsupported binary format")]
    UnsupportedBinary(String),

    #[error("The train plugin {0} can only be used on 32-bit Microsoft Windows")]
    UnsupportedPlatform(String),

    #[error("Plugin raised a fault in {entry_point}: {details}")]
    Boundary {
        entry_point: String,
        details: String,
    },

    #[error("Plugin entry point {0} re-entered while a call is outstanding")]
    Reentrant(String),

    #[error("No active plugin session")]
    NotActive,

    #[error("Brake state does not belong to {0:?}")]
    ArchitectureMismatch(BrakeArchitecture),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e.to_string())
    }
}

//! Handle codec – simulation handle state ⇄ protocol handle codes.
//!
//! The legacy protocol numbers brake positions differently for each
//! [`BrakeArchitecture`]:
//!
//! | Architecture | Codes |
//! |---|---|
//! | automatic air | 0 release, 1 lap, 2 service, 3 emergency |
//! | notched + hold brake | 0 released, 1 hold, 2..=N+1 notch, N+2 emergency |
//! | notched | 0..=N notch, N+1 emergency |
//!
//! [`encode_brake`] and [`decode_brake`] are exact inverses on legal states.
//! [`decode_handles`] applies a full `Elapse` result: every field outside its
//! legal range falls back to the driver's value and clears the validity flag,
//! without affecting the other fields.

use atsbridge_types::{
    AirBrakeHandle, AtsHandles, BrakeArchitecture, BrakeState, BridgeError,
    ConstSpeedInstruction, HandleState, TrainConfig,
};

// ────────────────────────────────────────────────────────────────────────────
// Brake
// ────────────────────────────────────────────────────────────────────────────

/// Encode a brake state as the protocol code for `architecture`.
///
/// # Errors
///
/// Returns [`BridgeError::ArchitectureMismatch`] when `state` belongs to a
/// different architecture (air handle on a notched train or vice versa), or
/// names a notch above the architecture's maximum.
///
/// # Example
///
/// ```
/// use atsbridge_kernel::handle_codec::encode_brake;
/// use atsbridge_types::{BrakeArchitecture, BrakeState};
///
/// let arch = BrakeArchitecture::NotchedWithHold { max_notch: 8 };
/// let emergency = BrakeState::Notched { notch: 0, hold: false, emergency: true };
/// assert_eq!(encode_brake(emergency, arch).unwrap(), 10);
/// ```
pub fn encode_brake(state: BrakeState, architecture: BrakeArchitecture) -> Result<i32, BridgeError> {
    let mismatch = || BridgeError::ArchitectureMismatch(architecture);
    match (architecture, state) {
        (BrakeArchitecture::AutomaticAir, BrakeState::Air { handle, emergency }) => Ok(if emergency {
            3
        } else {
            match handle {
                AirBrakeHandle::Release => 0,
                AirBrakeHandle::Lap => 1,
                AirBrakeHandle::Service => 2,
            }
        }),
        (
            BrakeArchitecture::NotchedWithHold { max_notch },
            BrakeState::Notched {
                notch,
                hold,
                emergency,
            },
        ) => {
            let emergency_code = offset_code(max_notch, 2).ok_or_else(mismatch)?;
            if notch > max_notch {
                return Err(mismatch());
            }
            Ok(if emergency {
                emergency_code
            } else if notch > 0 {
                notch as i32 + 1
            } else {
                i32::from(hold)
            })
        }
        (
            BrakeArchitecture::Notched { max_notch },
            BrakeState::Notched {
                notch, emergency, ..
            },
        ) => {
            let emergency_code = offset_code(max_notch, 1).ok_or_else(mismatch)?;
            if notch > max_notch {
                return Err(mismatch());
            }
            Ok(if emergency { emergency_code } else { notch as i32 })
        }
        _ => Err(mismatch()),
    }
}

/// `notch + offset` as a protocol code, or `None` when it does not fit.
fn offset_code(notch: u32, offset: i32) -> Option<i32> {
    i32::try_from(notch).ok()?.checked_add(offset)
}

/// Decode a protocol brake code.  Returns `None` when `code` is outside the
/// legal range of `architecture`.
pub fn decode_brake(code: i32, architecture: BrakeArchitecture) -> Option<BrakeState> {
    match architecture {
        BrakeArchitecture::AutomaticAir => {
            let (handle, emergency) = match code {
                0 => (AirBrakeHandle::Release, false),
                1 => (AirBrakeHandle::Lap, false),
                2 => (AirBrakeHandle::Service, false),
                3 => (AirBrakeHandle::Service, true),
                _ => return None,
            };
            Some(BrakeState::Air { handle, emergency })
        }
        BrakeArchitecture::NotchedWithHold { max_notch } => {
            let emergency_code = offset_code(max_notch, 2)?;
            let (notch, hold, emergency) = match code {
                c if c == emergency_code => (max_notch, false, true),
                c if (2..emergency_code).contains(&c) => ((c - 1) as u32, false, false),
                1 => (0, true, false),
                0 => (0, false, false),
                _ => return None,
            };
            Some(BrakeState::Notched {
                notch,
                hold,
                emergency,
            })
        }
        BrakeArchitecture::Notched { max_notch } => {
            let emergency_code = offset_code(max_notch, 1)?;
            let (notch, emergency) = match code {
                c if c == emergency_code => (max_notch, true),
                c if (0..emergency_code).contains(&c) => (c as u32, false),
                _ => return None,
            };
            Some(BrakeState::Notched {
                notch,
                hold: false,
                emergency,
            })
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Full handle set
// ────────────────────────────────────────────────────────────────────────────

/// Build the handle record passed to `Elapse` from the driver's handles.
///
/// The const-speed field carries the driver's setting as an explicit
/// enable/disable instruction.
pub fn encode_handles(driver: &HandleState, train: &TrainConfig) -> Result<AtsHandles, BridgeError> {
    let constant_speed = if driver.const_speed {
        ConstSpeedInstruction::Enable
    } else {
        ConstSpeedInstruction::Disable
    };
    Ok(AtsHandles {
        brake: encode_brake(driver.brake, train.brake_architecture())?,
        power: driver.power,
        reverser: driver.reverser,
        constant_speed: constant_speed as i32,
    })
}

/// Result of applying an `Elapse` handle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedHandles {
    /// Handles the safety system commands.
    pub security: HandleState,
    /// `false` when at least one field fell back to the driver value.
    pub valid: bool,
}

/// Apply the handles returned by `Elapse`.
///
/// - reverser must be in `-1..=1`;
/// - power must be in `0..=max_power_notch`, and is forced to 0 on
///   single-handle trains whenever the brake code is non-zero;
/// - brake must decode under the train's architecture;
/// - const speed must be a known instruction.
///
/// Each illegal field keeps the driver's value and clears `valid`.  The
/// resulting const-speed state is masked by
/// [`TrainConfig::has_const_speed`].
pub fn decode_handles(raw: &AtsHandles, driver: &HandleState, train: &TrainConfig) -> DecodedHandles {
    let mut valid = true;

    let reverser = if (-1..=1).contains(&raw.reverser) {
        raw.reverser
    } else {
        valid = false;
        driver.reverser
    };

    let power_code = if train.single_handle && raw.brake != 0 {
        0
    } else {
        raw.power
    };
    let power = if (0..=train.max_power_notch as i32).contains(&power_code) {
        power_code
    } else {
        valid = false;
        driver.power
    };

    let brake = decode_brake(raw.brake, train.brake_architecture()).unwrap_or_else(|| {
        valid = false;
        driver.brake
    });

    let const_speed = match ConstSpeedInstruction::from_code(raw.constant_speed) {
        Some(ConstSpeedInstruction::Continue) => driver.const_speed,
        Some(ConstSpeedInstruction::Enable) => true,
        Some(ConstSpeedInstruction::Disable) => false,
        None => {
            valid = false;
            driver.const_speed
        }
    };

    DecodedHandles {
        security: HandleState {
            reverser,
            power,
            brake,
            const_speed: const_speed && train.has_const_speed,
        },
        valid,
    }
}

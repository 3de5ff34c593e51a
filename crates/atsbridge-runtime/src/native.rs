//! [`NativeModule`] – a legacy safety system in a dynamic library.
//!
//! Entry points are resolved by name once, when the library is opened.  Any
//! of them may be missing: a missing entry point is a no-op, a missing
//! `GetPluginVersion` reports version 0, and a missing `Elapse` hands the
//! driver's handles straight back.
//!
//! All entry points use the platform's `system` calling convention (`stdcall`
//! on 32-bit Windows).  Records are passed by value, the shared arrays as raw
//! pointers valid only for the duration of the `Elapse` call.

use std::path::Path;

use atsbridge_types::{
    AtsBeaconData, AtsHandles, AtsVehicleSpec, AtsVehicleState, BridgeError, HornType,
    InitializationMode, PANEL_SIZE, SOUND_SIZE, VirtualKey,
};
use libloading::Library;
use tracing::{debug, info};

use crate::module::SafetyModule;

type VoidFn = unsafe extern "system" fn();
type IntFn = unsafe extern "system" fn(i32);
type VersionFn = unsafe extern "system" fn() -> i32;
type VehicleSpecFn = unsafe extern "system" fn(AtsVehicleSpec);
type ElapseFn = unsafe extern "system" fn(AtsVehicleState, *mut i32, *mut i32) -> AtsHandles;
type BeaconFn = unsafe extern "system" fn(AtsBeaconData);

/// Resolved entry points.  Plain function pointers; valid while the owning
/// [`Library`] is loaded.
#[derive(Default)]
struct EntryPoints {
    load: Option<VoidFn>,
    dispose: Option<VoidFn>,
    get_plugin_version: Option<VersionFn>,
    set_vehicle_spec: Option<VehicleSpecFn>,
    initialize: Option<IntFn>,
    elapse: Option<ElapseFn>,
    set_power: Option<IntFn>,
    set_brake: Option<IntFn>,
    set_reverser: Option<IntFn>,
    key_down: Option<IntFn>,
    key_up: Option<IntFn>,
    horn_blow: Option<IntFn>,
    door_open: Option<VoidFn>,
    door_close: Option<VoidFn>,
    set_signal: Option<IntFn>,
    set_beacon_data: Option<BeaconFn>,
}

impl EntryPoints {
    fn resolve(library: &Library) -> Self {
        Self {
            load: symbol(library, b"Load\0"),
            dispose: symbol(library, b"Dispose\0"),
            get_plugin_version: symbol(library, b"GetPluginVersion\0"),
            set_vehicle_spec: symbol(library, b"SetVehicleSpec\0"),
            initialize: symbol(library, b"Initialize\0"),
            elapse: symbol(library, b"Elapse\0"),
            set_power: symbol(library, b"SetPower\0"),
            set_brake: symbol(library, b"SetBrake\0"),
            set_reverser: symbol(library, b"SetReverser\0"),
            key_down: symbol(library, b"KeyDown\0"),
            key_up: symbol(library, b"KeyUp\0"),
            horn_blow: symbol(library, b"HornBlow\0"),
            door_open: symbol(library, b"DoorOpen\0"),
            door_close: symbol(library, b"DoorClose\0"),
            set_signal: symbol(library, b"SetSignal\0"),
            set_beacon_data: symbol(library, b"SetBeaconData\0"),
        }
    }

    fn count(&self) -> usize {
        [
            self.load.is_some(),
            self.dispose.is_some(),
            self.get_plugin_version.is_some(),
            self.set_vehicle_spec.is_some(),
            self.initialize.is_some(),
            self.elapse.is_some(),
            self.set_power.is_some(),
            self.set_brake.is_some(),
            self.set_reverser.is_some(),
            self.key_down.is_some(),
            self.key_up.is_some(),
            self.horn_blow.is_some(),
            self.door_open.is_some(),
            self.door_close.is_some(),
            self.set_signal.is_some(),
            self.set_beacon_data.is_some(),
        ]
        .into_iter()
        .filter(|&present| present)
        .count()
    }
}

fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Option<T> {
    // SAFETY: `T` is one of the entry point signatures of the legacy ABI; the
    // pointer is only called while `library` stays loaded.
    unsafe { library.get::<T>(name).ok().map(|s| *s) }
}

fn call_void(f: Option<VoidFn>) {
    if let Some(f) = f {
        // SAFETY: resolved from the loaded library with the ABI's signature.
        unsafe { f() }
    }
}

fn call_int(f: Option<IntFn>, value: i32) {
    if let Some(f) = f {
        // SAFETY: as above.
        unsafe { f(value) }
    }
}

/// Safety system backed by a legacy dynamic library.
pub struct NativeModule {
    title: String,
    entry: EntryPoints,
    // Dropped last: unloads the library after the entry points are gone.
    _library: Library,
}

impl NativeModule {
    /// Open the library at `path` and resolve its entry points.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CouldNotLoad`] when the library cannot be
    /// opened.
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // SAFETY: loading a library runs its initialisers; the file has passed
        // the binary-format check and is what the train asked for.
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::CouldNotLoad {
            title: title.clone(),
            details: e.to_string(),
        })?;
        let entry = EntryPoints::resolve(&library);
        info!(plugin = %title, entry_points = entry.count(), "native plugin library opened");
        Ok(Self {
            title,
            entry,
            _library: library,
        })
    }
}

impl SafetyModule for NativeModule {
    fn title(&self) -> &str {
        &self.title
    }

    fn load(&mut self) -> Result<(), BridgeError> {
        call_void(self.entry.load);
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), BridgeError> {
        call_void(self.entry.dispose);
        Ok(())
    }

    fn version(&mut self) -> Result<i32, BridgeError> {
        Ok(match self.entry.get_plugin_version {
            // SAFETY: resolved with the ABI's signature.
            Some(f) => unsafe { f() },
            None => 0,
        })
    }

    fn set_vehicle_spec(&mut self, spec: AtsVehicleSpec) -> Result<(), BridgeError> {
        if let Some(f) = self.entry.set_vehicle_spec {
            // SAFETY: `AtsVehicleSpec` is `#[repr(C)]` and matches the header.
            unsafe { f(spec) }
        }
        Ok(())
    }

    fn initialize(&mut self, mode: InitializationMode) -> Result<(), BridgeError> {
        call_int(self.entry.initialize, mode as i32);
        Ok(())
    }

    fn elapse(
        &mut self,
        state: AtsVehicleState,
        panel: &mut [i32],
        sound: &mut [i32],
        driver: AtsHandles,
    ) -> Result<AtsHandles, BridgeError> {
        if panel.len() < PANEL_SIZE || sound.len() < SOUND_SIZE {
            return Err(BridgeError::Boundary {
                entry_point: "Elapse".to_string(),
                details: format!(
                    "shared arrays too small (panel {}, sound {})",
                    panel.len(),
                    sound.len()
                ),
            });
        }
        match self.entry.elapse {
            // SAFETY: both arrays hold at least the 256 slots the module may
            // address and stay borrowed for the whole call.
            Some(f) => Ok(unsafe { f(state, panel.as_mut_ptr(), sound.as_mut_ptr()) }),
            None => {
                debug!(plugin = %self.title, "no Elapse entry point; echoing driver handles");
                Ok(driver)
            }
        }
    }

    fn set_power(&mut self, notch: i32) -> Result<(), BridgeError> {
        call_int(self.entry.set_power, notch);
        Ok(())
    }

    fn set_brake(&mut self, notch: i32) -> Result<(), BridgeError> {
        call_int(self.entry.set_brake, notch);
        Ok(())
    }

    fn set_reverser(&mut self, position: i32) -> Result<(), BridgeError> {
        call_int(self.entry.set_reverser, position);
        Ok(())
    }

    fn key_down(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        call_int(self.entry.key_down, key as i32);
        Ok(())
    }

    fn key_up(&mut self, key: VirtualKey) -> Result<(), BridgeError> {
        call_int(self.entry.key_up, key as i32);
        Ok(())
    }

    fn horn_blow(&mut self, horn: HornType) -> Result<(), BridgeError> {
        call_int(self.entry.horn_blow, horn as i32);
        Ok(())
    }

    fn door_open(&mut self) -> Result<(), BridgeError> {
        call_void(self.entry.door_open);
        Ok(())
    }

    fn door_close(&mut self) -> Result<(), BridgeError> {
        call_void(self.entry.door_close);
        Ok(())
    }

    fn set_signal(&mut self, aspect: i32) -> Result<(), BridgeError> {
        call_int(self.entry.set_signal, aspect);
        Ok(())
    }

    fn set_beacon_data(&mut self, beacon: AtsBeaconData) -> Result<(), BridgeError> {
        if let Some(f) = self.entry.set_beacon_data {
            // SAFETY: `AtsBeaconData` is `#[repr(C)]` and matches the header.
            unsafe { f(beacon) }
        }
        Ok(())
    }
}

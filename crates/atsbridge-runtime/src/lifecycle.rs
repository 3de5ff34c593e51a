//! [`PluginManager`] – loading, initialising and unloading safety modules.
//!
//! ```text
//! Unloaded → Loading → VersionChecking → Initialized → Active → Unloaded
//! ```
//!
//! A load either ends `Active` with a live [`PluginSession`] or falls back to
//! `Unloaded`, releasing whatever was acquired on the way (the session and its
//! module are dropped).  Load faults are reported once through the
//! [`MessageLog`]; the train then keeps running on built-in control.
//!
//! [`PluginManager::load_from_train_folder`] adds the train-folder discovery
//! in front of the load: the `ats.cfg` file names the module, which must
//! exist, be a 32-bit x86 image, and run on a host that can execute it.

use std::fs;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

use atsbridge_types::{
    ATS_VERSION, BridgeError, HandleState, MessageSeverity, SafetyMode, StartMode, TrainConfig,
    VehicleSpec,
};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::message_log::MessageLog;
use crate::module::SafetyModule;
use crate::native::NativeModule;
use crate::pe_header;
use crate::session::PluginSession;

/// Default name of the per-train module configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "ats.cfg";

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    VersionChecking,
    Initialized,
    Active,
}

/// Result of [`PluginManager::load_plugin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadOutcome {
    Successful,
    CouldNotLoad,
    InvalidVersion,
}

/// Opens module files.  The manager owns one; tests substitute their own.
pub trait ModuleLoader: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn SafetyModule>, BridgeError>;

    /// Whether this host can execute legacy modules at all.
    fn supports_platform(&self) -> bool {
        cfg!(all(windows, target_pointer_width = "32"))
    }
}

/// Loads [`NativeModule`]s through the platform's dynamic loader.
#[derive(Debug, Default)]
pub struct NativeLoader;

impl ModuleLoader for NativeLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SafetyModule>, BridgeError> {
        Ok(Box::new(NativeModule::open(path)?))
    }
}

/// Resolve a text-encoding label (`"utf-8"`, `"shift_jis"`, ...).
///
/// # Errors
///
/// Returns [`BridgeError::Config`] for unknown labels.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, BridgeError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| BridgeError::Config(format!("unknown text encoding '{label}'")))
}

// ────────────────────────────────────────────────────────────────────────────
// PluginManager
// ────────────────────────────────────────────────────────────────────────────

/// Owner of the (at most one) loaded safety module.
pub struct PluginManager {
    loader: Box<dyn ModuleLoader>,
    session: Option<PluginSession>,
    state: LifecycleState,
    safety_mode: SafetyMode,
    messages: MessageLog,
    config_file_name: String,
    last_fault: Option<BridgeError>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::with_loader(Box::new(NativeLoader))
    }
}

impl PluginManager {
    /// Manager that loads native libraries.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            session: None,
            state: LifecycleState::Unloaded,
            safety_mode: SafetyMode::Builtin,
            messages: MessageLog::new(),
            config_file_name: DEFAULT_CONFIG_FILE.to_string(),
            last_fault: None,
        }
    }

    /// Use `name` instead of `ats.cfg` when reading train folders.
    pub fn with_config_file_name(mut self, name: impl Into<String>) -> Self {
        self.config_file_name = name.into();
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn safety_mode(&self) -> SafetyMode {
        self.safety_mode
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active && self.session.is_some()
    }

    pub fn session(&self) -> Option<&PluginSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut PluginSession> {
        self.session.as_mut()
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }

    /// Last fault raised by a module, including faults during loading and in
    /// sessions that have since been torn down.
    pub fn last_fault(&self) -> Option<&BridgeError> {
        self.session
            .as_ref()
            .and_then(PluginSession::last_fault)
            .or(self.last_fault.as_ref())
    }

    // ── loading ─────────────────────────────────────────────────────────────

    /// Discover and load the module configured for a train.
    ///
    /// Returns `true` when a module is now active.  A missing or empty
    /// configuration file is not an error: the train simply has no module.
    #[instrument(skip_all, fields(folder = %folder.display()))]
    pub fn load_from_train_folder(
        &mut self,
        folder: &Path,
        encoding: &'static Encoding,
        train: &TrainConfig,
        start: StartMode,
        driver: &HandleState,
    ) -> bool {
        self.unload();

        let config = folder.join(&self.config_file_name);
        let Some(module_path) = read_module_path(&config, folder, encoding) else {
            debug!(config = %config.display(), "no plugin configured");
            return false;
        };
        let title = module_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !module_path.is_file() {
            self.messages.push_error(&BridgeError::ModuleNotFound {
                title,
                config: config.display().to_string(),
            });
            return false;
        }
        if !pe_header::is_i386_pe(&module_path) {
            self.messages.push_error(&BridgeError::UnsupportedBinary(title));
            return false;
        }
        if !self.loader.supports_platform() {
            self.messages.push_error(&BridgeError::UnsupportedPlatform(title));
            return false;
        }

        matches!(
            self.load_plugin(&module_path, train, start, driver),
            Ok(LoadOutcome::Successful)
        )
    }

    /// Open the module at `path` and run the load sequence.
    ///
    /// # Errors
    ///
    /// Returns the boundary fault when the module fails during the load
    /// sequence; the manager is `Unloaded` afterwards.
    #[instrument(skip_all, fields(plugin = %path.display()))]
    pub fn load_plugin(
        &mut self,
        path: &Path,
        train: &TrainConfig,
        start: StartMode,
        driver: &HandleState,
    ) -> Result<LoadOutcome, BridgeError> {
        self.unload();
        self.state = LifecycleState::Loading;
        match self.loader.open(path) {
            Ok(module) => self.load_module(module, train, start, driver),
            Err(e) => {
                self.messages.push_error(&e);
                self.state = LifecycleState::Unloaded;
                Ok(LoadOutcome::CouldNotLoad)
            }
        }
    }

    /// Run the load sequence on an already opened module:
    /// `Load`, `GetPluginVersion`, version gate, `SetVehicleSpec`,
    /// `Initialize`, then the initial power, brake and reverser.
    ///
    /// # Errors
    ///
    /// See [`load_plugin`][Self::load_plugin].
    #[instrument(skip_all, fields(plugin = %module.title()))]
    pub fn load_module(
        &mut self,
        module: Box<dyn SafetyModule>,
        train: &TrainConfig,
        start: StartMode,
        driver: &HandleState,
    ) -> Result<LoadOutcome, BridgeError> {
        if self.session.is_some() {
            self.unload();
        }
        self.state = LifecycleState::Loading;
        let mut session = PluginSession::new(module);

        match self.run_load_sequence(&mut session, train, start, driver) {
            Ok(LoadOutcome::Successful) => {
                info!(plugin = %session.title(), "plugin active");
                self.session = Some(session);
                self.state = LifecycleState::Active;
                self.safety_mode = SafetyMode::Plugin;
                Ok(LoadOutcome::Successful)
            }
            Ok(outcome) => {
                self.state = LifecycleState::Unloaded;
                Ok(outcome)
            }
            Err(e) => {
                self.messages.push(
                    MessageSeverity::Error,
                    format!("The train plugin {} raised a fault on loading: {e}", session.title()),
                );
                self.last_fault = Some(e.clone());
                self.state = LifecycleState::Unloaded;
                Err(e)
            }
        }
    }

    fn run_load_sequence(
        &mut self,
        session: &mut PluginSession,
        train: &TrainConfig,
        start: StartMode,
        driver: &HandleState,
    ) -> Result<LoadOutcome, BridgeError> {
        session.call("Load", |m| m.load())?;

        self.state = LifecycleState::VersionChecking;
        let version = session.call("GetPluginVersion", |m| m.version())?;
        if version != ATS_VERSION {
            warn!(plugin = %session.title(), version, "unsupported plugin version");
            self.messages.push_error(&BridgeError::InvalidVersion {
                title: session.title().to_string(),
                found: version,
            });
            return Ok(LoadOutcome::InvalidVersion);
        }

        let spec = VehicleSpec::from_train(train).to_abi();
        session.call("SetVehicleSpec", |m| m.set_vehicle_spec(spec))?;
        session.initialize(start.into())?;
        self.state = LifecycleState::Initialized;

        session.push_driver_handles(driver, train)?;
        Ok(LoadOutcome::Successful)
    }

    // ── running ─────────────────────────────────────────────────────────────

    /// Re-send the initialisation mode, as done when the train is placed at a
    /// new position.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotActive`] without a session, or the module's fault.
    pub fn initialize(&mut self, start: StartMode) -> Result<(), BridgeError> {
        let session = self.session.as_mut().ok_or(BridgeError::NotActive)?;
        session.initialize(start.into())
    }

    /// The train is about to jump to another location.
    pub fn begin_jump(&mut self, start: StartMode) -> Result<(), BridgeError> {
        self.initialize(start)
    }

    /// The jump has finished.  Nothing to do for legacy modules.
    pub fn end_jump(&mut self) {}

    /// Dispose and release the loaded module.  Does nothing when unloaded.
    #[instrument(skip_all)]
    pub fn unload(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.dispose() {
                self.last_fault = Some(e);
            }
            info!(plugin = %session.title(), "plugin unloaded");
        }
        self.state = LifecycleState::Unloaded;
        self.safety_mode = SafetyMode::Builtin;
    }
}

/// First line of the configuration file, resolved against the train folder.
/// `None` when the file is missing or has no usable first line.
fn read_module_path(config: &Path, folder: &Path, encoding: &'static Encoding) -> Option<PathBuf> {
    let bytes = fs::read(config).ok()?;
    let (text, actual, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(config = %config.display(), encoding = actual.name(), "malformed characters in plugin configuration");
    }
    let first = text.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(folder.join(first.replace('\\', MAIN_SEPARATOR_STR)))
}

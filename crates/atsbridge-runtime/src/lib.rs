//! `atsbridge-runtime` – safety module hosting
//!
//! Loads legacy ATS modules, drives them once per simulation tick and keeps
//! the simulation running on built-in control whenever a module is absent,
//! rejected or faulted.
//!
//! # Modules
//!
//! - [`module`] – [`SafetyModule`][module::SafetyModule]: the control
//!   surface, one method per legacy entry point.
//! - [`native`] – [`NativeModule`][native::NativeModule]: a legacy dynamic
//!   library behind `libloading`.
//! - [`builtin`] – [`BuiltinModule`][builtin::BuiltinModule]: the in-process
//!   pass-through module.
//! - [`session`] – [`PluginSession`][session::PluginSession]: shared arrays,
//!   diffed pushes, sound slots and the call guard of one loaded module.
//! - [`lifecycle`] – [`PluginManager`][lifecycle::PluginManager]: `ats.cfg`
//!   discovery, binary and platform gates, load sequence, unload.
//! - [`update_cycle`] – [`UpdateCycle`][update_cycle::UpdateCycle]: per-tick
//!   orchestration and event forwarding.
//! - [`loading`] – [`LoadingPipeline`][loading::LoadingPipeline]: staged
//!   background loading with cancellation.
//! - [`message_log`] – [`MessageLog`][message_log::MessageLog]: user-facing
//!   messages.
//! - [`pe_header`] – 32-bit x86 image check.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: subscriber
//!   and optional OTLP export.

pub mod builtin;
pub mod lifecycle;
pub mod loading;
pub mod message_log;
pub mod module;
pub mod native;
pub mod pe_header;
pub mod session;
pub mod telemetry;
pub mod update_cycle;

pub use builtin::BuiltinModule;
pub use lifecycle::{LifecycleState, LoadOutcome, ModuleLoader, NativeLoader, PluginManager, resolve_encoding};
pub use loading::{LoadingOutcome, LoadingPipeline, LoadingStage, StageRunner};
pub use message_log::MessageLog;
pub use module::SafetyModule;
pub use native::NativeModule;
pub use session::PluginSession;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use update_cycle::{TickReport, UpdateCycle};

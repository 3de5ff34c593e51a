//! `atsbridge-hal` – the simulation collaborators the bridge talks to.
//!
//! The bridge never owns audio or route data.  It sees them through the
//! [`AudioEngine`] and [`SectionGraph`] traits so any host can plug in its own
//! implementation.  [`sim`] provides in-process stand-ins used by tests and by
//! the `atsbridge` CLI.

pub mod audio;
pub mod sections;
pub mod sim;

pub use audio::{AudioEngine, PlaybackHandle};
pub use sections::{Section, SectionAspect, SectionGraph};

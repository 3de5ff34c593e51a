//! `atsbridge-kernel` – protocol rules
//!
//! Pure translation logic between the simulation and the legacy ATS
//! protocol.  Nothing here loads libraries or owns buffers; the runtime feeds
//! these rules with data and applies what they return.
//!
//! # Modules
//!
//! - [`handle_codec`] – brake/power/reverser/const-speed codes in both
//!   directions, branching on [`BrakeArchitecture`][atsbridge_types::BrakeArchitecture].
//! - [`sound_machine`] – [`SoundMachine`][sound_machine::SoundMachine]:
//!   turns the module's sound slot codes into play/stop/gain commands,
//!   suppressing repeats.
//! - [`signal_lookahead`] – builds [`BeaconMessage`][signal_lookahead::BeaconMessage]s
//!   by walking the section graph, including the "next red section" search.
//! - [`call_guard`] – [`CallGuard`][call_guard::CallGuard]: rejects calls into
//!   a module while another call is outstanding.

pub mod call_guard;
pub mod handle_codec;
pub mod signal_lookahead;
pub mod sound_machine;

pub use call_guard::{CallGuard, CallToken};
pub use handle_codec::{DecodedHandles, decode_brake, decode_handles, encode_brake, encode_handles};
pub use signal_lookahead::{BeaconMessage, BeaconTarget, encode_beacon, section_signal_aspect};
pub use sound_machine::SoundMachine;

//! [`CallGuard`] – one outstanding module call at a time.
//!
//! Legacy modules are not re-entrant.  Every call into a module holds a
//! [`CallToken`] for its duration; asking for a second token while the first
//! is alive fails with [`BridgeError::Reentrant`].  The token releases the
//! guard when dropped, so early returns and faults cannot leave it stuck.

use std::sync::atomic::{AtomicBool, Ordering};

use atsbridge_types::BridgeError;
use tracing::warn;

/// Re-entrancy guard for calls into a safety module.
///
/// # Example
///
/// ```
/// use atsbridge_kernel::call_guard::CallGuard;
///
/// let guard = CallGuard::new();
/// let token = guard.enter("Elapse").unwrap();
/// assert!(guard.enter("SetPower").is_err());
/// drop(token);
/// assert!(guard.enter("SetPower").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct CallGuard {
    in_call: AtomicBool,
}

/// Proof that a module call is in progress.  Releases the guard on drop.
#[derive(Debug)]
pub struct CallToken<'a> {
    guard: &'a CallGuard,
}

impl CallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard for a call to `entry_point`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Reentrant`] while another token is alive.
    pub fn enter(&self, entry_point: &str) -> Result<CallToken<'_>, BridgeError> {
        if self.in_call.swap(true, Ordering::AcqRel) {
            warn!(entry_point, "re-entrant plugin call rejected");
            return Err(BridgeError::Reentrant(entry_point.to_string()));
        }
        Ok(CallToken { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.in_call.load(Ordering::Acquire)
    }
}

impl Drop for CallToken<'_> {
    fn drop(&mut self) {
        self.guard.in_call.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_rejected() {
        let guard = CallGuard::new();
        let _token = guard.enter("Elapse").unwrap();
        let err = guard.enter("KeyDown").unwrap_err();
        assert_eq!(err, BridgeError::Reentrant("KeyDown".to_string()));
    }

    #[test]
    fn token_releases_on_early_return() {
        fn failing_call(guard: &CallGuard) -> Result<(), BridgeError> {
            let _token = guard.enter("Initialize")?;
            Err(BridgeError::Boundary {
                entry_point: "Initialize".to_string(),
                details: "fault".to_string(),
            })
        }

        let guard = CallGuard::new();
        assert!(failing_call(&guard).is_err());
        assert!(!guard.is_busy());
    }
}

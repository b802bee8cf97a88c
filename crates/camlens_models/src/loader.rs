//! Process-wide checkpoint loading policy.
//!
//! Strict loading rejects checkpoints whose metadata was written by another
//! format version. Permissive loading accepts them with a warning. The policy
//! is switched with the scoped [`PermissiveLoading`] guard. Guards are counted,
//! so loading stays permissive while any guard on any thread is live,
//! regardless of the order in which they drop (including during unwinding).

use parking_lot::{const_rwlock, RwLock};

/// How checkpoint metadata is validated on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderPolicy {
    /// Reject checkpoints from unknown format versions.
    #[default]
    Strict,
    /// Accept checkpoints from unknown format versions with a warning.
    Permissive,
}

/// Number of live [`PermissiveLoading`] guards.
static PERMISSIVE_GUARDS: RwLock<usize> = const_rwlock(0);

/// The policy currently in effect.
pub fn loader_policy() -> LoaderPolicy {
    if *PERMISSIVE_GUARDS.read() > 0 {
        LoaderPolicy::Permissive
    } else {
        LoaderPolicy::Strict
    }
}

/// Scoped override that makes checkpoint loading permissive.
///
/// The policy returns to strict once every live guard has dropped.
#[must_use = "the override ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PermissiveLoading {
    _private: (),
}

impl PermissiveLoading {
    /// Switch to [`LoaderPolicy::Permissive`] until the guard drops.
    pub fn acquire() -> Self {
        let mut guards = PERMISSIVE_GUARDS.write();
        *guards += 1;
        tracing::trace!(live = *guards, "permissive checkpoint loading enabled");
        Self { _private: () }
    }
}

impl Drop for PermissiveLoading {
    fn drop(&mut self) {
        let mut guards = PERMISSIVE_GUARDS.write();
        *guards = guards.saturating_sub(1);
        tracing::trace!(live = *guards, "permissive checkpoint loading released");
    }
}

/// Run `f` with permissive loading in effect.
pub fn with_permissive_loading<T>(f: impl FnOnce() -> T) -> T {
    let _guard = PermissiveLoading::acquire();
    f()
}

/// Serializes tests that observe the global policy.
#[cfg(test)]
pub(crate) static POLICY_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

//! Deferred actions: side effects that many operations may ask for but that should only run once.
//!
//! Provisioning tasks frequently end with "and now reboot" or "and now clean the apt cache". When
//! tasks are composed, running those side effects at the end of every task wastes time at best
//! (cleaning the cache five times) and breaks the run at worst (rebooting halfway through). A
//! [DeferredAction] separates "this is needed" ([DeferredAction::request]) from "do it now"
//! ([DeferredAction::run]).
//!
//! # Guarded calls
//!
//! Operations run through [DeferredAction::call] (or a [Guarded] operation produced by
//! [DeferredAction::wrap]) are *guarded*. While any guarded call is active, [DeferredAction::run]
//! is suppressed. When the outermost guarded call returns, the action fires if anyone requested
//! it, exactly once:
//!
//! ```
//! use piprov::defer::DeferredAction;
//! use std::cell::Cell;
//!
//! let fired = Cell::new(0);
//! let restart = DeferredAction::new("restart", || {
//!     fired.set(fired.get() + 1);
//!     Ok(())
//! });
//!
//! let inner = || restart.call(|| {
//!     restart.request();
//!     Ok(())
//! });
//!
//! restart.call(|| {
//!     inner()?;
//!     inner()?;
//!     // Nothing has fired yet; we are still inside the outer call.
//!     assert_eq!(0, fired.get());
//!     Ok(())
//! })?;
//!
//! assert_eq!(1, fired.get());
//! # anyhow::Ok(())
//! ```
//!
//! # Threading
//!
//! The suppression depth is tracked with [Cell]s, so a [DeferredAction] is deliberately `!Sync`.
//! A call chain on one thread can never observe another thread's depth.

use log::{debug, error, info};
use std::cell::Cell;
use std::fmt;

/// A side effect that fires at most once per outermost guarded call, and only if requested.
pub struct DeferredAction<'a> {
    /// Used in log messages only.
    name: &'static str,

    /// The side effect itself.
    action: Box<dyn Fn() -> anyhow::Result<()> + 'a>,

    /// Whether anyone has asked for [Self::action] since the last time it was evaluated.
    pending: Cell<bool>,

    /// The number of guarded calls currently active on this instance.
    depth: Cell<usize>,
}

impl<'a> DeferredAction<'a> {
    /// Creates an idle [DeferredAction] that will run `action` when fired.
    pub fn new(name: &'static str, action: impl Fn() -> anyhow::Result<()> + 'a) -> Self {
        DeferredAction {
            name,
            action: Box::new(action),
            pending: Cell::new(false),
            depth: Cell::new(0),
        }
    }

    /// The name given to [Self::new].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the action has been requested and has not fired since.
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// The number of guarded calls currently active on this instance.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Marks the action as needed. Calling this repeatedly has the same effect as calling it once.
    pub fn request(&self) {
        if !self.pending.replace(true) {
            debug!("deferred action {} requested", self.name);
        }
    }

    /// Fires the action if it was requested and no guarded call is active.
    ///
    /// Returns whether the action fired. While a guarded call is active the request is held, so
    /// that the outermost guarded call can fire it later. Otherwise the request is consumed
    /// whether or not the action fired, and whether or not it succeeded.
    ///
    /// # Errors
    ///
    /// Returns the action's own error, unchanged.
    pub fn run(&self) -> anyhow::Result<bool> {
        if self.depth.get() > 0 {
            if self.pending.get() {
                debug!(
                    "deferred action {} suppressed at depth {}",
                    self.name,
                    self.depth.get(),
                );
            }
            return Ok(false);
        }

        if !self.pending.replace(false) {
            return Ok(false);
        }

        info!("running deferred action {}", self.name);
        (self.action)()?;
        Ok(true)
    }

    /// Enters a guarded scope. The scope ends when the returned [DeferGuard] is dropped.
    ///
    /// Dropping the guard only restores the depth; it never fires the action, because firing can
    /// fail and [Drop] cannot report failures. Use [Self::call] unless you intend to call
    /// [Self::run] yourself.
    pub fn enter(&self) -> DeferGuard<'_, 'a> {
        self.depth.set(self.depth.get() + 1);
        DeferGuard { deferred: self }
    }

    /// Runs `operation` as a guarded call.
    ///
    /// If this is the outermost guarded call on this instance, [Self::run] is evaluated after
    /// `operation` returns, whether or not it succeeded.
    ///
    /// # Errors
    ///
    /// Returns `operation`'s error if it failed. If `operation` succeeded but the deferred action
    /// failed, returns the action's error. If both failed, the action's error is logged and
    /// `operation`'s error is returned.
    pub fn call<T>(&self, operation: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        let outcome = {
            let _guard = self.enter();
            operation()
        };

        if self.depth.get() > 0 {
            return outcome;
        }

        match (outcome, self.run()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(action_error)) => Err(action_error),
            (Err(error), Ok(_)) => Err(error),
            (Err(error), Err(action_error)) => {
                error!(
                    "deferred action {} failed while unwinding: {action_error:#}",
                    self.name,
                );
                Err(error)
            }
        }
    }

    /// Wraps `operation` so that each invocation of the result is a guarded call.
    ///
    /// Pass multiple arguments as a tuple.
    ///
    /// ```
    /// use piprov::defer::DeferredAction;
    ///
    /// let clean = DeferredAction::new("clean", || Ok(()));
    /// let mut install = clean.wrap(|(package, version): (&str, u32)| -> anyhow::Result<String> {
    ///     clean.request();
    ///     Ok(format!("{package}={version}"))
    /// });
    ///
    /// assert_eq!("dropbear=2022", install.call(("dropbear", 2022))?);
    /// assert!(!clean.is_pending());
    /// # anyhow::Ok(())
    /// ```
    pub fn wrap<F>(&self, operation: F) -> Guarded<'_, 'a, F> {
        Guarded {
            deferred: self,
            operation,
        }
    }
}

impl fmt::Debug for DeferredAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("name", &self.name)
            .field("pending", &self.pending.get())
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}

/// A guarded scope on a [DeferredAction]. Restores the suppression depth when dropped, including
/// during a panic.
#[must_use = "the guarded scope ends as soon as the guard is dropped"]
pub struct DeferGuard<'d, 'a> {
    deferred: &'d DeferredAction<'a>,
}

impl Drop for DeferGuard<'_, '_> {
    fn drop(&mut self) {
        let depth = &self.deferred.depth;
        depth.set(depth.get() - 1);
    }
}

/// An operation bound to a [DeferredAction]. Created by [DeferredAction::wrap].
pub struct Guarded<'d, 'a, F> {
    deferred: &'d DeferredAction<'a>,
    operation: F,
}

impl<F> Guarded<'_, '_, F> {
    /// Invokes the wrapped operation as a guarded call. See [DeferredAction::call].
    pub fn call<A, T>(&mut self, args: A) -> anyhow::Result<T>
    where
        F: FnMut(A) -> anyhow::Result<T>,
    {
        let deferred = self.deferred;
        let operation = &mut self.operation;
        deferred.call(|| operation(args))
    }
}

#![forbid(unsafe_code)]

//! Toolkit-independent publish/subscribe channel.
//!
//! # Design
//!
//! A [`Signal<E>`] keeps its handlers as `Weak` references. The strong
//! reference lives inside the [`Subscription`] guard returned by
//! [`Signal::connect`], so a subscriber that goes out of scope deregisters
//! itself without an explicit [`Signal::disconnect`]. Dead slots are pruned
//! lazily on the next [`Signal::emit`].
//!
//! # Failure Modes
//!
//! - **Panicking handler**: caught with `catch_unwind`; the remaining
//!   handlers still run and the panic never reaches the emitter. With the
//!   `tracing` feature the panic message is logged at `warn`.
//! - **Re-entrant connect/disconnect**: allowed. The slot list is not
//!   borrowed while handlers run; a handler connected during an emit is
//!   first invoked on the following emit.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

type HandlerRc<E> = Rc<dyn Fn(&E)>;
type HandlerWeak<E> = Weak<dyn Fn(&E)>;

struct Slot<E> {
    id: u64,
    handler: HandlerWeak<E>,
}

struct SignalInner<E> {
    next_slot: u64,
    slots: Vec<Slot<E>>,
}

/// A typed event channel.
///
/// Cloning a `Signal` yields another handle to the **same** slot list.
/// Signals are single-threaded (`!Send`), matching the engine's model.
///
/// # Invariants
///
/// 1. Handlers run in connection order.
/// 2. A dropped [`Subscription`] is never invoked again.
/// 3. `emit` never panics because of a handler.
pub struct Signal<E> {
    inner: Rc<RefCell<SignalInner<E>>>,
}

impl<E> Clone for Signal<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Signal")
            .field("slots", &inner.slots.len())
            .finish()
    }
}

impl<E: 'static> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Signal<E> {
    /// Create a signal with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                next_slot: 1,
                slots: Vec::new(),
            })),
        }
    }

    /// Register a handler.
    ///
    /// The handler stays connected for as long as the returned guard lives.
    #[must_use = "dropping the Subscription disconnects the handler"]
    pub fn connect(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let strong: HandlerRc<E> = Rc::new(handler);
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_slot;
            inner.next_slot += 1;
            inner.slots.push(Slot {
                id,
                handler: Rc::downgrade(&strong),
            });
            id
        };
        Subscription {
            signal: self.key(),
            slot: id,
            _guard: Box::new(strong),
        }
    }

    /// Remove a handler eagerly.
    ///
    /// Returns `false` when the subscription belongs to another signal or
    /// its slot was already pruned.
    pub fn disconnect(&self, subscription: Subscription) -> bool {
        if subscription.signal != self.key() {
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        let before = inner.slots.len();
        inner.slots.retain(|slot| slot.id != subscription.slot);
        inner.slots.len() != before
    }

    /// Invoke every live handler with `event`.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn emit(&self, event: &E) -> usize {
        let handlers: Vec<HandlerRc<E>> = {
            let mut inner = self.inner.borrow_mut();
            inner.slots.retain(|slot| slot.handler.strong_count() > 0);
            inner
                .slots
                .iter()
                .filter_map(|slot| slot.handler.upgrade())
                .collect()
        };

        let mut completed = 0;
        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(payload) => report_handler_panic(payload.as_ref()),
            }
        }
        completed
    }

    /// Number of handlers whose subscription is still alive.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.handler.strong_count() > 0)
            .count()
    }

    /// Weak handle usable by adapters that must not keep the signal alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakSignal<E> {
        WeakSignal {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

/// Non-owning handle to a [`Signal`].
pub struct WeakSignal<E> {
    inner: Weak<RefCell<SignalInner<E>>>,
}

impl<E> Clone for WeakSignal<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for WeakSignal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSignal")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<E> WeakSignal<E> {
    /// Recover the signal if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Signal<E>> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }
}

fn report_handler_panic(payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    #[cfg(feature = "tracing")]
    tracing::warn!(panic = %message, "signal handler panicked; continuing");
    #[cfg(not(feature = "tracing"))]
    let _ = message;
}

/// RAII guard for a connected handler.
///
/// Dropping the guard releases the only strong reference to the handler, so
/// the signal's weak slot fails to upgrade from then on.
pub struct Subscription {
    signal: usize,
    slot: u64,
    /// Type-erased strong reference keeping the handler `Rc` alive.
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Slot number within the owning signal.
    #[must_use]
    pub const fn slot(&self) -> u64 {
        self.slot
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

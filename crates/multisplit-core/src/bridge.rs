#![forbid(unsafe_code)]

//! Adapter between a [`Signal`] and a host toolkit's own event mechanism.
//!
//! Outbound, every event emitted on the signal is forwarded to a
//! [`HostSink`]. Inbound, the host pushes native events into the signal via
//! [`SignalBridge::relay_from_host`] or a detached [`SignalEmitter`]. Events
//! that arrive from the host are not echoed back to the host sink.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::signal::{Signal, Subscription, WeakSignal};

/// Receiver on the host side of a bridge.
///
/// Any `Fn(&E)` closure is a sink; toolkits with richer dispatch can
/// implement the trait on their own adapter type.
pub trait HostSink<E> {
    /// Deliver one engine event to the host.
    fn deliver(&self, event: &E);
}

impl<E, F> HostSink<E> for F
where
    F: Fn(&E),
{
    fn deliver(&self, event: &E) {
        self(event);
    }
}

/// Bidirectional link between a [`Signal`] and a [`HostSink`].
///
/// Dropping the bridge disconnects the outbound direction.
pub struct SignalBridge<E> {
    signal: Signal<E>,
    relaying: Rc<Cell<bool>>,
    _outbound: Subscription,
}

impl<E> fmt::Debug for SignalBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBridge")
            .field("relaying", &self.relaying.get())
            .finish_non_exhaustive()
    }
}

impl<E: 'static> SignalBridge<E> {
    /// Connect `sink` to `signal`.
    pub fn new(signal: &Signal<E>, sink: impl HostSink<E> + 'static) -> Self {
        let relaying = Rc::new(Cell::new(false));
        let flag = Rc::clone(&relaying);
        let outbound = signal.connect(move |event| {
            if !flag.get() {
                sink.deliver(event);
            }
        });
        Self {
            signal: signal.clone(),
            relaying,
            _outbound: outbound,
        }
    }

    /// Push a host-originated event into the engine-side signal.
    ///
    /// Returns how many engine-side handlers completed.
    pub fn relay_from_host(&self, event: &E) -> usize {
        relay(&self.signal, &self.relaying, event)
    }

    /// Detached inbound handle that does not keep the signal alive.
    #[must_use]
    pub fn emitter(&self) -> SignalEmitter<E> {
        SignalEmitter {
            signal: self.signal.downgrade(),
            relaying: Some(Rc::clone(&self.relaying)),
        }
    }
}

/// Weak inbound handle into a [`Signal`].
///
/// Suitable for storing inside host callbacks: it never extends the
/// signal's lifetime, and emitting after the signal is gone is a no-op.
pub struct SignalEmitter<E> {
    signal: WeakSignal<E>,
    relaying: Option<Rc<Cell<bool>>>,
}

impl<E> Clone for SignalEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            relaying: self.relaying.clone(),
        }
    }
}

impl<E> fmt::Debug for SignalEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalEmitter")
            .field("signal", &self.signal)
            .field("bridged", &self.relaying.is_some())
            .finish()
    }
}

impl<E: 'static> SignalEmitter<E> {
    /// Emitter not tied to any bridge.
    #[must_use]
    pub fn new(signal: &Signal<E>) -> Self {
        Self {
            signal: signal.downgrade(),
            relaying: None,
        }
    }

    /// Emit on the signal. `None` once the signal has been dropped.
    pub fn emit(&self, event: &E) -> Option<usize> {
        let signal = self.signal.upgrade()?;
        Some(match &self.relaying {
            Some(flag) => relay(&signal, flag, event),
            None => signal.emit(event),
        })
    }
}

fn relay<E: 'static>(signal: &Signal<E>, flag: &Cell<bool>, event: &E) -> usize {
    let previous = flag.replace(true);
    let completed = signal.emit(event);
    flag.set(previous);
    // The bridge's own forwarding slot always completes.
    completed.saturating_sub(1)
}

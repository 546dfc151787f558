//! A tiny asynchronous state container.
//!
//! A [`SignalingCell`] holds one value and a renewable "next update" handle. Producers replace the
//! value synchronously with [`SignalingCell::patch_state`]; a consumer loops over
//! [`SignalingCell::get_state`] and [`SignalingCell::next`] to observe the latest value.
//!
//! Delivery is latest-only: patches that land before the consumer reads again are coalesced and only
//! the final value is visible. Waking does not carry a payload, consumers always re-read.
//!
//! ```rust
//! use elemental_signaling::SignalingCell;
//! use futures_util::FutureExt;
//!
//! let cell = SignalingCell::new(0);
//! let mut next = cell.next();
//!
//! cell.patch_state(|count| count.copied().unwrap_or_default() + 1);
//! cell.patch_state(|count| count.copied().unwrap_or_default() + 1);
//!
//! assert_eq!((&mut next).now_or_never(), Some(()));
//! assert_eq!(cell.get_state(), Some(2));
//! ```

use futures_channel::oneshot;
use futures_util::future::{FutureExt, Shared};
use std::{
    cell::RefCell,
    fmt::Debug,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

/// A shareable cell holding the latest value plus a wait handle for the next replacement.
///
/// Cloning the cell clones the handle, not the value.
pub struct SignalingCell<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

struct Inner<T> {
    state: Option<T>,
    version: u64,
    notify: oneshot::Sender<()>,
    waiter: Shared<oneshot::Receiver<()>>,
}

impl<T> SignalingCell<T> {
    /// Create a cell that has not been given a value yet.
    pub fn empty() -> Self {
        Self::with_initial(None)
    }

    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_initial(Some(initial))
    }

    fn with_initial(state: Option<T>) -> Self {
        let (notify, waiter) = oneshot::channel();

        Self {
            inner: Rc::new(RefCell::new(Inner {
                state,
                version: 0,
                notify,
                waiter: waiter.shared(),
            })),
        }
    }

    /// Get a clone of the current state, if any has been set.
    pub fn get_state(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.borrow().state.clone()
    }

    /// Run `f` against the current state without cloning it.
    pub fn with_state<O>(&self, f: impl FnOnce(Option<&T>) -> O) -> O {
        f(self.inner.borrow().state.as_ref())
    }

    /// The number of patches applied so far.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Wait for the state to be replaced.
    ///
    /// Every future taken between two patches shares one wait handle and completes on the next
    /// patch. A future taken after a patch waits for the following one; missed patches are never
    /// replayed.
    pub fn next(&self) -> Next {
        Next {
            waiter: self.inner.borrow().waiter.clone(),
        }
    }

    /// Replace the state with the result of `updater` and wake every pending [`Next`].
    ///
    /// The updater sees the current state and may read (but not patch) this cell.
    pub fn patch_state(&self, updater: impl FnOnce(Option<&T>) -> T) {
        let state = {
            let inner = self.inner.borrow();
            updater(inner.state.as_ref())
        };

        let (notify, waiter) = oneshot::channel();

        let (previous, version) = {
            let mut inner = self.inner.borrow_mut();
            inner.state = Some(state);
            inner.version += 1;
            inner.waiter = waiter.shared();
            (std::mem::replace(&mut inner.notify, notify), inner.version)
        };

        tracing::trace!(version, "signaling cell patched");

        // A closed receiver just means nobody was waiting.
        let _ = previous.send(());
    }
}

impl<T> Clone for SignalingCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for SignalingCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Debug> Debug for SignalingCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SignalingCell")
            .field("state", &inner.state)
            .field("version", &inner.version)
            .finish()
    }
}

/// Future returned by [`SignalingCell::next`].
///
/// Resolves once the cell is patched, or once every handle to the cell has been dropped.
#[must_use = "futures do nothing unless polled"]
#[derive(Clone)]
pub struct Next {
    waiter: Shared<oneshot::Receiver<()>>,
}

impl Future for Next {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.waiter.poll_unpin(cx).map(|_| ())
    }
}

impl Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

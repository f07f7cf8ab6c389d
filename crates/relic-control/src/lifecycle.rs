//! One-shot lifecycle completions.
//!
//! `persist` and `exit` each bridge a single module callback to a future
//! that may be awaited any number of times. The module side completes a
//! [`CompletionSlot`]; the host side holds a memoized
//! [`futures_util::future::Shared`] built over the slot's receiver.

use std::cell::RefCell;
use std::rc::Rc;

use futures_channel::oneshot;
use futures_util::future::{LocalBoxFuture, Shared};
use relic_module::ModuleError;
use thiserror::Error;

/// Failures of the memoized lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The request entry point failed synchronously; the matching one-shot
    /// callback was abandoned and will never be invoked.
    #[error("{op} request failed: {source}")]
    Request {
        op: &'static str,
        #[source]
        source: ModuleError,
    },

    /// The module dropped the completion without ever reporting a result.
    #[error("module dropped the {op} completion without reporting a result")]
    Abandoned { op: &'static str },

    /// The module reported an archive the bridge could not copy out.
    #[error("persist archive could not be read from module memory: {source}")]
    Archive {
        #[source]
        source: ModuleError,
    },
}

pub type PersistResult = Result<Rc<[u8]>, LifecycleError>;
pub type ExitResult = Result<i32, LifecycleError>;

/// Memoized, multiply-awaitable persist outcome.
pub type PersistFuture = Shared<LocalBoxFuture<'static, PersistResult>>;

/// Memoized, multiply-awaitable exit outcome.
pub type ExitFuture = Shared<LocalBoxFuture<'static, ExitResult>>;

enum SlotState<T> {
    /// No request in flight and nothing reported yet.
    Idle,
    /// A request armed the slot and awaits completion.
    Armed(oneshot::Sender<T>),
    /// Completed. The value is latched; later completions are ignored.
    Done(T),
}

/// Explicit single-use completion handle.
///
/// Owned by the lifecycle controller, never attached to the module itself.
/// The module's callback slot calls [`CompletionSlot::complete`]; the
/// controller arms the slot when it issues the matching request. Completing
/// an idle slot latches the value, which covers a module that terminates
/// before the host ever asked it to.
pub(crate) struct CompletionSlot<T: Clone> {
    state: Rc<RefCell<SlotState<T>>>,
}

impl<T: Clone> Clone for CompletionSlot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone> CompletionSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SlotState::Idle)),
        }
    }

    /// Arm the slot and return the receiving end.
    ///
    /// If the slot already completed, the receiver resolves immediately
    /// with the latched value.
    pub(crate) fn arm(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.borrow_mut();
        match &*state {
            SlotState::Done(value) => {
                let _ = tx.send(value.clone());
            }
            _ => *state = SlotState::Armed(tx),
        }
        rx
    }

    /// Abandon an armed request. The previously returned receiver observes
    /// cancellation; a later `complete` latches normally.
    pub(crate) fn disarm(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(&*state, SlotState::Armed(_)) {
            *state = SlotState::Idle;
        }
    }

    /// Report the module-side result. First completion wins.
    pub(crate) fn complete(&self, value: T) {
        let mut state = self.state.borrow_mut();
        match std::mem::replace(&mut *state, SlotState::Idle) {
            SlotState::Armed(tx) => {
                let _ = tx.send(value.clone());
                *state = SlotState::Done(value);
            }
            SlotState::Idle => *state = SlotState::Done(value),
            done @ SlotState::Done(_) => *state = done,
        }
    }
}

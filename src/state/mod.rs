//! Observable client-side state stores.
//!
//! DESIGN
//! ======
//! Each store is a plain struct mutated only through its own methods; sharing
//! happens via [`Store`], which serializes access and lets observers subscribe
//! to a revision counter instead of polling. There is no ambient global state.

pub mod chat;
pub mod directory;
pub mod session;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

/// Lock a mutex, recovering the guard if a panicking writer poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared, observable state cell.
///
/// Mutations go through [`Store::update`], which bumps a revision counter;
/// observers hold a [`watch::Receiver`] from [`Store::subscribe`] and re-read
/// a snapshot whenever the revision changes.
#[derive(Debug)]
pub struct Store<T> {
    inner: Mutex<T>,
    rev: watch::Sender<u64>,
}

impl<T> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            rev: watch::Sender::new(0),
        }
    }

    /// Mutate the state and notify subscribers.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut guard = lock(&self.inner);
            mutate(&mut guard)
        };
        self.rev.send_modify(|rev| *rev += 1);
        result
    }

    /// Read the state without notifying anyone.
    pub fn read<R>(&self, view: impl FnOnce(&T) -> R) -> R {
        view(&lock(&self.inner))
    }

    /// Subscribe to revision bumps. The value carried is the revision number;
    /// callers re-read the store when it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rev.subscribe()
    }

    /// Clone the current state.
    #[must_use]
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.read(Clone::clone)
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

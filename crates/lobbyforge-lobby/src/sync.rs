//! Authoritative values and the capability to change them.
//!
//! Only the lobby manager task may mutate lobbies and game state. That
//! rule is carried by [`Authority`]: a zero-sized token that code outside
//! this crate cannot construct, required by every mutating method. Code
//! that merely observes gets read access and change subscriptions.

use std::fmt;

use tokio::sync::watch;

/// Proof that the caller runs on the authoritative side.
///
/// Only this crate can mint one, so a mutating call from anywhere else
/// does not compile.
#[derive(Debug, Clone, Copy)]
pub struct Authority {
    _private: (),
}

impl Authority {
    pub(crate) const fn server() -> Self {
        Self { _private: () }
    }
}

/// A value owned by the authoritative side and replicated to observers.
///
/// Writes need an [`Authority`]; reads and [`subscribe`](Self::subscribe)
/// are open to anyone. Observers get the latest value, not every
/// intermediate one.
pub struct Synced<T> {
    tx: watch::Sender<T>,
}

impl<T> Synced<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// A read-only view that is notified whenever the value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replaces the value. Observers are only notified if it changed.
    /// Returns `true` on change.
    pub fn set(&self, _authority: Authority, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for Synced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Synced").field(&*self.tx.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_changes_value_and_reports_change() {
        let cell = Synced::new(1u8);
        assert!(cell.set(Authority::server(), 2));
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_set_same_value_reports_no_change() {
        let cell = Synced::new(5u8);
        assert!(!cell.set(Authority::server(), 5));
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let cell = Synced::new("a".to_string());
        let mut rx = cell.subscribe();
        assert_eq!(*rx.borrow(), "a");

        cell.set(Authority::server(), "b".to_string());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "b");
    }

    #[tokio::test]
    async fn test_unchanged_set_does_not_wake_subscriber() {
        let cell = Synced::new(3u32);
        let mut rx = cell.subscribe();
        cell.set(Authority::server(), 3);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_subscriber_observes_close_when_cell_dropped() {
        let cell = Synced::new(0u8);
        let mut rx = cell.subscribe();
        drop(cell);
        assert!(rx.changed().await.is_err());
    }
}

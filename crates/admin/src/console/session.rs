//! Observable session cell.

use std::sync::Arc;

use tokio::sync::watch;

use ilia_portal_core::Identity;

use crate::baas::{BaasError, Backend};

/// Holds the current identity and notifies subscribers when it changes.
///
/// Clones share the same cell. The snapshot is replaced atomically on every
/// auth notification; readers never observe a half-updated value.
#[derive(Debug, Clone)]
pub struct SessionObserver {
    sender: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for SessionObserver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionObserver {
    #[must_use]
    pub fn new(initial: Option<Identity>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The current identity snapshot.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }

    /// Replace the snapshot. Subscribers are only woken if it actually changed.
    pub fn publish(&self, identity: Option<Identity>) {
        self.sender.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }

    /// Ask the backend who the session belongs to and publish the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be reached; the snapshot is
    /// left unchanged in that case.
    pub async fn refresh_from(&self, backend: &dyn Backend) -> Result<Option<Identity>, BaasError> {
        let identity = backend.current_identity().await?;
        self.publish(identity.clone());
        Ok(identity)
    }

    /// Start listening for changes.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription to a [`SessionObserver`].
///
/// Dropping it detaches; [`SessionSubscription::unsubscribe`] does the same
/// explicitly.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: watch::Receiver<Option<Identity>>,
}

impl SessionSubscription {
    /// The latest snapshot, without marking it as seen.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return the new snapshot.
    ///
    /// Returns `None` once every observer handle has been dropped.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Whether a change arrived since the last [`SessionSubscription::changed`].
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ilia_portal_core::{Email, IdentityId};

    fn identity() -> Identity {
        Identity {
            id: IdentityId::random(),
            email: Email::parse("ilia@ilia.test").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_replacement() {
        let observer = SessionObserver::default();
        let mut subscription = observer.subscribe();
        let signed_in = identity();

        observer.publish(Some(signed_in.clone()));
        assert_eq!(subscription.changed().await, Some(Some(signed_in.clone())));
        assert_eq!(observer.current(), Some(signed_in));

        observer.publish(None);
        assert_eq!(subscription.changed().await, Some(None));
    }

    #[tokio::test]
    async fn test_publishing_same_identity_does_not_notify() {
        let signed_in = identity();
        let observer = SessionObserver::new(Some(signed_in.clone()));
        let subscription = observer.subscribe();

        observer.publish(Some(signed_in));
        assert!(!subscription.has_changed());
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let observer = SessionObserver::default();
        let first = observer.subscribe();
        let second = observer.subscribe();
        assert_eq!(observer.subscriber_count(), 2);

        first.unsubscribe();
        drop(second);
        assert_eq!(observer.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_ends_when_observer_dropped() {
        let observer = SessionObserver::default();
        let mut subscription = observer.subscribe();
        drop(observer);
        assert_eq!(subscription.changed().await, None);
    }
}

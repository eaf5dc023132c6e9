//! Session context: the authenticated identity shared by every component.
//!
//! `SessionContext` is created once at startup by [`SessionContext::hydrate`]
//! and handed out as an `Arc` to the gateway, the authenticator, the wizards
//! and the profile editor. Every mutation is written through to the
//! [`KeyValueStore`] before the in-memory copy changes, so a restart sees the
//! same session.

pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, keys};

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::profile::Profile;

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub phone_number: Option<String>,
    pub profile: Option<Profile>,
    /// True iff both the phone number and the profile are present.
    pub is_authenticated: bool,
}

impl Session {
    fn new(phone_number: Option<String>, profile: Option<Profile>) -> Self {
        let is_authenticated = phone_number.is_some() && profile.is_some();
        Self {
            phone_number,
            profile,
            is_authenticated,
        }
    }
}

/// Mask a phone number for logs, keeping the last four digits.
pub fn mask_phone(phone: &str) -> String {
    let visible: String = phone
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("******{visible}")
}

pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<Session>,
}

impl SessionContext {
    /// Create an empty session over `store` without reading it.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: RwLock::new(Session::default()),
        })
    }

    /// Load the persisted session.
    ///
    /// A profile that no longer decodes is dropped from the store with a
    /// warning; the phone number alone never authenticates.
    pub async fn hydrate(store: Arc<dyn KeyValueStore>) -> Result<Arc<Self>, SessionError> {
        let phone = store.get(keys::PHONE).await?;
        let profile = match store.get(keys::PROFILE).await? {
            Some(raw) => match serde_json::from_str::<Profile>(&raw) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted profile");
                    store.remove(&[keys::PROFILE]).await?;
                    None
                }
            },
            None => None,
        };

        let session = Session::new(phone, profile);
        if let Some(ref phone) = session.phone_number {
            info!(
                phone = %mask_phone(phone),
                authenticated = session.is_authenticated,
                "Session hydrated"
            );
        }

        Ok(Arc::new(Self {
            store,
            state: RwLock::new(session),
        }))
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn phone_number(&self) -> Option<String> {
        self.state.read().await.phone_number.clone()
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.state.read().await.profile.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    /// Store the phone number so subsequent requests identify the caller.
    pub async fn set_phone(&self, phone: &str) -> Result<(), SessionError> {
        self.store.set(keys::PHONE, phone).await?;
        let mut state = self.state.write().await;
        *state = Session::new(Some(phone.to_string()), state.profile.take());
        Ok(())
    }

    /// Remove the stored phone number (and with it, authentication).
    ///
    /// The in-memory copy is cleared even if the store write fails.
    pub async fn remove_phone(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().await;
            *state = Session::new(None, state.profile.take());
        }
        self.store.remove(&[keys::PHONE]).await
    }

    /// Replace the profile wholesale.
    pub async fn set_profile(&self, profile: Profile) -> Result<(), SessionError> {
        let raw = serde_json::to_string(&profile).map_err(|e| SessionError::Corrupt {
            key: keys::PROFILE.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(keys::PROFILE, &raw).await?;
        let mut state = self.state.write().await;
        *state = Session::new(state.phone_number.take(), Some(profile));
        Ok(())
    }

    /// Tear down the session: both persisted keys go together.
    pub async fn clear(&self) -> Result<(), SessionError> {
        *self.state.write().await = Session::default();
        self.store.remove(&[keys::PHONE, keys::PROFILE]).await?;
        info!("Session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            phone_number: "9876543210".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn mask_phone_keeps_last_four() {
        assert_eq!(mask_phone("9876543210"), "******3210");
        assert_eq!(mask_phone("12"), "******12");
    }

    #[tokio::test]
    async fn phone_alone_is_not_authenticated() {
        let session = SessionContext::new(Arc::new(MemoryStore::new()));
        session.set_phone("9876543210").await.unwrap();
        assert!(!session.is_authenticated().await);

        session.set_profile(profile("Ravi")).await.unwrap();
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn hydrate_restores_persisted_session() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let session = SessionContext::new(Arc::clone(&store));
            session.set_phone("9876543210").await.unwrap();
            session.set_profile(profile("Ravi")).await.unwrap();
        }

        let session = SessionContext::hydrate(store).await.unwrap();
        let snapshot = session.snapshot().await;
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.phone_number.as_deref(), Some("9876543210"));
        assert_eq!(snapshot.profile.unwrap().name, "Ravi");
    }

    #[tokio::test]
    async fn hydrate_drops_unreadable_profile() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::PHONE, "9876543210").await.unwrap();
        store.set(keys::PROFILE, "{not json").await.unwrap();

        let session = SessionContext::hydrate(Arc::clone(&store)).await.unwrap();
        assert!(!session.is_authenticated().await);
        assert!(store.get(keys::PROFILE).await.unwrap().is_none());
        assert_eq!(session.phone_number().await.as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn remove_phone_unauthenticates_and_unpersists() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::new(Arc::clone(&store));
        session.set_phone("9876543210").await.unwrap();
        session.set_profile(profile("Ravi")).await.unwrap();

        session.remove_phone().await.unwrap();
        assert!(!session.is_authenticated().await);
        assert!(store.get(keys::PHONE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_both_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::new(Arc::clone(&store));
        session.set_phone("9876543210").await.unwrap();
        session.set_profile(profile("Ravi")).await.unwrap();

        session.clear().await.unwrap();
        assert_eq!(session.snapshot().await, Session::default());
        assert!(store.get(keys::PHONE).await.unwrap().is_none());
        assert!(store.get(keys::PROFILE).await.unwrap().is_none());
    }
}

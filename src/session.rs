//! Session snapshot and the onboarding stage derived from it.
//!
//! The session is never cached between operations; every query rebuilds the
//! snapshot from the profile store so the derived stage always reflects what
//! is actually persisted.

use thiserror::Error;
use tracing::warn;

use crate::store::{ProfileStore, StoreError, keys};

/// Self-assessed player skill chosen during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// Authentication progress; only ever advances, except through full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Guest,
    Authenticated,
}

impl AuthState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Guest => "guest",
            Self::Authenticated => "authenticated",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "anonymous" => Some(Self::Anonymous),
            "guest" => Some(Self::Guest),
            "authenticated" => Some(Self::Authenticated),
            _ => None,
        }
    }
}

/// Onboarding steps, in the order the user must resolve them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SkillSetup,
    ApiKeySetup,
    LoginPending,
    Ready,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SkillSetup => "skill-setup",
            Self::ApiKeySetup => "api-key-setup",
            Self::LoginPending => "login-pending",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

/// A feature or transition was invoked outside its required stage.
///
/// Nothing is read or written once this is raised; the caller gets the
/// mismatch verbatim instead of a silently degraded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Requires the {required} stage, but the session is at {actual}")]
pub struct StateViolation {
    pub required: Stage,
    pub actual: Stage,
}

/// Snapshot of the persisted per-profile onboarding and auth progress.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub skill_level: Option<SkillLevel>,
    pub api_credential: Option<String>,
    pub api_setup_done: bool,
    pub auth_state: AuthState,
    pub auth_user: Option<String>,
}

impl Session {
    /// Rebuild the snapshot from the profile store.
    ///
    /// Unrecognized stored values are logged and treated as unset rather
    /// than wedging the profile in an unrepresentable state.
    pub fn load(store: &impl ProfileStore) -> Result<Self, StoreError> {
        let skill_level = match store.get(keys::SKILL_LEVEL)? {
            Some(raw) => {
                let parsed = SkillLevel::from_str(&raw);
                if parsed.is_none() {
                    warn!("Ignoring unrecognized stored skill level {raw:?}");
                }
                parsed
            }
            None => None,
        };
        let auth_state = match store.get(keys::AUTH_STATE)? {
            Some(raw) => {
                let parsed = AuthState::from_str(&raw);
                if parsed.is_none() {
                    warn!("Ignoring unrecognized stored auth state {raw:?}");
                }
                parsed.unwrap_or_default()
            }
            None => AuthState::Anonymous,
        };
        Ok(Self {
            skill_level,
            api_credential: store.get(keys::API_CREDENTIAL)?,
            api_setup_done: store.get(keys::API_SETUP_DONE)?.as_deref() == Some("1"),
            auth_state,
            auth_user: store.get(keys::AUTH_USER)?,
        })
    }

    /// The onboarding stage implied by this snapshot.
    pub fn stage(&self) -> Stage {
        if self.skill_level.is_none() {
            Stage::SkillSetup
        } else if !self.api_setup_done {
            Stage::ApiKeySetup
        } else if self.auth_state == AuthState::Anonymous {
            Stage::LoginPending
        } else {
            Stage::Ready
        }
    }
}

pub(crate) fn write_skill_level(
    store: &mut impl ProfileStore,
    level: SkillLevel,
) -> Result<(), StoreError> {
    store.set(keys::SKILL_LEVEL, level.as_str())
}

pub(crate) fn write_api_setup_done(store: &mut impl ProfileStore) -> Result<(), StoreError> {
    store.set(keys::API_SETUP_DONE, "1")
}

pub(crate) fn write_auth(
    store: &mut impl ProfileStore,
    state: AuthState,
    user: Option<&str>,
) -> Result<(), StoreError> {
    store.set(keys::AUTH_STATE, state.as_str())?;
    match user {
        Some(name) => store.set(keys::AUTH_USER, name),
        None => store.remove(keys::AUTH_USER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn fresh_profile_starts_at_skill_setup() {
        let store = MemoryStore::new();
        let session = Session::load(&store).unwrap();
        assert_eq!(session.stage(), Stage::SkillSetup);
        assert_eq!(session.auth_state, AuthState::Anonymous);
        assert!(session.skill_level.is_none());
        assert!(session.api_credential.is_none());
    }

    #[test]
    fn stage_advances_with_each_resolved_step() {
        let mut store = MemoryStore::new();
        write_skill_level(&mut store, SkillLevel::Intermediate).unwrap();
        assert_eq!(Session::load(&store).unwrap().stage(), Stage::ApiKeySetup);

        write_api_setup_done(&mut store).unwrap();
        assert_eq!(Session::load(&store).unwrap().stage(), Stage::LoginPending);

        write_auth(&mut store, AuthState::Guest, None).unwrap();
        assert_eq!(Session::load(&store).unwrap().stage(), Stage::Ready);
    }

    #[test]
    fn unrecognized_stored_values_read_as_unset() {
        let mut store = MemoryStore::new();
        store.set(keys::SKILL_LEVEL, "grandmaster").unwrap();
        store.set(keys::AUTH_STATE, "root").unwrap();
        let session = Session::load(&store).unwrap();
        assert!(session.skill_level.is_none());
        assert_eq!(session.auth_state, AuthState::Anonymous);
        assert_eq!(session.stage(), Stage::SkillSetup);
    }

    #[test]
    fn credential_alone_does_not_resolve_api_setup() {
        let mut store = MemoryStore::new();
        write_skill_level(&mut store, SkillLevel::Beginner).unwrap();
        store.set(keys::API_CREDENTIAL, "k".repeat(24).as_str()).unwrap();
        assert_eq!(Session::load(&store).unwrap().stage(), Stage::ApiKeySetup);
    }
}

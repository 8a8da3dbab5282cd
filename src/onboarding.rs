//! Onboarding transitions over the profile store.
//!
//! Each transition checks the current stage first, persists its session
//! mutation, and hands back the new stage plus the effects the presentation
//! layer should perform. The core never triggers a reload itself; it only
//! reports that one is due.

use thiserror::Error;
use tracing::info;

use crate::accounts::{self, AccountError};
use crate::session::{self, AuthState, Session, SkillLevel, Stage, StateViolation};
use crate::store::{ProfileStore, StoreError};

/// Follow-up work for the presentation layer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-render against the new session state.
    ReloadView,
    /// Drop transient UI state (selections, pending inputs, caches).
    ClearTransientState,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub stage: Stage,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    WrongStage(#[from] StateViolation),
    #[error("API credential rejected: {0}")]
    InvalidCredential(String),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Record the chosen skill level and move on to API key setup.
pub fn choose_skill(
    store: &mut impl ProfileStore,
    level: SkillLevel,
) -> Result<Transition, OnboardingError> {
    require_stage(store, Stage::SkillSetup)?;
    session::write_skill_level(store, level)?;
    info!("Skill level set to {}", level.as_str());
    finish(store)
}

/// Validate and persist an API credential, resolving the API setup step.
pub fn save_credential(
    store: &mut impl ProfileStore,
    credential: &str,
) -> Result<Transition, OnboardingError> {
    require_stage(store, Stage::ApiKeySetup)?;
    let credential = credential.trim();
    validate_credential(credential).map_err(OnboardingError::InvalidCredential)?;
    store.set(crate::store::keys::API_CREDENTIAL, credential)?;
    session::write_api_setup_done(store)?;
    info!("API credential saved");
    finish(store)
}

/// Resolve the API setup step without storing a credential.
pub fn skip_credential(store: &mut impl ProfileStore) -> Result<Transition, OnboardingError> {
    require_stage(store, Stage::ApiKeySetup)?;
    session::write_api_setup_done(store)?;
    info!("API credential setup skipped");
    finish(store)
}

/// Enter the dashboard without an account.
pub fn continue_as_guest(store: &mut impl ProfileStore) -> Result<Transition, OnboardingError> {
    require_stage(store, Stage::LoginPending)?;
    session::write_auth(store, AuthState::Guest, None)?;
    info!("Continuing as guest");
    finish(store)
}

/// Authenticate against the account registry and enter the dashboard.
pub fn login(
    store: &mut impl ProfileStore,
    name: &str,
    password: &str,
) -> Result<Transition, OnboardingError> {
    require_stage(store, Stage::LoginPending)?;
    accounts::verify_login(store, name, password)?;
    session::write_auth(store, AuthState::Authenticated, Some(name.trim()))?;
    info!("Logged in as {}", name.trim());
    finish(store)
}

fn require_stage(store: &impl ProfileStore, required: Stage) -> Result<(), OnboardingError> {
    let actual = Session::load(store)?.stage();
    if actual != required {
        return Err(StateViolation { required, actual }.into());
    }
    Ok(())
}

fn finish(store: &impl ProfileStore) -> Result<Transition, OnboardingError> {
    Ok(Transition {
        stage: Session::load(store)?.stage(),
        effects: vec![Effect::ReloadView],
    })
}

/// Opaque credentials must be long enough to be real and contain no
/// whitespace; anything else is rejected before touching the store.
fn validate_credential(credential: &str) -> Result<(), String> {
    if credential.is_empty() {
        return Err("credential is empty".to_string());
    }
    if credential.chars().count() < 20 {
        return Err("credential is too short".to_string());
    }
    if credential.chars().any(char::is_whitespace) {
        return Err("credential contains whitespace".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ready_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        choose_skill(&mut store, SkillLevel::Intermediate).unwrap();
        skip_credential(&mut store).unwrap();
        continue_as_guest(&mut store).unwrap();
        store
    }

    #[test]
    fn full_flow_reaches_ready() {
        let mut store = MemoryStore::new();
        let t = choose_skill(&mut store, SkillLevel::Beginner).unwrap();
        assert_eq!(t.stage, Stage::ApiKeySetup);
        assert_eq!(t.effects, vec![Effect::ReloadView]);

        let t = save_credential(&mut store, "abcdefghijklmnopqrstuvwx").unwrap();
        assert_eq!(t.stage, Stage::LoginPending);

        let t = continue_as_guest(&mut store).unwrap();
        assert_eq!(t.stage, Stage::Ready);
    }

    #[test]
    fn transitions_outside_their_stage_fail_fast() {
        let mut store = MemoryStore::new();
        let err = skip_credential(&mut store).unwrap_err();
        match err {
            OnboardingError::WrongStage(v) => {
                assert_eq!(v.required, Stage::ApiKeySetup);
                assert_eq!(v.actual, Stage::SkillSetup);
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = continue_as_guest(&mut store).unwrap_err();
        assert!(matches!(err, OnboardingError::WrongStage(_)));
    }

    #[test]
    fn choosing_skill_twice_is_rejected() {
        let mut store = MemoryStore::new();
        choose_skill(&mut store, SkillLevel::Beginner).unwrap();
        let err = choose_skill(&mut store, SkillLevel::Advanced).unwrap_err();
        assert!(matches!(err, OnboardingError::WrongStage(_)));
        assert_eq!(
            Session::load(&store).unwrap().skill_level,
            Some(SkillLevel::Beginner)
        );
    }

    #[test]
    fn short_or_spaced_credentials_are_rejected_without_writes() {
        let mut store = MemoryStore::new();
        choose_skill(&mut store, SkillLevel::Beginner).unwrap();

        let err = save_credential(&mut store, "short").unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidCredential(_)));
        let err = save_credential(&mut store, "with space padding out 20 chars").unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidCredential(_)));

        let session = Session::load(&store).unwrap();
        assert!(session.api_credential.is_none());
        assert_eq!(session.stage(), Stage::ApiKeySetup);
    }

    #[test]
    fn skip_leaves_credential_absent_but_resolves_step() {
        let mut store = MemoryStore::new();
        choose_skill(&mut store, SkillLevel::Advanced).unwrap();
        let t = skip_credential(&mut store).unwrap();
        assert_eq!(t.stage, Stage::LoginPending);
        let session = Session::load(&store).unwrap();
        assert!(session.api_credential.is_none());
        assert!(session.api_setup_done);
    }

    #[test]
    fn login_requires_a_registered_account() {
        let mut store = MemoryStore::new();
        choose_skill(&mut store, SkillLevel::Intermediate).unwrap();
        skip_credential(&mut store).unwrap();

        let err = login(&mut store, "nobody", "pw").unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Account(AccountError::UnknownUser(_))
        ));

        accounts::register(&mut store, "nobody", "pw", "n@example.com").unwrap();
        let t = login(&mut store, "nobody", "pw").unwrap();
        assert_eq!(t.stage, Stage::Ready);
        let session = Session::load(&store).unwrap();
        assert_eq!(session.auth_state, AuthState::Authenticated);
        assert_eq!(session.auth_user.as_deref(), Some("nobody"));
    }

    #[test]
    fn ready_profile_rejects_further_onboarding_steps() {
        let mut store = ready_store();
        let err = continue_as_guest(&mut store).unwrap_err();
        match err {
            OnboardingError::WrongStage(v) => assert_eq!(v.actual, Stage::Ready),
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Stage-gated application facade.
//!
//! [`EBridge`] owns the injected profile store and exposes the pure
//! query/command surface the presentation layer drives: onboarding
//! transitions, source selection, corpus assembly, tag generation, goal and
//! match management, and the guarded destructive actions. Every dashboard
//! feature checks the onboarding stage first and fails fast outside
//! `Ready`.

use thiserror::Error;
use time::Date;
use tracing::info;

use crate::classify::{Classifier, GatewayClassifier};
use crate::goals::{self, Goal, GoalError};
use crate::guard::{DELETE_KEYWORD, DestructiveGuard, Guarded, RESET_KEYWORD, run_guarded};
use crate::matches::{self, MatchError, MatchRecord, PlayerStats};
use crate::onboarding::{self, Effect, OnboardingError, Transition};
use crate::session::{Session, SkillLevel, Stage, StateViolation};
use crate::sources::{AnalysisCorpus, AnalysisSources, DataFile, SourceError};
use crate::store::{ProfileStore, StoreError, keys};
use crate::tags::{GeneratedTags, HeuristicRules, InsightTag, TagError, TagGenerator};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Gate(#[from] StateViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("Data file name must not be empty")]
    EmptyFileName,
}

/// The application core over one injected profile store.
pub struct EBridge<S: ProfileStore> {
    store: S,
    sources: AnalysisSources,
    tags: TagGenerator,
    classifier_override: Option<Box<dyn Classifier>>,
}

impl<S: ProfileStore> EBridge<S> {
    /// Wrap a store using the built-in heuristic rules.
    pub fn new(store: S) -> Self {
        Self::with_rules(store, HeuristicRules::default())
    }

    /// Wrap a store with a custom heuristic keyword table.
    pub fn with_rules(store: S, rules: HeuristicRules) -> Self {
        Self {
            store,
            sources: AnalysisSources::new(),
            tags: TagGenerator::new(rules),
            classifier_override: None,
        }
    }

    /// Substitute the classification backend; tests inject fakes here.
    pub fn set_classifier(&mut self, classifier: Box<dyn Classifier>) {
        self.classifier_override = Some(classifier);
    }

    /// Read-only view of the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Session queries and onboarding transitions
    // ------------------------------------------------------------------

    /// Current session snapshot.
    pub fn session(&self) -> Result<Session, AppError> {
        Ok(Session::load(&self.store)?)
    }

    /// Current onboarding stage.
    pub fn stage(&self) -> Result<Stage, AppError> {
        Ok(self.session()?.stage())
    }

    pub fn choose_skill(&mut self, level: SkillLevel) -> Result<Transition, OnboardingError> {
        onboarding::choose_skill(&mut self.store, level)
    }

    pub fn save_credential(&mut self, credential: &str) -> Result<Transition, OnboardingError> {
        onboarding::save_credential(&mut self.store, credential)
    }

    pub fn skip_credential(&mut self) -> Result<Transition, OnboardingError> {
        onboarding::skip_credential(&mut self.store)
    }

    pub fn register_account(
        &mut self,
        name: &str,
        password: &str,
        email: &str,
    ) -> Result<(), crate::accounts::AccountError> {
        crate::accounts::register(&mut self.store, name, password, email)
    }

    pub fn login(&mut self, name: &str, password: &str) -> Result<Transition, OnboardingError> {
        onboarding::login(&mut self.store, name, password)
    }

    pub fn continue_as_guest(&mut self) -> Result<Transition, OnboardingError> {
        onboarding::continue_as_guest(&mut self.store)
    }

    fn require_ready(&self) -> Result<(), AppError> {
        let actual = Session::load(&self.store)?.stage();
        if actual != Stage::Ready {
            return Err(StateViolation {
                required: Stage::Ready,
                actual,
            }
            .into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Data sources and corpus assembly
    // ------------------------------------------------------------------

    /// Store a data file under the `datasource-` namespace.
    pub fn upload_data_file(&mut self, name: &str, content: &str) -> Result<(), AppError> {
        self.require_ready()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::EmptyFileName);
        }
        self.store
            .set(&format!("{}{}", keys::DATA_FILE_PREFIX, name), content)?;
        Ok(())
    }

    /// Re-enumerate data files and return the refreshed listing.
    pub fn refresh_sources(&mut self) -> Result<&[DataFile], AppError> {
        self.require_ready()?;
        self.sources.refresh(&self.store)?;
        Ok(self.sources.files())
    }

    /// The listing as of the last refresh.
    pub fn data_files(&self) -> &[DataFile] {
        self.sources.files()
    }

    pub fn set_source_selected(&mut self, name: &str, selected: bool) -> Result<(), AppError> {
        self.require_ready()?;
        self.sources.set_selected(name, selected)?;
        Ok(())
    }

    pub fn select_all_sources(&mut self, selected: bool) -> Result<(), AppError> {
        self.require_ready()?;
        self.sources.select_all(selected);
        Ok(())
    }

    pub fn set_manual_entry(&mut self, text: Option<String>) -> Result<(), AppError> {
        self.require_ready()?;
        self.sources.set_manual_entry(text);
        Ok(())
    }

    /// Assemble the analysis corpus for the current selection.
    pub fn build_corpus(&self) -> Result<AnalysisCorpus, AppError> {
        self.require_ready()?;
        Ok(self.sources.build_corpus(&self.store)?)
    }

    // ------------------------------------------------------------------
    // Insight tags
    // ------------------------------------------------------------------

    /// Generate tags for one free-text note.
    pub fn generate_tags(&mut self, text: &str) -> Result<GeneratedTags, AppError> {
        self.require_ready()?;
        let credential = Session::load(&self.store)?.api_credential;
        let gateway;
        let classifier: Option<&dyn Classifier> = match &self.classifier_override {
            Some(boxed) => Some(boxed.as_ref()),
            None => match credential {
                Some(credential) => {
                    gateway = GatewayClassifier::new(credential);
                    Some(&gateway)
                }
                None => None,
            },
        };
        Ok(self.tags.generate(text, classifier)?)
    }

    /// Generate tags for every fragment of the current corpus.
    ///
    /// Fragments are processed in corpus order and the combined set is
    /// deduplicated by label, the first producing fragment winning. An
    /// empty corpus short-circuits to an empty tag set.
    pub fn analyze_corpus(&mut self) -> Result<Vec<InsightTag>, AppError> {
        let corpus = self.build_corpus()?;
        let mut insights: Vec<InsightTag> = Vec::new();
        for fragment in corpus.fragments {
            let generated = self.generate_tags(&fragment.text)?;
            for label in generated.labels {
                if insights.iter().all(|tag| tag.label != label) {
                    insights.push(InsightTag {
                        label,
                        origin: fragment.origin.clone(),
                    });
                }
            }
        }
        Ok(insights)
    }

    // ------------------------------------------------------------------
    // Goals and matches
    // ------------------------------------------------------------------

    pub fn goals(&self) -> Result<Vec<Goal>, AppError> {
        self.require_ready()?;
        Ok(goals::load_goals(&self.store)?)
    }

    pub fn add_goal(&mut self, goal: Goal) -> Result<(), AppError> {
        self.require_ready()?;
        goals::add_goal(&mut self.store, goal)?;
        Ok(())
    }

    /// Add a goal with the next free id assigned and zero progress.
    pub fn create_goal(
        &mut self,
        title: impl Into<String>,
        deadline: Date,
        description: impl Into<String>,
    ) -> Result<Goal, AppError> {
        self.require_ready()?;
        let existing = goals::load_goals(&self.store)?;
        let goal = Goal {
            id: goals::next_goal_id(&existing),
            title: title.into(),
            deadline,
            description: description.into(),
            progress: 0,
        };
        goals::add_goal(&mut self.store, goal.clone())?;
        Ok(goal)
    }

    pub fn update_goal_progress(&mut self, id: u64, progress: i64) -> Result<u8, AppError> {
        self.require_ready()?;
        Ok(goals::update_progress(&mut self.store, id, progress)?)
    }

    /// Delete one goal behind the typed-keyword guard.
    pub fn delete_goal(&mut self, id: u64, typed_input: &str) -> Result<Guarded<()>, AppError> {
        self.require_ready()?;
        let guard = DestructiveGuard::new(DELETE_KEYWORD);
        let outcome = run_guarded(&guard, typed_input, || {
            goals::remove_goal(&mut self.store, id)
        })?;
        if outcome.is_done() {
            info!("Deleted goal {id}");
        }
        Ok(outcome)
    }

    pub fn record_match(&mut self, record: MatchRecord) -> Result<PlayerStats, AppError> {
        self.require_ready()?;
        Ok(matches::record_match(&mut self.store, record)?)
    }

    pub fn recent_matches(&self) -> Result<Vec<MatchRecord>, AppError> {
        self.require_ready()?;
        Ok(matches::recent_matches(&self.store)?)
    }

    pub fn player_stats(&self) -> Result<PlayerStats, AppError> {
        self.require_ready()?;
        Ok(matches::player_stats(&self.store)?)
    }

    // ------------------------------------------------------------------
    // Full reset
    // ------------------------------------------------------------------

    /// Wipe the whole profile behind the typed-keyword guard.
    ///
    /// On confirmation every owned namespace is removed, transient
    /// selection and tag caches are dropped, and the onboarding machine is
    /// back at its initial stage.
    pub fn reset_app(&mut self, typed_input: &str) -> Result<Guarded<Transition>, AppError> {
        self.require_ready()?;
        let guard = DestructiveGuard::new(RESET_KEYWORD);
        let outcome = run_guarded(&guard, typed_input, || clear_profile(&mut self.store))?;
        match outcome {
            Guarded::Rejected(reason) => Ok(Guarded::Rejected(reason)),
            Guarded::Done(()) => {
                self.sources = AnalysisSources::new();
                self.tags.clear_cache();
                info!("Profile reset to initial state");
                Ok(Guarded::Done(Transition {
                    stage: Stage::SkillSetup,
                    effects: vec![Effect::ClearTransientState, Effect::ReloadView],
                }))
            }
        }
    }
}

fn clear_profile(store: &mut impl ProfileStore) -> Result<(), StoreError> {
    for key in keys::RESET_KEYS {
        store.remove(key)?;
    }
    for prefix in keys::RESET_PREFIXES {
        for key in store.list_keys(prefix)? {
            store.remove(&key)?;
        }
    }
    Ok(())
}

//! Insight tag generation from free-text performance notes.
//!
//! Generation prefers the external classification gateway and falls back to
//! a local keyword table when the call fails, so a non-empty note always
//! yields at least one tag. Results are cached for the session, keyed by the
//! exact input text — the cache key also discriminates superseded requests,
//! because a late response can only ever land under its own text.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{Classifier, ClassifyError};
use crate::sources::FragmentOrigin;

/// A short categorical insight derived from one corpus fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightTag {
    pub label: String,
    pub origin: FragmentOrigin,
}

/// Which path produced a set of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    External,
    Heuristic,
}

/// Labels generated for one input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTags {
    pub labels: Vec<String>,
    pub source: TagSource,
    /// True when served from the session cache without a new external call.
    pub cached: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("Cannot generate tags from empty input")]
    EmptyInput,
}

/// One keyword-to-tag mapping of the local classifier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub tag: String,
}

/// Configurable keyword table for the local heuristic classifier.
///
/// Config keys (TOML): `max_tags`, `default_tags`, `rules` (array of
/// `{ keyword, tag }` tables). The shipped default covers common
/// fighting-game performance vocabulary; deployments can replace it
/// wholesale with [`HeuristicRules::from_toml_str`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HeuristicRules {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default)]
    pub default_tags: Vec<String>,
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

fn default_max_tags() -> usize {
    3
}

impl HeuristicRules {
    /// Parse a rules file, falling back to built-in defaults for anything
    /// the document leaves out.
    pub fn from_toml_str(data: &str) -> Result<Self, toml::de::Error> {
        let rules: Self = toml::from_str(data)?;
        Ok(rules.normalized())
    }

    /// Replace degenerate settings so classification can never no-op.
    fn normalized(mut self) -> Self {
        if self.max_tags == 0 {
            self.max_tags = default_max_tags();
        }
        if self.default_tags.is_empty() {
            self.default_tags = builtin_default_tags();
        }
        self
    }

    /// Classify a text by substring match against the keyword table.
    ///
    /// Rules apply in table order, capped at `max_tags` distinct tags; a
    /// text matching nothing gets the default tags, so the result is never
    /// empty for any input.
    pub fn tags_for(&self, text: &str) -> Vec<String> {
        let mut labels = Vec::new();
        for rule in &self.rules {
            if labels.len() >= self.max_tags {
                break;
            }
            if text.contains(&rule.keyword) && !labels.contains(&rule.tag) {
                labels.push(rule.tag.clone());
            }
        }
        if labels.is_empty() {
            labels = self.default_tags.clone();
        }
        labels
    }
}

impl Default for HeuristicRules {
    fn default() -> Self {
        let rules = [
            // Defensive mechanics
            ("対空", "#対空反応遅れ"),
            ("anti-air", "#対空反応遅れ"),
            ("ガード", "#下段ガード"),
            ("block", "#下段ガード"),
            ("投げ抜け", "#投げ抜け失敗"),
            ("throw tech", "#投げ抜け失敗"),
            // Execution
            ("コンボ", "#コンボドロップ"),
            ("combo", "#コンボドロップ"),
            ("確反", "#確反取れず"),
            ("punish", "#確反取れず"),
            ("起き攻め", "#起き攻め対応"),
            ("okizeme", "#起き攻め対応"),
            // Neutral and tactics
            ("立ち回り", "#立ち回り改善"),
            ("neutral", "#立ち回り改善"),
            ("距離", "#距離管理"),
            ("spacing", "#距離管理"),
            ("読み", "#読み合い"),
            ("conditioning", "#読み合い"),
            ("飛び道具", "#対飛び道具"),
            ("fireball", "#対飛び道具"),
            // Resource management
            ("ゲージ", "#ゲージ管理"),
            ("バーンアウト", "#バーンアウト回避"),
            ("burnout", "#バーンアウト回避"),
            // Mental game
            ("焦り", "#メンタル管理"),
            ("tilt", "#メンタル管理"),
            ("判断", "#判断力向上"),
            ("集中", "#集中力維持"),
        ];
        Self {
            max_tags: default_max_tags(),
            default_tags: builtin_default_tags(),
            rules: rules
                .into_iter()
                .map(|(keyword, tag)| KeywordRule {
                    keyword: keyword.to_string(),
                    tag: tag.to_string(),
                })
                .collect(),
        }
    }
}

fn builtin_default_tags() -> Vec<String> {
    vec!["#試合振り返り".to_string(), "#気づき".to_string()]
}

/// Session-scoped tag generation with caching and graceful degradation.
#[derive(Debug, Default)]
pub struct TagGenerator {
    rules: HeuristicRules,
    cache: HashMap<String, (Vec<String>, TagSource)>,
}

impl TagGenerator {
    pub fn new(rules: HeuristicRules) -> Self {
        Self {
            rules: rules.normalized(),
            cache: HashMap::new(),
        }
    }

    /// Generate tags for one text fragment.
    ///
    /// A repeated call with identical text returns the cached labels
    /// without consulting the classifier again. External failures are
    /// logged and absorbed by the keyword fallback; the caller only ever
    /// sees an error for empty input.
    pub fn generate(
        &mut self,
        text: &str,
        classifier: Option<&dyn Classifier>,
    ) -> Result<GeneratedTags, TagError> {
        if text.trim().is_empty() {
            return Err(TagError::EmptyInput);
        }
        if let Some((labels, source)) = self.cache.get(text) {
            return Ok(GeneratedTags {
                labels: labels.clone(),
                source: *source,
                cached: true,
            });
        }

        let (labels, source) = match classifier {
            Some(classifier) => match classifier.classify(text) {
                Ok(labels) => (labels, TagSource::External),
                Err(err) => {
                    warn!("Classification call failed, using keyword fallback: {err}");
                    (self.rules.tags_for(text), TagSource::Heuristic)
                }
            },
            None => {
                debug!("No classifier configured, using keyword fallback");
                (self.rules.tags_for(text), TagSource::Heuristic)
            }
        };
        let labels = dedupe(labels);
        self.cache
            .insert(text.to_string(), (labels.clone(), source));
        Ok(GeneratedTags {
            labels,
            source,
            cached: false,
        })
    }

    /// Drop every cached result; used on full reset.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

fn dedupe(labels: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for label in labels {
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FailingClassifier {
        calls: Cell<usize>,
    }

    impl FailingClassifier {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
            }
        }
    }

    impl Classifier for FailingClassifier {
        fn classify(&self, _text: &str) -> Result<Vec<String>, ClassifyError> {
            self.calls.set(self.calls.get() + 1);
            Err(ClassifyError::Transport("connection refused".to_string()))
        }
    }

    struct FixedClassifier {
        labels: Vec<String>,
        calls: Cell<usize>,
    }

    impl FixedClassifier {
        fn new(labels: &[&str]) -> Self {
            Self {
                labels: labels.iter().map(|s| s.to_string()).collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Vec<String>, ClassifyError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.labels.clone())
        }
    }

    #[test]
    fn empty_input_is_a_validation_error() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.generate("", None), Err(TagError::EmptyInput));
        assert_eq!(generator.generate("  \n", None), Err(TagError::EmptyInput));
    }

    #[test]
    fn unavailable_classifier_still_yields_tags() {
        let mut generator = TagGenerator::default();
        let classifier = FailingClassifier::new();
        let tags = generator
            .generate("対空が出ずに負けた", Some(&classifier))
            .unwrap();
        assert_eq!(tags.source, TagSource::Heuristic);
        assert!(tags.labels.contains(&"#対空反応遅れ".to_string()));
        assert_eq!(classifier.calls.get(), 1);
    }

    #[test]
    fn any_nonempty_text_gets_at_least_one_tag() {
        let mut generator = TagGenerator::default();
        let tags = generator.generate("zzz nothing matches here", None).unwrap();
        assert!(!tags.labels.is_empty());
        assert_eq!(tags.labels, vec!["#試合振り返り", "#気づき"]);
    }

    #[test]
    fn repeated_text_is_served_from_cache_without_second_call() {
        let mut generator = TagGenerator::default();
        let classifier = FixedClassifier::new(&["#combo-drops"]);
        let first = generator.generate("combo drops", Some(&classifier)).unwrap();
        let second = generator.generate("combo drops", Some(&classifier)).unwrap();
        assert_eq!(first.labels, second.labels);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(classifier.calls.get(), 1);
    }

    #[test]
    fn external_labels_are_deduplicated() {
        let mut generator = TagGenerator::default();
        let classifier = FixedClassifier::new(&["#a", "#b", "#a"]);
        let tags = generator.generate("note", Some(&classifier)).unwrap();
        assert_eq!(tags.labels, vec!["#a", "#b"]);
    }

    #[test]
    fn heuristic_caps_at_max_tags() {
        let rules = HeuristicRules::default();
        let labels =
            rules.tags_for("コンボも確反も立ち回りも距離もゲージも全部だめだった");
        assert_eq!(labels.len(), rules.max_tags);
    }

    #[test]
    fn rules_load_from_toml_with_defaults_backfilled() {
        let rules = HeuristicRules::from_toml_str(
            r##"
            [[rules]]
            keyword = "whiff"
            tag = "#whiff-punish"
            "##,
        )
        .unwrap();
        assert_eq!(rules.tags_for("whiffed every poke"), vec!["#whiff-punish"]);
        assert_eq!(rules.tags_for("no match"), vec!["#試合振り返り", "#気づき"]);
        assert_eq!(rules.max_tags, 3);
    }

    #[test]
    fn cache_clear_forgets_previous_results() {
        let mut generator = TagGenerator::default();
        let classifier = FixedClassifier::new(&["#a"]);
        generator.generate("note", Some(&classifier)).unwrap();
        generator.clear_cache();
        let again = generator.generate("note", Some(&classifier)).unwrap();
        assert!(!again.cached);
        assert_eq!(classifier.calls.get(), 2);
    }
}

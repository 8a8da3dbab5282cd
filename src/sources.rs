//! Data-file discovery, selection and analysis corpus assembly.
//!
//! Uploaded data files live in the profile store under the
//! `datasource-` prefix. Selection is session state only; it is re-anchored
//! to the store on every refresh and the corpus is rebuilt from the store at
//! call time, so a stale listing can never leak into an analysis pass.

use thiserror::Error;

use crate::store::{ProfileStore, StoreError, keys};

/// One uploaded data file as visible to the analysis page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub name: String,
    pub content: String,
    /// Session-only inclusion flag; never persisted.
    pub selected: bool,
}

/// Where a corpus fragment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOrigin {
    File(String),
    ManualEntry,
}

impl std::fmt::Display for FragmentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(name) => f.write_str(name),
            Self::ManualEntry => f.write_str("manual-entry"),
        }
    }
}

/// One unit of source text within a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub origin: FragmentOrigin,
    pub text: String,
}

/// The ordered text fragments assembled for one tag-generation pass.
///
/// File fragments come first in ascending file-name order, the manual entry
/// (if any) last, so re-running generation on unchanged input yields the
/// same ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisCorpus {
    pub fragments: Vec<Fragment>,
}

impl AnalysisCorpus {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Selection referenced a file the current listing does not contain.
    #[error("Unknown data file {0:?}")]
    UnknownFile(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Listing and selection state for the analysis page.
#[derive(Debug, Default)]
pub struct AnalysisSources {
    files: Vec<DataFile>,
    manual_entry: Option<String>,
}

impl AnalysisSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-enumerate data files from the store.
    ///
    /// Files keep their selection if they still exist; vanished files drop
    /// out together with their selection. New files start deselected.
    pub fn refresh(&mut self, store: &impl ProfileStore) -> Result<(), SourceError> {
        let mut files = Vec::new();
        for key in store.list_keys(keys::DATA_FILE_PREFIX)? {
            let Some(content) = store.get(&key)? else {
                continue;
            };
            let name = key[keys::DATA_FILE_PREFIX.len()..].to_string();
            let selected = self
                .files
                .iter()
                .any(|file| file.selected && file.name == name);
            files.push(DataFile {
                name,
                content,
                selected,
            });
        }
        self.files = files;
        Ok(())
    }

    /// Currently listed files, ascending by name.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    /// Toggle a single file; unknown names change nothing.
    pub fn set_selected(&mut self, name: &str, selected: bool) -> Result<(), SourceError> {
        let file = self
            .files
            .iter_mut()
            .find(|file| file.name == name)
            .ok_or_else(|| SourceError::UnknownFile(name.to_string()))?;
        file.selected = selected;
        Ok(())
    }

    /// Uniformly select or deselect every listed file. Idempotent, and it
    /// can only ever touch files present in the current listing.
    pub fn select_all(&mut self, selected: bool) {
        for file in &mut self.files {
            file.selected = selected;
        }
    }

    /// Set or clear the manually entered text fragment.
    pub fn set_manual_entry(&mut self, text: Option<String>) {
        self.manual_entry = text.filter(|text| !text.trim().is_empty());
    }

    pub fn manual_entry(&self) -> Option<&str> {
        self.manual_entry.as_deref()
    }

    /// Assemble the corpus for the current selection.
    ///
    /// Contents are re-read from the store at call time; a selected file
    /// that has vanished since the listing aborts the build before anything
    /// is assembled. Zero selected files and no manual entry yield an empty
    /// corpus, not an error, so downstream stages can short-circuit.
    pub fn build_corpus(&self, store: &impl ProfileStore) -> Result<AnalysisCorpus, SourceError> {
        let mut fragments = Vec::new();
        for file in self.files.iter().filter(|file| file.selected) {
            let key = format!("{}{}", keys::DATA_FILE_PREFIX, file.name);
            let content = store
                .get(&key)?
                .ok_or_else(|| SourceError::UnknownFile(file.name.clone()))?;
            fragments.push(Fragment {
                origin: FragmentOrigin::File(file.name.clone()),
                text: content,
            });
        }
        if let Some(manual) = self.manual_entry.as_deref() {
            fragments.push(Fragment {
                origin: FragmentOrigin::ManualEntry,
                text: manual.to_string(),
            });
        }
        Ok(AnalysisCorpus { fragments })
    }
}

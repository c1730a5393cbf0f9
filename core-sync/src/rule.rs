//! # Sync Rules
//!
//! A [`Rule`] is the validated form of one configured person link: which people
//! must (or must not) appear, how the required people combine, and which album
//! receives the matches.
//!
//! Rules are built once per run, before any network call, so a malformed link
//! fails the whole run instead of surfacing halfway through.

use crate::{Result, SyncError};
use core_runtime::config::LinkConfig;
use serde::Serialize;
use std::collections::BTreeSet;

pub use core_runtime::config::RequiredOperation;

/// A sync scope: required/excluded people, exclusivity and the target album.
///
/// Invariant: the required set is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    required: BTreeSet<String>,
    operation: RequiredOperation,
    excluded: BTreeSet<String>,
    exclusive: bool,
    collection_id: String,
    scope_prefix: String,
    description: Option<String>,
}

impl Rule {
    /// Create a rule requiring `required` people, syncing into `collection_id`.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidRule`] when no non-blank person is given or the
    /// collection id is blank.
    pub fn new<I, S>(
        required: I,
        collection_id: impl Into<String>,
        scope_prefix: impl Into<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required = normalise(required);
        if required.is_empty() {
            return Err(SyncError::InvalidRule(
                "at least one required person is needed".to_string(),
            ));
        }

        let collection_id = collection_id.into();
        if collection_id.trim().is_empty() {
            return Err(SyncError::InvalidRule("album id cannot be empty".to_string()));
        }

        Ok(Self {
            required,
            operation: RequiredOperation::default(),
            excluded: BTreeSet::new(),
            exclusive: false,
            collection_id,
            scope_prefix: scope_prefix.into(),
            description: None,
        })
    }

    /// Build a rule from a configured link.
    ///
    /// `personIds` wins when present and non-empty; otherwise the legacy
    /// `personId` is used.
    pub fn from_link(link: &LinkConfig, scope_prefix: &str) -> Result<Self> {
        let label = link
            .description
            .as_deref()
            .unwrap_or(link.album_id.as_str());

        let persons: Vec<String> = match &link.person_ids {
            Some(ids) if ids.iter().any(|id| !id.trim().is_empty()) => ids.clone(),
            _ => link.person_id.iter().cloned().collect(),
        };

        let rule = Self::new(persons, link.album_id.clone(), scope_prefix)
            .map_err(|e| match e {
                SyncError::InvalidRule(msg) => {
                    SyncError::InvalidRule(format!("link '{}': {}", label, msg))
                }
                other => other,
            })?;

        Ok(rule
            .with_operation(link.operation)
            .excluding(link.exclude_person_ids.iter().cloned())
            .exclusive(link.exclude_others)
            .with_description(link.description.clone()))
    }

    pub fn with_operation(mut self, operation: RequiredOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Never select items containing any of these people.
    pub fn excluding<I, S>(mut self, people: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = normalise(people);
        self
    }

    /// Only select items whose people all belong to the required set.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn operation(&self) -> RequiredOperation {
        self.operation
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn scope_prefix(&self) -> &str {
        &self.scope_prefix
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Description if set, otherwise the album id.
    pub fn label(&self) -> &str {
        self.description().unwrap_or(&self.collection_id)
    }

    /// Checkpoint key for this rule.
    ///
    /// `{prefix}:{sorted persons}:{OR|AND}:{exclusive|}:{album}`. Any change to
    /// the persons, operation, exclusivity or album yields a new key, so the
    /// changed rule starts from the full history. Excluded persons are not part
    /// of the key.
    pub fn scope_key(&self) -> String {
        let persons: Vec<&str> = self.required.iter().map(String::as_str).collect();
        format!(
            "{}:{}:{}:{}:{}",
            self.scope_prefix,
            persons.join(","),
            self.operation.label(),
            if self.exclusive { "exclusive" } else { "" },
            self.collection_id
        )
    }

    /// Exclusions configured together with the exclusive flag add nothing.
    pub fn has_redundant_exclusions(&self) -> bool {
        self.exclusive && !self.excluded.is_empty()
    }

    /// People that are both required and excluded.
    pub fn conflicting_people(&self) -> Vec<&str> {
        self.required
            .intersection(&self.excluded)
            .map(String::as_str)
            .collect()
    }
}

fn normalise<I, S>(people: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    people
        .into_iter()
        .map(Into::into)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

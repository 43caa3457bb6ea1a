//! Concrete aggregate payloads
//!
//! Each entity kind implements [`Payload`]; repositories and services are
//! generic over it so no kind needs its own persistence or lifecycle code.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::MdrError;

/// Capability set every versioned entity kind provides
pub trait Payload:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Entity kind name, used in errors, logs and storage keys
    const KIND: &'static str;

    /// Prefix of generated uids (`<prefix>_000001`)
    const UID_PREFIX: &'static str;

    /// Human-meaningful uniqueness key within a library
    fn natural_key(&self) -> String;

    /// Shape checks run before the payload reaches persistence
    fn validate(&self) -> Result<(), MdrError>;

    /// Owning study, for study-scoped kinds
    fn study_uid(&self) -> Option<&str> {
        None
    }

    /// Owning project, for study-scoped kinds
    fn project_number(&self) -> Option<&str> {
        None
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<(), MdrError> {
    if value.trim().is_empty() {
        return Err(MdrError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_sentence_case(name: &str, sentence_case: &str) -> Result<(), MdrError> {
    if name.to_lowercase() != sentence_case.to_lowercase() {
        return Err(MdrError::validation(format!(
            "name_sentence_case '{}' must be identical to name '{}' except for casing",
            sentence_case, name
        )));
    }
    Ok(())
}

/// Check that `[Parameter]` placeholders are balanced, non-nested and named
fn validate_template_parameters(text: &str) -> Result<(), MdrError> {
    let mut open: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        match ch {
            '[' => {
                if open.is_some() {
                    return Err(MdrError::validation(format!(
                        "nested parameter at position {}",
                        idx
                    )));
                }
                open = Some(idx);
            }
            ']' => match open.take() {
                Some(start) if text[start + 1..idx].trim().is_empty() => {
                    return Err(MdrError::validation(format!(
                        "empty parameter at position {}",
                        start
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(MdrError::validation(format!(
                        "unbalanced ']' at position {}",
                        idx
                    )));
                }
            },
            _ => {}
        }
    }
    if let Some(start) = open {
        return Err(MdrError::validation(format!(
            "unclosed '[' at position {}",
            start
        )));
    }
    Ok(())
}

/// Objective template text with `[Parameter]` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveTemplate {
    pub name: String,
    #[serde(default)]
    pub guidance_text: Option<String>,
}

impl ObjectiveTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guidance_text: None,
        }
    }

    /// Names of the parameters referenced by the template text
    pub fn parameter_names(&self) -> Vec<&str> {
        self.name
            .split('[')
            .skip(1)
            .filter_map(|rest| rest.split_once(']').map(|(name, _)| name.trim()))
            .collect()
    }
}

impl Payload for ObjectiveTemplate {
    const KIND: &'static str = "ObjectiveTemplate";
    const UID_PREFIX: &'static str = "ObjectiveTemplate";

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), MdrError> {
        require_non_blank("name", &self.name)?;
        validate_template_parameters(&self.name)
    }
}

/// Name of a controlled terminology term within a codelist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtTermName {
    pub codelist_uid: String,
    pub name: String,
    pub name_sentence_case: String,
}

impl Payload for CtTermName {
    const KIND: &'static str = "CtTermName";
    const UID_PREFIX: &'static str = "CTTerm";

    fn natural_key(&self) -> String {
        format!("{}/{}", self.codelist_uid, self.name)
    }

    fn validate(&self) -> Result<(), MdrError> {
        require_non_blank("codelist_uid", &self.codelist_uid)?;
        require_non_blank("name", &self.name)?;
        require_sentence_case(&self.name, &self.name_sentence_case)
    }
}

/// Activity concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConcept {
    pub name: String,
    pub name_sentence_case: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

impl Payload for ActivityConcept {
    const KIND: &'static str = "ActivityConcept";
    const UID_PREFIX: &'static str = "Activity";

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), MdrError> {
        require_non_blank("name", &self.name)?;
        require_sentence_case(&self.name, &self.name_sentence_case)
    }
}

/// Selection of a library item into a study design
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySelection {
    pub study_uid: String,
    pub project_number: String,
    pub selected_uid: String,
    pub order: u32,
}

impl Payload for StudySelection {
    const KIND: &'static str = "StudySelection";
    const UID_PREFIX: &'static str = "StudySelection";

    fn natural_key(&self) -> String {
        format!("{}/{}", self.study_uid, self.selected_uid)
    }

    fn validate(&self) -> Result<(), MdrError> {
        require_non_blank("study_uid", &self.study_uid)?;
        require_non_blank("project_number", &self.project_number)?;
        require_non_blank("selected_uid", &self.selected_uid)?;
        if self.order == 0 {
            return Err(MdrError::validation("order is 1-based"));
        }
        Ok(())
    }

    fn study_uid(&self) -> Option<&str> {
        Some(&self.study_uid)
    }

    fn project_number(&self) -> Option<&str> {
        Some(&self.project_number)
    }
}

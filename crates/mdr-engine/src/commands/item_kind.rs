//! Entity kind names accepted at the command surface

use std::fmt;
use std::str::FromStr;

use mdr_core::errors::MdrError;
use mdr_core::model::{ActivityConcept, CtTermName, ObjectiveTemplate, Payload, StudySelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    ObjectiveTemplate,
    CtTermName,
    ActivityConcept,
    StudySelection,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::ObjectiveTemplate,
        ItemKind::CtTermName,
        ItemKind::ActivityConcept,
        ItemKind::StudySelection,
    ];

    /// Entity kind recorded in storage and error context
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::ObjectiveTemplate => ObjectiveTemplate::KIND,
            ItemKind::CtTermName => CtTermName::KIND,
            ItemKind::ActivityConcept => ActivityConcept::KIND,
            ItemKind::StudySelection => StudySelection::KIND,
        }
    }

    /// Short command-line name
    pub fn slug(&self) -> &'static str {
        match self {
            ItemKind::ObjectiveTemplate => "objective-template",
            ItemKind::CtTermName => "ct-term",
            ItemKind::ActivityConcept => "activity",
            ItemKind::StudySelection => "study-selection",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ItemKind {
    type Err = MdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s || kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = ItemKind::ALL.iter().map(|k| k.slug()).collect();
                MdrError::validation(format!(
                    "unknown item kind '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug_and_kind_name() {
        assert_eq!("ct-term".parse::<ItemKind>().unwrap(), ItemKind::CtTermName);
        assert_eq!("CtTermName".parse::<ItemKind>().unwrap(), ItemKind::CtTermName);
        assert_eq!(
            "objectivetemplate".parse::<ItemKind>().unwrap(),
            ItemKind::ObjectiveTemplate
        );
    }

    #[test]
    fn test_unknown_kind_lists_choices() {
        let err = "codelist".parse::<ItemKind>().unwrap_err();
        assert!(err.to_string().contains("study-selection"));
    }

    #[test]
    fn test_slug_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(kind.to_string().parse::<ItemKind>().unwrap(), kind);
        }
    }
}

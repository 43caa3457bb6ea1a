use serde::{Deserialize, Serialize};

/// A named partition owning aggregate roots
///
/// `is_editable` gates create and edit against the items it owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub is_editable: bool,
}

impl Library {
    pub fn new(name: impl Into<String>, is_editable: bool) -> Self {
        Self {
            name: name.into(),
            is_editable,
        }
    }
}

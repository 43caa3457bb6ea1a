//! Versioned entity state machine
//!
//! The transition table below is the single source for both the
//! possible-actions query and the guard every mutation passes through.

use crate::errors::MdrError;
use crate::model::{LibraryItemStatus, ObjectAction, Version};

/// Legal transitions: (from, action, to). `None` target means hard delete.
pub const TRANSITIONS: &[(LibraryItemStatus, ObjectAction, Option<LibraryItemStatus>)] = &[
    (
        LibraryItemStatus::Draft,
        ObjectAction::Edit,
        Some(LibraryItemStatus::Draft),
    ),
    (
        LibraryItemStatus::Draft,
        ObjectAction::Approve,
        Some(LibraryItemStatus::Final),
    ),
    (LibraryItemStatus::Draft, ObjectAction::Delete, None),
    (
        LibraryItemStatus::Final,
        ObjectAction::NewVersion,
        Some(LibraryItemStatus::Draft),
    ),
    (
        LibraryItemStatus::Final,
        ObjectAction::Retire,
        Some(LibraryItemStatus::Retired),
    ),
    (
        LibraryItemStatus::Retired,
        ObjectAction::Reactivate,
        Some(LibraryItemStatus::Final),
    ),
];

fn lookup(
    status: LibraryItemStatus,
    action: ObjectAction,
    has_final_ancestor: bool,
) -> Option<Option<LibraryItemStatus>> {
    if action == ObjectAction::Delete && has_final_ancestor {
        return None;
    }
    TRANSITIONS
        .iter()
        .find(|(from, a, _)| *from == status && *a == action)
        .map(|(_, _, to)| *to)
}

/// Actions valid from `status`, in table order
pub fn possible_actions(status: LibraryItemStatus, has_final_ancestor: bool) -> Vec<ObjectAction> {
    TRANSITIONS
        .iter()
        .filter(|(from, action, _)| {
            *from == status && lookup(status, *action, has_final_ancestor).is_some()
        })
        .map(|(_, action, _)| *action)
        .collect()
}

/// Resolve the target status of `action`, failing when it is not allowed
///
/// Returns `Ok(None)` for an allowed hard delete.
///
/// # Errors
///
/// `InvalidStateTransition` naming the current status and requested action.
pub fn ensure_allowed(
    action: ObjectAction,
    status: LibraryItemStatus,
    has_final_ancestor: bool,
    entity_kind: &str,
    uid: &str,
) -> Result<Option<LibraryItemStatus>, MdrError> {
    lookup(status, action, has_final_ancestor).ok_or_else(|| MdrError::InvalidStateTransition {
        entity_kind: entity_kind.to_string(),
        uid: uid.to_string(),
        status: status.to_string(),
        action: action.to_string(),
    })
}

/// Version number assigned by a transition
pub fn next_version(action: ObjectAction, current: Version) -> Version {
    match action {
        ObjectAction::Edit | ObjectAction::NewVersion => current.next_minor(),
        ObjectAction::Approve => current.next_major(),
        ObjectAction::Retire | ObjectAction::Reactivate | ObjectAction::Delete => current,
    }
}

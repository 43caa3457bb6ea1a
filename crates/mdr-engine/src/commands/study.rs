//! Multi-item study updates performed under the study lease

use mdr_core::errors::{ExError, MdrError};
use mdr_core::model::{ObjectAction, Payload, StudySelection};
use mdr_core::{GenericRepository, GenericService, ItemView};
use mdr_core_types::RequestContext;

/// Renumber the selections of `study_uid` to follow `ordered_uids`
///
/// Runs under the study lease. `ordered_uids` must name every current
/// selection of the study exactly once, and every selection whose position
/// changes must be an editable Draft; both are checked before any write.
pub fn reorder_study_selections<R>(
    svc: &GenericService<StudySelection, R>,
    request: &RequestContext,
    study_uid: &str,
    ordered_uids: &[String],
) -> Result<Vec<ItemView<StudySelection>>, ExError>
where
    R: GenericRepository<StudySelection>,
{
    svc.with_study_lease(request, study_uid, |svc| {
        let current = svc.get_by_study(study_uid)?;

        let mut known: Vec<&str> = current.iter().map(|v| v.uid.as_str()).collect();
        let mut given: Vec<&str> = ordered_uids.iter().map(String::as_str).collect();
        known.sort_unstable();
        given.sort_unstable();
        if known != given {
            return Err(MdrError::validation(format!(
                "ordered uids must list every selection of study '{}' exactly once",
                study_uid
            ))
            .into());
        }

        let mut moves = Vec::new();
        for (index, uid) in ordered_uids.iter().enumerate() {
            let order = index as u32 + 1;
            let view = current
                .iter()
                .find(|v| &v.uid == uid)
                .ok_or_else(|| MdrError::validation(format!("unknown selection '{}'", uid)))?;
            if view.payload.order == order {
                continue;
            }
            if !view.possible_actions.contains(&ObjectAction::Edit) {
                return Err(MdrError::InvalidStateTransition {
                    entity_kind: StudySelection::KIND.to_string(),
                    uid: uid.clone(),
                    status: view.status.to_string(),
                    action: ObjectAction::Edit.as_str().to_string(),
                }
                .into());
            }
            moves.push((view, order));
        }

        for (view, order) in moves {
            let payload = StudySelection {
                order,
                ..view.payload.clone()
            };
            svc.edit(
                request,
                &view.uid,
                payload,
                Some(format!("Moved to position {}", order)),
                view.lock_token,
            )?;
        }

        let mut reordered = svc.get_by_study(study_uid)?;
        reordered.sort_by_key(|v| v.payload.order);
        Ok(reordered)
    })
}

//! Canonical logging macros
//!
//! Every macro expands to a unit block, so it can stand as a statement or as
//! a match arm. Field names come from [`schema`](crate::logging_facility::schema).

/// Emit one lifecycle event with the canonical component/op/event fields
#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $op:expr, $event:ident, $($field:tt)*) => {
        $crate::logging_facility::__tracing::event!(
            target: module_path!(),
            $crate::logging_facility::__tracing::Level::$level,
            {
                { $crate::logging_facility::schema::FIELD_COMPONENT } = module_path!(),
                { $crate::logging_facility::schema::FIELD_OP } = $op,
                { $crate::logging_facility::schema::FIELD_EVENT } = $crate::logging_facility::schema::$event,
                $($field)*
            }
        )
    };
}

/// Log the start of an operation
///
/// The `entity_kind = .., uid = ..` form records the item being touched;
/// `uid` may be an `Option`, in which case `None` is left out.
///
/// # Example
///
/// ```
/// # use mdr_core::log_op_start;
/// log_op_start!("approve");
/// log_op_start!("approve", entity_kind = "ObjectiveTemplate", uid = Some("ObjectiveTemplate_000001"));
/// log_op_start!("approve", request_id = "r-1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {{
        $crate::__log_op_event!(INFO, $op, EVENT_START,);
    }};
    ($op:expr, entity_kind = $kind:expr, uid = $uid:expr $(, $($field:tt)*)?) => {{
        $crate::__log_op_event!(
            INFO, $op, EVENT_START,
            { $crate::logging_facility::schema::FIELD_ENTITY_KIND } = $kind,
            { $crate::logging_facility::schema::FIELD_UID } = $uid,
            $($($field)*)?
        );
    }};
    ($op:expr, $($field:tt)*) => {{
        $crate::__log_op_event!(INFO, $op, EVENT_START, $($field)*);
    }};
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use mdr_core::log_op_end;
/// log_op_end!("approve", duration_ms = 42);
/// log_op_end!("approve", duration_ms = 42, entity_kind = "CTTermName", uid = None::<&str>);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {{
        $crate::__log_op_event!(
            INFO, $op, EVENT_END,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
        );
    }};
    ($op:expr, duration_ms = $duration:expr, entity_kind = $kind:expr, uid = $uid:expr $(, $($field:tt)*)?) => {{
        $crate::__log_op_event!(
            INFO, $op, EVENT_END,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
            { $crate::logging_facility::schema::FIELD_ENTITY_KIND } = $kind,
            { $crate::logging_facility::schema::FIELD_UID } = $uid,
            $($($field)*)?
        );
    }};
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        $crate::__log_op_event!(
            INFO, $op, EVENT_END,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
            $($field)*
        );
    }};
}

/// Log an operation error
///
/// `$err` is anything convertible into [`ExError`](crate::errors::ExError);
/// its kind and stable code are recorded.
///
/// # Example
///
/// ```
/// # use mdr_core::{log_op_error, errors::MdrError};
/// let err = MdrError::LibraryNotEditable { library: "CDISC".to_string() };
/// log_op_error!("create", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_op_event!(
            ERROR, $op, EVENT_END_ERROR,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
            { $crate::logging_facility::schema::FIELD_ERR_KIND } = ?ex_err.kind(),
            { $crate::logging_facility::schema::FIELD_ERR_CODE } = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, entity_kind = $kind:expr, uid = $uid:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_op_event!(
            ERROR, $op, EVENT_END_ERROR,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
            { $crate::logging_facility::schema::FIELD_ERR_KIND } = ?ex_err.kind(),
            { $crate::logging_facility::schema::FIELD_ERR_CODE } = ex_err.code(),
            { $crate::logging_facility::schema::FIELD_ENTITY_KIND } = $kind,
            { $crate::logging_facility::schema::FIELD_UID } = $uid,
            $($($field)*)?
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_op_event!(
            ERROR, $op, EVENT_END_ERROR,
            { $crate::logging_facility::schema::FIELD_DURATION_MS } = $duration,
            { $crate::logging_facility::schema::FIELD_ERR_KIND } = ?ex_err.kind(),
            { $crate::logging_facility::schema::FIELD_ERR_CODE } = ex_err.code(),
            $($field)*
        );
    }};
}

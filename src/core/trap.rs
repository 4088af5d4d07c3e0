//! Panic trap for user callbacks.
//!
//! Every mapper, predicate, consumer and hook the engine invokes is wrapped
//! in [`trap`]: a panic is caught, its payload downcast to a string where
//! possible, and converted into
//! [`StreamError::CallbackPanic`](crate::StreamError::CallbackPanic). The
//! failure then travels the normal terminal-error path instead of unwinding
//! through the subscription machinery.
//!
//! `AssertUnwindSafe` is used deliberately: operator state touched by a
//! panicking callback is discarded right after, because the trap's caller
//! terminates the subscription.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::StreamError;

/// Runs `f`, converting a panic into a terminal error.
pub(crate) fn trap<R>(f: impl FnOnce() -> R) -> Result<R, StreamError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => Err(StreamError::CallbackPanic {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_passes_value_through() {
        assert_eq!(trap(|| 41 + 1).expect("no panic"), 42);
    }

    #[test]
    fn test_trap_captures_str_payload() {
        let err = trap(|| -> i32 { panic!("boom") }).expect_err("must trap");
        match err {
            StreamError::CallbackPanic { message } => assert_eq!(message, "boom"),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_trap_captures_string_payload() {
        let err = trap(|| -> i32 { panic!("{}", String::from("dynamic")) }).expect_err("must trap");
        match err {
            StreamError::CallbackPanic { message } => assert_eq!(message, "dynamic"),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}

//! Assertions shared by unit tests and `#[pg_test]`s

use crate::error::{ErrorKind, PirogueResult};

/// Assert that generation failed with the SQLSTATE PostgreSQL will report.
///
/// # Panics
/// Panics if the result is `Ok` or carries another SQLSTATE.
pub fn assert_error_sqlstate<T>(result: PirogueResult<T>, expected_sqlstate: &str) {
    match result {
        Err(e) => assert_eq!(
            e.sqlstate(),
            expected_sqlstate,
            "Expected SQLSTATE {expected_sqlstate} ({:?}), got: {e}",
            e.kind()
        ),
        Ok(_) => panic!("Expected SQLSTATE {expected_sqlstate}, but generation succeeded"),
    }
}

/// # Panics
/// Panics if the result is `Ok` or the error is of another kind.
pub fn assert_error_kind<T>(
    result: PirogueResult<T>,
    expected_kind: ErrorKind,
) {
    match result {
        Err(e) => {
            assert_eq!(e.kind(), expected_kind, "Unexpected error kind for: {e}");
        }
        Ok(_) => {
            panic!("Expected {expected_kind:?} error, but operation succeeded");
        }
    }
}

/// # Panics
/// Panics if the result is `Ok` (operation succeeded when error was expected).
pub fn assert_error_contains<T>(
    result: PirogueResult<T>,
    expected_substring: &str,
) {
    match result {
        Err(e) => {
            let message = e.to_string();
            assert!(
                message.contains(expected_substring),
                "Error message '{message}' does not contain '{expected_substring}'"
            );
        }
        Ok(_) => {
            panic!("Expected error containing '{expected_substring}', but operation succeeded");
        }
    }
}

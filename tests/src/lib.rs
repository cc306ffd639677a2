//! Integration tests live in `tests/`, grouped by the client API they exercise.

//! Exit code constants for the flockwork CLI.
//!
//! - 0: Success (queue exhausted or nothing to do)
//! - 1: User error (bad args, invalid config, missing work dir)
//! - 2: Task failure (caller logic returned an error)
//! - 3: Corruption (undecodable deque/record data, malformed status table)
//! - 4: Lock failure (contended non-blocking lock, identity already in use)
//! - 130: Interrupted by a signal

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration or state.
pub const USER_ERROR: i32 = 1;

/// A task's logic failed; its slot was left claimed.
pub const TASK_FAILURE: i32 = 2;

/// Persistent data could not be decoded.
pub const CORRUPTION: i32 = 3;

/// Lock acquisition failure.
pub const LOCK_FAILURE: i32 = 4;

/// Interrupted by SIGINT/SIGTERM.
pub const INTERRUPTED: i32 = 130;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            TASK_FAILURE,
            CORRUPTION,
            LOCK_FAILURE,
            INTERRUPTED,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_fit_in_a_byte() {
        for code in [SUCCESS, USER_ERROR, TASK_FAILURE, CORRUPTION, LOCK_FAILURE, INTERRUPTED] {
            assert!((0..=255).contains(&code));
        }
    }
}

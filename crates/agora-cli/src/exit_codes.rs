//! Exit codes of the `agora-authz` binary.
//! Scripts branch on these; keep them stable.

pub const SUCCESS: i32 = 0; // Allowed (or informational command succeeded)
pub const CONFIG_ERROR: i32 = 2; // Bad configuration, unreadable input, internal error
pub const DENIED: i32 = 3; // Authorization denied

/// Exit code for an authorization verdict.
pub fn for_verdict(allow: bool) -> i32 {
    if allow {
        SUCCESS
    } else {
        DENIED
    }
}

//! Cache namespace names.
//!
//! A namespace groups keys that share a TTL policy and invalidation
//! rules. Every namespace used anywhere in the system is declared here.

/// Best recorded time per (member, style). Keyed by member id.
pub const BEST_TIMES: &str = "best_times";

/// Squad membership groupings. Keyed by squad id.
pub const MEMBER_ROSTER: &str = "member_roster";

/// Season-wide statistical reports. Cleared by prefix; report keys vary.
pub const REPORTS: &str = "reports";

/// In-progress markers for background recompute jobs. Reserved for the
/// worker; never read by the request path.
pub const JOB_MARKERS: &str = "job_markers";

use crate::Secret;

/// Upper bound no configuration can lift for history reads.
pub const RECENT_ENTRIES_HARD_CEILING: u64 = 200;

#[inline]
pub(crate) fn _default_database_url() -> Secret<String> {
    Secret::new("sqlite:data/db".to_owned())
}

pub(crate) const fn _default_recent_entries() -> u64 {
    50
}

pub(crate) const fn _default_max_recent_entries() -> u64 {
    RECENT_ENTRIES_HARD_CEILING
}

pub(crate) const fn _default_conflict_retries() -> u32 {
    3
}

pub(crate) const fn _default_issue_attempts() -> u32 {
    3
}

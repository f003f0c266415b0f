//! Whole-record last-write-wins resolution for one mapped item.

use chrono::{DateTime, Utc};

/// Which way content flows for a mapped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Local replaces remote.
    Push,
    /// Remote replaces local.
    Pull,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub resolution: Resolution,
    /// Both sides changed since the watermarks.
    pub conflict: bool,
}

/// Has the remote side moved past its watermark? A missing current
/// timestamp never counts as a change; a missing watermark with a present
/// timestamp always does.
fn remote_changed(current: Option<DateTime<Utc>>, watermark: Option<DateTime<Utc>>) -> bool {
    match (current, watermark) {
        (Some(now), Some(seen)) => now > seen,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Decide the direction for one item.
///
/// When both sides changed the current timestamps are compared directly:
/// strictly later wins, a tie goes to remote.
pub fn resolve(
    local_updated: DateTime<Utc>,
    local_watermark: DateTime<Utc>,
    remote_updated: Option<DateTime<Utc>>,
    remote_watermark: Option<DateTime<Utc>>,
) -> Decision {
    let local_changed = local_updated > local_watermark;
    let remote_changed = remote_changed(remote_updated, remote_watermark);

    let resolution = match (local_changed, remote_changed) {
        (false, false) => Resolution::Noop,
        (true, false) => Resolution::Push,
        (false, true) => Resolution::Pull,
        (true, true) => match remote_updated {
            Some(remote) if local_updated > remote => Resolution::Push,
            _ => Resolution::Pull,
        },
    };

    Decision {
        resolution,
        conflict: local_changed && remote_changed,
    }
}

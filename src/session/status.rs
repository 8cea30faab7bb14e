//! Status classification and registry filter predicates.
//!
//! Both functions are pure: they look only at the session flags and the
//! engine counters handed to them.

use super::SessionFlags;
use crate::engine::TorrentStats;
use crate::types::{StateFilter, Status};

/// Classify a session; the first matching rule wins
///
/// 1. active and fetching metadata: `GetMetainfo`
/// 2. paused: `Stopped`
/// 3. metadata unknown: `Unknown`
/// 4. active, connected peers, bytes missing: `Downloading`
/// 5. active, seeding, connected peers, nothing missing: `Seeding`
/// 6. no connected peers, nothing missing: `Completed`
/// 7. anything else: `Unknown`
pub fn classify(flags: &SessionFlags, has_info: bool, stats: &TorrentStats) -> Status {
    if flags.active && flags.fetching_metadata {
        return Status::GetMetainfo;
    }
    if flags.paused {
        return Status::Stopped;
    }
    if !has_info {
        return Status::Unknown;
    }
    if is_downloading(flags, stats) {
        return Status::Downloading;
    }
    if is_seeding(flags, stats) {
        return Status::Seeding;
    }
    if is_completed(stats) {
        return Status::Completed;
    }
    Status::Unknown
}

/// Whether a session belongs to a filter class
pub fn matches_filter(filter: StateFilter, flags: &SessionFlags, stats: &TorrentStats) -> bool {
    match filter {
        StateFilter::Downloading => is_downloading(flags, stats),
        StateFilter::Seeding => is_seeding(flags, stats),
        StateFilter::Completed => is_completed(stats),
        StateFilter::Paused => flags.paused,
        StateFilter::Active => flags.active,
        StateFilter::Inactive => {
            flags.active && stats.active_peers == 0 && stats.bytes_missing > 0
        }
        StateFilter::Errored => flags.errored,
    }
}

fn is_downloading(flags: &SessionFlags, stats: &TorrentStats) -> bool {
    flags.active && !flags.fetching_metadata && stats.active_peers > 0 && stats.bytes_missing > 0
}

fn is_seeding(flags: &SessionFlags, stats: &TorrentStats) -> bool {
    flags.active && stats.seeding && stats.active_peers > 0 && stats.bytes_missing == 0
}

fn is_completed(stats: &TorrentStats) -> bool {
    stats.active_peers == 0 && stats.bytes_missing == 0
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn flags(active: bool, paused: bool, fetching: bool) -> SessionFlags {
        SessionFlags {
            active,
            paused,
            errored: false,
            fetching_metadata: fetching,
            label: None,
            max_connections: 80,
            upload_unlimited: false,
        }
    }

    fn stats(active_peers: u32, bytes_missing: u64, seeding: bool) -> TorrentStats {
        TorrentStats {
            active_peers,
            total_peers: active_peers + 3,
            bytes_completed: 100,
            bytes_missing,
            length: Some(100 + bytes_missing),
            seeding,
            bytes_uploaded: 0,
        }
    }

    #[test]
    fn active_and_fetching_is_get_metainfo_even_when_paused() {
        let status = classify(&flags(true, true, true), false, &stats(3, 10, false));
        assert_eq!(status, Status::GetMetainfo);
    }

    #[test]
    fn paused_beats_everything_below_it() {
        let status = classify(&flags(false, true, false), true, &stats(3, 10, false));
        assert_eq!(status, Status::Stopped);

        // Inactive and still fetching falls through rule 1 to rule 2
        let status = classify(&flags(false, true, true), false, &stats(0, 0, false));
        assert_eq!(status, Status::Stopped);
    }

    #[test]
    fn missing_metadata_is_unknown() {
        let status = classify(&flags(false, false, true), false, &stats(0, 0, false));
        assert_eq!(status, Status::Unknown);
    }

    #[test]
    fn peers_and_missing_bytes_is_downloading() {
        let status = classify(&flags(true, false, false), true, &stats(4, 1024, false));
        assert_eq!(status, Status::Downloading);
    }

    #[test]
    fn seeding_with_peers_and_nothing_missing_is_seeding() {
        let status = classify(&flags(true, false, false), true, &stats(2, 0, true));
        assert_eq!(status, Status::Seeding);
    }

    #[test]
    fn no_peers_and_nothing_missing_is_completed() {
        let status = classify(&flags(true, false, false), true, &stats(0, 0, false));
        assert_eq!(status, Status::Completed);
    }

    #[test]
    fn no_peers_with_missing_bytes_is_unknown() {
        let status = classify(&flags(true, false, false), true, &stats(0, 50, false));
        assert_eq!(status, Status::Unknown);
    }

    #[test]
    fn peers_nothing_missing_not_seeding_is_unknown() {
        let status = classify(&flags(true, false, false), true, &stats(2, 0, false));
        assert_eq!(status, Status::Unknown);
    }

    #[test]
    fn filters_follow_their_predicates() {
        let downloading = (flags(true, false, false), stats(4, 10, false));
        let stalled = (flags(true, false, false), stats(0, 10, false));
        let stopped = (flags(false, true, false), stats(0, 10, false));
        let mut errored = flags(true, false, false);
        errored.errored = true;

        assert!(matches_filter(
            StateFilter::Downloading,
            &downloading.0,
            &downloading.1
        ));
        assert!(!matches_filter(StateFilter::Inactive, &downloading.0, &downloading.1));
        assert!(matches_filter(StateFilter::Inactive, &stalled.0, &stalled.1));
        assert!(matches_filter(StateFilter::Active, &stalled.0, &stalled.1));
        assert!(matches_filter(StateFilter::Paused, &stopped.0, &stopped.1));
        assert!(!matches_filter(StateFilter::Active, &stopped.0, &stopped.1));
        assert!(matches_filter(StateFilter::Errored, &errored, &stalled.1));
        assert!(matches_filter(
            StateFilter::Completed,
            &flags(false, false, false),
            &stats(0, 0, false)
        ));
        assert!(matches_filter(
            StateFilter::Seeding,
            &flags(true, false, false),
            &stats(1, 0, true)
        ));
    }
}

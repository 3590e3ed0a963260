//! Pure GC-time computation (`spec.md` §4.9), colocated and tested the way
//! `storage-operator/src/clusters/planner.rs` tests its timing decisions.

use chrono::{DateTime, Utc};
use console_types::ConsolePhase;

/// Computes the instant at which a Console becomes eligible for deletion.
/// `Running` has no GC time: the reconciler keeps probing until the
/// Console leaves that phase.
pub fn gc_time(
    phase: Option<ConsolePhase>,
    creation_time: DateTime<Utc>,
    completion_time: Option<DateTime<Utc>>,
    expiry_time: DateTime<Utc>,
    ttl_before_running: chrono::Duration,
    ttl_after_finished: chrono::Duration,
) -> Option<DateTime<Utc>> {
    match phase {
        None | Some(ConsolePhase::PendingAuthorisation) | Some(ConsolePhase::Pending) => {
            Some(creation_time + ttl_before_running)
        }
        Some(ConsolePhase::Running) => None,
        Some(ConsolePhase::Stopped) | Some(ConsolePhase::Destroyed) => {
            Some(completion_time.unwrap_or(expiry_time) + ttl_after_finished)
        }
    }
}

pub fn gc_eligible(gc: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    gc.is_some_and(|gc| now >= gc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn pre_running_phases_gc_from_creation() {
        let creation = t(1_000);
        for phase in [None, Some(ConsolePhase::PendingAuthorisation), Some(ConsolePhase::Pending)] {
            let gc = gc_time(
                phase,
                creation,
                None,
                t(5_000),
                chrono::Duration::seconds(3_600),
                chrono::Duration::seconds(86_400),
            );
            assert_eq!(gc, Some(t(1_000 + 3_600)));
        }
    }

    #[test]
    fn running_has_no_gc() {
        let gc = gc_time(
            Some(ConsolePhase::Running),
            t(0),
            None,
            t(5_000),
            chrono::Duration::seconds(3_600),
            chrono::Duration::seconds(86_400),
        );
        assert_eq!(gc, None);
    }

    #[test]
    fn stopped_prefers_completion_time_over_expiry() {
        let gc = gc_time(
            Some(ConsolePhase::Stopped),
            t(0),
            Some(t(2_000)),
            t(5_000),
            chrono::Duration::seconds(3_600),
            chrono::Duration::seconds(86_400),
        );
        assert_eq!(gc, Some(t(2_000 + 86_400)));
    }

    #[test]
    fn stopped_falls_back_to_expiry_when_timed_out() {
        let gc = gc_time(
            Some(ConsolePhase::Stopped),
            t(0),
            None,
            t(5_000),
            chrono::Duration::seconds(3_600),
            chrono::Duration::seconds(86_400),
        );
        assert_eq!(gc, Some(t(5_000 + 86_400)));
    }

    #[test]
    fn eligibility_is_a_now_comparison() {
        let gc = Some(t(100));
        assert!(!gc_eligible(gc, t(99)));
        assert!(gc_eligible(gc, t(100)));
        assert!(gc_eligible(gc, t(101)));
    }

    #[test]
    fn monotonic_across_phase_progression() {
        // Moving from Pending to Stopped never moves the GC deadline earlier
        // than what Stopped alone would compute from the same expiry.
        let creation = t(0);
        let expiry = t(3_600);
        let pending_gc = gc_time(
            Some(ConsolePhase::Pending),
            creation,
            None,
            expiry,
            chrono::Duration::seconds(3_600),
            chrono::Duration::seconds(86_400),
        )
        .unwrap();
        let stopped_gc = gc_time(
            Some(ConsolePhase::Stopped),
            creation,
            None,
            expiry,
            chrono::Duration::seconds(3_600),
            chrono::Duration::seconds(86_400),
        )
        .unwrap();
        assert!(stopped_gc > pending_gc);
    }
}

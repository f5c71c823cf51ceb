//! Queue-name and routing-key formulas.
//!
//! The broker topology is owned by upstream services; the runner only needs
//! to derive the per-invocation names the same way everyone else does.
//! Keeping the formulas in one place is the whole point of this module.

/// Routing key for job-update envelopes.
pub const UPDATES_KEY: &str = "jobs.updates";

/// Queue the runner consumes stop requests from.
pub fn stop_queue_name(invocation_id: &str) -> String {
    format!("strider-stop-request-{invocation_id}")
}

/// Routing key for stop requests.
pub fn stop_request_key(invocation_id: &str) -> String {
    format!("events.jobs.stops.{invocation_id}")
}

/// Queue the runner consumes time-limit deltas from.
pub fn time_limit_delta_queue_name(invocation_id: &str) -> String {
    format!("strider-timelimit-delta-{invocation_id}")
}

/// Routing key for time-limit deltas.
pub fn time_limit_delta_key(invocation_id: &str) -> String {
    format!("events.jobs.timelimits.deltas.{invocation_id}")
}

/// Queue the runner consumes time-limit queries from.
pub fn time_limit_request_queue_name(invocation_id: &str) -> String {
    format!("strider-timelimit-request-{invocation_id}")
}

/// Routing key for time-limit queries.
pub fn time_limit_request_key(invocation_id: &str) -> String {
    format!("events.jobs.timelimits.requests.{invocation_id}")
}

/// Queue bound to the time-limit responses the runner itself publishes.
///
/// The runner consumes this queue only so the broker tears it down when the
/// consumer goes away with the process.
pub fn time_limit_response_queue_name(invocation_id: &str) -> String {
    format!("strider-timelimit-response-{invocation_id}")
}

/// Routing key for time-limit responses.
pub fn time_limit_response_key(invocation_id: &str) -> String {
    format!("events.jobs.timelimits.responses.{invocation_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_embed_the_invocation_id() {
        let inv = "07b04ce2-7757-4b21-9e15-0b4c2f44be26";

        assert_eq!(stop_queue_name(inv), format!("strider-stop-request-{inv}"));
        assert_eq!(stop_request_key(inv), format!("events.jobs.stops.{inv}"));
        assert_eq!(
            time_limit_delta_key(inv),
            format!("events.jobs.timelimits.deltas.{inv}")
        );
        assert_eq!(
            time_limit_response_key(inv),
            format!("events.jobs.timelimits.responses.{inv}")
        );
    }

    #[test]
    fn queue_names_differ_per_subscription() {
        let inv = "abc";
        let names = [
            stop_queue_name(inv),
            time_limit_delta_queue_name(inv),
            time_limit_request_queue_name(inv),
            time_limit_response_queue_name(inv),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}

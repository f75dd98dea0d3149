//! Gossip Module Tests
//!
//! Validates the wire format of the protocol DTOs and the adaptive
//! protocol-period timing.

#[cfg(test)]
mod tests {
    use crate::error::ProtocolError;
    use crate::gossip::protocol::*;
    use crate::gossip::timing::{ProtocolTiming, TimingWindow};
    use crate::membership::types::{Change, Member, MemberStatus};
    use std::time::Duration;

    // ============================================================
    // WIRE FORMAT
    // ============================================================

    #[test]
    fn test_ping_request_wire_format() {
        let request = PingRequest {
            source: "127.0.0.1:3000".to_string(),
            checksum: 42,
            changes: vec![Change::new("127.0.0.1:3001", MemberStatus::Suspect, 7)],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["source"], "127.0.0.1:3000");
        assert_eq!(json["checksum"], 42);
        assert_eq!(json["changes"][0]["address"], "127.0.0.1:3001");
        assert_eq!(json["changes"][0]["status"], "suspect");
        assert_eq!(json["changes"][0]["incarnationNumber"], 7);
        // Piggyback bookkeeping must not cross the wire.
        assert!(json["changes"][0].get("piggybackCount").is_none());
    }

    #[test]
    fn test_join_reply_wire_format() {
        let reply = JoinResponse {
            app: "search".to_string(),
            coordinator: "127.0.0.1:3000".to_string(),
            membership: vec![Member {
                address: "127.0.0.1:3000".to_string(),
                status: MemberStatus::Alive,
                incarnation_number: 99,
            }],
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["coordinator"], "127.0.0.1:3000");
        assert_eq!(json["membership"][0]["status"], "alive");
        assert_eq!(json["membership"][0]["incarnationNumber"], 99);
    }

    #[test]
    fn test_ping_req_round_trip() {
        let request = PingReqRequest {
            source: "127.0.0.1:3000".to_string(),
            target: "127.0.0.1:3002".to_string(),
            checksum: 7,
            changes: vec![],
        };
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: PingReqRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.target, "127.0.0.1:3002");

        let reply = PingReqResponse {
            changes: vec![Change::new("127.0.0.1:3002", MemberStatus::Alive, 3)],
            ping_status: true,
            target: "127.0.0.1:3002".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["pingStatus"], true);
    }

    #[test]
    fn test_bincode_encoding_for_byte_transports() {
        let request = PingRequest {
            source: "127.0.0.1:3000".to_string(),
            checksum: 1234,
            changes: vec![Change::new("127.0.0.1:3001", MemberStatus::Faulty, 5)],
        };
        let encoded = bincode::serialize(&request).expect("bincode serialization failed");
        let decoded: PingRequest =
            bincode::deserialize(&encoded).expect("bincode deserialization failed");
        assert_eq!(decoded.checksum, 1234);
        assert_eq!(decoded.changes[0].status, MemberStatus::Faulty);
    }

    #[test]
    fn test_error_body_carries_wire_type() {
        let error = ProtocolError::InvalidJoinApp {
            expected: "search".to_string(),
            actual: "payments".to_string(),
        };
        let body = ErrorBody::from(&error);
        assert_eq!(body.kind, "ringpop.invalid-join.app");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "ringpop.invalid-join.app");
    }

    // ============================================================
    // ADAPTIVE TIMING
    // ============================================================

    #[test]
    fn test_timing_window_p50() {
        let mut window = TimingWindow::new(100);
        assert!(window.p50().is_none());

        for millis in [100.0, 400.0, 200.0, 800.0, 300.0] {
            window.record(millis);
        }
        assert_eq!(window.p50(), Some(300.0));
    }

    #[test]
    fn test_timing_window_is_bounded() {
        let mut window = TimingWindow::new(10);
        for i in 0..100 {
            window.record(i as f64);
        }
        assert_eq!(window.len(), 10);
        // Only the most recent samples survive.
        assert_eq!(window.p50(), Some(95.0));
    }

    #[test]
    fn test_protocol_rate_tracks_median_rtt() {
        let timing = ProtocolTiming::new(Duration::from_millis(200));
        // Before any samples the rate floors at the minimum period.
        assert_eq!(timing.protocol_rate(), Duration::from_millis(200));

        for _ in 0..20 {
            timing.record_rtt(Duration::from_millis(400));
        }
        timing.refresh_rate();
        // Rate converges to 2 * p50 = 800 ms.
        assert_eq!(timing.protocol_rate(), Duration::from_millis(800));
    }

    #[test]
    fn test_protocol_rate_floors_at_min_period() {
        let timing = ProtocolTiming::new(Duration::from_millis(200));
        for _ in 0..20 {
            timing.record_rtt(Duration::from_millis(10));
        }
        timing.refresh_rate();
        assert_eq!(timing.protocol_rate(), Duration::from_millis(200));
    }

    #[test]
    fn test_first_delay_staggers_within_min_period() {
        let timing = ProtocolTiming::new(Duration::from_millis(200));
        for _ in 0..50 {
            let delay = timing.compute_protocol_delay();
            assert!(delay <= Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_targets_one_rate_after_period_start() {
        let timing = ProtocolTiming::new(Duration::from_millis(200));
        for _ in 0..20 {
            timing.record_rtt(Duration::from_millis(400));
        }
        timing.refresh_rate();

        timing.mark_period_start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // 800 ms rate, 100 ms already elapsed.
        let delay = timing.compute_protocol_delay();
        assert_eq!(delay, Duration::from_millis(700));

        // Even once the rate has fully elapsed the delay floors at the
        // minimum protocol period.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(
            timing.compute_protocol_delay(),
            Duration::from_millis(200)
        );
    }
}

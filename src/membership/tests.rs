//! Membership Module Tests
//!
//! Validates the member table's merge rules, the dissemination buffer's
//! fairness, the iterator's coverage, and the suspicion timers.
//!
//! ## Test Scopes
//! - **Supersession**: The incarnation/precedence rule, including
//!   confluence: any serial ordering of the same updates converges on the
//!   same state.
//! - **Refutation**: A table never adopts a suspect/faulty claim about its
//!   own node.
//! - **Dissemination**: Every change travels, and travels a bounded number
//!   of times.

#[cfg(test)]
mod tests {
    use crate::membership::dissemination::DisseminationBuffer;
    use crate::membership::iterator::MemberIterator;
    use crate::membership::suspicion::SuspicionService;
    use crate::membership::table::MemberTable;
    use crate::membership::types::{
        supersedes, Change, Member, MemberStatus, MembershipEvent,
    };
    use rand::seq::SliceRandom;
    use rand::Rng;
    use std::collections::HashSet;
    use std::time::Duration;

    fn member(address: &str, status: MemberStatus, inc: i64) -> Member {
        Member {
            address: address.to_string(),
            status,
            incarnation_number: inc,
        }
    }

    // ============================================================
    // SUPERSESSION RULE
    // ============================================================

    #[test]
    fn test_higher_incarnation_wins() {
        assert!(supersedes(2, MemberStatus::Alive, 1, MemberStatus::Faulty));
        assert!(!supersedes(1, MemberStatus::Faulty, 2, MemberStatus::Alive));
    }

    #[test]
    fn test_equal_incarnation_downgrade_wins() {
        assert!(supersedes(5, MemberStatus::Suspect, 5, MemberStatus::Alive));
        assert!(supersedes(5, MemberStatus::Faulty, 5, MemberStatus::Suspect));
        // Upgrades at the same incarnation lose.
        assert!(!supersedes(5, MemberStatus::Alive, 5, MemberStatus::Suspect));
        // Leave has the lowest precedence of all.
        assert!(!supersedes(5, MemberStatus::Leave, 5, MemberStatus::Alive));
        assert!(supersedes(5, MemberStatus::Alive, 5, MemberStatus::Leave));
    }

    #[test]
    fn test_identical_state_does_not_supersede() {
        assert!(!supersedes(5, MemberStatus::Alive, 5, MemberStatus::Alive));
    }

    #[test]
    fn test_update_confluence_under_reordering() {
        // Any serial ordering of the same change set must converge on the
        // same stored state.
        let changes = vec![
            Change::new("10.0.0.2:3000", MemberStatus::Alive, 3),
            Change::new("10.0.0.2:3000", MemberStatus::Suspect, 3),
            Change::new("10.0.0.2:3000", MemberStatus::Faulty, 2),
            Change::new("10.0.0.2:3000", MemberStatus::Alive, 4),
            Change::new("10.0.0.2:3000", MemberStatus::Suspect, 1),
        ];

        let mut outcomes = HashSet::new();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut shuffled = changes.clone();
            shuffled.shuffle(&mut rng);

            let mut table = MemberTable::new("10.0.0.1:3000");
            table.add_local_member();
            for change in &shuffled {
                table.update(std::slice::from_ref(change));
            }
            let stored = table.get("10.0.0.2:3000").unwrap();
            outcomes.insert((stored.incarnation_number, stored.status));
        }
        assert_eq!(outcomes.len(), 1, "reordering changed the converged state");
        assert!(outcomes.contains(&(4, MemberStatus::Alive)));
    }

    #[test]
    fn test_update_is_monotone() {
        // Every applied transition must supersede the state it replaced.
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let mut rng = rand::thread_rng();
        let statuses = [
            MemberStatus::Alive,
            MemberStatus::Suspect,
            MemberStatus::Faulty,
            MemberStatus::Leave,
        ];

        let mut previous: Option<(i64, MemberStatus)> = None;
        for _ in 0..500 {
            let change = Change::new(
                "10.0.0.9:3000",
                *statuses.choose(&mut rng).unwrap(),
                rng.gen_range(0..6i64),
            );
            let applied = !table.update(&[change.clone()]).is_empty();
            let stored = table.get("10.0.0.9:3000").unwrap();
            let now = (stored.incarnation_number, stored.status);
            if let Some(prev) = previous {
                if applied {
                    assert!(
                        supersedes(now.0, now.1, prev.0, prev.1),
                        "applied a non-superseding transition {prev:?} -> {now:?}"
                    );
                } else {
                    assert_eq!(now, prev, "rejected update still mutated state");
                }
            }
            previous = Some(now);
        }
    }

    // ============================================================
    // LOCAL REFUTATION
    // ============================================================

    #[test]
    fn test_local_suspect_claim_is_refuted() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let local_inc = table.local_member().unwrap().incarnation_number;

        let events = table.update(&[Change::new(
            "10.0.0.1:3000",
            MemberStatus::Suspect,
            local_inc,
        )]);

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MembershipEvent::Alive(_)));
        let local = table.local_member().unwrap();
        assert_eq!(local.status, MemberStatus::Alive);
        assert_eq!(local.incarnation_number, local_inc + 1);
    }

    #[test]
    fn test_local_faulty_claim_at_higher_incarnation_is_refuted() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let local_inc = table.local_member().unwrap().incarnation_number;

        let events = table.update(&[Change::new(
            "10.0.0.1:3000",
            MemberStatus::Faulty,
            local_inc + 10,
        )]);

        assert_eq!(events.len(), 1);
        let local = table.local_member().unwrap();
        assert_eq!(local.status, MemberStatus::Alive);
        // The refutation must jump past the claim to supersede it everywhere.
        assert_eq!(local.incarnation_number, local_inc + 11);
    }

    #[test]
    fn test_stale_local_claim_is_ignored() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let local_inc = table.local_member().unwrap().incarnation_number;

        let events = table.update(&[Change::new(
            "10.0.0.1:3000",
            MemberStatus::Suspect,
            local_inc - 1,
        )]);

        assert!(events.is_empty());
        let local = table.local_member().unwrap();
        assert_eq!(local.status, MemberStatus::Alive);
        assert_eq!(local.incarnation_number, local_inc);
    }

    // ============================================================
    // TABLE OPERATIONS
    // ============================================================

    #[test]
    fn test_add_member_emits_new_then_updates() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();

        let events = table.add_member("10.0.0.2:3000", 7);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MembershipEvent::New(_)));

        // Re-adding with a higher incarnation is an alive update.
        let events = table.add_member("10.0.0.2:3000", 9);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MembershipEvent::Alive(_)));
        assert_eq!(table.get("10.0.0.2:3000").unwrap().incarnation_number, 9);

        // Re-adding with a stale incarnation changes nothing.
        let events = table.add_member("10.0.0.2:3000", 4);
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_address_enters_with_reported_status() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();

        let events = table.update(&[Change::new("10.0.0.3:3000", MemberStatus::Suspect, 2)]);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MembershipEvent::Suspect(_)));
        assert_eq!(table.get("10.0.0.3:3000").unwrap().status, MemberStatus::Suspect);
    }

    #[test]
    fn test_departed_members_stay_in_the_table() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        table.add_member("10.0.0.2:3000", 1);
        table.update(&[Change::new("10.0.0.2:3000", MemberStatus::Leave, 2)]);

        // Stale gossip cannot resurrect without a higher incarnation.
        assert!(table
            .update(&[Change::new("10.0.0.2:3000", MemberStatus::Alive, 2)])
            .is_empty());
        assert_eq!(table.get("10.0.0.2:3000").unwrap().status, MemberStatus::Leave);
        assert_eq!(table.member_count(), 2);

        // A genuinely newer report does.
        let events = table.update(&[Change::new("10.0.0.2:3000", MemberStatus::Alive, 3)]);
        assert_eq!(events.len(), 1);
        assert_eq!(table.get("10.0.0.2:3000").unwrap().status, MemberStatus::Alive);
    }

    #[test]
    fn test_make_leave_and_alive_keep_incarnation_monotone() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let start = table.local_member().unwrap().incarnation_number;

        let events = table.make_leave();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MembershipEvent::Leave(_)));
        let after_leave = table.local_member().unwrap().incarnation_number;
        assert!(after_leave > start);

        let events = table.make_alive();
        assert!(matches!(events[0], MembershipEvent::Alive(_)));
        assert!(table.local_member().unwrap().incarnation_number > after_leave);
    }

    #[test]
    fn test_random_pingable_members_filters() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        table.add_member("10.0.0.2:3000", 1);
        table.add_member("10.0.0.3:3000", 1);
        table.add_member("10.0.0.4:3000", 1);
        table.update(&[Change::new("10.0.0.4:3000", MemberStatus::Faulty, 1)]);

        for _ in 0..20 {
            let sample = table.get_random_pingable_members(10, &["10.0.0.3:3000"]);
            let addresses: Vec<&str> = sample.iter().map(|m| m.address.as_str()).collect();
            assert_eq!(addresses, vec!["10.0.0.2:3000"]);
        }

        assert_eq!(table.get_random_pingable_members(0, &[]).len(), 0);
    }

    // ============================================================
    // CHECKSUM
    // ============================================================

    #[test]
    fn test_checksum_ignores_insertion_order() {
        let mut a = MemberTable::new("10.0.0.1:3000");
        let mut b = MemberTable::new("10.0.0.1:3000");

        let mut changes = vec![
            Change::new("10.0.0.1:3000", MemberStatus::Alive, 1),
            Change::new("10.0.0.2:3000", MemberStatus::Suspect, 4),
            Change::new("10.0.0.3:3000", MemberStatus::Leave, 2),
            Change::new("10.0.0.4:3000", MemberStatus::Faulty, 9),
        ];
        for change in &changes {
            a.update(std::slice::from_ref(change));
        }
        changes.reverse();
        for change in &changes {
            b.update(std::slice::from_ref(change));
        }

        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_checksum_reflects_state() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let before = table.checksum();
        table.add_member("10.0.0.2:3000", 1);
        assert_ne!(before, table.checksum());
    }

    // ============================================================
    // DISSEMINATION BUFFER
    // ============================================================

    #[test]
    fn test_max_piggyback_formula() {
        assert_eq!(DisseminationBuffer::max_piggyback(1), 1);
        assert_eq!(DisseminationBuffer::max_piggyback(2), 2);
        assert_eq!(DisseminationBuffer::max_piggyback(9), 3);
        assert_eq!(DisseminationBuffer::max_piggyback(99), 6);
    }

    #[test]
    fn test_newer_change_replaces_buffered_one() {
        let mut buffer = DisseminationBuffer::new();
        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Suspect, 3));
        // Travel once so the count is non-zero.
        buffer.issue_changes(99);

        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Alive, 4));
        let issued = buffer.issue_changes(99);
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].status, MemberStatus::Alive);
        assert_eq!(issued[0].incarnation_number, 4);
        // Replacement started its piggyback count over.
        assert_eq!(issued[0].piggyback_count, 1);
    }

    #[test]
    fn test_stale_change_does_not_replace() {
        let mut buffer = DisseminationBuffer::new();
        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Faulty, 3));
        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Alive, 3));

        let issued = buffer.issue_changes(99);
        assert_eq!(issued[0].status, MemberStatus::Faulty);
    }

    #[test]
    fn test_changes_evicted_after_exactly_max_piggyback_trips() {
        // Cluster of 9 -> each change travels exactly 3 times.
        let cluster_size = 9;
        let limit = DisseminationBuffer::max_piggyback(cluster_size);
        assert_eq!(limit, 3);

        let mut buffer = DisseminationBuffer::new();
        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Suspect, 1));

        let mut trips = 0;
        for _ in 0..10 {
            let issued = buffer.issue_changes(cluster_size);
            if issued.is_empty() {
                break;
            }
            trips += issued.len();
        }
        assert_eq!(trips as u32, limit);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_issue_prefers_least_travelled_changes() {
        // Cluster of 2 -> at most 2 changes per message.
        let mut buffer = DisseminationBuffer::new();
        buffer.add_change(Change::new("10.0.0.2:3000", MemberStatus::Alive, 1));
        buffer.add_change(Change::new("10.0.0.3:3000", MemberStatus::Alive, 1));

        let first = buffer.issue_changes(2);
        assert_eq!(first.len(), 2);

        // A fresh change must go out before the travelled ones go again.
        buffer.add_change(Change::new("10.0.0.4:3000", MemberStatus::Suspect, 1));
        let second = buffer.issue_changes(2);
        assert_eq!(second[0].address, "10.0.0.4:3000");
    }

    #[test]
    fn test_every_change_travels_before_eviction() {
        let cluster_size = 9;
        let mut buffer = DisseminationBuffer::new();
        let mut pending: HashSet<String> = HashSet::new();
        for i in 0..25 {
            let address = format!("10.0.1.{i}:3000");
            buffer.add_change(Change::new(&address, MemberStatus::Alive, 1));
            pending.insert(address);
        }

        let mut seen: HashSet<String> = HashSet::new();
        while !buffer.is_empty() {
            for change in buffer.issue_changes(cluster_size) {
                seen.insert(change.address);
            }
        }
        assert_eq!(seen, pending, "a change was evicted without ever travelling");
    }

    // ============================================================
    // MEMBER ITERATOR
    // ============================================================

    #[test]
    fn test_iterator_covers_all_pingable_members() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        for i in 2..8 {
            table.add_member(&format!("10.0.0.{i}:3000"), 1);
        }
        table.update(&[Change::new("10.0.0.7:3000", MemberStatus::Faulty, 2)]);

        let mut iter = MemberIterator::new();
        let mut sweep = HashSet::new();
        // One sweep over 5 pingable members (6 added, 1 faulty).
        for _ in 0..5 {
            let member = iter.next(&table).expect("pingable member expected");
            assert_ne!(member.address, "10.0.0.1:3000");
            assert_ne!(member.address, "10.0.0.7:3000");
            sweep.insert(member.address);
        }
        assert_eq!(sweep.len(), 5, "a member was starved within one sweep");
    }

    #[test]
    fn test_iterator_includes_suspects() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        table.add_member("10.0.0.2:3000", 1);
        table.update(&[Change::new("10.0.0.2:3000", MemberStatus::Suspect, 1)]);

        let mut iter = MemberIterator::new();
        let member = iter.next(&table).expect("suspect members are pingable");
        assert_eq!(member.address, "10.0.0.2:3000");
    }

    #[test]
    fn test_iterator_exhausts_to_none_when_alone() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        let mut iter = MemberIterator::new();
        assert!(iter.next(&table).is_none());
    }

    #[test]
    fn test_iterator_picks_up_new_members() {
        let mut table = MemberTable::new("10.0.0.1:3000");
        table.add_local_member();
        table.add_member("10.0.0.2:3000", 1);

        let mut iter = MemberIterator::new();
        assert!(iter.next(&table).is_some());

        table.add_member("10.0.0.3:3000", 1);
        let mut seen = HashSet::new();
        for _ in 0..2 {
            seen.insert(iter.next(&table).unwrap().address);
        }
        assert!(seen.contains("10.0.0.3:3000"));
    }

    // ============================================================
    // SUSPICION SERVICE
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_suspicion_expiry_emits_faulty() {
        let (service, mut expired_rx) = SuspicionService::new(Duration::from_secs(5));
        service.start(&member("10.0.0.2:3000", MemberStatus::Suspect, 7));
        assert!(service.has_timer("10.0.0.2:3000"));

        let expiry = expired_rx.recv().await.expect("expiry change expected");
        assert_eq!(expiry.address, "10.0.0.2:3000");
        assert_eq!(expiry.status, MemberStatus::Faulty);
        assert_eq!(expiry.incarnation_number, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspicion_stop_cancels_timer() {
        let (service, mut expired_rx) = SuspicionService::new(Duration::from_secs(5));
        service.start(&member("10.0.0.2:3000", MemberStatus::Suspect, 7));
        service.stop("10.0.0.2:3000");
        assert_eq!(service.timer_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(expired_rx.try_recv().is_err(), "cancelled timer still fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspicion_stop_all_disables_until_reenabled() {
        let (service, mut expired_rx) = SuspicionService::new(Duration::from_secs(5));
        service.start(&member("10.0.0.2:3000", MemberStatus::Suspect, 1));
        service.stop_all();
        assert_eq!(service.timer_count(), 0);

        // New starts are refused while halted.
        service.start(&member("10.0.0.3:3000", MemberStatus::Suspect, 1));
        assert_eq!(service.timer_count(), 0);

        service.reenable();
        service.start(&member("10.0.0.3:3000", MemberStatus::Suspect, 1));
        assert_eq!(service.timer_count(), 1);

        let expiry = expired_rx.recv().await.unwrap();
        assert_eq!(expiry.address, "10.0.0.3:3000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspicion_restart_resets_deadline() {
        let (service, mut expired_rx) = SuspicionService::new(Duration::from_secs(5));
        service.start(&member("10.0.0.2:3000", MemberStatus::Suspect, 1));
        tokio::time::sleep(Duration::from_secs(3)).await;

        // Re-arming replaces the old timer.
        service.start(&member("10.0.0.2:3000", MemberStatus::Suspect, 2));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(expired_rx.try_recv().is_err(), "old deadline survived restart");

        let expiry = expired_rx.recv().await.unwrap();
        assert_eq!(expiry.incarnation_number, 2);
    }
}

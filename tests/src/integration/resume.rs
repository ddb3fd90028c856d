//! # Resume After Disconnect
//!
//! A session that loses its stream reconnects and asks the upstream to
//! replay from the last slot it delivered. Whatever the upstream replays a
//! second time is suppressed, so the consumer sees every slot exactly once.
//!
//! ## Scenario
//!
//! 1. Subscribe to accounts and slots from 1000
//! 2. Upstream delivers 1000..=1050, then resets the connection
//! 3. The reconnect asks for `fromSlot = 1050`
//! 4. Upstream replays 1050 and continues to 1060
//! 5. Consumer sees 1000..=1060 once each, in order

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use laserstream_session::{
        ConnectionError, SessionConfig, SessionState, SubscriptionApi, UpdateRecord,
    };
    use proptest::prelude::*;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    // =============================================================================
    // SLOT STREAMS
    // =============================================================================

    #[tokio::test]
    async fn test_resume_after_reset_has_no_gap_and_no_duplicates() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let filter = slots_filter(Some(1000)).with_accounts("", Default::default());
        let (handle, mut stream) = client.subscribe_stream(filter);

        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1000));
        for slot in 1000..=1050 {
            conn.send(slot_update(slot));
        }
        let first = timeout(WAIT, next_slots(&mut stream, 51)).await.unwrap();
        assert_eq!(first, (1000..=1050).collect::<Vec<_>>());

        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1050));
        for slot in 1050..=1060 {
            conn.send(slot_update(slot));
        }
        let second = timeout(WAIT, next_slots(&mut stream, 10)).await.unwrap();
        assert_eq!(second, (1051..=1060).collect::<Vec<_>>());

        let stats = handle.stats();
        assert_eq!(stats.delivered, 61);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.connect_attempts, 2);
        assert_eq!(stats.last_delivered_slot, Some(1060));

        handle.cancel();
        assert_eq!(handle.closed().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_resume_after_server_drops_stream() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let (handle, mut stream) = client.subscribe_stream(slots_filter(Some(1000)));

        let (conn, _) = accept_subscription(&mut server).await;
        for slot in 1000..=1010 {
            conn.send(slot_update(slot));
        }
        timeout(WAIT, next_slots(&mut stream, 11)).await.unwrap();
        drop(conn);

        let (_conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1010));
        assert!(matches!(
            handle.last_error(),
            Some(laserstream_session::SessionError::Connection(
                ConnectionError::ServerClosed(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_resume_margin_replays_earlier_slots_without_redelivery() {
        let mut config = SessionConfig::for_testing();
        config.dedup.resume_slot_margin = 10;
        let (client, mut server) = test_client(config);
        let (handle, mut stream) = client.subscribe_stream(slots_filter(Some(1000)));

        let (conn, _) = accept_subscription(&mut server).await;
        for slot in 1000..=1050 {
            conn.send(slot_update(slot));
        }
        timeout(WAIT, next_slots(&mut stream, 51)).await.unwrap();
        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1040));
        for slot in 1040..=1055 {
            conn.send(slot_update(slot));
        }
        let replayed = timeout(WAIT, next_slots(&mut stream, 5)).await.unwrap();
        assert_eq!(replayed, (1051..=1055).collect::<Vec<_>>());
        assert_eq!(handle.stats().suppressed, 11);
    }

    #[tokio::test]
    async fn test_margin_never_reaches_before_starting_slot() {
        let mut config = SessionConfig::for_testing();
        config.dedup.resume_slot_margin = 100;
        let (client, mut server) = test_client(config);
        let (_handle, mut stream) = client.subscribe_stream(slots_filter(Some(1000)));

        let (conn, _) = accept_subscription(&mut server).await;
        for slot in 1000..=1005 {
            conn.send(slot_update(slot));
        }
        timeout(WAIT, next_slots(&mut stream, 6)).await.unwrap();
        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (_conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1000));
    }

    #[tokio::test]
    async fn test_disconnect_before_any_delivery_resumes_from_start() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let (_handle, _stream) = client.subscribe_stream(slots_filter(Some(1000)));

        let (conn, _) = accept_subscription(&mut server).await;
        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (_conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(1000));
    }

    #[tokio::test]
    async fn test_live_subscription_resumes_from_last_delivered() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let (_handle, mut stream) = client.subscribe_stream(slots_filter(None));

        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, None);
        conn.fail(ConnectionError::Reset("before data".into()));

        // Nothing delivered yet: stay live.
        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, None);

        conn.send(slot_update(77));
        assert_eq!(timeout(WAIT, next_slots(&mut stream, 1)).await.unwrap(), vec![77]);
        conn.fail(ConnectionError::Reset("after data".into()));

        let (_conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(77));
    }

    #[tokio::test]
    async fn test_resume_request_keeps_original_filters() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let filter = slots_filter(Some(5)).with_blocks_meta("meta");
        let (_handle, mut stream) = client.subscribe_stream(filter.clone());

        let (conn, first) = accept_subscription(&mut server).await;
        conn.send(slot_update(6));
        timeout(WAIT, next_slots(&mut stream, 1)).await.unwrap();
        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (_conn, second) = accept_subscription(&mut server).await;
        assert_eq!(first.slots, second.slots);
        assert_eq!(first.blocks_meta, second.blocks_meta);
        assert_eq!(second.commitment, filter.commitment);
        assert_eq!(second.from_slot, Some(6));
    }

    // =============================================================================
    // MIXED ENTITY STREAMS
    // =============================================================================

    #[tokio::test]
    async fn test_account_replay_suppressed_by_write_version() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let filter = slots_filter(Some(200)).with_accounts("all", Default::default());
        let (handle, mut stream) = client.subscribe_stream(filter);

        let (conn, _) = accept_subscription(&mut server).await;
        conn.send(slot_update(200));
        conn.send(account_update(200, 1));
        conn.send(account_update(201, 2));
        for _ in 0..3 {
            assert!(timeout(WAIT, stream.next()).await.unwrap().unwrap().is_ok());
        }
        conn.fail(ConnectionError::Reset("peer reset".into()));

        let (conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.from_slot, Some(201));
        conn.send(account_update(201, 2));
        conn.send(account_update(201, 3));

        let next = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
        match next {
            UpdateRecord::Account(account) => assert_eq!(account.write_version, 3),
            other => panic!("expected account write, got {other:?}"),
        }
        assert_eq!(handle.stats().suppressed, 1);
    }

    #[tokio::test]
    async fn test_stale_slot_status_still_delivered_once() {
        let (client, mut server) = test_client(SessionConfig::for_testing());
        let (_handle, mut stream) = client.subscribe_stream(slots_filter(None));

        let (conn, _) = accept_subscription(&mut server).await;
        // Slots from different forks arrive out of order; both are delivered.
        conn.send(slot_update(10));
        conn.send(slot_update(8));
        conn.send(slot_update(10));
        conn.send(slot_update(11));
        let slots = timeout(WAIT, next_slots(&mut stream, 3)).await.unwrap();
        assert_eq!(slots, vec![10, 8, 11]);
    }

    // =============================================================================
    // PROPERTY: ARBITRARY DISCONNECT POINTS
    // =============================================================================

    /// Upstream that serves slots 1000..=1100, resetting the connection after
    /// each segment and honouring the resume slot on every reconnect.
    async fn replay_with_disconnects(cut_after: Vec<u64>, margin: u64) -> Vec<u64> {
        const FIRST: u64 = 1000;
        const LAST: u64 = 1100;

        let mut config = quiet_config();
        config.dedup.resume_slot_margin = margin;
        let (client, mut server) = test_client(config);
        let (handle, mut stream) = client.subscribe_stream(slots_filter(Some(FIRST)));

        let mut segment_ends: Vec<u64> = cut_after
            .iter()
            .scan(FIRST, |end, len| {
                *end = (*end + len).min(LAST - 1);
                Some(*end)
            })
            .collect();
        segment_ends.push(LAST);

        let mut seen = Vec::new();
        let mut delivered_through = FIRST - 1;
        for (i, &end) in segment_ends.iter().enumerate() {
            let (conn, request) = accept_subscription(&mut server).await;
            let from = request.from_slot.unwrap_or(FIRST);
            assert!(from <= delivered_through + 1);
            for slot in from..=end {
                conn.send(slot_update(slot));
            }
            if i + 1 < segment_ends.len() {
                conn.fail(ConnectionError::Reset("scripted".into()));
            }
            let fresh = end.saturating_sub(delivered_through) as usize;
            seen.extend(timeout(WAIT, next_slots(&mut stream, fresh)).await.unwrap());
            delivered_through = delivered_through.max(end);
        }

        handle.cancel();
        seen
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_disconnects_never_lose_or_repeat_slots(
            cut_after in proptest::collection::vec(0u64..40, 1..4),
            margin in 0u64..5,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let seen = runtime.block_on(replay_with_disconnects(cut_after, margin));
            prop_assert_eq!(seen, (1000..=1100).collect::<Vec<_>>());
        }
    }
}

//! # Error Classification
//!
//! | Class | Trigger | Outcome |
//! |-------|---------|---------|
//! | `FatalConfig` | bad filter | `Failed` before any connect |
//! | `Transient` | reset, unavailable, server close | reconnect, session continues |
//! | `Fatal` | auth rejected, protocol mismatch, attempt budget spent | `Failed`, error surfaced once |

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use laserstream_session::{
        AccountFilter, ConnectionError, FilterError, FilterSpecification, SessionError,
        SessionState, SubscriptionApi,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::timeout;

    // =============================================================================
    // FATAL CONFIGURATION
    // =============================================================================

    async fn assert_rejected_before_connect(filter: FilterSpecification, expected: FilterError) {
        let (client, server) = test_client(quiet_config());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink_errors = errors.clone();
        let handle = client.subscribe_with_errors(
            filter,
            |update| panic!("unexpected update {update:?}"),
            move |error| sink_errors.lock().push(error),
        );

        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Failed
        );
        assert_eq!(server.connect_attempts(), 0);
        assert_eq!(*errors.lock(), vec![SessionError::InvalidFilter(expected.clone())]);
        assert_eq!(handle.last_error(), Some(SessionError::InvalidFilter(expected)));
    }

    #[tokio::test]
    async fn test_empty_filter_rejected() {
        assert_rejected_before_connect(
            FilterSpecification::default(),
            FilterError::NothingToSubscribe,
        )
        .await;
    }

    #[tokio::test]
    async fn test_overlapping_data_slices_rejected() {
        assert_rejected_before_connect(
            slots_filter(None).with_data_slice(0, 16).with_data_slice(8, 16),
            FilterError::DataSliceOverlap { offset: 8 },
        )
        .await;
    }

    #[tokio::test]
    async fn test_bad_address_in_json_request_rejected() {
        let filter = FilterSpecification::from_json(
            r#"{ "accounts": { "wallets": { "account": ["not-a-key"] } } }"#,
        )
        .unwrap();
        assert_rejected_before_connect(
            filter,
            FilterError::InvalidAddress {
                filter: "wallets".into(),
                address: "not-a-key".into(),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn test_valid_account_filter_connects() {
        let (client, mut server) = test_client(quiet_config());
        let filter = FilterSpecification::default().with_accounts(
            "usdc",
            AccountFilter {
                account: vec!["EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into()],
                ..Default::default()
            },
        );
        let (handle, _stream) = client.subscribe_stream(filter);
        let (_conn, request) = accept_subscription(&mut server).await;
        assert_eq!(request.accounts["usdc"].account.len(), 1);
        timeout(WAIT, wait_for_state(&handle, SessionState::Streaming))
            .await
            .unwrap();
    }

    // =============================================================================
    // FATAL TRANSPORT ERRORS
    // =============================================================================

    #[tokio::test]
    async fn test_unauthenticated_connect_fails_once() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        server
            .accept()
            .await
            .unwrap()
            .reject(ConnectionError::Unauthenticated("bad x-token".into()));

        assert_eq!(handle.closed().await, SessionState::Failed);
        assert_eq!(
            recorder.errors(),
            vec![SessionError::Connection(ConnectionError::Unauthenticated(
                "bad x-token".into()
            ))]
        );
        assert_eq!(server.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_mid_stream_ends_session() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        let (conn, _) = accept_subscription(&mut server).await;
        conn.send(slot_update(1));
        conn.fail(ConnectionError::PermissionDenied("plan expired".into()));

        assert_eq!(handle.closed().await, SessionState::Failed);
        assert_eq!(recorder.slots(), vec![1]);
        assert_eq!(
            recorder.errors(),
            vec![SessionError::Connection(ConnectionError::PermissionDenied(
                "plan expired".into()
            ))]
        );
        assert_eq!(server.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_grpc_status_codes_classified() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        // UNAVAILABLE is retried, UNIMPLEMENTED is not.
        server
            .accept()
            .await
            .unwrap()
            .reject(ConnectionError::from_grpc_code(14, "draining"));
        server
            .accept()
            .await
            .unwrap()
            .reject(ConnectionError::from_grpc_code(12, "no such method"));

        assert_eq!(handle.closed().await, SessionState::Failed);
        assert_eq!(
            recorder.errors(),
            vec![SessionError::Connection(ConnectionError::ProtocolMismatch(
                "no such method".into()
            ))]
        );
    }

    // =============================================================================
    // TRANSIENT ERRORS
    // =============================================================================

    #[tokio::test]
    async fn test_transient_failures_retried_silently() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        for _ in 0..2 {
            server
                .accept()
                .await
                .unwrap()
                .reject(ConnectionError::Unavailable("overloaded".into()));
        }
        let (conn, _) = accept_subscription(&mut server).await;
        conn.send(slot_update(9));
        recorder.wait_until(|r| r.len() == 1).await;

        assert_eq!(recorder.slots(), vec![9]);
        assert!(recorder.errors().is_empty());
        assert_eq!(handle.state(), SessionState::Streaming);
        assert_eq!(handle.stats().connect_attempts, 3);
        assert_eq!(
            handle.last_error(),
            Some(SessionError::Connection(ConnectionError::Unavailable(
                "overloaded".into()
            )))
        );
    }

    #[tokio::test]
    async fn test_transient_failures_surfaced_when_enabled() {
        let mut config = quiet_config();
        config.surface_transient_errors = true;
        let (client, mut server) = test_client(config);
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        server
            .accept()
            .await
            .unwrap()
            .reject(ConnectionError::Unavailable("overloaded".into()));
        let (conn, _) = accept_subscription(&mut server).await;
        conn.fail(ConnectionError::Reset("peer reset".into()));
        let _conn = accept_subscription(&mut server).await;
        recorder.wait_until(|r| r.errors().len() == 2).await;
        timeout(WAIT, wait_for_state(&handle, SessionState::Streaming))
            .await
            .unwrap();

        assert_eq!(
            recorder.errors(),
            vec![
                SessionError::Connection(ConnectionError::Unavailable("overloaded".into())),
                SessionError::Connection(ConnectionError::Reset("peer reset".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_transient_subscribe_rejection_retried() {
        let (client, mut server) = test_client(quiet_config());
        let (handle, _stream) = client.subscribe_stream(slots_filter(None));

        let mut conn = server.accept().await.unwrap().accept();
        conn.next_subscribe()
            .await
            .unwrap()
            .reject(ConnectionError::Unavailable("warming up".into()));

        let _second = accept_subscription(&mut server).await;
        timeout(WAIT, wait_for_state(&handle, SessionState::Streaming))
            .await
            .unwrap();
        assert_eq!(server.connect_attempts(), 2);
    }

    // =============================================================================
    // ATTEMPT BUDGET
    // =============================================================================

    #[tokio::test]
    async fn test_attempt_budget_exhausted() {
        let mut config = quiet_config();
        config.backoff.max_attempts = Some(3);
        let (client, mut server) = test_client(config);
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        for _ in 0..3 {
            server
                .accept()
                .await
                .unwrap()
                .reject(ConnectionError::Unavailable("overloaded".into()));
        }

        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Failed
        );
        let expected = SessionError::ReconnectExhausted {
            attempts: 3,
            last: ConnectionError::Unavailable("overloaded".into()),
        };
        assert_eq!(recorder.errors(), vec![expected.clone()]);
        assert_eq!(handle.last_error(), Some(expected));
        assert_eq!(server.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_subscribe_failures_count_toward_budget() {
        let mut config = quiet_config();
        config.backoff.max_attempts = Some(2);
        let (client, mut server) = test_client(config);
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        for _ in 0..2 {
            let mut conn = server.accept().await.unwrap().accept();
            conn.next_subscribe()
                .await
                .unwrap()
                .reject(ConnectionError::Unavailable("warming up".into()));
        }

        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Failed
        );
        assert!(matches!(
            recorder.errors().as_slice(),
            [SessionError::ReconnectExhausted { attempts: 2, .. }]
        ));
    }

    #[tokio::test]
    async fn test_acknowledged_subscribe_resets_budget() {
        let mut config = quiet_config();
        config.backoff.max_attempts = Some(2);
        let (client, mut server) = test_client(config);
        let (handle, _stream) = client.subscribe_stream(slots_filter(None));

        for _ in 0..3 {
            server
                .accept()
                .await
                .unwrap()
                .reject(ConnectionError::Unavailable("overloaded".into()));
            let (conn, _) = accept_subscription(&mut server).await;
            drop(conn);
        }

        let _conn = accept_subscription(&mut server).await;
        timeout(WAIT, wait_for_state(&handle, SessionState::Streaming))
            .await
            .unwrap();
        assert_eq!(handle.stats().reconnects, 3);
    }
}

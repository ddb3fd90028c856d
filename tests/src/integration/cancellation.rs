//! # Cancellation
//!
//! `cancel()` (or dropping the handle) ends the session from any state:
//! while dialling, while backing off, while streaming, and while blocked on
//! a consumer that stopped reading. Nothing is delivered afterwards and no
//! error is reported for a cancel.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use laserstream_session::adapters::ClientMessage;
    use laserstream_session::{ConnectionError, SessionConfig, SessionState, SubscriptionApi};
    use std::time::Duration;
    use tokio::time::{timeout, Instant};
    use tokio_stream::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_is_prompt() {
        let mut config = quiet_config();
        config.backoff.floor_ms = 60_000;
        config.backoff.ceiling_ms = 60_000;
        let (client, mut server) = test_client(config);
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        server
            .accept()
            .await
            .unwrap()
            .reject(ConnectionError::Unavailable("overloaded".into()));
        tokio::task::yield_now().await;

        let started = Instant::now();
        handle.cancel();
        assert_eq!(handle.closed().await, SessionState::Closed);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(server.connect_attempts(), 1);
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_connecting() {
        let (client, mut server) = test_client(quiet_config());
        let handle = client.subscribe(slots_filter(None), Recorder::new().sink());

        // Hold the request open without answering it.
        let _pending = server.accept().await.unwrap();
        handle.cancel();
        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Closed
        );
        assert_eq!(handle.last_error(), None);
    }

    #[tokio::test]
    async fn test_cancel_while_subscribing() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        let mut conn = server.accept().await.unwrap().accept();
        // Leave the subscribe request unacknowledged.
        let pending = conn.next_subscribe().await.unwrap();
        handle.cancel();
        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Closed
        );
        assert!(matches!(conn.recv().await, Some(ClientMessage::Close) | None));

        // A late acknowledgment reaches nobody.
        pending.accept();
        conn.send(slot_update(1));
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_streaming_closes_transport() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        let (mut conn, _) = accept_subscription(&mut server).await;
        conn.send(slot_update(1));
        recorder.wait_until(|r| r.len() == 1).await;

        handle.cancel();
        assert!(matches!(
            timeout(WAIT, conn.recv()).await.unwrap(),
            Some(ClientMessage::Close) | None
        ));
        assert_eq!(handle.closed().await, SessionState::Closed);
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_delivery_queue() {
        let mut config = quiet_config();
        config.channel_capacity = 2;
        let (client, mut server) = test_client(config);
        let (handle, stream) = client.subscribe_stream(slots_filter(None));

        let (conn, _) = accept_subscription(&mut server).await;
        // Nobody reads the stream, so the driver blocks after two updates.
        for slot in 1..=10 {
            conn.send(slot_update(slot));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.stats().delivered <= 3);

        handle.cancel();
        assert_eq!(
            timeout(WAIT, handle.closed()).await.unwrap(),
            SessionState::Closed
        );
        drop(stream);
    }

    #[tokio::test]
    async fn test_no_delivery_after_cancel_returns() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());

        let (conn, _) = accept_subscription(&mut server).await;
        for slot in 1..=5 {
            conn.send(slot_update(slot));
        }
        recorder.wait_until(|r| r.len() == 5).await;

        handle.cancel();
        handle.closed().await;
        let seen = recorder.len();
        for slot in 6..=10 {
            conn.send(slot_update(slot));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(recorder.len(), seen);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (client, mut server) = test_client(quiet_config());
        let recorder = Recorder::new();
        let handle = client.subscribe(slots_filter(None), recorder.sink());
        let _conn = accept_subscription(&mut server).await;

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.closed().await, SessionState::Closed);
        handle.cancel();
        assert_eq!(handle.state(), SessionState::Closed);
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_session() {
        let (client, mut server) = test_client(quiet_config());
        let (handle, mut stream) = client.subscribe_stream(slots_filter(None));
        let (mut conn, _) = accept_subscription(&mut server).await;

        drop(handle);
        assert!(matches!(
            timeout(WAIT, conn.recv()).await.unwrap(),
            Some(ClientMessage::Close) | None
        ));
        assert!(timeout(WAIT, stream.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_one_session_leaves_others_running() {
        let (client, mut server) = test_client(quiet_config());
        let (a, _stream_a) = client.subscribe_stream(slots_filter(None));
        let (conn_a, _) = accept_subscription(&mut server).await;
        let (b, mut stream_b) = client.subscribe_stream(slots_filter(None));
        let (conn_b, _) = accept_subscription(&mut server).await;

        a.cancel();
        assert_eq!(a.closed().await, SessionState::Closed);

        conn_b.send(slot_update(3));
        assert_eq!(
            timeout(WAIT, next_slots(&mut stream_b, 1)).await.unwrap(),
            vec![3]
        );
        assert_eq!(b.state(), SessionState::Streaming);
        drop(conn_a);
    }
}

//! End-to-end tests: channel feed → ingestion loop → SQLite store
//!
//! The content service is either an in-process fake or a loopback HTTP stub
//! driven through the real `HttpContentFetcher`.

#[cfg(test)]
mod pipeline_integration_tests {
    use async_trait::async_trait;
    use pasteflow::pipeline::{
        ContentFetcher, EventFilter, FetchError, FetchPolicy, HttpContentFetcher, IngestContext, IngestSettings,
        IngestionLoop, Shutdown, SqliteRecordStore,
    };
    use pasteflow::subscription::ChannelSubscription;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct MapFetcher(HashMap<&'static str, Result<&'static str, FetchError>>);

    #[async_trait]
    impl ContentFetcher for MapFetcher {
        async fn fetch(&self, id: &str) -> Result<String, FetchError> {
            match self.0.get(id) {
                Some(Ok(body)) => Ok(body.to_string()),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::Remote { status: 404 }),
            }
        }
    }

    fn settings() -> IngestSettings {
        IngestSettings {
            workers: 2,
            fetch_policy: FetchPolicy::new(2, Duration::from_millis(1)),
            shutdown_grace: Duration::from_secs(2),
            ..IngestSettings::default()
        }
    }

    fn event(message: &str, tag: &str) -> Vec<u8> {
        format!(r#"{{"message":{},"sourceTag":"{}"}}"#, serde_json::to_string(message).unwrap(), tag).into_bytes()
    }

    fn build(fetcher: Arc<dyn ContentFetcher>) -> (tempfile::TempDir, Arc<SqliteRecordStore>, IngestionLoop) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteRecordStore::open(dir.path().join("pastes.db")).unwrap());
        let ingestion = IngestionLoop::new(IngestContext {
            filter: EventFilter::new("agent"),
            fetcher,
            store: store.clone(),
            settings: settings(),
        });
        (dir, store, ingestion)
    }

    #[tokio::test]
    async fn test_single_event_is_fetched_and_stored() {
        let fetcher = Arc::new(MapFetcher(HashMap::from([("xyz", Ok("hello world"))])));
        let (_dir, store, ingestion) = build(fetcher);

        let (tx, mut sub) = ChannelSubscription::bounded(8);
        tx.send(event("\"xyz\"", "agent")).await.unwrap();
        drop(tx);

        let stats = ingestion.run(&mut sub, &Shutdown::new()).await.unwrap();

        assert_eq!(stats.stored, 1);
        assert_eq!(store.count().unwrap(), 1);
        let record = store.get("xyz").unwrap().unwrap();
        assert_eq!(record.id, "xyz");
        assert_eq!(record.content, "hello world");
    }

    #[tokio::test]
    async fn test_redelivered_event_is_stored_once() {
        let fetcher = Arc::new(MapFetcher(HashMap::from([("xyz", Ok("hello world"))])));
        let (_dir, store, ingestion) = build(fetcher);

        let (tx, mut sub) = ChannelSubscription::bounded(8);
        tx.send(event("\"xyz\"", "agent")).await.unwrap();
        tx.send(event("\"xyz\"", "agent")).await.unwrap();
        drop(tx);

        let stats = ingestion.run(&mut sub, &Shutdown::new()).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.store_failures, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let fetcher = Arc::new(MapFetcher(HashMap::from([
            ("x", Err(FetchError::EmptyContent)),
            ("y", Ok("next one")),
        ])));
        let (_dir, store, ingestion) = build(fetcher);

        let (tx, mut sub) = ChannelSubscription::bounded(8);
        tx.send(event("\"x\"", "agent")).await.unwrap();
        tx.send(event("\"y\"", "agent")).await.unwrap();
        drop(tx);

        let stats = ingestion.run(&mut sub, &Shutdown::new()).await.unwrap();

        assert_eq!(stats.fetch_failures, 1);
        assert!(store.get("x").unwrap().is_none());
        assert_eq!(store.get("y").unwrap().unwrap().content, "next one");
    }

    #[tokio::test]
    async fn test_irrelevant_and_malformed_events_do_not_stop_ingestion() {
        let fetcher = Arc::new(MapFetcher(HashMap::from([("keep", Ok("kept"))])));
        let (_dir, store, ingestion) = build(fetcher);

        let (tx, mut sub) = ChannelSubscription::bounded(8);
        tx.send(event("\"skip\"", "not-agent")).await.unwrap();
        tx.send(b"\x00\x01 not an event".to_vec()).await.unwrap();
        tx.send(event("\"keep\"", "agent")).await.unwrap();
        drop(tx);

        let stats = ingestion.run(&mut sub, &Shutdown::new()).await.unwrap();

        assert_eq!(stats.received, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("skip").unwrap().is_none());
    }

    /// Minimal content service: `/raw/<id>` answers from `pages`, anything else 404
    async fn spawn_content_service(pages: HashMap<&'static str, &'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pages = Arc::new(pages);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let pages = pages.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let head = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = head.split_whitespace().nth(1).unwrap_or("/");

                    let response = match path.strip_prefix("/raw/").and_then(|id| pages.get(id)) {
                        Some(body) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string(),
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_content_service_end_to_end() {
        let base = spawn_content_service(HashMap::from([("abc123", "paste body"), ("def456", "another")])).await;
        let fetcher = Arc::new(HttpContentFetcher::new(&base, Duration::from_secs(5)).unwrap());
        let (_dir, store, ingestion) = build(fetcher);

        let (tx, mut sub) = ChannelSubscription::bounded(8);
        tx.send(event("\"abc123\"", "agent")).await.unwrap();
        tx.send(event("\"gone\"", "agent")).await.unwrap();
        tx.send(event("\"def456\"", "agent")).await.unwrap();
        tx.send(event("\"abc123\"", "agent")).await.unwrap();
        drop(tx);

        let stats = ingestion.run(&mut sub, &Shutdown::new()).await.unwrap();

        assert_eq!(stats.stored, 2);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(store.get("abc123").unwrap().unwrap().content, "paste body");
        assert_eq!(store.get("def456").unwrap().unwrap().content, "another");
        assert!(store.get("gone").unwrap().is_none());
    }
}

//! Account linking over the file-backed link table, with the ledger mocked.

mod linking_tests {
    use std::sync::Arc;

    use ledgerlink::models::link::LinkRecord;
    use ledgerlink::services::{LinkingError, LinkingService};
    use ledgerlink::store::{FileLinkStore, LinkStore};
    use ledgerlink::upstream::LedgerClient;
    use serde_json::json;
    use tokio_test::assert_ok;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zeroize::Zeroizing;

    fn ledger(server: &MockServer) -> LedgerClient {
        LedgerClient::new(
            reqwest::Client::new(),
            server.uri(),
            Zeroizing::new("lm-token".into()),
        )
    }

    fn service(server: &MockServer, dir: &tempfile::TempDir) -> (LinkingService, Arc<FileLinkStore>) {
        let store = Arc::new(FileLinkStore::in_dir(dir.path()));
        let svc = LinkingService::new(store.clone(), ledger(server));
        (svc, store)
    }

    async fn mount_assets(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/assets"))
            .and(header("authorization", "Bearer lm-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "assets": [
                    {"id": 42, "name": "Checking", "currency": "eur", "type_name": "cash"},
                    {"id": 7, "name": "Savings", "currency": "eur", "type_name": "cash"}
                ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_link_shows_up_in_asset_listing() {
        let server = MockServer::start().await;
        mount_assets(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, store) = service(&server, &dir);

        assert_ok!(svc.link_accounts(42, "acc-abc").await);

        let assets = svc.list_ledger_assets_with_linkage().await.unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].asset.id, 42);
        assert_eq!(assets[0].linked_account.as_deref(), Some("acc-abc"));
        assert_eq!(assets[1].asset.id, 7);
        assert_eq!(assets[1].linked_account, None);

        let wire = serde_json::to_value(&assets[0]).unwrap();
        assert_eq!(wire["linked_account"], "acc-abc");
        assert_eq!(wire["type_name"], "cash");

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["links"][0]["lunchmoneyId"], 42);
        assert_eq!(on_disk["links"][0]["gocardlessId"], "acc-abc");
        assert!(on_disk["links"][0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_missing_link_file_is_created_empty() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, store) = service(&server, &dir);
        assert!(!store.path().exists());

        let record = svc.links().await.unwrap();
        assert!(record.links.is_empty());
        assert!(store.path().exists());

        let on_disk: LinkRecord =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, LinkRecord::default());
    }

    #[tokio::test]
    async fn test_relinking_releases_previous_partners() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(&server, &dir);

        svc.link_accounts(42, "acc-abc").await.unwrap();
        svc.link_accounts(7, "acc-abc").await.unwrap();
        svc.link_accounts(7, "acc-xyz").await.unwrap();

        let record = svc.links().await.unwrap();
        assert_eq!(record.links.len(), 1);
        assert_eq!(record.linked_account(7), Some("acc-xyz"));
        assert_eq!(record.linked_account(42), None);
        assert_eq!(record.linked_asset("acc-abc"), None);
        assert!(record.is_injective());

        // a second store over the same directory reads back the same table
        let reread = FileLinkStore::in_dir(dir.path()).read_links().await.unwrap();
        assert_eq!(reread, record);
    }

    #[tokio::test]
    async fn test_unlinking_is_idempotent() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(&server, &dir);

        svc.link_accounts(42, "acc-abc").await.unwrap();

        assert_eq!(svc.unlink_accounts(99, None).await.unwrap(), 0);
        assert_eq!(svc.unlink_accounts(42, Some("acc-other")).await.unwrap(), 0);
        assert_eq!(svc.links().await.unwrap().links.len(), 1);

        assert_eq!(svc.unlink_accounts(42, Some("acc-abc")).await.unwrap(), 1);
        assert_eq!(svc.unlink_accounts(42, None).await.unwrap(), 0);
        assert!(svc.links().await.unwrap().links.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_links_are_all_persisted() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(&server, &dir);

        let tasks = (0..20i64).map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.link_accounts(i, &format!("acc-{}", i)).await })
        });
        for result in futures::future::join_all(tasks).await {
            assert_ok!(result.unwrap());
        }

        let record = FileLinkStore::in_dir(dir.path()).read_links().await.unwrap();
        assert_eq!(record.links.len(), 20);
        assert!(record.is_injective());
        for i in 0..20i64 {
            assert_eq!(record.linked_account(i), Some(format!("acc-{}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "Access token does not exist."
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(&server, &dir);

        let err = svc.list_ledger_assets_with_linkage().await.unwrap_err();
        match &err {
            LinkingError::Ledger(e) => assert_eq!(e.status(), Some(401)),
            other => panic!("expected ledger error, got {:?}", other),
        }
        assert!(err.to_string().contains("Access token does not exist."));
    }

    #[tokio::test]
    async fn test_link_file_from_older_servers_is_readable() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, store) = service(&server, &dir);
        std::fs::write(
            store.path(),
            r#"{"links":[{"lunchmoneyId":42,"gocardlessId":"acc-abc","createdAt":"2024-05-01T12:00:00.123456"}]}"#,
        )
        .unwrap();

        let record = assert_ok!(store.read_links().await);
        assert_eq!(record.linked_account(42), Some("acc-abc"));

        // the next write upgrades the timestamp to RFC 3339
        svc.link_accounts(7, "acc-xyz").await.unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(on_disk["links"][0]["createdAt"]
            .as_str()
            .unwrap()
            .ends_with('Z'));
    }

    #[tokio::test]
    async fn test_written_links_read_back_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLinkStore::in_dir(dir.path());
        let now = chrono::Utc::now();

        let mut record = LinkRecord::default();
        record.link(42, "acc-abc", now);
        record.link(7, "acc-xyz", now);
        record.link(13, "acc-def", now);
        assert_ok!(store.write_links(&record).await);

        let mut expected = record.links.clone();
        let mut read = store.read_links().await.unwrap().links;
        expected.sort_by_key(|l| l.ledger_asset_id);
        read.sort_by_key(|l| l.ledger_asset_id);
        assert_eq!(read, expected);
    }

    #[tokio::test]
    async fn test_corrupt_link_file_is_an_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (svc, store) = service(&server, &dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(svc.links().await, Err(LinkingError::Storage(_))));
    }
}

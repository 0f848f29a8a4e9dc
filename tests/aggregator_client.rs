//! Aggregator client behavior against a mocked upstream: bearer injection,
//! requisition detail fan-out and error propagation.

mod aggregator_client_tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, Utc};
    use ledgerlink::models::aggregator::NewRequisition;
    use ledgerlink::models::token::TokenLease;
    use ledgerlink::upstream::aggregator::AggregatorError;
    use ledgerlink::upstream::{
        AggregatorClient, AggregatorCredentials, TokenManager, UpstreamError,
    };
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zeroize::Zeroizing;

    /// A client whose token manager already holds a valid token, so no
    /// token endpoint is ever hit.
    fn client(server: &MockServer) -> AggregatorClient {
        client_at(server.uri())
    }

    fn client_at(base_url: String) -> AggregatorClient {
        let now = Utc::now();
        let lease = TokenLease {
            access_token: Zeroizing::new("test-access".into()),
            access_expires_at: now + Duration::hours(1),
            refresh_token: Zeroizing::new("test-refresh".into()),
            refresh_expires_at: now + Duration::days(30),
        };
        let http = reqwest::Client::new();
        let creds = AggregatorCredentials {
            secret_id: "id".into(),
            secret_key: Zeroizing::new("key".into()),
        };
        let tokens = Arc::new(TokenManager::with_lease(
            http.clone(),
            base_url.clone(),
            creds,
            lease,
        ));
        AggregatorClient::new(http, base_url, tokens)
    }

    #[tokio::test]
    async fn test_requests_carry_bearer_and_come_back_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/requisitions/"))
            .and(header("authorization", "Bearer test-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2,
                "next": null,
                "previous": null,
                "results": [
                    {"id": "newer", "created": "2024-05-02T00:00:00Z", "accounts": []},
                    {"id": "older", "created": "2024-05-01T00:00:00Z", "accounts": []}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server).list_requisitions().await.unwrap();
        let ids: Vec<_> = page.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn test_requisition_detail_resolves_every_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/requisitions/req-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "req-1",
                "status": "LN",
                "institution_id": "SANDBOXFINANCE_SFIN0000",
                "accounts": ["acc-1", "acc-2"],
                "link": "https://ob.example/start"
            })))
            .mount(&server)
            .await;
        for id in ["acc-1", "acc-2"] {
            Mock::given(method("GET"))
                .and(path(format!("/accounts/{}/", id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "iban": format!("GL00{}", id),
                    "status": "READY"
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let detail = client(&server).get_requisition_detail("req-1").await.unwrap();
        let ids: Vec<_> = detail.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["acc-1", "acc-2"]);

        let wire = serde_json::to_value(&detail).unwrap();
        assert_eq!(wire["id"], "req-1");
        assert_eq!(wire["link"], "https://ob.example/start");
        assert_eq!(wire["accounts"][0]["iban"], "GL00acc-1");
    }

    #[tokio::test]
    async fn test_one_failed_account_fails_the_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/requisitions/req-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "req-1",
                "accounts": ["acc-1", "acc-2"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "acc-1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-2/"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "summary": "Internal error"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_requisition_detail("req-1")
            .await
            .unwrap_err();
        match err {
            AggregatorError::Upstream(e) => {
                assert_eq!(e.status(), Some(500));
                assert!(e.to_string().contains("failed to fetch account details"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/requisitions/missing/"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "detail": "Not found.",
                "status_code": 404
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_requisition("missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "aggregator returned 404: failed to fetch requisition details: Not found."
        );
    }

    #[tokio::test]
    async fn test_create_requisition_translates_redirect_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/requisitions/"))
            .and(body_json(json!({
                "institution_id": "SANDBOXFINANCE_SFIN0000",
                "redirect": "http://localhost:5173/callback"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "req-new",
                "status": "CR",
                "accounts": [],
                "link": "https://ob.example/start/req-new"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params: NewRequisition = serde_json::from_value(json!({
            "institutionId": "SANDBOXFINANCE_SFIN0000",
            "redirectUrl": "http://localhost:5173/callback"
        }))
        .unwrap();
        let created = client(&server).create_requisition(&params).await.unwrap();
        assert_eq!(created.id, "req-new");
        assert_eq!(created.extra["link"], "https://ob.example/start/req-new");
    }

    #[tokio::test]
    async fn test_institutions_are_filtered_by_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/institutions/"))
            .and(query_param("country", "gb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "SANDBOXFINANCE_SFIN0000", "name": "Sandbox Finance", "countries": ["GB"]}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let institutions = client(&server).list_institutions("gb").await.unwrap();
        assert_eq!(institutions.len(), 1);
        assert_eq!(institutions[0].name, "Sandbox Finance");
    }

    #[tokio::test]
    async fn test_transactions_report_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/transactions/"))
            .and(query_param("date_from", "2024-05-01"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("http_x_ratelimit_account_success_limit", "4")
                    .insert_header("http_x_ratelimit_account_success_remaining", "3")
                    .insert_header("http_x_ratelimit_account_success_reset", "3600")
                    .set_body_json(json!({
                        "transactions": {
                            "booked": [{
                                "transactionId": "tx-1",
                                "bookingDate": "2024-05-02",
                                "transactionAmount": {"amount": "-12.50", "currency": "EUR"}
                            }],
                            "pending": []
                        }
                    })),
            )
            .mount(&server)
            .await;

        let date_from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let fetch = client(&server)
            .get_transactions("acc-1", date_from)
            .await
            .unwrap();
        assert!(!fetch.rate_limited);
        assert_eq!(fetch.transactions.booked.len(), 1);
        assert_eq!(fetch.rate_limit.limit, 4);
        assert_eq!(fetch.rate_limit.remaining, 3);
    }

    #[tokio::test]
    async fn test_transactions_429_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/transactions/"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("http_x_ratelimit_account_success_limit", "4")
                    .insert_header("http_x_ratelimit_account_success_remaining", "0")
                    .set_body_json(json!({"summary": "Rate limit exceeded"})),
            )
            .mount(&server)
            .await;

        let date_from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let fetch = client(&server)
            .get_transactions("acc-1", date_from)
            .await
            .unwrap();
        assert!(fetch.rate_limited);
        assert!(fetch.transactions.booked.is_empty());
        assert_eq!(fetch.rate_limit.remaining, 0);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_a_connectivity_error() {
        // bind then drop, leaving a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = client_at(format!("http://127.0.0.1:{}", port))
            .get_account("acc-1")
            .await
            .unwrap_err();
        match err {
            AggregatorError::Upstream(e @ UpstreamError::Connectivity { .. }) => {
                assert_eq!(e.status(), None);
                assert_eq!(e.to_string(), "could not reach aggregator");
            }
            other => panic!("expected connectivity error, got {:?}", other),
        }
    }
}

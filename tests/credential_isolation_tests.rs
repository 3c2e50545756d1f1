//! Concurrent requests never observe each other's credential
//!
//! The executor below parks every call on a barrier until all requests are
//! in flight, then answers with the token it was handed. Each request must
//! get its own token back.

use async_trait::async_trait;
use erp_gateway::prelude::*;
use serde_json::{Value, json};
use tokio::sync::Barrier;

struct EchoTokenExecutor {
    barrier: Barrier,
}

#[async_trait]
impl QueryExecutor for EchoTokenExecutor {
    async fn execute(
        &self,
        _query: &QueryText,
        credential: &CredentialContext,
    ) -> GatewayResult<Vec<UpstreamRow>> {
        self.barrier.wait().await;
        tokio::task::yield_now().await;

        let mut row = UpstreamRow::new();
        row.insert("ID".to_string(), json!(1));
        row.insert("TOKEN".to_string(), json!(credential.token()));
        Ok(vec![row])
    }
}

fn sessions_schema() -> ResourceSchema {
    ResourceSchema::new("sessions", "TSISES", "id")
        .field("ID", "id", FieldKind::Integer)
        .field("TOKEN", "token", FieldKind::Text)
        .pagination(PaginationStrategy::FetchAllThenSlice { max_rows: 10 })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_requests_keep_their_own_credential() {
    const REQUESTS: usize = 16;

    let executor: Arc<dyn QueryExecutor> = Arc::new(EchoTokenExecutor {
        barrier: Barrier::new(REQUESTS),
    });
    let service = Arc::new(EntityQueryService::<Value>::new(
        Arc::new(sessions_schema()),
        executor,
        100,
    ));

    let handles: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let token = format!("session-token-{}", i);
                let credential = CredentialContext::new(token.clone()).unwrap();
                let record = service.find_by_id(&credential, "1").await.unwrap().unwrap();
                (token, record)
            })
        })
        .collect();

    for handle in handles {
        let (token, record) = handle.await.unwrap();
        assert_eq!(record["token"], json!(token));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listing_requests_keep_their_own_credential() {
    let executor: Arc<dyn QueryExecutor> = Arc::new(EchoTokenExecutor {
        barrier: Barrier::new(2),
    });
    let service = Arc::new(EntityQueryService::<Value>::new(
        Arc::new(sessions_schema()),
        executor,
        100,
    ));

    let list = |token: &'static str| {
        let service = service.clone();
        async move {
            let credential = CredentialContext::new(token).unwrap();
            service
                .find_all(
                    &credential,
                    &FilterSpecification::new(),
                    None,
                    PageRequest::new(1, 10),
                )
                .await
                .unwrap()
        }
    };

    let (alice, bob) = tokio::join!(list("alice-token"), list("bob-token"));

    assert_eq!(alice.data[0]["token"], json!("alice-token"));
    assert_eq!(bob.data[0]["token"], json!("bob-token"));
}

#[tokio::test]
async fn test_in_memory_executor_records_each_callers_token() {
    let executor = InMemoryExecutor::new().with_table(
        "TGFPRO",
        vec![serde_json::from_value(json!({ "CODPROD": 1, "DESCRPROD": "A" })).unwrap()],
    );
    let products = EntityQueryService::<Value>::new(
        Arc::new(
            ResourceSchema::new("products", "TGFPRO", "id")
                .field("CODPROD", "id", FieldKind::Integer)
                .field("DESCRPROD", "description", FieldKind::Text),
        ),
        Arc::new(executor.clone()),
        100,
    );

    let first = CredentialContext::new("first-token").unwrap();
    let second = CredentialContext::new("second-token").unwrap();
    let (a, b) = tokio::join!(
        products.find_by_id(&first, "1"),
        products.find_by_id(&second, "1")
    );
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());

    let mut tokens: Vec<String> = executor.calls().into_iter().map(|c| c.token).collect();
    tokens.sort();
    assert_eq!(tokens, vec!["first-token", "second-token"]);
}

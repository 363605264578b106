use esbulk::bulker::{BulkerError, IndexSetup, setup_index};
use esbulk::test_support::{AdminCall, FakeCluster};
use serde_json::json;

#[tokio::test]
async fn existing_index_is_deleted_then_created() {
    let cluster = FakeCluster::with_index("cases");

    let outcome = setup_index(&cluster, "cases", None).await.unwrap();

    assert_eq!(outcome, IndexSetup::Recreated);
    assert_eq!(
        cluster.admin_calls(),
        vec![
            AdminCall::Exists("cases".into()),
            AdminCall::Delete("cases".into()),
            AdminCall::Create("cases".into()),
        ]
    );
}

#[tokio::test]
async fn missing_index_is_only_created() {
    let cluster = FakeCluster::new();

    let outcome = setup_index(&cluster, "cases", None).await.unwrap();

    assert_eq!(outcome, IndexSetup::Created);
    assert_eq!(
        cluster.admin_calls(),
        vec![
            AdminCall::Exists("cases".into()),
            AdminCall::Create("cases".into()),
        ]
    );
}

#[tokio::test]
async fn creation_body_is_forwarded() {
    let cluster = FakeCluster::new();
    let mapping = json!({
        "settings": {"number_of_shards": 1},
        "mappings": {"properties": {"decide_date": {"type": "keyword"}}}
    });

    setup_index(&cluster, "cases", Some(&mapping)).await.unwrap();

    assert_eq!(cluster.create_body("cases"), Some(mapping));
}

#[tokio::test]
async fn setup_failure_names_the_index() {
    match setup_index(&BrokenAdmin, "cases", None).await {
        Err(BulkerError::IndexSetup { index, .. }) => assert_eq!(index, "cases"),
        other => panic!("expected index setup error, got {other:?}"),
    }
}

struct BrokenAdmin;

impl esbulk::elastic::IndexAdmin for BrokenAdmin {
    async fn index_exists(&self, _index: &str) -> Result<bool, esbulk::elastic::ElasticError> {
        Err(esbulk::elastic::ElasticError::status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "master_not_discovered_exception".into(),
        ))
    }

    async fn delete_index(&self, _index: &str) -> Result<(), esbulk::elastic::ElasticError> {
        Ok(())
    }

    async fn create_index(
        &self,
        _index: &str,
        _body: Option<&serde_json::Value>,
    ) -> Result<(), esbulk::elastic::ElasticError> {
        Ok(())
    }

    async fn refresh_index(&self, _index: &str) -> Result<(), esbulk::elastic::ElasticError> {
        Ok(())
    }
}

//! Shared integration-test scaffolding: an ephemeral DynamoDB-local container
//! plus the four tables and their secondary indices (§3 Data Model), mirroring
//! the teacher's `TestDatabase` pattern of provisioning a disposable backing
//! store per test run rather than mocking the client.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use mail_search::config::TableNames;
use mail_search::store::Store;
use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

fn attr(name: &str, ty: ScalarAttributeType) -> AttributeDefinition {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ty)
        .build()
        .expect("valid attribute definition")
}

fn key(name: &str, ty: KeyType) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(ty)
        .build()
        .expect("valid key schema element")
}

fn gsi(name: &str, hash: &str, range: &str) -> GlobalSecondaryIndex {
    GlobalSecondaryIndex::builder()
        .index_name(name)
        .key_schema(key(hash, KeyType::Hash))
        .key_schema(key(range, KeyType::Range))
        .projection(Projection::builder().projection_type(ProjectionType::All).build())
        .build()
        .expect("valid global secondary index")
}

/// An ephemeral `amazon/dynamodb-local` container with the records, terms,
/// checkpoints and status tables already created (§3).
pub struct TestStore {
    pub store: Store,
    pub tables: TableNames,
    _container: ContainerAsync<GenericImage>,
}

impl TestStore {
    pub async fn new() -> Self {
        let image = GenericImage::new("amazon/dynamodb-local", "2.5.3")
            .with_wait_for(WaitFor::message_on_stdout("CorsParams"))
            .with_cmd(["-jar", "DynamoDBLocal.jar", "-inMemory", "-sharedDb"]);
        let container = image.start().await.expect("dynamodb-local container starts");

        let host = container.get_host().await.expect("container host");
        let port = container
            .get_host_port_ipv4(8000)
            .await
            .expect("container maps port 8000");
        let endpoint = format!("http://{host}:{port}");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-west-1"))
            .credentials_provider(Credentials::for_tests())
            .endpoint_url(endpoint)
            .load()
            .await;
        let client = Client::new(&sdk_config);

        let suffix = std::process::id();
        let tables = TableNames {
            records: format!("test-records-{suffix}"),
            terms: format!("test-terms-{suffix}"),
            checkpoints: format!("test-checkpoints-{suffix}"),
            status: format!("test-status-{suffix}"),
        };

        create_records_table(&client, &tables.records).await;
        create_terms_table(&client, &tables.terms).await;
        create_checkpoints_table(&client, &tables.checkpoints).await;
        create_status_table(&client, &tables.status).await;

        let store = Store::from_client(client, tables.clone(), 2);
        Self { store, tables, _container: container }
    }
}

async fn create_records_table(client: &Client, name: &str) {
    client
        .create_table()
        .table_name(name)
        .billing_mode(BillingMode::PayPerRequest)
        .attribute_definitions(attr("list", ScalarAttributeType::S))
        .attribute_definitions(attr("month_id", ScalarAttributeType::S))
        .attribute_definitions(attr("date", ScalarAttributeType::S))
        .attribute_definitions(attr("authorkey_date", ScalarAttributeType::S))
        .attribute_definitions(attr("emailkey_date", ScalarAttributeType::S))
        .attribute_definitions(attr("authorkey", ScalarAttributeType::S))
        .attribute_definitions(attr("emailkey", ScalarAttributeType::S))
        .attribute_definitions(attr("datekey", ScalarAttributeType::N))
        .key_schema(key("list", KeyType::Hash))
        .key_schema(key("month_id", KeyType::Range))
        .global_secondary_indexes(gsi("list_date", "list", "date"))
        .global_secondary_indexes(gsi("list_authorkey_date", "list", "authorkey_date"))
        .global_secondary_indexes(gsi("list_emailkey_date", "list", "emailkey_date"))
        .global_secondary_indexes(gsi("authorkey_date", "authorkey", "date"))
        .global_secondary_indexes(gsi("emailkey_date", "emailkey", "date"))
        .global_secondary_indexes(gsi("datekey_date", "datekey", "date"))
        .send()
        .await
        .expect("records table creates");
}

async fn create_terms_table(client: &Client, name: &str) {
    client
        .create_table()
        .table_name(name)
        .billing_mode(BillingMode::PayPerRequest)
        .attribute_definitions(attr("p", ScalarAttributeType::S))
        .attribute_definitions(attr("s", ScalarAttributeType::S))
        .attribute_definitions(attr("t", ScalarAttributeType::S))
        .attribute_definitions(attr("d", ScalarAttributeType::S))
        .key_schema(key("p", KeyType::Hash))
        .key_schema(key("s", KeyType::Range))
        .global_secondary_indexes(gsi("term_date", "t", "d"))
        .send()
        .await
        .expect("terms table creates");
}

async fn create_checkpoints_table(client: &Client, name: &str) {
    client
        .create_table()
        .table_name(name)
        .billing_mode(BillingMode::PayPerRequest)
        .attribute_definitions(attr("list", ScalarAttributeType::S))
        .key_schema(key("list", KeyType::Hash))
        .send()
        .await
        .expect("checkpoints table creates");
}

async fn create_status_table(client: &Client, name: &str) {
    client
        .create_table()
        .table_name(name)
        .billing_mode(BillingMode::PayPerRequest)
        .attribute_definitions(attr("pk", ScalarAttributeType::N))
        .key_schema(key("pk", KeyType::Hash))
        .send()
        .await
        .expect("status table creates");
}

/// Build a `Mail` with sensible defaults, overriding only what a test cares about.
pub fn sample_mail(list: &str, month: &str, id: &str) -> mail_search::archive::Mail {
    mail_search::archive::Mail {
        list: list.to_string(),
        month: month.to_string(),
        id: id.to_string(),
        subject: "Re: SSLSocket timeout".to_string(),
        author: "James Gosling".to_string(),
        email: "james.gosling@sun.com".to_string(),
        date: "2025-02-01T00:00:00Z".to_string(),
        body: "The handshake deadline fires before the read completes.".to_string(),
    }
}

use std::sync::Arc;

use catalog_api::api::routes::create_router;
use catalog_api::seed;
use catalog_api::store::MemoryStore;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn post_empty(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn put(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}

/// Spawn a freshly seeded server on an ephemeral port. Every test gets its
/// own store, so tests stay independent.
async fn spawn_server() -> TestClient {
    let store = Arc::new(MemoryStore::new());
    seed::load_seed_data(&*store)
        .await
        .expect("failed to seed store");

    let app = create_router().with_state(store);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });

    TestClient::new(format!("http://{}", addr))
}

async fn body(resp: reqwest::Response) -> Value {
    resp.json().await.expect("response was not JSON")
}

fn names(collection: &Value) -> Vec<&str> {
    collection["value"]
        .as_array()
        .expect("missing value array")
        .iter()
        .map(|p| p["Name"].as_str().expect("missing Name"))
        .collect()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let client = spawn_server().await;
    let resp = client.get("/health").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["status"], "healthy");
}

#[tokio::test]
async fn seeded_products_are_listed_with_categories() {
    let client = spawn_server().await;
    let resp = client.get("/Products").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let collection = body(resp).await;
    let products = collection["value"].as_array().unwrap();
    assert_eq!(products.len(), 5);
    assert_eq!(products[0]["Name"], "Laptop");
    assert_eq!(products[0]["Category"]["Name"], "Electronics");
}

#[tokio::test]
async fn filter_returns_exact_subset_in_original_order() {
    let client = spawn_server().await;
    let resp = client.get("/Products?$filter=Price%20gt%20500").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let collection = body(resp).await;
    assert_eq!(names(&collection), vec!["Laptop", "Smartphone"]);
}

#[tokio::test]
async fn unprefixed_query_param_spelling_is_accepted() {
    let client = spawn_server().await;
    let resp = client.get("/Products?filter=Price%20gt%20500").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(names(&body(resp).await), vec!["Laptop", "Smartphone"]);
}

#[tokio::test]
async fn malformed_filter_is_a_client_error() {
    let client = spawn_server().await;
    let resp = client
        .get("/Products?$filter=Price%20%3E%20500") // "Price > 500"
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body(resp).await;
    assert!(err["error"].as_str().unwrap().contains("malformed query"));
}

#[tokio::test]
async fn orderby_top_skip_and_count() {
    let client = spawn_server().await;
    let resp = client
        .get("/Products?$orderby=Price%20desc&$skip=1&$top=2&$count=true")
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let collection = body(resp).await;
    assert_eq!(collection["@odata.count"], 5);
    assert_eq!(names(&collection), vec!["Smartphone", "Tablet"]);
}

#[tokio::test]
async fn top_above_cap_is_clamped_not_rejected() {
    let client = spawn_server().await;
    let resp = client.get("/Products?$top=1000").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // Seed data is well under the cap of 100; the point is that an
    // over-cap request still succeeds.
    assert_eq!(body(resp).await["value"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn select_projects_requested_fields_only() {
    let client = spawn_server().await;
    let resp = client
        .get("/Products?$filter=Price%20gt%20500&$select=Name,Price")
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let collection = body(resp).await;
    let first = collection["value"][0].as_object().unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.contains_key("Name"));
    assert!(first.contains_key("Price"));
}

#[tokio::test]
async fn get_by_id_supports_select_and_expand() {
    let client = spawn_server().await;
    let resp = client.get("/Products/1?$select=Name,Price").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let projected = body(resp).await;
    let fields = projected.as_object().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields["Name"], "Laptop");
    assert_eq!(fields["Price"], 999.99);

    let resp = client.get("/Products/1?$expand=Category").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["Category"]["Name"], "Electronics");

    let resp = client.get("/Categories/1?$select=Name").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let projected = body(resp).await;
    assert_eq!(projected.as_object().unwrap().len(), 1);
    assert_eq!(projected["Name"], "Electronics");
}

#[tokio::test]
async fn get_by_id_rejects_unknown_expand() {
    let client = spawn_server().await;
    let resp = client.get("/Products/1?$expand=Supplier").await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.get("/Categories/1?$expand=Category").await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_then_get_round_trips() {
    let client = spawn_server().await;
    let resp = client
        .post(
            "/Products",
            json!({"Name": "Monitor", "Price": 249.5, "CategoryId": 1}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body(resp).await;
    let id = created["Id"].as_i64().unwrap();

    let resp = client.get(&format!("/Products/{}", id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = body(resp).await;
    assert_eq!(fetched["Name"], "Monitor");
    assert_eq!(fetched["Price"], 249.5);
    assert_eq!(fetched["CategoryId"], 1);
}

#[tokio::test]
async fn post_with_invalid_body_reports_field_errors() {
    let client = spawn_server().await;
    let resp = client
        .post(
            "/Products",
            json!({"Name": "", "Price": -5.0, "CategoryId": 1}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let err = body(resp).await;
    let fields: Vec<&str> = err["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["Name", "Price"]);
}

#[tokio::test]
async fn post_with_duplicate_id_is_rejected() {
    let client = spawn_server().await;
    let resp = client
        .post(
            "/Products",
            json!({"Id": 1, "Name": "Clone", "Price": 1.0, "CategoryId": 1}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn put_overwrites_fields_and_keeps_id() {
    let client = spawn_server().await;
    let resp = client
        .put(
            "/Products/1",
            json!({"Name": "Gaming Laptop", "Price": 1499.0, "CategoryId": 1}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get("/Products/1").await.unwrap();
    let fetched = body(resp).await;
    assert_eq!(fetched["Id"], 1);
    assert_eq!(fetched["Name"], "Gaming Laptop");
    assert_eq!(fetched["Price"], 1499.0);
}

#[tokio::test]
async fn put_on_missing_id_echoes_input_and_creates_nothing() {
    let client = spawn_server().await;
    let resp = client
        .put(
            "/Products/999",
            json!({"Name": "Ghost", "Price": 5.0, "CategoryId": 1}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let echoed = body(resp).await;
    assert_eq!(echoed["Name"], "Ghost");

    // No record may materialize at that id
    let resp = client.get("/Products/999").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let client = spawn_server().await;
    let resp = client.delete("/Products/2").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.delete("/Products/2").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get("/Products/2").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_includes_its_products() {
    let client = spawn_server().await;
    let resp = client.get("/Categories/1").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let category = body(resp).await;
    assert_eq!(category["Name"], "Electronics");
    let products: Vec<&str> = category["Products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["Name"].as_str().unwrap())
        .collect();
    assert_eq!(products, vec!["Laptop", "Smartphone", "Tablet"]);
}

#[tokio::test]
async fn missing_entities_return_404() {
    let client = spawn_server().await;
    assert_eq!(
        client.get("/Products/999").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        client.get("/Categories/999").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn expensive_products_function_is_further_queryable() {
    let client = spawn_server().await;
    let resp = client.get("/GetExpensiveProducts").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(names(&body(resp).await), vec!["Laptop", "Smartphone"]);

    // The already-filtered set accepts further query options
    let resp = client
        .get("/GetExpensiveProducts?$filter=Price%20lt%20700&$orderby=Name")
        .await
        .unwrap();
    assert_eq!(names(&body(resp).await), vec!["Smartphone"]);
}

#[tokio::test]
async fn unknown_expand_target_is_rejected() {
    let client = spawn_server().await;
    let resp = client.get("/Products?$expand=Supplier").await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.get("/Products?$expand=Category").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn reset_prices_zeroes_every_product() {
    let client = spawn_server().await;
    let resp = client.post_empty("/ResetPrices").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.text().await.unwrap(),
        "All prices have been reset to 0"
    );

    let resp = client.get("/Products").await.unwrap();
    let collection = body(resp).await;
    for product in collection["value"].as_array().unwrap() {
        assert_eq!(product["Price"], 0.0);
    }

    // Naturally idempotent under repeated calls
    let resp = client.post_empty("/ResetPrices").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use fieldops_api::app::{AppServices, build_app};
use fieldops_api::context::{COUNTRY_ID_HEADER, HeaderIdentityResolver, REGION_ID_HEADER, USER_ID_HEADER};
use fieldops_catalog::{Category, PriceOption, PriceValues, Product};
use fieldops_core::{CategoryId, ClientId, CountryId, PriceOptionId, ProductId, RegionId, StoreId, UserId};
use fieldops_infra::{
    AttachmentStore, Environment, FulfillmentConfig, InMemoryAttachmentStore, InMemoryFulfillmentStore, RetryPolicy,
};
use fieldops_inventory::Store;
use fieldops_parties::Client;
use fieldops_sales::OrderDraft;

const KENYA: CountryId = CountryId::from_db(1);
const NAIROBI: RegionId = RegionId::from_db(10);
const CLIENT: ClientId = ClientId::from_db(7);
const CRISPS: ProductId = ProductId::from_db(100);
const WHOLESALE: PriceOptionId = PriceOptionId::from_db(1);
const CRATE_TIER: PriceOptionId = PriceOptionId::from_db(2);
const STORE_A: StoreId = StoreId::from_db(1);
const STORE_B: StoreId = StoreId::from_db(2);

struct TestServer {
    base_url: String,
    store: Arc<InMemoryFulfillmentStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(Some(Arc::new(InMemoryAttachmentStore::default()))).await
    }

    async fn spawn_with(attachments: Option<Arc<dyn AttachmentStore>>) -> Self {
        let store = Arc::new(seeded_store());
        let config = FulfillmentConfig {
            balance_age_threshold_days: 3,
            retry: RetryPolicy::fixed(2, Duration::from_millis(1)),
            ..FulfillmentConfig::default()
        };
        let services = Arc::new(AppServices::new(store.clone(), attachments, &config, Environment::Development));

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services, Arc::new(HeaderIdentityResolver));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, handle }
    }

    fn post_order(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        with_identity(client.post(format!("{}/orders", self.base_url)))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn with_identity(req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.header(USER_ID_HEADER, "3")
        .header(REGION_ID_HEADER, NAIROBI.to_string())
        .header(COUNTRY_ID_HEADER, KENYA.to_string())
}

fn snacks() -> Category {
    Category {
        id: CategoryId::from_db(1),
        name: "Snacks".to_string(),
    }
}

fn seeded_store() -> InMemoryFulfillmentStore {
    let s = InMemoryFulfillmentStore::new();
    s.insert_client(Client {
        id: CLIENT,
        name: "Duka La Mama".to_string(),
        balance: "120.50".to_string(),
        region_id: Some(NAIROBI),
        country_id: Some(KENYA),
    });
    s.insert_product(Product {
        id: CRISPS,
        name: "Crisps 50g".to_string(),
        category: snacks(),
        unit_cost: PriceValues::new(Decimal::new(2000, 2)),
    });
    s.insert_price_option(PriceOption {
        id: WHOLESALE,
        name: "Wholesale".to_string(),
        category: snacks(),
        values: PriceValues::new(Decimal::new(4550, 2)),
    });
    s.insert_price_option(PriceOption {
        id: CRATE_TIER,
        name: "Crate".to_string(),
        category: Category {
            id: CategoryId::from_db(2),
            name: "Beverages".to_string(),
        },
        values: PriceValues::new(Decimal::new(60, 0)),
    });
    for (id, name, region) in [
        (STORE_A, "Westlands Depot", Some(NAIROBI)),
        (STORE_B, "National Warehouse", None),
    ] {
        s.insert_store(Store {
            id,
            name: name.to_string(),
            region_id: region,
            country_id: KENYA,
            active: true,
        });
    }
    s.set_stock(STORE_A, CRISPS, Some(5));
    s.set_stock(STORE_B, CRISPS, Some(10));
    s
}

fn order_body(quantity: i64, price_option_id: PriceOptionId) -> serde_json::Value {
    json!({
        "clientId": CLIENT.get(),
        "items": [{ "productId": CRISPS.get(), "quantity": quantity, "priceOptionId": price_option_id.get() }],
        "comment": "deliver before noon",
    })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_required_for_order_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&order_body(1, WHOLESALE))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .header(USER_ID_HEADER, "abc")
        .header(REGION_ID_HEADER, "10")
        .header(COUNTRY_ID_HEADER, "1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = with_identity(client.get(format!("{}/whoami", srv.base_url)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["userId"], 3);
    assert_eq!(body["regionId"], 10);
}

#[tokio::test]
async fn order_is_sourced_from_the_store_that_covers_it() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv.post_order(&client).json(&order_body(6, WHOLESALE)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["totalAmount"], "273.00");
    assert_eq!(body["order"]["amountPaid"], "0");
    assert_eq!(body["order"]["client"]["name"], "Duka La Mama");
    assert_eq!(body["order"]["requester"]["id"], 3);
    assert_eq!(body["order"]["comment"], "deliver before noon");
    assert_eq!(body["order"]["items"][0]["store"]["id"], STORE_B.get());
    assert_eq!(body["order"]["items"][0]["store"]["name"], "National Warehouse");
    assert_eq!(body["order"]["items"][0]["priceOption"]["name"], "Wholesale");
    assert_eq!(body["order"]["items"][0]["unitPrice"], "45.50");
    assert_eq!(body["order"]["items"][0]["unitCost"], "20.00");
    assert!(body["degradedPriceItems"].as_array().unwrap().is_empty());

    assert_eq!(srv.store.stock_of(STORE_A, CRISPS), Some(5));
    assert_eq!(srv.store.stock_of(STORE_B, CRISPS), Some(4));

    let id = body["order"]["id"].as_i64().unwrap();
    let res = with_identity(client.get(format!("{}/orders/{}", srv.base_url, id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["order"]["id"], id);
    assert_eq!(fetched["order"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn aged_balance_asks_for_confirmation() {
    let srv = TestServer::spawn().await;
    srv.store.insert_historical_order(
        OrderDraft {
            client_id: CLIENT,
            requested_by: UserId::from_db(3),
            region_id: NAIROBI,
            country_id: KENYA,
            comment: None,
            customer_name: None,
            customer_phone: None,
            attachment_url: None,
            total_amount: Decimal::new(50000, 2),
            items: vec![],
        },
        Decimal::new(10000, 2),
        Utc::now() - chrono::Duration::days(10) - chrono::Duration::hours(1),
    );
    let client = reqwest::Client::new();

    let res = srv.post_order(&client).json(&order_body(1, WHOLESALE)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["hasOutstandingBalance"], true);
    assert_eq!(body["balanceAge"], 10);
    assert_eq!(body["totalOutstandingBalance"], "400.00");
    assert_eq!(body["oldestUnpaidOrder"]["balance"], "400.00");
    assert!(body.get("order").is_none());
    assert_eq!(srv.store.order_count(), 1);

    let mut confirmed = order_body(1, WHOLESALE);
    confirmed["acknowledgeOutstandingBalance"] = json!(true);
    let res = srv.post_order(&client).json(&confirmed).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(srv.store.order_count(), 2);
}

#[tokio::test]
async fn business_rule_failures_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv.post_order(&client).json(&order_body(1, CRATE_TIER)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Beverages"));

    let res = srv.post_order(&client).json(&order_body(50, WHOLESALE)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

    let res = srv.post_order(&client).json(&order_body(0, WHOLESALE)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .post_order(&client)
        .header("content-type", "application/json")
        .body("{\"clientId\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(srv.store.stock_of(STORE_B, CRISPS), Some(10));
    assert_eq!(srv.store.order_count(), 0);
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut body = order_body(1, WHOLESALE);
    body["items"][0]["productId"] = json!(999);
    let res = srv.post_order(&client).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let mut body = order_body(1, WHOLESALE);
    body["clientId"] = json!(404);
    let res = srv.post_order(&client).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = with_identity(client.get(format!("{}/orders/12345", srv.base_url)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = with_identity(client.get(format!("{}/orders/abc", srv.base_url)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inline_attachment_is_stored_and_linked() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut body = order_body(2, WHOLESALE);
    body["attachment"] = json!({
        "fileName": "signed order.pdf",
        "content": base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4"),
    });
    let res = srv.post_order(&client).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["order"]["attachmentUrl"].as_str().unwrap().starts_with("memory://attachments/"));

    let mut both = order_body(1, WHOLESALE);
    both["attachmentUrl"] = json!("https://files.example/a.pdf");
    both["attachment"] = json!({ "fileName": "a.pdf", "content": "JVBERi0=" });
    let res = srv.post_order(&client).json(&both).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inline_attachment_is_refused_without_an_attachment_store() {
    let srv = TestServer::spawn_with(None).await;
    let client = reqwest::Client::new();

    let mut body = order_body(2, WHOLESALE);
    body["attachment"] = json!({
        "fileName": "signed order.pdf",
        "content": base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4"),
    });
    let res = srv.post_order(&client).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = res.json().await.unwrap();
    assert!(err["error"].as_str().unwrap().contains("attachment URL"));
    assert_eq!(srv.store.order_count(), 0);

    let mut linked = order_body(2, WHOLESALE);
    linked["attachmentUrl"] = json!("https://files.example/a.pdf");
    let res = srv.post_order(&client).json(&linked).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

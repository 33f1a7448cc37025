#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end: entity service over the real HTTP client against a mock server.

use httpmock::prelude::*;
use odata_entity::{
    BroadcastLoader, EntityKey, EntityStore, ODataEntityService, ODataEntityState, ODataError,
    ODataServiceConfig, OperationConfig, OperationTarget, RequestConfig, Store, UpdateMethod,
};
use odata_query::ODataQuery;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Product {
    id: i64,
    name: String,
}

type ProductStore = Store<ODataEntityState<Product>>;

fn service_for(server: &MockServer) -> (ODataEntityService<ProductStore>, Arc<BroadcastLoader>) {
    let mut config = ODataServiceConfig::default();
    config.api_root = server.url("/odata/Products");
    config.http.allow_insecure_http = true;

    let store = Arc::new(Store::new(
        "products",
        ODataEntityState::default().with_id_key("Id"),
    ));
    let loader = Arc::new(BroadcastLoader::default());
    let service = ODataEntityService::from_config(&config, store, loader.clone()).unwrap();
    (service, loader)
}

#[tokio::test]
async fn get_collection_then_single_entity() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/odata/Products")
            .query_param("$top", "2")
            .query_param("$count", "true");
        then.status(200).json_body(json!({
            "@odata.context": "$metadata#Products",
            "@odata.count": 40,
            "value": [{"Id": 1, "Name": "Tea"}, {"Id": 2, "Name": "Milk"}]
        }));
    });
    let single = server.mock(|when, then| {
        when.method(GET).path("/odata/Products(7)");
        then.status(200).json_body(json!({
            "@odata.context": "$metadata#Products/$entity",
            "Id": 7,
            "Name": "Coffee"
        }));
    });

    let (service, _) = service_for(&server);

    let query = ODataQuery::new().with_top(2).with_count(true);
    let page: Vec<Product> = service
        .get_all(RequestConfig::new().with_query(query))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[1].name, "Milk");
    assert_eq!(service.store().odata_count(), Some(40));
    assert_eq!(
        service.store().odata_context().as_deref(),
        Some("$metadata#Products")
    );

    let coffee: Option<Product> = service
        .get_by_id(&EntityKey::from(7), RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(
        coffee,
        Some(Product {
            id: 7,
            name: "Coffee".to_owned()
        })
    );
    // single-entity responses never touch the cached metadata
    assert_eq!(service.store().odata_count(), Some(40));

    let state = service.store().current_state();
    assert_eq!(state.ids, ["1", "2", "7"]);
    assert_eq!(state.get("7").map(|p| p.name.as_str()), Some("Coffee"));

    list.assert();
    single.assert();
}

#[tokio::test]
async fn update_with_no_content_returns_submitted_entity() {
    let server = MockServer::start();
    let patch = server.mock(|when, then| {
        when.method(PATCH)
            .path("/odata/Products(3)")
            .json_body(json!({"Name": "Green tea"}));
        then.status(204);
    });

    let (service, _) = service_for(&server);
    let result = service
        .update(
            &EntityKey::from(3),
            &json!({"Name": "Green tea"}),
            RequestConfig::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"Name": "Green tea"})));
    patch.assert();
}

#[tokio::test]
async fn update_with_null_body_returns_submitted_entity() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/odata/Products('A-1')");
        then.status(200)
            .header("content-type", "application/json")
            .body("null");
    });

    let (service, _) = service_for(&server);
    let result = service
        .update(
            &EntityKey::from("A-1"),
            &json!({"Name": "Green tea"}),
            RequestConfig::new().with_method(UpdateMethod::Put),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"Name": "Green tea"})));
}

#[tokio::test]
async fn add_and_delete() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/odata/Products")
            .json_body(json!({"Id": 0, "Name": "Cocoa"}));
        then.status(201).json_body(json!({
            "@odata.context": "$metadata#Products/$entity",
            "Id": 12,
            "Name": "Cocoa"
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/odata/Products(12)");
        then.status(204);
    });

    let (service, _) = service_for(&server);

    let created = service
        .add(
            &Product {
                id: 0,
                name: "Cocoa".to_owned(),
            },
            RequestConfig::new(),
        )
        .await
        .unwrap();
    assert_eq!(created, Some(json!({"Id": 12, "Name": "Cocoa"})));
    assert!(service.store().current_state().get("12").is_some());

    let deleted = service
        .delete(&EntityKey::from(12), RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(deleted, None);
    assert!(service.store().current_state().get("12").is_none());

    post.assert();
    delete.assert();
}

#[tokio::test]
async fn function_updates_store_through_updater() {
    let server = MockServer::start();
    let function = server.mock(|when, then| {
        when.method(GET)
            .path("/odata/Products/Shop.TopSellers(year=2024)");
        then.status(200).json_body(json!({
            "@odata.context": "$metadata#Products",
            "value": [{"Id": 5, "Name": "Espresso"}]
        }));
    });

    let (service, loader) = service_for(&server);
    let mut events = loader.subscribe();

    let config = OperationConfig::new()
        .with_namespace("Shop")
        .with_param("year", 2024)
        .with_store_updater(|store: &ProductStore, response| {
            let products: Vec<Product> = response
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .unwrap_or_default()
                .unwrap_or_default();
            store.replace_state(|state| {
                let mut next = state.clone();
                next.set_entities(products.into_iter().map(|p| (p.id.to_string(), p)));
                next
            });
        });

    let result = service
        .function(&OperationTarget::Collection, "TopSellers", config)
        .await
        .unwrap();

    assert_eq!(result, Some(json!([{"Id": 5, "Name": "Espresso"}])));
    let state = service.store().current_state();
    assert_eq!(state.get("5").map(|p| p.name.as_str()), Some("Espresso"));
    assert_eq!(state.metadata.context.as_deref(), Some("$metadata#Products"));

    assert!(events.recv().await.unwrap().loading);
    assert!(!events.recv().await.unwrap().loading);
    function.assert();
}

#[tokio::test]
async fn failed_action_keeps_loading_flag() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/odata/Products(9)/Archive");
        then.status(409).body("already archived");
    });

    let (service, loader) = service_for(&server);
    let mut events = loader.subscribe();

    let err = service
        .action(
            &OperationTarget::Entity(EntityKey::from(9)),
            "Archive",
            OperationConfig::new().with_param("reason", "eol"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ODataError::Http(_)));
    assert_eq!(err.status(), Some(http::StatusCode::CONFLICT));

    let started = events.recv().await.unwrap();
    assert!(started.loading);
    assert_eq!(started.entity_id.as_deref(), Some("9"));
    assert!(events.try_recv().is_err());
}

#[test]
fn relative_api_root_is_rejected() {
    let mut config = ODataServiceConfig::default();
    config.api_root = "/odata/Products".to_owned();

    let store = Arc::new(Store::new("products", ODataEntityState::<Product>::default()));
    let err = ODataEntityService::from_config(&config, store, Arc::new(BroadcastLoader::default()))
        .unwrap_err();

    assert!(matches!(err, ODataError::InvalidUrl { .. }));
}

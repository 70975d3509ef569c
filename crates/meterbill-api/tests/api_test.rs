//! HTTP tests for the entity routes
//!
//! Every test runs against a fresh in-memory store, so no database is
//! needed.

use actix_web::{http::StatusCode, test, web, App};
use meterbill_api::{configure_routes, json_config, path_config};
use meterbill_db::EntityStore;
use serde_json::{json, Value};

macro_rules! test_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(EntityStore::in_memory()))
                .app_data(json_config(64 * 1024))
                .app_data(path_config())
                .configure(configure_routes),
        )
        .await
    };
}

macro_rules! post {
    ($app:expr, $uri:expr, $body:expr) => {
        test::call_service(
            &$app,
            test::TestRequest::post().uri($uri).set_json($body).to_request(),
        )
        .await
    };
}

macro_rules! get {
    ($app:expr, $uri:expr) => {
        test::call_service(&$app, test::TestRequest::get().uri($uri).to_request()).await
    };
}

macro_rules! delete {
    ($app:expr, $uri:expr) => {
        test::call_service(&$app, test::TestRequest::delete().uri($uri).to_request()).await
    };
}

#[actix_web::test]
async fn test_ping() {
    let app = test_app!();
    let resp = get!(app, "/api/ping");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_customer_lifecycle() {
    let app = test_app!();

    let resp = post!(
        app,
        "/api/customers",
        json!({ "name": "John Smith", "address": "12 High St", "phone": "555-0100" })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["customer_id"], 1);
    assert_eq!(created["type"], "Residential");

    let resp = get!(app, "/api/customers/1");
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Value = test::read_body_json(resp).await;
    assert_eq!(fetched, created);

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri("/api/customers/1")
            .set_json(json!({ "address": "New Address" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["address"], "New Address");
    assert_eq!(updated["name"], "John Smith");
    assert_eq!(updated["phone"], "555-0100");

    let resp = delete!(app, "/api/customers/1");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Customer deleted successfully");

    let resp = get!(app, "/api/customers/1");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["status"], 404);
}

#[actix_web::test]
async fn test_legacy_customer_name_field() {
    let app = test_app!();

    let resp = post!(
        app,
        "/api/customers",
        json!({ "customer_name": "Acme Ltd", "type": "Commercial" })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "Acme Ltd");
    assert_eq!(body["type"], "Commercial");
}

#[actix_web::test]
async fn test_put_clears_nullable_field() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "Jane", "phone": "555-0199" }));

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/customers/1")
            .set_json(json!({ "phone": null }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["phone"], Value::Null);
    assert_eq!(body["name"], "Jane");
}

#[actix_web::test]
async fn test_meter_for_missing_customer_is_bad_request() {
    let app = test_app!();

    let resp = post!(
        app,
        "/api/meters",
        json!({ "customer_id": 999, "meter_number": "X" })
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_reference");
}

#[actix_web::test]
async fn test_duplicate_meter_number_is_conflict() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "John Smith" }));

    let first = post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001" })
    );
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001" })
    );
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(second).await;
    assert_eq!(body["error"], "duplicate_key");
}

#[actix_web::test]
async fn test_meter_reads_include_customer_name() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "John Smith" }));
    post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001", "installation_date": "2023-05-14" })
    );

    let resp = get!(app, "/api/meters");
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list[0]["customer_name"], "John Smith");
    assert_eq!(list[0]["status"], "Active");

    let resp = get!(app, "/api/meters/1");
    let one: Value = test::read_body_json(resp).await;
    assert_eq!(one["meter_number"], "MTR-001");
    assert_eq!(one["installation_date"], "2023-05-14");
    assert_eq!(one["customer_name"], "John Smith");
}

#[actix_web::test]
async fn test_meter_writes_include_customer_name() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "John Smith" }));
    post!(app, "/api/customers", json!({ "name": "Jane Doe" }));

    let resp = post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001" })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["meter_id"], 1);
    assert_eq!(created["customer_name"], "John Smith");

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri("/api/meters/1")
            .set_json(json!({ "customer_id": 2 }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["customer_id"], 2);
    assert_eq!(updated["customer_name"], "Jane Doe");

    let resp = get!(app, "/api/meters/1");
    let fetched: Value = test::read_body_json(resp).await;
    assert_eq!(fetched, updated);
}

#[actix_web::test]
async fn test_bill_from_reading_and_delete_blocking() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "John Smith" }));
    post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001" })
    );
    let resp = post!(
        app,
        "/api/readings",
        json!({ "meter_id": 1, "reading_date": "2024-10-01", "units_consumed": 300 })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = post!(
        app,
        "/api/bills",
        json!({ "customer_id": 1, "reading_id": 1, "amount_due": 36.0 })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bill: Value = test::read_body_json(resp).await;
    assert_eq!(bill["units"], json!(300.0));
    assert_eq!(bill["billing_date"], "2024-10-01");
    assert_eq!(bill["amount_due"], json!(36.0));
    assert_eq!(bill["status"], "Pending");
    assert_eq!(bill["reading_id"], 1);

    // Each parent is held by its child
    for uri in ["/api/customers/1", "/api/meters/1", "/api/readings/1"] {
        let resp = delete!(app, uri);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "conflict");
    }

    // Unwinding bottom-up succeeds
    for uri in [
        "/api/bills/1",
        "/api/readings/1",
        "/api/meters/1",
        "/api/customers/1",
    ] {
        let resp = delete!(app, uri);
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }
}

#[actix_web::test]
async fn test_negative_units_rejected() {
    let app = test_app!();
    post!(app, "/api/customers", json!({ "name": "John Smith" }));
    post!(
        app,
        "/api/meters",
        json!({ "customer_id": 1, "meter_number": "MTR-001" })
    );

    let resp = post!(
        app,
        "/api/readings",
        json!({ "meter_id": 1, "reading_date": "2024-10-01", "units_consumed": -3 })
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
}

#[actix_web::test]
async fn test_malformed_input_is_bad_request() {
    let app = test_app!();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/customers")
            .insert_header(("content-type", "application/json"))
            .set_payload("{ not json")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_input");

    let resp = post!(app, "/api/customers", json!({ "address": "no name" }));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = get!(app, "/api/customers/abc");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_input");
}

#[actix_web::test]
async fn test_missing_records_are_not_found() {
    let app = test_app!();

    for uri in ["/api/meters/7", "/api/readings/7", "/api/bills/7"] {
        let resp = get!(app, uri);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let resp = delete!(app, "/api/bills/7");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

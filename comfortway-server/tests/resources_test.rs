//! Tests for the generic collection endpoints

mod common;

use common::*;
use serde_json::{json, Value};

/// Test: collection endpoints need a session
#[tokio::test]
async fn test_list_requires_session() {
    let ctx = create_test_server();

    let response = ctx.server.get("/v1/leads/getAllLeads").await;

    assert_eq!(response.status_code(), 401);
}

/// Test: create, read, update and list a lead
#[tokio::test]
async fn test_lead_crud() {
    let ctx = create_test_server();
    let (token, _) = register(&ctx.server, "asha@example.com", PASSWORD).await;

    let (name, value) = bearer(&token);
    let created = ctx
        .server
        .post("/v1/leads/newLead")
        .add_header(name, value)
        .json(&json!({ "name": "Boiler repair", "phone": "555-0100" }))
        .await;
    assert_eq!(created.status_code(), 201);
    let body: Value = created.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Lead created successfully");
    assert!(body["data"]["createdOn"].is_string());
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&token);
    let fetched: Value = ctx
        .server
        .get(&format!("/v1/leads/getLeadById/{}", id))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(fetched["data"]["name"], "Boiler repair");

    let (name, value) = bearer(&token);
    let updated = ctx
        .server
        .put(&format!("/v1/leads/updateLead/{}", id))
        .add_header(name, value)
        .json(&json!({ "phone": "555-0199", "id": "hijack", "createdOn": "1999-01-01" }))
        .await;
    assert_eq!(updated.status_code(), 200);
    let body: Value = updated.json();
    assert_eq!(body["message"], "Lead updated successfully");
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["phone"], "555-0199");
    assert_eq!(body["data"]["name"], "Boiler repair");
    assert_ne!(body["data"]["createdOn"], "1999-01-01");

    let (name, value) = bearer(&token);
    ctx.server
        .post("/v1/leads/newLead")
        .add_header(name, value)
        .json(&json!({ "name": "AC install" }))
        .await;

    let (name, value) = bearer(&token);
    let listed: Value = ctx
        .server
        .get("/v1/leads/getAllLeads")
        .add_header(name, value)
        .await
        .json();
    assert_eq!(listed["message"], "Leads fetched successfully");
    let names: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["AC install", "Boiler repair"]);
}

/// Test: non-object bodies are rejected
#[tokio::test]
async fn test_create_requires_object() {
    let ctx = create_test_server();
    let (token, _) = register(&ctx.server, "asha@example.com", PASSWORD).await;

    let (name, value) = bearer(&token);
    let response = ctx
        .server
        .post("/v1/leads/newLead")
        .add_header(name, value)
        .json(&json!(["not", "an", "object"]))
        .await;

    assert_eq!(response.status_code(), 400);
}

/// Test: only admins delete, and deleted documents are gone
#[tokio::test]
async fn test_delete_is_admin_only() {
    let ctx = create_test_server();
    let (admin, _) = create_user_with_role(&ctx, "admin@example.com", "admin").await;
    let (token, _) = register(&ctx.server, "asha@example.com", PASSWORD).await;

    let (name, value) = bearer(&token);
    let created: Value = ctx
        .server
        .post("/v1/leads/newLead")
        .add_header(name, value)
        .json(&json!({ "name": "Boiler repair" }))
        .await
        .json();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&token);
    let denied = ctx
        .server
        .delete(&format!("/v1/leads/deleteLead/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(denied.status_code(), 403);

    let (name, value) = bearer(&admin);
    let deleted = ctx
        .server
        .delete(&format!("/v1/leads/deleteLead/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(deleted.status_code(), 200);
    let body: Value = deleted.json();
    assert_eq!(body["message"], "Lead deleted successfully");

    let (name, value) = bearer(&admin);
    let gone = ctx
        .server
        .get(&format!("/v1/leads/getLeadById/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(gone.status_code(), 404);
    let body: Value = gone.json();
    assert_eq!(body["error"], "Lead not found");

    let (name, value) = bearer(&admin);
    let again = ctx
        .server
        .delete(&format!("/v1/leads/deleteLead/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(again.status_code(), 404);
}

/// Test: updating a missing document is 404
#[tokio::test]
async fn test_update_missing_document() {
    let ctx = create_test_server();
    let (token, _) = register(&ctx.server, "asha@example.com", PASSWORD).await;

    let (name, value) = bearer(&token);
    let response = ctx
        .server
        .put("/v1/maintenances/updateRequest/nope")
        .add_header(name, value)
        .json(&json!({ "status": "done" }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "Maintenance not found");
}

/// Test: the catalog is writable by staff only
#[tokio::test]
async fn test_products_staff_writable() {
    let ctx = create_test_server();
    let (sales, _) = create_user_with_role(&ctx, "sales@example.com", "sales").await;
    let (token, _) = register(&ctx.server, "asha@example.com", PASSWORD).await;

    let (name, value) = bearer(&token);
    let denied = ctx
        .server
        .post("/v1/products/newProduct")
        .add_header(name, value)
        .json(&json!({ "name": "Filter", "category": "hvac" }))
        .await;
    assert_eq!(denied.status_code(), 403);

    let (name, value) = bearer(&sales);
    let created = ctx
        .server
        .post("/v1/products/newProduct")
        .add_header(name, value)
        .json(&json!({ "name": "Filter", "category": "hvac" }))
        .await;
    assert_eq!(created.status_code(), 201);
    let body: Value = created.json();
    assert!(body["data"]["createdAt"].is_string());
    assert!(body["data"].get("createdOn").is_none());

    let (name, value) = bearer(&sales);
    ctx.server
        .post("/v1/products/newProduct")
        .add_header(name, value)
        .json(&json!({ "name": "Panel", "category": "solar" }))
        .await;

    // Any signed-in user can browse the catalog
    let (name, value) = bearer(&token);
    let hvac: Value = ctx
        .server
        .get("/v1/products/getProductsByCategory/hvac")
        .add_header(name, value)
        .await
        .json();
    let data = hvac["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], "Filter");
}

/// Test: per-user lookups are limited to the owner and admins
#[tokio::test]
async fn test_owner_lookup() {
    let ctx = create_test_server();
    let (admin, _) = create_user_with_role(&ctx, "admin@example.com", "admin").await;
    let (asha, asha_user) = register(&ctx.server, "asha@example.com", PASSWORD).await;
    let (ravi, _) = register(&ctx.server, "ravi@example.com", PASSWORD).await;
    let asha_id = asha_user["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&asha);
    ctx.server
        .post("/v1/purchasedPlans/newPurchasedPlan")
        .add_header(name, value)
        .json(&json!({ "plan": "gold", "userId": asha_id }))
        .await;

    let path = format!("/v1/purchasedPlans/getPurchasedPlansByUserId/{}", asha_id);

    let (name, value) = bearer(&asha);
    let own: Value = ctx.server.get(&path).add_header(name, value).await.json();
    assert_eq!(own["data"].as_array().unwrap().len(), 1);

    let (name, value) = bearer(&ravi);
    let other = ctx.server.get(&path).add_header(name, value).await;
    assert_eq!(other.status_code(), 403);

    let (name, value) = bearer(&admin);
    let by_admin = ctx.server.get(&path).add_header(name, value).await;
    assert_eq!(by_admin.status_code(), 200);
}

/// Test: unknown paths get the API 404
#[tokio::test]
async fn test_route_not_found() {
    let ctx = create_test_server();

    let response = ctx.server.get("/v1/nothing/here").await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "Route not found");
}

/// Test: the root path greets
#[tokio::test]
async fn test_welcome() {
    let ctx = create_test_server();

    let response = ctx.server.get("/").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Welcome to the comfort way");
}

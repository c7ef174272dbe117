use std::time::Duration;

use opsforge_core::TenantId;
use opsforge_infra::{DispatcherConfig, RedeliveryPolicy, TriggerWorkerHandle};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    worker: Option<TriggerWorkerHandle>,
}

impl TestServer {
    async fn spawn(policy: RedeliveryPolicy) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let (services, worker) =
            opsforge_api::app::services::build_services(DispatcherConfig::new(policy)).expect("failed to build services");
        let app = opsforge_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            worker: Some(worker),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

struct Tenant {
    client: reqwest::Client,
    id: TenantId,
}

impl Tenant {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            id: TenantId::new(),
        }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.client.get(url).header("x-tenant-id", self.id.to_string())
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        self.client.post(url).header("x-tenant-id", self.id.to_string())
    }

    fn put(&self, url: String) -> reqwest::RequestBuilder {
        self.client.put(url).header("x-tenant-id", self.id.to_string())
    }

    fn delete(&self, url: String) -> reqwest::RequestBuilder {
        self.client.delete(url).header("x-tenant-id", self.id.to_string())
    }
}

/// check_inventory a1 (sufficient/insufficient), fulfill_order a2,
/// send_notification a3, create_alert a4.
fn scenario_document() -> Value {
    let rule_id = Uuid::now_v7().to_string();
    let [a1, a2, a3, a4] = [(); 4].map(|_| Uuid::now_v7().to_string());
    let edge = |edge_type: &str, source: Option<&str>, target: &str, output: Option<&str>, order: i32| {
        json!({
            "id": Uuid::now_v7().to_string(),
            "rule_id": rule_id,
            "type": edge_type,
            "source_action_id": source,
            "target_action_id": target,
            "source_output": output,
            "edge_order": order,
        })
    };

    json!({
        "rule": {
            "id": rule_id,
            "name": "order stock check",
            "trigger": "on_update",
            "entity_type": "inventory_item",
            "active": true,
        },
        "actions": [
            { "id": a1, "rule_id": rule_id, "type": "check_inventory", "name": "check",
              "config": { "quantity_field": "on_hand", "minimum": 5 } },
            { "id": a2, "rule_id": rule_id, "type": "fulfill_order", "name": "fulfil", "config": {} },
            { "id": a3, "rule_id": rule_id, "type": "send_notification", "name": "notify",
              "config": { "recipients": ["ops"], "template": "low_stock" } },
            { "id": a4, "rule_id": rule_id, "type": "create_alert", "name": "alert",
              "config": { "severity": "warning", "message": "low stock" } },
        ],
        "edges": [
            edge("start", None, &a1, None, 0),
            edge("output", Some(&a1), &a2, Some("sufficient"), 0),
            edge("output", Some(&a1), &a3, Some("insufficient"), 0),
            edge("always", Some(&a3), &a4, None, 0),
        ],
    })
}

async fn create_rule(srv: &TestServer, tenant: &Tenant, doc: &Value) -> String {
    let res = tenant.post(srv.url("/rules")).json(doc).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn runs_eventually(srv: &TestServer, tenant: &Tenant, rule_id: &str, expected: usize) -> Vec<Value> {
    // Runs happen on the trigger worker; poll until they show up.
    for _ in 0..100 {
        let res = tenant
            .get(srv.url(&format!("/rules/{rule_id}/runs")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let runs: Vec<Value> = res.json().await.unwrap();
        let finished = runs.iter().filter(|r| r["status"]["state"] != "running").count();
        if runs.len() >= expected && finished == runs.len() {
            return runs;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("runs did not appear within timeout");
}

#[tokio::test]
async fn health_and_catalog_need_no_tenant() {
    let srv = TestServer::spawn(RedeliveryPolicy::RunEveryDelivery).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/action-types")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let types: Vec<Value> = res.json().await.unwrap();
    let keys: Vec<_> = types.iter().map(|t| t["key"].as_str().unwrap()).collect();
    assert!(keys.contains(&"check_inventory"));
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));

    let res = client.get(srv.url("/action-types/condition")).send().await.unwrap();
    let condition: Value = res.json().await.unwrap();
    assert_eq!(condition["output_ports"], json!(["true", "false"]));

    let res = client.get(srv.url("/action-types/teleport")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn(RedeliveryPolicy::RunEveryDelivery).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/rules")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");

    let res = client
        .get(srv.url("/rules"))
        .header("x-tenant-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dry_run_reports_without_persisting() {
    let srv = TestServer::spawn(RedeliveryPolicy::RunEveryDelivery).await;
    let tenant = Tenant::new();

    let mut doc = scenario_document();
    doc["edges"].as_array_mut().unwrap().remove(0);

    let res = tenant
        .post(srv.url("/rules?dry_run=true"))
        .json(&doc)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["valid"], false);
    assert_eq!(report["dry_run"], true);
    assert!(
        report["errors"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["kind"] == "missing_start_edge")
    );

    let res = tenant.get(srv.url("/rules")).send().await.unwrap();
    let rules: Vec<Value> = res.json().await.unwrap();
    assert!(rules.is_empty());

    // The same document is rejected for a real write.
    let res = tenant.post(srv.url("/rules")).json(&doc).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_json_is_a_validation_result() {
    let srv = TestServer::spawn(RedeliveryPolicy::RunEveryDelivery).await;
    let tenant = Tenant::new();

    let res = tenant
        .post(srv.url("/rules"))
        .header("content-type", "application/json")
        .body("{\"rule\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["valid"], false);
    assert_eq!(report["errors"][0]["path"], "$");
}

#[tokio::test]
async fn rule_lifecycle_and_introspection() {
    let srv = TestServer::spawn(RedeliveryPolicy::RunEveryDelivery).await;
    let tenant = Tenant::new();
    let doc = scenario_document();
    let rule_id = create_rule(&srv, &tenant, &doc).await;

    let res = tenant.get(srv.url(&format!("/rules/{rule_id}/actions"))).send().await.unwrap();
    let actions: Vec<Value> = res.json().await.unwrap();
    assert_eq!(actions.len(), 4);
    let res = tenant.get(srv.url(&format!("/rules/{rule_id}/edges"))).send().await.unwrap();
    let edges: Vec<Value> = res.json().await.unwrap();
    assert_eq!(edges.len(), 4);

    let res = tenant
        .post(srv.url(&format!("/rules/{rule_id}/explain-path")))
        .json(&json!({ "from": "check", "output": "insufficient" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let path: Value = res.json().await.unwrap();
    let names: Vec<_> = path["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["notify", "alert"]);

    let res = tenant
        .post(srv.url(&format!("/rules/{rule_id}/explain-path")))
        .json(&json!({ "output": "insufficient" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = tenant
        .post(srv.url(&format!("/rules/{rule_id}/explain-node")))
        .json(&json!({ "identifier": "check" }))
        .send()
        .await
        .unwrap();
    let node: Value = res.json().await.unwrap();
    assert_eq!(node["depth_from_start"], 0);

    let res = tenant.get(srv.url(&format!("/rules/{rule_id}/analysis"))).send().await.unwrap();
    let analysis: Value = res.json().await.unwrap();
    assert_eq!(analysis["action_count"], 4);

    // Stale replace is a conflict; matching version succeeds.
    let res = tenant
        .put(srv.url(&format!("/rules/{rule_id}?expected_version=7")))
        .json(&doc)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let res = tenant
        .put(srv.url(&format!("/rules/{rule_id}?expected_version=1")))
        .json(&doc)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stored: Value = res.json().await.unwrap();
    assert_eq!(stored["version"], 2);

    // Other tenants cannot see the rule.
    let stranger = Tenant::new();
    let res = stranger.get(srv.url(&format!("/rules/{rule_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = tenant.delete(srv.url(&format!("/rules/{rule_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = tenant.get(srv.url(&format!("/rules/{rule_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingested_event_runs_rule_and_records_audit_trail() {
    let srv = TestServer::spawn(RedeliveryPolicy::IgnoreDuplicates).await;
    let tenant = Tenant::new();
    let rule_id = create_rule(&srv, &tenant, &scenario_document()).await;

    let event = json!({
        "event_id": Uuid::now_v7().to_string(),
        "entity_type": "inventory_item",
        "entity_id": "item-7",
        "kind": "updated",
        "payload": { "on_hand": 2 },
    });
    for _ in 0..2 {
        let res = tenant.post(srv.url("/events")).json(&event).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    let runs = runs_eventually(&srv, &tenant, &rule_id, 1).await;
    // Give the duplicate delivery time to be (not) processed.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let runs_after = runs_eventually(&srv, &tenant, &rule_id, 1).await;
    assert_eq!(runs_after.len(), 1);

    let run = &runs[0];
    assert_eq!(run["status"]["state"], "succeeded");
    let steps: Vec<_> = run["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["action_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(steps, vec!["check", "notify", "alert"]);

    let run_id = run["id"].as_str().unwrap();
    let res = tenant.get(srv.url(&format!("/runs/{run_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["steps"][0]["outcome"]["output"], "insufficient");
}

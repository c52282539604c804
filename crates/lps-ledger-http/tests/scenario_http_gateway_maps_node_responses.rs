//! Scenario: HTTP gateway maps node responses onto ledger errors
//!
//! # Invariants under test
//!
//! 1. A deploy is posted to the validator with the signed fields in the
//!    node's camelCase shape, and the receipt carries the signature as
//!    deploy id.
//! 2. 4xx and budget-exhaustion answers are `Rejected`; 5xx and refused
//!    connections are retryable.
//! 3. Reads post the raw term to the read-only node and hand the body back
//!    untouched, including budget-exhaustion bodies.
//! 4. Propose is a no-op without an admin endpoint and hits it otherwise.
//! 5. Only a node-level error answer counts as budget exhaustion; a failed
//!    read whose JSON data mentions it is an ordinary server error.
//! 6. Deploy results are read with data-at-name on the deploy's unforgeable
//!    name.

use httpmock::prelude::*;
use lps_execution::{
    Ed25519Signer, LedgerError, LedgerGateway, ReadRequest, SignedEnvelope,
};
use lps_ledger_http::{RnodeEndpoints, RnodeHttpGateway};
use lps_schemas::{ExecutionBudget, Term, TermOp};
use serde_json::json;

fn envelope() -> SignedEnvelope {
    let signer = Ed25519Signer::from_bytes(&[3u8; 32]);
    let term = Term::new(
        TermOp::UpdateSlotData {
            contract_id: "names".into(),
            namespace_id: "abc1".into(),
            slot_id: "example".into(),
            data: "v1".into(),
        },
        "new x in { x!(1) }",
    );
    SignedEnvelope::seal(&term, ExecutionBudget::default(), "root", 1_700_000_000_000, &signer)
}

fn read_request() -> ReadRequest {
    let term = Term::new(
        TermOp::ReadSlotData {
            contract_id: "names".into(),
            slot_ids: vec!["example".into()],
        },
        "new return in { return!(1) }",
    );
    ReadRequest::new(term, 1000)
}

fn gateway(server: &MockServer, admin: bool) -> RnodeHttpGateway {
    RnodeHttpGateway::new(RnodeEndpoints {
        read_only_url: server.base_url(),
        validator_url: server.base_url(),
        admin_url: admin.then(|| server.base_url()),
    })
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_posts_signed_fields() {
    let server = MockServer::start_async().await;
    let env = envelope();
    let m = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/deploy").json_body_partial(
                json!({
                    "data": {
                        "term": "new x in { x!(1) }",
                        "timestamp": 1_700_000_000_000i64,
                        "phloPrice": 1,
                        "phloLimit": 100_000_000,
                        "validAfterBlockNumber": -1,
                        "shardId": "root"
                    },
                    "deployer": env.deployer,
                    "signature": env.signature,
                    "sigAlgorithm": "ed25519"
                })
                .to_string(),
            );
            then.status(200)
                .body(format!("Success!\nDeployId is: {}", env.signature));
        })
        .await;

    let receipt = gateway(&server, false).submit(&env).await.unwrap();

    m.assert_async().await;
    assert_eq!(receipt.deploy_id, env.signature);
}

#[tokio::test]
async fn refused_deploy_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/deploy");
            then.status(400).body("Invalid signature");
        })
        .await;

    let err = gateway(&server, false).submit(&envelope()).await.unwrap_err();

    assert!(matches!(err, LedgerError::Rejected(ref m) if m.contains("Invalid signature")));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn budget_exhaustion_at_deploy_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/deploy");
            then.status(200).body("Error: out of phlogistons");
        })
        .await;

    let err = gateway(&server, false).submit(&envelope()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(_)));
}

#[tokio::test]
async fn server_errors_and_dead_nodes_are_retryable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/deploy");
            then.status(503).body("casper not ready");
        })
        .await;

    let err = gateway(&server, false).submit(&envelope()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Transport(_)));

    let dead = RnodeHttpGateway::new(RnodeEndpoints {
        read_only_url: "http://127.0.0.1:1".into(),
        validator_url: "http://127.0.0.1:1".into(),
        admin_url: None,
    });
    let err = dead.submit(&envelope()).await.unwrap_err();
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_posts_raw_term_and_returns_body() {
    let server = MockServer::start_async().await;
    let body = json!({"expr": [{"ExprString": {"data": "v1"}}]}).to_string();
    let m = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/explore-deploy")
                .body("new return in { return!(1) }");
            then.status(200).body(body.clone());
        })
        .await;

    let got = gateway(&server, false)
        .read_state(&read_request())
        .await
        .unwrap();

    m.assert_async().await;
    assert_eq!(got, body);
}

#[tokio::test]
async fn budget_exhausted_read_body_is_passed_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/explore-deploy");
            then.status(400).body("Error: out of phlogistons");
        })
        .await;

    let got = gateway(&server, false)
        .read_state(&read_request())
        .await
        .unwrap();
    assert!(got.contains("out of phlogistons"));
}

#[tokio::test]
async fn server_error_mentioning_budget_in_data_stays_a_server_error() {
    let server = MockServer::start_async().await;
    let body = json!({
        "expr": [{"ExprMap": {"data": {
            "example": {"ExprString": {"data": "out of phlogistons"}}
        }}}]
    })
    .to_string();
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/explore-deploy");
            then.status(500).body(body.clone());
        })
        .await;

    let err = gateway(&server, false)
        .read_state(&read_request())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Transport(_)));
}

#[tokio::test]
async fn deploy_result_is_read_on_the_deploy_name() {
    let server = MockServer::start_async().await;
    let body = json!({
        "exprs": [{"expr": {"ExprMap": {"data": {
            "status": {"ExprString": {"data": "completed"}}
        }}}}],
        "length": 1
    })
    .to_string();
    let m = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/data-at-name").json_body(json!({
                "name": {"UnforgDeploy": {"data": "d1"}},
                "depth": 5
            }));
            then.status(200).body(body.clone());
        })
        .await;

    let got = gateway(&server, false)
        .read_deploy_result("d1", 5)
        .await
        .unwrap();

    m.assert_async().await;
    assert_eq!(got, body);
}

// ---------------------------------------------------------------------------
// Propose
// ---------------------------------------------------------------------------

#[tokio::test]
async fn propose_without_admin_endpoint_is_a_noop() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/propose");
            then.status(200);
        })
        .await;

    gateway(&server, false).propose_block().await.unwrap();
    assert_eq!(m.hits_async().await, 0);

    gateway(&server, true).propose_block().await.unwrap();
    assert_eq!(m.hits_async().await, 1);
}

#[tokio::test]
async fn failed_propose_surfaces_as_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/propose");
            then.status(500).body("no new deploys");
        })
        .await;

    let err = gateway(&server, true).propose_block().await.unwrap_err();
    assert!(matches!(err, LedgerError::Transport(_)));
}

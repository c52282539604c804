//! Live ledger gateway over an RNode-style HTTP API.
//!
//! - `POST {validator}/api/deploy` with the signed deploy as JSON
//! - `POST {read_only}/api/explore-deploy` with the raw term as body
//! - `POST {read_only}/api/data-at-name` on a deploy's own name, to read the
//!   result the contract reported for it
//! - `POST {admin}/api/propose`, only when an admin endpoint is configured
//!
//! Node URLs come from configuration; keys never pass through here, only
//! already signed envelopes.

use std::time::Duration;

use lps_execution::{LedgerError, LedgerGateway, ReadRequest, SignedEnvelope, SubmitReceipt};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

/// Marker the node puts in a response when the execution budget ran out.
const OUT_OF_BUDGET: &str = "out of phlogistons";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RnodeEndpoints {
    /// Node answering read-only queries.
    pub read_only_url: String,
    /// Node accepting deploys.
    pub validator_url: String,
    /// Admin endpoint able to propose blocks. `None` on networks that
    /// propose on their own.
    pub admin_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RnodeHttpGateway {
    endpoints: RnodeEndpoints,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployPayload<'a> {
    term: &'a str,
    timestamp: i64,
    phlo_price: u64,
    phlo_limit: u64,
    valid_after_block_number: i64,
    shard_id: &'a str,
}

/// `{"name": {"UnforgDeploy": {"data": <deploy id>}}, "depth": n}`
#[derive(Serialize)]
struct DataAtNameRequest<'a> {
    name: DeployName<'a>,
    depth: u32,
}

#[derive(Serialize)]
struct DeployName<'a> {
    #[serde(rename = "UnforgDeploy")]
    unforg_deploy: DeployIdData<'a>,
}

#[derive(Serialize)]
struct DeployIdData<'a> {
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequest<'a> {
    data: DeployPayload<'a>,
    deployer: &'a str,
    signature: &'a str,
    sig_algorithm: &'a str,
}

impl<'a> DeployRequest<'a> {
    fn from_envelope(env: &'a SignedEnvelope) -> Self {
        Self {
            data: DeployPayload {
                term: &env.data.term,
                timestamp: env.data.timestamp_ms,
                phlo_price: env.data.phlo_price,
                phlo_limit: env.data.phlo_limit,
                valid_after_block_number: env.data.valid_after_block_number,
                shard_id: &env.data.shard_id,
            },
            deployer: &env.deployer,
            signature: &env.signature,
            sig_algorithm: &env.sig_algorithm,
        }
    }
}

impl RnodeHttpGateway {
    pub fn new(endpoints: RnodeEndpoints) -> Self {
        Self::with_client(endpoints, reqwest::Client::new())
    }

    /// Every call is bounded by `request_timeout` on top of the caller's own
    /// deadlines.
    pub fn with_request_timeout(
        endpoints: RnodeEndpoints,
        request_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("http client: {e}")))?;
        Ok(Self::with_client(endpoints, http))
    }

    pub fn with_client(endpoints: RnodeEndpoints, http: reqwest::Client) -> Self {
        Self { endpoints, http }
    }

    pub fn endpoints(&self) -> &RnodeEndpoints {
        &self.endpoints
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Send and return `(status, body)`; transport failures are mapped here.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(StatusCode, String), LedgerError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;
        Ok((status, body))
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Transport(e.to_string())
    }
}

/// The node itself reports budget exhaustion: a plain-text body, or a body
/// that is a single JSON string. The phrase inside returned data does not
/// count.
fn reports_out_of_budget(body: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s.contains(OUT_OF_BUDGET),
        Ok(_) => false,
        Err(_) => body.contains(OUT_OF_BUDGET),
    }
}

/// Non-success status to error. 4xx is the node refusing the request.
fn status_error(status: StatusCode, body: &str) -> LedgerError {
    let msg = format!("http {}: {}", status.as_u16(), body.trim());
    if status.is_client_error() {
        LedgerError::Rejected(msg)
    } else {
        LedgerError::Transport(msg)
    }
}

#[async_trait::async_trait]
impl LedgerGateway for RnodeHttpGateway {
    fn gateway_name(&self) -> &'static str {
        "rnode-http"
    }

    async fn submit(&self, env: &SignedEnvelope) -> Result<SubmitReceipt, LedgerError> {
        let url = Self::url(&self.endpoints.validator_url, "/api/deploy");
        debug!(%url, deploy_id = %env.deploy_id(), "deploy");
        let (status, body) = self
            .send(self.http.post(url).json(&DeployRequest::from_envelope(env)))
            .await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        if reports_out_of_budget(&body) {
            return Err(LedgerError::Rejected(format!(
                "insufficient execution budget: {}",
                body.trim()
            )));
        }
        Ok(SubmitReceipt {
            deploy_id: env.deploy_id().to_string(),
        })
    }

    async fn propose_block(&self) -> Result<(), LedgerError> {
        let Some(admin) = &self.endpoints.admin_url else {
            debug!("no admin endpoint, skipping propose");
            return Ok(());
        };
        let url = Self::url(admin, "/api/propose");
        debug!(%url, "propose");
        let (status, body) = self.send(self.http.post(url)).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(())
    }

    /// Explore-deploy evaluates against the node's last finalized block, so
    /// `depth` is not sent.
    async fn read_state(&self, req: &ReadRequest) -> Result<String, LedgerError> {
        let url = Self::url(&self.endpoints.read_only_url, "/api/explore-deploy");
        debug!(%url, op = req.term.op.name(), depth = req.depth, "explore-deploy");
        let (status, body) = self
            .send(
                self.http
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "text/plain")
                    .body(req.term.text.clone()),
            )
            .await?;

        // Budget exhaustion is left for the readout decoder to classify.
        if status.is_success() || reports_out_of_budget(&body) {
            return Ok(body);
        }
        Err(status_error(status, &body))
    }

    async fn read_deploy_result(
        &self,
        deploy_id: &str,
        depth: u32,
    ) -> Result<String, LedgerError> {
        let url = Self::url(&self.endpoints.read_only_url, "/api/data-at-name");
        debug!(%url, deploy_id, depth, "data-at-name");
        let req = DataAtNameRequest {
            name: DeployName {
                unforg_deploy: DeployIdData { data: deploy_id },
            },
            depth,
        };
        let (status, body) = self.send(self.http.post(url).json(&req)).await?;
        if status.is_success() || reports_out_of_budget(&body) {
            return Ok(body);
        }
        Err(status_error(status, &body))
    }
}

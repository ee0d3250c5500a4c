//! Built-in connectors for the stock capability set.
//!
//! The outbound connectors deliver webhook-style: each provider's credential
//! bundle carries an `endpoint` (and optional `token`) and the connector
//! posts its interpolated arguments there as JSON. Test-mode simulations are
//! deterministic and never touch the network.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

use crate::connector::{Connector, InvocationContext, Outcome};
use crate::error::{CapabilityError, Result};

/// Upper bound on how long a `wait` step may block the dispatcher. Longer
/// pauses belong to the approval-gate mechanism, not a held connection.
const MAX_WAIT_SECS: u64 = 300;

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// Pull `endpoint` and optional `token` from a provider's credential bundle.
fn delivery_target(
    ctx: &InvocationContext,
    provider: &str,
) -> Result<(String, Option<String>)> {
    let bundle = ctx
        .credentials
        .get(provider)
        .ok_or_else(|| CapabilityError::MissingCredentials(provider.to_string()))?;

    let endpoint = bundle
        .get("endpoint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CapabilityError::MalformedCredentials {
            provider: provider.to_string(),
            field: "endpoint".to_string(),
        })?;

    let token = bundle
        .get("token")
        .and_then(|v| v.as_str())
        .map(String::from);

    Ok((endpoint.to_string(), token))
}

/// POST a JSON payload to the provider endpoint and parse the JSON reply
/// (an empty object when the provider returns no body).
async fn deliver(
    http: &reqwest::Client,
    ctx: &InvocationContext,
    provider: &str,
    payload: &Value,
) -> Result<Value> {
    let (endpoint, token) = delivery_target(ctx, provider)?;

    let mut request = http.post(&endpoint).json(payload);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CapabilityError::Provider(format!(
            "{provider} returned {status}: {body}"
        )));
    }

    Ok(response.json::<Value>().await.unwrap_or(json!({})))
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Start / Branch / Wait
// ─────────────────────────────────────────────────────────────────────────────

/// Graph entry point; a no-op success so start steps flow through the same
/// dispatch path as everything else.
pub struct StartConnector;

#[async_trait]
impl Connector for StartConnector {
    fn name(&self) -> &str {
        "start"
    }

    fn description(&self) -> &str {
        "Marks the entry point of an automation"
    }

    fn preview(&self, _args: &Value) -> String {
        "Start the automation".to_string()
    }

    async fn invoke(&self, _args: Value, _ctx: &InvocationContext) -> Result<Outcome> {
        Ok(Outcome::ok(json!({}), "run started"))
    }

    fn simulate(&self, _args: &Value) -> Outcome {
        Outcome::simulated(json!({}), "[test mode] run started")
    }
}

/// Fan-out point. Edges carry no predicate today, so this is a pass-through
/// success and every outgoing edge is followed.
pub struct BranchConnector;

#[async_trait]
impl Connector for BranchConnector {
    fn name(&self) -> &str {
        "branch"
    }

    fn description(&self) -> &str {
        "Splits the automation into parallel paths"
    }

    fn preview(&self, _args: &Value) -> String {
        "Branch into parallel paths".to_string()
    }

    async fn invoke(&self, _args: Value, _ctx: &InvocationContext) -> Result<Outcome> {
        Ok(Outcome::ok(json!({}), "branched"))
    }

    fn simulate(&self, _args: &Value) -> Outcome {
        Outcome::simulated(json!({}), "[test mode] branched")
    }
}

/// Pause for a fixed interval. Capped at [`MAX_WAIT_SECS`]; longer pauses
/// should be modelled as approval gates, which suspend without holding
/// resources.
pub struct WaitConnector;

impl WaitConnector {
    fn duration_secs(args: &Value) -> u64 {
        args.get("duration_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            .min(MAX_WAIT_SECS)
    }
}

#[async_trait]
impl Connector for WaitConnector {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Waits a fixed number of seconds (duration_secs) before continuing"
    }

    fn preview(&self, args: &Value) -> String {
        format!("Wait {} seconds", Self::duration_secs(args))
    }

    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> Result<Outcome> {
        let secs = Self::duration_secs(&args);
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok(Outcome::ok(
            json!({ "waited_secs": secs }),
            format!("waited {secs}s"),
        ))
    }

    fn simulate(&self, args: &Value) -> Outcome {
        let secs = Self::duration_secs(args);
        Outcome::simulated(
            json!({ "waited_secs": secs }),
            format!("[test mode] would wait {secs}s"),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound connectors
// ─────────────────────────────────────────────────────────────────────────────

/// Send a message through the connected messaging provider.
pub struct SendMessageConnector {
    http: reqwest::Client,
}

impl SendMessageConnector {
    /// Create with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            http: http_client(),
        }
    }
}

impl Default for SendMessageConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SendMessageConnector {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Sends a message (to, subject, body) through the connected messaging provider"
    }

    fn required_provider(&self) -> Option<&str> {
        Some("messaging")
    }

    fn preview(&self, args: &Value) -> String {
        match arg_str(args, "to") {
            Some(to) => format!("Send a message to {to}"),
            None => "Send a message".to_string(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> Result<Outcome> {
        let to = arg_str(&args, "to")
            .ok_or_else(|| CapabilityError::InvalidArguments("'to' is required".into()))?
            .to_string();

        let reply = deliver(&self.http, ctx, "messaging", &args).await?;
        let message_id = reply
            .get("message_id")
            .cloned()
            .unwrap_or(Value::Null);

        Ok(Outcome::ok(
            json!({ "delivered": true, "message_id": message_id, "recipient": to }),
            format!("message sent to {to}"),
        ))
    }

    fn simulate(&self, args: &Value) -> Outcome {
        let to = arg_str(args, "to").unwrap_or("(unknown)");
        Outcome::simulated(
            json!({ "delivered": true, "recipient": to }),
            format!("[test mode] would send a message to {to}"),
        )
    }
}

/// Append a row to the connected record store.
pub struct AppendRecordConnector {
    http: reqwest::Client,
}

impl AppendRecordConnector {
    /// Create with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            http: http_client(),
        }
    }
}

impl Default for AppendRecordConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for AppendRecordConnector {
    fn name(&self) -> &str {
        "append_record"
    }

    fn description(&self) -> &str {
        "Appends a row (table, fields) to the connected record store"
    }

    fn required_provider(&self) -> Option<&str> {
        Some("records")
    }

    fn preview(&self, args: &Value) -> String {
        match arg_str(args, "table") {
            Some(table) => format!("Append a record to {table}"),
            None => "Append a record".to_string(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> Result<Outcome> {
        let table = arg_str(&args, "table").unwrap_or("default").to_string();
        let reply = deliver(&self.http, ctx, "records", &args).await?;
        let record_id = reply.get("record_id").cloned().unwrap_or(Value::Null);

        Ok(Outcome::ok(
            json!({ "record_id": record_id, "table": table }),
            format!("record appended to {table}"),
        ))
    }

    fn simulate(&self, args: &Value) -> Outcome {
        let table = arg_str(args, "table").unwrap_or("default");
        Outcome::simulated(
            json!({ "table": table }),
            format!("[test mode] would append a record to {table}"),
        )
    }
}

/// Create a payment link with the connected billing provider.
pub struct CreatePaymentLinkConnector {
    http: reqwest::Client,
}

impl CreatePaymentLinkConnector {
    /// Create with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            http: http_client(),
        }
    }
}

impl Default for CreatePaymentLinkConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for CreatePaymentLinkConnector {
    fn name(&self) -> &str {
        "create_payment_link"
    }

    fn description(&self) -> &str {
        "Creates a payment link (amount, currency, description) with the billing provider"
    }

    fn required_provider(&self) -> Option<&str> {
        Some("billing")
    }

    fn preview(&self, args: &Value) -> String {
        match (args.get("amount"), arg_str(args, "currency")) {
            (Some(amount), Some(currency)) => {
                format!("Create a payment link for {amount} {currency}")
            }
            _ => "Create a payment link".to_string(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> Result<Outcome> {
        let reply = deliver(&self.http, ctx, "billing", &args).await?;
        let url = reply
            .get("payment_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CapabilityError::Provider("billing provider returned no payment_url".into())
            })?
            .to_string();

        Ok(Outcome::ok(
            json!({ "payment_url": url }),
            "payment link created",
        ))
    }

    fn simulate(&self, _args: &Value) -> Outcome {
        Outcome::simulated(
            json!({ "payment_url": "https://pay.example.invalid/simulated" }),
            "[test mode] would create a payment link",
        )
    }
}

/// Query the connected record store.
pub struct QueryStoreConnector {
    http: reqwest::Client,
}

impl QueryStoreConnector {
    /// Create with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            http: http_client(),
        }
    }
}

impl Default for QueryStoreConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for QueryStoreConnector {
    fn name(&self) -> &str {
        "query_store"
    }

    fn description(&self) -> &str {
        "Queries the connected record store (table, filter) and returns matching rows"
    }

    fn required_provider(&self) -> Option<&str> {
        Some("records")
    }

    fn preview(&self, args: &Value) -> String {
        match arg_str(args, "table") {
            Some(table) => format!("Query records from {table}"),
            None => "Query records".to_string(),
        }
    }

    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> Result<Outcome> {
        let reply = deliver(&self.http, ctx, "records", &args).await?;
        let rows = reply.get("rows").cloned().unwrap_or(json!([]));
        let count = rows.as_array().map(|a| a.len()).unwrap_or(0);

        Ok(Outcome::ok(
            json!({ "rows": rows, "row_count": count }),
            format!("query returned {count} rows"),
        ))
    }

    fn simulate(&self, args: &Value) -> Outcome {
        let table = arg_str(args, "table").unwrap_or("default");
        Outcome::simulated(
            json!({ "rows": [], "row_count": 0 }),
            format!("[test mode] would query {table}"),
        )
    }
}

/// A registry pre-populated with every built-in connector.
pub fn builtin_registry() -> crate::registry::ConnectorRegistry {
    let mut registry = crate::registry::ConnectorRegistry::new();
    registry.register(StartConnector);
    registry.register(BranchConnector);
    registry.register(WaitConnector);
    registry.register(SendMessageConnector::new());
    registry.register(AppendRecordConnector::new());
    registry.register(CreatePaymentLinkConnector::new());
    registry.register(QueryStoreConnector::new());
    registry
}

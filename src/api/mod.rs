//! HTTP surface: the vote webhook endpoint and liveness probe.

mod webhook;

pub use webhook::{create_webhook_router, WebhookState};

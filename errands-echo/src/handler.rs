//! Echo handler
//!
//! Logs the `echo` field of each errand and fails the errand when its `fail`
//! field is `true`. Useful for checking a deployment end to end.

use anyhow::Result;
use async_trait::async_trait;
use errands_core::domain::errand::{Errand, ResultMap};
use errands_processor::Handler;
use serde_json::Value;
use tracing::info;

const PARAM_ECHO_TEXT: &str = "echo";
const PARAM_FAIL_ERRAND: &str = "fail";

pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, errand: &Errand) -> Result<ResultMap> {
        let mut results = ResultMap::new();

        if let Some(echo) = errand.data.get(PARAM_ECHO_TEXT) {
            info!(errand_id = %errand.id, echo = %echo, "got something to echo");
            results.insert(PARAM_ECHO_TEXT.to_string(), echo.clone());
        }

        if errand.data.get(PARAM_FAIL_ERRAND) == Some(&Value::Bool(true)) {
            anyhow::bail!("you told me to fail");
        }

        Ok(results)
    }
}

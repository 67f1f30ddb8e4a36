use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

/// Future type accepted by [`StepRuntime::run`].
pub type StepFuture<'a> = BoxFuture<'a, Result<Value>>;

/// The host durable-step primitive, injected as a capability.
///
/// A named step is executed at most once per run: when it succeeds, its
/// result is memoised, and re-entering the run returns the memoised value
/// without re-executing the body. Executors route every LLM call and every
/// external side effect through here so provider retries do not duplicate
/// work. Errors are not memoised; the host runtime decides whether to retry
/// (the default policy is zero retries).
pub trait StepRuntime: Send + Sync {
    fn run<'a>(&'a self, name: &'a str, fut: StepFuture<'a>) -> BoxFuture<'a, Result<Value>>;
}

/// In-memory step runtime. One instance scopes one run; tests use it to
/// assert that re-execution skips completed steps.
#[derive(Default)]
pub struct MemorySteps {
    completed: Mutex<HashMap<String, Value>>,
    executed: Mutex<Vec<String>>,
}

impl MemorySteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of steps whose bodies actually ran, in order.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }

    /// Pre-seed a memoised result, simulating a prior partial attempt.
    pub async fn seed(&self, name: impl Into<String>, value: Value) {
        self.completed.lock().await.insert(name.into(), value);
    }
}

impl StepRuntime for MemorySteps {
    fn run<'a>(&'a self, name: &'a str, fut: StepFuture<'a>) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            if let Some(memoised) = self.completed.lock().await.get(name) {
                debug!(step = name, "step already completed, returning memoised value");
                return Ok(memoised.clone());
            }

            self.executed.lock().await.push(name.to_string());
            let value = fut.await?;
            self.completed
                .lock()
                .await
                .insert(name.to_string(), value.clone());
            Ok(value)
        })
    }
}

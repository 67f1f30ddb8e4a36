use futures::future::BoxFuture;

use weft_core::context::RunContext;
use weft_core::error::Result;
use weft_core::status::NodeStatus;

use crate::executor::{ExecutorContext, NodeExecutor};

/// Executor for all trigger kinds (INITIAL, MANUAL_TRIGGER,
/// GOOGLE_FORM_TRIGGER, STRIPE_TRIGGER).
///
/// Webhook payloads arrive already namespaced in the initial context
/// (`googleForm.*`, `stripe.*`) — that conversion belongs to the webhook
/// surface, not the engine — so the trigger's job at run time is just the
/// status pair.
pub struct TriggerExecutor;

impl NodeExecutor for TriggerExecutor {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>> {
        Box::pin(async move {
            ctx.emit(NodeStatus::Loading);
            ctx.emit(NodeStatus::Success);
            Ok(None)
        })
    }
}

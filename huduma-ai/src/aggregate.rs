//! Settle-all-with-fallback - combine independent AI sub-tasks.
//!
//! Fans N named sub-tasks out concurrently, waits for every one to settle,
//! and substitutes each failed sub-task's predeclared fallback instead of
//! aborting the rest. The combined result always has exactly N entries, in
//! declaration order, regardless of completion order. Total wall-clock cost
//! is bounded by the slowest sub-task, not the sum.

use crate::error::AiError;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use tokio::task::JoinSet;

/// Predeclared default substituted when a sub-task fails.
///
/// Different sub-tasks degrade to different shapes (a list view renders an
/// empty list, a card renders a placeholder object), so the default is a
/// tagged union rather than an untyped blob.
#[derive(Debug, Clone)]
pub enum Fallback {
    /// An empty JSON array.
    EmptyList,
    /// A fixed placeholder value.
    Placeholder(Value),
    /// A fixed text message.
    Text(&'static str),
}

impl Fallback {
    pub fn into_value(self) -> Value {
        match self {
            Self::EmptyList => Value::Array(Vec::new()),
            Self::Placeholder(value) => value,
            Self::Text(text) => Value::String(text.to_string()),
        }
    }
}

/// One named, independently callable unit of AI-backed work.
pub struct SubTask {
    name: String,
    fallback: Fallback,
    future: BoxFuture<'static, Result<Value, AiError>>,
}

impl SubTask {
    pub fn new(
        name: impl Into<String>,
        fallback: Fallback,
        future: impl Future<Output = Result<Value, AiError>> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            fallback,
            future: Box::pin(future),
        }
    }
}

/// Execute all sub-tasks concurrently and wait for every one to settle.
///
/// Never fails and never short-circuits: a sub-task error (or panic) is
/// logged and replaced by that sub-task's fallback. Entries come back in
/// declaration order.
pub async fn settle_all(tasks: Vec<SubTask>) -> Vec<(String, Value)> {
    let mut join_set: JoinSet<(usize, Result<Value, AiError>)> = JoinSet::new();
    let mut slots: Vec<(String, Fallback, Option<Value>)> = Vec::with_capacity(tasks.len());

    for (index, task) in tasks.into_iter().enumerate() {
        let SubTask {
            name,
            fallback,
            future,
        } = task;
        slots.push((name, fallback, None));
        join_set.spawn(async move { (index, future.await) });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => {
                slots[index].2 = Some(value);
            }
            Ok((index, Err(e))) => {
                tracing::warn!(
                    task = %slots[index].0,
                    error = %e,
                    "sub-task failed, substituting fallback"
                );
            }
            Err(join_error) => {
                // A panicked sub-task leaves its slot empty; the fallback
                // fills it below.
                tracing::warn!(error = %join_error, "sub-task aborted, substituting fallback");
            }
        }
    }

    slots
        .into_iter()
        .map(|(name, fallback, value)| {
            let value = value.unwrap_or_else(|| fallback.into_value());
            (name, value)
        })
        .collect()
}

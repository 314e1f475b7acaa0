//! Local hub - the aggregate "around you" view for a marketplace location.
//!
//! Combines four independent AI sub-tasks (weather, news, events, history
//! fact) into one payload. Each sub-task degrades to its own fallback, so
//! the hub view never fails wholesale: a dead news feed renders as an empty
//! list next to live weather.

use crate::aggregate::{settle_all, Fallback, SubTask};
use crate::call::{AiService, TaskSpec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Combined hub payload. Always has exactly these four entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalHubData {
    pub weather: Value,
    pub news: Value,
    pub events: Value,
    #[serde(rename = "historyFact")]
    pub history_fact: Value,
}

fn weather_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "condition": {"type": "string"},
            "temperature_c": {"type": "number"},
            "humidity_percent": {"type": "number"},
            "advisory": {"type": "string"}
        },
        "required": ["condition", "temperature_c"]
    })
}

fn weather_prompt(location: &str) -> String {
    format!(
        "Report the current weather in {location} as JSON with keys \
         condition, temperature_c, humidity_percent, and advisory (one \
         sentence of practical advice for outdoor service work)."
    )
}

fn news_prompt(location: &str) -> String {
    format!(
        "List 3 current local news items for {location} that matter to \
         households and small service businesses. Respond with a JSON array \
         of objects with keys title and summary. Respond with JSON only."
    )
}

fn events_prompt(location: &str) -> String {
    format!(
        "List 3 upcoming community events in {location}. Respond with a \
         JSON array of objects with keys name, date, and venue. Respond \
         with JSON only."
    )
}

fn history_prompt(location: &str) -> String {
    format!("Share one short, interesting historical fact about {location}. Two sentences at most.")
}

/// Build the hub view for a location.
///
/// Fans out all four sub-tasks concurrently and waits for every one to
/// settle. Never fails; failed sub-tasks appear as their fallback.
pub async fn local_hub(ai: &AiService, location: &str) -> LocalHubData {
    let tasks = vec![
        SubTask::new(
            "weather",
            Fallback::Placeholder(json!({"status": "unavailable"})),
            {
                let ai = ai.clone();
                let prompt = weather_prompt(location);
                async move {
                    ai.call_structured(TaskSpec::new("weather", prompt).with_schema(weather_schema()))
                        .await
                }
            },
        ),
        SubTask::new("news", Fallback::EmptyList, {
            let ai = ai.clone();
            let prompt = news_prompt(location);
            async move {
                ai.call_structured(TaskSpec::new("news", prompt).with_grounding())
                    .await
            }
        }),
        SubTask::new("events", Fallback::EmptyList, {
            let ai = ai.clone();
            let prompt = events_prompt(location);
            async move {
                ai.call_structured(TaskSpec::new("events", prompt).with_grounding())
                    .await
            }
        }),
        SubTask::new(
            "history_fact",
            Fallback::Text("No local history fact available right now."),
            {
                let ai = ai.clone();
                let prompt = history_prompt(location);
                async move {
                    ai.call_text(TaskSpec::new("history_fact", prompt))
                        .await
                        .map(Value::String)
                }
            },
        ),
    ];

    tracing::info!(location, sub_tasks = tasks.len(), "building local hub view");

    let mut settled: HashMap<String, Value> = settle_all(tasks).await.into_iter().collect();
    let mut take = |key: &str| settled.remove(key).unwrap_or(Value::Null);

    LocalHubData {
        weather: take("weather"),
        news: take("news"),
        events: take("events"),
        history_fact: take("history_fact"),
    }
}

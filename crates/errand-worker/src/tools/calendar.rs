//! Calendar domain tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use errand_core::{catalog, Domain, ToolDescriptor};

use crate::provider::ProviderClient;
use crate::tools::{optional_i64, optional_str, require_str, Tool, ToolError};

/// Build the calendar toolset.
pub fn tools(provider: ProviderClient) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CreateEventTool::new(provider.clone())),
        Arc::new(ListEventsTool::new(provider)),
    ]
}

fn descriptor(name: &str) -> ToolDescriptor {
    catalog::domain_tools(Domain::Calendar)
        .into_iter()
        .find(|d| d.name == name)
        .expect("calendar tool missing from catalog")
}

/// Build the provider event body from decoded arguments.
fn event_body(title: &str, start: &str, end: &str, description: Option<&str>) -> Value {
    let mut body = json!({
        "summary": title,
        "start": { "dateTime": start },
        "end": { "dateTime": end },
    });
    if let Some(description) = description {
        body["description"] = json!(description);
    }
    body
}

/// Create an event on the user's primary calendar.
pub struct CreateEventTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl CreateEventTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("calendar.create_event"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let title = require_str(&args, "title")?;
        let start = require_str(&args, "start")?;
        let end = require_str(&args, "end")?;
        let description = optional_str(&args, "description");

        let created = self
            .provider
            .post_json(
                "/calendar/v3/calendars/primary/events",
                &event_body(title, start, end, description),
            )
            .await?;

        Ok(json!({
            "event_id": created.get("id").cloned().unwrap_or(Value::Null),
            "link": created.get("htmlLink").cloned().unwrap_or(Value::Null),
            "title": title,
            "start": start,
            "end": end,
        }))
    }
}

/// List events on the user's primary calendar in a time range.
pub struct ListEventsTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl ListEventsTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("calendar.list_events"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let time_min = require_str(&args, "time_min")?;
        let time_max = require_str(&args, "time_max")?;
        let max_results = optional_i64(&args, "max_results").unwrap_or(10);

        let listed = self
            .provider
            .get_json(
                "/calendar/v3/calendars/primary/events",
                &[
                    ("timeMin", time_min.to_string()),
                    ("timeMax", time_max.to_string()),
                    ("maxResults", max_results.to_string()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                ],
            )
            .await?;

        let events: Vec<Value> = listed
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        json!({
                            "event_id": item.get("id").cloned().unwrap_or(Value::Null),
                            "title": item.get("summary").cloned().unwrap_or(Value::Null),
                            "start": item.pointer("/start/dateTime").cloned().unwrap_or(Value::Null),
                            "end": item.pointer("/end/dateTime").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({ "events": events }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_body_shape() {
        let body = event_body(
            "Kickoff",
            "2025-09-01T10:00:00Z",
            "2025-09-01T10:30:00Z",
            Some("Project kickoff"),
        );
        assert_eq!(body["summary"], "Kickoff");
        assert_eq!(body["start"]["dateTime"], "2025-09-01T10:00:00Z");
        assert_eq!(body["end"]["dateTime"], "2025-09-01T10:30:00Z");
        assert_eq!(body["description"], "Project kickoff");
    }

    #[test]
    fn test_event_body_omits_empty_description() {
        let body = event_body("Sync", "a", "b", None);
        assert!(body.get("description").is_none());
    }
}

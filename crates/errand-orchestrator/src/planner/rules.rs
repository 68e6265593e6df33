//! Deterministic rule-based planner.
//!
//! Splits the request into sequential steps on explicit ordering cues,
//! binds each step to a tool by keyword, and extracts arguments with the
//! helpers in [`super::extract`]. Routing is all-or-nothing: if any step
//! cannot be bound to an available tool with the arguments it requires,
//! the whole request is unroutable and nothing executes.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use errand_core::{ArgValue, NodeId, Plan, PlanNode, ToolDescriptor};

use super::{extract, Planner, PlannerError};

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[.;!?]\s+|\s*,?\s*\b(?:and\s+then|then|after\s+that|afterwards|next)\b[,:]?\s*")
            .expect("segment regex")
    })
}

/// Split a request into ordered steps.
fn segment(text: &str) -> Vec<&str> {
    segment_re()
        .split(text)
        .map(|s| s.trim().trim_end_matches(['.', '!', '?']))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Bind one step to a tool name by keyword.
fn bind_tool(step: &str) -> Option<&'static str> {
    let lower = step.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["draft"]) {
        return Some("mail.create_draft");
    }
    if has(&["email", "e-mail", "mail"])
        || (has(&["send", "inform", "notify", "tell"]) && extract::email(step).is_some())
    {
        return Some("mail.send_message");
    }
    if has(&["schedule", "set up", "create", "add", "book", "put"])
        && has(&["event", "meeting", "appointment", "call", "calendar"])
    {
        return Some("calendar.create_event");
    }
    if has(&["list", "show", "what"]) && has(&["calendar", "events", "agenda"]) {
        return Some("calendar.list_events");
    }
    if has(&["metadata", "properties", "how big", "size of"])
        && has(&["file", "document", "drive"])
    {
        return Some("storage.get_file_metadata");
    }
    if has(&["share", "give access", "grant access"])
        && has(&["file", "document", "drive", "folder"])
    {
        return Some("storage.share_file");
    }
    if has(&["search", "find", "look for", "locate"])
        && has(&["file", "document", "drive", "storage", "folder"])
    {
        return Some("storage.search_files");
    }
    None
}

/// Built-in deterministic planner.
#[derive(Debug, Default)]
pub struct RulePlanner;

impl RulePlanner {
    pub fn new() -> Self {
        Self
    }

    fn build_node(
        &self,
        id: NodeId,
        tool_name: &'static str,
        step: &str,
        previous: Option<&NodeId>,
    ) -> Result<PlanNode, PlannerError> {
        let unroutable =
            |detail: String| PlannerError::Unroutable(format!("{detail} in step: \"{step}\""));
        let mut node = PlanNode::new(id, tool_name);

        match tool_name {
            "calendar.create_event" => {
                let (start, end) = extract::event_window(step)
                    .ok_or_else(|| unroutable("no start and end time found".to_string()))?;
                let title = extract::name_phrase(step).unwrap_or_else(|| "New event".to_string());
                node = node
                    .with_arg("title", ArgValue::string(title))
                    .with_arg("start", ArgValue::string(extract::format_timestamp(start)))
                    .with_arg("end", ArgValue::string(extract::format_timestamp(end)));
            }
            "calendar.list_events" => {
                let (min, max) = extract::day_window(step)
                    .ok_or_else(|| unroutable("no date found".to_string()))?;
                node = node
                    .with_arg("time_min", ArgValue::string(extract::format_timestamp(min)))
                    .with_arg("time_max", ArgValue::string(extract::format_timestamp(max)));
            }
            "mail.send_message" | "mail.create_draft" => {
                let to = extract::email(step)
                    .ok_or_else(|| unroutable("no recipient address found".to_string()))?;
                let subject = extract::quoted(step)
                    .unwrap_or_else(|| "Update from your assistant".to_string());
                node = node
                    .with_arg("to", ArgValue::string(to))
                    .with_arg("subject", ArgValue::string(subject));
                // A step that points back at an earlier result gets that
                // result interpolated into the body and depends on it.
                match previous {
                    Some(prev) if extract::has_reference_cue(step) => {
                        node = node
                            .with_arg(
                                "body",
                                ArgValue::Template {
                                    text: format!("{step}. Details: ${{{prev}}}"),
                                },
                            )
                            .with_dependency(prev.clone());
                    }
                    _ => {
                        node = node.with_arg("body", ArgValue::string(step));
                    }
                }
            }
            "storage.search_files" => {
                let query = extract::name_phrase(step)
                    .ok_or_else(|| unroutable("no search phrase found".to_string()))?;
                node = node.with_arg("query", ArgValue::string(query));
            }
            "storage.get_file_metadata" => {
                let file_id = extract::name_phrase(step)
                    .ok_or_else(|| unroutable("no file reference found".to_string()))?;
                node = node.with_arg("file_id", ArgValue::string(file_id));
            }
            "storage.share_file" => {
                let email = extract::email(step)
                    .ok_or_else(|| unroutable("no account to share with found".to_string()))?;
                let file_id = extract::name_phrase(step)
                    .ok_or_else(|| unroutable("no file reference found".to_string()))?;
                node = node
                    .with_arg("file_id", ArgValue::string(file_id))
                    .with_arg("email", ArgValue::string(email));
            }
            other => {
                return Err(PlannerError::Unroutable(format!(
                    "no argument rules for tool {other}"
                )));
            }
        }

        Ok(node)
    }
}

#[async_trait]
impl Planner for RulePlanner {
    async fn plan(
        &self,
        request_text: &str,
        available_tools: &[ToolDescriptor],
    ) -> Result<Plan, PlannerError> {
        let available: HashSet<&str> = available_tools.iter().map(|t| t.name.as_str()).collect();
        let steps = segment(request_text);
        if steps.is_empty() {
            return Err(PlannerError::Unroutable("the request is empty".to_string()));
        }

        let mut nodes: Vec<PlanNode> = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let tool_name = bind_tool(step)
                .filter(|name| available.contains(name))
                .ok_or_else(|| {
                    PlannerError::Unroutable(format!(
                        "no available tool can serve: \"{step}\""
                    ))
                })?;
            let id = NodeId::new(format!("node-{}", index + 1));
            let previous = nodes.last().map(|n| n.id.clone());
            let node = self.build_node(id, tool_name, step, previous.as_ref())?;
            debug!(node_id = %node.id, tool = %node.tool_name, "Step bound");
            nodes.push(node);
        }

        Ok(Plan::new(nodes)?)
    }
}

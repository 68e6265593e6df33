//! Built-in per-domain tool catalog.
//!
//! The toolset of each domain is fixed at build time and compiled into both
//! the worker binary and the orchestrator. The worker generates its
//! handshake manifest from this catalog, and the pool manager verifies the
//! received manifest against it, so the planner can bind tools before any
//! process is spawned.

use crate::domain::Domain;
use crate::tool::{ParamSpec, ParamType, ToolDescriptor};

/// Descriptors for every tool the given domain's worker exposes.
pub fn domain_tools(domain: Domain) -> Vec<ToolDescriptor> {
    match domain {
        Domain::Mail => vec![
            ToolDescriptor::new(
                "mail.send_message",
                Domain::Mail,
                "Send an email on the user's behalf",
            )
            .with_param(ParamSpec::required("to", ParamType::String))
            .with_param(ParamSpec::required("subject", ParamType::String))
            .with_param(ParamSpec::required("body", ParamType::String))
            .with_param(ParamSpec::optional("sender", ParamType::String)),
            ToolDescriptor::new(
                "mail.create_draft",
                Domain::Mail,
                "Create a draft email without sending it",
            )
            .with_param(ParamSpec::required("to", ParamType::String))
            .with_param(ParamSpec::required("subject", ParamType::String))
            .with_param(ParamSpec::required("body", ParamType::String))
            .with_param(ParamSpec::optional("sender", ParamType::String)),
        ],
        Domain::Calendar => vec![
            ToolDescriptor::new(
                "calendar.create_event",
                Domain::Calendar,
                "Create an event on the user's primary calendar",
            )
            .with_param(ParamSpec::required("title", ParamType::String))
            .with_param(ParamSpec::required("start", ParamType::String))
            .with_param(ParamSpec::required("end", ParamType::String))
            .with_param(ParamSpec::optional("description", ParamType::String)),
            ToolDescriptor::new(
                "calendar.list_events",
                Domain::Calendar,
                "List events on the user's primary calendar in a time range",
            )
            .with_param(ParamSpec::required("time_min", ParamType::String))
            .with_param(ParamSpec::required("time_max", ParamType::String))
            .with_param(ParamSpec::optional("max_results", ParamType::Integer)),
        ],
        Domain::Storage => vec![
            ToolDescriptor::new(
                "storage.search_files",
                Domain::Storage,
                "Search the user's file storage by name",
            )
            .with_param(ParamSpec::required("query", ParamType::String))
            .with_param(ParamSpec::optional("max_results", ParamType::Integer)),
            ToolDescriptor::new(
                "storage.get_file_metadata",
                Domain::Storage,
                "Fetch name, type and size for a stored file",
            )
            .with_param(ParamSpec::required("file_id", ParamType::String)),
            ToolDescriptor::new(
                "storage.share_file",
                Domain::Storage,
                "Share a stored file with another account",
            )
            .with_param(ParamSpec::required("file_id", ParamType::String))
            .with_param(ParamSpec::required("email", ParamType::String))
            .with_param(ParamSpec::optional("role", ParamType::String)),
        ],
    }
}

/// Descriptors for every tool across all domains.
pub fn all_tools() -> Vec<ToolDescriptor> {
    Domain::ALL.iter().flat_map(|d| domain_tools(*d)).collect()
}

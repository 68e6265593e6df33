//! Storage domain tools.
//!
//! Search, metadata and sharing; there is deliberately no download tool,
//! so a request asking for one is unroutable rather than half-served.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use errand_core::{catalog, Domain, ToolDescriptor};

use crate::provider::ProviderClient;
use crate::tools::{optional_i64, optional_str, require_str, Tool, ToolError};

/// Build the storage toolset.
pub fn tools(provider: ProviderClient) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SearchFilesTool::new(provider.clone())),
        Arc::new(GetFileMetadataTool::new(provider.clone())),
        Arc::new(ShareFileTool::new(provider)),
    ]
}

fn descriptor(name: &str) -> ToolDescriptor {
    catalog::domain_tools(Domain::Storage)
        .into_iter()
        .find(|d| d.name == name)
        .expect("storage tool missing from catalog")
}

/// Build the provider search expression for a name query.
fn name_query(query: &str) -> String {
    // Single quotes in the query would break out of the expression.
    format!("name contains '{}'", query.replace('\'', "\\'"))
}

/// Search the user's file storage by name.
pub struct SearchFilesTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl SearchFilesTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("storage.search_files"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let query = require_str(&args, "query")?;
        let max_results = optional_i64(&args, "max_results").unwrap_or(10);

        let listed = self
            .provider
            .get_json(
                "/drive/v3/files",
                &[
                    ("q", name_query(query)),
                    ("pageSize", max_results.to_string()),
                    ("fields", "files(id,name,mimeType)".to_string()),
                ],
            )
            .await?;

        let files: Vec<Value> = listed
            .get("files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .map(|file| {
                        json!({
                            "file_id": file.get("id").cloned().unwrap_or(Value::Null),
                            "name": file.get("name").cloned().unwrap_or(Value::Null),
                            "mime_type": file.get("mimeType").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({ "files": files }))
    }
}

/// Fetch name, type and size for one stored file.
pub struct GetFileMetadataTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl GetFileMetadataTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("storage.get_file_metadata"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for GetFileMetadataTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let file_id = require_str(&args, "file_id")?;

        let file = self
            .provider
            .get_json(
                &format!("/drive/v3/files/{file_id}"),
                &[("fields", "id,name,mimeType,size".to_string())],
            )
            .await?;

        Ok(json!({
            "file_id": file.get("id").cloned().unwrap_or(Value::Null),
            "name": file.get("name").cloned().unwrap_or(Value::Null),
            "mime_type": file.get("mimeType").cloned().unwrap_or(Value::Null),
            "size": file.get("size").cloned().unwrap_or(Value::Null),
        }))
    }
}

/// Grant another account access to one stored file.
pub struct ShareFileTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl ShareFileTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("storage.share_file"),
            provider,
        }
    }
}

const SHARE_ROLES: [&str; 3] = ["reader", "writer", "commenter"];

#[async_trait]
impl Tool for ShareFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let file_id = require_str(&args, "file_id")?;
        let email = require_str(&args, "email")?;
        let role = optional_str(&args, "role").unwrap_or("reader");
        if !SHARE_ROLES.contains(&role) {
            return Err(ToolError::InvalidArguments(format!(
                "unknown role '{role}', expected one of {SHARE_ROLES:?}"
            )));
        }

        let permission = self
            .provider
            .post_json(
                &format!("/drive/v3/files/{file_id}/permissions"),
                &json!({
                    "type": "user",
                    "role": role,
                    "emailAddress": email,
                }),
            )
            .await?;

        Ok(json!({
            "file_id": file_id,
            "shared_with": email,
            "role": role,
            "permission_id": permission.get("id").cloned().unwrap_or(Value::Null),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_query_escapes_quotes() {
        assert_eq!(name_query("rent"), "name contains 'rent'");
        assert_eq!(name_query("bob's"), "name contains 'bob\\'s'");
    }

    #[test]
    fn test_toolset_matches_the_storage_catalog() {
        let provider = ProviderClient::new(
            reqwest::Client::new(),
            "https://api.invalid".to_string(),
            "token".to_string(),
        );
        let manifest: Vec<String> = tools(provider)
            .iter()
            .map(|t| t.descriptor().name.clone())
            .collect();
        assert_eq!(
            manifest,
            vec![
                "storage.search_files",
                "storage.get_file_metadata",
                "storage.share_file",
            ]
        );
        assert_eq!(manifest.len(), catalog::domain_tools(Domain::Storage).len());
    }
}

// src/storage/notion.rs

//! Notion database backend.
//!
//! ## Endpoints
//!
//! ```text
//! POST  {base}/databases/{id}/query   paged listing (page_size, start_cursor)
//! POST  {base}/pages                  create, parent = database
//! PATCH {base}/pages/{page_id}        update properties
//! GET   {base}/users                  connection check
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value, json};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FieldNames, RecordPatch, RemoteRecord};
use crate::storage::RecordStore;

/// Handle on one Notion database.
#[derive(Clone)]
pub struct NotionStore {
    client: Client,
    base: Url,
    token: String,
    api_version: String,
    database_id: String,
    fields: FieldNames,
    page_size: u32,
}

impl NotionStore {
    /// Create a store for `database_id` using the remote settings in `config`.
    pub fn new(config: &Config, database_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.remote.user_agent)
            .timeout(Duration::from_secs(config.remote.timeout_secs))
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = Url::parse(&config.remote.base_url)?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self {
            client,
            base,
            token: config.remote.token.clone(),
            api_version: config.remote.api_version.clone(),
            database_id: database_id.into(),
            fields: config.fields.clone(),
            page_size: config.remote.page_size,
        })
    }

    /// Hit the users endpoint and return the HTTP status.
    pub async fn check_connection(&self) -> Result<u16> {
        let url = self.endpoint("users")?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status().as_u16();
        log::debug!("Connection check returned status {}", status);
        Ok(status)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Body of a query request.
    fn query_body(&self, cursor: Option<&str>) -> Value {
        let mut body = json!({ "page_size": self.page_size });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    /// Records of one query page and the cursor of the next one.
    fn parse_query_page(&self, body: &Value) -> Result<(Vec<RemoteRecord>, Option<String>)> {
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::remote("query response has no results array"))?;

        let records = results
            .iter()
            .map(|page| self.parse_record(page))
            .collect::<Result<Vec<_>>>()?;

        let has_more = body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        let cursor = if has_more {
            let next = body
                .get("next_cursor")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::remote("has_more set without next_cursor"))?;
            Some(next.to_string())
        } else {
            None
        };

        Ok((records, cursor))
    }

    fn parse_record(&self, page: &Value) -> Result<RemoteRecord> {
        let id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::remote("page without id"))?;
        let properties = page.get("properties");

        let key = properties
            .and_then(|p| p.get(&self.fields.code))
            .and_then(|p| p.get("title"))
            .and_then(Value::as_array)
            .and_then(|title| title.first())
            .and_then(|t| {
                t.get("plain_text")
                    .or_else(|| t.get("text").and_then(|text| text.get("content")))
            })
            .and_then(Value::as_str)
            .map(str::to_string);

        let parents = properties
            .and_then(|p| p.get(&self.fields.parent))
            .and_then(|p| p.get("relation"))
            .and_then(Value::as_array)
            .map(|relation| {
                relation
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(RemoteRecord {
            id: id.to_string(),
            key,
            parents,
        })
    }

    /// Property object for a patch. Unset fields are left out.
    pub fn properties(&self, patch: &RecordPatch) -> Value {
        fn text(content: &str) -> Value {
            json!([{ "text": { "content": content } }])
        }

        let mut props = Map::new();
        if let Some(parent) = &patch.parent {
            props.insert(
                self.fields.parent.clone(),
                json!({ "relation": [{ "id": parent }] }),
            );
        }
        if let Some(code) = &patch.code {
            props.insert(self.fields.code.clone(), json!({ "title": text(code) }));
        }
        if let Some(subject) = &patch.subject {
            props.insert(
                self.fields.subject.clone(),
                json!({ "rich_text": text(subject) }),
            );
        }
        if let Some(workload) = patch.workload {
            props.insert(self.fields.workload.clone(), json!({ "number": workload }));
        }
        if let Some(grade) = patch.grade {
            props.insert(self.fields.grade.clone(), json!({ "number": grade }));
        }
        if let Some(period) = &patch.period {
            props.insert(
                self.fields.period.clone(),
                json!({ "rich_text": text(period) }),
            );
        }
        if let Some(ordinal) = patch.ordinal {
            props.insert(self.fields.ordinal.clone(), json!({ "number": ordinal }));
        }
        Value::Object(props)
    }
}

#[async_trait]
impl RecordStore for NotionStore {
    fn table(&self) -> &str {
        &self.database_id
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        let url = self.endpoint(&format!("databases/{}/query", self.database_id))?;
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = self.query_body(cursor.as_deref());
            let page = self
                .send(self.request(Method::POST, url.clone()).json(&body))
                .await?;
            let (batch, next) = self.parse_query_page(&page)?;
            records.extend(batch);

            match next {
                Some(next) => {
                    log::debug!("Fetching next page of {} (pagination)", self.database_id);
                    cursor = Some(next);
                }
                None => break,
            }
        }

        log::info!("Fetched {} records from {}", records.len(), self.database_id);
        Ok(records)
    }

    async fn create(&self, patch: &RecordPatch) -> Result<String> {
        let url = self.endpoint("pages")?;
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.properties(patch),
        });
        let created = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::remote("create response has no id"))
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        let url = self.endpoint(&format!("pages/{id}"))?;
        let body = json!({ "properties": self.properties(patch) });
        self.send(self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NotionStore {
        NotionStore::new(&Config::default(), "db-main").unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let store = store();
        assert_eq!(
            store.endpoint("databases/db-main/query").unwrap().as_str(),
            "https://api.notion.com/v1/databases/db-main/query"
        );
        assert_eq!(
            store.endpoint("pages/abc").unwrap().as_str(),
            "https://api.notion.com/v1/pages/abc"
        );
    }

    #[test]
    fn test_query_body_cursor() {
        let store = store();
        assert_eq!(store.query_body(None), json!({ "page_size": 100 }));
        assert_eq!(
            store.query_body(Some("c1")),
            json!({ "page_size": 100, "start_cursor": "c1" })
        );
    }

    #[test]
    fn test_parse_query_page() {
        let body = json!({
            "results": [
                {
                    "id": "p1",
                    "properties": {
                        "CÓDIGO": { "title": [{ "plain_text": "MAT01", "text": { "content": "MAT01" } }] },
                        "item principal": { "relation": [{ "id": "period-1" }] }
                    }
                },
                {
                    "id": "p2",
                    "properties": { "CÓDIGO": { "title": [] } }
                }
            ],
            "has_more": true,
            "next_cursor": "c2"
        });

        let (records, cursor) = store().parse_query_page(&body).unwrap();
        assert_eq!(cursor.as_deref(), Some("c2"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.as_deref(), Some("MAT01"));
        assert_eq!(records[0].parents, vec!["period-1"]);
        assert_eq!(records[1].key, None);
        assert!(records[1].parents.is_empty());
    }

    #[test]
    fn test_parse_query_page_last() {
        let body = json!({ "results": [], "has_more": false, "next_cursor": null });
        let (records, cursor) = store().parse_query_page(&body).unwrap();
        assert!(records.is_empty());
        assert!(cursor.is_none());
    }

    #[test]
    fn test_parse_query_page_rejects_malformed() {
        let store = store();
        assert!(store.parse_query_page(&json!({ "object": "error" })).is_err());
        assert!(store
            .parse_query_page(&json!({ "results": [], "has_more": true }))
            .is_err());
        assert!(store
            .parse_query_page(&json!({ "results": [{ "properties": {} }] }))
            .is_err());
    }

    #[test]
    fn test_properties_only_set_fields() {
        let patch = RecordPatch {
            workload: Some(60.0),
            period: Some("2023.1".into()),
            ..RecordPatch::default()
        };
        assert_eq!(
            store().properties(&patch),
            json!({
                "CH": { "number": 60.0 },
                "PERÍODO": { "rich_text": [{ "text": { "content": "2023.1" } }] }
            })
        );
    }

    #[test]
    fn test_properties_course_payload() {
        let patch = RecordPatch {
            code: Some("MAT01".into()),
            subject: Some("Cálculo I".into()),
            grade: Some(8.0),
            parent: Some("period-1".into()),
            ..RecordPatch::default()
        };
        let props = store().properties(&patch);
        assert_eq!(props["CÓDIGO"]["title"][0]["text"]["content"], "MAT01");
        assert_eq!(props["MATÉRIA"]["rich_text"][0]["text"]["content"], "Cálculo I");
        assert_eq!(props["NOTA"]["number"], 8.0);
        assert_eq!(props["item principal"]["relation"][0]["id"], "period-1");
        assert!(props.get("CH").is_none());
    }
}

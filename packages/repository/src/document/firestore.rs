//! Cloud Firestore collection over the REST API.
//!
//! Talks to `firestore.googleapis.com` with a bearer access token, or to a
//! local emulator (`FIRESTORE_EMULATOR_HOST`) without authentication.
//! Token acquisition and refresh are left to the deployment; the token is
//! read once from configuration.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::value::{decode_fields, document_id, encode_fields, encode_value};
use super::{Document, DocumentCollection, DocumentQuery};
use crate::{DocumentDbConfig, StoreError};

const FIRESTORE_HOST: &str = "https://firestore.googleapis.com";

/// Maximum length of an error body included in error messages.
const ERROR_PREVIEW_LEN: usize = 300;

/// A Firestore collection.
pub struct FirestoreCollection {
    client: reqwest::Client,
    /// `.../v1/projects/{project}/databases/{database}/documents`
    documents_url: Url,
    collection: String,
    access_token: Option<String>,
}

/// Firestore document resource.
#[derive(Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

/// One element of a `runQuery` response stream. Elements without a
/// document only carry progress metadata.
#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

impl FirestoreDocument {
    fn into_document(self) -> Document {
        Document {
            id: document_id(&self.name).to_string(),
            fields: decode_fields(self.fields.as_ref()),
        }
    }
}

impl FirestoreCollection {
    /// Creates a collection handle from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if no project id is configured or the
    /// emulator host is not a usable URL authority, or [`StoreError::Http`]
    /// if the HTTP client cannot be built.
    pub fn new(config: &DocumentDbConfig, collection: &str) -> Result<Self, StoreError> {
        let project_id = config.project_id.as_deref().ok_or_else(|| StoreError::Backend {
            message: "Firestore project id is not configured".to_string(),
        })?;

        let host = config
            .emulator_host
            .as_deref()
            .map_or_else(|| FIRESTORE_HOST.to_string(), |h| format!("http://{h}"));

        let mut documents_url = Url::parse(&host).map_err(|e| StoreError::Backend {
            message: format!("Invalid Firestore host '{host}': {e}"),
        })?;
        documents_url
            .path_segments_mut()
            .map_err(|()| StoreError::Backend {
                message: format!("Firestore host '{host}' cannot carry a path"),
            })?
            .clear()
            .extend([
                "v1",
                "projects",
                project_id,
                "databases",
                config.database.as_str(),
                "documents",
            ]);

        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            documents_url,
            collection: collection.to_string(),
            // The emulator accepts any token, including none.
            access_token: config.access_token.clone(),
        })
    }

    /// URL of one document, with the id percent-encoded as a single path
    /// segment. `None` for ids Firestore cannot store (empty, `.`, `..`, or
    /// containing `/`), which therefore cannot exist.
    fn document_url(&self, id: &str) -> Option<Url> {
        if id.is_empty() || id == "." || id == ".." || id.contains('/') {
            return None;
        }
        let mut url = self.documents_url.clone();
        url.path_segments_mut().ok()?.push(&self.collection).push(id);
        Some(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Builds a `structuredQuery` body.
    fn structured_query(&self, query: &DocumentQuery) -> Value {
        let mut structured = Map::new();
        structured.insert(
            "from".to_string(),
            json!([{ "collectionId": self.collection }]),
        );

        let filters: Vec<Value> = query
            .filters
            .iter()
            .map(|f| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": f.field },
                        "op": "EQUAL",
                        "value": encode_value(&f.value),
                    }
                })
            })
            .collect();
        match filters.len() {
            0 => {}
            1 => {
                structured.insert("where".to_string(), filters[0].clone());
            }
            _ => {
                structured.insert(
                    "where".to_string(),
                    json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
                );
            }
        }

        if let Some(field) = &query.order_by_desc {
            structured.insert(
                "orderBy".to_string(),
                json!([{ "field": { "fieldPath": field }, "direction": "DESCENDING" }]),
            );
        }
        if let Some(limit) = query.limit {
            structured.insert("limit".to_string(), json!(limit));
        }

        json!({ "structuredQuery": structured })
    }
}

/// Turns a non-success response into [`StoreError::Backend`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let preview: String = body.chars().take(ERROR_PREVIEW_LEN).collect();
    Err(StoreError::Backend {
        message: format!("Firestore returned {status}: {preview}"),
    })
}

#[async_trait::async_trait]
impl DocumentCollection for FirestoreCollection {
    fn name(&self) -> &str {
        &self.collection
    }

    async fn set(&self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let url = self.document_url(id).ok_or_else(|| StoreError::Backend {
            message: format!("Invalid document id '{id}'"),
        })?;
        let response = self
            .authorize(self.client.patch(url))
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let Some(url) = self.document_url(id) else {
            return Ok(None);
        };
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: FirestoreDocument = check_status(response).await?.json().await?;
        Ok(Some(document.into_document()))
    }

    async fn merge(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<Document>, StoreError> {
        let Some(url) = self.document_url(id) else {
            return Ok(None);
        };
        // Only the masked fields are written; the precondition keeps a merge
        // from creating a document that does not exist.
        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let response = self
            .authorize(self.client.patch(url))
            .query(&params)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: FirestoreDocument = check_status(response).await?.json().await?;
        Ok(Some(document.into_document()))
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let response = self
            .authorize(self.client.post(format!("{}:runQuery", self.documents_url)))
            .json(&self.structured_query(query))
            .send()
            .await?;
        let items: Vec<RunQueryItem> = check_status(response).await?.json().await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .map(FirestoreDocument::into_document)
            .collect())
    }
}

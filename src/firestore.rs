//! My List store backed by the Firestore REST API.
use crate::models::CatalogItem;
use crate::my_list::DocumentStore;
use crate::session::UserId;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::time::Duration;
use tracing::{debug, info};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: Client,
    documents: String,
    id_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(project_id: &str, id_token: Option<String>) -> Result<Self> {
        if project_id.trim().is_empty() {
            bail!("Firestore project id is empty");
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("Failed to build Firestore HTTP client")?;
        let documents = format!(
            "{FIRESTORE_BASE}/projects/{}/databases/(default)/documents",
            urlencoding::encode(project_id.trim())
        );
        info!("Using Firestore project {}", project_id.trim());
        Ok(Self {
            client,
            documents,
            id_token: id_token.filter(|t| !t.is_empty()),
        })
    }

    /// Point the client at another documents root, e.g. a local emulator.
    pub fn with_documents_url(mut self, documents: &str) -> Self {
        self.documents = documents.trim_end_matches('/').to_string();
        self
    }

    fn collection_url(&self, user: &UserId) -> String {
        format!(
            "{}/customers/{}/myList",
            self.documents,
            urlencoding::encode(user.as_str())
        )
    }

    fn document_url(&self, user: &UserId, item_id: i64) -> String {
        format!("{}/{}", self.collection_url(user), item_id)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.id_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn ensure_success(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    Err(anyhow!("{} failed. Status: {}, Response: {}", what, status, text))
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn put_item(&self, user: &UserId, item: &CatalogItem) -> Result<()> {
        let payload = serde_json::to_value(item).context("Failed to serialize item")?;
        let Value::Object(map) = payload else {
            bail!("Item did not serialize to an object");
        };
        let body = json!({ "fields": encode_fields(&map) });
        let url = self.document_url(user, item.id);
        debug!(user = %user, item_id = item.id, "Writing My List document");
        let res = self
            .authorize(self.client.patch(&url))
            .json(&body)
            .send()
            .await
            .context("request failed")?;
        ensure_success(res, "Firestore write").await?;
        Ok(())
    }

    async fn delete_item(&self, user: &UserId, item_id: i64) -> Result<()> {
        let url = self.document_url(user, item_id);
        debug!(user = %user, item_id, "Deleting My List document");
        let res = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .context("request failed")?;
        ensure_success(res, "Firestore delete").await?;
        Ok(())
    }

    async fn list_items(&self, user: &UserId) -> Result<Vec<CatalogItem>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ListResponse {
            #[serde(default)]
            documents: Vec<Document>,
            next_page_token: Option<String>,
        }

        let url = self.collection_url(user);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .authorize(self.client.get(&url))
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let res = req.send().await.context("request failed")?;
            let res = ensure_success(res, "Firestore list").await?;
            let text = res.text().await.context("reading body failed")?;
            let page: ListResponse = serde_json::from_str(&text).context("JSON parse failed")?;
            for doc in page.documents {
                items.push(doc.into_item()?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn into_item(self) -> Result<CatalogItem> {
        let value = decode_fields(&self.fields)
            .with_context(|| format!("Undecodable document {}", self.name))?;
        serde_json::from_value(value).with_context(|| format!("Malformed item in {}", self.name))
    }
}

/// Encode plain JSON into Firestore typed values.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore typed value back into plain JSON.
pub fn decode_value(value: &Value) -> Result<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Firestore value is not an object"))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| anyhow!("Firestore value has no type"))?;
    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .with_context(|| format!("Bad integerValue '{}'", s))?,
                other => other
                    .as_i64()
                    .ok_or_else(|| anyhow!("Bad integerValue {}", other))?,
            };
            Value::Number(parsed.into())
        }
        "doubleValue" => {
            let f = match inner {
                Value::String(s) => s.parse::<f64>().unwrap_or(f64::NAN),
                other => other.as_f64().unwrap_or(f64::NAN),
            };
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().unwrap_or_default().to_string())
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(|v| v.as_array())
                .map(|vals| vals.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(|f| f.as_object())
                .cloned()
                .unwrap_or_default();
            decode_fields(&fields)?
        }
        "geoPointValue" => inner.clone(),
        other => bail!("Unsupported Firestore value type '{}'", other),
    };
    Ok(decoded)
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Value> {
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), decode_value(v)?);
    }
    Ok(Value::Object(out))
}

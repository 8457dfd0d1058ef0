//! Qdrant 向量存储实现 (托管向量检索集群)
//!
//! Qdrant 的点 id 只接受整数或 UUID，这里用 UUIDv5 映射字符串 id，原始 id 保存在
//! payload 的 `doc_id` 字段。

use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::validate_identifier;
use crate::types::{SearchQuery, SearchResult, SetupOutcome, StoreStats, VectorItem};
use crate::VectorStore;
use hybridrag_core::{HybridRagError, Result};

const DOC_ID_FIELD: &str = "doc_id";

pub struct QdrantStore {
    client: Qdrant,
    collection_name: String,
    dimension: usize,
}

impl QdrantStore {
    pub fn new(
        url: &str,
        collection_name: &str,
        dimension: usize,
        api_key: Option<&str>,
    ) -> Result<Self> {
        validate_identifier(collection_name)?;

        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| HybridRagError::Config(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
            dimension,
        })
    }

    fn qdrant_error(action: &str, e: impl std::fmt::Display) -> HybridRagError {
        HybridRagError::VectorStore(format!("Qdrant {} failed: {}", action, e))
    }

    pub(crate) fn point_id(id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
    }

    fn to_point(&self, item: VectorItem) -> Result<PointStruct> {
        if item.vector.len() != self.dimension {
            return Err(HybridRagError::VectorStore(format!(
                "vector has {} dimensions, collection '{}' expects {}",
                item.vector.len(),
                self.collection_name,
                self.dimension
            )));
        }

        let mut payload = match item.payload {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        payload.insert(DOC_ID_FIELD.to_string(), serde_json::Value::String(item.id.clone()));

        let payload = Payload::try_from(serde_json::Value::Object(payload))
            .map_err(|e| Self::qdrant_error("payload conversion", e))?;

        Ok(PointStruct::new(Self::point_id(&item.id), item.vector, payload))
    }

    /// Converts a Qdrant payload back to JSON and pulls out the original id.
    pub(crate) fn from_payload(
        payload: HashMap<String, QdrantValue>,
    ) -> (Option<String>, serde_json::Value) {
        let mut map: serde_json::Map<String, serde_json::Value> = payload
            .into_iter()
            .map(|(k, v)| (k, value_to_json(v)))
            .collect();

        let doc_id = match map.remove(DOC_ID_FIELD) {
            Some(serde_json::Value::String(id)) => Some(id),
            _ => None,
        };

        (doc_id, serde_json::Value::Object(map))
    }
}

pub(crate) fn value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(st)) => serde_json::Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn setup(&self) -> Result<SetupOutcome> {
        let exists = self
            .client
            .collection_exists(self.collection_name.as_str())
            .await
            .map_err(|e| Self::qdrant_error("collection_exists", e))?;

        if exists {
            tracing::debug!("Qdrant collection {} already exists", self.collection_name);
            return Ok(SetupOutcome::AlreadyExists);
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection_name.as_str()).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| Self::qdrant_error("create_collection", e))?;

        tracing::info!(
            "Created Qdrant collection {} ({} dims)",
            self.collection_name,
            self.dimension
        );
        Ok(SetupOutcome::Created)
    }

    async fn upsert(&self, item: VectorItem) -> Result<()> {
        self.upsert_batch(vec![item]).await.map(|_| ())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let count = items.len();
        let points = items
            .into_iter()
            .map(|item| self.to_point(item))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.as_str(), points).wait(true))
            .await
            .map_err(|e| Self::qdrant_error("upsert", e))?;

        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let mut request =
            SearchPointsBuilder::new(self.collection_name.as_str(), query.vector, query.limit as u64)
                .with_payload(true);
        if let Some(min_score) = query.min_score {
            request = request.score_threshold(min_score);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| Self::qdrant_error("search", e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let (doc_id, payload) = Self::from_payload(point.payload);
                match doc_id {
                    Some(id) => Some(SearchResult {
                        id,
                        score: point.score,
                        payload,
                    }),
                    None => {
                        tracing::warn!(
                            "Qdrant point in {} has no {} field, skipping",
                            self.collection_name,
                            DOC_ID_FIELD
                        );
                        None
                    }
                }
            })
            .collect())
    }

    /// The stored vector is not fetched back; the returned item carries the
    /// payload only.
    async fn get(&self, id: &str) -> Result<Option<VectorItem>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    self.collection_name.as_str(),
                    vec![PointId::from(Self::point_id(id))],
                )
                .with_payload(true),
            )
            .await
            .map_err(|e| Self::qdrant_error("get", e))?;

        Ok(response.result.into_iter().next().map(|point| {
            let (_, payload) = Self::from_payload(point.payload);
            VectorItem {
                id: id.to_string(),
                vector: Vec::new(),
                payload,
                created_at: Utc::now(),
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection_name.as_str())
                    .points(PointsIdsList {
                        ids: vec![PointId::from(Self::point_id(id))],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| Self::qdrant_error("delete", e))?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.as_str()).exact(true))
            .await
            .map_err(|e| Self::qdrant_error("count", e))?;

        Ok(StoreStats {
            total_vectors: response.result.map(|r| r.count as usize).unwrap_or(0),
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection_name.as_str())
                    .points(Filter::default())
                    .wait(true),
            )
            .await
            .map_err(|e| Self::qdrant_error("clear", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = QdrantStore::point_id("review-1-0");
        let b = QdrantStore::point_id("review-1-0");
        let c = QdrantStore::point_id("review-1-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_value_to_json() {
        let value = QdrantValue {
            kind: Some(Kind::StringValue("blender".to_string())),
        };
        assert_eq!(value_to_json(value), json!("blender"));
        assert_eq!(value_to_json(QdrantValue { kind: None }), serde_json::Value::Null);
        assert_eq!(
            value_to_json(QdrantValue {
                kind: Some(Kind::IntegerValue(4))
            }),
            json!(4)
        );
    }

    #[test]
    fn test_from_payload_extracts_doc_id() {
        let mut payload = HashMap::new();
        payload.insert(
            DOC_ID_FIELD.to_string(),
            QdrantValue {
                kind: Some(Kind::StringValue("r7-0".to_string())),
            },
        );
        payload.insert(
            "content".to_string(),
            QdrantValue {
                kind: Some(Kind::StringValue("Too loud".to_string())),
            },
        );

        let (doc_id, json) = QdrantStore::from_payload(payload);
        assert_eq!(doc_id.as_deref(), Some("r7-0"));
        assert_eq!(json["content"], "Too loud");
        assert!(json.get(DOC_ID_FIELD).is_none());
    }

    #[test]
    fn test_new_rejects_bad_collection_name() {
        let err = QdrantStore::new("http://localhost:6334", "bad name", 3, None)
            .err()
            .unwrap();
        assert!(matches!(err, HybridRagError::Config(_)));
    }
}

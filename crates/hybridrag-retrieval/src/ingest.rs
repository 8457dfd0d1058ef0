//! 评论 CSV 导入
//!
//! 行 -> 文本块 -> 文档 (`{row_id}-{chunk_index}`) -> 批量嵌入 -> 写入全部向量存储

use hybridrag_core::{Document, HybridRagError, IngestConfig, Result};
use hybridrag_vector::{VectorItem, VectorStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::chunk::Chunker;
use crate::embedding::EmbeddingProvider;

/// 导入统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub chunks: usize,
    /// 每个存储写入的向量数
    pub written: Vec<(String, usize)>,
}

pub struct ReviewIngestor {
    config: IngestConfig,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    stores: Vec<Arc<dyn VectorStore>>,
}

impl ReviewIngestor {
    pub fn new(
        config: IngestConfig,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        stores: Vec<Arc<dyn VectorStore>>,
    ) -> Self {
        Self {
            config,
            chunker,
            embedder,
            stores,
        }
    }

    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let file = std::fs::File::open(path)
            .map_err(|e| HybridRagError::Ingest(format!("打开 {:?} 失败: {}", path, e)))?;
        self.ingest_reader(file).await
    }

    pub async fn ingest_reader<R: Read>(&self, reader: R) -> Result<IngestReport> {
        let (documents, rows_read, rows_skipped) = self.load_documents(reader)?;
        tracing::info!(
            "Parsed {} rows into {} chunks ({} rows skipped)",
            rows_read,
            documents.len(),
            rows_skipped
        );

        let mut report = self.ingest_documents(documents).await?;
        report.rows_read = rows_read;
        report.rows_skipped = rows_skipped;
        Ok(report)
    }

    /// Parses the CSV into chunk documents. Returns the documents, the number
    /// of data rows seen and the number of rows skipped for having no id or
    /// no text.
    pub fn load_documents<R: Read>(&self, reader: R) -> Result<(Vec<Document>, usize, usize)> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| HybridRagError::Ingest(format!("读取 CSV 表头失败: {}", e)))?
            .clone();
        for required in std::iter::once(&self.config.id_column).chain(&self.config.text_columns) {
            if !headers.iter().any(|h| h == required.as_str()) {
                return Err(HybridRagError::Ingest(format!(
                    "CSV is missing column '{}'",
                    required
                )));
            }
        }

        let mut documents = Vec::new();
        let mut rows_read = 0;
        let mut rows_skipped = 0;

        for (line, row) in reader.deserialize::<HashMap<String, String>>().enumerate() {
            let row = row.map_err(|e| {
                HybridRagError::Ingest(format!("CSV row {} is malformed: {}", line + 2, e))
            })?;
            rows_read += 1;

            let chunks = self.row_to_documents(&row)?;
            if chunks.is_empty() {
                tracing::warn!("Skipping CSV row {}: missing id or text", line + 2);
                rows_skipped += 1;
                continue;
            }
            documents.extend(chunks);
        }

        Ok((documents, rows_read, rows_skipped))
    }

    fn row_to_documents(&self, row: &HashMap<String, String>) -> Result<Vec<Document>> {
        let row_id = match row.get(&self.config.id_column).map(|s| s.trim()) {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(Vec::new()),
        };

        let text = self
            .config
            .text_columns
            .iter()
            .filter_map(|column| row.get(column))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let metadata: Vec<(&String, &str)> = self
            .config
            .metadata_columns
            .iter()
            .filter_map(|column| {
                row.get(column)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| (column, v))
            })
            .collect();

        Ok(self
            .chunker
            .chunk_text(&text)?
            .into_iter()
            .map(|chunk| {
                let mut document = Document::new(format!("{}-{}", row_id, chunk.index), chunk.content)
                    .with_metadata("row_id", row_id)
                    .with_metadata("chunk_index", chunk.index.to_string());
                for (key, value) in &metadata {
                    document = document.with_metadata(key.as_str(), *value);
                }
                document
            })
            .collect())
    }

    /// Embeds `documents` in batches and upserts them into every store.
    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let mut written: Vec<(String, usize)> = self
            .stores
            .iter()
            .map(|s| (s.name().to_string(), 0))
            .collect();

        for batch in documents.chunks(self.config.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            let items: Vec<VectorItem> = batch
                .iter()
                .zip(vectors)
                .map(|(document, vector)| {
                    VectorItem::new(vector, payload(document)).with_id(document.id.clone())
                })
                .collect();

            for (store, count) in self.stores.iter().zip(written.iter_mut()) {
                count.1 += store.upsert_batch(items.clone()).await?;
            }
            tracing::debug!("Ingested batch of {} chunks", items.len());
        }

        Ok(IngestReport {
            rows_read: 0,
            rows_skipped: 0,
            chunks: documents.len(),
            written,
        })
    }
}

fn payload(document: &Document) -> serde_json::Value {
    let mut map: serde_json::Map<String, serde_json::Value> = document
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    map.insert(
        "content".to_string(),
        serde_json::Value::String(document.content.clone()),
    );
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::AIProviderEmbedding;
    use hybridrag_testing::MockAiProvider;
    use hybridrag_vector::MemoryStore;
    use std::io::Write;

    const CSV: &str = "review_id,product_id,rating,review_title,review_text\n\
r1,B01,2,Too loud,The motor is very loud.\n\
r2,B01,5,Love it,\"Quiet, fast, and easy to clean.\"\n\
,B02,4,No id,This row has no id.\n\
r3,B02,3,,\n";

    fn ingestor(stores: Vec<Arc<dyn VectorStore>>, batch_size: usize) -> ReviewIngestor {
        let config = IngestConfig {
            batch_size,
            ..IngestConfig::default()
        };
        let embedder = Arc::new(AIProviderEmbedding::new(Arc::new(MockAiProvider::new()), "mock", 16));
        ReviewIngestor::new(config, Chunker::new(512, 64).unwrap(), embedder, stores)
    }

    #[test]
    fn test_load_documents() {
        let (documents, rows_read, rows_skipped) =
            ingestor(Vec::new(), 8).load_documents(CSV.as_bytes()).unwrap();

        assert_eq!(rows_read, 4);
        assert_eq!(rows_skipped, 2);
        assert_eq!(documents.len(), 2);

        let first = &documents[0];
        assert_eq!(first.id, "r1-0");
        assert_eq!(first.content, "Too loud\nThe motor is very loud.");
        assert_eq!(first.metadata("product_id"), Some("B01"));
        assert_eq!(first.metadata("rating"), Some("2"));
        assert_eq!(first.metadata("row_id"), Some("r1"));
        assert_eq!(documents[1].content, "Love it\nQuiet, fast, and easy to clean.");
    }

    #[test]
    fn test_load_documents_with_cjk_and_emoji() {
        let review = "这个搅拌机噪音很大但是很好用🤩🤩🤩 ".repeat(40);
        let csv = format!("review_id,review_title,review_text\nr9,好评,{}\n", review);
        let config = IngestConfig {
            metadata_columns: Vec::new(),
            ..IngestConfig::default()
        };
        let embedder = Arc::new(AIProviderEmbedding::new(Arc::new(MockAiProvider::new()), "mock", 16));
        let ingestor = ReviewIngestor::new(config, Chunker::new(32, 8).unwrap(), embedder, Vec::new());

        let (documents, rows_read, rows_skipped) = ingestor.load_documents(csv.as_bytes()).unwrap();

        assert_eq!((rows_read, rows_skipped), (1, 0));
        assert!(documents.len() > 1);
        assert!(documents[0].content.starts_with("好评\n这个"));
        assert_eq!(documents.last().unwrap().id, format!("r9-{}", documents.len() - 1));
    }

    #[test]
    fn test_missing_column_is_error() {
        let err = ingestor(Vec::new(), 8)
            .load_documents("id,text\n1,hello\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, HybridRagError::Ingest(_)));
    }

    #[tokio::test]
    async fn test_ingest_writes_to_every_store() {
        let pg: Arc<dyn VectorStore> = Arc::new(MemoryStore::with_name("pg"));
        let qdrant: Arc<dyn VectorStore> = Arc::new(MemoryStore::with_name("qdrant"));

        let report = ingestor(vec![pg.clone(), qdrant.clone()], 1)
            .ingest_reader(CSV.as_bytes())
            .await
            .unwrap();

        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(
            report.written,
            vec![("pg".to_string(), 2), ("qdrant".to_string(), 2)]
        );

        let item = qdrant.get("r2-0").await.unwrap().unwrap();
        assert_eq!(item.content(), Some("Love it\nQuiet, fast, and easy to clean."));
        assert_eq!(item.payload["product_id"], "B01");
        assert_eq!(pg.stats().await.unwrap().total_vectors, 2);
    }

    #[tokio::test]
    async fn test_ingest_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        let report = ingestor(vec![store], 32).ingest_path(file.path()).await.unwrap();
        assert_eq!(report.chunks, 2);
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let err = ingestor(Vec::new(), 8)
            .ingest_path(Path::new("/nonexistent/reviews.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, HybridRagError::Ingest(_)));
    }
}

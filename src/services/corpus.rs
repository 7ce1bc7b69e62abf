use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{Recipe, RecipeRecord},
    services::providers::EmbeddingProvider,
};

/// The recipe corpus with one precomputed embedding per recipe
///
/// Built once at startup and shared read-only across all personas. Recipe
/// order is the on-disk row order and is used for tie-breaking downstream.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    recipes: Vec<Recipe>,
    dimension: usize,
}

impl CorpusStore {
    /// Reads the corpus file and embeds every recipe document
    pub async fn load(
        path: &Path,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> AppResult<Self> {
        let records = read_records(path)?;
        tracing::info!(
            path = %path.display(),
            rows = records.len(),
            "Loaded recipe corpus"
        );
        Self::from_records(records, embedder, batch_size).await
    }

    /// Validates rows and computes their embeddings
    pub async fn from_records(
        records: Vec<RecipeRecord>,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> AppResult<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.recipe_id.as_str()) {
                return Err(AppError::CorpusLoad(format!(
                    "Duplicate recipe_id {}",
                    record.recipe_id
                )));
            }
        }

        if records.is_empty() {
            tracing::warn!("Recipe corpus is empty");
            return Ok(Self {
                recipes: Vec::new(),
                dimension: 0,
            });
        }

        let start = Instant::now();
        let documents: Vec<String> = records.iter().map(RecipeRecord::semantic_document).collect();
        let mut embeddings = Vec::with_capacity(documents.len());

        for (batch_index, batch) in documents.chunks(batch_size.max(1)).enumerate() {
            let vectors = embedder.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::CorpusLoad(format!(
                    "Embedding provider returned {} vectors for {} documents",
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
            tracing::debug!(
                batch = batch_index + 1,
                embedded = embeddings.len(),
                total = documents.len(),
                "Embedded recipe batch"
            );
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(AppError::CorpusLoad(
                "Embedding provider returned empty vectors".to_string(),
            ));
        }
        if let Some((index, vector)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(AppError::CorpusLoad(format!(
                "Embedding for row {} has dimension {}, expected {}",
                index,
                vector.len(),
                dimension
            )));
        }

        let recipes: Vec<Recipe> = records
            .into_iter()
            .zip(embeddings)
            .map(|(record, embedding)| Recipe::from_record(record, embedding))
            .collect();

        tracing::info!(
            recipes = recipes.len(),
            dimension,
            provider = embedder.name(),
            elapsed_ms = start.elapsed().as_millis(),
            "Recipe embeddings ready"
        );

        Ok(Self { recipes, dimension })
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Embedding dimensionality shared by every recipe
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Reads raw corpus rows, choosing the format by file extension
pub fn read_records(path: &Path) -> AppResult<Vec<RecipeRecord>> {
    if !path.exists() {
        return Err(AppError::CorpusLoad(format!(
            "Could not find {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let load_error = |e: AppError| AppError::CorpusLoad(format!("{}: {}", path.display(), e));

    match extension.as_str() {
        "csv" => read_csv(path).map_err(load_error),
        "json" => read_json(path).map_err(load_error),
        "jsonl" | "ndjson" => read_json_lines(path).map_err(load_error),
        other => Err(AppError::CorpusLoad(format!(
            "Unsupported corpus format '{}' for {}",
            other,
            path.display()
        ))),
    }
}

fn read_csv(path: &Path) -> AppResult<Vec<RecipeRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_column = headers.iter().position(|h| h.trim() == "recipe_id");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record: RecipeRecord = row.deserialize(Some(&headers))?;
        // csv infers numbers from bare cells, which would turn `0012` into `12`.
        if let Some(raw) = id_column.and_then(|i| row.get(i)) {
            record.recipe_id = raw.trim().to_string();
        }
        records.push(record);
    }
    Ok(records)
}

fn read_json(path: &Path) -> AppResult<Vec<RecipeRecord>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn read_json_lines(path: &Path) -> AppResult<Vec<RecipeRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            AppError::InvalidInput(format!("line {}: {}", line_number + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextOrList;
    use crate::services::providers::MockEmbeddingProvider;
    use std::io::Write;

    fn record(id: &str, title: &str) -> RecipeRecord {
        RecipeRecord {
            recipe_id: id.to_string(),
            title: title.to_string(),
            ingredients: TextOrList::Text("rice, salt".to_string()),
            ingredients_title: None,
            tags: None,
            calories_per_serving: Some(200.0),
            protein_per_serving: None,
            totalcarbohydrate_per_serving: None,
            totalfat_per_serving: None,
        }
    }

    fn counting_embedder(dimension: usize) -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(move |texts| Ok(texts.iter().map(|_| vec![1.0; dimension]).collect()));
        embedder.expect_name().return_const("mock");
        embedder
    }

    #[test]
    fn test_missing_file_is_corpus_error() {
        let result = read_records(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(AppError::CorpusLoad(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let result = read_records(file.path());
        assert!(matches!(result, Err(AppError::CorpusLoad(msg)) if msg.contains("parquet")));
    }

    #[test]
    fn test_read_csv_with_bracketed_headers() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "recipe_id,title,ingredients,tags,calories_per_serving [cal],protein_per_serving [g],totalcarbohydrate_per_serving [g],totalfat_per_serving [g]"
        )
        .unwrap();
        writeln!(file, "101,Tofu Bowl,\"tofu, rice\",vegan,350,20,40,").unwrap();
        file.flush().unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recipe_id, "101");
        assert_eq!(
            records[0].ingredients,
            TextOrList::Text("tofu, rice".to_string())
        );
        assert_eq!(records[0].calories_per_serving, Some(350.0));
        assert_eq!(records[0].totalfat_per_serving, None);
    }

    #[test]
    fn test_read_csv_keeps_ids_verbatim() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "recipe_id,title,ingredients").unwrap();
        writeln!(file, "0012,A,rice").unwrap();
        writeln!(file, "12,B,rice").unwrap();
        writeln!(file, "1e3,C,rice").unwrap();
        writeln!(file, " 7.0 ,D,rice").unwrap();
        file.flush().unwrap();

        let records = read_records(file.path()).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["0012", "12", "1e3", "7.0"]);
    }

    #[tokio::test]
    async fn test_leading_zero_ids_do_not_collide() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "recipe_id,title,ingredients").unwrap();
        writeln!(file, "012,A,rice").unwrap();
        writeln!(file, "12,B,rice").unwrap();
        file.flush().unwrap();

        let store = CorpusStore::load(file.path(), &counting_embedder(2), 8)
            .await
            .unwrap();
        assert_eq!(store.recipes()[0].recipe_id, "012");
        assert_eq!(store.recipes()[1].recipe_id, "12");
    }

    #[test]
    fn test_read_json_lines_skips_blank_lines() {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"{{"recipe_id": 1, "title": "A", "ingredients": ["x"]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"recipe_id": "2", "title": "B", "ingredients": "y"}}"#).unwrap();
        file.flush().unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].recipe_id, "2");
    }

    #[tokio::test]
    async fn test_embeds_in_batches() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .times(3)
            .returning(|texts| Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect()));
        embedder.expect_name().return_const("mock");

        let records = (0..5).map(|i| record(&i.to_string(), "Dish")).collect();
        let store = CorpusStore::from_records(records, &embedder, 2).await.unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.dimension(), 2);
        assert!(store.recipes().iter().all(|r| r.embedding.len() == 2));
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let embedder = counting_embedder(3);
        let records = vec![record("1", "A"), record("1", "B")];
        let result = CorpusStore::from_records(records, &embedder, 8).await;
        assert!(matches!(result, Err(AppError::CorpusLoad(msg)) if msg.contains("Duplicate")));
    }

    #[tokio::test]
    async fn test_inconsistent_dimensions_rejected() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|texts| {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![1.0; i + 1])
                .collect())
        });
        embedder.expect_name().return_const("mock");

        let records = vec![record("1", "A"), record("2", "B")];
        let result = CorpusStore::from_records(records, &embedder, 8).await;
        assert!(matches!(result, Err(AppError::CorpusLoad(_))));
    }

    #[tokio::test]
    async fn test_empty_corpus_skips_embedding() {
        let embedder = MockEmbeddingProvider::new();
        let store = CorpusStore::from_records(Vec::new(), &embedder, 8).await.unwrap();
        assert!(store.is_empty());
    }
}

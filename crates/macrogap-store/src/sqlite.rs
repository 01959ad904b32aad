//! SQLite-backed recipe catalog with nutrient table and persistent vector cache.
//!
//! Every multi-row write (recipe + ingredients, a batch of vectors) runs in one
//! transaction so concurrent readers never observe a half-written entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{decode_vector, encode_vector};
use crate::schema::{CATALOG_SCHEMA_SQL, EMBEDDING_SCHEMA_SQL, FOODS_SCHEMA_SQL};
use crate::types::*;
use macrogap_core::{Error, MacroSummary, Provenance, Result};

/// Bound on host parameters per `IN (...)` query.
const ID_BATCH: usize = 500;

/// SQLite catalog store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/catalog/`). The file will be `db_dir/macrogap.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("macrogap.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} recipes, {} foods, {} embeddings, path={}",
            store.count_recipes()?,
            store.count_foods()?,
            store.count_embeddings()?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -16384;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!(
            "{}\n{}\n{}",
            CATALOG_SCHEMA_SQL, FOODS_SCHEMA_SQL, EMBEDDING_SCHEMA_SQL
        );
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    // ---------------------------------------------------------------
    // Recipes
    // ---------------------------------------------------------------

    /// Insert a recipe and its ingredient lines atomically. Returns the new recipe ID.
    ///
    /// No uniqueness check happens here; callers dedup by (title, provenance).
    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<i64> {
        if recipe.title.trim().is_empty() {
            return Err(Error::Validation("recipe title is empty".into()));
        }
        let created_at = recipe.created_at.unwrap_or_else(Self::now_millis);
        let tags_json = serde_json::to_string(&recipe.tags)?;
        let instructions_json = serde_json::to_string(&recipe.instructions)?;

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO recipes (title, tags_json, instructions_json, kcal, protein_g, carbs_g,
                fat_g, fiber_g, provenance, time_minutes, difficulty, request_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                recipe.title.trim(),
                tags_json,
                instructions_json,
                recipe.macros.kcal,
                recipe.macros.protein_g,
                recipe.macros.carbs_g,
                recipe.macros.fat_g,
                recipe.macros.fiber_g,
                recipe.provenance.as_str(),
                recipe.time_minutes,
                recipe.difficulty,
                recipe.request_message,
                created_at,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        let recipe_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO recipe_items (recipe_id, position, name, grams, note)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (position, item) in recipe.ingredients.iter().enumerate() {
                stmt.execute(params![
                    recipe_id,
                    position as i64,
                    item.name.trim(),
                    item.grams,
                    item.note
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        debug!(
            "Inserted recipe {} '{}' ({}, {} ingredients)",
            recipe_id,
            recipe.title,
            recipe.provenance,
            recipe.ingredients.len()
        );
        Ok(recipe_id)
    }

    /// Get a recipe by ID.
    pub fn get_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM recipes WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![recipe_id], |row| Ok(Self::row_to_recipe(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        match row {
            Some(mut recipe) => {
                recipe.ingredients = Self::load_ingredients(&conn, recipe.id)?;
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    /// List recipes newest first, optionally bounded to the `limit` most recent.
    pub fn list_recipes(&self, limit: Option<usize>) -> Result<Vec<Recipe>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let conn = self.conn.lock();
        let mut recipes = conn
            .prepare_cached("SELECT * FROM recipes ORDER BY created_at DESC, id DESC LIMIT ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_map(params![limit], |row| Ok(Self::row_to_recipe(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect::<Vec<_>>();
        for recipe in &mut recipes {
            recipe.ingredients = Self::load_ingredients(&conn, recipe.id)?;
        }
        Ok(recipes)
    }

    /// Find a recipe by case-insensitive title and provenance.
    pub fn find_recipe_by_title(
        &self,
        title: &str,
        provenance: Provenance,
    ) -> Result<Option<Recipe>> {
        let id: Option<i64> = {
            let conn = self.conn.lock();
            let id = conn.prepare_cached(
                "SELECT id FROM recipes WHERE title = ?1 COLLATE NOCASE AND provenance = ?2
                 ORDER BY id LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![title.trim(), provenance.as_str()], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
            id
        };
        match id {
            Some(id) => self.get_recipe(id),
            None => Ok(None),
        }
    }

    /// Recipes of every provenance.
    pub fn count_recipes(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM recipes")
    }

    fn count_by_provenance(&self, provenance: Provenance) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE provenance = ?1",
            params![provenance.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    fn load_ingredients(conn: &Connection, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let items = conn
            .prepare_cached(
                "SELECT name, grams, note FROM recipe_items WHERE recipe_id = ?1 ORDER BY position",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_map(params![recipe_id], |row| {
                Ok(RecipeIngredient {
                    name: row.get(0)?,
                    grams: row.get(1)?,
                    note: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    // ---------------------------------------------------------------
    // Foods (nutrient lookup)
    // ---------------------------------------------------------------

    /// Insert or update a food by name. Returns the food ID.
    pub fn upsert_food(&self, food: &Food) -> Result<i64> {
        let name = food.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("food name is empty".into()));
        }
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO foods (name, kcal, protein_g, carbs_g, fat_g, fiber_g)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET
                    kcal = excluded.kcal,
                    protein_g = excluded.protein_g,
                    carbs_g = excluded.carbs_g,
                    fat_g = excluded.fat_g,
                    fiber_g = excluded.fiber_g
                 RETURNING id",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(
                params![name, food.kcal, food.protein_g, food.carbs_g, food.fat_g, food.fiber_g],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Exact (case-insensitive) name lookup of per-100 g nutrients.
    pub fn find_food(&self, name: &str) -> Result<Option<Food>> {
        let conn = self.conn.lock();
        let food = conn
            .prepare_cached("SELECT * FROM foods WHERE name = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![name.trim()], |row| Ok(Self::row_to_food(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(food)
    }

    /// All foods ordered by name.
    pub fn list_foods(&self) -> Result<Vec<Food>> {
        let conn = self.conn.lock();
        let foods = conn
            .prepare_cached("SELECT * FROM foods ORDER BY name")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_map([], |row| Ok(Self::row_to_food(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(foods)
    }

    /// Known food names, used to infer required ingredients from a message.
    pub fn food_names(&self) -> Result<Vec<String>> {
        Ok(self.list_foods()?.into_iter().map(|f| f.name).collect())
    }

    /// Rows in the nutrient table.
    pub fn count_foods(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM foods")
    }

    // ---------------------------------------------------------------
    // Embeddings
    // ---------------------------------------------------------------

    /// Get the cached vector of one recipe.
    pub fn get_embedding(&self, recipe_id: i64) -> Result<Option<EmbeddingEntry>> {
        let conn = self.conn.lock();
        let entry = conn
            .prepare_cached("SELECT * FROM recipe_embeddings WHERE recipe_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![recipe_id], |row| Ok(Self::row_to_embedding(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(entry.flatten())
    }

    /// Cached vectors for many recipes. Missing (or unreadable) ids are simply absent.
    pub fn get_embeddings(&self, recipe_ids: &[i64]) -> Result<HashMap<i64, EmbeddingEntry>> {
        let mut found = HashMap::with_capacity(recipe_ids.len());
        let conn = self.conn.lock();
        for batch in recipe_ids.chunks(ID_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(",");
            let sql = format!(
                "SELECT * FROM recipe_embeddings WHERE recipe_id IN ({})",
                placeholders
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params_from_iter(batch.iter()), |row| {
                    Ok(Self::row_to_embedding(row))
                })
                .map_err(|e| Error::Database(e.to_string()))?;
            for entry in rows.filter_map(|r| r.ok()).flatten() {
                found.insert(entry.recipe_id, entry);
            }
        }
        Ok(found)
    }

    /// Upsert vectors in one transaction: either all land or none do.
    pub fn upsert_embeddings(&self, entries: &[EmbeddingEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO recipe_embeddings
                        (recipe_id, vector, dim, document_text, document_hash, model_id, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(recipe_id) DO UPDATE SET
                        vector = excluded.vector,
                        dim = excluded.dim,
                        document_text = excluded.document_text,
                        document_hash = excluded.document_hash,
                        model_id = excluded.model_id,
                        updated_at = excluded.updated_at",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for entry in entries {
                stmt.execute(params![
                    entry.recipe_id,
                    encode_vector(&entry.vector),
                    entry.vector.len() as i64,
                    entry.document_text,
                    entry.document_hash,
                    entry.model_id,
                    entry.updated_at,
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(entries.len())
    }

    /// Cached recipe vectors, whatever their model.
    pub fn count_embeddings(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM recipe_embeddings")
    }

    /// Drop every cached vector. Returns the number removed.
    pub fn clear_embeddings(&self) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM recipe_embeddings", [])
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<CatalogStats> {
        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(CatalogStats {
            total_recipes: self.count_recipes()?,
            catalog_recipes: self.count_by_provenance(Provenance::Catalog)?,
            generative_recipes: self.count_by_provenance(Provenance::Generative)?,
            heuristic_recipes: self.count_by_provenance(Provenance::Heuristic)?,
            foods: self.count_foods()?,
            embeddings_stored: self.count_embeddings()?,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_recipe(row: &rusqlite::Row<'_>) -> Recipe {
        let json_list = |col: &str| -> Vec<String> {
            row.get::<_, String>(col)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default()
        };
        let real = |col: &str| -> Option<f64> { row.get::<_, Option<f64>>(col).ok().flatten() };

        Recipe {
            id: row.get("id").unwrap_or(0),
            title: row.get("title").unwrap_or_default(),
            tags: json_list("tags_json"),
            ingredients: Vec::new(),
            instructions: json_list("instructions_json"),
            macros: MacroSummary {
                kcal: real("kcal"),
                protein_g: real("protein_g"),
                carbs_g: real("carbs_g"),
                fat_g: real("fat_g"),
                fiber_g: real("fiber_g"),
            },
            provenance: Provenance::parse(&row.get::<_, String>("provenance").unwrap_or_default()),
            time_minutes: row.get("time_minutes").ok().flatten(),
            difficulty: row.get("difficulty").ok().flatten(),
            request_message: row.get("request_message").ok().flatten(),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn row_to_food(row: &rusqlite::Row<'_>) -> Food {
        Food {
            id: row.get("id").unwrap_or(0),
            name: row.get("name").unwrap_or_default(),
            kcal: row.get("kcal").unwrap_or(0.0),
            protein_g: row.get("protein_g").unwrap_or(0.0),
            carbs_g: row.get("carbs_g").unwrap_or(0.0),
            fat_g: row.get("fat_g").unwrap_or(0.0),
            fiber_g: row.get("fiber_g").unwrap_or(0.0),
        }
    }

    /// `None` when the stored blob does not decode; such entries count as missing.
    fn row_to_embedding(row: &rusqlite::Row<'_>) -> Option<EmbeddingEntry> {
        let blob: Vec<u8> = row.get("vector").ok()?;
        let vector = decode_vector(&blob)?;
        Some(EmbeddingEntry {
            recipe_id: row.get("recipe_id").ok()?,
            vector,
            document_text: row.get("document_text").unwrap_or_default(),
            document_hash: row.get("document_hash").unwrap_or_default(),
            model_id: row.get("model_id").unwrap_or_default(),
            updated_at: row.get("updated_at").unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::document_hash;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn oatmeal() -> NewRecipe {
        NewRecipe {
            tags: vec!["breakfast".into(), "protein".into()],
            ingredients: vec![
                RecipeIngredient::new("Oats", 80.0),
                RecipeIngredient::new("Skyr", 150.0),
            ],
            instructions: vec!["Cook oats.".into(), "Stir in skyr.".into()],
            macros: MacroSummary {
                kcal: Some(450.0),
                protein_g: Some(32.0),
                ..Default::default()
            },
            ..NewRecipe::new("High Protein Oatmeal", Provenance::Catalog)
        }
    }

    fn entry(recipe_id: i64, vector: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry {
            recipe_id,
            vector,
            document_text: "doc".into(),
            document_hash: document_hash("doc"),
            model_id: "test".into(),
            updated_at: 1,
        }
    }

    #[test]
    fn test_insert_and_get_recipe() {
        let (store, _dir) = test_store();
        let id = store.insert_recipe(&oatmeal()).unwrap();

        let recipe = store.get_recipe(id).unwrap().unwrap();
        assert_eq!(recipe.title, "High Protein Oatmeal");
        assert_eq!(recipe.provenance, Provenance::Catalog);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "Oats");
        assert_eq!(recipe.ingredients[1].grams, Some(150.0));
        assert_eq!(recipe.instructions.len(), 2);
        assert_eq!(recipe.macros.kcal, Some(450.0));
        assert_eq!(recipe.macros.fat_g, None);
        assert!(recipe.has_tag("Breakfast"));
    }

    #[test]
    fn test_empty_title_rejected() {
        let (store, _dir) = test_store();
        let err = store
            .insert_recipe(&NewRecipe::new("  ", Provenance::Heuristic))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.count_recipes().unwrap(), 0);
    }

    #[test]
    fn test_list_recipes_newest_first_and_bounded() {
        let (store, _dir) = test_store();
        for (i, title) in ["First", "Second", "Third"].iter().enumerate() {
            let mut r = NewRecipe::new(*title, Provenance::Catalog);
            r.created_at = Some(1000 + i as i64);
            store.insert_recipe(&r).unwrap();
        }

        let all = store.list_recipes(None).unwrap();
        let titles: Vec<_> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);

        let bounded = store.list_recipes(Some(2)).unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].title, "Third");
    }

    #[test]
    fn test_find_by_title_respects_provenance() {
        let (store, _dir) = test_store();
        store
            .insert_recipe(&NewRecipe::new("Tofu Bowl", Provenance::Generative))
            .unwrap();

        assert!(store
            .find_recipe_by_title("tofu bowl", Provenance::Generative)
            .unwrap()
            .is_some());
        assert!(store
            .find_recipe_by_title("Tofu Bowl", Provenance::Heuristic)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_food_upsert_and_lookup() {
        let (store, _dir) = test_store();
        let id = store
            .upsert_food(&Food::new("Chicken Breast", 165.0, 31.0, 0.0, 3.6))
            .unwrap();
        let again = store
            .upsert_food(&Food::new("chicken breast", 120.0, 23.0, 0.0, 1.5))
            .unwrap();
        assert_eq!(id, again);
        assert_eq!(store.count_foods().unwrap(), 1);

        let food = store.find_food("CHICKEN BREAST").unwrap().unwrap();
        assert_eq!(food.kcal, 120.0);
        assert!(store.find_food("Chicken").unwrap().is_none());
    }

    #[test]
    fn test_embedding_upsert_overwrites() {
        let (store, _dir) = test_store();
        let id = store.insert_recipe(&oatmeal()).unwrap();

        store.upsert_embeddings(&[entry(id, vec![1.0, 0.0])]).unwrap();
        store.upsert_embeddings(&[entry(id, vec![0.0, 1.0, 0.5])]).unwrap();

        assert_eq!(store.count_embeddings().unwrap(), 1);
        let cached = store.get_embedding(id).unwrap().unwrap();
        assert_eq!(cached.vector, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_get_embeddings_skips_missing() {
        let (store, _dir) = test_store();
        let a = store.insert_recipe(&oatmeal()).unwrap();
        let b = store
            .insert_recipe(&NewRecipe::new("Lentil Soup", Provenance::Catalog))
            .unwrap();
        store.upsert_embeddings(&[entry(a, vec![0.5; 4])]).unwrap();

        let found = store.get_embeddings(&[a, b, 999]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&a));
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let (store, _dir) = test_store();
        let a = store.insert_recipe(&oatmeal()).unwrap();

        // Second entry violates the foreign key, so the whole batch rolls back.
        let result = store.upsert_embeddings(&[entry(a, vec![1.0]), entry(4242, vec![1.0])]);
        assert!(result.is_err());
        assert_eq!(store.count_embeddings().unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store();
        store.insert_recipe(&oatmeal()).unwrap();
        store
            .insert_recipe(&NewRecipe::new("Quark Bowl", Provenance::Heuristic))
            .unwrap();
        store.upsert_food(&Food::new("Oats", 372.0, 13.5, 58.7, 7.0)).unwrap();
        assert_eq!(store.clear_embeddings().unwrap(), 0);

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_recipes, 2);
        assert_eq!(stats.catalog_recipes, 1);
        assert_eq!(stats.heuristic_recipes, 1);
        assert_eq!(stats.foods, 1);
        assert_eq!(stats.embeddings_stored, 0);
    }
}

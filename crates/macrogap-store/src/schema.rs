//! Database schema SQL.

/// Catalog tables: recipes and their ordered ingredient rows.
pub const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    tags_json TEXT NOT NULL DEFAULT '[]',
    instructions_json TEXT NOT NULL DEFAULT '[]',
    kcal REAL,
    protein_g REAL,
    carbs_g REAL,
    fat_g REAL,
    fiber_g REAL,
    provenance TEXT NOT NULL DEFAULT 'catalog',
    time_minutes INTEGER,
    difficulty TEXT,
    request_message TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title COLLATE NOCASE, provenance);
CREATE INDEX IF NOT EXISTS idx_recipes_created ON recipes(created_at);

CREATE TABLE IF NOT EXISTS recipe_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    grams REAL,
    note TEXT
);

CREATE INDEX IF NOT EXISTS idx_recipe_items_recipe ON recipe_items(recipe_id);
"#;

/// Per-100 g nutrient table backing the nutrient lookup and the heuristic tier.
pub const FOODS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS foods (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    kcal REAL NOT NULL DEFAULT 0,
    protein_g REAL NOT NULL DEFAULT 0,
    carbs_g REAL NOT NULL DEFAULT 0,
    fat_g REAL NOT NULL DEFAULT 0,
    fiber_g REAL NOT NULL DEFAULT 0
);
"#;

/// One live vector per recipe, overwritten on refresh.
pub const EMBEDDING_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recipe_embeddings (
    recipe_id INTEGER PRIMARY KEY REFERENCES recipes(id) ON DELETE CASCADE,
    vector BLOB NOT NULL,
    dim INTEGER NOT NULL,
    document_text TEXT NOT NULL,
    document_hash TEXT NOT NULL,
    model_id TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

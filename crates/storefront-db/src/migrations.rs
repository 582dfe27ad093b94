use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                is_supplier INTEGER NOT NULL DEFAULT 0,
                is_customer INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE categories (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL,
                slug        TEXT NOT NULL UNIQUE,
                parent_id   INTEGER REFERENCES categories(id)
            );

            CREATE INDEX idx_categories_parent ON categories(parent_id);

            CREATE TABLE products (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL,
                slug        TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                price       INTEGER NOT NULL,
                image_url   TEXT NOT NULL,
                stock       INTEGER NOT NULL,
                category_id INTEGER NOT NULL REFERENCES categories(id),
                rating      REAL NOT NULL DEFAULT 0.0,
                supplier_id INTEGER REFERENCES users(id),
                is_active   INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX idx_products_category ON products(category_id);

            CREATE TABLE reviews (
                id           INTEGER PRIMARY KEY,
                user_id      INTEGER NOT NULL REFERENCES users(id),
                product_id   INTEGER NOT NULL REFERENCES products(id),
                comment      TEXT NOT NULL,
                comment_date TEXT NOT NULL,
                grade        INTEGER NOT NULL,
                is_active    INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX idx_reviews_product ON reviews(product_id, is_active);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use storefront_types::auth::RoleFlags;
use storefront_types::models::{Category, Product, Review};

use crate::Database;
use crate::models::{NewUser, ProductFields, UserRow};

const USER_COLUMNS: &str = "id, first_name, last_name, username, email, password, is_active, is_admin, is_supplier, is_customer";
const CATEGORY_COLUMNS: &str = "id, slug, name, parent_id";
const PRODUCT_COLUMNS: &str = "id, slug, name, description, price, image_url, stock, category_id, rating, supplier_id, is_active";
const REVIEW_COLUMNS: &str = "id, user_id, product_id, comment, comment_date, grade, is_active";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (first_name, last_name, username, email, password, is_admin, is_supplier, is_customer)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.first_name,
                    user.last_name,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.roles.is_admin,
                    user.roles.is_supplier,
                    user.roles.is_customer,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
        })
    }

    /// Returns false if no such user exists.
    pub fn set_user_roles(&self, id: i64, roles: RoleFlags) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_admin = ?2, is_supplier = ?3, is_customer = ?4 WHERE id = ?1",
                params![id, roles.is_admin, roles.is_supplier, roles.is_customer],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_category_by_id(&self, id: i64) -> Result<Option<Category>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], category_from_row).optional()?)
        })
    }

    pub fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?1");
            Ok(conn.query_row(&sql, [slug], category_from_row).optional()?)
        })
    }

    /// Ids of the immediate children of `parent_id` (one level only).
    pub fn child_category_ids(&self, parent_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM categories WHERE parent_id = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map([parent_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    pub fn insert_category(&self, name: &str, slug: &str, parent_id: Option<i64>) -> Result<Category> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (name, slug, parent_id) VALUES (?1, ?2, ?3)",
                params![name, slug, parent_id],
            )?;
            Ok(Category {
                id: conn.last_insert_rowid(),
                slug: slug.to_string(),
                name: name.to_string(),
                parent_id,
            })
        })
    }

    pub fn update_category(
        &self,
        id: i64,
        name: &str,
        slug: &str,
        parent_id: Option<i64>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE categories SET name = ?2, slug = ?3, parent_id = ?4 WHERE id = ?1",
                params![id, name, slug, parent_id],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Products --

    /// Active products with stock on hand.
    pub fn list_available_products(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND stock > 0 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], product_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Active, in-stock products whose category is one of `category_ids`.
    pub fn list_available_products_in(&self, category_ids: &[i64]) -> Result<Vec<Product>> {
        if category_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=category_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE category_id IN ({}) AND is_active = 1 AND stock > 0
                 ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(category_ids.iter()), product_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Direct lookup; inactive products are returned too.
    pub fn get_product_by_id(&self, id: i64) -> Result<Option<Product>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], product_from_row).optional()?)
        })
    }

    /// Direct lookup; inactive products are returned too.
    pub fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = ?1");
            Ok(conn.query_row(&sql, [slug], product_from_row).optional()?)
        })
    }

    pub fn get_available_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = ?1 AND is_active = 1 AND stock > 0"
            );
            Ok(conn.query_row(&sql, [slug], product_from_row).optional()?)
        })
    }

    pub fn insert_product(&self, fields: &ProductFields<'_>, supplier_id: Option<i64>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (name, slug, description, price, image_url, stock, category_id, rating, supplier_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0.0, ?8)",
                params![
                    fields.name,
                    fields.slug,
                    fields.description,
                    fields.price,
                    fields.image_url,
                    fields.stock,
                    fields.category_id,
                    supplier_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrites the editable columns of an active product. Ownership, rating
    /// and status are untouched. Returns false if the product was not active.
    pub fn update_product(&self, id: i64, fields: &ProductFields<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE products
                 SET name = ?2, slug = ?3, description = ?4, price = ?5, image_url = ?6, stock = ?7, category_id = ?8
                 WHERE id = ?1 AND is_active = 1",
                params![
                    id,
                    fields.name,
                    fields.slug,
                    fields.description,
                    fields.price,
                    fields.image_url,
                    fields.stock,
                    fields.category_id,
                ],
            )?;
            Ok(changed == 1)
        })
    }

    /// Flag flip only. Returns false if the product was not active.
    pub fn deactivate_product(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE products SET is_active = 0 WHERE id = ?1 AND is_active = 1",
                [id],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Reviews --

    pub fn list_active_reviews(&self) -> Result<Vec<Review>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE is_active = 1 ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], review_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_active_reviews_for_product(&self, product_id: i64) -> Result<Vec<Review>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = ?1 AND is_active = 1 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([product_id], review_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Inserts a review and refreshes the product's rating in one transaction.
    /// Returns `None`, writing nothing, if the product is missing or inactive.
    pub fn add_review(
        &self,
        user_id: i64,
        product_id: i64,
        comment: &str,
        grade: i64,
        comment_date: DateTime<Utc>,
    ) -> Result<Option<Review>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO reviews (user_id, product_id, comment, comment_date, grade)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM products WHERE id = ?2 AND is_active = 1)",
                params![user_id, product_id, comment, comment_date, grade],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            let id = tx.last_insert_rowid();
            refresh_rating(&tx, product_id)?;
            tx.commit()?;

            Ok(Some(Review {
                id,
                user_id,
                product_id,
                comment: comment.to_string(),
                comment_date,
                grade,
                is_active: true,
            }))
        })
    }

    /// Deactivates every active review of a product and resets its rating.
    /// Returns the number of reviews deactivated; when zero nothing is written.
    pub fn deactivate_reviews_for_product(&self, product_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE reviews SET is_active = 0 WHERE product_id = ?1 AND is_active = 1",
                [product_id],
            )?;
            if changed == 0 {
                return Ok(0);
            }
            refresh_rating(&tx, product_id)?;
            tx.commit()?;
            Ok(changed)
        })
    }
}

/// Rating is the mean grade of the product's active reviews, 0.0 if none.
fn refresh_rating(conn: &Connection, product_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE products
         SET rating = COALESCE((SELECT AVG(grade) FROM reviews WHERE product_id = ?1 AND is_active = 1), 0.0)
         WHERE id = ?1",
        [product_id],
    )?;
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
        password: row.get(5)?,
        is_active: row.get(6)?,
        is_admin: row.get(7)?,
        is_supplier: row.get(8)?,
        is_customer: row.get(9)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        parent_id: row.get(3)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        image_url: row.get(5)?,
        stock: row.get(6)?,
        category_id: row.get(7)?,
        rating: row.get(8)?,
        supplier_id: row.get(9)?,
        is_active: row.get(10)?,
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        user_id: row.get(1)?,
        product_id: row.get(2)?,
        comment: row.get(3)?,
        comment_date: row.get(4)?,
        grade: row.get(5)?,
        is_active: row.get(6)?,
    })
}

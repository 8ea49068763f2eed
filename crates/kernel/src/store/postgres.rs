//! Postgres store implementations.
//!
//! Tables: `document` (JSONB `names`/`fields`/`schedule`, TEXT[]
//! `published_cultures`), `document_permission` (per-node letter sets),
//! `language`, `approval_queue`, and `document_relation` (copy tracking).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ChildOrder, ChildQuery, DocumentStore, LanguageCatalog, Page, PermissionStore};
use crate::error::{EngineError, EngineResult};
use crate::models::permission::normalize_assignment;
use crate::models::{
    Document, Language, PermissionSet, RECYCLE_BIN_ID, ROOT_ID,
};

const DOCUMENT_COLS: &str = "id, key, parent_id, path, doc_type, trashed, sort_order, version, \
     published, edited, published_cultures, names, fields, schedule, created, changed";

/// Raw document row; JSONB columns are decoded into model types after the
/// fetch.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    key: Uuid,
    parent_id: i64,
    path: String,
    doc_type: String,
    trashed: bool,
    sort_order: i32,
    version: i64,
    published: bool,
    edited: bool,
    published_cultures: Vec<String>,
    names: serde_json::Value,
    fields: serde_json::Value,
    schedule: serde_json::Value,
    created: i64,
    changed: i64,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        Ok(Document {
            id: self.id,
            key: self.key,
            parent_id: self.parent_id,
            path: self.path,
            doc_type: self.doc_type,
            trashed: self.trashed,
            sort_order: self.sort_order,
            version: self.version,
            published: self.published,
            edited: self.edited,
            published_cultures: self.published_cultures.into_iter().collect(),
            names: serde_json::from_value(self.names).context("decode document names")?,
            fields: self.fields,
            schedule: serde_json::from_value(self.schedule).context("decode document schedule")?,
            created: self.created,
            changed: self.changed,
        })
    }
}

/// Sentinel path for a reserved parent id, when applicable.
fn sentinel_path(parent_id: i64) -> Option<String> {
    match parent_id {
        ROOT_ID => Some(ROOT_ID.to_string()),
        RECYCLE_BIN_ID => Some(format!("{ROOT_ID},{RECYCLE_BIN_ID}")),
        _ => None,
    }
}

fn path_has_bin(path: &str) -> bool {
    path.split(',').any(|s| s.parse::<i64>() == Ok(RECYCLE_BIN_ID))
}

/// Postgres document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i64) -> EngineResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLS} FROM document WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch document by id")?;

        row.map(DocumentRow::into_document).transpose().map_err(Into::into)
    }

    async fn parent_path(
        tx: &mut sqlx::PgConnection,
        parent_id: i64,
    ) -> EngineResult<String> {
        if let Some(path) = sentinel_path(parent_id) {
            return Ok(path);
        }
        let path: Option<String> =
            sqlx::query_scalar("SELECT path FROM document WHERE id = $1 FOR UPDATE")
                .bind(parent_id)
                .fetch_optional(tx)
                .await
                .context("failed to fetch parent path")?;
        path.ok_or(EngineError::NotFound)
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get(&self, id: i64) -> EngineResult<Option<Document>> {
        self.fetch(id).await
    }

    async fn get_by_key(&self, key: Uuid) -> EngineResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLS} FROM document WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch document by key")?;

        row.map(DocumentRow::into_document).transpose().map_err(Into::into)
    }

    async fn children(&self, parent_id: i64, query: &ChildQuery) -> EngineResult<Page<Document>> {
        let mut where_clause = String::from("parent_id = $1");
        if query.filter.is_some() {
            where_clause.push_str(
                " AND EXISTS (SELECT 1 FROM jsonb_each_text(names) n \
                 WHERE n.value ILIKE '%' || $2 || '%')",
            );
        }

        let order_clause = match query.order {
            ChildOrder::SortOrder => "sort_order",
            ChildOrder::Name => "names->>'*'",
            ChildOrder::Changed => "changed DESC",
        };

        let sql = format!(
            "SELECT {DOCUMENT_COLS} FROM document WHERE {where_clause} \
             ORDER BY {order_clause} LIMIT {} OFFSET {}",
            query.per_page.max(0),
            (query.page * query.per_page).max(0)
        );
        let count_sql = format!("SELECT COUNT(*) FROM document WHERE {where_clause}");

        let mut rows_query = sqlx::query_as::<_, DocumentRow>(&sql).bind(parent_id);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(parent_id);
        if let Some(filter) = &query.filter {
            rows_query = rows_query.bind(filter);
            count_query = count_query.bind(filter);
        }

        let rows = rows_query
            .fetch_all(&self.pool)
            .await
            .context("failed to list children")?;
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .context("failed to count children")?;

        let items = rows
            .into_iter()
            .map(DocumentRow::into_document)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn child_ids(&self, parent_id: i64) -> EngineResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM document WHERE parent_id = $1 ORDER BY sort_order",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list child ids")?;

        Ok(ids)
    }

    async fn insert(&self, doc: Document) -> EngineResult<Document> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        let parent_path = Self::parent_path(&mut *tx, doc.parent_id).await?;

        let published_cultures: Vec<String> = doc.published_cultures.iter().cloned().collect();
        let names = serde_json::to_value(&doc.names).context("encode names")?;
        let schedule = serde_json::to_value(&doc.schedule).context("encode schedule")?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document (key, parent_id, path, doc_type, trashed, sort_order, version,
                published, edited, published_cultures, names, fields, schedule, created, changed)
            VALUES ($1, $2, '', $3, false,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM document WHERE parent_id = $2),
                1, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(doc.key)
        .bind(doc.parent_id)
        .bind(&doc.doc_type)
        .bind(doc.published)
        .bind(doc.edited)
        .bind(&published_cultures)
        .bind(&names)
        .bind(&doc.fields)
        .bind(&schedule)
        .bind(doc.created)
        .bind(doc.changed)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert document")?;

        let path = Document::build_path(&parent_path, id);
        sqlx::query("UPDATE document SET path = $1, trashed = $2 WHERE id = $3")
            .bind(&path)
            .bind(path_has_bin(&path))
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to set document path")?;

        tx.commit().await.context("failed to commit transaction")?;

        self.fetch(id).await?.ok_or(EngineError::NotFound)
    }

    async fn save(&self, doc: &Document) -> EngineResult<Document> {
        let published_cultures: Vec<String> = doc.published_cultures.iter().cloned().collect();
        let names = serde_json::to_value(&doc.names).context("encode names")?;
        let schedule = serde_json::to_value(&doc.schedule).context("encode schedule")?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            UPDATE document SET
                published = $1,
                edited = $2,
                published_cultures = $3,
                names = $4,
                fields = $5,
                schedule = $6,
                changed = $7,
                version = version + 1
            WHERE id = $8 AND version = $9
            RETURNING {DOCUMENT_COLS}
            "#,
        ))
        .bind(doc.published)
        .bind(doc.edited)
        .bind(&published_cultures)
        .bind(&names)
        .bind(&doc.fields)
        .bind(&schedule)
        .bind(doc.changed)
        .bind(doc.id)
        .bind(doc.version)
        .fetch_optional(&self.pool)
        .await
        .context("failed to save document")?;

        match row {
            Some(row) => Ok(row.into_document()?),
            None => {
                // Missing row vs stale version
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM document WHERE id = $1)")
                        .bind(doc.id)
                        .fetch_one(&self.pool)
                        .await
                        .context("failed to check document existence")?;
                if exists {
                    Err(EngineError::ConcurrencyConflict)
                } else {
                    Err(EngineError::NotFound)
                }
            }
        }
    }

    async fn delete_subtree(&self, id: i64) -> EngineResult<u64> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        let path: Option<String> =
            sqlx::query_scalar("SELECT path FROM document WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to fetch document path")?;
        let path = path.ok_or(EngineError::NotFound)?;

        let result = sqlx::query("DELETE FROM document WHERE path = $1 OR path LIKE $1 || ',%'")
            .bind(&path)
            .execute(&mut *tx)
            .await
            .context("failed to delete subtree")?;

        tx.commit().await.context("failed to commit transaction")?;

        Ok(result.rows_affected())
    }

    async fn move_subtree(&self, id: i64, new_parent_id: i64) -> EngineResult<Document> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        let old_path: Option<String> =
            sqlx::query_scalar("SELECT path FROM document WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to fetch document path")?;
        let old_path = old_path.ok_or(EngineError::NotFound)?;

        let parent_path = Self::parent_path(&mut *tx, new_parent_id).await?;
        let new_path = Document::build_path(&parent_path, id);
        let trashed = path_has_bin(&new_path);

        sqlx::query(
            r#"
            UPDATE document
            SET path = $1 || substr(path, char_length($2) + 1), trashed = $3
            WHERE path = $2 OR path LIKE $2 || ',%'
            "#,
        )
        .bind(&new_path)
        .bind(&old_path)
        .bind(trashed)
        .execute(&mut *tx)
        .await
        .context("failed to rewrite subtree paths")?;

        sqlx::query(
            r#"
            UPDATE document
            SET parent_id = $1,
                sort_order = (SELECT COALESCE(MAX(sort_order) + 1, 0)
                              FROM document WHERE parent_id = $1 AND id != $2)
            WHERE id = $2
            "#,
        )
        .bind(new_parent_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to reparent document")?;

        tx.commit().await.context("failed to commit transaction")?;

        self.fetch(id).await?.ok_or(EngineError::NotFound)
    }

    async fn copy_subtree(
        &self,
        id: i64,
        target_parent_id: i64,
        recursive: bool,
        relate_to_original: bool,
    ) -> EngineResult<Document> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        let target_path = Self::parent_path(&mut *tx, target_parent_id).await?;

        // Parents before children: order by path depth (comma count)
        let sql = if recursive {
            format!(
                "SELECT {DOCUMENT_COLS} FROM document \
                 WHERE id = $1 OR path LIKE (SELECT path FROM document WHERE id = $1) || ',%' \
                 ORDER BY (char_length(path) - char_length(replace(path, ',', '')))"
            )
        } else {
            format!("SELECT {DOCUMENT_COLS} FROM document WHERE id = $1")
        };
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .context("failed to fetch subtree for copy")?;

        if rows.is_empty() {
            return Err(EngineError::NotFound);
        }

        let mut id_map: std::collections::BTreeMap<i64, i64> = std::collections::BTreeMap::new();
        let mut path_map: std::collections::BTreeMap<i64, String> =
            std::collections::BTreeMap::new();
        let mut copy_root_id = None;

        for row in rows {
            let source = row.into_document()?;
            let (parent_id, parent_path) = if source.id == id {
                (target_parent_id, target_path.clone())
            } else {
                let mapped = *id_map.get(&source.parent_id).ok_or(EngineError::NotFound)?;
                (mapped, path_map[&mapped].clone())
            };

            let names = serde_json::to_value(&source.names).context("encode names")?;
            let schedule = serde_json::to_value(&source.schedule).context("encode schedule")?;

            let new_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO document (key, parent_id, path, doc_type, trashed, sort_order, version,
                    published, edited, published_cultures, names, fields, schedule, created, changed)
                VALUES ($1, $2, '', $3, false,
                    (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM document WHERE parent_id = $2),
                    1, false, true, '{}', $4, $5, $6, $7, $7)
                RETURNING id
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(parent_id)
            .bind(&source.doc_type)
            .bind(&names)
            .bind(&source.fields)
            .bind(&schedule)
            .bind(chrono::Utc::now().timestamp())
            .fetch_one(&mut *tx)
            .await
            .context("failed to insert document copy")?;

            let new_path = Document::build_path(&parent_path, new_id);
            sqlx::query("UPDATE document SET path = $1, trashed = $2 WHERE id = $3")
                .bind(&new_path)
                .bind(path_has_bin(&new_path))
                .bind(new_id)
                .execute(&mut *tx)
                .await
                .context("failed to set copy path")?;

            if relate_to_original {
                sqlx::query(
                    "INSERT INTO document_relation (child_id, original_id, relation_type) \
                     VALUES ($1, $2, 'copy-of')",
                )
                .bind(new_id)
                .bind(source.id)
                .execute(&mut *tx)
                .await
                .context("failed to record copy relation")?;
            }

            if source.id == id {
                copy_root_id = Some(new_id);
            }
            id_map.insert(source.id, new_id);
            path_map.insert(new_id, new_path);
        }

        tx.commit().await.context("failed to commit transaction")?;

        let root_id = copy_root_id.ok_or(EngineError::NotFound)?;
        self.fetch(root_id).await?.ok_or(EngineError::NotFound)
    }

    async fn set_sort_orders(&self, parent_id: i64, ordered_ids: &[i64]) -> EngineResult<()> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        for (position, id) in ordered_ids.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE document SET sort_order = $1 WHERE id = $2 AND parent_id = $3",
            )
            .bind(position as i32)
            .bind(id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await
            .context("failed to update sort order")?;

            if result.rows_affected() == 0 {
                return Err(EngineError::StructuralViolation(format!(
                    "document {id} is not a child of {parent_id}"
                )));
            }
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }

    async fn queue_approval(
        &self,
        id: i64,
        cultures: &[String],
        user_id: Uuid,
    ) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO approval_queue (node_id, cultures, user_id, requested_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(cultures)
        .bind(user_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("failed to queue approval request")?;

        Ok(())
    }
}

/// Postgres language catalog.
#[derive(Clone)]
pub struct PostgresLanguageCatalog {
    pool: PgPool,
}

impl PostgresLanguageCatalog {
    /// Create a catalog over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LanguageCatalog for PostgresLanguageCatalog {
    async fn all(&self) -> EngineResult<Vec<Language>> {
        let languages = sqlx::query_as::<_, Language>(
            "SELECT iso_code, label, mandatory, is_default FROM language ORDER BY iso_code",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list languages")?;

        Ok(languages)
    }
}

/// Postgres permission assignments.
#[derive(Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    /// Create a permission store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn assigned(&self, node_id: i64) -> EngineResult<Option<PermissionSet>> {
        let letters: Option<String> =
            sqlx::query_scalar("SELECT letters FROM document_permission WHERE node_id = $1")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch assigned permissions")?;

        Ok(letters.map(|l| PermissionSet::from_letters(&l)))
    }

    async fn save_assigned(
        &self,
        node_id: i64,
        defaults: &PermissionSet,
        assigned: PermissionSet,
    ) -> EngineResult<()> {
        match normalize_assignment(defaults, assigned) {
            Some(set) => {
                sqlx::query(
                    r#"
                    INSERT INTO document_permission (node_id, letters)
                    VALUES ($1, $2)
                    ON CONFLICT (node_id) DO UPDATE SET letters = EXCLUDED.letters
                    "#,
                )
                .bind(node_id)
                .bind(set.letters())
                .execute(&self.pool)
                .await
                .context("failed to save assigned permissions")?;
            }
            None => {
                sqlx::query("DELETE FROM document_permission WHERE node_id = $1")
                    .bind(node_id)
                    .execute(&self.pool)
                    .await
                    .context("failed to clear no-op permission override")?;
            }
        }

        Ok(())
    }
}

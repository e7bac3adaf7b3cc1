//! Unified SQL PublicationStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety. Only SELECT
//! and INSERT statements are issued: the store is append-only.

use std::marker::PhantomData;

use super::SqlDatabase;

/// SQL-based implementation of PublicationStore.
pub struct SqlPublicationStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlPublicationStore<DB> {
    /// Create a new SQL publication store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// A transaction held open on one pooled connection.
pub struct SqlImportTx<DB: SqlDatabase> {
    conn: DB::Connection,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlImportTx<DB> {
    pub(super) fn new(conn: DB::Connection) -> Self {
        Self {
            conn,
            _marker: PhantomData,
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Macro to implement PublicationStore and ImportTx for a specific SQL backend.
macro_rules! impl_publication_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::PublicationStore for SqlPublicationStore<$db_type> {
            async fn init_schema(&self) -> crate::storage::Result<()> {
                let statements = crate::storage::schema::create_statements(
                    <$db_type as SqlDatabase>::ID_TYPE,
                    <$db_type as SqlDatabase>::INT_TYPE,
                );
                for stmt in statements {
                    sqlx::query(&stmt).execute(&self.pool).await?;
                }
                Ok(())
            }

            async fn begin(
                &self,
            ) -> crate::storage::Result<Box<dyn crate::storage::ImportTx>> {
                let mut conn = self.pool.acquire().await?;
                sqlx::query(<$db_type as SqlDatabase>::BEGIN)
                    .execute(&mut *conn)
                    .await?;
                Ok(Box::new(SqlImportTx::<$db_type>::new(conn)))
            }
        }

        #[cfg(feature = $feature)]
        impl SqlImportTx<$db_type> {
            async fn fetch_id(
                &mut self,
                stmt: sea_query::SelectStatement,
            ) -> crate::storage::Result<Option<crate::storage::RowId>> {
                use sqlx::Row;

                let sql = <$db_type as SqlDatabase>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&mut *self.conn).await?;
                match row {
                    Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
                    None => Ok(None),
                }
            }

            async fn insert_returning_id(
                &mut self,
                stmt: sea_query::InsertStatement,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sqlx::Row;

                let sql = <$db_type as SqlDatabase>::build_insert(stmt);
                let row = sqlx::query(&sql).fetch_one(&mut *self.conn).await?;
                Ok(row.try_get::<i64, _>(0)?)
            }

            /// Close the transaction with `statement`.
            ///
            /// If that fails the connection may still be inside the
            /// transaction, so it is closed instead of returned to the pool.
            async fn finish(self: Box<Self>, statement: &str) -> crate::storage::Result<()> {
                use sqlx::Connection;

                let SqlImportTx { mut conn, .. } = *self;
                if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
                    tracing::warn!(statement, error = %e, "Discarding pooled connection");
                    if let Err(close) = conn.detach().close().await {
                        tracing::debug!(error = %close, "Closing discarded connection failed");
                    }
                    return Err(e.into());
                }
                Ok(())
            }

            async fn insert_memberships(
                &mut self,
                stmt: sea_query::InsertStatement,
            ) -> crate::storage::Result<()> {
                let sql = <$db_type as SqlDatabase>::build_insert(stmt);
                sqlx::query(&sql).execute(&mut *self.conn).await?;
                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::ImportTx for SqlImportTx<$db_type> {
            async fn find_form(
                &mut self,
                path: &str,
            ) -> crate::storage::Result<Option<crate::storage::RowId>> {
                use sea_query::{Expr, Query};

                use crate::storage::schema::Form;

                let stmt = Query::select()
                    .column(Form::Id)
                    .from(Form::Table)
                    .and_where(Expr::col(Form::Path).eq(path))
                    .to_owned();

                self.fetch_id(stmt).await
            }

            async fn insert_form(
                &mut self,
                form: &crate::storage::NewForm,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::Form;

                let stmt = Query::insert()
                    .into_table(Form::Table)
                    .columns([
                        Form::Skjemanummer,
                        Form::Path,
                        Form::CreatedAt,
                        Form::CreatedBy,
                    ])
                    .values_panic([
                        form.skjemanummer.clone().into(),
                        form.path.clone().into(),
                        now().into(),
                        form.created_by.clone().into(),
                    ])
                    .returning_col(Form::Id)
                    .to_owned();

                self.insert_returning_id(stmt).await
            }

            async fn latest_form_revision(
                &mut self,
                form_id: crate::storage::RowId,
            ) -> crate::storage::Result<Option<crate::storage::FormRevisionRecord>> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::FormRevision;

                let stmt = Query::select()
                    .columns([
                        FormRevision::Id,
                        FormRevision::FormId,
                        FormRevision::Revision,
                        FormRevision::Title,
                        FormRevision::Components,
                        FormRevision::Properties,
                        FormRevision::CreatedBy,
                    ])
                    .from(FormRevision::Table)
                    .and_where(Expr::col(FormRevision::FormId).eq(form_id))
                    .order_by(FormRevision::Revision, Order::Desc)
                    .limit(1)
                    .to_owned();

                let sql = <$db_type as SqlDatabase>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&mut *self.conn).await?;

                match row {
                    Some(row) => Ok(Some(crate::storage::FormRevisionRecord {
                        id: row.try_get("id")?,
                        form_id: row.try_get("form_id")?,
                        revision: row.try_get("revision")?,
                        content: crate::storage::FormContent {
                            title: row.try_get("title")?,
                            components: row.try_get("components")?,
                            properties: row.try_get("properties")?,
                            created_by: row.try_get("created_by")?,
                        },
                    })),
                    None => Ok(None),
                }
            }

            async fn insert_form_revision(
                &mut self,
                form_id: crate::storage::RowId,
                revision: i64,
                content: &crate::storage::FormContent,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::FormRevision;

                let stmt = Query::insert()
                    .into_table(FormRevision::Table)
                    .columns([
                        FormRevision::FormId,
                        FormRevision::Revision,
                        FormRevision::Title,
                        FormRevision::Components,
                        FormRevision::Properties,
                        FormRevision::CreatedAt,
                        FormRevision::CreatedBy,
                    ])
                    .values_panic([
                        form_id.into(),
                        revision.into(),
                        content.title.clone().into(),
                        content.components.clone().into(),
                        content.properties.clone().into(),
                        now().into(),
                        content.created_by.clone().into(),
                    ])
                    .returning_col(FormRevision::Id)
                    .to_owned();

                self.insert_returning_id(stmt).await
            }

            async fn find_form_translation(
                &mut self,
                form_id: crate::storage::RowId,
                key: &str,
            ) -> crate::storage::Result<Option<crate::storage::RowId>> {
                use sea_query::{Expr, Order, Query};

                use crate::storage::schema::{FormTranslation, FormTranslationRevision};

                let stmt = Query::select()
                    .column((FormTranslationRevision::Table, FormTranslationRevision::Id))
                    .from(FormTranslation::Table)
                    .inner_join(
                        FormTranslationRevision::Table,
                        Expr::col((
                            FormTranslationRevision::Table,
                            FormTranslationRevision::FormTranslationId,
                        ))
                        .equals((FormTranslation::Table, FormTranslation::Id)),
                    )
                    .and_where(Expr::col((FormTranslation::Table, FormTranslation::FormId)).eq(form_id))
                    .and_where(Expr::col((FormTranslation::Table, FormTranslation::Key)).eq(key))
                    .order_by(
                        (FormTranslationRevision::Table, FormTranslationRevision::Revision),
                        Order::Desc,
                    )
                    .limit(1)
                    .to_owned();

                self.fetch_id(stmt).await
            }

            async fn insert_form_translation(
                &mut self,
                form_id: crate::storage::RowId,
                key: &str,
                values: &crate::storage::TranslationValues,
                created_by: &str,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::{FormTranslation, FormTranslationRevision};

                let created_at = now();

                let parent = Query::insert()
                    .into_table(FormTranslation::Table)
                    .columns([
                        FormTranslation::FormId,
                        FormTranslation::Key,
                        FormTranslation::CreatedAt,
                        FormTranslation::CreatedBy,
                    ])
                    .values_panic([
                        form_id.into(),
                        key.into(),
                        created_at.clone().into(),
                        created_by.into(),
                    ])
                    .returning_col(FormTranslation::Id)
                    .to_owned();
                let translation_id = self.insert_returning_id(parent).await?;

                let revision = Query::insert()
                    .into_table(FormTranslationRevision::Table)
                    .columns([
                        FormTranslationRevision::FormTranslationId,
                        FormTranslationRevision::Revision,
                        FormTranslationRevision::Nb,
                        FormTranslationRevision::Nn,
                        FormTranslationRevision::En,
                        FormTranslationRevision::CreatedAt,
                        FormTranslationRevision::CreatedBy,
                    ])
                    .values_panic([
                        translation_id.into(),
                        1_i64.into(),
                        values.nb.clone().into(),
                        values.nn.clone().into(),
                        values.en.clone().into(),
                        created_at.into(),
                        created_by.into(),
                    ])
                    .returning_col(FormTranslationRevision::Id)
                    .to_owned();

                self.insert_returning_id(revision).await
            }

            async fn find_global_translation(
                &mut self,
                key: &str,
            ) -> crate::storage::Result<Option<crate::storage::RowId>> {
                use sea_query::{Expr, Order, Query};

                use crate::storage::schema::{GlobalTranslation, GlobalTranslationRevision};

                let stmt = Query::select()
                    .column((GlobalTranslationRevision::Table, GlobalTranslationRevision::Id))
                    .from(GlobalTranslation::Table)
                    .inner_join(
                        GlobalTranslationRevision::Table,
                        Expr::col((
                            GlobalTranslationRevision::Table,
                            GlobalTranslationRevision::GlobalTranslationId,
                        ))
                        .equals((GlobalTranslation::Table, GlobalTranslation::Id)),
                    )
                    .and_where(Expr::col((GlobalTranslation::Table, GlobalTranslation::Key)).eq(key))
                    .order_by(
                        (GlobalTranslationRevision::Table, GlobalTranslationRevision::Revision),
                        Order::Desc,
                    )
                    .limit(1)
                    .to_owned();

                self.fetch_id(stmt).await
            }

            async fn insert_global_translation(
                &mut self,
                key: &str,
                tag: &str,
                values: &crate::storage::TranslationValues,
                created_by: &str,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::{GlobalTranslation, GlobalTranslationRevision};

                let created_at = now();

                let parent = Query::insert()
                    .into_table(GlobalTranslation::Table)
                    .columns([
                        GlobalTranslation::Key,
                        GlobalTranslation::Tag,
                        GlobalTranslation::CreatedAt,
                        GlobalTranslation::CreatedBy,
                    ])
                    .values_panic([
                        key.into(),
                        tag.into(),
                        created_at.clone().into(),
                        created_by.into(),
                    ])
                    .returning_col(GlobalTranslation::Id)
                    .to_owned();
                let translation_id = self.insert_returning_id(parent).await?;

                let revision = Query::insert()
                    .into_table(GlobalTranslationRevision::Table)
                    .columns([
                        GlobalTranslationRevision::GlobalTranslationId,
                        GlobalTranslationRevision::Revision,
                        GlobalTranslationRevision::Nb,
                        GlobalTranslationRevision::Nn,
                        GlobalTranslationRevision::En,
                        GlobalTranslationRevision::CreatedAt,
                        GlobalTranslationRevision::CreatedBy,
                    ])
                    .values_panic([
                        translation_id.into(),
                        1_i64.into(),
                        values.nb.clone().into(),
                        values.nn.clone().into(),
                        values.en.clone().into(),
                        created_at.into(),
                        created_by.into(),
                    ])
                    .returning_col(GlobalTranslationRevision::Id)
                    .to_owned();

                self.insert_returning_id(revision).await
            }

            async fn latest_global_snapshot(
                &mut self,
            ) -> crate::storage::Result<Option<crate::storage::RowId>> {
                use sea_query::{Order, Query};

                use crate::storage::schema::PublishedGlobalTranslation;

                let stmt = Query::select()
                    .column(PublishedGlobalTranslation::Id)
                    .from(PublishedGlobalTranslation::Table)
                    .order_by(PublishedGlobalTranslation::Id, Order::Desc)
                    .limit(1)
                    .to_owned();

                self.fetch_id(stmt).await
            }

            async fn insert_global_snapshot(
                &mut self,
                revision_ids: &[crate::storage::RowId],
                created_by: &str,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::{
                    PublishedGlobalTranslation, PublishedGlobalTranslationRevision,
                };

                let parent = Query::insert()
                    .into_table(PublishedGlobalTranslation::Table)
                    .columns([
                        PublishedGlobalTranslation::CreatedAt,
                        PublishedGlobalTranslation::CreatedBy,
                    ])
                    .values_panic([now().into(), created_by.into()])
                    .returning_col(PublishedGlobalTranslation::Id)
                    .to_owned();
                let snapshot_id = self.insert_returning_id(parent).await?;

                if !revision_ids.is_empty() {
                    let mut members = Query::insert();
                    members.into_table(PublishedGlobalTranslationRevision::Table).columns([
                        PublishedGlobalTranslationRevision::PublishedGlobalTranslationId,
                        PublishedGlobalTranslationRevision::GlobalTranslationRevisionId,
                    ]);
                    for revision_id in revision_ids {
                        members.values_panic([snapshot_id.into(), (*revision_id).into()]);
                    }
                    self.insert_memberships(members).await?;
                }

                Ok(snapshot_id)
            }

            async fn latest_form_snapshot(
                &mut self,
                form_id: crate::storage::RowId,
            ) -> crate::storage::Result<Option<crate::storage::FormSnapshotRecord>> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::{
                    PublishedFormTranslation, PublishedFormTranslationRevision,
                };

                let stmt = Query::select()
                    .columns([PublishedFormTranslation::Id, PublishedFormTranslation::PublishedAt])
                    .from(PublishedFormTranslation::Table)
                    .and_where(Expr::col(PublishedFormTranslation::FormId).eq(form_id))
                    .order_by(PublishedFormTranslation::Id, Order::Desc)
                    .limit(1)
                    .to_owned();

                let sql = <$db_type as SqlDatabase>::build_select(stmt);
                let Some(row) = sqlx::query(&sql).fetch_optional(&mut *self.conn).await? else {
                    return Ok(None);
                };
                let id: i64 = row.try_get("id")?;
                let published_at: Option<String> = row.try_get("published_at")?;

                let members = Query::select()
                    .column(PublishedFormTranslationRevision::FormTranslationRevisionId)
                    .from(PublishedFormTranslationRevision::Table)
                    .and_where(
                        Expr::col(PublishedFormTranslationRevision::PublishedFormTranslationId)
                            .eq(id),
                    )
                    .order_by(
                        PublishedFormTranslationRevision::FormTranslationRevisionId,
                        Order::Asc,
                    )
                    .to_owned();

                let sql = <$db_type as SqlDatabase>::build_select(members);
                let rows = sqlx::query(&sql).fetch_all(&mut *self.conn).await?;
                let revision_ids = rows
                    .iter()
                    .map(|r| r.try_get::<i64, _>(0))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Some(crate::storage::FormSnapshotRecord {
                    id,
                    published_at,
                    revision_ids,
                }))
            }

            async fn insert_form_snapshot(
                &mut self,
                form_id: crate::storage::RowId,
                revision_ids: &[crate::storage::RowId],
                published_at: Option<&str>,
                created_by: &str,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::{
                    PublishedFormTranslation, PublishedFormTranslationRevision,
                };

                let parent = Query::insert()
                    .into_table(PublishedFormTranslation::Table)
                    .columns([
                        PublishedFormTranslation::FormId,
                        PublishedFormTranslation::PublishedAt,
                        PublishedFormTranslation::CreatedAt,
                        PublishedFormTranslation::CreatedBy,
                    ])
                    .values_panic([
                        form_id.into(),
                        published_at.map(str::to_string).into(),
                        now().into(),
                        created_by.into(),
                    ])
                    .returning_col(PublishedFormTranslation::Id)
                    .to_owned();
                let snapshot_id = self.insert_returning_id(parent).await?;

                if !revision_ids.is_empty() {
                    let mut members = Query::insert();
                    members.into_table(PublishedFormTranslationRevision::Table).columns([
                        PublishedFormTranslationRevision::PublishedFormTranslationId,
                        PublishedFormTranslationRevision::FormTranslationRevisionId,
                    ]);
                    for revision_id in revision_ids {
                        members.values_panic([snapshot_id.into(), (*revision_id).into()]);
                    }
                    self.insert_memberships(members).await?;
                }

                Ok(snapshot_id)
            }

            async fn latest_publication(
                &mut self,
                form_id: crate::storage::RowId,
            ) -> crate::storage::Result<Option<crate::storage::PublicationRecord>> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::{FormPublication, FormRevision};

                let stmt = Query::select()
                    .columns([
                        (FormPublication::Table, FormPublication::Id),
                        (FormPublication::Table, FormPublication::FormRevisionId),
                        (FormPublication::Table, FormPublication::PublishedFormTranslationId),
                        (FormPublication::Table, FormPublication::PublishedGlobalTranslationId),
                        (FormPublication::Table, FormPublication::Languages),
                    ])
                    .from(FormPublication::Table)
                    .inner_join(
                        FormRevision::Table,
                        Expr::col((FormRevision::Table, FormRevision::Id))
                            .equals((FormPublication::Table, FormPublication::FormRevisionId)),
                    )
                    .and_where(Expr::col((FormRevision::Table, FormRevision::FormId)).eq(form_id))
                    .order_by((FormPublication::Table, FormPublication::Id), Order::Desc)
                    .limit(1)
                    .to_owned();

                let sql = <$db_type as SqlDatabase>::build_select(stmt);
                let Some(row) = sqlx::query(&sql).fetch_optional(&mut *self.conn).await? else {
                    return Ok(None);
                };

                let languages: String = row.try_get("languages")?;
                Ok(Some(crate::storage::PublicationRecord {
                    id: row.try_get("id")?,
                    form_revision_id: row.try_get("form_revision_id")?,
                    form_snapshot_id: row.try_get("published_form_translation_id")?,
                    global_snapshot_id: row.try_get("published_global_translation_id")?,
                    languages: serde_json::from_str(&languages)?,
                }))
            }

            async fn insert_publication(
                &mut self,
                publication: &crate::storage::NewPublication,
            ) -> crate::storage::Result<crate::storage::RowId> {
                use sea_query::Query;

                use crate::storage::schema::FormPublication;

                let languages = serde_json::to_string(&publication.languages)?;

                let stmt = Query::insert()
                    .into_table(FormPublication::Table)
                    .columns([
                        FormPublication::FormRevisionId,
                        FormPublication::PublishedFormTranslationId,
                        FormPublication::PublishedGlobalTranslationId,
                        FormPublication::Languages,
                        FormPublication::PublishedAt,
                        FormPublication::CreatedAt,
                        FormPublication::CreatedBy,
                    ])
                    .values_panic([
                        publication.form_revision_id.into(),
                        publication.form_snapshot_id.into(),
                        publication.global_snapshot_id.into(),
                        languages.into(),
                        publication.published_at.clone().into(),
                        now().into(),
                        publication.created_by.clone().into(),
                    ])
                    .returning_col(FormPublication::Id)
                    .to_owned();

                self.insert_returning_id(stmt).await
            }

            async fn commit(self: Box<Self>) -> crate::storage::Result<()> {
                self.finish("COMMIT").await
            }

            async fn rollback(self: Box<Self>) -> crate::storage::Result<()> {
                self.finish("ROLLBACK").await
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_publication_store!(super::postgres::Postgres, "postgres");
impl_publication_store!(super::sqlite::Sqlite, "sqlite");

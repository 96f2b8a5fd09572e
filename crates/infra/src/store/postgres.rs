//! Postgres-backed store.
//!
//! ## Atomicity
//!
//! | Operation | Mechanism |
//! |-----------|-----------|
//! | `open_reception` | `INSERT ... ON CONFLICT DO NOTHING` against the partial unique index `reception_one_open_per_pickup_point` |
//! | `close_open_reception` | single conditional `UPDATE ... RETURNING` |
//! | `append_product` | transaction: `FOR SHARE` on the open reception, then `INSERT` |
//! | `remove_last_product` | transaction: `FOR UPDATE` on the open reception, select newest product, `DELETE`, commit |
//!
//! `FOR SHARE` conflicts with the row lock taken by the closing `UPDATE`, so a
//! product can never land in a reception that was closed after the lookup.
//! `FOR UPDATE` in the remove path serializes it against concurrent appends.
//!
//! ## Error Mapping
//!
//! | PostgreSQL condition | StoreError |
//! |----------------------|------------|
//! | conflict on the open-reception index | `Rejected(ActiveReceptionExists)` |
//! | foreign key violation (`23503`) on reception insert | `MissingPickupPoint` |
//! | unknown status / product type literal | `Decode` |
//! | anything else | `Database { operation, source }` |
//!
//! Dropping any future mid-flight drops its `Transaction`, which rolls back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use tracing::{instrument, Span};
use uuid::Uuid;

use pvz_core::{DomainError, PickupPointId, ProductId, ReceptionId};
use pvz_receiving::{
    ListingParams, ListingRow, NewPickupPoint, NewProduct, NewReception, PickupPoint, Product,
    ProductType, Reception, ReceptionStatus,
};

use super::{ListingSource, PickupPointStore, ProductStore, ReceptionStore};
use crate::error::StoreError;

const OPEN_RECEPTION_INDEX: &str = "reception_one_open_per_pickup_point";

/// Postgres-backed store for all three tables.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store holds no
/// other state, so any number of request tasks may share one instance.
#[derive(Debug, Clone)]
pub struct PostgresPvzStore {
    pool: Arc<PgPool>,
}

impl PostgresPvzStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PickupPointStore for PostgresPvzStore {
    #[instrument(skip(self, new), fields(pickup_point_id = %new.id, city = %new.city), err)]
    async fn insert_pickup_point(&self, new: NewPickupPoint) -> Result<PickupPoint, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO pickup_point (id, city)
            VALUES ($1, $2)
            RETURNING id, city, registration_date
            "#,
        )
        .bind(new.id.as_uuid())
        .bind(&new.city)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| StoreError::database("insert_pickup_point", e))?;

        let row = PickupPointRow::from_row(&row).map_err(decode_error)?;
        Ok(row.into())
    }
}

#[async_trait]
impl ReceptionStore for PostgresPvzStore {
    #[instrument(
        skip(self, new),
        fields(pickup_point_id = %new.pickup_point_id, reception_id = %new.id),
        err
    )]
    async fn open_reception(&self, new: NewReception) -> Result<Reception, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO reception (id, pickup_point_id, status)
            VALUES ($1, $2, 'in_progress')
            ON CONFLICT (pickup_point_id) WHERE status = 'in_progress' DO NOTHING
            RETURNING id, pickup_point_id, reception_date, status
            "#,
        )
        .bind(new.id.as_uuid())
        .bind(new.pickup_point_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::MissingPickupPoint(new.pickup_point_id)
            } else if is_open_reception_conflict(&e) {
                DomainError::ActiveReceptionExists.into()
            } else {
                StoreError::database("open_reception", e)
            }
        })?;

        match row {
            Some(row) => ReceptionRow::from_row(&row).map_err(decode_error)?.try_into(),
            None => Err(DomainError::ActiveReceptionExists.into()),
        }
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    async fn close_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE reception
            SET status = 'close'
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            RETURNING id, pickup_point_id, reception_date, status
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| StoreError::database("close_open_reception", e))?;

        match row {
            Some(row) => ReceptionRow::from_row(&row).map_err(decode_error)?.try_into(),
            None => Err(DomainError::NoOpenReception.into()),
        }
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    async fn find_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, pickup_point_id, reception_date, status
            FROM reception
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| StoreError::database("find_open_reception", e))?;

        match row {
            Some(row) => Ok(Some(ReceptionRow::from_row(&row).map_err(decode_error)?.try_into()?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProductStore for PostgresPvzStore {
    #[instrument(
        skip(self, new),
        fields(
            pickup_point_id = %new.pickup_point_id,
            product_type = %new.product_type,
            reception_id = tracing::field::Empty
        ),
        err
    )]
    async fn append_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database("begin_transaction", e))?;

        let reception_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM reception
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            FOR SHARE
            "#,
        )
        .bind(new.pickup_point_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::database("lock_open_reception", e))?;

        let Some(reception_id) = reception_id else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::database("rollback", e))?;
            return Err(DomainError::NoOpenReception.into());
        };

        let row = sqlx::query(
            r#"
            INSERT INTO product (id, reception_id, product_type)
            VALUES ($1, $2, $3)
            RETURNING id, reception_id, product_type, added_at
            "#,
        )
        .bind(new.id.as_uuid())
        .bind(reception_id)
        .bind(new.product_type.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::database("insert_product", e))?;

        let product: Product = ProductRow::from_row(&row).map_err(decode_error)?.try_into()?;

        tx.commit()
            .await
            .map_err(|e| StoreError::database("commit_transaction", e))?;

        Span::current().record("reception_id", tracing::field::display(product.reception_id));
        Ok(product)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Product, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database("begin_transaction", e))?;

        let reception_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM reception
            WHERE pickup_point_id = $1 AND status = 'in_progress'
            FOR UPDATE
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::database("lock_open_reception", e))?;

        let Some(reception_id) = reception_id else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::database("rollback", e))?;
            return Err(DomainError::NoOpenReception.into());
        };

        let row = sqlx::query(
            r#"
            SELECT id, reception_id, product_type, added_at
            FROM product
            WHERE reception_id = $1
            ORDER BY added_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(reception_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::database("select_last_product", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::database("rollback", e))?;
            return Err(DomainError::NoProductsToRemove.into());
        };
        let product: Product = ProductRow::from_row(&row).map_err(decode_error)?.try_into()?;

        sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(product.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::database("delete_product", e))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::database("commit_transaction", e))?;

        Ok(product)
    }
}

#[async_trait]
impl ListingSource for PostgresPvzStore {
    #[instrument(
        skip(self, params),
        fields(page = params.page, limit = params.limit, row_count = tracing::field::Empty),
        err
    )]
    async fn fetch_listing_rows(&self, params: &ListingParams) -> Result<Vec<ListingRow>, StoreError> {
        // The page is cut over pickup points first, then expanded into rows;
        // a LIMIT on the joined rows would split pickup points across pages.
        let rows = sqlx::query(
            r#"
            WITH page AS (
                SELECT pp.id, pp.city, pp.registration_date
                FROM pickup_point pp
                WHERE EXISTS (
                    SELECT 1
                    FROM reception r
                    JOIN product p ON p.reception_id = r.id
                    WHERE r.pickup_point_id = pp.id
                      AND ($1::timestamptz IS NULL OR r.reception_date >= $1)
                      AND ($2::timestamptz IS NULL OR r.reception_date <= $2)
                )
                ORDER BY pp.registration_date DESC, pp.id DESC
                LIMIT $3 OFFSET $4
            )
            SELECT
                page.id AS pickup_point_id,
                page.city,
                page.registration_date,
                r.id AS reception_id,
                r.reception_date,
                r.status,
                p.id AS product_id,
                p.product_type,
                p.added_at
            FROM page
            JOIN reception r ON r.pickup_point_id = page.id
            JOIN product p ON p.reception_id = r.id
            WHERE ($1::timestamptz IS NULL OR r.reception_date >= $1)
              AND ($2::timestamptz IS NULL OR r.reception_date <= $2)
            ORDER BY
                page.registration_date DESC,
                page.id DESC,
                r.reception_date ASC,
                r.id ASC,
                p.added_at ASC,
                p.seq ASC
            "#,
        )
        .bind(params.start)
        .bind(params.end)
        .bind(i64::from(params.limit))
        .bind(i64::try_from(params.offset()).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StoreError::database("fetch_listing_rows", e))?;

        let mut listing_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let row = JoinedRow::from_row(&row).map_err(decode_error)?;
            listing_rows.push(row.try_into()?);
        }

        Span::current().record("row_count", listing_rows.len());
        Ok(listing_rows)
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23503";
        }
    }
    false
}

/// A unique violation on the open-reception index. `ON CONFLICT` absorbs the
/// usual case; this covers the constraint firing anyway.
fn is_open_reception_conflict(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().is_some_and(|code| code.as_ref() == "23505")
            && db_err.constraint() == Some(OPEN_RECEPTION_INDEX);
    }
    false
}

fn parse_status(value: &str) -> Result<ReceptionStatus, StoreError> {
    ReceptionStatus::parse(value)
        .ok_or_else(|| StoreError::Decode(format!("unknown reception status '{value}'")))
}

fn parse_product_type(value: &str) -> Result<ProductType, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Decode(format!("unknown product type '{value}'")))
}

// SQLx row types

#[derive(Debug)]
struct PickupPointRow {
    id: Uuid,
    city: String,
    registration_date: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PickupPointRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PickupPointRow {
            id: row.try_get("id")?,
            city: row.try_get("city")?,
            registration_date: row.try_get("registration_date")?,
        })
    }
}

impl From<PickupPointRow> for PickupPoint {
    fn from(row: PickupPointRow) -> Self {
        PickupPoint {
            id: PickupPointId::from_uuid(row.id),
            city: row.city,
            registered_at: row.registration_date,
        }
    }
}

#[derive(Debug)]
struct ReceptionRow {
    id: Uuid,
    pickup_point_id: Uuid,
    reception_date: DateTime<Utc>,
    status: String,
}

impl<'r> FromRow<'r, PgRow> for ReceptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReceptionRow {
            id: row.try_get("id")?,
            pickup_point_id: row.try_get("pickup_point_id")?,
            reception_date: row.try_get("reception_date")?,
            status: row.try_get("status")?,
        })
    }
}

impl TryFrom<ReceptionRow> for Reception {
    type Error = StoreError;

    fn try_from(row: ReceptionRow) -> Result<Self, Self::Error> {
        Ok(Reception {
            id: ReceptionId::from_uuid(row.id),
            pickup_point_id: PickupPointId::from_uuid(row.pickup_point_id),
            opened_at: row.reception_date,
            status: parse_status(&row.status)?,
        })
    }
}

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    reception_id: Uuid,
    product_type: String,
    added_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            reception_id: row.try_get("reception_id")?,
            product_type: row.try_get("product_type")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            reception_id: ReceptionId::from_uuid(row.reception_id),
            product_type: parse_product_type(&row.product_type)?,
            added_at: row.added_at,
        })
    }
}

/// One row of the listing join.
#[derive(Debug)]
struct JoinedRow {
    pickup_point: PickupPointRow,
    reception_id: Uuid,
    reception_date: DateTime<Utc>,
    status: String,
    product_id: Uuid,
    product_type: String,
    added_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for JoinedRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JoinedRow {
            pickup_point: PickupPointRow {
                id: row.try_get("pickup_point_id")?,
                city: row.try_get("city")?,
                registration_date: row.try_get("registration_date")?,
            },
            reception_id: row.try_get("reception_id")?,
            reception_date: row.try_get("reception_date")?,
            status: row.try_get("status")?,
            product_id: row.try_get("product_id")?,
            product_type: row.try_get("product_type")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

impl TryFrom<JoinedRow> for ListingRow {
    type Error = StoreError;

    fn try_from(row: JoinedRow) -> Result<Self, Self::Error> {
        let pickup_point: PickupPoint = row.pickup_point.into();
        let reception = Reception {
            id: ReceptionId::from_uuid(row.reception_id),
            pickup_point_id: pickup_point.id,
            opened_at: row.reception_date,
            status: parse_status(&row.status)?,
        };
        let product = Product {
            id: ProductId::from_uuid(row.product_id),
            reception_id: reception.id,
            product_type: parse_product_type(&row.product_type)?,
            added_at: row.added_at,
        };
        Ok(ListingRow {
            pickup_point,
            reception,
            product,
        })
    }
}

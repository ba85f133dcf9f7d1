use apiserver_common::types::{Worker, WorkerPayload};
use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

use crate::entities::worker::{self, Column, Entity};
use crate::error::{Result, StorageError, TransactionFailure};
use crate::store::WorkerStore;

const ENTITY: &str = "worker";

fn not_found(username: &str) -> StorageError {
    StorageError::NotFound {
        entity: ENTITY,
        id: username.to_owned(),
    }
}

fn conflict(username: &str) -> StorageError {
    StorageError::Conflict {
        entity: ENTITY,
        id: username.to_owned(),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Rolls back `txn` after `source` aborted it, keeping the rollback error if
/// there is one.
async fn abort(txn: DatabaseTransaction, operation: &'static str, source: DbErr) -> TransactionFailure {
    let rollback = txn.rollback().await.err();
    if let Some(e) = &rollback {
        tracing::error!(operation, error = %e, "Rollback failed");
    }
    TransactionFailure {
        operation,
        source,
        rollback,
    }
}

async fn commit(txn: DatabaseTransaction, operation: &'static str) -> Result<()> {
    txn.commit().await.map_err(|source| {
        StorageError::from(TransactionFailure {
            operation,
            source,
            rollback: None,
        })
    })
}

fn new_active_model(payload: &WorkerPayload, now: DateTime<FixedOffset>) -> worker::ActiveModel {
    worker::ActiveModel {
        username: Set(payload.username.clone()),
        first_name: Set(payload.first_name.clone()),
        last_name: Set(payload.last_name.clone()),
        city: Set(payload.city.clone()),
        division: Set(payload.division.clone()),
        position: Set(payload.position.clone()),
        salary: Set(payload.salary),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        version: Set(1),
    }
}

impl WorkerStore {
    fn to_worker(&self, m: worker::Model) -> Worker {
        Worker {
            username: m.username,
            first_name: m.first_name,
            last_name: m.last_name,
            city: m.city,
            division: m.division,
            position: m.position,
            salary: m.salary,
            created_at: self.localize(m.created_at),
            updated_at: self.localize(m.updated_at),
            deleted_at: m.deleted_at.map(|ts| self.localize(ts)),
            version: m.version,
        }
    }

    /// Returns every live worker, oldest first.
    pub async fn list_workers(&self) -> Result<Vec<Worker>> {
        let models = Entity::find()
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Username)
            .all(self.db())
            .await?;
        Ok(models.into_iter().map(|m| self.to_worker(m)).collect())
    }

    pub async fn get_worker(&self, username: &str) -> Result<Worker> {
        Entity::find_by_id(username.to_owned())
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?
            .map(|m| self.to_worker(m))
            .ok_or_else(|| not_found(username))
    }

    /// Looks a worker up including soft-deleted rows.
    pub async fn find_worker_unscoped(&self, username: &str) -> Result<Option<Worker>> {
        let model = Entity::find_by_id(username.to_owned())
            .one(self.db())
            .await?;
        Ok(model.map(|m| self.to_worker(m)))
    }

    /// Inserts a new worker.
    ///
    /// Fails with [`StorageError::Conflict`] when the username belongs to a
    /// live worker or to one that was deleted earlier.
    pub async fn create_worker(&self, payload: &WorkerPayload) -> Result<Worker> {
        if payload.username_is_blank() {
            return Err(StorageError::BlankUsername);
        }

        if let Some(existing) = self.find_worker_unscoped(&payload.username).await? {
            tracing::debug!(
                username = %payload.username,
                deleted = existing.is_deleted(),
                "Username already taken"
            );
            return Err(conflict(&payload.username));
        }

        let operation = "insert worker";
        let txn = self.db().begin().await?;
        let inserted = new_active_model(payload, self.now()).insert(&txn).await;
        let model = match inserted {
            Ok(model) => model,
            Err(e) => {
                let failure = abort(txn, operation, e).await;
                // Lost a race with a concurrent insert of the same key.
                if failure.rollback.is_none() && is_unique_violation(&failure.source) {
                    return Err(conflict(&payload.username));
                }
                return Err(failure.into());
            }
        };
        commit(txn, operation).await?;

        tracing::info!(username = %model.username, "Worker created");
        Ok(self.to_worker(model))
    }

    /// Overwrites the mutable profile fields of a live worker.
    ///
    /// Only first name, last name, city, division and salary change; the
    /// submitted `position` is ignored and the username must match `username`.
    pub async fn update_worker(&self, username: &str, payload: &WorkerPayload) -> Result<Worker> {
        let current = self.get_worker(username).await?;
        if payload.username != current.username {
            return Err(StorageError::UsernameChanged {
                key: current.username,
                submitted: payload.username.clone(),
            });
        }

        let operation = "update worker";
        let txn = self.db().begin().await?;
        let updated = Entity::update_many()
            .col_expr(Column::FirstName, Expr::value(payload.first_name.clone()))
            .col_expr(Column::LastName, Expr::value(payload.last_name.clone()))
            .col_expr(Column::City, Expr::value(payload.city.clone()))
            .col_expr(Column::Division, Expr::value(payload.division.clone()))
            .col_expr(Column::Salary, Expr::value(payload.salary))
            .col_expr(Column::UpdatedAt, Expr::value(self.now()))
            .col_expr(Column::Version, Expr::col(Column::Version).add(1))
            .filter(Column::Username.eq(username))
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await;
        let updated = match updated {
            Ok(res) => res,
            Err(e) => return Err(abort(txn, operation, e).await.into()),
        };

        if updated.rows_affected == 0 {
            // Deleted between the lookup and the update.
            if let Err(e) = txn.rollback().await {
                tracing::warn!(username, error = %e, "Rollback of empty update failed");
            }
            return Err(not_found(username));
        }

        let reloaded = Entity::find_by_id(username.to_owned()).one(&txn).await;
        let model = match reloaded {
            Ok(Some(model)) => model,
            Ok(None) => {
                let source = DbErr::RecordNotFound(format!("worker '{username}' after update"));
                return Err(abort(txn, operation, source).await.into());
            }
            Err(e) => return Err(abort(txn, operation, e).await.into()),
        };
        commit(txn, operation).await?;

        tracing::info!(username, version = model.version, "Worker updated");
        Ok(self.to_worker(model))
    }

    /// Soft-deletes a live worker. The row stays in the table so the
    /// username can never be reused.
    pub async fn delete_worker(&self, username: &str) -> Result<()> {
        self.get_worker(username).await?;

        let operation = "delete worker";
        let txn = self.db().begin().await?;
        let deleted = Entity::update_many()
            .col_expr(Column::DeletedAt, Expr::value(Some(self.now())))
            .filter(Column::Username.eq(username))
            .filter(Column::DeletedAt.is_null())
            .exec(&txn)
            .await;
        let deleted = match deleted {
            Ok(res) => res,
            Err(e) => return Err(abort(txn, operation, e).await.into()),
        };

        if deleted.rows_affected == 0 {
            if let Err(e) = txn.rollback().await {
                tracing::warn!(username, error = %e, "Rollback of empty delete failed");
            }
            return Err(not_found(username));
        }
        commit(txn, operation).await?;

        tracing::info!(username, "Worker soft-deleted");
        Ok(())
    }

    /// Inserts every seed record whose username is not present yet (live or
    /// deleted) in one transaction. Returns how many rows were inserted.
    pub async fn seed_workers(&self, seeds: &[WorkerPayload]) -> Result<usize> {
        let operation = "seed workers";
        let now = self.now();
        let txn = self.db().begin().await?;
        let mut inserted = 0;

        for seed in seeds {
            let existing = Entity::find_by_id(seed.username.clone()).one(&txn).await;
            match existing {
                Ok(Some(_)) => {
                    tracing::debug!(username = %seed.username, "Seed worker already exists, skipping");
                    continue;
                }
                Ok(None) => {}
                Err(e) => return Err(abort(txn, operation, e).await.into()),
            }

            let inserted_row = new_active_model(seed, now).insert(&txn).await;
            if let Err(e) = inserted_row {
                return Err(abort(txn, operation, e).await.into());
            }
            inserted += 1;
        }

        commit(txn, operation).await?;
        Ok(inserted)
    }
}

//! PostgreSQL wallet store.
//!
//! Every mutating operation runs inside one sqlx transaction and takes
//! exclusive `FOR UPDATE` locks on the affected `wallet_accounts` rows
//! before reading the cached balance. Operations touching two accounts lock
//! both rows with a single `ORDER BY account_number ... FOR UPDATE` select,
//! so every session acquires them in the same global order. Locks span only
//! the read -> compute -> write section; no network I/O happens inside.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{error, warn};

use async_trait::async_trait;

use super::{NewEntry, WalletStore};
use crate::account::{AccountType, NewAccount, OwnerRef, RecordMeta, WalletAccount};
use crate::error::{WalletError, map_unique_violation};
use crate::escrow::{self, Escrow};
use crate::ledger::{Direction, EntryFilter, EntryStatus, LedgerEntry};
use crate::money::{Amount, Balance};
use crate::transfer::{Transfer, TransferStatus};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(msg: &'static str) -> WalletError {
        WalletError::Database(sqlx::Error::Decode(msg.into()))
    }

    fn map_account(row: &PgRow) -> Result<WalletAccount, WalletError> {
        let account_type = AccountType::from_id(row.get::<i16, _>("account_type"))
            .ok_or_else(|| Self::decode("invalid account_type id"))?;
        Ok(WalletAccount {
            owner: OwnerRef::new(row.get("tenant_id"), row.get("user_id")),
            account_number: row.get("account_number"),
            account_type,
            currency: row.get("currency"),
            balance: Balance::new(row.get::<Decimal, _>("balance"))?,
            payout_account: row.get("payout_account"),
            meta: RecordMeta {
                created_by: row.get("created_by"),
                is_active: row.get("is_active"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            },
        })
    }

    fn map_entry(row: &PgRow) -> Result<LedgerEntry, WalletError> {
        let direction = Direction::from_id(row.get::<i16, _>("direction"))
            .ok_or_else(|| Self::decode("invalid direction id"))?;
        let status = EntryStatus::from_id(row.get::<i16, _>("status"))
            .ok_or_else(|| Self::decode("invalid entry status id"))?;
        Ok(LedgerEntry::from_parts(
            row.get("reference"),
            OwnerRef::new(row.get("tenant_id"), row.get("user_id")),
            direction,
            Amount::new(row.get::<Decimal, _>("amount"))?,
            Balance::new(row.get::<Decimal, _>("balance_before"))?,
            Balance::new(row.get::<Decimal, _>("balance_after"))?,
            row.get("narration"),
            status,
            row.get("external_reference"),
            row.get("created_at"),
        ))
    }

    fn map_transfer(row: &PgRow) -> Result<Transfer, WalletError> {
        let status = TransferStatus::from_id(row.get::<i16, _>("status"))
            .ok_or_else(|| Self::decode("invalid transfer status id"))?;
        let tenant_id: i64 = row.get("tenant_id");
        Ok(Transfer {
            reference: row.get("reference"),
            source: OwnerRef::new(tenant_id, row.get("source_user_id")),
            destination: OwnerRef::new(tenant_id, row.get("dest_user_id")),
            amount: Amount::new(row.get::<Decimal, _>("amount"))?,
            narration: row.get("narration"),
            status,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_escrow(row: &PgRow) -> Result<Escrow, WalletError> {
        let tenant_id: i64 = row.get("tenant_id");
        Ok(Escrow {
            order_reference: row.get("order_reference"),
            sender: OwnerRef::new(tenant_id, row.get("sender_user_id")),
            receiver: OwnerRef::new(tenant_id, row.get("receiver_user_id")),
            amount: Amount::new(row.get::<Decimal, _>("amount"))?,
            is_released: row.get("is_released"),
            released_at: row.get("released_at"),
            created_at: row.get("created_at"),
        })
    }

    /// Lock one account row and return (balance, is_active).
    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        owner: OwnerRef,
    ) -> Result<(Balance, bool), WalletError> {
        let row = sqlx::query(
            r#"SELECT balance, is_active FROM wallet_accounts
               WHERE tenant_id = $1 AND user_id = $2
               FOR UPDATE"#,
        )
        .bind(owner.tenant_id)
        .bind(owner.user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(WalletError::AccountNotFound)?;

        Ok((
            Balance::new(row.get::<Decimal, _>("balance"))?,
            row.get("is_active"),
        ))
    }

    /// Insert one committed entry and write the new cached balance inside an
    /// open transaction.
    async fn write_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewEntry,
        before: Balance,
        after: Balance,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, WalletError> {
        sqlx::query(
            r#"INSERT INTO ledger_entries
               (reference, tenant_id, user_id, direction, amount,
                balance_before, balance_after, narration, status,
                external_reference, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&entry.reference)
        .bind(entry.owner.tenant_id)
        .bind(entry.owner.user_id)
        .bind(entry.direction.id())
        .bind(entry.amount.as_decimal())
        .bind(before.as_decimal())
        .bind(after.as_decimal())
        .bind(&entry.narration)
        .bind(EntryStatus::Success.id())
        .bind(&entry.external_reference)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, WalletError::DuplicateReference(entry.reference.clone()))
        })?;

        sqlx::query(
            r#"UPDATE wallet_accounts SET balance = $1, updated_at = $2
               WHERE tenant_id = $3 AND user_id = $4"#,
        )
        .bind(after.as_decimal())
        .bind(now)
        .bind(entry.owner.tenant_id)
        .bind(entry.owner.user_id)
        .execute(&mut **tx)
        .await?;

        Ok(LedgerEntry::committed(
            entry.reference.clone(),
            entry.owner,
            entry.direction,
            entry.amount,
            before,
            after,
            entry.narration.clone(),
            entry.external_reference.clone(),
            now,
        ))
    }

    async fn mark_transfer(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
        status: TransferStatus,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        sqlx::query(r#"UPDATE transfers SET status = $1, updated_at = $2 WHERE reference = $3"#)
            .bind(status.id())
            .bind(now)
            .bind(reference)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WalletStore for PgStore {
    async fn create_account(&self, new: NewAccount) -> Result<WalletAccount, WalletError> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO wallet_accounts
               (tenant_id, user_id, account_number, account_type, currency,
                balance, created_by, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, 0, $6, TRUE, $7, $7)"#,
        )
        .bind(new.owner.tenant_id)
        .bind(new.owner.user_id)
        .bind(&new.account_number)
        .bind(new.account_type.id())
        .bind(&new.currency)
        .bind(new.created_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Two distinct uniqueness constraints: the owner key and the
            // account number. Only the latter is retriable by the caller.
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.code().as_deref() == Some("23505") {
                    return match db_err.constraint() {
                        Some("wallet_accounts_number_key") => {
                            WalletError::DuplicateReference(new.account_number.clone())
                        }
                        _ => WalletError::DuplicateOwner,
                    };
                }
            }
            WalletError::Database(e)
        })?;

        Ok(WalletAccount {
            owner: new.owner,
            account_number: new.account_number,
            account_type: new.account_type,
            currency: new.currency,
            balance: Balance::zero(),
            payout_account: None,
            meta: RecordMeta::new(new.created_by, now),
        })
    }

    async fn get_account(&self, owner: OwnerRef) -> Result<WalletAccount, WalletError> {
        let row = sqlx::query(
            r#"SELECT tenant_id, user_id, account_number, account_type, currency,
                      balance, payout_account, created_by, is_active, created_at, updated_at
               FROM wallet_accounts
               WHERE tenant_id = $1 AND user_id = $2 AND is_active = TRUE"#,
        )
        .bind(owner.tenant_id)
        .bind(owner.user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WalletError::AccountNotFound)?;

        Self::map_account(&row)
    }

    async fn deactivate_account(&self, owner: OwnerRef) -> Result<(), WalletError> {
        let result = sqlx::query(
            r#"UPDATE wallet_accounts SET is_active = FALSE, updated_at = $1
               WHERE tenant_id = $2 AND user_id = $3"#,
        )
        .bind(Utc::now())
        .bind(owner.tenant_id)
        .bind(owner.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::AccountNotFound);
        }
        Ok(())
    }

    async fn set_payout_account(
        &self,
        owner: OwnerRef,
        payout_account: String,
    ) -> Result<(), WalletError> {
        let result = sqlx::query(
            r#"UPDATE wallet_accounts SET payout_account = $1, updated_at = $2
               WHERE tenant_id = $3 AND user_id = $4 AND is_active = TRUE"#,
        )
        .bind(&payout_account)
        .bind(Utc::now())
        .bind(owner.tenant_id)
        .bind(owner.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::AccountNotFound);
        }
        Ok(())
    }

    async fn append_entry(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError> {
        let mut tx = self.pool.begin().await?;

        let (balance, is_active) = Self::lock_account(&mut tx, entry.owner).await?;
        if !is_active {
            return Err(WalletError::AccountNotFound);
        }

        let (before, after) = entry.direction.apply(balance, entry.amount)?;
        let committed = Self::write_entry(&mut tx, &entry, before, after, Utc::now()).await?;

        tx.commit().await?;
        Ok(committed)
    }

    async fn list_entries(
        &self,
        owner: OwnerRef,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        // Append-only log: plain read, no locks.
        let limit = filter.limit.map(|n| n as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"SELECT reference, tenant_id, user_id, direction, amount,
                      balance_before, balance_after, narration, status,
                      external_reference, created_at
               FROM ledger_entries
               WHERE tenant_id = $1 AND user_id = $2
                 AND ($3::SMALLINT IS NULL OR direction = $3)
                 AND ($4::SMALLINT IS NULL OR status = $4)
               ORDER BY created_at DESC, reference DESC
               LIMIT $5"#,
        )
        .bind(owner.tenant_id)
        .bind(owner.user_id)
        .bind(filter.direction.map(|d| d.id()))
        .bind(filter.status.map(|s| s.id()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_entry).collect()
    }

    async fn insert_transfer(&self, transfer: Transfer) -> Result<Transfer, WalletError> {
        let inserted = sqlx::query(
            r#"INSERT INTO transfers
               (reference, tenant_id, source_user_id, dest_user_id, amount,
                narration, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
               ON CONFLICT (reference) DO NOTHING"#,
        )
        .bind(&transfer.reference)
        .bind(transfer.source.tenant_id)
        .bind(transfer.source.user_id)
        .bind(transfer.destination.user_id)
        .bind(transfer.amount.as_decimal())
        .bind(&transfer.narration)
        .bind(transfer.status.id())
        .bind(transfer.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            // Idempotent initiate: hand back the stored record.
            return self
                .get_transfer(&transfer.reference)
                .await?
                .ok_or_else(|| WalletError::TransferNotFound(transfer.reference.clone()));
        }
        Ok(transfer)
    }

    async fn get_transfer(&self, reference: &str) -> Result<Option<Transfer>, WalletError> {
        let row = sqlx::query(
            r#"SELECT reference, tenant_id, source_user_id, dest_user_id, amount,
                      narration, status, created_at, updated_at
               FROM transfers WHERE reference = $1"#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_transfer).transpose()
    }

    async fn execute_transfer(&self, reference: &str) -> Result<Transfer, WalletError> {
        let mut tx = self.pool.begin().await?;

        // Lock the transfer row first: a concurrent retry of the same
        // reference queues here and then observes the terminal state.
        let row = sqlx::query(
            r#"SELECT reference, tenant_id, source_user_id, dest_user_id, amount,
                      narration, status, created_at, updated_at
               FROM transfers WHERE reference = $1
               FOR UPDATE"#,
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WalletError::TransferNotFound(reference.to_string()))?;

        let mut transfer = Self::map_transfer(&row)?;
        if transfer.status.is_terminal() {
            return Ok(transfer);
        }

        // Both account rows locked in one statement, ordered by account
        // number, so concurrent transfers on the same pair cannot deadlock.
        let rows = sqlx::query(
            r#"SELECT user_id, balance, is_active FROM wallet_accounts
               WHERE tenant_id = $1 AND user_id IN ($2, $3)
               ORDER BY account_number
               FOR UPDATE"#,
        )
        .bind(transfer.source.tenant_id)
        .bind(transfer.source.user_id)
        .bind(transfer.destination.user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut src: Option<(Balance, bool)> = None;
        let mut dst: Option<(Balance, bool)> = None;
        for r in &rows {
            let user_id: i64 = r.get("user_id");
            let state = (Balance::new(r.get::<Decimal, _>("balance"))?, r.get("is_active"));
            if user_id == transfer.source.user_id {
                src = Some(state);
            } else if user_id == transfer.destination.user_id {
                dst = Some(state);
            }
        }
        let (src_balance, src_active) = src.ok_or(WalletError::AccountNotFound)?;
        let (dst_balance, dst_active) = dst.ok_or(WalletError::AccountNotFound)?;

        let now = Utc::now();
        let failure = if !src_active {
            Some("source account is deactivated")
        } else if !dst_active {
            Some("destination account is deactivated")
        } else if src_balance.debit(transfer.amount).is_none() {
            Some("insufficient funds")
        } else {
            None
        };
        if let Some(reason) = failure {
            warn!(reference = %transfer.reference, reason, "transfer failed");
            Self::mark_transfer(&mut tx, reference, TransferStatus::Failed, now).await?;
            tx.commit().await?;
            transfer.status = TransferStatus::Failed;
            transfer.updated_at = now;
            return Ok(transfer);
        }

        let (src_before, src_after) = Direction::Debit.apply(src_balance, transfer.amount)?;
        Self::write_entry(
            &mut tx,
            &NewEntry {
                reference: format!("{}-D", transfer.reference),
                owner: transfer.source,
                direction: Direction::Debit,
                amount: transfer.amount,
                narration: transfer.narration.clone(),
                external_reference: None,
            },
            src_before,
            src_after,
            now,
        )
        .await?;

        let (dst_before, dst_after) = Direction::Credit.apply(dst_balance, transfer.amount)?;
        Self::write_entry(
            &mut tx,
            &NewEntry {
                reference: format!("{}-C", transfer.reference),
                owner: transfer.destination,
                direction: Direction::Credit,
                amount: transfer.amount,
                narration: transfer.narration.clone(),
                external_reference: None,
            },
            dst_before,
            dst_after,
            now,
        )
        .await?;

        Self::mark_transfer(&mut tx, reference, TransferStatus::Success, now).await?;
        tx.commit().await?;

        transfer.status = TransferStatus::Success;
        transfer.updated_at = now;
        Ok(transfer)
    }

    async fn open_escrow(
        &self,
        escrow: Escrow,
        hold_reference: String,
    ) -> Result<Escrow, WalletError> {
        let mut tx = self.pool.begin().await?;

        let (balance, is_active) = Self::lock_account(&mut tx, escrow.sender).await?;
        if !is_active {
            return Err(WalletError::AccountNotFound);
        }
        let (before, after) = Direction::Debit.apply(balance, escrow.amount)?;

        sqlx::query(
            r#"INSERT INTO escrows
               (order_reference, tenant_id, sender_user_id, receiver_user_id,
                amount, is_released, created_at)
               VALUES ($1, $2, $3, $4, $5, FALSE, $6)"#,
        )
        .bind(&escrow.order_reference)
        .bind(escrow.sender.tenant_id)
        .bind(escrow.sender.user_id)
        .bind(escrow.receiver.user_id)
        .bind(escrow.amount.as_decimal())
        .bind(escrow.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, WalletError::DuplicateReference(escrow.order_reference.clone()))
        })?;

        Self::write_entry(
            &mut tx,
            &NewEntry {
                reference: hold_reference,
                owner: escrow.sender,
                direction: Direction::Debit,
                amount: escrow.amount,
                narration: escrow::hold_narration(&escrow.order_reference),
                external_reference: None,
            },
            before,
            after,
            Utc::now(),
        )
        .await?;

        tx.commit().await?;
        Ok(escrow)
    }

    async fn get_escrow(&self, order_reference: &str) -> Result<Option<Escrow>, WalletError> {
        let row = sqlx::query(
            r#"SELECT order_reference, tenant_id, sender_user_id, receiver_user_id,
                      amount, is_released, released_at, created_at
               FROM escrows WHERE order_reference = $1"#,
        )
        .bind(order_reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_escrow).transpose()
    }

    async fn release_escrow(
        &self,
        order_reference: &str,
        release_reference: String,
    ) -> Result<Escrow, WalletError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"SELECT order_reference, tenant_id, sender_user_id, receiver_user_id,
                      amount, is_released, released_at, created_at
               FROM escrows WHERE order_reference = $1
               FOR UPDATE"#,
        )
        .bind(order_reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WalletError::EscrowNotFound(order_reference.to_string()))?;

        let mut escrow = Self::map_escrow(&row)?;
        if escrow.is_released {
            // Idempotent retry: same record, same timestamp.
            return Ok(escrow);
        }

        let (balance, is_active) = Self::lock_account(&mut tx, escrow.receiver).await?;
        if !is_active {
            return Err(WalletError::AccountNotFound);
        }
        let (before, after) = Direction::Credit.apply(balance, escrow.amount)?;

        let now = Utc::now();
        Self::write_entry(
            &mut tx,
            &NewEntry {
                reference: release_reference,
                owner: escrow.receiver,
                direction: Direction::Credit,
                amount: escrow.amount,
                narration: escrow::release_narration(order_reference),
                external_reference: None,
            },
            before,
            after,
            now,
        )
        .await?;

        sqlx::query(
            r#"UPDATE escrows SET is_released = TRUE, released_at = $1
               WHERE order_reference = $2"#,
        )
        .bind(now)
        .bind(order_reference)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        escrow.is_released = true;
        escrow.released_at = Some(now);
        Ok(escrow)
    }

    async fn record_pending_external(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError> {
        let external_reference = entry
            .external_reference
            .clone()
            .ok_or_else(|| WalletError::Gateway("missing external reference".to_string()))?;

        let account = self.get_account(entry.owner).await?;
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO ledger_entries
               (reference, tenant_id, user_id, direction, amount,
                balance_before, balance_after, narration, status,
                external_reference, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $10)"#,
        )
        .bind(&entry.reference)
        .bind(entry.owner.tenant_id)
        .bind(entry.owner.user_id)
        .bind(entry.direction.id())
        .bind(entry.amount.as_decimal())
        .bind(account.balance.as_decimal())
        .bind(&entry.narration)
        .bind(EntryStatus::Pending.id())
        .bind(&external_reference)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, WalletError::DuplicateReference(entry.reference.clone()))
        })?;

        Ok(LedgerEntry::pending_external(
            entry.reference,
            entry.owner,
            entry.direction,
            entry.amount,
            account.balance,
            entry.narration,
            external_reference,
            now,
        ))
    }

    async fn list_pending_external(&self) -> Result<Vec<LedgerEntry>, WalletError> {
        let rows = sqlx::query(
            r#"SELECT reference, tenant_id, user_id, direction, amount,
                      balance_before, balance_after, narration, status,
                      external_reference, created_at
               FROM ledger_entries
               WHERE status = 0 AND external_reference IS NOT NULL
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_entry).collect()
    }

    async fn finalize_external_entry(
        &self,
        reference: &str,
        success: bool,
    ) -> Result<LedgerEntry, WalletError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"SELECT reference, tenant_id, user_id, direction, amount,
                      balance_before, balance_after, narration, status,
                      external_reference, created_at
               FROM ledger_entries WHERE reference = $1
               FOR UPDATE"#,
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WalletError::EntryNotFound(reference.to_string()))?;

        let current = Self::map_entry(&row)?;
        if current.status().is_terminal() {
            // A racing worker already folded this verdict in.
            warn!(reference, "external entry already finalized");
            return Ok(current);
        }

        let (balance, _) = Self::lock_account(&mut tx, current.owner()).await?;

        let (status, before, after) = if success {
            match current.direction().apply(balance, current.amount()) {
                Ok((before, after)) => (EntryStatus::Success, before, after),
                Err(WalletError::InsufficientFunds) => {
                    // Gateway confirmed a payout the wallet can no longer
                    // cover. Never commit a negative balance: mark failed.
                    error!(reference, "confirmed external debit exceeds balance");
                    (EntryStatus::Failed, balance, balance)
                }
                Err(e) => return Err(e),
            }
        } else {
            (EntryStatus::Failed, balance, balance)
        };

        // The single permitted transition of a provisional entry, guarded on
        // the pending status.
        let updated = sqlx::query(
            r#"UPDATE ledger_entries
               SET status = $1, balance_before = $2, balance_after = $3
               WHERE reference = $4 AND status = $5"#,
        )
        .bind(status.id())
        .bind(before.as_decimal())
        .bind(after.as_decimal())
        .bind(reference)
        .bind(EntryStatus::Pending.id())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(WalletError::ImmutableEntry(reference.to_string()));
        }

        if status == EntryStatus::Success {
            sqlx::query(
                r#"UPDATE wallet_accounts SET balance = $1, updated_at = $2
                   WHERE tenant_id = $3 AND user_id = $4"#,
            )
            .bind(after.as_decimal())
            .bind(Utc::now())
            .bind(current.owner().tenant_id)
            .bind(current.owner().user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        current.finalize(status, before, after)
    }
}

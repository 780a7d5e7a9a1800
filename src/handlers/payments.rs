use axum::{extract::State, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::entities::payment::PaymentStatus;
use crate::entities::{booking, payment};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::utils::limits;
use crate::AppState;

const DEFAULT_PAYMENT_METHOD: &str = "cash";

#[derive(Debug, Default, Deserialize)]
pub struct RecordPaymentRequest {
    pub booking_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub provider_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub success: bool,
    pub payment: payment::Model,
    pub new_status: BookingStatus,
    pub new_paid: Decimal,
}

/// Record a payment and settle the booking.
///
/// The booking row is locked for the whole operation, so concurrent payments
/// on one booking apply one after another. The ledger entry and the updated
/// paid amount and status commit together or not at all.
pub async fn record_payment(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RecordPaymentRequest>,
) -> AppResult<Json<PaymentReceipt>> {
    let (Some(booking_id), Some(amount)) = (payload.booking_id, payload.amount) else {
        return Err(AppError::missing_fields());
    };

    let amount = amount.round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Amount must be greater than zero".to_string(),
        ));
    }
    let amount = limits::ensure_money("Amount", amount)?;

    let method = payload
        .method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_PAYMENT_METHOD)
        .to_lowercase();
    limits::ensure_max_len("method", Some(&method), limits::PAYMENT_METHOD_MAX_LEN)?;
    limits::ensure_max_len(
        "provider_reference",
        payload.provider_reference.as_deref(),
        limits::PROVIDER_REFERENCE_MAX_LEN,
    )?;

    let txn = state.db.begin().await?;

    let booking = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if !booking.status.accepts_payments() {
        return Err(AppError::Conflict(
            "Cannot record a payment on a cancelled booking".to_string(),
        ));
    }

    let new_paid = limits::ensure_money("Paid amount", booking.paid_amount + amount)?;

    let new_payment = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        amount: Set(amount),
        method: Set(method),
        status: Set(PaymentStatus::Paid),
        provider_reference: Set(payload.provider_reference),
        notes: Set(payload.notes),
        processed_at: Set(Utc::now().into()),
    };
    let payment = new_payment.insert(&txn).await?;

    let previous_status = booking.status;
    let new_status = booking.status.after_payment(new_paid, booking.total_amount);

    let mut active: booking::ActiveModel = booking.into();
    active.paid_amount = Set(new_paid);
    active.status = Set(new_status);
    active.update(&txn).await.inspect_err(|e| {
        tracing::error!(
            %booking_id,
            payment_id = %payment.id,
            error = %e,
            "Failed to settle booking, rolling back payment"
        );
    })?;

    txn.commit().await?;

    tracing::info!(
        %booking_id,
        payment_id = %payment.id,
        amount = %amount,
        paid = %new_paid,
        from = ?previous_status,
        to = ?new_status,
        "Payment recorded"
    );

    Ok(Json(PaymentReceipt {
        success: true,
        payment,
        new_status,
        new_paid,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{booking_model, logged_sql, mock_state, payment_model, transaction_log};
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase};

    fn settled(booking: &booking::Model, paid: Decimal, status: BookingStatus) -> booking::Model {
        let mut updated = booking.clone();
        updated.paid_amount = paid;
        updated.status = status;
        updated
    }

    fn payment_db(booking: &booking::Model, amount: Decimal, updated: booking::Model) -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![payment_model(booking.id, amount)]])
            .append_query_results([vec![updated]])
            .into_connection()
    }

    async fn pay(db: DatabaseConnection, booking_id: Uuid, amount: i64) -> AppResult<PaymentReceipt> {
        let payload = RecordPaymentRequest {
            booking_id: Some(booking_id),
            amount: Some(Decimal::from(amount)),
            method: Some("Transfer".to_string()),
            ..Default::default()
        };
        record_payment(State(mock_state(db)), AppJson(payload))
            .await
            .map(|Json(receipt)| receipt)
    }

    #[tokio::test]
    async fn partial_then_full_payment_settles_booking() {
        let booking = booking_model(BookingStatus::Pending, Decimal::from(1000), Decimal::ZERO);

        let on_hold = settled(&booking, Decimal::from(400), BookingStatus::OnHold);
        let db = payment_db(&booking, Decimal::from(400), on_hold.clone());
        let receipt = pay(db, booking.id, 400).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.new_paid, Decimal::from(400));
        assert_eq!(receipt.new_status, BookingStatus::OnHold);

        let confirmed = settled(&on_hold, Decimal::from(1000), BookingStatus::Confirmed);
        let db = payment_db(&on_hold, Decimal::from(600), confirmed);
        let receipt = pay(db, booking.id, 600).await.unwrap();
        assert_eq!(receipt.new_paid, Decimal::from(1000));
        assert_eq!(receipt.new_status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn overpayment_keeps_booking_confirmed() {
        let booking = booking_model(BookingStatus::Confirmed, Decimal::from(1000), Decimal::from(1000));
        let updated = settled(&booking, Decimal::from(1050), BookingStatus::Confirmed);

        let receipt = pay(payment_db(&booking, Decimal::from(50), updated), booking.id, 50)
            .await
            .unwrap();
        assert_eq!(receipt.new_paid, Decimal::from(1050));
        assert_eq!(receipt.new_status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn missing_booking_id_is_rejected_before_any_write() {
        let state = mock_state(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let payload = RecordPaymentRequest {
            amount: Some(Decimal::from(100)),
            ..Default::default()
        };

        let err = record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "missing required fields"));
        assert!(transaction_log(state).is_empty());
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let state = mock_state(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        for amount in [Decimal::ZERO, Decimal::from(-20), Decimal::new(1, 3)] {
            let payload = RecordPaymentRequest {
                booking_id: Some(Uuid::new_v4()),
                amount: Some(amount),
                ..Default::default()
            };
            let err = record_payment(State(state.clone()), AppJson(payload))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{amount}");
        }
        assert!(transaction_log(state).is_empty());
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<booking::Model>::new()])
            .into_connection();

        let err = pay(db, Uuid::new_v4(), 100).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancelled_booking_refuses_payment() {
        let booking = booking_model(BookingStatus::Cancelled, Decimal::from(1000), Decimal::ZERO);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .into_connection();

        let err = pay(db, booking.id, 100).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn ledger_insert_failure_aborts_before_settling() {
        let booking = booking_model(BookingStatus::Pending, Decimal::from(1000), Decimal::ZERO);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_errors([DbErr::Custom("check constraint violated".to_string())])
            .into_connection();

        let err = pay(db, booking.id, 100).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn settlement_failure_is_reported() {
        let booking = booking_model(BookingStatus::Pending, Decimal::from(1000), Decimal::ZERO);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![payment_model(booking.id, Decimal::from(100))]])
            .append_query_errors([DbErr::Custom("connection lost".to_string())])
            .into_connection();

        let err = pay(db, booking.id, 100).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(err.to_string().contains("connection lost"));
    }

    #[tokio::test]
    async fn booking_is_locked_and_settled_in_the_payment_transaction() {
        let booking = booking_model(BookingStatus::Pending, Decimal::from(1000), Decimal::ZERO);
        let updated = settled(&booking, Decimal::from(400), BookingStatus::OnHold);
        let state = mock_state(payment_db(&booking, Decimal::from(400), updated));

        let payload = RecordPaymentRequest {
            booking_id: Some(booking.id),
            amount: Some(Decimal::from(400)),
            ..Default::default()
        };
        record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap();

        let sql = logged_sql(&transaction_log(state));
        assert_eq!(sql.len(), 1, "{sql:?}");
        let stmts = &sql[0];
        assert_eq!(stmts.len(), 5, "{stmts:?}");
        assert_eq!(stmts[0], "BEGIN");
        assert!(stmts[1].starts_with("SELECT") && stmts[1].contains(r#"FROM "booking""#));
        assert!(stmts[1].ends_with("FOR UPDATE"), "{}", stmts[1]);
        assert!(stmts[2].starts_with(r#"INSERT INTO "payment""#));
        assert!(stmts[3].starts_with(r#"UPDATE "booking""#));
        assert_eq!(stmts[4], "COMMIT");
    }

    #[tokio::test]
    async fn failed_settlement_never_commits() {
        let booking = booking_model(BookingStatus::Pending, Decimal::from(1000), Decimal::ZERO);
        let state = mock_state(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![booking.clone()]])
                .append_query_results([vec![payment_model(booking.id, Decimal::from(100))]])
                .append_query_errors([DbErr::Custom("connection lost".to_string())])
                .into_connection(),
        );

        let payload = RecordPaymentRequest {
            booking_id: Some(booking.id),
            amount: Some(Decimal::from(100)),
            ..Default::default()
        };
        record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        let sql = logged_sql(&transaction_log(state));
        assert!(sql.iter().flatten().all(|stmt| stmt != "COMMIT"), "{sql:?}");
    }

    #[tokio::test]
    async fn amounts_beyond_the_money_column_are_rejected() {
        let state = mock_state(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let payload = RecordPaymentRequest {
            booking_id: Some(Uuid::new_v4()),
            amount: Some(Decimal::MAX),
            ..Default::default()
        };

        let err = record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.starts_with("Amount exceeds")));
        assert!(transaction_log(state).is_empty());
    }

    #[tokio::test]
    async fn paid_amount_cannot_outgrow_its_column() {
        let booking = booking_model(BookingStatus::Confirmed, Decimal::from(1000), limits::max_money());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .into_connection();

        let err = pay(db, booking.id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.starts_with("Paid amount exceeds")));
    }

    #[tokio::test]
    async fn over_long_method_and_reference_are_bad_requests() {
        let state = mock_state(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let payload = RecordPaymentRequest {
            booking_id: Some(Uuid::new_v4()),
            amount: Some(Decimal::from(100)),
            method: Some("m".repeat(limits::PAYMENT_METHOD_MAX_LEN + 1)),
            ..Default::default()
        };
        let err = record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.starts_with("method")));

        let payload = RecordPaymentRequest {
            booking_id: Some(Uuid::new_v4()),
            amount: Some(Decimal::from(100)),
            provider_reference: Some("r".repeat(limits::PROVIDER_REFERENCE_MAX_LEN + 1)),
            ..Default::default()
        };
        let err = record_payment(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.starts_with("provider_reference")));

        assert!(transaction_log(state).is_empty());
    }
}

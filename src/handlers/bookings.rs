use axum::{extract::State, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::entities::quote::QuoteStatus;
use crate::entities::{booking, booking_item, customer, payment, quote, quote_item};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::utils::limits;
use crate::handlers::catalog::{ensure_customer, load_catalog, resolve_currency};
use crate::utils::pricing::{self, LineItemInput, PricedLine};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub quote_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    pub status: Option<BookingStatus>,
    pub currency_code: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub customer: Option<customer::Model>,
    pub items: Vec<booking_item::Model>,
    pub payments: Vec<payment::Model>,
    /// Sum of the payment ledger, for auditing against `paid_amount`
    pub ledger_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub booking_id: Uuid,
    pub paid_amount: Decimal,
    pub ledger_total: Decimal,
    pub adjusted: bool,
    pub status: BookingStatus,
}

/// Create a booking, either directly from line items or by converting a quote.
///
/// Converting locks the quote row, books its items when the request carries
/// none, and marks the quote accepted. Booking, items and quote acceptance
/// commit together.
pub async fn create_booking(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateBookingRequest>,
) -> AppResult<Json<booking::Model>> {
    if payload.quote_id.is_none() && (payload.customer_id.is_none() || payload.items.is_empty()) {
        return Err(AppError::missing_fields());
    }

    let status = payload.status.unwrap_or(BookingStatus::Pending);
    if !status.is_initial() {
        return Err(AppError::BadRequest(format!(
            "A booking cannot start as {:?}",
            status
        )));
    }

    limits::ensure_max_len(
        "contact_name",
        payload.contact_name.as_deref(),
        limits::CONTACT_NAME_MAX_LEN,
    )?;
    limits::ensure_max_len(
        "contact_email",
        payload.contact_email.as_deref(),
        limits::CONTACT_EMAIL_MAX_LEN,
    )?;
    limits::ensure_max_len(
        "contact_phone",
        payload.contact_phone.as_deref(),
        limits::CONTACT_PHONE_MAX_LEN,
    )?;

    let txn = state.db.begin().await?;

    let source_quote = match payload.quote_id {
        Some(quote_id) => {
            let quote = quote::Entity::find_by_id(quote_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Quote not found".to_string()))?;

            if quote.status == QuoteStatus::Draft && quote.is_expired_at(Utc::now()) {
                expire_quote(txn, quote).await?;
                return Err(AppError::Conflict("Quote has expired".to_string()));
            }
            ensure_convertible(&quote)?;
            Some(quote)
        }
        None => None,
    };

    let customer_id = match (payload.customer_id, &source_quote) {
        (Some(customer_id), Some(quote)) if customer_id != quote.customer_id => {
            return Err(AppError::BadRequest(
                "Customer does not match the quote".to_string(),
            ));
        }
        (Some(customer_id), _) => customer_id,
        (None, Some(quote)) => quote.customer_id,
        (None, None) => return Err(AppError::missing_fields()),
    };
    ensure_customer(&txn, customer_id).await?;

    let currency_code = match &source_quote {
        Some(quote) => {
            let requested = resolve_currency(payload.currency_code.as_deref(), &quote.currency_code)?;
            if requested != quote.currency_code {
                return Err(AppError::BadRequest(format!(
                    "Quote is priced in {}",
                    quote.currency_code
                )));
            }
            requested
        }
        None => resolve_currency(payload.currency_code.as_deref(), &state.config.default_currency)?,
    };

    let lines: Vec<PricedLine> = match &source_quote {
        Some(quote) if payload.items.is_empty() => quote_lines(&txn, quote.id).await?,
        _ => {
            let catalog = load_catalog(&txn, &payload.items).await?;
            pricing::price_lines(&payload.items, &catalog, &currency_code)?
        }
    };
    let total_amount = pricing::total_of(&lines)?;

    let new_booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        quote_id: Set(payload.quote_id),
        customer_id: Set(customer_id),
        status: Set(status),
        currency_code: Set(currency_code),
        total_amount: Set(total_amount),
        paid_amount: Set(Decimal::ZERO),
        contact_name: Set(payload.contact_name),
        contact_email: Set(payload.contact_email),
        contact_phone: Set(payload.contact_phone),
        notes: Set(payload.notes),
        ..Default::default()
    };
    let booking = new_booking.insert(&txn).await?;

    let expected = lines.len() as u64;
    let items: Vec<booking_item::ActiveModel> = lines
        .into_iter()
        .map(|line| line.into_booking_item(booking.id))
        .collect();

    let inserted = booking_item::Entity::insert_many(items)
        .exec_without_returning(&txn)
        .await
        .inspect_err(|e| {
            tracing::error!(booking_id = %booking.id, error = %e, "Failed to save booking items, rolling back");
        })?;

    if inserted != expected {
        tracing::error!(
            booking_id = %booking.id,
            expected,
            inserted,
            "Booking items partially written, rolling back"
        );
        return Err(AppError::Internal("Booking items could not be saved".to_string()));
    }

    if let Some(quote) = source_quote {
        let quote_id = quote.id;
        let mut active: quote::ActiveModel = quote.into();
        active.status = Set(QuoteStatus::Accepted);
        active.update(&txn).await.inspect_err(|e| {
            tracing::error!(%quote_id, booking_id = %booking.id, error = %e, "Failed to accept quote, rolling back");
        })?;
    }

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        quote_id = ?booking.quote_id,
        customer_id = %customer_id,
        total = %total_amount,
        items = expected,
        "Booking created"
    );

    Ok(Json(booking))
}

/// Only a draft quote can be booked.
fn ensure_convertible(quote: &quote::Model) -> AppResult<()> {
    match quote.status {
        QuoteStatus::Draft => Ok(()),
        QuoteStatus::Accepted => Err(AppError::Conflict(
            "Quote has already been accepted".to_string(),
        )),
        QuoteStatus::Expired => Err(AppError::Conflict("Quote has expired".to_string())),
        QuoteStatus::Rejected => Err(AppError::Conflict("Quote was rejected".to_string())),
    }
}

/// Persist DRAFT -> EXPIRED for a locked quote found past `valid_until`.
async fn expire_quote(txn: DatabaseTransaction, quote: quote::Model) -> AppResult<()> {
    let quote_id = quote.id;
    let mut active: quote::ActiveModel = quote.into();
    active.status = Set(QuoteStatus::Expired);
    active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(%quote_id, "Quote expired on conversion attempt");
    Ok(())
}

async fn quote_lines<C: ConnectionTrait>(db: &C, quote_id: Uuid) -> AppResult<Vec<PricedLine>> {
    let items = quote_item::Entity::find()
        .filter(quote_item::Column::QuoteId.eq(quote_id))
        .all(db)
        .await?;

    if items.is_empty() {
        return Err(AppError::Conflict("Quote has no items to book".to_string()));
    }

    Ok(items.into_iter().map(PricedLine::from).collect())
}

async fn sum_ledger<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<Decimal> {
    Ok(payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking_id))
        .all(db)
        .await?
        .iter()
        .map(|p| p.amount)
        .sum())
}

/// Get a booking with its customer, items and payments
pub async fn get_booking(
    State(state): State<AppState>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let customer = customer::Entity::find_by_id(booking.customer_id)
        .one(state.db.as_ref())
        .await?;

    let items = booking_item::Entity::find()
        .filter(booking_item::Column::BookingId.eq(booking.id))
        .order_by_asc(booking_item::Column::TravelDate)
        .all(state.db.as_ref())
        .await?;

    let payments = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking.id))
        .order_by_asc(payment::Column::ProcessedAt)
        .all(state.db.as_ref())
        .await?;

    let ledger_total: Decimal = payments.iter().map(|p| p.amount).sum();

    Ok(Json(BookingDetail {
        booking,
        customer,
        items,
        payments,
        ledger_total,
    }))
}

/// List bookings, newest first
pub async fn list_bookings(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListBookingsQuery>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let mut query = booking::Entity::find();

    if let Some(customer_id) = params.customer_id {
        query = query.filter(booking::Column::CustomerId.eq(customer_id));
    }
    if let Some(status) = params.status {
        query = query.filter(booking::Column::Status.eq(status));
    }

    let bookings = query
        .order_by_desc(booking::Column::CreatedAt)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(bookings))
}

/// List the payment ledger of a booking
pub async fn list_booking_payments(
    State(state): State<AppState>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<payment::Model>>> {
    booking::Entity::find_by_id(booking_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let payments = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking_id))
        .order_by_asc(payment::Column::ProcessedAt)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(payments))
}

/// Cancel or complete a booking (back-office)
pub async fn update_booking_status(
    State(state): State<AppState>,
    AppPath(booking_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateBookingStatusRequest>,
) -> AppResult<Json<booking::Model>> {
    let txn = state.db.begin().await?;

    let booking = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if !booking.status.can_transition_to(payload.status) {
        return Err(AppError::Conflict(format!(
            "Cannot change booking from {:?} to {:?}",
            booking.status, payload.status
        )));
    }

    let previous = booking.status;
    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(payload.status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %updated.id,
        from = ?previous,
        to = ?updated.status,
        "Booking status changed"
    );

    Ok(Json(updated))
}

/// Bring `paid_amount` up to the payment ledger total.
///
/// Only raises the counter; a ledger below the counter is reported, not
/// corrected, since paid amounts never decrease.
pub async fn reconcile_booking(
    State(state): State<AppState>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<ReconciliationResponse>> {
    let txn = state.db.begin().await?;

    let booking = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let ledger_total = sum_ledger(&txn, booking.id).await?;

    if ledger_total <= booking.paid_amount {
        txn.commit().await?;

        if ledger_total < booking.paid_amount {
            tracing::warn!(
                booking_id = %booking.id,
                paid_amount = %booking.paid_amount,
                ledger_total = %ledger_total,
                "Paid amount exceeds payment ledger"
            );
        }

        return Ok(Json(ReconciliationResponse {
            booking_id: booking.id,
            paid_amount: booking.paid_amount,
            ledger_total,
            adjusted: false,
            status: booking.status,
        }));
    }

    let previous_paid = booking.paid_amount;
    let new_status = booking.status.after_payment(ledger_total, booking.total_amount);

    let mut active: booking::ActiveModel = booking.into();
    active.paid_amount = Set(ledger_total);
    active.status = Set(new_status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::warn!(
        booking_id = %updated.id,
        previous_paid = %previous_paid,
        ledger_total = %ledger_total,
        status = ?new_status,
        "Paid amount reconciled with payment ledger"
    );

    Ok(Json(ReconciliationResponse {
        booking_id: updated.id,
        paid_amount: ledger_total,
        ledger_total,
        adjusted: true,
        status: new_status,
    }))
}

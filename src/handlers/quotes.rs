use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::quote::QuoteStatus;
use crate::entities::{customer, package, quote, quote_item};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::handlers::catalog::{ensure_customer, load_catalog, resolve_currency};
use crate::utils::pricing::{self, LineItemInput};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuoteRequest {
    pub customer_id: Option<Uuid>,
    pub currency_code: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuotesQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<QuoteStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuoteStatusRequest {
    pub status: QuoteStatus,
}

#[derive(Debug, Serialize)]
pub struct QuoteItemDetail {
    #[serde(flatten)]
    pub item: quote_item::Model,
    pub package_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: quote::Model,
    pub customer: Option<customer::Model>,
    pub items: Vec<QuoteItemDetail>,
}

/// Price the requested lines and persist a draft quote with its items.
///
/// The total is always the sum of the priced subtotals; quote and items are
/// written in one transaction so a quote never exists without its lines.
pub async fn create_quote(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateQuoteRequest>,
) -> AppResult<Json<quote::Model>> {
    let customer_id = payload.customer_id.ok_or_else(AppError::missing_fields)?;
    if payload.items.is_empty() {
        return Err(AppError::missing_fields());
    }
    if payload.valid_until.is_some_and(|until| until <= Utc::now()) {
        return Err(AppError::BadRequest(
            "valid_until must be in the future".to_string(),
        ));
    }

    let currency_code =
        resolve_currency(payload.currency_code.as_deref(), &state.config.default_currency)?;

    ensure_customer(state.db.as_ref(), customer_id).await?;
    let catalog = load_catalog(state.db.as_ref(), &payload.items).await?;
    let lines = pricing::price_lines(&payload.items, &catalog, &currency_code)?;
    let total_amount = pricing::total_of(&lines)?;

    let valid_until = payload.valid_until.or_else(|| {
        state
            .config
            .quote_validity_days
            .map(|days| Utc::now() + Duration::days(days))
    });

    let txn = state.db.begin().await?;

    let new_quote = quote::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        currency_code: Set(currency_code),
        total_amount: Set(total_amount),
        status: Set(QuoteStatus::Draft),
        valid_until: Set(valid_until.map(Into::into)),
        notes: Set(payload.notes),
        ..Default::default()
    };
    let quote = new_quote.insert(&txn).await?;

    let expected = lines.len() as u64;
    let items: Vec<quote_item::ActiveModel> = lines
        .into_iter()
        .map(|line| line.into_quote_item(quote.id))
        .collect();

    let inserted = quote_item::Entity::insert_many(items)
        .exec_without_returning(&txn)
        .await
        .inspect_err(|e| {
            tracing::error!(quote_id = %quote.id, error = %e, "Failed to save quote items, rolling back");
        })?;

    if inserted != expected {
        tracing::error!(
            quote_id = %quote.id,
            expected,
            inserted,
            "Quote items partially written, rolling back"
        );
        return Err(AppError::Internal("Quote items could not be saved".to_string()));
    }

    txn.commit().await?;

    tracing::info!(
        quote_id = %quote.id,
        customer_id = %customer_id,
        total = %total_amount,
        items = expected,
        "Quote created"
    );

    Ok(Json(quote))
}

/// Get a quote with its items, customer and package titles
pub async fn get_quote(
    State(state): State<AppState>,
    AppPath(quote_id): AppPath<Uuid>,
) -> AppResult<Json<QuoteDetail>> {
    let mut quote = quote::Entity::find_by_id(quote_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Quote not found".to_string()))?;
    quote.status = quote.effective_status(Utc::now());

    let customer = customer::Entity::find_by_id(quote.customer_id)
        .one(state.db.as_ref())
        .await?;

    let items = quote_item::Entity::find()
        .filter(quote_item::Column::QuoteId.eq(quote.id))
        .order_by_asc(quote_item::Column::TravelDate)
        .all(state.db.as_ref())
        .await?;

    let package_ids: Vec<Uuid> = items.iter().map(|i| i.package_id).collect();
    let packages = if package_ids.is_empty() {
        Vec::new()
    } else {
        package::Entity::find()
            .filter(package::Column::Id.is_in(package_ids))
            .all(state.db.as_ref())
            .await?
    };

    let items = items
        .into_iter()
        .map(|item| {
            let package_title = packages
                .iter()
                .find(|p| p.id == item.package_id)
                .map(|p| p.title.clone());
            QuoteItemDetail {
                item,
                package_title,
            }
        })
        .collect();

    Ok(Json(QuoteDetail {
        quote,
        customer,
        items,
    }))
}

/// List quotes, newest first
pub async fn list_quotes(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListQuotesQuery>,
) -> AppResult<Json<Vec<quote::Model>>> {
    let mut query = quote::Entity::find();

    if let Some(customer_id) = params.customer_id {
        query = query.filter(quote::Column::CustomerId.eq(customer_id));
    }
    let now = Utc::now();
    if let Some(status) = params.status {
        query = query.filter(status_condition(status, now));
    }

    let quotes = query
        .order_by_desc(quote::Column::CreatedAt)
        .all(state.db.as_ref())
        .await?
        .into_iter()
        .map(|mut quote| {
            quote.status = quote.effective_status(now);
            quote
        })
        .collect();

    Ok(Json(quotes))
}

/// Filter matching `effective_status`: lapsed drafts count as expired.
fn status_condition(status: QuoteStatus, now: DateTime<Utc>) -> Condition {
    let lapsed_draft = Condition::all()
        .add(quote::Column::Status.eq(QuoteStatus::Draft))
        .add(quote::Column::ValidUntil.lt(now));

    match status {
        QuoteStatus::Draft => Condition::all()
            .add(quote::Column::Status.eq(QuoteStatus::Draft))
            .add(
                Condition::any()
                    .add(quote::Column::ValidUntil.is_null())
                    .add(quote::Column::ValidUntil.gte(now)),
            ),
        QuoteStatus::Expired => Condition::any()
            .add(quote::Column::Status.eq(QuoteStatus::Expired))
            .add(lapsed_draft),
        other => Condition::all().add(quote::Column::Status.eq(other)),
    }
}

/// Reject or expire a draft quote. Acceptance only happens through booking.
pub async fn update_quote_status(
    State(state): State<AppState>,
    AppPath(quote_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateQuoteStatusRequest>,
) -> AppResult<Json<quote::Model>> {
    if payload.status == QuoteStatus::Accepted {
        return Err(AppError::BadRequest(
            "Quotes are accepted by creating a booking".to_string(),
        ));
    }

    let txn = state.db.begin().await?;

    let quote = quote::Entity::find_by_id(quote_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Quote not found".to_string()))?;

    if !quote.status.can_transition_to(payload.status) {
        return Err(AppError::Conflict(format!(
            "Cannot change quote from {:?} to {:?}",
            quote.status, payload.status
        )));
    }

    let previous = quote.status;
    let mut active: quote::ActiveModel = quote.into();
    active.status = Set(payload.status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        quote_id = %updated.id,
        from = ?previous,
        to = ?updated.status,
        "Quote status changed"
    );

    Ok(Json(updated))
}

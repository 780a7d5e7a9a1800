use axum::{extract::State, Json};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::entities::{customer, package};
use crate::error::{AppError, AppResult};
use crate::extract::AppPath;
use crate::utils::pricing::{self, LineItemInput};
use crate::AppState;

/// List packages open for sale
pub async fn list_packages(State(state): State<AppState>) -> AppResult<Json<Vec<package::Model>>> {
    let packages = package::Entity::find()
        .filter(package::Column::IsActive.eq(true))
        .order_by_asc(package::Column::Title)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(packages))
}

/// Get a single catalog package
pub async fn get_package(
    State(state): State<AppState>,
    AppPath(package_id): AppPath<Uuid>,
) -> AppResult<Json<package::Model>> {
    let package = package::Entity::find_by_id(package_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Package not found".to_string()))?;

    Ok(Json(package))
}

/// Packages referenced by the requested lines.
pub(crate) async fn load_catalog<C: ConnectionTrait>(
    db: &C,
    items: &[LineItemInput],
) -> AppResult<Vec<package::Model>> {
    let ids = pricing::package_ids(items);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(package::Entity::find()
        .filter(package::Column::Id.is_in(ids))
        .all(db)
        .await?)
}

pub(crate) async fn ensure_customer<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
) -> AppResult<customer::Model> {
    customer::Entity::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Customer not found".to_string()))
}

/// Normalize an ISO 4217 code, falling back to the configured default.
pub(crate) fn resolve_currency(requested: Option<&str>, default: &str) -> AppResult<String> {
    let code = requested
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(default)
        .to_uppercase();

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(format!("Invalid currency code {}", code)));
    }

    Ok(code)
}

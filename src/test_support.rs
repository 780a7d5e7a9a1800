use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, MockExecResult, Transaction};
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::entities::payment::PaymentStatus;
use crate::entities::quote::QuoteStatus;
use crate::entities::{booking, customer, package, payment, quote, quote_item};
use crate::{AppState, Config};

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/koneex_test".to_string(),
        db_max_connections: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        default_currency: "MXN".to_string(),
        quote_validity_days: None,
        rate_limit_replenish_ms: 60,
        rate_limit_burst: 100,
    }
}

pub fn mock_state(db: DatabaseConnection) -> AppState {
    AppState {
        db: Arc::new(db),
        config: test_config(),
    }
}

/// Drain the mock's transaction log once every handler clone of the state is gone.
pub fn transaction_log(state: AppState) -> Vec<Transaction> {
    Arc::try_unwrap(state.db)
        .unwrap_or_else(|_| panic!("mock connection is still shared"))
        .into_transaction_log()
}

/// SQL text of each logged transaction, in execution order.
pub fn logged_sql(log: &[Transaction]) -> Vec<Vec<String>> {
    log.iter()
        .map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()).collect())
        .collect()
}

pub fn rows_affected(rows: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: rows,
    }
}

pub fn customer_model() -> customer::Model {
    customer::Model {
        id: Uuid::new_v4(),
        name: "Ana López".to_string(),
        email: Some("ana@example.com".to_string()),
        phone: Some("+52 999 123 4567".to_string()),
        created_at: Utc::now().into(),
    }
}

pub fn package_model(price_per_person: Decimal) -> package::Model {
    package::Model {
        id: Uuid::new_v4(),
        title: "Chichén Itzá y cenotes".to_string(),
        destination: "Yucatán".to_string(),
        duration_days: 2,
        price_per_person,
        currency_code: "MXN".to_string(),
        is_active: true,
        created_at: Utc::now().into(),
    }
}

pub fn quote_model(customer_id: Uuid, status: QuoteStatus, total_amount: Decimal) -> quote::Model {
    quote::Model {
        id: Uuid::new_v4(),
        customer_id,
        currency_code: "MXN".to_string(),
        total_amount,
        status,
        valid_until: None,
        notes: None,
        created_at: Utc::now().into(),
    }
}

pub fn quote_item_model(quote_id: Uuid, package_id: Uuid, adults: i32, unit_price: Decimal) -> quote_item::Model {
    quote_item::Model {
        id: Uuid::new_v4(),
        quote_id,
        package_id,
        title: "Chichén Itzá y cenotes".to_string(),
        travel_date: None,
        adults,
        children: 0,
        unit_price,
        quantity: 1,
        subtotal: unit_price * Decimal::from(adults),
    }
}

pub fn booking_model(status: BookingStatus, total_amount: Decimal, paid_amount: Decimal) -> booking::Model {
    booking::Model {
        id: Uuid::new_v4(),
        quote_id: None,
        customer_id: Uuid::new_v4(),
        status,
        currency_code: "MXN".to_string(),
        total_amount,
        paid_amount,
        contact_name: None,
        contact_email: None,
        contact_phone: None,
        notes: None,
        created_at: Utc::now().into(),
    }
}

pub fn payment_model(booking_id: Uuid, amount: Decimal) -> payment::Model {
    payment::Model {
        id: Uuid::new_v4(),
        booking_id,
        amount,
        method: "transfer".to_string(),
        status: PaymentStatus::Paid,
        provider_reference: None,
        notes: None,
        processed_at: Utc::now().into(),
    }
}

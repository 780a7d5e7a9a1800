use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{booking_item, package, quote_item};
use crate::error::{AppError, AppResult};
use crate::utils::limits;

/// Lines are priced per person; one line is always one package.
pub const LINE_QUANTITY: i32 = 1;

/// Money is stored with two decimal places.
const MONEY_SCALE: u32 = 2;

/// Requested line as it arrives from the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemInput {
    pub package_id: Option<Uuid>,
    pub title: Option<String>,
    pub travel_date: Option<NaiveDate>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub unit_price: Option<Decimal>,
}

/// Snapshot of one priced line, shared by quote and booking items.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub package_id: Uuid,
    pub title: String,
    pub travel_date: Option<NaiveDate>,
    pub adults: i32,
    pub children: i32,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

pub fn line_subtotal(unit_price: Decimal, adults: i32, children: i32) -> AppResult<Decimal> {
    let travellers = adults
        .checked_add(children)
        .ok_or_else(too_many_travellers)?;

    let subtotal = unit_price
        .checked_mul(Decimal::from(travellers))
        .ok_or_else(|| AppError::BadRequest("Line subtotal is out of range".to_string()))?;

    limits::ensure_money("Line subtotal", subtotal)
}

pub fn total_of(lines: &[PricedLine]) -> AppResult<Decimal> {
    let total = lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.subtotal))
        .ok_or_else(|| AppError::BadRequest("Total amount is out of range".to_string()))?;

    limits::ensure_money("Total amount", total)
}

fn too_many_travellers() -> AppError {
    AppError::BadRequest(format!(
        "Each item allows at most {} travellers",
        limits::MAX_TRAVELLERS_PER_LINE
    ))
}

pub fn package_ids(inputs: &[LineItemInput]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = inputs.iter().filter_map(|i| i.package_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Price requested lines against the catalog.
///
/// Title and unit price default to the catalog package's values when the
/// client leaves them out. Catalog prices must already be in `currency_code`.
pub fn price_lines(
    inputs: &[LineItemInput],
    catalog: &[package::Model],
    currency_code: &str,
) -> AppResult<Vec<PricedLine>> {
    inputs
        .iter()
        .map(|input| price_line(input, catalog, currency_code))
        .collect()
}

fn price_line(
    input: &LineItemInput,
    catalog: &[package::Model],
    currency_code: &str,
) -> AppResult<PricedLine> {
    let package_id = input.package_id.ok_or_else(AppError::missing_fields)?;

    let package = catalog
        .iter()
        .find(|p| p.id == package_id)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown package {}", package_id)))?;

    if !package.is_active {
        return Err(AppError::BadRequest(format!(
            "Package {} is not available",
            package.title
        )));
    }

    let adults = input.adults.unwrap_or(0);
    let children = input.children.unwrap_or(0);
    if adults < 0 || children < 0 {
        return Err(AppError::BadRequest(
            "Adults and children cannot be negative".to_string(),
        ));
    }
    match adults.checked_add(children) {
        Some(0) => {
            return Err(AppError::BadRequest(
                "Each item needs at least one traveller".to_string(),
            ));
        }
        Some(travellers) if travellers <= limits::MAX_TRAVELLERS_PER_LINE => {}
        _ => return Err(too_many_travellers()),
    }

    let unit_price = match input.unit_price {
        Some(price) => price,
        None => {
            if !package.currency_code.eq_ignore_ascii_case(currency_code) {
                return Err(AppError::BadRequest(format!(
                    "Package {} is priced in {}, not {}",
                    package.title, package.currency_code, currency_code
                )));
            }
            package.price_per_person
        }
    };
    if unit_price.is_sign_negative() {
        return Err(AppError::BadRequest(
            "Unit price cannot be negative".to_string(),
        ));
    }
    let unit_price = limits::ensure_money("Unit price", unit_price.round_dp(MONEY_SCALE))?;

    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&package.title)
        .to_string();
    limits::ensure_max_len("title", Some(&title), limits::TITLE_MAX_LEN)?;

    Ok(PricedLine {
        package_id,
        title,
        travel_date: input.travel_date,
        adults,
        children,
        unit_price,
        quantity: LINE_QUANTITY,
        subtotal: line_subtotal(unit_price, adults, children)?,
    })
}

impl PricedLine {
    pub fn into_quote_item(self, quote_id: Uuid) -> quote_item::ActiveModel {
        quote_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            quote_id: Set(quote_id),
            package_id: Set(self.package_id),
            title: Set(self.title),
            travel_date: Set(self.travel_date),
            adults: Set(self.adults),
            children: Set(self.children),
            unit_price: Set(self.unit_price),
            quantity: Set(self.quantity),
            subtotal: Set(self.subtotal),
        }
    }

    pub fn into_booking_item(self, booking_id: Uuid) -> booking_item::ActiveModel {
        booking_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            package_id: Set(self.package_id),
            title: Set(self.title),
            travel_date: Set(self.travel_date),
            adults: Set(self.adults),
            children: Set(self.children),
            unit_price: Set(self.unit_price),
            quantity: Set(self.quantity),
            subtotal: Set(self.subtotal),
        }
    }
}

impl From<quote_item::Model> for PricedLine {
    fn from(item: quote_item::Model) -> Self {
        // Quote items are copied as-is: the quoted snapshot is what gets booked
        Self {
            package_id: item.package_id,
            title: item.title,
            travel_date: item.travel_date,
            adults: item.adults,
            children: item.children,
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn package(price: Decimal, active: bool) -> package::Model {
        package::Model {
            id: Uuid::new_v4(),
            title: "Cancún todo incluido".to_string(),
            destination: "Cancún".to_string(),
            duration_days: 5,
            price_per_person: price,
            currency_code: "MXN".to_string(),
            is_active: active,
            created_at: Utc::now().into(),
        }
    }

    fn input(package_id: Uuid, adults: i32, children: i32) -> LineItemInput {
        LineItemInput {
            package_id: Some(package_id),
            adults: Some(adults),
            children: Some(children),
            ..Default::default()
        }
    }

    #[test]
    fn subtotal_is_unit_price_times_travellers() {
        let subtotal = line_subtotal(Decimal::new(125050, 2), 2, 1).unwrap();
        assert_eq!(subtotal, Decimal::new(375150, 2));
        assert_eq!(line_subtotal(Decimal::from(900), 0, 0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn snapshots_catalog_title_and_price() {
        let pkg = package(Decimal::from(12500), true);
        let lines = price_lines(&[input(pkg.id, 2, 1)], &[pkg.clone()], "MXN").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].title, pkg.title);
        assert_eq!(lines[0].unit_price, Decimal::from(12500));
        assert_eq!(lines[0].quantity, LINE_QUANTITY);
        assert_eq!(lines[0].subtotal, Decimal::from(37500));
    }

    #[test]
    fn client_price_and_title_override_catalog() {
        let pkg = package(Decimal::from(12500), true);
        let mut line = input(pkg.id, 1, 0);
        line.unit_price = Some(Decimal::new(9999_999, 3));
        line.title = Some("  Cancún luna de miel ".to_string());

        let lines = price_lines(&[line], &[pkg], "USD").unwrap();
        assert_eq!(lines[0].title, "Cancún luna de miel");
        assert_eq!(lines[0].unit_price, Decimal::new(1000000, 2));
        assert_eq!(lines[0].subtotal, lines[0].unit_price);
    }

    #[test]
    fn total_is_sum_of_subtotals() {
        let a = package(Decimal::from(100), true);
        let b = package(Decimal::new(5025, 2), true);
        let catalog = vec![a.clone(), b.clone()];

        let lines = price_lines(&[input(a.id, 2, 0), input(b.id, 1, 2)], &catalog, "MXN").unwrap();
        for line in &lines {
            assert_eq!(
                line.subtotal,
                line_subtotal(line.unit_price, line.adults, line.children).unwrap()
            );
        }
        assert_eq!(total_of(&lines).unwrap(), Decimal::new(35075, 2));
    }

    #[test]
    fn rejects_unknown_and_inactive_packages() {
        let pkg = package(Decimal::from(100), false);
        let err = price_lines(&[input(pkg.id, 1, 0)], &[pkg], "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = price_lines(&[input(Uuid::new_v4(), 1, 0)], &[], "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("Unknown package")));
    }

    #[test]
    fn rejects_missing_package_id_and_bad_counts() {
        let err = price_lines(&[LineItemInput::default()], &[], "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "missing required fields"));

        let pkg = package(Decimal::from(100), true);
        let catalog = vec![pkg.clone()];
        assert!(price_lines(&[input(pkg.id, -1, 2)], &catalog, "MXN").is_err());
        assert!(price_lines(&[input(pkg.id, 0, 0)], &catalog, "MXN").is_err());

        let mut negative = input(pkg.id, 1, 0);
        negative.unit_price = Some(Decimal::from(-5));
        assert!(price_lines(&[negative], &catalog, "MXN").is_err());
    }

    #[test]
    fn traveller_counts_cannot_overflow_into_a_negative_subtotal() {
        let pkg = package(Decimal::from(100), true);
        let catalog = vec![pkg.clone()];

        let mut line = input(pkg.id, i32::MAX, 1);
        line.unit_price = Some(Decimal::new(1, 2));
        let err = price_lines(&[line], &catalog, "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("at most")));

        let at_cap = input(pkg.id, limits::MAX_TRAVELLERS_PER_LINE, 0);
        assert!(price_lines(&[at_cap], &catalog, "MXN").is_ok());
        let over_cap = input(pkg.id, limits::MAX_TRAVELLERS_PER_LINE, 1);
        assert!(price_lines(&[over_cap], &catalog, "MXN").is_err());

        assert!(line_subtotal(Decimal::ONE, i32::MAX, 1).is_err());
    }

    #[test]
    fn huge_prices_are_rejected_not_panicking() {
        let pkg = package(Decimal::from(100), true);
        let catalog = vec![pkg.clone()];

        let mut line = input(pkg.id, 2, 0);
        line.unit_price = Some(Decimal::MAX);
        let err = price_lines(&[line], &catalog, "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("Unit price exceeds")));

        // Each line fits the column but their product or sum does not
        let mut line = input(pkg.id, 2, 0);
        line.unit_price = Some(limits::max_money());
        assert!(price_lines(&[line], &catalog, "MXN").is_err());

        let mut half = input(pkg.id, 1, 0);
        half.unit_price = Some(Decimal::new(600_000_000_000, 2));
        let lines = price_lines(&[half.clone(), half], &catalog, "MXN").unwrap();
        assert!(matches!(total_of(&lines), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn long_titles_are_rejected() {
        let pkg = package(Decimal::from(100), true);
        let mut line = input(pkg.id, 1, 0);
        line.title = Some("x".repeat(limits::TITLE_MAX_LEN + 1));

        let err = price_lines(&[line], &[pkg], "MXN").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("title must be")));
    }

    #[test]
    fn catalog_price_requires_matching_currency() {
        let pkg = package(Decimal::from(100), true);
        let err = price_lines(&[input(pkg.id, 1, 0)], &[pkg], "USD").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn package_ids_are_deduplicated() {
        let id = Uuid::new_v4();
        let inputs = vec![input(id, 1, 0), input(id, 2, 0), LineItemInput::default()];
        assert_eq!(package_ids(&inputs), vec![id]);
    }

    #[test]
    fn quote_item_copies_keep_snapshot() {
        let item = quote_item::Model {
            id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            title: "Chichén Itzá y cenotes".to_string(),
            travel_date: None,
            adults: 2,
            children: 0,
            unit_price: Decimal::from(3800),
            quantity: 1,
            subtotal: Decimal::from(7600),
        };

        let line = PricedLine::from(item.clone());
        assert_eq!(line.subtotal, item.subtotal);
        assert_eq!(line.package_id, item.package_id);
    }
}

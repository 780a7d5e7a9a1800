pub mod booking;
pub mod booking_item;
pub mod customer;
pub mod package;
pub mod payment;
pub mod quote;
pub mod quote_item;

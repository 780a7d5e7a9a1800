pub mod bookings;
pub mod catalog;
pub mod payments;
pub mod quotes;

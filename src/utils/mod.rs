pub mod limits;
pub mod pricing;

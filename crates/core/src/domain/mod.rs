pub mod calendar;
pub mod product;
pub mod records;
pub mod week;

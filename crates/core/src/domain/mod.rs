pub mod calendar;
pub mod market;
pub mod news;

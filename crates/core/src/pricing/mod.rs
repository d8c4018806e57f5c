pub mod calculator;
pub mod tier;

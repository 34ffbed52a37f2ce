pub mod expression;
pub mod period;

pub use expression::parse_expression;
pub use period::{DateRange, Period, PeriodType};

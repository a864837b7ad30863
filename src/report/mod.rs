pub mod daily;
pub mod monthly;

pub use {daily::DailyTable, monthly::MonthlyTable};

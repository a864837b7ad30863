pub mod cweeds;
pub mod help_input;

pub use {
    cweeds::{CweedsFormat, StationHeader, TimeFormat, WeatherDataset},
    help_input::{HelpInput, HelpInputKind},
};

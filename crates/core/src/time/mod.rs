pub mod relative;

use chrono::NaiveDate;

/// The process-local calendar date; daily counters roll over when it changes.
pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

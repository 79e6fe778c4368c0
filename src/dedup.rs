use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::store::TransactionStore;

/// True when the store already holds the same amount dated within one day
/// either side of `date`. Two genuine same-amount purchases on adjacent days
/// are reported as duplicates.
///
/// Fails open: an unparseable amount or date, or a store error, yields
/// `false` so the message still reaches the store.
pub fn is_duplicate<S: TransactionStore + ?Sized>(store: &S, amount: &str, date: &str) -> bool {
    let Ok(value) = amount.trim().parse::<f64>() else {
        debug!(amount, "dedup skipped: amount is not numeric");
        return false;
    };
    if !value.is_finite() {
        return false;
    }
    let Ok(day) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
        debug!(date, "dedup skipped: date is not YYYY-MM-DD");
        return false;
    };

    let start = (day - Duration::days(1)).format("%Y-%m-%d").to_string();
    let end = (day + Duration::days(1)).format("%Y-%m-%d").to_string();
    match store.has_amount_between(value, &start, &end) {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, amount, date, "duplicate check failed; treating as new");
            false
        }
    }
}

//! Repository layer: table-scoped database operations.
//!
//! Functions take a plain `&Connection` so callers can run them inside a
//! transaction (`Transaction` derefs to `Connection`).

mod admission;
mod feedback;
mod letter;
mod request_log;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::DatabaseError;

pub use admission::*;
pub use feedback::*;
pub use letter::*;
pub use request_log::*;

const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fixed-width UTC timestamps so lexical order in SQL equals time order.
pub(crate) fn encode_utc(ts: &DateTime<Utc>) -> String {
    ts.format(UTC_FORMAT).to_string()
}

pub(crate) fn decode_utc(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidTimestamp {
            field: field.into(),
            value: value.into(),
        })
}

pub(crate) fn encode_local(ts: &NaiveDateTime) -> String {
    ts.format(LOCAL_FORMAT).to_string()
}

pub(crate) fn decode_local(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, LOCAL_FORMAT).map_err(|_| DatabaseError::InvalidTimestamp {
        field: field.into(),
        value: value.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn utc_encoding_sorts_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 4, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap();
        assert!(encode_utc(&early) < encode_utc(&late));
        assert_eq!(decode_utc("t", &encode_utc(&late)).unwrap(), late);
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let err = decode_local("admitted_at", "gisteren").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidTimestamp { .. }));
    }
}

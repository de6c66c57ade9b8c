use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

const RUN_STAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");
const DATE_PARTITION: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Local wall-clock time, falling back to UTC when the local offset cannot be
/// determined (e.g. multi-threaded runtimes on some Unix platforms).
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `YYYY-MM-DD-HH-MM-SS`, shared by all files of one production run.
pub fn run_stamp(at: OffsetDateTime) -> String {
    at.format(RUN_STAMP).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// `YYYY-MM-DD`, used as the remote key partition.
pub fn date_partition(at: OffsetDateTime) -> String {
    at.format(DATE_PARTITION).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

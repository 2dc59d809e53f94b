use chrono::Weekday;

pub const COL_BRANCH: &str = "branch";
pub const COL_CATEGORY: &str = "category";
pub const COL_DATE: &str = "date";
pub const COL_TIME: &str = "time";
pub const COL_UNIT_PRICE: &str = "unit_price";
pub const COL_QUANTITY: &str = "quantity";
pub const COL_RATING: &str = "rating";
pub const COL_PAYMENT_METHOD: &str = "payment_method";
pub const COL_HOUR: &str = "hour";
pub const COL_WEEKDAY: &str = "weekday";
pub const COL_TOTAL: &str = "total";

/// Columns the source file must carry (after header normalization).
pub const REQUIRED_COLUMNS: [&str; 8] = [
    COL_BRANCH,
    COL_CATEGORY,
    COL_DATE,
    COL_TIME,
    COL_UNIT_PRICE,
    COL_QUANTITY,
    COL_RATING,
    COL_PAYMENT_METHOD,
];

/// Column order of the cleaned table.
pub const CLEANED_COLUMNS: [&str; 11] = [
    COL_BRANCH,
    COL_CATEGORY,
    COL_DATE,
    COL_TIME,
    COL_UNIT_PRICE,
    COL_QUANTITY,
    COL_RATING,
    COL_PAYMENT_METHOD,
    COL_HOUR,
    COL_WEEKDAY,
    COL_TOTAL,
];

/// Fixed presentation order for weekday groupings, Monday first.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const HOURS_PER_DAY: usize = 24;

/// Header normalization applied once at load time: trim + ASCII lowercase.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Row index of a weekday label in the fixed Monday..Sunday order.
pub fn weekday_index(label: &str) -> Option<usize> {
    WEEKDAYS.iter().position(|day| *day == label)
}

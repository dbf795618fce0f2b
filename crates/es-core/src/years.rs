use core::ops::RangeInclusive;

/// First year row of a result matrix.
pub const YEARS_START: i32 = 2025;

/// Last year row of a result matrix (inclusive).
pub const YEARS_END: i32 = 2084;

/// Years accepted in artifact file names. Wider than the matrix range, so a
/// parsed year can still be rejected when its result is written.
pub const FILENAME_YEARS: RangeInclusive<i32> = 2020..=2084;

/// Number of header rows above the first year row.
pub const HEADER_ROWS: usize = 2;

pub fn matrix_years() -> RangeInclusive<i32> {
    YEARS_START..=YEARS_END
}

pub fn in_matrix_range(year: i32) -> bool {
    matrix_years().contains(&year)
}

/// Parse a four digit year token bounded to [`FILENAME_YEARS`].
pub fn parse_year_token(token: &str) -> Option<i32> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token.parse().ok()?;
    FILENAME_YEARS.contains(&year).then_some(year)
}

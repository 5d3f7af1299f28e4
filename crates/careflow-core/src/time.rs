use time::OffsetDateTime;

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Offsets `from` by a (possibly fractional) number of hours.
///
/// Returns `None` when the offset is not finite or the result is out of range.
pub fn add_hours(from: OffsetDateTime, hours: f64) -> Option<OffsetDateTime> {
    if !hours.is_finite() {
        return None;
    }
    let offset = time::Duration::checked_seconds_f64(hours * 3600.0)?;
    from.checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_add_whole_hours() {
        let start = datetime!(2026-01-15 08:00 UTC);
        assert_eq!(add_hours(start, 24.0), Some(datetime!(2026-01-16 08:00 UTC)));
    }

    #[test]
    fn test_add_fractional_hours() {
        let start = datetime!(2026-01-15 08:00 UTC);
        assert_eq!(add_hours(start, 1.5), Some(datetime!(2026-01-15 09:30 UTC)));
    }

    #[test]
    fn test_add_non_finite_hours() {
        let start = datetime!(2026-01-15 08:00 UTC);
        assert_eq!(add_hours(start, f64::NAN), None);
        assert_eq!(add_hours(start, f64::INFINITY), None);
    }

    #[test]
    fn test_add_hours_out_of_range() {
        let start = datetime!(2026-01-15 08:00 UTC);
        assert_eq!(add_hours(start, 2_562_047_788_015_215.5), None);
        assert_eq!(add_hours(start, 1e300), None);
        assert_eq!(add_hours(start, 1e12), None);
    }
}

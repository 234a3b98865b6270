use chrono_tz::Tz;

use crate::error::TimezoneError;

/// Resolve an IANA time-zone name. An empty name means UTC.
pub fn resolve_location(name: &str) -> Result<Tz, TimezoneError> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("utc") {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>().map_err(|e| TimezoneError {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_utc_resolve_to_utc() {
        assert_eq!(resolve_location("").unwrap(), Tz::UTC);
        assert_eq!(resolve_location("UTC").unwrap(), Tz::UTC);
        assert_eq!(resolve_location("utc").unwrap(), Tz::UTC);
    }

    #[test]
    fn iana_names_resolve() {
        assert_eq!(resolve_location("Europe/Berlin").unwrap(), Tz::Europe__Berlin);
    }

    #[test]
    fn unknown_names_fail() {
        let err = resolve_location("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err.name, "Mars/Olympus_Mons");
        assert!(err.to_string().starts_with("unknown time zone 'Mars/Olympus_Mons'"));
    }
}

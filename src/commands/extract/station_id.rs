/// A polling-station identifier such as `45` or `112A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StationId {
    pub raw: String,
    pub number: u32,
    /// Empty or a single uppercase ASCII letter.
    pub suffix: String,
}

/// Splits `<digits><optional letter>` into its number and upper-cased suffix.
///
/// Returns `None` for anything else, including digit runs too long for `u32`.
pub(crate) fn parse_station_id(raw: &str) -> Option<StationId> {
    let raw = raw.trim();
    let digits_end = raw
        .char_indices()
        .find(|(_, character)| !character.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(raw.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, rest) = raw.split_at(digits_end);
    let mut rest_chars = rest.chars();
    let suffix = match (rest_chars.next(), rest_chars.next()) {
        (None, _) => String::new(),
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            letter.to_ascii_uppercase().to_string()
        }
        _ => return None,
    };

    let number = digits.parse::<u32>().ok()?;

    Some(StationId {
        raw: raw.to_string(),
        number,
        suffix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_ids() {
        let plain = parse_station_id("45").expect("plain id");
        assert_eq!(plain.number, 45);
        assert_eq!(plain.suffix, "");

        let suffixed = parse_station_id("112a").expect("suffixed id");
        assert_eq!(suffixed.raw, "112a");
        assert_eq!(suffixed.number, 112);
        assert_eq!(suffixed.suffix, "A");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(parse_station_id("").is_none());
        assert!(parse_station_id("A12").is_none());
        assert!(parse_station_id("12AB").is_none());
        assert!(parse_station_id("12 A").is_none());
        assert!(parse_station_id("99999999999").is_none());
    }
}

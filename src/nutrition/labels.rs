//! Display labels for nutriment keys and component ids

/// Replace `-` and `_` with spaces
pub fn normalize_separators(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect()
}

/// Upper-case each letter that follows a non-letter, lower-case the rest
///
/// Digits and punctuation start a new word as well as whitespace, so
/// `"c18:3"` becomes `"C18:3"` and `"3d"` becomes `"3D"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;

    for c in text.chars() {
        if !c.is_alphabetic() {
            out.push(c);
            prev_is_letter = false;
        } else if prev_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
            prev_is_letter = true;
        }
    }

    out
}

/// `"energy-kcal"` -> `"Energy Kcal"`, `"saturated_fat"` -> `"Saturated Fat"`
pub fn display_label(raw: &str) -> String {
    title_case(&normalize_separators(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("energy-kcal"), "Energy Kcal");
        assert_eq!(display_label("saturated_fat"), "Saturated Fat");
        assert_eq!(display_label("fruits-vegetables-nuts-estimate"), "Fruits Vegetables Nuts Estimate");
        assert_eq!(display_label("SODIUM"), "Sodium");
        assert_eq!(display_label(""), "");
    }

    #[test]
    fn test_label_derivation_is_idempotent() {
        for raw in ["energy-kcal", "saturated_fat", "vitamin-b12", "Mixed_Case-key", "  spaced  out ", "x"] {
            let once = display_label(raw);
            let twice = display_label(&once);
            assert_eq!(once, twice, "label for {:?} changed on re-application", raw);
        }
    }

    #[test]
    fn test_title_case_keeps_digits() {
        assert_eq!(title_case("vitamin b12"), "Vitamin B12");
        assert_eq!(title_case("omega 3"), "Omega 3");
    }

    #[test]
    fn test_title_case_restarts_after_digits_and_punctuation() {
        assert_eq!(title_case("3d"), "3D");
        assert_eq!(title_case("c18:3"), "C18:3");
        assert_eq!(title_case("fatty-acids c20:5 n3"), "Fatty-Acids C20:5 N3");
        assert_eq!(display_label("polyunsaturated-fat_c18:2n6"), "Polyunsaturated Fat C18:2N6");
    }
}

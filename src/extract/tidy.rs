const TIDY_CHARS: [char; 6] = [',', '.', '(', ')', '+', '-'];

/// Blank out punctuation that the card sheets sprinkle through their labels.
pub fn tidy(value: &str) -> String {
    value.replace(TIDY_CHARS, " ").trim().to_string()
}

/// Card tags are printed as "Vehicle # 12"; the canonical form is "Vehicle #12".
pub fn tidy_tag(value: &str) -> String {
    tidy(value).replace("# ", "#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_blanks_punctuation_and_trims() {
        assert_eq!(tidy("  Type 97A (TE-KE).  "), "Type 97A  TE KE");
        assert_eq!(tidy("M2A1+"), "M2A1");
        assert_eq!(tidy("7.5cm, leIG"), "7 5cm  leIG");
        assert_eq!(tidy(""), "");
    }

    #[test]
    fn tidy_is_idempotent() {
        let samples = [
            "Vehicle #1",
            " (Moldovia) ",
            "-.-",
            "8.8cm FlaK 18 (g)",
            "Bofors 40mm L/60 - LF",
            "\tname,\n",
        ];
        for sample in samples {
            let once = tidy(sample);
            assert_eq!(tidy(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn tidy_tag_collapses_space_after_hash() {
        assert_eq!(tidy_tag("Vehicle # 12."), "Vehicle #12");
        assert_eq!(tidy_tag("Ordnance #1"), "Ordnance #1");
    }
}

use regex::Regex;
use std::sync::LazyLock;

/// Organizational filler words stripped before names are compared.
pub const STOPWORDS: &[&str] = &[
    "ASSOCIATION",
    "AMICALE",
    "CLUB",
    "SYNDICAT",
    "FEDERATION",
    "DE",
    "DU",
    "DES",
    "LA",
    "LE",
    "LES",
    "ET",
    "POUR",
    "EN",
];

static STOPWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", STOPWORDS.join("|"))).expect("valid stopword pattern")
});

/// Uppercase `name`, drop every stopword occurring as a whole word, then trim.
///
/// Interior whitespace left behind by a removed word is kept as is, so
/// "CLUB SPORTIF DU VILLAGE" and "SPORTIF VILLAGE" stay distinct and only the
/// approximate strategy can pair them. A coarse heuristic: "L'ASSOCIATION"
/// loses its stopword too because the apostrophe is a word boundary.
pub fn name_clean(name: &str) -> String {
    let upper = name.to_uppercase();
    STOPWORD_PATTERN.replace_all(&upper, "").trim().to_string()
}

/// Length in characters, the unit the length floors are expressed in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_clean_strips_stopwords() {
        assert_eq!(name_clean("ASSOCIATION DES AMIS DU PARC"), "AMIS  PARC");
        assert_eq!(name_clean("AMIS DU PARC"), "AMIS  PARC");
        assert_eq!(name_clean("club sportif du village"), "SPORTIF  VILLAGE");
        assert_eq!(name_clean("SPORTIF VILLAGE ASSOCIATION"), "SPORTIF VILLAGE");
        assert_eq!(name_clean("LE CLUB"), "");
    }

    #[test]
    fn test_name_clean_whole_words_only() {
        // DELTA starts with DE, LESTE with LES: neither is a whole-word match
        assert_eq!(name_clean("DELTA LESTE"), "DELTA LESTE");
        assert_eq!(name_clean("CLUBHOUSE"), "CLUBHOUSE");
    }

    #[test]
    fn test_name_clean_can_empty_a_name() {
        assert_eq!(name_clean("ASSOCIATION DE LA"), "");
        assert_eq!(name_clean("LA BOULE ET LE CERCLE"), "BOULE   CERCLE");
        assert_eq!(name_clean("   "), "");
    }

    #[test]
    fn test_name_clean_apostrophe_boundary() {
        assert_eq!(name_clean("L'ASSOCIATION SPORTIVE"), "L' SPORTIVE");
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert_eq!(char_len("ÉCOLE"), 5);
        assert_eq!(char_len(""), 0);
    }
}

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Monitored regions. Used to seed the coverage table and to scope the
/// regional temporal analyses.
pub const REGIONS: [&str; 5] = ["Asia", "Europe", "Middle East", "Africa", "Americas"];

/// Language registry: ISO 639-1 code -> (English name, region).
static LANGUAGES: Lazy<BTreeMap<&'static str, (&'static str, &'static str)>> = Lazy::new(|| {
    BTreeMap::from([
        ("en", ("English", "Americas")),
        ("ru", ("Russian", "Europe")),
        ("tr", ("Turkish", "Middle East")),
        ("ar", ("Arabic", "Middle East")),
        ("fa", ("Persian", "Middle East")),
        ("he", ("Hebrew", "Middle East")),
        ("ka", ("Georgian", "Asia")),
        ("hy", ("Armenian", "Asia")),
        ("az", ("Azerbaijani", "Asia")),
        ("kk", ("Kazakh", "Asia")),
        ("uz", ("Uzbek", "Asia")),
        ("tk", ("Turkmen", "Asia")),
        ("ky", ("Kyrgyz", "Asia")),
        ("tg", ("Tajik", "Asia")),
        ("zh", ("Chinese", "Asia")),
        ("ja", ("Japanese", "Asia")),
        ("ko", ("Korean", "Asia")),
        ("hi", ("Hindi", "Asia")),
        ("bn", ("Bengali", "Asia")),
        ("ur", ("Urdu", "Middle East")),
        ("th", ("Thai", "Asia")),
        ("id", ("Indonesian", "Asia")),
        ("ms", ("Malay", "Asia")),
        ("vi", ("Vietnamese", "Asia")),
        ("tl", ("Filipino", "Asia")),
        ("mn", ("Mongolian", "Asia")),
        ("de", ("German", "Europe")),
        ("fr", ("French", "Europe")),
        ("es", ("Spanish", "Europe")),
        ("pt", ("Portuguese", "Europe")),
        ("it", ("Italian", "Europe")),
        ("pl", ("Polish", "Europe")),
        ("uk", ("Ukrainian", "Europe")),
        ("nl", ("Dutch", "Europe")),
        ("sv", ("Swedish", "Europe")),
        ("no", ("Norwegian", "Europe")),
        ("da", ("Danish", "Europe")),
        ("fi", ("Finnish", "Europe")),
        ("et", ("Estonian", "Europe")),
        ("lv", ("Latvian", "Europe")),
        ("lt", ("Lithuanian", "Europe")),
        ("ro", ("Romanian", "Europe")),
        ("bg", ("Bulgarian", "Europe")),
        ("hr", ("Croatian", "Europe")),
        ("sr", ("Serbian", "Europe")),
        ("sk", ("Slovak", "Europe")),
        ("sl", ("Slovenian", "Europe")),
        ("cs", ("Czech", "Europe")),
        ("hu", ("Hungarian", "Europe")),
        ("el", ("Greek", "Europe")),
        ("sw", ("Swahili", "Africa")),
        ("am", ("Amharic", "Africa")),
        ("yo", ("Yoruba", "Africa")),
        ("zu", ("Zulu", "Africa")),
        ("af", ("Afrikaans", "Africa")),
        ("ht", ("Haitian Creole", "Americas")),
    ])
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub region: Option<&'static str>,
}

impl Language {
    /// Resolves a language code against the registry. Unknown codes are
    /// accepted; the code itself stands in for the name and no region is
    /// attributed.
    pub fn resolve(code: &str) -> Language {
        match LANGUAGES.get(code) {
            Some((name, region)) => Language {
                code: code.to_string(),
                name: (*name).to_string(),
                region: Some(*region),
            },
            None => Language {
                code: code.to_string(),
                name: code.to_string(),
                region: None,
            },
        }
    }

    /// All registered languages, in code order.
    pub fn all() -> impl Iterator<Item = Language> {
        LANGUAGES.keys().map(|code| Language::resolve(code))
    }
}

/// Fixed dispatch priority classes for resource-constrained fan-out.
///
/// Lower is dispatched earlier: neighboring/primary languages, then
/// secondary-region languages, then major world languages, then Southeast
/// Asia, then everything else. Ties keep original list order.
pub fn priority(code: &str) -> u8 {
    match code {
        "tr" | "ru" | "fa" | "ka" | "hy" => 1,
        "kk" | "uz" | "tk" | "ky" | "tg" => 2,
        "en" | "ar" | "zh" | "de" | "fr" => 3,
        "th" | "id" | "ms" | "vi" | "tl" => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_language() {
        let lang = Language::resolve("tr");
        assert_eq!(lang.name, "Turkish");
        assert_eq!(lang.region, Some("Middle East"));
    }

    #[test]
    fn resolve_unknown_language_falls_back_to_code() {
        let lang = Language::resolve("xx");
        assert_eq!(lang.name, "xx");
        assert_eq!(lang.region, None);
    }

    #[test]
    fn priority_classes_are_ordered() {
        assert!(priority("tr") < priority("kk"));
        assert!(priority("kk") < priority("en"));
        assert!(priority("en") < priority("th"));
        assert!(priority("th") < priority("sw"));
    }

    #[test]
    fn every_registered_region_is_known() {
        for lang in Language::all() {
            let region = lang.region.expect("registered languages carry a region");
            assert!(REGIONS.contains(&region), "unknown region {region}");
        }
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    /// Maps a host language tag (`es`, `es-MX`, `EN_us`) onto a supported locale,
    /// falling back to English.
    pub fn from_language_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();
        primary.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language_tags() {
        assert_eq!(Locale::from_language_tag("es-MX"), Locale::Es);
        assert_eq!(Locale::from_language_tag("EN_us"), Locale::En);
        assert_eq!(Locale::from_language_tag("fr"), Locale::En);
        assert_eq!(Locale::from_language_tag(""), Locale::En);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Locale::Es.to_string(), "es");
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of a tag or post record.
///
/// `Rising` marks synthetic records produced locally, such as pseudo-tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    E621,
    Danbooru,
    Gelbooru,
    Rule34,
    Rising,
}

impl Source {
    /// Returns the lowercase identifier used in keys and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E621 => "e621",
            Self::Danbooru => "danbooru",
            Self::Gelbooru => "gelbooru",
            Self::Rule34 => "rule34",
            Self::Rising => "rising",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    /// Parses a source name. `e926` is e621's safe mirror and shares its data.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e621" | "e926" => Ok(Self::E621),
            "danbooru" => Ok(Self::Danbooru),
            "gelbooru" => Ok(Self::Gelbooru),
            "rule34" => Ok(Self::Rule34),
            "rising" => Ok(Self::Rising),
            other => Err(format!("unsupported source '{other}'")),
        }
    }
}

/// Content rating of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "s")]
    Safe,
    #[serde(rename = "q")]
    Questionable,
    #[serde(rename = "e")]
    Explicit,
}

impl Rating {
    /// Every rating, mildest first.
    pub const ALL: [Rating; 3] = [Rating::Safe, Rating::Questionable, Rating::Explicit];

    /// Parses the rating spellings used across sources.
    ///
    /// Accepts single-letter codes and full words. `sensitive` counts as
    /// questionable; anything unrecognized is treated as explicit.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "s" | "safe" | "g" | "general" => Self::Safe,
            "q" | "questionable" | "sensitive" => Self::Questionable,
            _ => Self::Explicit,
        }
    }

    /// Returns the word used in pseudo-tag labels.
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Questionable => "questionable",
            Self::Explicit => "explicit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_json() {
        let json = serde_json::to_string(&Source::Rule34).unwrap();
        assert_eq!(json, r#""rule34""#);
        assert_eq!(serde_json::from_str::<Source>(&json).unwrap(), Source::Rule34);
    }

    #[test]
    fn e926_parses_as_e621() {
        assert_eq!("e926".parse::<Source>(), Ok(Source::E621));
        assert_eq!("E621".parse::<Source>(), Ok(Source::E621));
        assert!("pixiv".parse::<Source>().is_err());
    }

    #[test]
    fn rating_uses_letter_codes() {
        assert_eq!(serde_json::to_string(&Rating::Safe).unwrap(), r#""s""#);
        assert_eq!(serde_json::from_str::<Rating>(r#""e""#).unwrap(), Rating::Explicit);
    }

    #[test]
    fn lenient_rating_parsing() {
        assert_eq!(Rating::parse_lenient("safe"), Rating::Safe);
        assert_eq!(Rating::parse_lenient("q"), Rating::Questionable);
        assert_eq!(Rating::parse_lenient("sensitive"), Rating::Questionable);
        assert_eq!(Rating::parse_lenient("explicit"), Rating::Explicit);
        assert_eq!(Rating::parse_lenient("unknown"), Rating::Explicit);
    }
}

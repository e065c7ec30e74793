//! Supported municipalities
//!
//! Each city has a command-line key and the name the street catalog files
//! its records under.

use crate::errors::IngestError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum City {
    Jerusalem,
    TelAviv,
    Haifa,
    RishonLeZion,
    PetahTikva,
    Ashdod,
    Netanya,
    BeerSheva,
    BneiBrak,
    Holon,
    RamatGan,
    Ashkelon,
    Rehovot,
    Herzliya,
    KfarSaba,
    Eilat,
    Nazareth,
    Tiberias,
}

impl City {
    pub const ALL: [City; 18] = [
        City::Jerusalem,
        City::TelAviv,
        City::Haifa,
        City::RishonLeZion,
        City::PetahTikva,
        City::Ashdod,
        City::Netanya,
        City::BeerSheva,
        City::BneiBrak,
        City::Holon,
        City::RamatGan,
        City::Ashkelon,
        City::Rehovot,
        City::Herzliya,
        City::KfarSaba,
        City::Eilat,
        City::Nazareth,
        City::Tiberias,
    ];

    /// Command-line key
    pub fn key(self) -> &'static str {
        match self {
            City::Jerusalem => "jerusalem",
            City::TelAviv => "telaviv",
            City::Haifa => "haifa",
            City::RishonLeZion => "rishonlezion",
            City::PetahTikva => "petahtikva",
            City::Ashdod => "ashdod",
            City::Netanya => "netanya",
            City::BeerSheva => "beersheva",
            City::BneiBrak => "bneibrak",
            City::Holon => "holon",
            City::RamatGan => "ramatgan",
            City::Ashkelon => "ashkelon",
            City::Rehovot => "rehovot",
            City::Herzliya => "herzliya",
            City::KfarSaba => "kfarsaba",
            City::Eilat => "eilat",
            City::Nazareth => "nazareth",
            City::Tiberias => "tiberias",
        }
    }

    /// `city_name` value in the catalog
    pub fn catalog_name(self) -> &'static str {
        match self {
            City::Jerusalem => "ירושלים",
            City::TelAviv => "תל אביב - יפו",
            City::Haifa => "חיפה",
            City::RishonLeZion => "ראשון לציון",
            City::PetahTikva => "פתח תקווה",
            City::Ashdod => "אשדוד",
            City::Netanya => "נתניה",
            City::BeerSheva => "באר שבע",
            City::BneiBrak => "בני ברק",
            City::Holon => "חולון",
            City::RamatGan => "רמת גן",
            City::Ashkelon => "אשקלון",
            City::Rehovot => "רחובות",
            City::Herzliya => "הרצליה",
            City::KfarSaba => "כפר סבא",
            City::Eilat => "אילת",
            City::Nazareth => "נצרת",
            City::Tiberias => "טבריה",
        }
    }

    /// Comma-separated list of keys, for error messages
    pub fn supported_keys() -> String {
        City::ALL
            .iter()
            .map(|city| city.key())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for City {
    type Err = IngestError;

    /// Case-insensitive; `-`, `_` and spaces are ignored ("Tel-Aviv" == "telaviv")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        City::ALL
            .iter()
            .copied()
            .find(|city| city.key() == normalized)
            .ok_or_else(|| {
                IngestError::InvalidCity(format!(
                    "'{}' is not supported (expected one of: {})",
                    s,
                    City::supported_keys()
                ))
            })
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        assert_eq!("telaviv".parse::<City>().unwrap(), City::TelAviv);
        assert_eq!("Tel-Aviv".parse::<City>().unwrap(), City::TelAviv);
        assert_eq!("BEER_SHEVA".parse::<City>().unwrap(), City::BeerSheva);
    }

    #[test]
    fn test_unknown_city_rejected() {
        let err = "atlantis".parse::<City>().unwrap_err();
        assert!(matches!(err, IngestError::InvalidCity(_)));
        assert!(err.to_string().contains("telaviv"));
        assert!("".parse::<City>().is_err());
    }

    #[test]
    fn test_keys_are_unique_and_round_trip() {
        for city in City::ALL {
            assert_eq!(city.key().parse::<City>().unwrap(), city);
            assert!(!city.catalog_name().is_empty());
        }
    }
}

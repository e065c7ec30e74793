use serde::{Deserialize, Deserializer, Serialize};

/// Entry of a city listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetSummary {
    #[serde(rename = "streetId")]
    pub street_id: u64,
}

/// Full street record, the unit moved from catalog to store.
///
/// Field names are the wire names; only `streetId` is camel-cased. The
/// catalog leaves status and official code null for some streets; those
/// travel as JSON null but must still be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreetDetail {
    #[serde(rename = "streetId")]
    pub street_id: u64,
    pub region_code: u32,
    pub region_name: String,
    pub city_code: u32,
    pub city_name: String,
    pub street_code: u32,
    pub street_name: String,
    #[serde(deserialize_with = "present")]
    pub street_name_status: Option<String>,
    #[serde(deserialize_with = "present")]
    pub official_code: Option<u64>,
}

/// Nullable but not optional: a missing key is still an error
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer)
}

//! Sink-bound documents and the builders that resolve records into them.
//!
//! Field keys are single letters (plus `_id`). Zero and empty
//! values are omitted on serialization, so an unresolved reference (id 0) simply
//! has no key in the written document.

use crate::index::GeoIndex;
use crate::models::{AdminRec, Collection, CountryRec, FeatureRec, PlaceRec, PostalRec, TimezoneRec};
use crate::names::title_case;
use crate::stats::UnresolvedCounts;
use serde::Serialize;
use std::collections::BTreeMap;

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimezoneDoc {
    #[serde(rename = "_id")]
    pub id: u32,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "g", skip_serializing_if = "is_zero_f64")]
    pub offset_gmt: f64,
    #[serde(rename = "d", skip_serializing_if = "is_zero_f64")]
    pub offset_dst: f64,
    #[serde(rename = "r", skip_serializing_if = "is_zero_f64")]
    pub offset_raw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDoc {
    #[serde(rename = "_id")]
    pub id: u32,
    #[serde(rename = "c", skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "d", skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryDoc {
    #[serde(rename = "_id")]
    pub id: u32,
    #[serde(rename = "i", skip_serializing_if = "is_zero_i64")]
    pub geo_id: i64,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "m", skip_serializing_if = "String::is_empty")]
    pub capital: String,
    #[serde(rename = "q", skip_serializing_if = "is_zero_i64")]
    pub area_sq_km: i64,
    #[serde(rename = "p", skip_serializing_if = "is_zero_i64")]
    pub population: i64,
    #[serde(rename = "w", skip_serializing_if = "String::is_empty")]
    pub continent: String,
    #[serde(rename = "t", skip_serializing_if = "String::is_empty")]
    pub tld: String,
    #[serde(rename = "c", skip_serializing_if = "String::is_empty")]
    pub currency_code: String,
    #[serde(rename = "v", skip_serializing_if = "String::is_empty")]
    pub currency_name: String,
    #[serde(rename = "a", skip_serializing_if = "String::is_empty")]
    pub calling_code: String,
    #[serde(rename = "f", skip_serializing_if = "String::is_empty")]
    pub fips: String,
    #[serde(rename = "i2", skip_serializing_if = "String::is_empty")]
    pub iso2: String,
    #[serde(rename = "i3", skip_serializing_if = "String::is_empty")]
    pub iso3: String,
    #[serde(rename = "i1", skip_serializing_if = "String::is_empty")]
    pub iso_num: String,
    #[serde(rename = "z", skip_serializing_if = "String::is_empty")]
    pub postal_format: String,
    #[serde(rename = "r", skip_serializing_if = "String::is_empty")]
    pub postal_regex: String,
    #[serde(rename = "l", skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Neighbour country ids, filled by [`CountryDoc::resolve_neighbors`]
    #[serde(rename = "s", skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<u32>,
    #[serde(skip)]
    pub neighbor_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDoc {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "c", skip_serializing_if = "is_zero_u32")]
    pub country: u32,
    /// Code below the country segment, e.g. `CA` or `CA.037`
    #[serde(rename = "d")]
    pub code: String,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostalDoc {
    #[serde(rename = "_id")]
    pub id: u64,
    #[serde(rename = "z", skip_serializing_if = "String::is_empty")]
    pub postal_code: String,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub place_name: String,
    #[serde(rename = "c", skip_serializing_if = "is_zero_u32")]
    pub country: u32,
    #[serde(rename = "a", skip_serializing_if = "is_zero_i64")]
    pub accuracy: i64,
    #[serde(rename = "l", skip_serializing_if = "Option::is_none")]
    pub lon_lat: Option<[f64; 2]>,
    /// Admin code -> name; a set, not an ordered hierarchy
    #[serde(rename = "d", skip_serializing_if = "BTreeMap::is_empty")]
    pub admins: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceDoc {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "a", skip_serializing_if = "String::is_empty")]
    pub name_ascii: String,
    #[serde(rename = "m", skip_serializing_if = "Vec::is_empty")]
    pub names_alt: Vec<String>,
    #[serde(rename = "l", skip_serializing_if = "Option::is_none")]
    pub lon_lat: Option<[f64; 2]>,
    #[serde(rename = "c", skip_serializing_if = "is_zero_u32")]
    pub country: u32,
    #[serde(rename = "f", skip_serializing_if = "is_zero_u32")]
    pub feature: u32,
    #[serde(rename = "t", skip_serializing_if = "is_zero_u32")]
    pub timezone: u32,
    #[serde(rename = "d", skip_serializing_if = "is_zero_i64")]
    pub admin: i64,
    #[serde(rename = "p", skip_serializing_if = "is_zero_i64")]
    pub population: i64,
    #[serde(rename = "e", skip_serializing_if = "is_zero_i64")]
    pub elevation: i64,
}

/// Any document the pipeline hands to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Timezone(TimezoneDoc),
    Feature(FeatureDoc),
    Country(CountryDoc),
    Admin(AdminDoc),
    Postal(PostalDoc),
    Place(PlaceDoc),
}

impl Document {
    pub fn collection(&self) -> Collection {
        match self {
            Document::Timezone(_) => Collection::Timezones,
            Document::Feature(_) => Collection::Features,
            Document::Country(_) => Collection::Countries,
            Document::Admin(_) => Collection::Admins,
            Document::Postal(_) => Collection::Postals,
            Document::Place(_) => Collection::Places,
        }
    }
}

macro_rules! impl_from_doc {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for Document {
            fn from(doc: $ty) -> Self {
                Document::$variant(doc)
            }
        })*
    };
}

impl_from_doc!(
    Timezone(TimezoneDoc),
    Feature(FeatureDoc),
    Country(CountryDoc),
    Admin(AdminDoc),
    Postal(PostalDoc),
    Place(PlaceDoc),
);

pub fn timezone_doc(id: u32, rec: TimezoneRec) -> TimezoneDoc {
    TimezoneDoc {
        id,
        name: rec.name.replace('_', " "),
        offset_gmt: rec.offset_gmt,
        offset_dst: rec.offset_dst,
        offset_raw: rec.offset_raw,
    }
}

pub fn feature_doc(id: u32, rec: FeatureRec) -> FeatureDoc {
    FeatureDoc {
        id,
        code: rec.code,
        name: rec.name,
        desc: rec.desc,
    }
}

pub fn country_doc(id: u32, rec: CountryRec) -> CountryDoc {
    CountryDoc {
        id,
        geo_id: rec.id,
        name: rec.name,
        capital: rec.capital,
        area_sq_km: rec.area_sq_km,
        population: rec.population,
        continent: rec.continent,
        tld: rec.tld,
        currency_code: rec.currency_code,
        currency_name: rec.currency_name,
        calling_code: rec.calling_code,
        fips: rec.fips,
        iso2: rec.iso2,
        iso3: rec.iso3,
        iso_num: rec.iso_num,
        postal_format: rec.postal_format,
        postal_regex: rec.postal_regex,
        languages: rec.languages,
        neighbors: Vec::new(),
        neighbor_codes: rec.neighbors,
    }
}

impl CountryDoc {
    /// Second pass: neighbours may reference countries later in the file.
    pub fn resolve_neighbors(&mut self, index: &GeoIndex, unresolved: &mut UnresolvedCounts) {
        self.neighbors = index.resolve_neighbors(&self.neighbor_codes);
        unresolved.countries += self.neighbors.iter().filter(|id| **id == 0).count() as u64;
    }
}

/// Builds an admin document, or `None` for a single-segment (country-level) code.
pub fn admin_doc(rec: AdminRec, index: &GeoIndex, unresolved: &mut UnresolvedCounts) -> Option<AdminDoc> {
    let (country_code, rest) = rec.split_code()?;
    let country = index.country_id(country_code);
    if country == 0 {
        unresolved.countries += 1;
    }
    Some(AdminDoc {
        id: rec.id,
        country,
        code: rest.to_string(),
        name: rec.name,
    })
}

pub fn postal_doc(
    id: u64,
    rec: PostalRec,
    index: &GeoIndex,
    title_threshold: usize,
    unresolved: &mut UnresolvedCounts,
) -> PostalDoc {
    let country = index.country_id(&rec.country_code);
    if country == 0 {
        unresolved.countries += 1;
    }

    let mut admins = BTreeMap::new();
    for (name, code) in &rec.admins {
        if !name.is_empty() && !code.is_empty() {
            admins.insert(code.clone(), title_case(name, title_threshold));
        }
    }

    PostalDoc {
        id,
        postal_code: rec.postal_code,
        place_name: title_case(&rec.place_name, title_threshold),
        country,
        accuracy: rec.accuracy,
        lon_lat: rec.lon_lat,
        admins,
    }
}

/// Builds a place document, or `None` when the place has no usable name.
pub fn place_doc(rec: PlaceRec, index: &GeoIndex, unresolved: &mut UnresolvedCounts) -> Option<PlaceDoc> {
    if rec.name.is_empty() {
        return None;
    }

    let country = index.country_id(&rec.country_code);
    let feature = index.feature_id(&rec.feature_key());
    let timezone = index.timezone_id(&rec.timezone);
    let [admin1, admin2, _, _] = &rec.admin_codes;
    let admin = index.resolve_admin(&rec.country_code, admin1, admin2);

    if country == 0 {
        unresolved.countries += 1;
    }
    if feature == 0 {
        unresolved.features += 1;
    }
    if timezone == 0 {
        unresolved.timezones += 1;
    }
    if admin == 0 && !admin1.is_empty() {
        unresolved.admins += 1;
    }

    Some(PlaceDoc {
        id: rec.id,
        name: rec.name,
        name_ascii: rec.name_ascii,
        names_alt: rec.names_alt,
        lon_lat: rec.lon_lat,
        country,
        feature,
        timezone,
        admin,
        population: rec.population,
        elevation: rec.elevation,
    })
}

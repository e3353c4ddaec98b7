use crate::error::MissingFields;
use crate::names::{reconcile_names, split_list};
use std::fmt;

/// Target collections, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Timezones,
    Features,
    Countries,
    Admins,
    Postals,
    Places,
}

impl Collection {
    /// Collection name in the target store
    pub fn name(self) -> &'static str {
        match self {
            Collection::Timezones => "timezones",
            Collection::Features => "features",
            Collection::Countries => "countries",
            Collection::Admins => "admins",
            Collection::Postals => "zips",
            Collection::Places => "places",
        }
    }

    /// Node label used by graph sinks
    pub fn label(self) -> &'static str {
        match self {
            Collection::Timezones => "Timezone",
            Collection::Features => "Feature",
            Collection::Countries => "Country",
            Collection::Admins => "Admin",
            Collection::Postals => "PostalCode",
            Collection::Places => "Place",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// admin1CodesASCII.txt and admin2Codes.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminRec {
    pub code: String,
    pub name: String,
    pub name_ascii: String,
    pub id: i64,
}

// countryInfo.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryRec {
    pub iso2: String,
    pub iso3: String,
    pub iso_num: String,
    pub fips: String,
    pub name: String,
    pub capital: String,
    pub area_sq_km: i64,
    pub population: i64,
    pub continent: String,
    pub tld: String,
    pub currency_code: String,
    pub currency_name: String,
    pub calling_code: String,
    pub postal_format: String,
    pub postal_regex: String,
    pub languages: Vec<String>,
    pub id: i64,
    pub neighbors: Vec<String>,
}

// featureCodes_en.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRec {
    /// `class.code`, e.g. `P.PPLC`
    pub code: String,
    pub name: String,
    pub desc: String,
}

// timeZones.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimezoneRec {
    pub country_code: String,
    pub name: String,
    pub offset_gmt: f64,
    pub offset_dst: f64,
    pub offset_raw: f64,
}

// hierarchy.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyRec {
    pub parent_id: i64,
    pub child_id: i64,
    /// `ADM` for the administrative hierarchy, otherwise a user-defined relation
    pub kind: String,
}

// iso-languagecodes.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageRec {
    pub iso_639_3: String,
    pub iso_639_2: String,
    pub iso_639_1: String,
    pub name: String,
}

// allCountries.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceRec {
    pub id: i64,
    pub name: String,
    pub name_ascii: String,
    pub names_alt: Vec<String>,
    /// `[lon, lat]`, absent when out of range or unparseable
    pub lon_lat: Option<[f64; 2]>,
    pub feature_class: String,
    pub feature_code: String,
    pub country_code: String,
    pub country_codes_alt: Vec<String>,
    pub admin_codes: [String; 4],
    pub population: i64,
    pub elevation: i64,
    pub timezone: String,
}

// zip_allCountries.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostalRec {
    pub country_code: String,
    pub postal_code: String,
    pub place_name: String,
    /// `(name, code)` for admin levels 1..3
    pub admins: [(String, String); 3],
    pub lon_lat: Option<[f64; 2]>,
    pub accuracy: i64,
}

const ADMIN_FIELDS: usize = 4;
const COUNTRY_FIELDS: usize = 18;
const FEATURE_FIELDS: usize = 3;
const TIMEZONE_FIELDS: usize = 5;
const HIERARCHY_FIELDS: usize = 3;
const LANGUAGE_FIELDS: usize = 4;
const PLACE_FIELDS: usize = 19;
const POSTAL_FIELDS: usize = 12;

fn require(fields: &[String], expected: usize) -> Result<(), MissingFields> {
    if fields.len() < expected {
        return Err(MissingFields {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

/// Integer coercion: empty or unparseable yields 0, decimals truncate.
pub fn parse_int(s: &str) -> i64 {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .unwrap_or(0)
}

pub fn parse_float(s: &str) -> f64 {
    s.parse::<f64>().unwrap_or(0.0)
}

/// Builds a `[lon, lat]` pair, discarding anything outside the coordinate domain.
pub fn check_lon_lat(lon: &str, lat: &str) -> Option<[f64; 2]> {
    let lon: f64 = lon.parse().ok()?;
    let lat: f64 = lat.parse().ok()?;
    if (-180.0..180.0).contains(&lon) && (-90.0..90.0).contains(&lat) {
        Some([lon, lat])
    } else {
        None
    }
}

impl AdminRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, ADMIN_FIELDS)?;
        let mut rec = Self {
            code: fields[0].clone(),
            name: fields[1].clone(),
            name_ascii: fields[2].clone(),
            id: parse_int(&fields[3]),
        };
        reconcile_names(&mut rec.name, &mut rec.name_ascii, &mut Vec::new());
        Ok(rec)
    }

    /// Splits `CC.rest` into the country segment and the remainder.
    /// Single-segment codes are country placeholders and yield `None`.
    pub fn split_code(&self) -> Option<(&str, &str)> {
        self.code.split_once('.')
    }
}

impl CountryRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, COUNTRY_FIELDS)?;
        Ok(Self {
            iso2: fields[0].clone(),
            iso3: fields[1].clone(),
            iso_num: fields[2].clone(),
            fips: fields[3].clone(),
            name: fields[4].clone(),
            capital: fields[5].clone(),
            area_sq_km: parse_int(&fields[6]),
            population: parse_int(&fields[7]),
            continent: fields[8].clone(),
            tld: fields[9].clone(),
            currency_code: fields[10].clone(),
            currency_name: fields[11].clone(),
            calling_code: fields[12].clone(),
            postal_format: fields[13].clone(),
            postal_regex: fields[14].clone(),
            languages: split_list(&fields[15]),
            id: parse_int(&fields[16]),
            neighbors: split_list(&fields[17]),
        })
    }
}

impl FeatureRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, FEATURE_FIELDS)?;
        Ok(Self {
            code: fields[0].clone(),
            name: fields[1].clone(),
            desc: fields[2].clone(),
        })
    }
}

impl TimezoneRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, TIMEZONE_FIELDS)?;
        Ok(Self {
            country_code: fields[0].clone(),
            name: fields[1].clone(),
            offset_gmt: parse_float(&fields[2]),
            offset_dst: parse_float(&fields[3]),
            offset_raw: parse_float(&fields[4]),
        })
    }
}

impl HierarchyRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, HIERARCHY_FIELDS)?;
        Ok(Self {
            parent_id: parse_int(&fields[0]),
            child_id: parse_int(&fields[1]),
            kind: fields[2].clone(),
        })
    }
}

impl LanguageRec {
    /// The language file starts with a header row; read it with `skip_header`.
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, LANGUAGE_FIELDS)?;
        Ok(Self {
            iso_639_3: fields[0].clone(),
            iso_639_2: fields[1].clone(),
            iso_639_1: fields[2].clone(),
            name: fields[3].clone(),
        })
    }
}

impl PlaceRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, PLACE_FIELDS)?;
        let n = fields.len();

        // The tail (elevation, dem, timezone, modification date) is addressed from the end.
        let mut elevation = parse_int(&fields[n - 4]);
        if elevation == 0 {
            elevation = parse_int(&fields[n - 3]);
        }

        let mut rec = Self {
            id: parse_int(&fields[0]),
            name: fields[1].clone(),
            name_ascii: fields[2].clone(),
            names_alt: split_list(&fields[3]),
            lon_lat: check_lon_lat(&fields[5], &fields[4]),
            feature_class: fields[6].clone(),
            feature_code: fields[7].clone(),
            country_code: fields[8].clone(),
            country_codes_alt: split_list(&fields[9]),
            admin_codes: [
                fields[10].clone(),
                fields[11].clone(),
                fields[12].clone(),
                fields[13].clone(),
            ],
            population: parse_int(&fields[14]),
            elevation,
            timezone: fields[n - 2].clone(),
        };
        reconcile_names(&mut rec.name, &mut rec.name_ascii, &mut rec.names_alt);
        Ok(rec)
    }

    /// Registry key of the feature, `class.code`
    pub fn feature_key(&self) -> String {
        format!("{}.{}", self.feature_class, self.feature_code)
    }
}

impl PostalRec {
    pub fn from_fields(fields: &[String]) -> Result<Self, MissingFields> {
        require(fields, POSTAL_FIELDS)?;
        let n = fields.len();
        Ok(Self {
            country_code: fields[0].clone(),
            postal_code: fields[1].clone(),
            place_name: fields[2].clone(),
            admins: [
                (fields[3].clone(), fields[4].clone()),
                (fields[5].clone(), fields[6].clone()),
                (fields[7].clone(), fields[8].clone()),
            ],
            lon_lat: check_lon_lat(&fields[n - 2], &fields[n - 3]),
            accuracy: parse_int(&fields[n - 1]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::decode_line;

    fn fields(line: &str) -> Vec<String> {
        decode_line(line).unwrap()
    }

    const PARIS: &str = "2988507\tParis\tParis\tLutetia,Paris,Parizh\t48.85341\t2.3488\tP\tPPLC\tFR\t\t11\t75\t751\t75056\t2138551\t\t42\tEurope/Paris\t2023-01-01";

    #[test]
    fn admin_with_distinct_ascii() {
        let rec = AdminRec::from_fields(&fields("US.CA\tCalifornia\tCalifornia\t5332921")).unwrap();
        assert_eq!(rec.code, "US.CA");
        assert_eq!(rec.name, "California");
        assert_eq!(rec.name_ascii, "");
        assert_eq!(rec.id, 5332921);
        assert_eq!(rec.split_code(), Some(("US", "CA")));
    }

    #[test]
    fn admin_empty_name_takes_ascii() {
        let rec = AdminRec::from_fields(&fields("DE.07\t\tNordrhein-Westfalen\t2861876")).unwrap();
        assert_eq!(rec.name, "Nordrhein-Westfalen");
        assert_eq!(rec.name_ascii, "");
    }

    #[test]
    fn admin_single_segment_code_has_no_split() {
        let rec = AdminRec::from_fields(&fields("US\tUnited States\tUnited States\t6252001")).unwrap();
        assert_eq!(rec.split_code(), None);
    }

    #[test]
    fn admin2_code_keeps_rest() {
        let rec = AdminRec::from_fields(&fields("US.CA.037\tLos Angeles County\tLos Angeles County\t5368381")).unwrap();
        assert_eq!(rec.split_code(), Some(("US", "CA.037")));
    }

    #[test]
    fn admin_too_short_fails() {
        let err = AdminRec::from_fields(&fields("US.CA\tCalifornia")).unwrap_err();
        assert_eq!(err, MissingFields { expected: 4, found: 2 });
    }

    #[test]
    fn country_parses_all_columns() {
        let line = "FR\tFRA\t250\tFR\tFrance\tParis\t547030\t66987244\tEU\t.fr\tEUR\tEuro\t33\t#####\t^(\\d{5})$\tfr-FR,frp,br,co,ca,eu,oc\t3017382\tCH,DE,BE,LU,IT,AD,MC,ES\t";
        let rec = CountryRec::from_fields(&fields(line)).unwrap();
        assert_eq!(rec.iso2, "FR");
        assert_eq!(rec.iso3, "FRA");
        assert_eq!(rec.iso_num, "250");
        assert_eq!(rec.capital, "Paris");
        assert_eq!(rec.area_sq_km, 547030);
        assert_eq!(rec.population, 66987244);
        assert_eq!(rec.postal_format, "#####");
        assert_eq!(rec.languages.len(), 7);
        assert_eq!(rec.id, 3017382);
        assert_eq!(rec.neighbors[0], "CH");
        assert_eq!(rec.neighbors.len(), 8);
    }

    #[test]
    fn country_fractional_area_truncates() {
        let line = "VA\tVAT\t336\tVT\tVatican\tVatican City\t0.44\t921\tEU\t.va\tEUR\tEuro\t379\t#####\t^(\\d{5})$\tla,it,fr\t3164670\tIT";
        let rec = CountryRec::from_fields(&fields(line)).unwrap();
        assert_eq!(rec.area_sq_km, 0);
        assert_eq!(rec.neighbors, vec!["IT"]);
    }

    #[test]
    fn feature_and_timezone() {
        let f = FeatureRec::from_fields(&fields("P.PPLC\tcapital of a political entity\t")).unwrap();
        assert_eq!(f.code, "P.PPLC");
        assert_eq!(f.desc, "");

        let tz = TimezoneRec::from_fields(&fields("FR\tEurope/Paris\t1.0\t2.0\t1.0")).unwrap();
        assert_eq!(tz.name, "Europe/Paris");
        assert_eq!(tz.offset_dst, 2.0);
    }

    #[test]
    fn timezone_unparseable_offset_is_zero() {
        let tz = TimezoneRec::from_fields(&fields("XX\tEtc/Unknown\tn/a\t\t-5.5")).unwrap();
        assert_eq!(tz.offset_gmt, 0.0);
        assert_eq!(tz.offset_dst, 0.0);
        assert_eq!(tz.offset_raw, -5.5);
    }

    #[test]
    fn place_parses_and_reconciles() {
        let rec = PlaceRec::from_fields(&fields(PARIS)).unwrap();
        assert_eq!(rec.id, 2988507);
        assert_eq!(rec.name, "Paris");
        assert_eq!(rec.name_ascii, "");
        assert_eq!(rec.names_alt, vec!["Lutetia", "Parizh"]);
        assert_eq!(rec.lon_lat, Some([2.3488, 48.85341]));
        assert_eq!(rec.feature_key(), "P.PPLC");
        assert_eq!(rec.admin_codes[0], "11");
        assert_eq!(rec.admin_codes[1], "75");
        assert_eq!(rec.population, 2138551);
        assert_eq!(rec.elevation, 42);
        assert_eq!(rec.timezone, "Europe/Paris");
    }

    #[test]
    fn place_prefers_elevation_over_dem() {
        let line = PARIS.replace("\t\t42\t", "\t35\t42\t");
        let rec = PlaceRec::from_fields(&fields(&line)).unwrap();
        assert_eq!(rec.elevation, 35);
    }

    #[test]
    fn place_out_of_range_coordinates_are_absent() {
        let line = PARIS.replace("48.85341\t2.3488", "45.0\t200.0");
        let rec = PlaceRec::from_fields(&fields(&line)).unwrap();
        assert_eq!(rec.lon_lat, None);
    }

    #[test]
    fn place_too_short_fails() {
        let err = PlaceRec::from_fields(&fields("1\tFoo\tFoo")).unwrap_err();
        assert_eq!(err.expected, 19);
        assert_eq!(err.found, 3);
    }

    #[test]
    fn postal_reads_tail_from_end() {
        let line = "FR\t75001\tPARIS 01\tIle-de-France\t11\tParis\t75\tParis\t751\t48.8592\t2.3417\t5";
        let rec = PostalRec::from_fields(&fields(line)).unwrap();
        assert_eq!(rec.place_name, "PARIS 01");
        assert_eq!(rec.admins[1], ("Paris".to_string(), "75".to_string()));
        assert_eq!(rec.lon_lat, Some([2.3417, 48.8592]));
        assert_eq!(rec.accuracy, 5);
    }

    #[test]
    fn lon_lat_domain() {
        assert_eq!(check_lon_lat("200.0", "45.0"), None);
        assert_eq!(check_lon_lat("2.3", "48.8"), Some([2.3, 48.8]));
        assert_eq!(check_lon_lat("-180", "-90"), Some([-180.0, -90.0]));
        assert_eq!(check_lon_lat("180", "0"), None);
        assert_eq!(check_lon_lat("", "48.8"), None);
    }

    #[test]
    fn int_coercion_is_permissive() {
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_int("abc"), 0);
        assert_eq!(parse_int("-9999"), -9999);
        assert_eq!(parse_int("1.4E7"), 14_000_000);
    }

    #[test]
    fn hierarchy_links_parent_and_child() {
        let rec = HierarchyRec::from_fields(&fields("3017382\t3012874\tADM")).unwrap();
        assert_eq!(rec.parent_id, 3017382);
        assert_eq!(rec.child_id, 3012874);
        assert_eq!(rec.kind, "ADM");
    }

    #[test]
    fn hierarchy_kind_may_be_empty() {
        let rec = HierarchyRec::from_fields(&fields("6295630\t6255146\t")).unwrap();
        assert_eq!(rec.kind, "");
        let err = HierarchyRec::from_fields(&fields("6295630\t6255146")).unwrap_err();
        assert_eq!(err, MissingFields { expected: 3, found: 2 });
    }

    #[test]
    fn language_codes() {
        let rec = LanguageRec::from_fields(&fields("fra\tfre\tfr\tFrench")).unwrap();
        assert_eq!(rec.iso_639_3, "fra");
        assert_eq!(rec.iso_639_2, "fre");
        assert_eq!(rec.iso_639_1, "fr");
        assert_eq!(rec.name, "French");

        let rec = LanguageRec::from_fields(&fields("aaa\t\t\tGhotuo")).unwrap();
        assert_eq!(rec.iso_639_1, "");
        assert_eq!(rec.name, "Ghotuo");
    }

    #[test]
    fn language_short_row_is_rejected() {
        let err = LanguageRec::from_fields(&fields("fra\tfre\tfr")).unwrap_err();
        assert_eq!(err.expected, 4);
        assert_eq!(err.found, 3);
    }

    #[test]
    fn language_file_header_is_skipped() {
        use crate::parser::DumpReader;
        use std::io::Cursor;

        let text = "ISO 639-3\tISO 639-2\tISO 639-1\tLanguage Name\nfra\tfre\tfr\tFrench\n";
        let recs: Vec<LanguageRec> = DumpReader::new(Cursor::new(text.as_bytes().to_vec()), true)
            .map(|line| LanguageRec::from_fields(&line.unwrap().fields).unwrap())
            .collect();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].iso_639_3, "fra");
    }
}

use rustc_hash::FxHashMap;
use tracing::debug;

/// In-memory lookup tables that turn textual codes into surrogate ids.
///
/// Every lookup returns 0 on a miss; 0 is never a valid surrogate id.
#[derive(Default)]
pub struct GeoIndex {
    admins: FxHashMap<String, i64>,
    countries: FxHashMap<String, u32>,
    features: FxHashMap<String, u32>,
    timezones: FxHashMap<String, u32>,
}

/// Entry counts per lookup table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub admins: usize,
    pub countries: usize,
    pub features: usize,
    pub timezones: usize,
}

fn register<V: Copy>(map: &mut FxHashMap<String, V>, key: &str, value: V) -> bool {
    if map.contains_key(key) {
        debug!(key, "Duplicate key, keeping first occurrence");
        return false;
    }
    map.insert(key.to_string(), value);
    true
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a composite admin code (`CC.A1` or `CC.A1.A2`) with its source id.
    /// Returns `false` when the key already exists.
    pub fn register_admin(&mut self, code: &str, id: i64) -> bool {
        register(&mut self.admins, code, id)
    }

    pub fn register_country(&mut self, iso2: &str, id: u32) -> bool {
        register(&mut self.countries, iso2, id)
    }

    pub fn register_feature(&mut self, class_code: &str, id: u32) -> bool {
        register(&mut self.features, class_code, id)
    }

    pub fn register_timezone(&mut self, name: &str, id: u32) -> bool {
        register(&mut self.timezones, name, id)
    }

    pub fn admin_id(&self, code: &str) -> i64 {
        self.admins.get(code).copied().unwrap_or(0)
    }

    pub fn country_id(&self, iso2: &str) -> u32 {
        self.countries.get(iso2).copied().unwrap_or(0)
    }

    pub fn feature_id(&self, class_code: &str) -> u32 {
        self.features.get(class_code).copied().unwrap_or(0)
    }

    pub fn timezone_id(&self, name: &str) -> u32 {
        self.timezones.get(name).copied().unwrap_or(0)
    }

    /// Most specific admin match wins: `CC.A1.A2`, then `CC.A1`, else 0.
    pub fn resolve_admin(&self, country: &str, admin1: &str, admin2: &str) -> i64 {
        if admin1.is_empty() {
            return 0;
        }
        if !admin2.is_empty() {
            let id = self.admin_id(&format!("{country}.{admin1}.{admin2}"));
            if id != 0 {
                return id;
            }
        }
        self.admin_id(&format!("{country}.{admin1}"))
    }

    /// Maps neighbour ISO2 codes to country ids, keeping 0 for unknown codes.
    pub fn resolve_neighbors(&self, codes: &[String]) -> Vec<u32> {
        codes.iter().map(|c| self.country_id(c)).collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            admins: self.admins.len(),
            countries: self.countries.len(),
            features: self.features.len(),
            timezones: self.timezones.len(),
        }
    }
}

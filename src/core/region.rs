use std::collections::HashMap;
use std::sync::OnceLock;

/// Hand-curated place → broader region table
///
/// Keys are matched case-sensitively. Places missing from the table are
/// their own region, so they only match themselves exactly.
const REGION_TABLE: &[(&str, &str)] = &[
    // Capital area
    ("서울", "수도권"),
    ("경기", "수도권"),
    ("인천", "수도권"),
    ("Seoul", "수도권"),
    ("Gyeonggi", "수도권"),
    ("Incheon", "수도권"),
    // Yeongnam
    ("부산", "영남"),
    ("대구", "영남"),
    ("경남", "영남"),
    ("Busan", "영남"),
    ("Daegu", "영남"),
    ("Gyeongnam", "영남"),
    // Honam
    ("광주", "호남"),
    ("전북", "호남"),
    ("전남", "호남"),
    ("Gwangju", "호남"),
    ("Jeonbuk", "호남"),
    ("Jeonnam", "호남"),
];

/// Static destination → region lookup used for partial destination credit
#[derive(Debug, Clone)]
pub struct RegionAffinity {
    regions: HashMap<&'static str, &'static str>,
}

impl RegionAffinity {
    /// Process-wide table, built once on first use
    pub fn global() -> &'static RegionAffinity {
        static TABLE: OnceLock<RegionAffinity> = OnceLock::new();
        TABLE.get_or_init(|| RegionAffinity::from_entries(REGION_TABLE))
    }

    pub fn from_entries(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            regions: entries.iter().copied().collect(),
        }
    }

    /// Region a place belongs to, or the place itself if unknown
    pub fn region_of<'a>(&self, place: &'a str) -> &'a str {
        self.regions.get(place).copied().unwrap_or(place)
    }

    /// Whether two destinations belong to the same broader region
    ///
    /// A blank destination has no region and never matches.
    pub fn same_region(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return false;
        }
        self.region_of(a) == self.region_of(b)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub longitude: f64,
    pub latitude: f64,
}

pub static CALIFORNIA_CITIES: &[City] = &[
    City { name: "Los Angeles", longitude: -118.2437, latitude: 34.0522 },
    City { name: "San Francisco", longitude: -122.4194, latitude: 37.7749 },
    City { name: "San Diego", longitude: -117.1611, latitude: 32.7157 },
    City { name: "San Jose", longitude: -121.8863, latitude: 37.3382 },
    City { name: "Sacramento", longitude: -121.4944, latitude: 38.5816 },
    City { name: "Fresno", longitude: -119.7871, latitude: 36.7378 },
    City { name: "Long Beach", longitude: -118.1937, latitude: 33.7701 },
    City { name: "Oakland", longitude: -122.2711, latitude: 37.8044 },
    City { name: "Bakersfield", longitude: -119.0187, latitude: 35.3733 },
    City { name: "Anaheim", longitude: -117.9145, latitude: 33.8366 },
    City { name: "Santa Ana", longitude: -117.8678, latitude: 33.7455 },
    City { name: "Riverside", longitude: -117.3961, latitude: 33.9533 },
    City { name: "Stockton", longitude: -121.2908, latitude: 37.9577 },
    City { name: "Irvine", longitude: -117.8265, latitude: 33.6846 },
    City { name: "Chula Vista", longitude: -117.0842, latitude: 32.6401 },
];

/// Exact, case-sensitive name match. An empty name never matches.
pub fn find_city<'a>(cities: &'a [City], name: &str) -> Option<&'a City> {
    if name.is_empty() {
        return None;
    }
    cities.iter().find(|c| c.name == name)
}

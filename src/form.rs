use crate::{
    cities::{self, City, CALIFORNIA_CITIES},
    prediction::PredictionRequest,
    utilities::{parse_float_prefix, parse_int_prefix},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Longitude,
    Latitude,
    HousingMedianAge,
    MedianIncome,
    RoomsPerHousehold,
    BedroomsPerRoom,
    PopulationPerHousehold,
    Households,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

/// Display metadata for one input. Ranges are hints for the widget only.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub label: &'static str,
    pub hint: &'static str,
    pub step: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldName {
    pub const ALL: [FieldName; 8] = [
        FieldName::Longitude,
        FieldName::Latitude,
        FieldName::HousingMedianAge,
        FieldName::MedianIncome,
        FieldName::RoomsPerHousehold,
        FieldName::BedroomsPerRoom,
        FieldName::PopulationPerHousehold,
        FieldName::Households,
    ];

    /// Key used in the request body.
    pub fn key(self) -> &'static str {
        match self {
            FieldName::Longitude => "longitude",
            FieldName::Latitude => "latitude",
            FieldName::HousingMedianAge => "housing_median_age",
            FieldName::MedianIncome => "median_income",
            FieldName::RoomsPerHousehold => "rooms_per_household",
            FieldName::BedroomsPerRoom => "bedrooms_per_room",
            FieldName::PopulationPerHousehold => "population_per_household",
            FieldName::Households => "households",
        }
    }

    pub fn from_key(key: &str) -> Option<FieldName> {
        FieldName::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn kind(self) -> NumericKind {
        match self {
            FieldName::HousingMedianAge | FieldName::Households => NumericKind::Integer,
            _ => NumericKind::Float,
        }
    }

    pub fn spec(self) -> FieldSpec {
        match self {
            FieldName::Longitude => FieldSpec { label: "Longitude", hint: "e.g., -122.23", step: 0.01, min: Some(-124.0), max: Some(-114.0) },
            FieldName::Latitude => FieldSpec { label: "Latitude", hint: "e.g., 37.88", step: 0.01, min: Some(32.0), max: Some(42.0) },
            FieldName::HousingMedianAge => FieldSpec { label: "Housing Median Age", hint: "e.g., 41", step: 1.0, min: Some(1.0), max: Some(100.0) },
            FieldName::MedianIncome => FieldSpec { label: "Median Income ($10k)", hint: "e.g., 8.32", step: 0.01, min: Some(0.0), max: None },
            FieldName::RoomsPerHousehold => FieldSpec { label: "Rooms per Household", hint: "e.g., 6.98", step: 0.01, min: Some(0.0), max: None },
            FieldName::BedroomsPerRoom => FieldSpec { label: "Bedrooms per Room", hint: "e.g., 0.15", step: 0.01, min: Some(0.0), max: Some(1.0) },
            FieldName::PopulationPerHousehold => FieldSpec { label: "Population per Household", hint: "e.g., 2.55", step: 0.01, min: Some(0.0), max: None },
            FieldName::Households => FieldSpec { label: "Total Households", hint: "e.g., 322", step: 1.0, min: Some(1.0), max: None },
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Raw text of the eight inputs plus the city selector.
///
/// Nothing is validated here. Parsing happens in [`FormState::to_request`]
/// when the user submits.
#[derive(Debug, Clone)]
pub struct FormState {
    values: [String; 8],
    selected_city: String,
    cities: &'static [City],
}

impl Default for FormState {
    fn default() -> Self {
        Self::with_cities(CALIFORNIA_CITIES)
    }
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cities(cities: &'static [City]) -> Self {
        Self {
            values: Default::default(),
            selected_city: String::new(),
            cities,
        }
    }

    pub fn cities(&self) -> &'static [City] {
        self.cities
    }

    pub fn get(&self, field: FieldName) -> &str {
        &self.values[field.index()]
    }

    /// Mutable handle for text widgets. Equivalent to `update_field` on every edit.
    pub fn value_mut(&mut self, field: FieldName) -> &mut String {
        &mut self.values[field.index()]
    }

    pub fn update_field(&mut self, field: FieldName, raw: impl Into<String>) {
        self.values[field.index()] = raw.into();
    }

    pub fn selected_city(&self) -> &str {
        &self.selected_city
    }

    /// Records the selection and, for a known city, overwrites longitude and
    /// latitude. Returns the matched city.
    pub fn select_city(&mut self, name: &str) -> Option<City> {
        self.selected_city = name.to_string();

        let city = *cities::find_city(self.cities, name)?;
        self.update_field(FieldName::Longitude, city.longitude.to_string());
        self.update_field(FieldName::Latitude, city.latitude.to_string());

        log::debug!("prefilled coordinates from {}", city.name);

        Some(city)
    }

    pub fn to_request(&self) -> PredictionRequest {
        let float = |f: FieldName| parse_float_prefix(self.get(f));
        let int = |f: FieldName| parse_int_prefix(self.get(f));

        PredictionRequest {
            longitude: float(FieldName::Longitude),
            latitude: float(FieldName::Latitude),
            housing_median_age: int(FieldName::HousingMedianAge),
            median_income: float(FieldName::MedianIncome),
            rooms_per_household: float(FieldName::RoomsPerHousehold),
            bedrooms_per_room: float(FieldName::BedroomsPerRoom),
            population_per_household: float(FieldName::PopulationPerHousehold),
            households: int(FieldName::Households),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> FormState {
        let mut form = FormState::new();
        for (field, value) in FieldName::ALL.into_iter().zip([
            "-122.23", "37.88", "41", "8.3252", "6.98", "0.15", "2.55", "322",
        ]) {
            form.update_field(field, value);
        }
        form
    }

    #[test]
    fn starts_empty() {
        let form = FormState::new();
        for field in FieldName::ALL {
            assert_eq!(form.get(field), "");
        }
        assert_eq!(form.selected_city(), "");
    }

    #[test]
    fn last_write_wins_per_field() {
        let mut form = FormState::new();
        form.update_field(FieldName::MedianIncome, "1");
        form.update_field(FieldName::Households, "10");
        form.update_field(FieldName::MedianIncome, "2.5");
        form.update_field(FieldName::MedianIncome, "3.75");

        assert_eq!(form.get(FieldName::MedianIncome), "3.75");
        assert_eq!(form.get(FieldName::Households), "10");
        for field in FieldName::ALL {
            if field != FieldName::MedianIncome && field != FieldName::Households {
                assert_eq!(form.get(field), "");
            }
        }
    }

    #[test]
    fn selecting_san_francisco_sets_only_coordinates() {
        let mut form = filled();
        let before = form.clone();

        let city = form.select_city("San Francisco");

        assert_eq!(city.map(|c| c.name), Some("San Francisco"));
        assert_eq!(form.get(FieldName::Longitude), "-122.4194");
        assert_eq!(form.get(FieldName::Latitude), "37.7749");
        for field in FieldName::ALL.into_iter().skip(2) {
            assert_eq!(form.get(field), before.get(field));
        }
        assert_eq!(form.selected_city(), "San Francisco");
    }

    #[test]
    fn empty_or_unknown_city_leaves_fields_alone() {
        let mut form = filled();

        assert!(form.select_city("").is_none());
        assert!(form.select_city("Atlantis").is_none());

        for field in FieldName::ALL {
            assert_eq!(form.get(field), filled().get(field));
        }
        assert_eq!(form.selected_city(), "Atlantis");
    }

    #[test]
    fn manual_edit_after_selection_keeps_stale_selector() {
        let mut form = FormState::new();
        form.select_city("Fresno");
        form.update_field(FieldName::Longitude, "-120.5");

        assert_eq!(form.selected_city(), "Fresno");
        assert_eq!(form.get(FieldName::Longitude), "-120.5");
        assert_eq!(form.get(FieldName::Latitude), "36.7378");
    }

    #[test]
    fn injected_city_table_is_used() {
        static FIXTURE: &[City] = &[City { name: "Testville", longitude: -1.5, latitude: 2.25 }];

        let mut form = FormState::with_cities(FIXTURE);
        assert!(form.select_city("San Francisco").is_none());
        assert!(form.select_city("Testville").is_some());
        assert_eq!(form.get(FieldName::Longitude), "-1.5");
        assert_eq!(form.get(FieldName::Latitude), "2.25");
    }

    #[test]
    fn request_uses_field_specific_numeric_kinds() {
        let request = filled().to_request();

        assert_eq!(request.longitude, -122.23);
        assert_eq!(request.latitude, 37.88);
        assert_eq!(request.housing_median_age, Some(41));
        assert_eq!(request.median_income, 8.3252);
        assert_eq!(request.rooms_per_household, 6.98);
        assert_eq!(request.bedrooms_per_room, 0.15);
        assert_eq!(request.population_per_household, 2.55);
        assert_eq!(request.households, Some(322));
    }

    #[test]
    fn unparseable_fields_do_not_block_the_request() {
        let mut form = filled();
        form.update_field(FieldName::MedianIncome, "");
        form.update_field(FieldName::HousingMedianAge, "forty");
        form.update_field(FieldName::Households, "12.9");

        let request = form.to_request();
        assert!(request.median_income.is_nan());
        assert_eq!(request.housing_median_age, None);
        assert_eq!(request.households, Some(12));
    }

    #[test]
    fn keys_round_trip() {
        for field in FieldName::ALL {
            assert_eq!(FieldName::from_key(field.key()), Some(field));
        }
        assert_eq!(FieldName::from_key("price"), None);
        assert_eq!(FieldName::HousingMedianAge.kind(), NumericKind::Integer);
        assert_eq!(FieldName::BedroomsPerRoom.kind(), NumericKind::Float);
    }
}

use tracing::{debug, info, warn};

use super::domain::{AddressSection, City, Province, RegionId};
use super::gateway::{AdmissionsGateway, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("province list could not be loaded: {0}")]
    ProvincesUnavailable(#[source] GatewayError),
    #[error("province {0} is not in the loaded list")]
    UnknownProvince(RegionId),
    #[error("city {0} is not available for the selected province")]
    UnknownCity(RegionId),
    #[error("city list is not ready yet")]
    CitiesNotReady,
}

/// Ticket for a city load, naming the province it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the city list must be loaded for the ticket's province"]
pub struct CityRequest {
    pub province_id: RegionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityLoadOutcome {
    Applied { count: usize },
    Empty,
    Failed(String),
    /// The selection moved on before the response arrived; nothing changed.
    Stale,
}

/// What the city picker should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityPicker<'a> {
    AwaitingProvince,
    Loading,
    NoData,
    Ready(&'a [City]),
    Failed(&'a str),
}

impl CityPicker<'_> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CityPicker::Ready(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ProvinceList {
    #[default]
    NotLoaded,
    Loaded(Vec<Province>),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum CityList {
    #[default]
    Idle,
    Loading {
        province_id: RegionId,
    },
    Loaded {
        province_id: RegionId,
        cities: Vec<City>,
    },
    Failed {
        province_id: RegionId,
        message: String,
    },
}

/// Current geographic choice plus the free-text fields that depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSelection {
    pub province: Option<Province>,
    pub city: Option<City>,
    pub sub_district: String,
    pub ward: String,
}

/// Province → city cascade for the Address step.
#[derive(Debug, Clone, Default)]
pub struct RegionResolver {
    provinces: ProvinceList,
    cities: CityList,
    selection: RegionSelection,
}

impl RegionResolver {
    /// Loads the province list once. A failed load may be retried; there is no fallback list.
    pub fn load_provinces<G>(&mut self, gateway: &G) -> Result<&[Province], RegionError>
    where
        G: AdmissionsGateway + ?Sized,
    {
        if !matches!(self.provinces, ProvinceList::Loaded(_)) {
            match gateway.provinces() {
                Ok(provinces) => {
                    info!(count = provinces.len(), "provinces loaded");
                    self.provinces = ProvinceList::Loaded(provinces);
                }
                Err(err) => {
                    warn!(error = %err, "province load failed");
                    self.provinces = ProvinceList::Failed(err.user_message());
                    return Err(RegionError::ProvincesUnavailable(err));
                }
            }
        }
        Ok(self.provinces())
    }

    pub fn provinces(&self) -> &[Province] {
        match &self.provinces {
            ProvinceList::Loaded(provinces) => provinces,
            _ => &[],
        }
    }

    /// Retryable error banner text for the province picker.
    pub fn province_error(&self) -> Option<&str> {
        match &self.provinces {
            ProvinceList::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn selection(&self) -> &RegionSelection {
        &self.selection
    }

    /// Selects a province. The city and the sub-district/ward text are cleared
    /// before the ticket for the new city load is handed out. Re-selecting the
    /// current province changes nothing and yields no ticket.
    pub fn select_province(
        &mut self,
        province_id: &RegionId,
    ) -> Result<Option<CityRequest>, RegionError> {
        let province = self
            .provinces()
            .iter()
            .find(|province| &province.id == province_id)
            .cloned()
            .ok_or_else(|| RegionError::UnknownProvince(province_id.clone()))?;

        if self.selection.province.as_ref() == Some(&province) {
            return Ok(None);
        }

        if self.selection.city.is_some()
            || !self.selection.sub_district.is_empty()
            || !self.selection.ward.is_empty()
        {
            debug!(province = %province.id, "province changed; clearing dependent region fields");
        }
        self.selection = RegionSelection {
            province: Some(province),
            city: None,
            sub_district: String::new(),
            ward: String::new(),
        };
        self.cities = CityList::Loading {
            province_id: province_id.clone(),
        };

        Ok(Some(CityRequest {
            province_id: province_id.clone(),
        }))
    }

    /// Applies a city response, unless it belongs to a province that is no longer selected.
    pub fn resolve_cities(
        &mut self,
        request: CityRequest,
        result: Result<Vec<City>, GatewayError>,
    ) -> CityLoadOutcome {
        let current = self
            .selection
            .province
            .as_ref()
            .map(|province| &province.id);
        if current != Some(&request.province_id) {
            debug!(province = %request.province_id, "discarding stale city response");
            return CityLoadOutcome::Stale;
        }

        let province_id = request.province_id;
        match result {
            Ok(cities) if cities.is_empty() => {
                self.cities = CityList::Loaded {
                    province_id,
                    cities,
                };
                CityLoadOutcome::Empty
            }
            Ok(cities) => {
                let count = cities.len();
                self.cities = CityList::Loaded {
                    province_id,
                    cities,
                };
                CityLoadOutcome::Applied { count }
            }
            Err(err) => {
                warn!(province = %province_id, error = %err, "city load failed");
                let message = err.user_message();
                self.cities = CityList::Failed {
                    province_id,
                    message: message.clone(),
                };
                CityLoadOutcome::Failed(message)
            }
        }
    }

    /// Issues the city load for a ticket and applies the response.
    pub fn load_cities<G>(&mut self, gateway: &G, request: CityRequest) -> CityLoadOutcome
    where
        G: AdmissionsGateway + ?Sized,
    {
        let result = gateway.cities(&request.province_id);
        self.resolve_cities(request, result)
    }

    /// Re-issues the city load for the current province, e.g. after a failure.
    pub fn retry_cities(&mut self) -> Option<CityRequest> {
        let province_id = self.selection.province.as_ref()?.id.clone();
        self.cities = CityList::Loading {
            province_id: province_id.clone(),
        };
        Some(CityRequest { province_id })
    }

    pub fn select_city(&mut self, city_id: &RegionId) -> Result<&City, RegionError> {
        let city = match &self.cities {
            CityList::Loaded { cities, .. } => cities
                .iter()
                .find(|city| &city.id == city_id)
                .cloned()
                .ok_or_else(|| RegionError::UnknownCity(city_id.clone()))?,
            _ => return Err(RegionError::CitiesNotReady),
        };
        Ok(self.selection.city.insert(city))
    }

    pub fn set_sub_district(&mut self, value: impl Into<String>) {
        self.selection.sub_district = value.into();
    }

    pub fn set_ward(&mut self, value: impl Into<String>) {
        self.selection.ward = value.into();
    }

    pub fn city_picker(&self) -> CityPicker<'_> {
        match &self.cities {
            CityList::Idle => CityPicker::AwaitingProvince,
            CityList::Loading { .. } => CityPicker::Loading,
            CityList::Loaded { cities, .. } if cities.is_empty() => CityPicker::NoData,
            CityList::Loaded { cities, .. } => CityPicker::Ready(cities),
            CityList::Failed { message, .. } => CityPicker::Failed(message),
        }
    }

    /// Re-selects a previously saved region by display name, e.g. when a
    /// registration is resumed. Unknown names leave the selection empty.
    pub fn restore<G>(&mut self, gateway: &G, address: &AddressSection) -> Result<(), RegionError>
    where
        G: AdmissionsGateway + ?Sized,
    {
        let Some(province_name) = address.province.as_deref() else {
            return Ok(());
        };
        let province_id = match self
            .load_provinces(gateway)?
            .iter()
            .find(|province| province.name.eq_ignore_ascii_case(province_name))
        {
            Some(province) => province.id.clone(),
            None => {
                warn!(province = province_name, "saved province no longer offered");
                return Ok(());
            }
        };

        if let Some(request) = self.select_province(&province_id)? {
            self.load_cities(gateway, request);
        }

        let city_id = match (&self.cities, address.city.as_deref()) {
            (CityList::Loaded { cities, .. }, Some(city_name)) => cities
                .iter()
                .find(|city| city.name.eq_ignore_ascii_case(city_name))
                .map(|city| city.id.clone()),
            _ => None,
        };
        if let Some(city_id) = city_id {
            self.select_city(&city_id)?;
        }

        self.selection.sub_district = address.sub_district.clone().unwrap_or_default();
        self.selection.ward = address.ward.clone().unwrap_or_default();
        Ok(())
    }

    /// Writes the selection into the address section sent with the next upsert.
    pub fn apply_to(&self, address: &mut AddressSection) {
        address.province = self
            .selection
            .province
            .as_ref()
            .map(|province| province.name.clone());
        address.city = self.selection.city.as_ref().map(|city| city.name.clone());
        address.sub_district = non_blank(&self.selection.sub_district);
        address.ward = non_blank(&self.selection.ward);
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

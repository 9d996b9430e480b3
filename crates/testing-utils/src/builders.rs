//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use cascade_domain::entities::{
    Address, Owner, PersonFinding, PlateFinding, Priority, SearchRequest, VehicleFinding,
    VehicleInfo,
};

/// Builder for creating test SearchRequest entities
pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: SearchRequest {
                model: "CIVIC".to_string(),
                color: "BLACK".to_string(),
                year_start: 2018,
                year_end: None,
                priority: Priority::Normal,
                batch_id: None,
            },
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.request.model = model.to_string();
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.request.color = color.to_string();
        self
    }

    pub fn with_year_start(mut self, year_start: i32) -> Self {
        self.request.year_start = year_start;
        self
    }

    pub fn with_year_end(mut self, year_end: i32) -> Self {
        self.request.year_end = Some(year_end);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.request.priority = priority;
        self
    }

    pub fn with_batch_id(mut self, batch_id: &str) -> Self {
        self.request.batch_id = Some(batch_id.to_string());
        self
    }

    pub fn high_priority(mut self) -> Self {
        self.request.priority = Priority::High;
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

impl Default for SearchRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test VehicleFinding entities
pub struct VehicleFindingBuilder {
    finding: VehicleFinding,
}

impl VehicleFindingBuilder {
    pub fn new() -> Self {
        Self {
            finding: VehicleFinding {
                plate: "ABC1234".to_string(),
                model: "CIVIC".to_string(),
                color: "BLACK".to_string(),
                year: 2018,
                chassis: None,
                registration_id: None,
                source: "elpump".to_string(),
                raw_payload: serde_json::json!({}),
            },
        }
    }

    pub fn with_plate(mut self, plate: &str) -> Self {
        self.finding.plate = plate.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.finding.model = model.to_string();
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.finding.color = color.to_string();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.finding.year = year;
        self
    }

    pub fn with_chassis(mut self, chassis: &str) -> Self {
        self.finding.chassis = Some(chassis.to_string());
        self
    }

    pub fn with_registration_id(mut self, registration_id: &str) -> Self {
        self.finding.registration_id = Some(registration_id.to_string());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.finding.source = source.to_string();
        self
    }

    pub fn with_raw_payload(mut self, raw_payload: serde_json::Value) -> Self {
        self.finding.raw_payload = raw_payload;
        self
    }

    pub fn build(self) -> VehicleFinding {
        self.finding
    }
}

impl Default for VehicleFindingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test PlateFinding entities
pub struct PlateFindingBuilder {
    finding: PlateFinding,
}

impl PlateFindingBuilder {
    pub fn new() -> Self {
        Self {
            finding: PlateFinding {
                owner: Owner {
                    name: "MARIA SILVA".to_string(),
                    national_id: Some("529.982.247-25".to_string()),
                    id_document: None,
                },
                vehicle: VehicleInfo {
                    make: Some("HONDA".to_string()),
                    model: Some("CIVIC".to_string()),
                    color: Some("BLACK".to_string()),
                    year: Some("2018".to_string()),
                    status: Some("Regular".to_string()),
                    category: None,
                },
                address: None,
                source: "elpump".to_string(),
                latency_ms: 1500,
            },
        }
    }

    pub fn with_owner_name(mut self, name: &str) -> Self {
        self.finding.owner.name = name.to_string();
        self
    }

    pub fn with_national_id(mut self, national_id: &str) -> Self {
        self.finding.owner.national_id = Some(national_id.to_string());
        self
    }

    pub fn without_national_id(mut self) -> Self {
        self.finding.owner.national_id = None;
        self
    }

    pub fn with_id_document(mut self, id_document: &str) -> Self {
        self.finding.owner.id_document = Some(id_document.to_string());
        self
    }

    pub fn with_vehicle(mut self, vehicle: VehicleInfo) -> Self {
        self.finding.vehicle = vehicle;
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.finding.address = Some(address);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.finding.source = source.to_string();
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.finding.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> PlateFinding {
        self.finding
    }
}

impl Default for PlateFindingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test PersonFinding entities
pub struct PersonFindingBuilder {
    finding: PersonFinding,
}

impl PersonFindingBuilder {
    pub fn new() -> Self {
        Self {
            finding: PersonFinding {
                name: "MARIA SILVA".to_string(),
                birth_date: None,
                mother_name: None,
                address: Some(AddressBuilder::new().build()),
                phones: vec![],
                emails: vec![],
                source: "elpump".to_string(),
                latency_ms: 2000,
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.finding.name = name.to_string();
        self
    }

    pub fn with_birth_date(mut self, birth_date: chrono::NaiveDate) -> Self {
        self.finding.birth_date = Some(birth_date);
        self
    }

    pub fn with_mother_name(mut self, mother_name: &str) -> Self {
        self.finding.mother_name = Some(mother_name.to_string());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.finding.address = Some(address);
        self
    }

    pub fn without_address(mut self) -> Self {
        self.finding.address = None;
        self
    }

    pub fn with_phones(mut self, phones: Vec<&str>) -> Self {
        self.finding.phones = phones.into_iter().map(String::from).collect();
        self
    }

    pub fn with_emails(mut self, emails: Vec<&str>) -> Self {
        self.finding.emails = emails.into_iter().map(String::from).collect();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.finding.source = source.to_string();
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.finding.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> PersonFinding {
        self.finding
    }
}

impl Default for PersonFindingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Address entities
pub struct AddressBuilder {
    address: Address,
}

impl AddressBuilder {
    pub fn new() -> Self {
        Self {
            address: Address {
                street: "Rua das Flores".to_string(),
                number: "123".to_string(),
                complement: None,
                district: "Centro".to_string(),
                city: "Sao Paulo".to_string(),
                state: "SP".to_string(),
                zip_code: "01234-567".to_string(),
            },
        }
    }

    pub fn with_street(mut self, street: &str) -> Self {
        self.address.street = street.to_string();
        self
    }

    pub fn with_number(mut self, number: &str) -> Self {
        self.address.number = number.to_string();
        self
    }

    pub fn with_complement(mut self, complement: &str) -> Self {
        self.address.complement = Some(complement.to_string());
        self
    }

    pub fn with_district(mut self, district: &str) -> Self {
        self.address.district = district.to_string();
        self
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.address.city = city.to_string();
        self
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.address.state = state.to_string();
        self
    }

    pub fn with_zip_code(mut self, zip_code: &str) -> Self {
        self.address.zip_code = zip_code.to_string();
        self
    }

    pub fn build(self) -> Address {
        self.address
    }
}

impl Default for AddressBuilder {
    fn default() -> Self {
        Self::new()
    }
}

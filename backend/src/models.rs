//! Domain records persisted by the credential store
//!
//! The same structs serve as MongoDB documents and as API response bodies,
//! so all field names are camelCase on the wire and the record id maps to
//! the document `_id`. Income estimation and the partial-update merge live
//! here so both storage backends produce identical results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base payout rate in currency units per hectare per season.
pub const BASE_RATE_PER_HECTARE: f64 = 1000.0;
/// Income bonus per declared sustainable practice (10%).
pub const PRACTICE_BONUS: f64 = 0.10;
/// Conversion factor used across the platform for acre-denominated holdings.
pub const HECTARES_PER_ACRE: f64 = 0.405;

/// Unit a farmer's land size is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandUnit {
    Acres,
    Hectares,
}

impl Default for LandUnit {
    fn default() -> Self {
        Self::Acres
    }
}

/// Declared farming practice category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FarmingType {
    Organic,
    Conventional,
    Mixed,
}

impl Default for FarmingType {
    fn default() -> Self {
        Self::Mixed
    }
}

/// Principal kind encoded in tokens and password records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Farmer,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Admin => "admin",
        }
    }
}

/// What an OTP was issued for. Purposes are not distinguished at
/// verification time; re-issuing for an email overwrites regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    Login,
    PasswordReset,
}

/// GPS coordinates of a farm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A registered grower.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farmer {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub farm_name: String,
    pub land_size: f64,
    pub land_unit: LandUnit,
    pub farming_type: FarmingType,
    pub primary_crops: Vec<String>,
    pub irrigation_type: String,
    pub address: String,
    pub pincode: String,
    pub state: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhaar_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifsc_code: Option<String>,
    pub interested_projects: Vec<String>,
    pub sustainable_practices: Vec<String>,
    pub estimated_income: i64,
    /// Accumulated credits; mutated only by the admin approval flow.
    pub carbon_credits: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Farmer {
    /// Build a new farmer record for `email`, filling the profile from
    /// `registration` where provided and defaulting everything else.
    /// `estimated_income` is computed here so creation through either
    /// storage backend yields the same record.
    pub fn new(email: &str, registration: Option<RegistrationData>) -> Self {
        let now = Utc::now();
        let reg = registration.unwrap_or_default();
        let land_size = reg.land_size.unwrap_or(0.0);
        let land_unit = reg.land_unit.unwrap_or_default();
        let sustainable_practices = reg.sustainable_practices.unwrap_or_default();
        let estimated_income =
            estimate_income(land_size, land_unit, sustainable_practices.len());

        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            name: reg.name.unwrap_or_default(),
            phone: reg.phone.unwrap_or_default(),
            farm_name: reg.farm_name.unwrap_or_default(),
            land_size,
            land_unit,
            farming_type: reg.farming_type.unwrap_or_default(),
            primary_crops: reg.primary_crops.unwrap_or_default(),
            irrigation_type: reg.irrigation_type.unwrap_or_default(),
            address: reg.address.unwrap_or_default(),
            pincode: reg.pincode.unwrap_or_default(),
            state: reg.state.unwrap_or_default(),
            district: reg.district.unwrap_or_default(),
            coordinates: reg.coordinates,
            aadhaar_id: reg.aadhaar_id,
            pan_number: reg.pan_number,
            bank_account: reg.bank_account,
            ifsc_code: reg.ifsc_code,
            interested_projects: reg.interested_projects.unwrap_or_default(),
            sustainable_practices,
            estimated_income,
            carbon_credits: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An operator account. Created once at bootstrap, never via the public API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            name: name.to_string(),
            role: "admin".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Profile data optionally supplied alongside OTP verification or the
/// social-login callback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub farm_name: Option<String>,
    pub land_size: Option<f64>,
    pub land_unit: Option<LandUnit>,
    pub farming_type: Option<FarmingType>,
    pub primary_crops: Option<Vec<String>>,
    pub irrigation_type: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub aadhaar_id: Option<String>,
    pub pan_number: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub interested_projects: Option<Vec<String>>,
    pub sustainable_practices: Option<Vec<String>>,
}

/// Partial update to a farmer profile. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub farm_name: Option<String>,
    pub land_size: Option<f64>,
    pub land_unit: Option<LandUnit>,
    pub farming_type: Option<FarmingType>,
    pub primary_crops: Option<Vec<String>>,
    pub irrigation_type: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub aadhaar_id: Option<String>,
    pub pan_number: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc_code: Option<String>,
    pub interested_projects: Option<Vec<String>>,
    pub sustainable_practices: Option<Vec<String>>,
}

impl FarmerUpdate {
    /// Merge this update into `farmer`. Recomputes `estimated_income`
    /// when land size, land unit, or sustainable practices change, and
    /// bumps `updated_at`. Both storage backends funnel updates through
    /// here so their observable behavior stays identical.
    pub fn apply(self, farmer: &mut Farmer) {
        let recompute = self.land_size.is_some()
            || self.land_unit.is_some()
            || self.sustainable_practices.is_some();

        if let Some(name) = self.name {
            farmer.name = name;
        }
        if let Some(phone) = self.phone {
            farmer.phone = phone;
        }
        if let Some(farm_name) = self.farm_name {
            farmer.farm_name = farm_name;
        }
        if let Some(land_size) = self.land_size {
            farmer.land_size = land_size;
        }
        if let Some(land_unit) = self.land_unit {
            farmer.land_unit = land_unit;
        }
        if let Some(farming_type) = self.farming_type {
            farmer.farming_type = farming_type;
        }
        if let Some(primary_crops) = self.primary_crops {
            farmer.primary_crops = primary_crops;
        }
        if let Some(irrigation_type) = self.irrigation_type {
            farmer.irrigation_type = irrigation_type;
        }
        if let Some(address) = self.address {
            farmer.address = address;
        }
        if let Some(pincode) = self.pincode {
            farmer.pincode = pincode;
        }
        if let Some(state) = self.state {
            farmer.state = state;
        }
        if let Some(district) = self.district {
            farmer.district = district;
        }
        if let Some(coordinates) = self.coordinates {
            farmer.coordinates = Some(coordinates);
        }
        if let Some(aadhaar_id) = self.aadhaar_id {
            farmer.aadhaar_id = Some(aadhaar_id);
        }
        if let Some(pan_number) = self.pan_number {
            farmer.pan_number = Some(pan_number);
        }
        if let Some(bank_account) = self.bank_account {
            farmer.bank_account = Some(bank_account);
        }
        if let Some(ifsc_code) = self.ifsc_code {
            farmer.ifsc_code = Some(ifsc_code);
        }
        if let Some(interested_projects) = self.interested_projects {
            farmer.interested_projects = interested_projects;
        }
        if let Some(sustainable_practices) = self.sustainable_practices {
            farmer.sustainable_practices = sustainable_practices;
        }

        if recompute {
            farmer.estimated_income = estimate_income(
                farmer.land_size,
                farmer.land_unit,
                farmer.sustainable_practices.len(),
            );
        }
        farmer.updated_at = Utc::now();
    }
}

/// A short-lived one-time code bound to an email address.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires: DateTime<Utc>,
}

/// Estimated seasonal income: land normalized to hectares, times the base
/// rate, with a 10% bonus per declared sustainable practice, rounded to
/// whole currency units.
pub fn estimate_income(land_size: f64, land_unit: LandUnit, practice_count: usize) -> i64 {
    let hectares = match land_unit {
        LandUnit::Acres => land_size * HECTARES_PER_ACRE,
        LandUnit::Hectares => land_size,
    };
    let multiplier = 1.0 + PRACTICE_BONUS * practice_count as f64;
    (hectares * BASE_RATE_PER_HECTARE * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10.0, LandUnit::Acres, 2, 4860)] // 10 ac = 4.05 ha, x1000, x1.2
    #[case(5.0, LandUnit::Hectares, 0, 5000)]
    #[case(0.0, LandUnit::Acres, 3, 0)]
    #[case(1.0, LandUnit::Hectares, 1, 1100)]
    fn test_income_formula(
        #[case] size: f64,
        #[case] unit: LandUnit,
        #[case] practices: usize,
        #[case] expected: i64,
    ) {
        assert_eq!(estimate_income(size, unit, practices), expected);
    }

    #[test]
    fn test_income_recomputation_is_idempotent() {
        let mut farmer = Farmer::new("a@example.com", None);

        for _ in 0..2 {
            let update = FarmerUpdate {
                land_size: Some(5.0),
                land_unit: Some(LandUnit::Hectares),
                sustainable_practices: Some(vec![]),
                ..Default::default()
            };
            update.apply(&mut farmer);
            assert_eq!(farmer.estimated_income, 5000);
        }
    }

    #[test]
    fn test_update_without_land_fields_keeps_income() {
        let reg = RegistrationData {
            land_size: Some(2.0),
            land_unit: Some(LandUnit::Hectares),
            ..Default::default()
        };
        let mut farmer = Farmer::new("b@example.com", Some(reg));
        assert_eq!(farmer.estimated_income, 2000);

        let update = FarmerUpdate {
            name: Some("Ravi".to_string()),
            ..Default::default()
        };
        update.apply(&mut farmer);
        assert_eq!(farmer.estimated_income, 2000);
        assert_eq!(farmer.name, "Ravi");
    }

    #[test]
    fn test_practices_change_triggers_recompute() {
        let reg = RegistrationData {
            land_size: Some(10.0),
            land_unit: Some(LandUnit::Acres),
            ..Default::default()
        };
        let mut farmer = Farmer::new("c@example.com", Some(reg));
        assert_eq!(farmer.estimated_income, 4050);

        let update = FarmerUpdate {
            sustainable_practices: Some(vec![
                "cover-cropping".to_string(),
                "no-till".to_string(),
            ]),
            ..Default::default()
        };
        update.apply(&mut farmer);
        assert_eq!(farmer.estimated_income, 4860);
    }

    #[test]
    fn test_new_farmer_defaults() {
        let farmer = Farmer::new("New.Grower@Example.COM", None);
        assert_eq!(farmer.email, "new.grower@example.com");
        assert_eq!(farmer.estimated_income, 0);
        assert_eq!(farmer.land_unit, LandUnit::Acres);
        assert!(farmer.primary_crops.is_empty());
        assert!(farmer.coordinates.is_none());
    }

    #[test]
    fn test_farmer_serializes_id_as_mongo_id() {
        let farmer = Farmer::new("d@example.com", None);
        let json = serde_json::to_value(&farmer).unwrap();
        assert_eq!(json["_id"], serde_json::Value::String(farmer.id.clone()));
        assert!(json.get("landSize").is_some());
        assert!(json.get("estimatedIncome").is_some());
    }

    #[test]
    fn test_admin_role_is_fixed() {
        let admin = Admin::new("ops@agricarbon.io", "Ops");
        assert_eq!(admin.role, "admin");
    }
}

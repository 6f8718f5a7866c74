//! The health profile behind the personal QR code.
//!
//! Profile fields are free text passed through as entered, apart from a few light checks:
//! a name is required, a date of birth must be a real past `YYYY-MM-DD` date, and a blood
//! group must be one of the eight ABO/Rh groups. Empty optional fields stay empty strings.

use crate::{CareError, CareResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

const DOB_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthProfile {
    pub name: String,
    pub dob: String,
    pub gender: String,
    pub blood_group: String,
    pub disease: String,
    pub allergies: String,
    pub address: String,
    pub parent_name: String,
    pub parent_contact: String,
    pub emergency_contact: String,
    pub doctor_name: String,
    pub doctor_contact: String,
}

impl HealthProfile {
    /// Trim every field and upper-case the blood group.
    pub fn normalised(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.dob,
            &mut self.gender,
            &mut self.blood_group,
            &mut self.disease,
            &mut self.allergies,
            &mut self.address,
            &mut self.parent_name,
            &mut self.parent_contact,
            &mut self.emergency_contact,
            &mut self.doctor_name,
            &mut self.doctor_contact,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
        self.blood_group = self.blood_group.to_ascii_uppercase();
        self
    }

    /// Parsed date of birth, if one was given.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if `dob` is not a `YYYY-MM-DD` date.
    pub fn date_of_birth(&self) -> CareResult<Option<NaiveDate>> {
        let dob = self.dob.trim();
        if dob.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(dob, DOB_FORMAT)
            .map(Some)
            .map_err(|e| CareError::InvalidInput(format!("dob {dob:?} is not YYYY-MM-DD: {e}")))
    }

    /// Check the profile.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` naming the first field that fails.
    pub fn validate(&self) -> CareResult<()> {
        if self.name.trim().is_empty() {
            return Err(CareError::InvalidInput("name is required".into()));
        }

        if let Some(dob) = self.date_of_birth()? {
            if dob > Utc::now().date_naive() {
                return Err(CareError::InvalidInput(format!(
                    "dob {dob} is in the future"
                )));
            }
        }

        let blood_group = self.blood_group.trim();
        if !blood_group.is_empty() && !BLOOD_GROUPS.contains(&blood_group) {
            return Err(CareError::InvalidInput(format!(
                "blood group {blood_group:?} must be one of {}",
                BLOOD_GROUPS.join(", ")
            )));
        }

        Ok(())
    }

    /// Compact JSON encoded into the QR code.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if the profile fails validation.
    pub fn qr_payload(&self) -> CareResult<String> {
        self.validate()?;
        serde_json::to_string(self).map_err(CareError::Serialization)
    }

    /// Read a profile from a JSON file. Missing fields default to empty.
    ///
    /// # Errors
    ///
    /// Returns `CareError::FileRead` or `CareError::Deserialization`.
    pub fn load(path: &Path) -> CareResult<Self> {
        let raw = fs::read_to_string(path).map_err(CareError::FileRead)?;
        let profile: Self = serde_json::from_str(&raw).map_err(CareError::Deserialization)?;
        Ok(profile.normalised())
    }

    /// Write the profile as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `CareError::Serialization` or `CareError::FileWrite`.
    pub fn save(&self, path: &Path) -> CareResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(CareError::Serialization)?;
        fs::write(path, json).map_err(CareError::FileWrite)
    }
}

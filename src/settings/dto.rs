use serde::{de, Deserialize, Deserializer, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::repo_types::Settings;
use crate::error::FieldError;
use crate::validation::is_valid_phone;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    #[serde(flatten)]
    pub settings: Settings,
    /// Whether checkout is currently open, taking the resume time into account.
    pub is_open: bool,
}

/// Admin settings update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    #[serde(default)]
    pub pickup_point: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub upi_id: Option<String>,
    /// Empty string clears the QR image.
    #[serde(default)]
    pub upi_qr_url: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub accepting_orders: Option<bool>,
    /// `Some(None)` clears the resume time.
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub resume_at: Option<Option<OffsetDateTime>>,
}

impl SettingsPatch {
    pub fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("pickupPoint", &mut self.pickup_point),
            ("contactPhone", &mut self.contact_phone),
            ("upiId", &mut self.upi_id),
            ("upiQrUrl", &mut self.upi_qr_url),
        ] {
            if let Some(v) = value.as_mut() {
                *v = v.trim().to_string();
                if v.chars().count() > 500 {
                    errors.push(FieldError::new(field, "must be at most 500 characters"));
                }
            }
        }

        if matches!(self.pickup_point.as_deref(), Some("")) {
            errors.push(FieldError::new("pickupPoint", "must not be empty"));
        }
        if let Some(phone) = self.contact_phone.as_deref() {
            if !is_valid_phone(phone) {
                errors.push(FieldError::new("contactPhone", "must be 10 to 13 digits"));
            }
        }
        if let Some(upi) = self.upi_id.as_deref() {
            if !upi.is_empty() && !upi.contains('@') {
                errors.push(FieldError::new("upiId", "must look like name@bank"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBool {
    Bool(bool),
    Int(i64),
    Text(String),
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn flexible_bool<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawBool>::deserialize(d)? {
        None => Ok(None),
        Some(RawBool::Bool(b)) => Ok(Some(b)),
        Some(RawBool::Int(0)) => Ok(Some(false)),
        Some(RawBool::Int(1)) => Ok(Some(true)),
        Some(RawBool::Int(n)) => Err(de::Error::custom(format!("invalid boolean {}", n))),
        Some(RawBool::Text(s)) => parse_bool(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid boolean {:?}", s))),
    }
}

fn flexible_datetime<'de, D>(d: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(d)? {
        None => Ok(Some(None)),
        Some(s) if s.trim().is_empty() => Ok(Some(None)),
        Some(s) => OffsetDateTime::parse(s.trim(), &Rfc3339)
            .map(|t| Some(Some(t)))
            .map_err(|e| de::Error::custom(format!("invalid date {:?}: {}", s, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn patch(json: &str) -> SettingsPatch {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn booleans_accept_strings_and_numbers() {
        assert_eq!(patch(r#"{"acceptingOrders":"true"}"#).accepting_orders, Some(true));
        assert_eq!(patch(r#"{"acceptingOrders":"off"}"#).accepting_orders, Some(false));
        assert_eq!(patch(r#"{"acceptingOrders":0}"#).accepting_orders, Some(false));
        assert_eq!(patch(r#"{"acceptingOrders":true}"#).accepting_orders, Some(true));
        assert_eq!(patch(r#"{}"#).accepting_orders, None);
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"acceptingOrders":"maybe"}"#).is_err());
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"acceptingOrders":7}"#).is_err());
    }

    #[test]
    fn resume_at_parses_and_clears() {
        assert_eq!(
            patch(r#"{"resumeAt":"2024-05-01T18:30:00+05:30"}"#).resume_at,
            Some(Some(datetime!(2024-05-01 13:00 UTC)))
        );
        assert_eq!(patch(r#"{"resumeAt":null}"#).resume_at, Some(None));
        assert_eq!(patch(r#"{"resumeAt":""}"#).resume_at, Some(None));
        assert_eq!(patch(r#"{}"#).resume_at, None);
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"resumeAt":"tomorrow"}"#).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"isAdmin":true}"#).is_err());
    }

    #[test]
    fn validate_trims_and_checks_fields() {
        let mut p = patch(r#"{"pickupPoint":"  Block 7 gate ","contactPhone":"98765"}"#);
        let errors = p.validate().unwrap_err();
        assert_eq!(p.pickup_point.as_deref(), Some("Block 7 gate"));
        assert_eq!(errors, vec![FieldError::new("contactPhone", "must be 10 to 13 digits")]);

        let mut ok = patch(r#"{"upiId":"snackit@okaxis","upiQrUrl":""}"#);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.upi_qr_url.as_deref(), Some(""));
    }
}

use serde::Serialize;
use sqlx::FromRow;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// The single row of store-wide settings.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub pickup_point: String,
    pub contact_phone: String,
    pub upi_id: String,
    pub upi_qr_url: Option<String>,
    pub accepting_orders: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resume_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Settings {
    /// Orders are accepted while the flag is on, or once a resume time
    /// scheduled after the last settings change has passed.
    pub fn is_accepting_orders(&self, now: OffsetDateTime) -> bool {
        self.accepting_orders
            || self
                .resume_at
                .is_some_and(|at| at > self.updated_at && now >= at)
    }

    pub fn closed_message(&self, now: OffsetDateTime) -> String {
        match self.resume_at.filter(|at| *at > now) {
            Some(at) => format!(
                "We are not accepting orders right now. Ordering resumes at {}",
                at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
            ),
            None => "We are not accepting orders right now".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn settings(accepting: bool, resume_at: Option<OffsetDateTime>) -> Settings {
        Settings {
            pickup_point: "Gate 2".into(),
            contact_phone: "9876543210".into(),
            upi_id: "snackit@upi".into(),
            upi_qr_url: None,
            accepting_orders: accepting,
            resume_at,
            updated_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn flag_on_accepts() {
        assert!(settings(true, None).is_accepting_orders(datetime!(2024-05-01 12:00 UTC)));
    }

    #[test]
    fn paused_until_resume_time() {
        let s = settings(false, Some(datetime!(2024-05-01 18:00 UTC)));
        assert!(!s.is_accepting_orders(datetime!(2024-05-01 17:59 UTC)));
        assert!(s.is_accepting_orders(datetime!(2024-05-01 18:00 UTC)));
        assert!(s
            .closed_message(datetime!(2024-05-01 17:00 UTC))
            .contains("2024-05-01T18:00:00Z"));
    }

    #[test]
    fn flag_pause_after_passed_resume_time_stays_closed() {
        let mut s = settings(false, Some(datetime!(2024-05-01 18:00 UTC)));
        s.updated_at = datetime!(2024-05-02 09:00 UTC);
        assert!(!s.is_accepting_orders(datetime!(2024-05-02 10:00 UTC)));
        assert_eq!(
            s.closed_message(datetime!(2024-05-02 10:00 UTC)),
            "We are not accepting orders right now"
        );
    }

    #[test]
    fn paused_without_resume_time_stays_closed() {
        let s = settings(false, None);
        assert!(!s.is_accepting_orders(datetime!(2030-01-01 00:00 UTC)));
        assert_eq!(
            s.closed_message(datetime!(2030-01-01 00:00 UTC)),
            "We are not accepting orders right now"
        );
    }
}

use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records supplied by the host application
// ---------------------------------------------------------------------------

/// The signed-in user, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// A populated reference to another record (e.g. `doctorId: { name: ... }`).
/// Hosts sometimes send these half-filled, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
    #[default]
    #[serde(other)]
    Other,
}

impl AppointmentStatus {
    /// Appointments that can still happen.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Approved | Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, rename = "doctorId", alias = "doctor")]
    pub doctor: Option<RecordRef>,
    #[serde(default, rename = "hospitalId", alias = "hospital")]
    pub hospital: Option<RecordRef>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Appointment {
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        parse_date(&self.date)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Paid,
    Unpaid,
    Pending,
    #[default]
    #[serde(other)]
    Other,
}

impl BillStatus {
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Unpaid | Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub date: String,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default, rename = "doctorId", alias = "doctor")]
    pub doctor: Option<RecordRef>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub available_beds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
}

// ---------------------------------------------------------------------------
// Session data
// ---------------------------------------------------------------------------

/// Everything the dialogue renders from. Owned by the host; the engine only
/// writes the derived fields at the bottom, and only through a [`SessionPatch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionData {
    pub user: Option<User>,
    pub appointments: Vec<Appointment>,
    pub bills: Vec<Bill>,
    pub prescriptions: Vec<Prescription>,
    pub hospitals: Vec<Hospital>,
    pub doctors: Vec<Doctor>,

    /// Derived by the `find_next_appointment` action.
    pub next_appointment: Option<Appointment>,
    /// Derived by the `find_latest_prescription` action.
    pub latest_prescription: Option<Prescription>,
}

impl SessionData {
    /// Read host data from a JSON file.
    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session data in {path}"))
    }

    /// Shallow merge: each field named by the patch is overwritten, every
    /// other field stays as it was.
    pub fn merge(&mut self, patch: SessionPatch) {
        for field in patch.fields {
            match field {
                DerivedField::NextAppointment(value) => self.next_appointment = value,
                DerivedField::LatestPrescription(value) => self.latest_prescription = value,
            }
        }
    }

    /// Replace host-owned collections with a fresh copy. Derived fields the
    /// fresh copy doesn't carry are kept, so a refresh between renders does
    /// not wipe what an earlier action computed.
    pub fn refresh(&mut self, fresh: SessionData) {
        let next_appointment = fresh.next_appointment.or(self.next_appointment.take());
        let latest_prescription = fresh
            .latest_prescription
            .or(self.latest_prescription.take());
        *self = SessionData {
            next_appointment,
            latest_prescription,
            ..fresh
        };
    }

    pub fn outstanding_bills(&self) -> impl Iterator<Item = &Bill> {
        self.bills.iter().filter(|b| b.status.is_outstanding())
    }
}

/// A field the engine is allowed to write.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedField {
    NextAppointment(Option<Appointment>),
    LatestPrescription(Option<Prescription>),
}

/// Partial session update returned by an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    fields: Vec<DerivedField>,
}

impl SessionPatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: DerivedField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[DerivedField] {
        &self.fields
    }
}

/// Parse the date formats the host sends: plain `YYYY-MM-DD` or a full
/// RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(date: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: None,
            date: date.into(),
            time: None,
            status,
            doctor: None,
            hospital: None,
            reason: None,
        }
    }

    #[test]
    fn test_deserialize_host_payload() {
        let raw = r#"{
            "user": {"name": "Asha", "role": "patient"},
            "appointments": [
                {"_id": "a1", "date": "2024-06-01", "status": "approved",
                 "doctorId": {"name": "Rao", "specialization": "Cardiology"}},
                {"date": "2024-05-01", "status": "rescheduled"}
            ],
            "bills": [{"amount": 120.5, "status": "unpaid"}]
        }"#;
        let data: SessionData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.user.as_ref().unwrap().name, "Asha");
        assert_eq!(data.appointments[0].id.as_deref(), Some("a1"));
        assert_eq!(
            data.appointments[0].doctor.as_ref().unwrap().name.as_deref(),
            Some("Rao")
        );
        assert_eq!(data.appointments[1].status, AppointmentStatus::Other);
        assert_eq!(data.outstanding_bills().count(), 1);
        assert!(data.prescriptions.is_empty());
    }

    #[test]
    fn test_demo_session_parses() {
        let data: SessionData = serde_json::from_str(include_str!("../demos/session.json")).unwrap();
        assert_eq!(data.appointments.len(), 3);
        assert_eq!(data.hospitals[0].available_beds, Some(14));
        assert!(data.next_appointment.is_none());
    }

    #[test]
    fn test_merge_overwrites_only_patched_fields() {
        let mut data = SessionData {
            appointments: vec![appointment("2024-05-01", AppointmentStatus::Pending)],
            ..Default::default()
        };
        let before = data.appointments.clone();
        let next = appointment("2024-05-01", AppointmentStatus::Pending);

        data.merge(SessionPatch::empty().with(DerivedField::NextAppointment(Some(next.clone()))));

        assert_eq!(data.next_appointment, Some(next));
        assert_eq!(data.appointments, before);
        assert_eq!(data.latest_prescription, None);
    }

    #[test]
    fn test_merge_can_clear_a_derived_field() {
        let mut data = SessionData {
            next_appointment: Some(appointment("2024-05-01", AppointmentStatus::Approved)),
            ..Default::default()
        };
        data.merge(SessionPatch::empty().with(DerivedField::NextAppointment(None)));
        assert!(data.next_appointment.is_none());
    }

    #[test]
    fn test_empty_patch_is_a_no_op() {
        let mut data = SessionData {
            bills: vec![Bill {
                id: None,
                amount: 10.0,
                status: BillStatus::Paid,
                description: None,
                date: None,
            }],
            ..Default::default()
        };
        let before = data.clone();
        data.merge(SessionPatch::empty());
        assert_eq!(data, before);
    }

    #[test]
    fn test_refresh_keeps_derived_fields() {
        let next = appointment("2024-05-01", AppointmentStatus::Approved);
        let mut data = SessionData {
            next_appointment: Some(next.clone()),
            ..Default::default()
        };
        let fresh = SessionData {
            appointments: vec![next.clone()],
            ..Default::default()
        };
        data.refresh(fresh);
        assert_eq!(data.appointments.len(), 1);
        assert_eq!(data.next_appointment, Some(next));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("2024-05-01T09:30:00Z").is_some());
        assert!(parse_date("2024-05-01T09:30:00+05:30").is_some());
        assert!(parse_date("next tuesday").is_none());
        assert!(parse_date("2024-05-01T09:30:00Z") > parse_date("2024-05-01"));
    }
}

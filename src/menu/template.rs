use std::fmt::Write as _;
use std::sync::LazyLock;

use log::{trace, warn};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::session::{parse_date, RecordRef, SessionData};

/// Shown in place of any message that fails to render.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't load that information right now. Please try again later.";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("placeholder `{0}` does not name a text or number value")]
    NotScalar(String),
    #[error("failed to serialize session data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How a node's bot message is produced.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTemplate {
    /// Used verbatim.
    Static(String),
    /// Text with `{{dotted.path}}` placeholders looked up in the session,
    /// using the session's JSON field names (e.g. `{{user.name}}`).
    Text(String),
    /// A message computed from session collections.
    Summary(Summary),
}

impl MessageTemplate {
    pub fn render(&self, session: &SessionData) -> Result<String, TemplateError> {
        match self {
            Self::Static(text) => Ok(text.clone()),
            Self::Text(text) => interpolate(text, session),
            Self::Summary(summary) => summary.render(session),
        }
    }
}

/// Render a node's message, swapping in [`FALLBACK_MESSAGE`] if it fails.
/// One malformed record must not take the whole dialogue down.
pub fn render_or_fallback(node_id: &str, template: &MessageTemplate, session: &SessionData) -> String {
    match template.render(session) {
        Ok(text) => {
            trace!("Rendered {node_id}: {text}");
            text
        }
        Err(e) => {
            warn!("Message for '{node_id}' failed to render ({e}). Using fallback.");
            FALLBACK_MESSAGE.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Placeholder interpolation
// ---------------------------------------------------------------------------

fn interpolate(text: &str, session: &SessionData) -> Result<String, TemplateError> {
    if !PLACEHOLDER.is_match(text) {
        return Ok(text.to_string());
    }

    let root = serde_json::to_value(session)?;
    let mut failure = None;
    let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures| {
        let path = &caps[1];
        match lookup(&root, path) {
            Ok(value) => value,
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(rendered.into_owned()),
    }
}

fn lookup(root: &Value, path: &str) -> Result<String, TemplateError> {
    let pointer = format!("/{}", path.replace('.', "/"));
    match root.pointer(&pointer) {
        None | Some(Value::Null) => Err(TemplateError::MissingField(path.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(TemplateError::NotScalar(path.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Collection summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Summary {
    Greeting,
    Appointments,
    AppointmentList,
    NextAppointment,
    Bills,
    Prescriptions,
    LatestPrescription,
    Hospitals,
    Doctors,
}

impl Summary {
    pub fn render(self, session: &SessionData) -> Result<String, TemplateError> {
        match self {
            Self::Greeting => Ok(greeting(session)),
            Self::Appointments => Ok(appointments_overview(session)),
            Self::AppointmentList => appointment_list(session),
            Self::NextAppointment => next_appointment(session),
            Self::Bills => Ok(bills(session)),
            Self::Prescriptions => prescriptions(session),
            Self::LatestPrescription => latest_prescription(session),
            Self::Hospitals => Ok(hospitals(session)),
            Self::Doctors => Ok(doctors(session)),
        }
    }
}

fn greeting(session: &SessionData) -> String {
    let name = session.user.as_ref().map_or("there", |u| u.name.as_str());
    format!("Hi {name}! 👋 I'm your hospital assistant. How can I help you today?")
}

fn appointments_overview(session: &SessionData) -> String {
    let total = session.appointments.len();
    if total == 0 {
        return "You don't have any appointments yet. Would you like to book one?".into();
    }
    let upcoming = session
        .appointments
        .iter()
        .filter(|a| a.status.is_active())
        .count();
    format!(
        "You have {total} appointment{}, {upcoming} upcoming. What would you like to do?",
        plural(total)
    )
}

fn appointment_list(session: &SessionData) -> Result<String, TemplateError> {
    if session.appointments.is_empty() {
        return Ok("You don't have any appointments yet.".into());
    }
    let mut out = String::from("Here are your appointments:");
    for (i, a) in session.appointments.iter().enumerate() {
        let doctor = doctor_name(a.doctor.as_ref(), &format!("appointments.{i}.doctorId.name"))?;
        let _ = write!(
            out,
            "\n• {} with Dr. {doctor} ({:?})",
            display_date(&a.date),
            a.status
        );
    }
    Ok(out)
}

fn next_appointment(session: &SessionData) -> Result<String, TemplateError> {
    let Some(a) = &session.next_appointment else {
        return Ok("You have no upcoming appointments.".into());
    };
    let doctor = doctor_name(a.doctor.as_ref(), "nextAppointment.doctorId.name")?;
    let mut out = format!("Your next appointment is on {}", display_date(&a.date));
    if let Some(time) = &a.time {
        let _ = write!(out, " at {time}");
    }
    let _ = write!(out, " with Dr. {doctor} ({:?}).", a.status);
    if let Some(hospital) = a.hospital.as_ref().and_then(|h| h.name.as_deref()) {
        let _ = write!(out, " Location: {hospital}.");
    }
    Ok(out)
}

fn bills(session: &SessionData) -> String {
    if session.bills.is_empty() {
        return "You have no bills yet.".into();
    }
    let outstanding: f64 = session.outstanding_bills().map(|b| b.amount).sum();
    let mut out = format!(
        "You have {} bill{}. Outstanding: {outstanding:.2}",
        session.bills.len(),
        plural(session.bills.len())
    );
    for b in &session.bills {
        let _ = write!(
            out,
            "\n• {}: {:.2} ({:?})",
            b.description.as_deref().unwrap_or("Bill"),
            b.amount,
            b.status
        );
    }
    out
}

fn prescriptions(session: &SessionData) -> Result<String, TemplateError> {
    if session.prescriptions.is_empty() {
        return Ok("You have no prescriptions yet.".into());
    }
    let mut out = format!(
        "You have {} prescription{}:",
        session.prescriptions.len(),
        plural(session.prescriptions.len())
    );
    for (i, p) in session.prescriptions.iter().enumerate() {
        let doctor = doctor_name(p.doctor.as_ref(), &format!("prescriptions.{i}.doctorId.name"))?;
        let medicines: Vec<&str> = p.medicines.iter().map(|m| m.name.as_str()).collect();
        let _ = write!(
            out,
            "\n• {} - Dr. {doctor}: {}",
            display_date(&p.date),
            medicines.join(", ")
        );
    }
    Ok(out)
}

fn latest_prescription(session: &SessionData) -> Result<String, TemplateError> {
    let Some(p) = &session.latest_prescription else {
        return Ok("No prescriptions found.".into());
    };
    let doctor = doctor_name(p.doctor.as_ref(), "latestPrescription.doctorId.name")?;
    let mut out = format!(
        "Your latest prescription is from Dr. {doctor} on {}:",
        display_date(&p.date)
    );
    for m in &p.medicines {
        match &m.dosage {
            Some(dosage) => {
                let _ = write!(out, "\n• {} ({dosage})", m.name);
            }
            None => {
                let _ = write!(out, "\n• {}", m.name);
            }
        }
    }
    if let Some(notes) = &p.notes {
        let _ = write!(out, "\nNotes: {notes}");
    }
    Ok(out)
}

fn hospitals(session: &SessionData) -> String {
    if session.hospitals.is_empty() {
        return "No hospitals are listed right now.".into();
    }
    let mut out = String::from("Here are the hospitals near you:");
    for h in &session.hospitals {
        let _ = write!(out, "\n• {}", h.name);
        if let Some(address) = &h.address {
            let _ = write!(out, " ({address})");
        }
        if let Some(beds) = h.available_beds {
            let _ = write!(out, " - {beds} bed{} available", plural(beds as usize));
        }
    }
    out
}

fn doctors(session: &SessionData) -> String {
    if session.doctors.is_empty() {
        return "No doctors are listed right now.".into();
    }
    let mut out = String::from("Our doctors:");
    for d in &session.doctors {
        let _ = write!(out, "\n• Dr. {}", d.name);
        if let Some(spec) = &d.specialization {
            let _ = write!(out, ", {spec}");
        }
        if let Some(hospital) = &d.hospital {
            let _ = write!(out, " at {hospital}");
        }
    }
    out
}

fn doctor_name<'a>(doctor: Option<&'a RecordRef>, path: &str) -> Result<&'a str, TemplateError> {
    doctor
        .and_then(|d| d.name.as_deref())
        .ok_or_else(|| TemplateError::MissingField(path.to_string()))
}

/// "2024-05-01" -> "May 1, 2024". Unparseable dates are shown as sent.
fn display_date(raw: &str) -> String {
    parse_date(raw).map_or_else(|| raw.to_string(), |d| d.format("%B %-d, %Y").to_string())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

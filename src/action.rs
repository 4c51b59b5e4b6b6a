use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::session::{
    parse_date, Appointment, DerivedField, Prescription, SessionData, SessionPatch,
};

// ---------------------------------------------------------------------------
// Host commands
// ---------------------------------------------------------------------------

/// Outbound signal the host application interprets. The engine never
/// navigates or closes anything itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostCommand {
    Navigate { target: String },
    Close,
}

impl HostCommand {
    pub fn navigate(target: impl Into<String>) -> Self {
        Self::Navigate {
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// Pure computations over the session that produce a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Earliest approved or pending appointment.
    NextAppointment,
    /// Most recent prescription.
    LatestPrescription,
}

impl Derivation {
    pub fn derive(self, session: &SessionData) -> SessionPatch {
        match self {
            Self::NextAppointment => SessionPatch::empty()
                .with(DerivedField::NextAppointment(next_appointment(session))),
            Self::LatestPrescription => SessionPatch::empty()
                .with(DerivedField::LatestPrescription(latest_prescription(session))),
        }
    }
}

fn next_appointment(session: &SessionData) -> Option<Appointment> {
    let mut candidates: Vec<(NaiveDateTime, &Appointment)> = session
        .appointments
        .iter()
        .filter(|a| a.status.is_active())
        .filter_map(|a| match a.scheduled_at() {
            Some(at) => Some((at, a)),
            None => {
                warn!("Skipping appointment with unreadable date '{}'", a.date);
                None
            }
        })
        .collect();

    // Stable: equal dates keep collection order.
    candidates.sort_by_key(|(at, _)| *at);
    candidates.first().map(|(_, a)| (*a).clone())
}

fn latest_prescription(session: &SessionData) -> Option<Prescription> {
    let mut candidates: Vec<(NaiveDateTime, &Prescription)> = session
        .prescriptions
        .iter()
        .filter_map(|p| match parse_date(&p.date) {
            Some(at) => Some((at, p)),
            None => {
                warn!("Skipping prescription with unreadable date '{}'", p.date);
                None
            }
        })
        .collect();

    candidates.sort_by(|(a, _), (b, _)| b.cmp(a));
    candidates.first().map(|(_, p)| (*p).clone())
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Writes derived fields into the session.
    Derive(Derivation),
    /// Signals the host; leaves the session alone.
    Command(HostCommand),
    /// Data fetch the host has already performed. Does nothing.
    Placeholder,
}

/// What dispatching one action produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub patch: SessionPatch,
    pub command: Option<HostCommand>,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.command.is_none()
    }
}

/// Action name -> action table.
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    table: HashMap<String, Action>,
}

impl ActionDispatcher {
    /// The actions the patient assistant question tree refers to.
    pub fn patient_assistant() -> Self {
        let mut dispatcher = Self::default();
        let actions = [
            ("find_next_appointment", Action::Derive(Derivation::NextAppointment)),
            ("find_latest_prescription", Action::Derive(Derivation::LatestPrescription)),
            ("open_appointments", Action::Command(HostCommand::navigate("appointments"))),
            ("book_appointment", Action::Command(HostCommand::navigate("book-appointment"))),
            ("open_prescriptions", Action::Command(HostCommand::navigate("prescriptions"))),
            ("open_bills", Action::Command(HostCommand::navigate("bills"))),
            ("pay_bill", Action::Command(HostCommand::navigate("payments"))),
            ("open_hospitals", Action::Command(HostCommand::navigate("hospitals"))),
            ("close_chat", Action::Command(HostCommand::Close)),
            ("fetch_appointments", Action::Placeholder),
            ("fetch_prescriptions", Action::Placeholder),
            ("fetch_bills", Action::Placeholder),
            ("fetch_hospitals", Action::Placeholder),
        ];
        for (name, action) in actions {
            dispatcher.register(name, action);
        }
        dispatcher
    }

    /// Add or replace an action. Returns the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, action: Action) -> Option<Action> {
        self.table.insert(name.into(), action)
    }

    pub fn lookup(&self, name: &str) -> Option<&Action> {
        self.table.get(name)
    }

    /// Run the named action against the session. Unknown names produce an
    /// empty dispatch.
    pub fn dispatch(&self, name: &str, session: &SessionData) -> Dispatch {
        let Some(action) = self.lookup(name) else {
            warn!("Unknown action '{name}'. Ignoring.");
            return Dispatch::default();
        };

        debug!("Dispatching '{name}' -> {action:?}");
        match action {
            Action::Derive(derivation) => Dispatch {
                patch: derivation.derive(session),
                command: None,
            },
            Action::Command(command) => Dispatch {
                patch: SessionPatch::empty(),
                command: Some(command.clone()),
            },
            Action::Placeholder => Dispatch::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AppointmentStatus, Medicine};

    fn appointment(date: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Some(date.into()),
            date: date.into(),
            time: None,
            status,
            doctor: None,
            hospital: None,
            reason: None,
        }
    }

    fn prescription(id: &str, date: &str) -> Prescription {
        Prescription {
            id: Some(id.into()),
            date: date.into(),
            medicines: vec![Medicine {
                name: "Paracetamol".into(),
                dosage: None,
            }],
            doctor: None,
            notes: None,
        }
    }

    fn derived_next(dispatch: &Dispatch) -> Option<&Appointment> {
        match dispatch.patch.fields() {
            [DerivedField::NextAppointment(a)] => a.as_ref(),
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn test_next_appointment_picks_earliest_active() {
        let data = SessionData {
            appointments: vec![
                appointment("2024-06-01", AppointmentStatus::Approved),
                appointment("2024-05-01", AppointmentStatus::Pending),
            ],
            ..Default::default()
        };
        let dispatch = ActionDispatcher::patient_assistant().dispatch("find_next_appointment", &data);
        assert_eq!(derived_next(&dispatch).unwrap().date, "2024-05-01");
        assert!(dispatch.command.is_none());
    }

    #[test]
    fn test_next_appointment_skips_inactive_and_unreadable() {
        let data = SessionData {
            appointments: vec![
                appointment("2024-01-01", AppointmentStatus::Completed),
                appointment("2024-02-01", AppointmentStatus::Cancelled),
                appointment("soon", AppointmentStatus::Approved),
                appointment("2024-09-01", AppointmentStatus::Approved),
            ],
            ..Default::default()
        };
        let dispatch = ActionDispatcher::patient_assistant().dispatch("find_next_appointment", &data);
        assert_eq!(derived_next(&dispatch).unwrap().date, "2024-09-01");
    }

    #[test]
    fn test_next_appointment_ties_keep_collection_order() {
        let mut first = appointment("2024-05-01", AppointmentStatus::Pending);
        first.id = Some("first".into());
        let mut second = appointment("2024-05-01", AppointmentStatus::Approved);
        second.id = Some("second".into());
        let data = SessionData {
            appointments: vec![first, second],
            ..Default::default()
        };
        let dispatch = ActionDispatcher::patient_assistant().dispatch("find_next_appointment", &data);
        assert_eq!(derived_next(&dispatch).unwrap().id.as_deref(), Some("first"));
    }

    #[test]
    fn test_next_appointment_none_still_patches() {
        let dispatch = ActionDispatcher::patient_assistant()
            .dispatch("find_next_appointment", &SessionData::default());
        assert!(!dispatch.patch.is_empty());
        assert!(derived_next(&dispatch).is_none());
    }

    #[test]
    fn test_latest_prescription_ties_keep_collection_order() {
        let data = SessionData {
            prescriptions: vec![
                prescription("old", "2023-01-01"),
                prescription("a", "2024-03-01"),
                prescription("b", "2024-03-01"),
            ],
            ..Default::default()
        };
        let dispatch =
            ActionDispatcher::patient_assistant().dispatch("find_latest_prescription", &data);
        match dispatch.patch.fields() {
            [DerivedField::LatestPrescription(Some(p))] => assert_eq!(p.id.as_deref(), Some("a")),
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn test_command_actions_leave_session_alone() {
        let dispatcher = ActionDispatcher::patient_assistant();
        let dispatch = dispatcher.dispatch("open_appointments", &SessionData::default());
        assert!(dispatch.patch.is_empty());
        assert_eq!(dispatch.command, Some(HostCommand::navigate("appointments")));

        let dispatch = dispatcher.dispatch("close_chat", &SessionData::default());
        assert_eq!(dispatch.command, Some(HostCommand::Close));
    }

    #[test]
    fn test_placeholder_and_unknown_are_empty() {
        let dispatcher = ActionDispatcher::patient_assistant();
        assert!(dispatcher.dispatch("fetch_bills", &SessionData::default()).is_empty());
        assert!(dispatcher.dispatch("summon_dragon", &SessionData::default()).is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let mut dispatcher = ActionDispatcher::patient_assistant();
        let old = dispatcher.register("close_chat", Action::Placeholder);
        assert_eq!(old, Some(Action::Command(HostCommand::Close)));
        assert_eq!(dispatcher.lookup("close_chat"), Some(&Action::Placeholder));
    }

    #[test]
    fn test_host_command_wire_format() {
        assert_eq!(
            serde_json::to_value(HostCommand::navigate("appointments")).unwrap(),
            serde_json::json!({"kind": "navigate", "target": "appointments"})
        );
        assert_eq!(
            serde_json::to_value(HostCommand::Close).unwrap(),
            serde_json::json!({"kind": "close"})
        );
    }
}

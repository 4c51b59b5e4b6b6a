use serde::Deserialize;

use crate::menu::template::MessageTemplate;
use crate::menu::ROOT_ID;
use crate::session::SessionData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Offers sub-menus.
    Menu,
    /// Shows a single piece of information.
    Info,
    /// Lists records from the session.
    List,
}

/// A single node in the dialogue graph.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionNode {
    /// Unique identifier (e.g. "main", "bills_menu").
    pub id: String,
    pub kind: QuestionKind,
    /// What the bot says when entering this node.
    pub message: MessageTemplate,
    /// Declaration order is render order.
    #[serde(default)]
    pub options: Vec<OptionNode>,
    /// Semantic parent menu. Going back from this node lands here.
    #[serde(default = "root_id")]
    pub back_target: String,
}

fn root_id() -> String {
    ROOT_ID.into()
}

impl QuestionNode {
    pub fn new(id: impl Into<String>, kind: QuestionKind, message: MessageTemplate) -> Self {
        Self {
            id: id.into(),
            kind,
            message,
            options: Vec::new(),
            back_target: root_id(),
        }
    }

    pub fn back_to(mut self, target: impl Into<String>) -> Self {
        self.back_target = target.into();
        self
    }

    pub fn option(mut self, option: OptionNode) -> Self {
        self.options.push(option);
        self
    }
}

/// A selectable choice attached to a [`QuestionNode`].
#[derive(Debug, Clone, Deserialize)]
pub struct OptionNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub emoji: String,
    /// Node to move to after selection. `None` keeps the dialogue where it is.
    #[serde(default)]
    pub next_id: Option<String>,
    /// Action name handed to the dispatcher.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub visible_if: Option<Predicate>,
}

impl OptionNode {
    pub fn new(id: impl Into<String>, emoji: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            emoji: emoji.into(),
            next_id: None,
            action: None,
            visible_if: None,
        }
    }

    pub fn to(mut self, next_id: impl Into<String>) -> Self {
        self.next_id = Some(next_id.into());
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn visible_if(mut self, predicate: Predicate) -> Self {
        self.visible_if = Some(predicate);
        self
    }

    pub fn is_visible(&self, session: &SessionData) -> bool {
        self.visible_if
            .as_ref()
            .map_or(true, |predicate| predicate.evaluate(session))
    }

    /// Label as shown to the user, emoji first.
    pub fn display(&self) -> String {
        if self.emoji.is_empty() {
            self.label.clone()
        } else {
            format!("{} {}", self.emoji, self.label)
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility predicates
// ---------------------------------------------------------------------------

/// Pure condition over the session deciding whether an option is offered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    SignedIn,
    HasAppointments,
    /// At least one approved or pending appointment.
    HasUpcomingAppointments,
    HasNextAppointment,
    HasBills,
    HasUnpaidBills,
    HasPrescriptions,
    HasHospitals,
    HasDoctors,
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn evaluate(&self, session: &SessionData) -> bool {
        match self {
            Self::SignedIn => session.user.is_some(),
            Self::HasAppointments => !session.appointments.is_empty(),
            Self::HasUpcomingAppointments => {
                session.appointments.iter().any(|a| a.status.is_active())
            }
            Self::HasNextAppointment => session.next_appointment.is_some(),
            Self::HasBills => !session.bills.is_empty(),
            Self::HasUnpaidBills => session.outstanding_bills().next().is_some(),
            Self::HasPrescriptions => !session.prescriptions.is_empty(),
            Self::HasHospitals => !session.hospitals.is_empty(),
            Self::HasDoctors => !session.doctors.is_empty(),
            Self::Not(inner) => !inner.evaluate(session),
            Self::All(all) => all.iter().all(|p| p.evaluate(session)),
            Self::Any(any) => any.iter().any(|p| p.evaluate(session)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Bill, BillStatus};

    fn bill(status: BillStatus) -> Bill {
        Bill {
            id: None,
            amount: 50.0,
            status,
            description: None,
            date: None,
        }
    }

    #[test]
    fn test_predicates_on_empty_session() {
        let data = SessionData::default();
        assert!(!Predicate::HasBills.evaluate(&data));
        assert!(!Predicate::HasUnpaidBills.evaluate(&data));
        assert!(!Predicate::SignedIn.evaluate(&data));
        assert!(Predicate::Not(Box::new(Predicate::HasDoctors)).evaluate(&data));
        // Vacuous truth / falsity of the combinators.
        assert!(Predicate::All(vec![]).evaluate(&data));
        assert!(!Predicate::Any(vec![]).evaluate(&data));
    }

    #[test]
    fn test_unpaid_bills_ignores_paid_ones() {
        let data = SessionData {
            bills: vec![bill(BillStatus::Paid)],
            ..Default::default()
        };
        assert!(Predicate::HasBills.evaluate(&data));
        assert!(!Predicate::HasUnpaidBills.evaluate(&data));

        let data = SessionData {
            bills: vec![bill(BillStatus::Paid), bill(BillStatus::Unpaid)],
            ..Default::default()
        };
        assert!(Predicate::HasUnpaidBills.evaluate(&data));
    }

    #[test]
    fn test_predicate_from_json() {
        let p: Predicate =
            serde_json::from_str(r#"{"all": ["has_bills", {"not": "has_unpaid_bills"}]}"#)
                .unwrap();
        assert_eq!(
            p,
            Predicate::All(vec![
                Predicate::HasBills,
                Predicate::Not(Box::new(Predicate::HasUnpaidBills)),
            ])
        );
    }

    #[test]
    fn test_option_display() {
        let opt = OptionNode::new("bills", "💳", "My bills");
        assert_eq!(opt.display(), "💳 My bills");
        assert_eq!(OptionNode::new("x", "", "Plain").display(), "Plain");
    }
}

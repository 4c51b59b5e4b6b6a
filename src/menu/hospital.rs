use crate::menu::node::{OptionNode, Predicate, QuestionKind, QuestionNode};
use crate::menu::registry::{Registry, RegistryError};
use crate::menu::template::{MessageTemplate, Summary};
use crate::menu::ROOT_ID;

fn back(target: &str) -> OptionNode {
    OptionNode::new("back", "⬅️", "Back").to(target)
}

fn home() -> OptionNode {
    OptionNode::new("home", "🏠", "Main menu").to(ROOT_ID)
}

// ---------------------------------------------------------------------------
// Patient assistant question tree
// ---------------------------------------------------------------------------

pub fn patient_assistant() -> Result<Registry, RegistryError> {
    let nodes = vec![
        QuestionNode::new(
            ROOT_ID,
            QuestionKind::Menu,
            MessageTemplate::Summary(Summary::Greeting),
        )
        .back_to(ROOT_ID)
        .option(
            OptionNode::new("appointments", "📅", "My appointments")
                .to("appointments_menu")
                .action("fetch_appointments"),
        )
        .option(
            OptionNode::new("prescriptions", "💊", "My prescriptions")
                .to("prescriptions_menu")
                .action("fetch_prescriptions"),
        )
        .option(
            OptionNode::new("bills", "💳", "Bills & payments")
                .to("bills_menu")
                .action("fetch_bills"),
        )
        .option(
            OptionNode::new("hospitals", "🏥", "Find a hospital")
                .to("hospitals_list")
                .action("fetch_hospitals"),
        )
        .option(OptionNode::new("help", "❓", "Help").to("help"))
        .option(OptionNode::new("close", "❌", "Close chat").action("close_chat")),
        // --- Appointments ---
        QuestionNode::new(
            "appointments_menu",
            QuestionKind::Menu,
            MessageTemplate::Summary(Summary::Appointments),
        )
        .option(
            OptionNode::new("next_appointment", "⏰", "Next Appointment Date")
                .to("next_appointment")
                .action("find_next_appointment")
                .visible_if(Predicate::HasAppointments),
        )
        .option(
            OptionNode::new("all_appointments", "📋", "View all appointments")
                .to("appointments_list")
                .visible_if(Predicate::HasAppointments),
        )
        .option(OptionNode::new("book", "📝", "Book an appointment").action("book_appointment"))
        .option(back(ROOT_ID)),
        QuestionNode::new(
            "next_appointment",
            QuestionKind::Info,
            MessageTemplate::Summary(Summary::NextAppointment),
        )
        .back_to("appointments_menu")
        .option(
            OptionNode::new("open", "🔎", "Open appointments")
                .action("open_appointments")
                .visible_if(Predicate::HasNextAppointment),
        )
        .option(back("appointments_menu"))
        .option(home()),
        QuestionNode::new(
            "appointments_list",
            QuestionKind::List,
            MessageTemplate::Summary(Summary::AppointmentList),
        )
        .back_to("appointments_menu")
        .option(OptionNode::new("open", "🔎", "Open appointments").action("open_appointments"))
        .option(back("appointments_menu"))
        .option(home()),
        // --- Prescriptions ---
        QuestionNode::new(
            "prescriptions_menu",
            QuestionKind::List,
            MessageTemplate::Summary(Summary::Prescriptions),
        )
        .option(
            OptionNode::new("latest", "🆕", "Latest prescription")
                .to("latest_prescription")
                .action("find_latest_prescription")
                .visible_if(Predicate::HasPrescriptions),
        )
        .option(back(ROOT_ID)),
        QuestionNode::new(
            "latest_prescription",
            QuestionKind::Info,
            MessageTemplate::Summary(Summary::LatestPrescription),
        )
        .back_to("prescriptions_menu")
        .option(
            OptionNode::new("open", "🔎", "Open prescriptions")
                .action("open_prescriptions")
                .visible_if(Predicate::HasPrescriptions),
        )
        .option(back("prescriptions_menu"))
        .option(home()),
        // --- Bills ---
        QuestionNode::new(
            "bills_menu",
            QuestionKind::List,
            MessageTemplate::Summary(Summary::Bills),
        )
        .option(
            OptionNode::new("pay_bill", "💰", "Pay a bill")
                .action("pay_bill")
                .visible_if(Predicate::HasUnpaidBills),
        )
        .option(
            OptionNode::new("view_bills", "🧾", "Open billing")
                .action("open_bills")
                .visible_if(Predicate::HasBills),
        )
        .option(back(ROOT_ID)),
        // --- Hospitals ---
        QuestionNode::new(
            "hospitals_list",
            QuestionKind::List,
            MessageTemplate::Summary(Summary::Hospitals),
        )
        .option(
            OptionNode::new("doctors", "👩‍⚕️", "Browse doctors")
                .to("doctors_list")
                .visible_if(Predicate::HasDoctors),
        )
        .option(
            OptionNode::new("open", "🔎", "Open hospitals")
                .action("open_hospitals")
                .visible_if(Predicate::HasHospitals),
        )
        .option(back(ROOT_ID)),
        QuestionNode::new(
            "doctors_list",
            QuestionKind::List,
            MessageTemplate::Summary(Summary::Doctors),
        )
        .back_to("hospitals_list")
        .option(
            OptionNode::new("book", "📝", "Book with a doctor")
                .action("book_appointment")
                .visible_if(Predicate::SignedIn),
        )
        .option(back("hospitals_list"))
        .option(home()),
        // --- Help ---
        QuestionNode::new(
            "help",
            QuestionKind::Info,
            MessageTemplate::Static(
                "I can show your appointments, prescriptions and bills, and help you find \
                 hospitals and doctors. Pick an option below, or use Back to return to the \
                 previous menu."
                    .into(),
            ),
        )
        .option(home()),
    ];

    Registry::new(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::filter_options;
    use crate::session::SessionData;

    #[test]
    fn test_patient_assistant_is_valid() {
        let registry = patient_assistant().unwrap();
        assert_eq!(registry.root().id, ROOT_ID);
        // Every defined question is reachable from the main menu.
        assert_eq!(registry.reachable().len(), registry.len());
    }

    #[test]
    fn test_reachable_questions_resolve_to_themselves() {
        let registry = patient_assistant().unwrap();
        for id in registry.reachable() {
            assert_eq!(registry.get(id).id, id);
        }
    }

    #[test]
    fn test_empty_bills_menu_offers_no_payment() {
        let registry = patient_assistant().unwrap();
        let node = registry.get("bills_menu");
        let offered: Vec<&str> = filter_options(node, &SessionData::default())
            .into_iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(offered, vec!["back"]);
    }
}

//! Ticket panel flow as a pure state machine.
//!
//! The dispatcher feeds [`PanelEvent`]s into [`advance`] and turns the
//! returned [`PanelEffect`]s into interaction responses. No I/O happens here.

use std::collections::BTreeMap;
use vigil_core::{MAX_CUSTOM_FIELDS, TicketCategory, TicketConfig};
use vigil_error::TicketErrorKind;
use vigil_interface::MAX_MODAL_INPUTS;

/// Seconds a creation form session stays valid.
pub const FORM_SESSION_SECS: i64 = 300;

/// Custom fields shown inline with title and description in a single modal.
const INLINE_FIELD_LIMIT: usize = 3;

/// One input of the creation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormInput {
    /// Ticket title
    Title,
    /// Ticket description
    Description,
    /// Category custom field by index
    Field(usize),
}

impl FormInput {
    /// Routing id of the modal input.
    pub fn custom_id(&self) -> String {
        match self {
            FormInput::Title => "title".to_string(),
            FormInput::Description => "description".to_string(),
            FormInput::Field(index) => format!("field:{}", index),
        }
    }

    /// Inverse of [`custom_id`](Self::custom_id).
    pub fn parse(custom_id: &str) -> Option<Self> {
        match custom_id {
            "title" => Some(FormInput::Title),
            "description" => Some(FormInput::Description),
            other => other
                .strip_prefix("field:")
                .and_then(|i| i.parse().ok())
                .map(FormInput::Field),
        }
    }
}

/// Split the creation form for `category` into modal steps.
///
/// Title, description and up to three custom fields fit in one modal. More
/// fields, or `form_mode`, move the custom fields into later steps.
pub fn form_steps(category: &TicketCategory, form_mode: bool) -> Vec<Vec<FormInput>> {
    let field_count = category.custom_fields.len().min(MAX_CUSTOM_FIELDS);
    let fields: Vec<FormInput> = (0..field_count).map(FormInput::Field).collect();
    let base = vec![FormInput::Title, FormInput::Description];

    if !form_mode && field_count <= INLINE_FIELD_LIMIT {
        return vec![base.into_iter().chain(fields).collect()];
    }

    let mut steps = vec![base];
    if form_mode {
        steps.extend(fields.chunks(MAX_MODAL_INPUTS).map(<[FormInput]>::to_vec));
    } else {
        let (inline, rest) = fields.split_at(INLINE_FIELD_LIMIT);
        steps[0].extend_from_slice(inline);
        steps.extend(rest.chunks(MAX_MODAL_INPUTS).map(<[FormInput]>::to_vec));
    }
    steps
}

/// Values collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketDraft {
    /// Category name as configured
    pub category: String,
    /// Anonymous ticket requested
    pub anonymous: bool,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Custom field values by field name
    pub fields: BTreeMap<String, String>,
}

impl TicketDraft {
    fn absorb(&mut self, category: &TicketCategory, values: &BTreeMap<String, String>) {
        for (key, value) in values {
            match FormInput::parse(key) {
                Some(FormInput::Title) => self.title = value.trim().to_string(),
                Some(FormInput::Description) => self.description = value.trim().to_string(),
                Some(FormInput::Field(index)) => {
                    if let Some(field) = category.custom_fields.get(index) {
                        let value = value.trim();
                        if !value.is_empty() {
                            self.fields.insert(field.name.clone(), value.to_string());
                        }
                    }
                }
                None => {}
            }
        }
    }
}

/// Where a creation session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    /// Picker shown
    ChoosingCategory {
        /// Anonymous toggle position
        anonymous: bool,
    },
    /// Modal step `step` of `total_steps` is open
    FillingForm {
        /// Values so far
        draft: TicketDraft,
        /// Zero-based step awaiting submission
        step: usize,
        /// Number of steps
        total_steps: usize,
    },
    /// All steps submitted
    Submitted(TicketDraft),
    /// Session timed out
    Expired,
}

/// Input to the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Panel button pressed
    PanelClicked,
    /// Anonymous toggle pressed
    AnonymousToggled,
    /// Category selected
    CategoryChosen(String),
    /// Form modal submitted
    ModalSubmitted {
        /// Step the modal belonged to
        step: usize,
        /// Input values by input routing id
        values: BTreeMap<String, String>,
    },
    /// "Continue" pressed
    ContinueClicked {
        /// Step the button opens
        step: usize,
    },
    /// Session deadline passed
    TimedOut,
}

/// Output of the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEffect {
    /// Show or refresh the category picker
    ShowPicker {
        /// Anonymous toggle position
        anonymous: bool,
    },
    /// Open the modal for `step`
    OpenModal {
        /// Category the form belongs to
        category: String,
        /// Step to open
        step: usize,
        /// Number of steps
        total_steps: usize,
    },
    /// Offer a "Continue" button for `step`
    PromptContinue {
        /// Step the button opens
        step: usize,
        /// Number of steps
        total_steps: usize,
    },
    /// Create the ticket
    Create(TicketDraft),
    /// Refuse the event with a user-facing reason
    Reject(TicketErrorKind),
    /// Grey out the widget
    DisableWidget,
}

/// Apply `event` to `state`.
pub fn advance(
    state: PanelState,
    event: PanelEvent,
    config: &TicketConfig,
) -> (PanelState, Vec<PanelEffect>) {
    if event == PanelEvent::TimedOut {
        return (PanelState::Expired, vec![PanelEffect::DisableWidget]);
    }

    match (state, event) {
        (PanelState::Expired, _) => (
            PanelState::Expired,
            vec![
                PanelEffect::Reject(TicketErrorKind::WidgetTimeout),
                PanelEffect::DisableWidget,
            ],
        ),

        (state @ PanelState::Submitted(_), _) => (
            state,
            vec![PanelEffect::Reject(TicketErrorKind::InvalidInput(
                "this form was already submitted".to_string(),
            ))],
        ),

        (PanelState::ChoosingCategory { anonymous }, PanelEvent::PanelClicked) => (
            PanelState::ChoosingCategory { anonymous },
            vec![PanelEffect::ShowPicker { anonymous }],
        ),

        (PanelState::ChoosingCategory { anonymous }, PanelEvent::AnonymousToggled) => {
            if config.allow_anonymous {
                let anonymous = !anonymous;
                (
                    PanelState::ChoosingCategory { anonymous },
                    vec![PanelEffect::ShowPicker { anonymous }],
                )
            } else {
                (
                    PanelState::ChoosingCategory { anonymous: false },
                    vec![PanelEffect::Reject(TicketErrorKind::InvalidInput(
                        "anonymous tickets are not allowed here".to_string(),
                    ))],
                )
            }
        }

        (PanelState::ChoosingCategory { anonymous }, PanelEvent::CategoryChosen(name)) => {
            match config.category(&name) {
                Some(category) => {
                    let total_steps = form_steps(category, config.form_mode).len();
                    let draft = TicketDraft {
                        category: category.name.clone(),
                        anonymous,
                        ..TicketDraft::default()
                    };
                    (
                        PanelState::FillingForm {
                            draft,
                            step: 0,
                            total_steps,
                        },
                        vec![PanelEffect::OpenModal {
                            category: category.name.clone(),
                            step: 0,
                            total_steps,
                        }],
                    )
                }
                None => (
                    PanelState::ChoosingCategory { anonymous },
                    vec![PanelEffect::Reject(TicketErrorKind::CategoryNotFound(name))],
                ),
            }
        }

        (
            PanelState::FillingForm {
                mut draft,
                step,
                total_steps,
            },
            PanelEvent::ModalSubmitted {
                step: submitted,
                values,
            },
        ) if submitted == step => {
            let Some(category) = config.category(&draft.category) else {
                let name = draft.category.clone();
                return (
                    PanelState::Expired,
                    vec![
                        PanelEffect::Reject(TicketErrorKind::CategoryNotFound(name)),
                        PanelEffect::DisableWidget,
                    ],
                );
            };
            draft.absorb(category, &values);
            let next = step + 1;
            if next >= total_steps {
                (
                    PanelState::Submitted(draft.clone()),
                    vec![PanelEffect::Create(draft)],
                )
            } else {
                (
                    PanelState::FillingForm {
                        draft,
                        step: next,
                        total_steps,
                    },
                    vec![PanelEffect::PromptContinue {
                        step: next,
                        total_steps,
                    }],
                )
            }
        }

        (
            PanelState::FillingForm {
                draft,
                step,
                total_steps,
            },
            PanelEvent::ContinueClicked { step: requested },
        ) if requested == step => {
            let category = draft.category.clone();
            (
                PanelState::FillingForm {
                    draft,
                    step,
                    total_steps,
                },
                vec![PanelEffect::OpenModal {
                    category,
                    step,
                    total_steps,
                }],
            )
        }

        (state, _) => (
            state,
            vec![PanelEffect::Reject(TicketErrorKind::InvalidInput(
                "that step is not available right now".to_string(),
            ))],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::CustomField;

    fn category(fields: usize) -> TicketCategory {
        let mut category = TicketCategory::new("Bug", "Report a bug");
        category.custom_fields = (0..fields)
            .map(|i| CustomField::new(format!("Field {}", i)))
            .collect();
        category
    }

    fn config_with(fields: usize) -> TicketConfig {
        let mut config = TicketConfig::default();
        config.categories = vec![category(fields)];
        config
    }

    #[test]
    fn test_three_fields_fit_one_step() {
        let steps = form_steps(&category(3), false);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].len(), 5);
    }

    #[test]
    fn test_four_fields_split_into_two_steps() {
        let steps = form_steps(&category(4), false);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1], vec![FormInput::Field(3)]);
    }

    #[test]
    fn test_form_mode_moves_fields_to_second_step() {
        let steps = form_steps(&category(2), true);
        assert_eq!(steps, vec![
            vec![FormInput::Title, FormInput::Description],
            vec![FormInput::Field(0), FormInput::Field(1)],
        ]);
        assert_eq!(form_steps(&category(0), true).len(), 1);
    }

    #[test]
    fn test_single_step_flow_creates_draft() {
        let config = config_with(1);
        let (state, effects) = advance(
            PanelState::ChoosingCategory { anonymous: false },
            PanelEvent::CategoryChosen("bug".into()),
            &config,
        );
        assert_eq!(effects, vec![PanelEffect::OpenModal {
            category: "Bug".into(),
            step: 0,
            total_steps: 1,
        }]);

        let values = BTreeMap::from([
            ("title".to_string(), " Crash ".to_string()),
            ("description".to_string(), "It crashes".to_string()),
            ("field:0".to_string(), "v1.2".to_string()),
        ]);
        let (state, effects) = advance(
            state,
            PanelEvent::ModalSubmitted { step: 0, values },
            &config,
        );
        let PanelEffect::Create(draft) = &effects[0] else {
            panic!("expected create, got {:?}", effects);
        };
        assert_eq!(draft.title, "Crash");
        assert_eq!(draft.fields.get("Field 0").map(String::as_str), Some("v1.2"));
        assert!(matches!(state, PanelState::Submitted(_)));
    }

    #[test]
    fn test_multi_step_flow_prompts_continue() {
        let config = config_with(4);
        let (state, _) = advance(
            PanelState::ChoosingCategory { anonymous: false },
            PanelEvent::CategoryChosen("Bug".into()),
            &config,
        );
        let (state, effects) = advance(
            state,
            PanelEvent::ModalSubmitted {
                step: 0,
                values: BTreeMap::from([("title".to_string(), "T".to_string())]),
            },
            &config,
        );
        assert_eq!(effects, vec![PanelEffect::PromptContinue {
            step: 1,
            total_steps: 2
        }]);

        let (state, effects) = advance(state, PanelEvent::ContinueClicked { step: 1 }, &config);
        assert!(matches!(effects[0], PanelEffect::OpenModal { step: 1, .. }));

        let (_, effects) = advance(
            state,
            PanelEvent::ModalSubmitted {
                step: 1,
                values: BTreeMap::from([("field:3".to_string(), "last".to_string())]),
            },
            &config,
        );
        let PanelEffect::Create(draft) = &effects[0] else {
            panic!("expected create");
        };
        assert_eq!(draft.title, "T");
        assert_eq!(draft.fields.get("Field 3").map(String::as_str), Some("last"));
    }

    #[test]
    fn test_anonymous_toggle_requires_permission() {
        let mut config = config_with(0);
        let (state, effects) = advance(
            PanelState::ChoosingCategory { anonymous: false },
            PanelEvent::AnonymousToggled,
            &config,
        );
        assert!(matches!(effects[0], PanelEffect::Reject(_)));

        config.allow_anonymous = true;
        let (state, _) = advance(state, PanelEvent::AnonymousToggled, &config);
        assert_eq!(state, PanelState::ChoosingCategory { anonymous: true });
    }

    #[test]
    fn test_expired_session_rejects_everything() {
        let config = config_with(0);
        let (state, effects) = advance(
            PanelState::ChoosingCategory { anonymous: false },
            PanelEvent::TimedOut,
            &config,
        );
        assert_eq!(effects, vec![PanelEffect::DisableWidget]);
        let (state, effects) = advance(state, PanelEvent::CategoryChosen("Bug".into()), &config);
        assert_eq!(state, PanelState::Expired);
        assert_eq!(effects[0], PanelEffect::Reject(TicketErrorKind::WidgetTimeout));
    }
}

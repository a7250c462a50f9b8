//! Payload validation.
//!
//! Produces field-level problems for a proposed payload. A non-empty result
//! does not stop a proposal from being stored; it stops it from being
//! approved until the payload is corrected.

use chrono::NaiveDate;
use proposal_types::{EntityType, Operation, ValidationProblem};
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Stateless payload validator.
pub trait PayloadValidator: Send + Sync {
    fn validate(
        &self,
        entity_type: EntityType,
        operation: Operation,
        payload: &JsonValue,
    ) -> Vec<ValidationProblem>;
}

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Email,
    Date,
    Id,
    EntityRef,
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    name: &'static str,
    kind: FieldKind,
    required: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: false,
    }
}

const fn required(name: &'static str) -> FieldRule {
    FieldRule {
        name,
        kind: FieldKind::Text,
        required: true,
    }
}

// Mirrors the typed inputs in `execution::inputs`.
const CONTACT_FIELDS: &[FieldRule] = &[
    required("first_name"),
    required("last_name"),
    field("email", FieldKind::Email),
    field("phone", FieldKind::Text),
    field("title", FieldKind::Text),
    field("organization_id", FieldKind::Id),
];

const ORGANIZATION_FIELDS: &[FieldRule] = &[
    required("name"),
    field("industry", FieldKind::Text),
    field("website", FieldKind::Text),
    field("email", FieldKind::Email),
    field("phone", FieldKind::Text),
];

const INDIVIDUAL_FIELDS: &[FieldRule] = &[
    required("first_name"),
    required("last_name"),
    field("email", FieldKind::Email),
    field("phone", FieldKind::Text),
    field("date_of_birth", FieldKind::Date),
];

const NOTE_CREATE_FIELDS: &[FieldRule] = &[
    required("body"),
    field("related_entity_type", FieldKind::EntityRef),
    field("related_entity_id", FieldKind::Id),
];

// Notes cannot be re-attached after creation
const NOTE_UPDATE_FIELDS: &[FieldRule] = &[required("body")];

const TASK_FIELDS: &[FieldRule] = &[
    required("title"),
    field("description", FieldKind::Text),
    field("due_date", FieldKind::Date),
    field("assignee_id", FieldKind::Id),
    field("priority", FieldKind::Text),
];

const ACCOUNT_FIELDS: &[FieldRule] = &[
    required("name"),
    field("account_number", FieldKind::Text),
    field("owner_id", FieldKind::Id),
    field("currency", FieldKind::Text),
];

fn field_rules(entity_type: EntityType, operation: Operation) -> &'static [FieldRule] {
    match (entity_type, operation) {
        (EntityType::Contact, _) => CONTACT_FIELDS,
        (EntityType::Organization, _) => ORGANIZATION_FIELDS,
        (EntityType::Individual, _) => INDIVIDUAL_FIELDS,
        (EntityType::Note, Operation::Update) => NOTE_UPDATE_FIELDS,
        (EntityType::Note, _) => NOTE_CREATE_FIELDS,
        (EntityType::Task, _) => TASK_FIELDS,
        (EntityType::Account, _) => ACCOUNT_FIELDS,
    }
}

/// Table-driven validator covering every supported entity type.
#[derive(Debug, Clone)]
pub struct RuleBasedValidator {
    email_pattern: Option<Regex>,
}

impl RuleBasedValidator {
    pub fn new() -> Self {
        Self {
            email_pattern: Regex::new(EMAIL_PATTERN).ok(),
        }
    }

    fn is_email(&self, value: &str) -> bool {
        match &self.email_pattern {
            Some(re) => re.is_match(value),
            None => value.contains('@'),
        }
    }

    fn check_value(
        &self,
        rule: &FieldRule,
        value: &JsonValue,
        problems: &mut Vec<ValidationProblem>,
    ) {
        let Some(text) = value.as_str() else {
            problems.push(ValidationProblem::new(rule.name, "must be a string"));
            return;
        };

        if rule.required && text.trim().is_empty() {
            problems.push(ValidationProblem::new(rule.name, "must not be blank"));
            return;
        }

        match rule.kind {
            FieldKind::Text => {}
            FieldKind::Email => {
                if !self.is_email(text) {
                    problems.push(ValidationProblem::new(
                        rule.name,
                        format!("'{text}' is not a valid email address"),
                    ));
                }
            }
            FieldKind::Date => {
                if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() {
                    problems.push(ValidationProblem::new(
                        rule.name,
                        "must be a date in YYYY-MM-DD format",
                    ));
                }
            }
            FieldKind::Id => {
                if Uuid::parse_str(text).is_err() {
                    problems.push(ValidationProblem::new(rule.name, "must be a UUID"));
                }
            }
            FieldKind::EntityRef => {
                if text.parse::<EntityType>().is_err() {
                    problems.push(ValidationProblem::new(
                        rule.name,
                        format!("'{text}' is not a supported entity type"),
                    ));
                }
            }
        }
    }

    fn validate_object(
        &self,
        rules: &[FieldRule],
        operation: Operation,
        object: &Map<String, JsonValue>,
    ) -> Vec<ValidationProblem> {
        let mut problems = Vec::new();

        for key in object.keys() {
            if !rules.iter().any(|r| r.name == key) {
                problems.push(ValidationProblem::new(key.as_str(), "unknown field"));
            }
        }

        let mut provided = 0usize;
        for rule in rules {
            match object.get(rule.name) {
                None | Some(JsonValue::Null) => {
                    if operation == Operation::Create && rule.required {
                        problems.push(ValidationProblem::new(rule.name, "is required"));
                    }
                }
                Some(value) => {
                    provided += 1;
                    self.check_value(rule, value, &mut problems);
                }
            }
        }

        if operation == Operation::Update && provided == 0 {
            problems.push(ValidationProblem::new(
                "payload",
                "at least one field must be provided",
            ));
        }

        problems
    }
}

impl Default for RuleBasedValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadValidator for RuleBasedValidator {
    fn validate(
        &self,
        entity_type: EntityType,
        operation: Operation,
        payload: &JsonValue,
    ) -> Vec<ValidationProblem> {
        if operation == Operation::Delete {
            return Vec::new();
        }

        match payload.as_object() {
            Some(object) => {
                self.validate_object(field_rules(entity_type, operation), operation, object)
            }
            None => vec![ValidationProblem::new("payload", "must be a JSON object")],
        }
    }
}

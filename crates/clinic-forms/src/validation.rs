//! Text validation for inputs

use clinic_schema::{Column, ColumnType};

/// Outcome of validating a candidate text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationState {
    /// Complete and valid
    Acceptable,
    /// Not valid yet, but may become valid with more editing
    Intermediate,
    /// Can never become valid by appending; the edit is rejected
    Invalid,
}

/// Validation result: the state plus the (possibly unchanged) text and cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub state: ValidationState,
    pub text: String,
    pub pos: usize,
}

impl Validation {
    pub fn new(state: ValidationState, text: &str, pos: usize) -> Self {
        Self {
            state,
            text: text.to_string(),
            pos,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.state == ValidationState::Acceptable
    }
}

const DATE_SHAPE: &str = "0000-00-00";
const TIME_SHAPE: &str = "00:00:00";
const DATETIME_SHAPE: &str = "0000-00-00 00:00:00";

/// Validate text against the format of a column type
pub fn validate_format(column_type: ColumnType, text: &str, pos: usize) -> Validation {
    let state = match column_type {
        ColumnType::Text => ValidationState::Acceptable,
        ColumnType::Integer => integer_state(text),
        ColumnType::Float => float_state(text),
        ColumnType::Date => temporal_state(column_type, text, DATE_SHAPE),
        ColumnType::Time => temporal_state(column_type, text, TIME_SHAPE),
        ColumnType::DateTime => temporal_state(column_type, text, DATETIME_SHAPE),
    };
    Validation::new(state, text, pos)
}

/// Validate text for a column: format first, then the required-value rule.
///
/// Empty text stands for NULL, so it is Acceptable for nullable columns and
/// Intermediate for required ones.
pub fn validate_column(column: &Column, text: &str, pos: usize) -> Validation {
    if text.is_empty() {
        let state = if column.nullable {
            ValidationState::Acceptable
        } else {
            ValidationState::Intermediate
        };
        return Validation::new(state, text, pos);
    }
    validate_format(column.column_type, text, pos)
}

fn integer_state(text: &str) -> ValidationState {
    match text {
        "" => ValidationState::Acceptable,
        "-" => ValidationState::Intermediate,
        // digits only; out-of-range values can never become valid
        _ if text.parse::<i64>().is_ok() && !text.starts_with('+') => ValidationState::Acceptable,
        _ => ValidationState::Invalid,
    }
}

fn float_state(text: &str) -> ValidationState {
    if matches!(text, "" | "-" | "." | "-.") {
        return ValidationState::Intermediate;
    }
    let plain = text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if plain && text.parse::<f64>().is_ok() {
        ValidationState::Acceptable
    } else {
        ValidationState::Invalid
    }
}

fn temporal_state(column_type: ColumnType, text: &str, shape: &str) -> ValidationState {
    if !fits_shape(text, shape) {
        return ValidationState::Invalid;
    }
    if !complete_lengths(column_type).contains(&text.len()) {
        return ValidationState::Intermediate;
    }
    match column_type.parse_text(text) {
        Some(value) if !value.is_null() => ValidationState::Acceptable,
        _ => ValidationState::Invalid,
    }
}

/// Lengths at which a shaped value is complete; seconds are optional
fn complete_lengths(column_type: ColumnType) -> &'static [usize] {
    match column_type {
        ColumnType::Date => &[10],
        ColumnType::Time => &[5, 8],
        ColumnType::DateTime => &[16, 19],
        _ => &[],
    }
}

/// Whether `text` matches the leading characters of `shape`, where `0` is any
/// digit and the date/time separator may be a space or `T`
fn fits_shape(text: &str, shape: &str) -> bool {
    text.is_ascii()
        && text.len() <= shape.len()
        && text.chars().zip(shape.chars()).all(|(c, s)| match s {
            '0' => c.is_ascii_digit(),
            ' ' => c == ' ' || c == 'T',
            other => c == other,
        })
}

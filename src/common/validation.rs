// Common validation types and traits

#[derive(Debug)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Accumulates per-field validation failures for one request payload.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

pub trait Validator {
    fn validate(&self) -> ValidationResult;
}

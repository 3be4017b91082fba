use std::collections::HashMap;

pub mod paging;
pub mod password;
pub mod task;
pub mod user;

#[cfg(test)]
mod test_util;

/// Accumulated validation failures, keyed by the API-visible name of the field
/// each message applies to. Domain services gather every failure before
/// short-circuiting so no store mutation happens for invalid input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(HashMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> FieldErrors {
        FieldErrors(HashMap::new())
    }

    /// Records a validation failure against [field]
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, Vec<String>> {
        self.0
    }

    /// Looks up the messages recorded against [field], if any
    pub fn messages_for(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

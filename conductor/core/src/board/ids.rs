//! Per-command id namespacing
//!
//! Models happily reuse generic ids such as `step1` from one command to the
//! next. Every id a command *creates* is rewritten through a prefix derived
//! from a request-scoped nonce, so two commands never collide. References to
//! objects that already existed before the command keep their original id.
//!
//! An [`IdScope`] lives exactly as long as one command's applier and is
//! dropped with it.

use std::collections::HashMap;

use rand::Rng;

use crate::board::ObjectType;

/// Id-remapping table for one command
#[derive(Debug, Clone)]
pub struct IdScope {
    prefix: String,
    /// Raw id from the action -> namespaced id
    mapping: HashMap<String, String>,
    /// Counter for ids synthesized when the action gave none
    generated: u32,
}

impl IdScope {
    /// Create a scope with an explicit nonce
    pub fn new(nonce: impl AsRef<str>) -> Self {
        Self {
            prefix: format!("cmd-{}", nonce.as_ref()),
            mapping: HashMap::new(),
            generated: 0,
        }
    }

    /// Create a scope whose nonce is the current time plus random bytes
    #[must_use]
    pub fn fresh() -> Self {
        Self::new(new_nonce())
    }

    /// Prefix applied to ids created in this command
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Namespaced id for a newly created object
    ///
    /// Repeated calls with the same raw id return the same namespaced id.
    pub fn assign(&mut self, raw: Option<&str>, object_type: ObjectType) -> String {
        match raw {
            Some(raw) => {
                if let Some(existing) = self.mapping.get(raw) {
                    return existing.clone();
                }
                let namespaced = format!("{}-{raw}", self.prefix);
                self.mapping.insert(raw.to_string(), namespaced.clone());
                namespaced
            }
            None => {
                self.generated += 1;
                let kind = match object_type {
                    ObjectType::Sticky => "sticky",
                    ObjectType::Rectangle => "rect",
                    ObjectType::Circle => "circle",
                    ObjectType::Line => "line",
                    ObjectType::Text => "text",
                    ObjectType::Connector => "conn",
                };
                format!("{}-{kind}-{}", self.prefix, self.generated)
            }
        }
    }

    /// Resolve a reference to an object
    ///
    /// Ids created earlier in this command map to their namespaced form;
    /// anything else is returned unchanged so pre-existing objects resolve.
    #[must_use]
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.mapping.get(raw).map_or(raw, String::as_str)
    }
}

/// Request-scoped nonce: millisecond timestamp plus four random bytes
#[must_use]
pub fn new_nonce() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let salt: [u8; 4] = rand::thread_rng().gen();
    format!("{millis:x}{}", hex::encode(salt))
}

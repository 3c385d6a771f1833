pub mod fields;
pub mod honeypot;
pub mod metadata;
pub mod parser;
pub mod pipeline;

use std::collections::HashMap;

/// Raw form field name -> value, as posted by the client.
pub type FormFields = HashMap<String, String>;

use regex::Regex;
use std::sync::LazyLock;

use crate::models::Submission;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static regex"));

pub const DEFAULT_TEMPLATE: &str = "Nueva solicitud #{{id}}\n\
Nombre: {{name}}\n\
Teléfono: {{phone}}\n\
Correo: {{email}}\n\
Servicio: {{service_type}}\n\
Descripción: {{description}}";

/// Operator-facing message text for a submission.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    source: String,
}

impl MessageTemplate {
    pub fn new(source: Option<&str>) -> Self {
        Self {
            source: source.unwrap_or(DEFAULT_TEMPLATE).replace("\\n", "\n"),
        }
    }

    /// Replace {{field}} placeholders. Unknown placeholders render empty.
    pub fn render(&self, submission: &Submission) -> String {
        TEMPLATE_RE
            .replace_all(&self.source, |caps: &regex::Captures| {
                resolve(&caps[1], submission).unwrap_or_default()
            })
            .into_owned()
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::new(None)
    }
}

fn resolve(key: &str, s: &Submission) -> Option<String> {
    match key {
        "id" => Some(s.id.to_string()),
        "name" | "nombre" => Some(s.name.clone()),
        "phone" | "telefono" => Some(s.phone.clone()),
        "email" | "correo" => Some(s.email.clone().unwrap_or_else(|| "-".to_string())),
        "description" | "descripcion" => Some(s.description.clone()),
        "service_type" | "servicio" => Some(s.service_type.clone()),
        "created_at" => Some(s.created_at.to_rfc3339()),
        _ => None,
    }
}

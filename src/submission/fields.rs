use crate::error::ValidationError;
use crate::models::NewSubmission;

use super::FormFields;

pub type ValidationResult<T> = Result<T, ValidationError>;

pub const NAME: &str = "nombre";
pub const PHONE: &str = "telefono";
pub const EMAIL: &str = "correo";
pub const DESCRIPTION: &str = "descripcion";
pub const SERVICE: &str = "servicio";

/// Column widths of the `submissions` table.
const MAX_NAME: usize = 100;
const MAX_PHONE: usize = 100;
const MAX_EMAIL: usize = 100;
const MAX_SERVICE: usize = 100;

/// Check presence and length of the posted fields and build the record.
/// Values are trimmed; a blank `correo` becomes `None`.
pub fn validate(form: &FormFields) -> ValidationResult<NewSubmission> {
    let name = required(form, NAME)?;
    let phone = required(form, PHONE)?;
    let description = required(form, DESCRIPTION)?;
    let service_type = required(form, SERVICE)?;
    let email = optional(form, EMAIL);

    check_len(NAME, &name, MAX_NAME)?;
    check_len(PHONE, &phone, MAX_PHONE)?;
    check_len(SERVICE, &service_type, MAX_SERVICE)?;
    if let Some(ref email) = email {
        check_len(EMAIL, email, MAX_EMAIL)?;
    }

    Ok(NewSubmission {
        name,
        phone,
        email,
        description,
        service_type,
    })
}

fn required(form: &FormFields, field: &'static str) -> ValidationResult<String> {
    optional(form, field).ok_or(ValidationError::MissingField(field))
}

fn optional(form: &FormFields, field: &str) -> Option<String> {
    form.get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_len(field: &'static str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        Err(ValidationError::TooLong { field, max })
    } else {
        Ok(())
    }
}

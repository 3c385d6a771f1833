use super::FormFields;

/// Check if the honeypot field is filled. Returns true if spam detected.
pub fn is_spam(form: &FormFields, honeypot_field: Option<&str>) -> bool {
    let Some(field) = honeypot_field.filter(|f| !f.is_empty()) else {
        return false;
    };

    form.get(field).is_some_and(|v| !v.trim().is_empty())
}

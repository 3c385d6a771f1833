use serde_json::Value;

use super::FormFields;

/// Parse a request body based on its Content-Type. HTML forms post
/// urlencoded or multipart; JSON is accepted for script clients.
pub async fn parse_body(content_type: Option<&str>, body: bytes::Bytes) -> Result<FormFields, String> {
    let ct = content_type.unwrap_or("application/x-www-form-urlencoded");

    if ct.contains("multipart/form-data") {
        parse_multipart(ct, body).await
    } else if ct.contains("application/json") {
        parse_json(&body)
    } else if ct.contains("application/x-www-form-urlencoded") {
        parse_form_urlencoded(&body)
    } else {
        // Try form-urlencoded first, then JSON
        parse_form_urlencoded(&body)
            .or_else(|_| parse_json(&body))
            .map_err(|e| format!("Unable to parse body: {e}"))
    }
}

fn parse_form_urlencoded(body: &[u8]) -> Result<FormFields, String> {
    std::str::from_utf8(body).map_err(|e| format!("Invalid UTF-8: {e}"))?;
    Ok(form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn parse_json(body: &[u8]) -> Result<FormFields, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| format!("Invalid JSON: {e}"))?;
    let Value::Object(obj) = value else {
        return Err("JSON body must be an object".to_string());
    };

    let mut fields = FormFields::new();
    for (key, value) in obj {
        match value {
            Value::String(s) => {
                fields.insert(key, s);
            }
            Value::Null => {}
            other => {
                fields.insert(key, other.to_string());
            }
        }
    }
    Ok(fields)
}

/// Parse multipart form data using multer. File parts are read as text.
async fn parse_multipart(content_type: &str, body: bytes::Bytes) -> Result<FormFields, String> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| "Missing multipart boundary".to_string())?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = FormFields::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Multipart error: {e}"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| format!("Field read error: {e}"))?;
        fields.insert(name, value);
    }

    Ok(fields)
}

//! Table-driven resolution of bilingual and legacy field names.
//!
//! Records come back from the API with Spanish names, English names or older
//! spellings depending on the endpoint. Each logical field lists its
//! candidates in priority order; the first truthy value wins.

use serde_json::Value;

/// Ordered candidate keys for one logical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub candidates: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(candidates: &'static [&'static str]) -> Self {
        Self { candidates }
    }
}

pub const ID: FieldSpec = FieldSpec::new(&["_id", "id"]);
pub const NAME: FieldSpec = FieldSpec::new(&["nombre", "name"]);
pub const DESCRIPTION: FieldSpec = FieldSpec::new(&["descripcion", "description"]);
pub const CREATED_AT: FieldSpec = FieldSpec::new(&["fecha_creacion", "created_at", "createdAt"]);
pub const UPDATED_AT: FieldSpec =
    FieldSpec::new(&["fecha_actualizacion", "updated_at", "updatedAt"]);
pub const COMPANY_ID: FieldSpec = FieldSpec::new(&["empresa_id", "company_id"]);

/// Mirrors JavaScript truthiness for scalar values.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First truthy candidate value, if any.
pub fn resolve<'a>(raw: &'a Value, spec: FieldSpec) -> Option<&'a Value> {
    spec.candidates
        .iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| is_truthy(value))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// First truthy candidate that reads as text; objects and arrays are skipped.
pub fn resolve_str(raw: &Value, spec: FieldSpec, default: &str) -> String {
    spec.candidates
        .iter()
        .filter_map(|key| raw.get(*key))
        .filter(|value| is_truthy(value))
        .find_map(as_text)
        .unwrap_or_else(|| default.to_string())
}

pub fn resolve_u64(raw: &Value, spec: FieldSpec, default: u64) -> u64 {
    resolve(raw, spec)
        .and_then(|value| match value {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64)),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(default)
}

/// The first candidate holding an array wins; a truthy non-array in an earlier
/// slot does not block later array candidates.
pub fn resolve_str_list(raw: &Value, spec: FieldSpec) -> Vec<String> {
    spec.candidates
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(Value::as_array)
        .map(|items| items.iter().filter_map(as_text).collect())
        .unwrap_or_default()
}

/// Active flag: `activo` is authoritative whenever the key is present, so
/// `false` and `null` both mean inactive. Otherwise anything but an explicit
/// `active: false` counts as active.
pub fn resolve_active(raw: &Value) -> bool {
    if let Some(value) = raw.get("activo") {
        return is_truthy(value);
    }
    !matches!(raw.get("active"), Some(Value::Bool(false)))
}

/// Name of a company reference: the nested `empresa|company` object's name,
/// or the flat `empresa_nombre|nombre_empresa` field.
pub fn resolve_company_name(raw: &Value) -> String {
    match resolve(raw, FieldSpec::new(&["empresa", "company"])) {
        Some(reference) if reference.is_object() => resolve_str(reference, NAME, ""),
        _ => resolve_str(
            raw,
            FieldSpec::new(&["empresa_nombre", "nombre_empresa"]),
            "",
        ),
    }
}

const SEVERITY_TABLE: &[(&str, &str)] = &[
    ("ROJO", "critica"),
    ("NARANJA", "alta"),
    ("AMARILLO", "media"),
    ("VERDE", "baja"),
    ("CRITICA", "critica"),
    ("CRITICO", "critica"),
    ("ALTA", "alta"),
    ("MEDIA", "media"),
    ("BAJA", "baja"),
];

/// Normalises colour codes and priority words to `critica|alta|media|baja`.
pub fn normalize_severity(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return "desconocida".to_string();
    };
    let upper = raw.to_uppercase();
    SEVERITY_TABLE
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, severity)| severity.to_string())
        .unwrap_or_else(|| raw.to_lowercase())
}

pub fn severity_to_raw(severity: &str) -> String {
    let normalized = severity.trim().to_lowercase();
    match normalized.as_str() {
        "critica" => "ROJO".to_string(),
        "alta" => "NARANJA".to_string(),
        "media" => "AMARILLO".to_string(),
        "baja" => "VERDE".to_string(),
        _ => normalized.to_uppercase(),
    }
}

pub fn severity_label(severity: &str) -> String {
    match severity.trim().to_lowercase().as_str() {
        "critica" => "Critica".to_string(),
        "alta" => "Alta".to_string(),
        "media" => "Media".to_string(),
        "baja" => "Baja".to_string(),
        "desconocida" | "" => "Sin prioridad".to_string(),
        _ => severity.to_string(),
    }
}

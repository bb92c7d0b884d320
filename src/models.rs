//! View models mapped from raw API records through the fallback tables in
//! [`crate::fields`].

use crate::fields::{
    self, resolve, resolve_active, resolve_company_name, resolve_str, resolve_str_list,
    resolve_u64, FieldSpec,
};
use serde::Serialize;
use serde_json::Value;

/// One active alert as returned by the active-by-sede endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertItem {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub site: String,
    pub priority: String,
    pub description: String,
    pub created_at: String,
}

impl AlertItem {
    const TITLE: FieldSpec = FieldSpec::new(&["hardware_nombre", "nombre_alerta"]);
    const COMPANY: FieldSpec = FieldSpec::new(&["empresa_nombre"]);
    const SITE: FieldSpec = FieldSpec::new(&["sede"]);
    const PRIORITY: FieldSpec = FieldSpec::new(&["prioridad"]);

    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: resolve_str(raw, fields::ID, ""),
            title: resolve_str(raw, Self::TITLE, "Alerta de Sistema"),
            company_name: resolve_str(raw, Self::COMPANY, ""),
            site: resolve_str(raw, Self::SITE, ""),
            priority: resolve_str(raw, Self::PRIORITY, "media"),
            description: resolve_str(raw, fields::DESCRIPTION, ""),
            created_at: resolve_str(raw, fields::CREATED_AT, ""),
        }
    }

    pub fn summary(&self) -> String {
        let mut line = format!("[{}] {}", self.priority, self.title);
        if !self.company_name.is_empty() || !self.site.is_empty() {
            line.push_str(&format!(" ({} - {})", self.company_name, self.site));
        }
        line
    }
}

/// A physical hardware incident from the status check endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareIncident {
    /// Stable identity used for notification dedup.
    pub id: String,
    pub hardware_id: String,
    pub hardware_name: String,
    pub company_name: String,
    pub site_name: String,
}

impl HardwareIncident {
    const HARDWARE_ID: FieldSpec = FieldSpec::new(&["hardware_id", "hardwareId", "id", "_id"]);
    const HARDWARE_NAME: FieldSpec = FieldSpec::new(&[
        "hardware_nombre",
        "hardwareName",
        "nombre_hardware",
        "nombre",
    ]);
    const COMPANY: FieldSpec =
        FieldSpec::new(&["empresa_nombre", "empresaName", "empresa", "company_name"]);
    const SITE: FieldSpec = FieldSpec::new(&["sede", "sede_nombre", "site", "location"]);

    pub fn from_raw(raw: &Value) -> Self {
        let hardware_id = resolve_str(raw, Self::HARDWARE_ID, "");
        let hardware_name = resolve_str(raw, Self::HARDWARE_NAME, "Hardware sin nombre");
        let company_name = resolve_str(raw, Self::COMPANY, "Empresa sin nombre");
        let site_name = resolve_str(raw, Self::SITE, "Sede no especificada");
        let id = if hardware_id.is_empty() {
            derived_incident_id(&hardware_name, &company_name, &site_name)
        } else {
            hardware_id.clone()
        };
        Self {
            id,
            hardware_id,
            hardware_name,
            company_name,
            site_name,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({} - {})",
            self.hardware_name, self.company_name, self.site_name
        )
    }
}

/// Each whitespace run, leading and trailing ones included, becomes one `_`.
fn derived_incident_id(name: &str, company: &str, site: &str) -> String {
    let mut id = String::new();
    let mut in_whitespace = false;
    for ch in format!("{name}-{company}-{site}").chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                id.push('_');
            }
            in_whitespace = true;
        } else {
            id.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }
    id
}

const INCIDENT_LIST_KEYS: &[&str] = &["data", "items", "hardware", "result", "results"];

/// The status endpoint answers either with a bare array or with an object
/// holding the list under one of several keys.
pub fn hardware_incidents_from_payload(payload: &Value) -> Vec<HardwareIncident> {
    let list = match payload {
        Value::Array(items) => Some(items),
        Value::Object(_) => INCIDENT_LIST_KEYS
            .iter()
            .filter_map(|key| payload.get(*key))
            .find_map(Value::as_array),
        _ => None,
    };
    list.map(|items| items.iter().map(HardwareIncident::from_raw).collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: String,
    pub color: String,
    pub image: String,
    pub sound: String,
    pub recommendations: Vec<String>,
    pub equipment: Vec<String>,
    pub company_id: String,
    pub company_name: String,
    pub active: bool,
    pub sla_minutes: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl AlertType {
    const SEVERITY: FieldSpec = FieldSpec::new(&["tipo_alerta", "severity"]);
    const COLOR: FieldSpec = FieldSpec::new(&["color_alerta", "color"]);
    const IMAGE: FieldSpec = FieldSpec::new(&["imagen_base64", "image"]);
    const SOUND: FieldSpec = FieldSpec::new(&["sonido_link", "sound"]);
    const RECOMMENDATIONS: FieldSpec = FieldSpec::new(&["recomendaciones", "recommendations"]);
    const EQUIPMENT: FieldSpec = FieldSpec::new(&["implementos_necesarios", "equipment"]);
    const SLA: FieldSpec = FieldSpec::new(&["sla_minutos", "sla", "sla_minutes"]);

    pub fn from_raw(raw: &Value) -> Self {
        let severity = resolve(raw, Self::SEVERITY).and_then(Value::as_str);
        Self {
            id: resolve_str(raw, fields::ID, ""),
            name: resolve_str(raw, fields::NAME, ""),
            description: resolve_str(raw, fields::DESCRIPTION, ""),
            severity: fields::normalize_severity(severity),
            color: resolve_str(raw, Self::COLOR, "").trim().to_string(),
            image: resolve_str(raw, Self::IMAGE, ""),
            sound: resolve_str(raw, Self::SOUND, ""),
            recommendations: resolve_str_list(raw, Self::RECOMMENDATIONS),
            equipment: resolve_str_list(raw, Self::EQUIPMENT),
            company_id: resolve_str(raw, fields::COMPANY_ID, ""),
            company_name: resolve_company_name(raw),
            active: resolve_active(raw),
            sla_minutes: resolve_u64(raw, Self::SLA, 0),
            created_at: resolve_str(raw, fields::CREATED_AT, ""),
            updated_at: resolve_str(raw, fields::UPDATED_AT, ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub companies_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl CompanyType {
    const COMPANIES_COUNT: FieldSpec =
        FieldSpec::new(&["empresas_count", "companies_count", "total_empresas"]);

    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: resolve_str(raw, fields::ID, ""),
            name: resolve_str(raw, fields::NAME, ""),
            description: resolve_str(raw, fields::DESCRIPTION, ""),
            active: resolve_active(raw),
            companies_count: resolve_u64(raw, Self::COMPANIES_COUNT, 0),
            created_at: resolve_str(raw, fields::CREATED_AT, ""),
            updated_at: resolve_str(raw, fields::UPDATED_AT, ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usuario {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub phone: String,
    pub document: String,
    pub company_id: String,
    pub active: bool,
    pub created_at: String,
}

impl Usuario {
    const EMAIL: FieldSpec = FieldSpec::new(&["correo", "email"]);
    const ROLE: FieldSpec = FieldSpec::new(&["rol", "role"]);
    const PHONE: FieldSpec = FieldSpec::new(&["telefono", "phone"]);
    const DOCUMENT: FieldSpec = FieldSpec::new(&["cedula", "document"]);

    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: resolve_str(raw, fields::ID, ""),
            name: resolve_str(raw, fields::NAME, ""),
            email: resolve_str(raw, Self::EMAIL, ""),
            role: resolve_str(raw, Self::ROLE, ""),
            phone: resolve_str(raw, Self::PHONE, ""),
            document: resolve_str(raw, Self::DOCUMENT, ""),
            company_id: resolve_str(raw, fields::COMPANY_ID, ""),
            active: resolve_active(raw),
            created_at: resolve_str(raw, fields::CREATED_AT, ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub company_name: String,
    pub site: String,
    pub active: bool,
    pub physically_inactive: bool,
}

impl HardwareRecord {
    const KIND: FieldSpec = FieldSpec::new(&["tipo", "type"]);
    const SITE: FieldSpec = FieldSpec::new(&["sede", "site"]);
    const PHYSICAL_STATUS: FieldSpec =
        FieldSpec::new(&["physical_status", "physicalStatus", "estado_fisico"]);

    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: resolve_str(raw, fields::ID, ""),
            name: resolve_str(raw, fields::NAME, "Sin nombre"),
            kind: resolve_str(raw, Self::KIND, ""),
            company_name: resolve_company_name(raw),
            site: resolve_str(raw, Self::SITE, ""),
            // Hardware uses the feminine `activa`; only an explicit false disables it.
            active: !matches!(raw.get("activa"), Some(Value::Bool(false))),
            physically_inactive: is_physically_inactive(raw),
        }
    }
}

/// `datos` may be an object or a JSON string, optionally wrapping another
/// `datos` level.
fn hardware_datos(raw: &Value) -> Value {
    match raw.get("datos") {
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => parsed.get("datos").cloned().unwrap_or(parsed),
            Err(_) => Value::Null,
        },
        Some(datos) if datos.is_object() => datos.clone(),
        _ => Value::Null,
    }
}

fn is_physically_inactive(raw: &Value) -> bool {
    let datos = hardware_datos(raw);
    let Some(status) = resolve(raw, HardwareRecord::PHYSICAL_STATUS)
        .or_else(|| resolve(&datos, HardwareRecord::PHYSICAL_STATUS))
    else {
        return false;
    };
    let status = match status {
        Value::String(text) => serde_json::from_str::<Value>(text).unwrap_or_else(|_| status.clone()),
        other => other.clone(),
    };
    let is_inactive_word = |value: &Value| {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        matches!(text.trim().to_lowercase().as_str(), "inactivo" | "inactive")
    };
    match &status {
        Value::String(_) => is_inactive_word(&status),
        Value::Object(values) => values.values().any(is_inactive_word),
        _ => false,
    }
}

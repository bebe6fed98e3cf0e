use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub study_name: Option<String>,
    #[serde(default, rename = "trialRegistryID")]
    pub trial_registry_id: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub study_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// RFC 3339 timestamps; anything else reads as absent rather than failing the record.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|stamp| stamp.with_timezone(&Utc)))
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default, alias = "study")]
    pub study_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Subject {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body accepted by `POST /studies`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewStudy {
    #[serde(default)]
    pub study_name: String,
    #[serde(default, rename = "trialRegistryID")]
    pub trial_registry_id: String,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub study_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub study_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NewSubject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub site: String,
}

/// Successful `POST /auth/login` payload. Everything beyond `user` and `token` is kept
/// verbatim so the persisted record mirrors what the backend returned.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginRecord {
    pub user: Value,
    pub token: String,
    #[serde(default, alias = "expiry", rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LoginRecord {
    pub fn user_id(&self) -> Option<String> {
        ["_id", "id"]
            .iter()
            .find_map(|key| self.user.get(key).and_then(value_as_string))
    }

    pub fn display_name(&self) -> String {
        ["username", "name", "email"]
            .iter()
            .find_map(|key| self.user.get(key).and_then(|v| v.as_str()))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("user")
            .to_string()
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn study_accepts_mongo_style_id() {
        let study: Study = serde_json::from_value(json!({
            "_id": "abc",
            "studyName": "PACE",
            "trialRegistryID": "NCT01",
            "createdAt": "2025-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(study.id, "abc");
        assert_eq!(study.study_name.as_deref(), Some("PACE"));
        assert_eq!(study.trial_registry_id.as_deref(), Some("NCT01"));
        assert!(study.created_at.is_some());
    }

    #[test]
    fn unparseable_created_at_keeps_the_study() {
        for created_at in [json!("yesterday"), json!(1735787045), Value::Null] {
            let study: Study = serde_json::from_value(json!({
                "_id": "abc",
                "studyName": "PACE",
                "createdAt": created_at
            }))
            .unwrap();
            assert_eq!(study.study_name.as_deref(), Some("PACE"));
            assert!(study.created_at.is_none());
        }
    }

    #[test]
    fn site_accepts_plain_id_and_study_alias() {
        let site: Site =
            serde_json::from_value(json!({"id": "s1", "siteName": "Leiden", "study": "abc"}))
                .unwrap();
        assert_eq!(site.id, "s1");
        assert_eq!(site.study_id.as_deref(), Some("abc"));
        assert!(site.location.is_none());
    }

    #[test]
    fn login_record_derives_identity() {
        let record: LoginRecord = serde_json::from_value(json!({
            "user": {"_id": "u-7", "username": "dana", "email": "dana@example.org"},
            "token": "jwt"
        }))
        .unwrap();
        assert_eq!(record.user_id().as_deref(), Some("u-7"));
        assert_eq!(record.display_name(), "dana");
        assert!(record.expires_at.is_none());
    }

    #[test]
    fn login_record_falls_back_to_email() {
        let record: LoginRecord = serde_json::from_value(json!({
            "user": {"id": 42, "email": "ops@example.org"},
            "token": "jwt"
        }))
        .unwrap();
        assert_eq!(record.user_id().as_deref(), Some("42"));
        assert_eq!(record.display_name(), "ops@example.org");
    }

    #[test]
    fn new_study_serializes_backend_field_names() {
        let body = serde_json::to_value(NewStudy {
            study_name: "PACE".into(),
            trial_registry_id: "NCT01".into(),
            study_type: "Test".into(),
            ..NewStudy::default()
        })
        .unwrap();
        assert_eq!(body["studyName"], "PACE");
        assert_eq!(body["trialRegistryID"], "NCT01");
        assert_eq!(body["studyType"], "Test");
    }
}

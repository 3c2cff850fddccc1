//! Resolves who the caller is: account, role collection and the profile
//! fields pages branch on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::baas::{paths, Account, BaasError, Backend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Tutor,
    Student,
}

impl Role {
    pub fn collection(self) -> &'static str {
        match self {
            Role::Tutor => paths::TUTORS,
            Role::Student => paths::STUDENTS,
        }
    }

    pub fn record_path(self, name: &str) -> String {
        format!("{}/{name}", self.collection())
    }

    /// Field holding the partner's name on this side of an assignment.
    pub fn assignment_field(self) -> &'static str {
        match self {
            Role::Tutor => "assignedStudent",
            Role::Student => "assignedTutor",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Tutor => "tutor",
            Role::Student => "student",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub email_verified: bool,
    pub contract_signed: bool,
    pub assignment: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("account lookup failed: {0}")]
    LookupFailed(#[source] BaasError),
    #[error("no tutor or student profile for {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Store(BaasError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub e_sig: String,
    pub picture_use: bool,
    pub picture_sig: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorRecord {
    pub uuid: String,
    pub admin: bool,
    pub email: String,
    pub phone_number: String,
    pub account_type: &'static str,
    pub chapter: String,
    pub contract_signed: bool,
    pub profile: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Demographics {
    #[serde(rename = "ZIPCode")]
    pub zip_code: String,
    pub gender: String,
    pub grade: String,
    pub ethnicity: String,
    pub salary: String,
    #[serde(rename = "familyCircumstance")]
    pub family_circumstance: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub email: String,
    pub parent_name: String,
    pub phone_number: String,
    pub account_type: &'static str,
    pub contract_signed: bool,
    pub subject: String,
    pub demographic_info: Demographics,
}

/// A non-empty string at `field`. Older tutor records hold an empty map for
/// "no student", which reads as `None` here.
pub fn assignment_of(record: &Value, role: Role) -> Option<String> {
    record
        .get(role.assignment_field())
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

pub fn flag(record: &Value, field: &str) -> bool {
    record.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Finds the record for `name`, tutors first.
pub async fn find_record(
    backend: &Backend,
    token: &str,
    name: &str,
) -> Result<Option<(Role, Value)>, BaasError> {
    for role in [Role::Tutor, Role::Student] {
        if let Some(record) = backend.records.get(token, &role.record_path(name)).await? {
            return Ok(Some((role, record)));
        }
    }
    Ok(None)
}

/// Builds the profile of an already looked-up account.
pub async fn resolve_account(
    backend: &Backend,
    token: &str,
    account: &Account,
) -> Result<Profile, ProfileError> {
    let name = account
        .display_name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ProfileError::NotFound(account.email.clone()))?;

    let (role, record) = find_record(backend, token, &name)
        .await
        .map_err(ProfileError::Store)?
        .ok_or_else(|| ProfileError::NotFound(name.clone()))?;

    Ok(Profile {
        email: account.email.clone(),
        role,
        is_admin: role == Role::Tutor && flag(&record, "admin"),
        email_verified: account.email_verified,
        contract_signed: flag(&record, "contractSigned"),
        assignment: assignment_of(&record, role),
        name,
    })
}

pub async fn resolve(backend: &Backend, token: &str) -> Result<Profile, ProfileError> {
    let account = backend
        .identity
        .lookup(token)
        .await
        .map_err(ProfileError::LookupFailed)?;
    resolve_account(backend, token, &account).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baas::{memory::MemoryBackend, IdentityProvider};
    use serde_json::json;

    async fn account(mem: &MemoryBackend, email: &str, name: &str) -> String {
        let creds = mem.identity.sign_up(email, "password123").await.unwrap();
        mem.identity.set_display_name(&creds.id_token, name).await.unwrap();
        creds.id_token
    }

    #[tokio::test]
    async fn resolves_tutor_with_admin_flag() {
        let mem = MemoryBackend::default();
        let token = account(&mem, "t@example.com", "Jane Doe").await;
        mem.records
            .write(
                "users/tutors/Jane Doe",
                json!({ "admin": true, "contractSigned": true, "assignedStudent": "Sam Roe" }),
            )
            .await;

        let profile = resolve(&mem.backend(), &token).await.unwrap();
        assert_eq!(profile.role, Role::Tutor);
        assert!(profile.is_admin);
        assert!(profile.contract_signed);
        assert!(!profile.email_verified);
        assert_eq!(profile.assignment.as_deref(), Some("Sam Roe"));
    }

    #[tokio::test]
    async fn student_is_never_admin() {
        let mem = MemoryBackend::default();
        let token = account(&mem, "s@example.com", "Sam Roe").await;
        mem.records
            .write("users/students/Sam Roe", json!({ "admin": true, "contractSigned": false }))
            .await;

        let profile = resolve(&mem.backend(), &token).await.unwrap();
        assert_eq!(profile.role, Role::Student);
        assert!(!profile.is_admin);
        assert_eq!(profile.assignment, None);
    }

    #[tokio::test]
    async fn tutor_wins_when_name_is_in_both_collections() {
        let mem = MemoryBackend::default();
        let token = account(&mem, "x@example.com", "Alex Poe").await;
        mem.records.write("users/tutors/Alex Poe", json!({ "contractSigned": true })).await;
        mem.records.write("users/students/Alex Poe", json!({ "contractSigned": false })).await;

        let profile = resolve(&mem.backend(), &token).await.unwrap();
        assert_eq!(profile.role, Role::Tutor);
    }

    #[test]
    fn empty_map_assignment_reads_as_none() {
        let record = json!({ "assignedStudent": {} });
        assert_eq!(assignment_of(&record, Role::Tutor), None);
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let mem = MemoryBackend::default();
        let token = account(&mem, "n@example.com", "Nobody Here").await;
        let err = resolve(&mem.backend(), &token).await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(name) if name == "Nobody Here"));
    }

    #[tokio::test]
    async fn bad_token_is_lookup_failure() {
        let mem = MemoryBackend::default();
        let err = resolve(&mem.backend(), "nope").await.unwrap_err();
        assert!(matches!(err, ProfileError::LookupFailed(_)));
    }
}

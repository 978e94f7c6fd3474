pub mod draft;
pub mod editor;
pub mod error;
pub mod filter;
pub mod form;
pub mod kinds;
pub mod labels;
pub mod reference;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use error::{CoreError, EditorError};
pub use reference::{CarRef, PersonRef, Reference};

// --- People ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    M,
    F,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PersonStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

/// Editable person attributes. Used for create/update bodies and as the
/// payload of `PersonRef::New` / `PersonRef::ExistingWithUpdates`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonNew {
    pub first_name: String,
    pub first_name_lat: Option<String>,
    pub last_name: String,
    pub last_name_lat: Option<String>,
    pub patronymic_name: Option<String>,
    pub patronymic_name_lat: Option<String>,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub tax_number: String,
    pub phone: String,
    pub phone2: Option<String>,
    pub email: String,
    pub status: PersonStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonFull {
    pub id: i32,
    #[serde(flatten)]
    pub data: PersonNew,
}

impl PersonFull {
    /// Display label used by search suggestions ("first last").
    pub fn label(&self) -> String {
        format!("{} {}", self.data.first_name, self.data.last_name)
    }
}

/// A person as embedded in a policy read: holder and members come without
/// status, latin spellings or patronymic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyPerson {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub tax_number: String,
    pub phone: String,
    pub phone2: Option<String>,
    pub email: String,
}

impl PolicyPerson {
    pub fn label(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// --- Cars ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarNew {
    pub chassis: String,
    pub make: String,
    pub model: String,
    pub registration: String,
    pub plate: String,
    pub year: i32,
    pub engine_displacement_litres: i32,
    pub mileage_km: i32,
    pub unladen_weight: i32,
    pub laden_weight: i32,
    pub seats: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarFull {
    pub id: i32,
    #[serde(flatten)]
    pub data: CarNew,
}

impl CarFull {
    /// Display label used by search suggestions ("plate (make model)").
    pub fn label(&self) -> String {
        format!("{} ({} {})", self.data.plate, self.data.make, self.data.model)
    }
}

// --- Policies ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PolicyType {
    GreenCard,
    Medassistance,
    Osago,
}

impl PolicyType {
    pub const ALL: [PolicyType; 3] = [Self::GreenCard, Self::Medassistance, Self::Osago];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PolicyStatus {
    Active,
    Project,
    Prolonged,
    Rejected,
    Stopped,
    Postponed,
    Cancelled,
    Replaced,
    Expired,
}

impl PolicyStatus {
    pub const ALL: [PolicyStatus; 9] = [
        Self::Active,
        Self::Project,
        Self::Prolonged,
        Self::Rejected,
        Self::Stopped,
        Self::Postponed,
        Self::Cancelled,
        Self::Replaced,
        Self::Expired,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CarInsurancePeriodUnit {
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OsagoZone {
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Zone5,
    Outside,
}

/// A row of the policy list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyShort {
    pub id: i32,
    pub policy_type: PolicyType,
    pub holder_name: String,
    pub series: String,
    pub number: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: PolicyStatus,
    #[serde(default)]
    pub car_model: Option<String>,
    #[serde(default)]
    pub car_plate: Option<String>,
    #[serde(default)]
    pub agent_names: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GreenCardData {
    pub territory: String,
    pub period_in_units: i32,
    pub period_unit: CarInsurancePeriodUnit,
    pub premium: i32,
    pub car: CarRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedassistanceData {
    pub territory: String,
    pub period_days: i32,
    pub premium: i32,
    pub payout: i32,
    pub program: String,
    pub members: Vec<PersonRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsagoData {
    pub period_in_units: i32,
    pub period_unit: CarInsurancePeriodUnit,
    pub zone: OsagoZone,
    pub exempt: String,
    pub premium: i32,
    pub car: CarRef,
}

/// Type-specific part of a create/update request, discriminated by `policy_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy_type")]
pub enum PolicyData {
    GreenCard(GreenCardData),
    Medassistance(MedassistanceData),
    Osago(OsagoData),
}

impl PolicyData {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyData::GreenCard(_) => PolicyType::GreenCard,
            PolicyData::Medassistance(_) => PolicyType::Medassistance,
            PolicyData::Osago(_) => PolicyType::Osago,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePolicyRequest {
    pub holder: PersonRef,
    pub series: String,
    pub number: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: PolicyStatus,
    #[serde(default)]
    pub agent_ids: Vec<i32>,
    #[serde(flatten)]
    pub data: PolicyData,
}

/// `PUT /policies/{id}` carries the same body as a create.
pub type UpdatePolicyRequest = CreatePolicyRequest;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePolicyResponse {
    pub id: i32,
    pub policy_type: PolicyType,
    pub holder_id: i32,
    pub series: String,
    pub number: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: PolicyStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GreenCardDetails {
    pub territory: String,
    pub period_in_units: i32,
    pub period_unit: CarInsurancePeriodUnit,
    pub premium: i32,
    pub car: CarFull,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedassistanceDetails {
    pub territory: String,
    pub period_days: i32,
    pub premium: i32,
    pub payout: i32,
    pub program: String,
    pub members: Vec<PolicyPerson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsagoDetails {
    pub period_in_units: i32,
    pub period_unit: CarInsurancePeriodUnit,
    pub zone: OsagoZone,
    #[serde(deserialize_with = "exempt_text")]
    pub exempt: String,
    pub premium: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub franchise: Option<i32>,
    pub car: CarFull,
}

/// Policy reads serve `exempt` as a flag, writes take it as text.
fn exempt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Exempt {
        Flag(bool),
        Text(String),
    }
    Ok(match Exempt::deserialize(deserializer)? {
        Exempt::Flag(flag) => flag.to_string(),
        Exempt::Text(text) => text,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy_type")]
pub enum PolicyDetails {
    GreenCard(GreenCardDetails),
    Medassistance(MedassistanceDetails),
    Osago(OsagoDetails),
}

impl PolicyDetails {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyDetails::GreenCard(_) => PolicyType::GreenCard,
            PolicyDetails::Medassistance(_) => PolicyType::Medassistance,
            PolicyDetails::Osago(_) => PolicyType::Osago,
        }
    }
}

/// A policy as returned by `GET /policies/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyFull {
    pub id: i32,
    pub holder: PolicyPerson,
    pub series: String,
    pub number: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: PolicyStatus,
    #[serde(flatten)]
    pub details: PolicyDetails,
}

// --- Agents & dashboard ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: i32,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BirthdayPerson {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub age: i32,
    pub days_until: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpiringPolicy {
    pub id: i32,
    pub series: String,
    pub number: String,
    pub policy_type: PolicyType,
    pub end_date: NaiveDate,
    pub holder_first_name: String,
    pub holder_last_name: String,
    pub days_until: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub people_count: i64,
    pub policy_count: i64,
    pub car_count: i64,
    #[serde(default)]
    pub upcoming_birthdays: Vec<BirthdayPerson>,
    #[serde(default)]
    pub expiring_policies: Vec<ExpiringPolicy>,
}

// --- Search ---

/// One autocomplete entry. Produced per query and replaced by the next one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    pub value: i32,
    pub label: String,
}

/// Row shape of `GET /people/search` and `GET /cars/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRow {
    pub id: i32,
    pub label: String,
}

impl From<SearchRow> for Suggestion {
    fn from(row: SearchRow) -> Self {
        Suggestion {
            value: row.id,
            label: row.label,
        }
    }
}

// --- Settings ---

pub const API_URL_ENV: &str = "POLICYDESK_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub search_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: "http://localhost:3000/api".to_string(),
            request_timeout_secs: 30,
            search_debounce_ms: 300,
        }
    }
}

/// Resolve the per-user config directory (~/.policydesk/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".policydesk")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read settings from the default location, falling back to defaults when the
/// file is missing or unreadable, then apply the environment override.
pub fn read_settings() -> Settings {
    let mut settings = read_settings_from(&settings_path()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable settings file");
        Settings::default()
    });
    apply_env_override(&mut settings, std::env::var(API_URL_ENV).ok());
    settings
}

pub fn read_settings_from(path: &Path) -> Result<Settings, CoreError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn apply_env_override(settings: &mut Settings, api_url: Option<String>) {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        settings.api_url = url;
    }
}

pub fn write_settings(settings: &Settings) -> Result<(), CoreError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), CoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

mod assemble;

use assemble::{apply, drive, parse_choice, PolicyInput, SlotInput};
use chrono::NaiveDate;
use policydesk_client::{Backend, ClientError};
use policydesk_core::draft::PolicyDraft;
use policydesk_core::editor::ReferenceEditor;
use policydesk_core::filter::{DateRange, PolicyFilter};
use policydesk_core::form::DATE_FORMAT;
use policydesk_core::kinds::PersonKind;
use policydesk_core::labels::Localized;
use policydesk_core::{PolicyStatus, PolicyType, Reference};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn tool_error(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(text.into())]))
}

fn backend_error(action: &str, e: ClientError) -> Result<CallToolResult, McpError> {
    tracing::warn!(error = %e, action, "backend request failed");
    tool_error(format!("Failed to {}: {}", action, e))
}

/// Attach Ukrainian labels and the badge severity next to the raw enum names.
fn with_labels(value: &mut Value, policy_type: PolicyType, status: PolicyStatus) {
    if let Value::Object(map) = value {
        map.insert("type_label".into(), json!(policy_type.label()));
        map.insert("status_label".into(), json!(status.label()));
        map.insert("severity".into(), json!(status.severity()));
    }
}

fn parse_date(field: &str, raw: &Option<String>) -> Result<Option<NaiveDate>, String> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| format!("{} must be a date (YYYY-MM-DD), got '{}'", field, s)),
    }
}

fn policy_filter(req: &ListPoliciesRequest) -> Result<PolicyFilter, String> {
    let mut policy_types = Vec::new();
    for raw in req.policy_types.iter().flatten() {
        policy_types.push(parse_choice("policy type", raw)?);
    }
    let mut statuses = Vec::new();
    for raw in req.statuses.iter().flatten() {
        statuses.push(parse_choice("policy status", raw)?);
    }
    Ok(PolicyFilter {
        number: req.number.clone(),
        holder: req.holder.clone(),
        car: req.car.clone(),
        start_date: DateRange::new(
            parse_date("start_from", &req.start_from)?,
            parse_date("start_to", &req.start_to)?,
        ),
        end_date: DateRange::new(
            parse_date("end_from", &req.end_from)?,
            parse_date("end_to", &req.end_to)?,
        ),
        policy_types,
        statuses,
    })
}

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchRequest {
    /// Free text. People match on name, tax number or phone; cars on plate, make or model.
    query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct IdRequest {
    /// Record id
    id: i32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CreatePersonRequest {
    /// Field values by name: first_name, last_name, sex (M/F/Unknown), birth_date (YYYY-MM-DD), tax_number, phone and email are required; first_name_lat, last_name_lat, patronymic_name, patronymic_name_lat, phone2 and status (Active/Inactive/Archived, default Active) are optional.
    fields: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdatePersonRequest {
    /// Id of the person to edit
    id: i32,
    /// Only the fields to change. `null` or "" clears an optional field.
    fields: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
struct ListPoliciesRequest {
    /// Substring of the policy number
    number: Option<String>,
    /// Substring of the holder's name
    holder: Option<String>,
    /// Substring of the car model or plate
    car: Option<String>,
    /// Earliest start date, YYYY-MM-DD
    start_from: Option<String>,
    /// Latest start date, YYYY-MM-DD
    start_to: Option<String>,
    /// Earliest end date, YYYY-MM-DD. Open-ended policies never match a bounded range.
    end_from: Option<String>,
    /// Latest end date, YYYY-MM-DD
    end_to: Option<String>,
    /// Any of GreenCard, Medassistance, Osago
    policy_types: Option<Vec<String>>,
    /// Any of Active, Project, Prolonged, Rejected, Stopped, Postponed, Cancelled, Replaced, Expired
    statuses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CreatePolicyToolRequest {
    /// GreenCard, Medassistance or Osago
    policy_type: String,
    /// Ids of the agents who sold the policy
    agent_ids: Option<Vec<i32>>,
    #[serde(flatten)]
    policy: PolicyInput,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdatePolicyToolRequest {
    /// Id of the policy to edit. Its type cannot change.
    id: i32,
    #[serde(flatten)]
    policy: PolicyInput,
}

// --- Server ---

#[derive(Clone)]
pub struct PolicydeskServer {
    backend: Backend,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PolicydeskServer {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List every person in the directory")]
    async fn list_people(&self) -> Result<CallToolResult, McpError> {
        match self.backend.client.list_people().await {
            Ok(people) => json_result(&people),
            Err(e) => backend_error("list people", e),
        }
    }

    #[tool(description = "Search people by name, tax number or phone. Returns [{value, label}] where value is the person id.")]
    async fn search_people(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.query.trim().is_empty() {
            return json_result(&Vec::<Value>::new());
        }
        match self.backend.client.search_people(req.query.trim()).await {
            Ok(hits) => json_result(&hits),
            Err(e) => backend_error("search people", e),
        }
    }

    #[tool(description = "Get one person with all attributes")]
    async fn get_person(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.backend.client.get_person(req.id).await {
            Ok(person) => {
                let mut value = serde_json::to_value(&person)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                if let Value::Object(map) = &mut value {
                    map.insert("sex_label".into(), json!(person.data.sex.label()));
                    map.insert("status_label".into(), json!(person.data.status.label()));
                    map.insert("severity".into(), json!(person.data.status.severity()));
                }
                json_result(&value)
            }
            Err(e) => backend_error(&format!("get person {}", req.id), e),
        }
    }

    #[tool(description = "Create a person. All required fields must be present; on validation failure nothing is sent and every failing field is listed.")]
    async fn create_person(
        &self,
        Parameters(req): Parameters<CreatePersonRequest>,
    ) -> Result<CallToolResult, McpError> {
        let person = {
            let mut editor = ReferenceEditor::<PersonKind>::new();
            for (name, value) in &req.fields {
                if let Err(e) = editor.set_field(name, value.as_deref()) {
                    return tool_error(e.to_string());
                }
            }
            match editor.outcome().usable() {
                Some(Reference::New(person)) => person.clone(),
                _ => {
                    let errors = editor.errors().map(|e| e.to_string()).unwrap_or_default();
                    return tool_error(format!("Person is not valid: {}", errors));
                }
            }
        };
        match self.backend.client.create_person(&person).await {
            Ok(created) => json_result(&created),
            Err(e) => backend_error("create person", e),
        }
    }

    #[tool(description = "Edit a person in place. The record is loaded, the given fields applied, and only a real change is sent.")]
    async fn update_person(
        &self,
        Parameters(req): Parameters<UpdatePersonRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = SlotInput {
            existing_id: Some(req.id),
            fields: req.fields,
        };
        let report = match drive::<PersonKind, _>("person", self.backend.people.clone(), &input).await
        {
            Ok(report) => report,
            Err(e) => return tool_error(e),
        };
        if let Some(errors) = report.errors {
            return tool_error(format!("Person is not valid: {}", errors));
        }
        match report.outcome.value {
            Some(Reference::ExistingWithUpdates { id, data }) => {
                match self.backend.client.update_person(id, &data).await {
                    Ok(updated) => json_result(&updated),
                    Err(e) => backend_error(&format!("update person {}", id), e),
                }
            }
            _ => Ok(CallToolResult::success(vec![Content::text(format!(
                "No changes to person {}.",
                req.id
            ))])),
        }
    }

    #[tool(description = "Search cars by plate, make or model. Returns [{value, label}] where value is the car id.")]
    async fn search_cars(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.query.trim().is_empty() {
            return json_result(&Vec::<Value>::new());
        }
        match self.backend.client.search_cars(req.query.trim()).await {
            Ok(hits) => json_result(&hits),
            Err(e) => backend_error("search cars", e),
        }
    }

    #[tool(description = "Get one car with all attributes")]
    async fn get_car(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.backend.client.get_car(req.id).await {
            Ok(car) => json_result(&car),
            Err(e) => backend_error(&format!("get car {}", req.id), e),
        }
    }

    #[tool(description = "List policies, optionally filtered. Text filters are case-insensitive substrings; list filters match any of the given values. Each row carries type_label, status_label and severity.")]
    async fn list_policies(
        &self,
        Parameters(req): Parameters<ListPoliciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let filter = match policy_filter(&req) {
            Ok(filter) => filter,
            Err(e) => return tool_error(e),
        };
        let rows = match self.backend.client.list_policies().await {
            Ok(rows) => rows,
            Err(e) => return backend_error("list policies", e),
        };
        let mut out = Vec::new();
        for row in filter.apply(&rows) {
            let mut value = serde_json::to_value(row)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            with_labels(&mut value, row.policy_type, row.status);
            out.push(value);
        }
        tracing::debug!(total = rows.len(), shown = out.len(), "policies listed");
        json_result(&out)
    }

    #[tool(description = "Get one policy with its holder, terms and insured car or members")]
    async fn get_policy(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.backend.client.get_policy(req.id).await {
            Ok(policy) => {
                let mut value = serde_json::to_value(&policy)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                with_labels(&mut value, policy.details.policy_type(), policy.status);
                json_result(&value)
            }
            Err(e) => backend_error(&format!("get policy {}", req.id), e),
        }
    }

    #[tool(description = "Create a policy. The holder, car and members each reference an existing record (existing_id, optionally with person edits) or describe a new one (fields only). Status defaults to Project. Nothing is sent unless every part is valid.")]
    async fn create_policy(
        &self,
        Parameters(req): Parameters<CreatePolicyToolRequest>,
    ) -> Result<CallToolResult, McpError> {
        let policy_type: PolicyType = match parse_choice("policy type", &req.policy_type) {
            Ok(t) => t,
            Err(e) => return tool_error(e),
        };
        let mut draft = PolicyDraft::new(policy_type);
        draft.agent_ids = req.agent_ids.unwrap_or_default();
        let notes = match apply(&self.backend.people, &self.backend.cars, &mut draft, &req.policy).await
        {
            Ok(notes) => notes,
            Err(e) => return tool_error(e),
        };
        let request = match draft.assemble() {
            Ok(request) => request,
            Err(e) => return tool_error(incomplete(e, &notes)),
        };
        match self.backend.client.create_policy(&request).await {
            Ok(created) => {
                tracing::info!(id = created.id, ?policy_type, "policy created");
                json_result(&created)
            }
            Err(e) => backend_error("create policy", e),
        }
    }

    #[tool(description = "Edit a policy. Starts from the stored policy; omitted fields keep their values. Passing car or members replaces them. Agents are not changed by updates.")]
    async fn update_policy(
        &self,
        Parameters(req): Parameters<UpdatePolicyToolRequest>,
    ) -> Result<CallToolResult, McpError> {
        let current = match self.backend.client.get_policy(req.id).await {
            Ok(policy) => policy,
            Err(e) => return backend_error(&format!("get policy {}", req.id), e),
        };
        let mut draft = match PolicyDraft::from_policy(&current) {
            Ok(draft) => draft,
            Err(e) => return tool_error(format!("Policy {} cannot be edited: {}", req.id, e)),
        };
        let notes = match apply(&self.backend.people, &self.backend.cars, &mut draft, &req.policy).await
        {
            Ok(notes) => notes,
            Err(e) => return tool_error(e),
        };
        let request = match draft.assemble_update() {
            Ok(request) => request,
            Err(e) => return tool_error(incomplete(e, &notes)),
        };
        match self.backend.client.update_policy(req.id, &request).await {
            Ok(updated) => {
                tracing::info!(id = updated.id, "policy updated");
                let mut value = serde_json::to_value(&updated)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                with_labels(&mut value, updated.details.policy_type(), updated.status);
                json_result(&value)
            }
            Err(e) => backend_error(&format!("update policy {}", req.id), e),
        }
    }

    #[tool(description = "List agents (id and full name) for agent_ids")]
    async fn list_agents(&self) -> Result<CallToolResult, McpError> {
        match self.backend.client.list_agents().await {
            Ok(agents) => json_result(&agents),
            Err(e) => backend_error("list agents", e),
        }
    }

    #[tool(description = "Counts of people, policies and cars, upcoming birthdays and policies about to expire")]
    async fn get_dashboard(&self) -> Result<CallToolResult, McpError> {
        match self.backend.client.dashboard().await {
            Ok(stats) => json_result(&stats),
            Err(e) => backend_error("load the dashboard", e),
        }
    }
}

fn incomplete(e: policydesk_core::draft::AssemblyError, notes: &[String]) -> String {
    let mut text = format!("Policy is incomplete: {}", e);
    for note in notes {
        text.push_str("\n- ");
        text.push_str(note);
    }
    text
}

#[tool_handler]
impl ServerHandler for PolicydeskServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"policydesk is the back office of an insurance agency. It keeps people, cars and policies.

## Policies
- **GreenCard**: international motor cover. Terms: territory, period_in_units, period_unit, premium. Insures one car.
- **Medassistance**: travel medical cover. Terms: territory, period_days, premium, payout, program. Insures a list of members (people).
- **Osago**: domestic motor liability. Terms: period_in_units, period_unit, zone, exempt, premium. Insures one car.

## References
The holder, the car and each member is a reference:
- `{"existing_id": 5}` uses record 5 unchanged.
- `{"existing_id": 5, "fields": {"phone": "+380..."}}` uses person 5 and saves the edits with the policy. Cars cannot be edited this way.
- `{"fields": {...}}` creates a new record together with the policy. All required fields must be given.

Look ids up with search_people / search_cars first. A reference to an id that does not exist is rejected.
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = policydesk_core::read_settings();
    let backend = Backend::connect(&settings)?;
    let service = PolicydeskServer::new(backend)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| eprintln!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

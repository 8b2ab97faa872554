//! Declarative Step Tables
//!
//! Serializable workflow definitions, typically loaded from YAML, and their
//! compilation into runtime [`Workflow`]s bound to an API client.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: provision
//! inputs: [customer_id]
//! steps:
//!   - name: create_service
//!     required: true
//!     request:
//!       method: POST
//!       path: /service
//!       form:
//!         name: Api Service
//!         type: vcl
//!         customer_id: ${customer_id}
//!     bind:
//!       - { key: service_id, path: id }
//!
//!   - name: validate_version
//!     required: true
//!     request:
//!       method: GET
//!       path: /service/${service_id}/version/${service_version}/validate
//!     gate: { path: status, equals: ok }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::{referenced_keys, value_to_text, Context};
use super::model::{Binding, Fallback, FallbackTrigger, Gate, Step, Workflow};
use crate::api::{ApiClient, ApiRequest, HttpMethod};
use crate::error::StepError;
use crate::execution::operation::{HttpOperation, Operation, TemplateOperation};

/// Request template for one API call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RequestDef {
    #[serde(default)]
    pub method: HttpMethod,

    /// Path template, e.g. `/service/${service_id}`
    pub path: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Value>,

    /// URL-encoded body fields; null values are omitted
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl RequestDef {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Renders all templates against the context.
    pub fn resolve(&self, ctx: &Context) -> Result<ApiRequest, StepError> {
        Ok(ApiRequest {
            method: self.method,
            path: ctx.render_str(&self.path)?,
            query: render_pairs(&self.query, ctx)?,
            form: render_pairs(&self.form, ctx)?,
            json: self.json.as_ref().map(|json| ctx.render(json)).transpose()?,
        })
    }

    /// Context keys this request reads.
    pub fn referenced_keys(&self) -> BTreeSet<String> {
        let mut keys = referenced_keys(&Value::String(self.path.clone()));
        for value in self.query.values().chain(self.form.values()) {
            keys.extend(referenced_keys(value));
        }
        if let Some(json) = &self.json {
            keys.extend(referenced_keys(json));
        }
        keys
    }
}

fn render_pairs(
    fields: &BTreeMap<String, Value>,
    ctx: &Context,
) -> Result<Vec<(String, String)>, StepError> {
    let mut pairs = Vec::with_capacity(fields.len());
    for (key, template) in fields {
        let value = ctx.render(template)?;
        if value.is_null() {
            continue;
        }
        pairs.push((key.clone(), value_to_text(&value)));
    }
    Ok(pairs)
}

/// Fallback for a step: either a request or a literal value template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FallbackDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default)]
    pub bind: Vec<Binding>,

    #[serde(default)]
    pub trigger: FallbackTrigger,
}

impl FallbackDef {
    /// Context keys the fallback reads.
    pub fn referenced_keys(&self) -> BTreeSet<String> {
        let mut keys = self
            .request
            .as_ref()
            .map(RequestDef::referenced_keys)
            .unwrap_or_default();
        if let Some(value) = &self.value {
            keys.extend(referenced_keys(value));
        }
        keys
    }

    fn compile(&self, client: &Arc<ApiClient>) -> Result<Fallback, String> {
        let operation: Arc<dyn Operation> = match (&self.request, &self.value) {
            (Some(request), None) => Arc::new(HttpOperation::new(Arc::clone(client), request.clone())),
            (None, Some(value)) => Arc::new(TemplateOperation::new(value.clone())),
            _ => return Err("fallback needs exactly one of 'request' or 'value'".to_string()),
        };

        let mut fallback = Fallback::from_arc(operation).with_trigger(self.trigger);
        fallback.bind = self.bind.clone();
        Ok(fallback)
    }
}

/// Declarative definition of one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepDef {
    pub name: String,

    pub request: RequestDef,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub bind: Vec<Binding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<Gate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackDef>,
}

impl StepDef {
    pub fn new(name: impl Into<String>, request: RequestDef) -> Self {
        Self {
            name: name.into(),
            request,
            required: false,
            bind: Vec::new(),
            gate: None,
            fallback: None,
        }
    }

    /// Context keys written by this step (primary and fallback bindings).
    pub fn bound_keys(&self) -> impl Iterator<Item = &str> {
        self.bind
            .iter()
            .chain(self.fallback.iter().flat_map(|f| f.bind.iter()))
            .map(|b| b.key.as_str())
    }

    fn compile(&self, client: &Arc<ApiClient>) -> Result<Step, String> {
        let operation = HttpOperation::new(Arc::clone(client), self.request.clone());

        let mut step = Step::new(self.name.clone(), operation);
        step.required = self.required;
        step.bind = self.bind.clone();
        step.gate = self.gate.clone();
        if let Some(fallback) = &self.fallback {
            step.fallback = Some(
                fallback
                    .compile(client)
                    .map_err(|e| format!("Step '{}': {}", self.name, e))?,
            );
        }
        Ok(step)
    }
}

/// Declarative definition of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Keys the initial context is expected to provide
    #[serde(default)]
    pub inputs: Vec<String>,

    pub steps: Vec<StepDef>,
}

impl WorkflowDef {
    /// Compiles the step table into a runnable workflow.
    pub fn compile(&self, client: Arc<ApiClient>) -> Result<Workflow, String> {
        let steps = self
            .steps
            .iter()
            .map(|step| step.compile(&client))
            .collect::<Result<Vec<_>, _>>()?;

        Workflow::from_steps(self.name.clone(), steps)
    }

    /// Declared inputs missing from `ctx`.
    pub fn missing_inputs(&self, ctx: &Context) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|key| !ctx.contains(key))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn client() -> Arc<ApiClient> {
        Arc::new(ApiClient::new("http://localhost", "t", Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn test_resolve_request() {
        let request = RequestDef::new(HttpMethod::Post, "/service/${service_id}/version/${version}/backend")
            .with_form("port", 443)
            .with_form("use_ssl", true)
            .with_form("address", "origin.example.com")
            .with_form("customer_id", Value::Null);

        let ctx = Context::new().with("service_id", "svc1").with("version", 1);
        let resolved = request.resolve(&ctx).unwrap();

        assert_eq!(resolved.method, HttpMethod::Post);
        assert_eq!(resolved.path, "/service/svc1/version/1/backend");
        assert_eq!(
            resolved.form,
            vec![
                ("address".to_string(), "origin.example.com".to_string()),
                ("port".to_string(), "443".to_string()),
                ("use_ssl".to_string(), "true".to_string()),
            ]
        );
        assert!(resolved.query.is_empty());
        assert!(resolved.json.is_none());
    }

    #[test]
    fn test_resolve_skips_null_placeholder_values() {
        let request = RequestDef::new(HttpMethod::Get, "/events")
            .with_query("filter[customer_id]", "${customer_id}");
        let ctx = Context::new().with("customer_id", Value::Null);

        assert!(request.resolve(&ctx).unwrap().query.is_empty());
    }

    #[test]
    fn test_resolve_missing_key() {
        let request = RequestDef::new(HttpMethod::Get, "/service/${service_id}");
        let err = request.resolve(&Context::new()).unwrap_err();
        assert!(matches!(err, StepError::MissingContextKey { key } if key == "service_id"));
    }

    #[test]
    fn test_resolve_json_body() {
        let mut request = RequestDef::new(HttpMethod::Put, "/x");
        request.json = Some(json!({"version": "${version}"}));

        let resolved = request.resolve(&Context::new().with("version", 2)).unwrap();
        assert_eq!(resolved.json, Some(json!({"version": 2})));
    }

    #[test]
    fn test_request_referenced_keys() {
        let request = RequestDef::new(HttpMethod::Put, "/service/${service_id}/dictionary/${dictionary_id}/item/k")
            .with_form("item_value", "${value}");

        let keys: Vec<_> = request.referenced_keys().into_iter().collect();
        assert_eq!(keys, vec!["dictionary_id", "service_id", "value"]);
    }

    #[test]
    fn test_step_def_from_yaml() {
        let yaml = r#"
name: validate
required: true
request:
  path: /service/${service_id}/version/${service_version}/validate
gate: { path: status, equals: ok }
"#;
        let step: StepDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.request.method, HttpMethod::Get);
        assert!(step.required);
        assert_eq!(step.gate, Some(Gate::new("status", "ok")));
        assert!(step.bind.is_empty());
    }

    #[test]
    fn test_bound_keys_include_fallback() {
        let mut step = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        step.bind.push(Binding::new("service_id", "id"));
        step.fallback = Some(FallbackDef {
            value: Some(json!({"id": "x", "version": 1})),
            bind: vec![Binding::new("service_version", "version")],
            ..Default::default()
        });

        let keys: Vec<_> = step.bound_keys().collect();
        assert_eq!(keys, vec!["service_id", "service_version"]);
    }

    #[test]
    fn test_compile_workflow() {
        let mut create = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        create.required = true;
        create.fallback = Some(FallbackDef {
            request: Some(RequestDef::new(HttpMethod::Get, "/service/${fallback_service_id}/version")),
            ..Default::default()
        });

        let def = WorkflowDef {
            name: "wf".to_string(),
            description: None,
            inputs: vec!["fallback_service_id".to_string()],
            steps: vec![create, StepDef::new("get", RequestDef::new(HttpMethod::Get, "/service"))],
        };

        let workflow = def.compile(client()).unwrap();
        assert_eq!(workflow.name, "wf");
        assert_eq!(workflow.len(), 2);
        assert!(workflow.steps()[0].required);
        assert!(workflow.steps()[0].fallback.is_some());
        assert_eq!(workflow.steps()[1].operation.describe(), "GET /service");
    }

    #[test]
    fn test_compile_rejects_ambiguous_fallback() {
        let mut step = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        step.fallback = Some(FallbackDef::default());

        let def = WorkflowDef {
            name: "wf".to_string(),
            description: None,
            inputs: Vec::new(),
            steps: vec![step],
        };

        let err = def.compile(client()).unwrap_err();
        assert!(err.contains("exactly one"));
    }

    #[test]
    fn test_missing_inputs() {
        let def = WorkflowDef {
            name: "wf".to_string(),
            description: None,
            inputs: vec!["customer_id".to_string(), "fallback_service_id".to_string()],
            steps: Vec::new(),
        };

        let ctx = Context::new().with("customer_id", "c1");
        assert_eq!(def.missing_inputs(&ctx), vec!["fallback_service_id".to_string()]);
    }
}

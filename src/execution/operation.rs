//! Step Operations
//!
//! The capability a step wraps: read the context, perform one unit of remote
//! work, return a JSON result or an error. The engine only ever sees this
//! trait; HTTP is one implementation among several.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::StepError;
use crate::workflow::context::Context;
use crate::workflow::definition::RequestDef;

/// One unit of work performed by a workflow step.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Performs the operation against a read-only view of the context.
    async fn call(&self, ctx: &Context) -> Result<Value, StepError>;

    /// Short human-readable description, used in plans and debug output.
    fn describe(&self) -> String {
        "operation".to_string()
    }
}

/// Operation that always returns the same value.
#[derive(Debug, Clone)]
pub struct ConstOperation {
    value: Value,
}

impl ConstOperation {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Operation for ConstOperation {
    async fn call(&self, _ctx: &Context) -> Result<Value, StepError> {
        Ok(self.value.clone())
    }

    fn describe(&self) -> String {
        format!("const {}", self.value)
    }
}

/// Operation that renders a value template against the context.
///
/// Useful as a fallback that synthesizes a result from configured inputs.
#[derive(Debug, Clone)]
pub struct TemplateOperation {
    template: Value,
}

impl TemplateOperation {
    pub fn new(template: Value) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Operation for TemplateOperation {
    async fn call(&self, ctx: &Context) -> Result<Value, StepError> {
        ctx.render(&self.template)
    }

    fn describe(&self) -> String {
        format!("value {}", self.template)
    }
}

/// Operation backed by a synchronous closure.
pub struct FnOperation<F> {
    label: String,
    func: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&Context) -> Result<Value, StepError> + Send + Sync,
{
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Operation for FnOperation<F>
where
    F: Fn(&Context) -> Result<Value, StepError> + Send + Sync,
{
    async fn call(&self, ctx: &Context) -> Result<Value, StepError> {
        (self.func)(ctx)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Operation that renders a request template and sends it to the API.
pub struct HttpOperation {
    client: Arc<ApiClient>,
    request: RequestDef,
}

impl HttpOperation {
    pub fn new(client: Arc<ApiClient>, request: RequestDef) -> Self {
        Self { client, request }
    }

    pub fn request(&self) -> &RequestDef {
        &self.request
    }
}

#[async_trait]
impl Operation for HttpOperation {
    async fn call(&self, ctx: &Context) -> Result<Value, StepError> {
        let resolved = self.request.resolve(ctx)?;
        debug!("{} {}", resolved.method, resolved.path);

        Ok(self.client.send(&resolved).await?)
    }

    fn describe(&self) -> String {
        format!("{} {}", self.request.method, self.request.path)
    }
}

//! Lifecycle hooks run around each pipeline mutation or read.
//!
//! A hook returns `Err(Halt)` to stop the pipeline; the response inside the halt is sent
//! as-is and nothing else is written.

use crate::extractors::RequestContext;
use crate::model::Record;
use crate::query::BulkFetchConfig;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::sync::Arc;

/// The response a hook wants sent instead of the pipeline's.
pub struct Halt(Response);

impl Halt {
    pub fn new(response: impl IntoResponse) -> Self {
        Halt(response.into_response())
    }

    pub fn status(&self) -> StatusCode {
        self.0.status()
    }
}

impl fmt::Debug for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Halt").field(&self.0.status()).finish()
    }
}

impl IntoResponse for Halt {
    fn into_response(self) -> Response {
        self.0
    }
}

pub type HookResult = Result<(), Halt>;

pub type RecordHook = Arc<dyn Fn(&RequestContext, &mut Record) -> HookResult + Send + Sync>;
pub type BeforeIndexHook = Arc<dyn Fn(&RequestContext, &mut BulkFetchConfig) -> HookResult + Send + Sync>;
pub type AfterIndexHook = Arc<dyn Fn(&RequestContext, &mut Vec<Record>) -> HookResult + Send + Sync>;
pub type AfterDeleteHook = Arc<dyn Fn(&RequestContext) -> HookResult + Send + Sync>;

#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub before_create: Option<RecordHook>,
    pub after_create: Option<RecordHook>,
    pub before_index: Option<BeforeIndexHook>,
    pub after_index: Option<AfterIndexHook>,
    pub before_show: Option<RecordHook>,
    pub after_show: Option<RecordHook>,
    pub before_update: Option<RecordHook>,
    pub after_update: Option<RecordHook>,
    pub before_delete: Option<RecordHook>,
    pub after_delete: Option<AfterDeleteHook>,
}

macro_rules! record_hook_setter {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name<F>(mut self, hook: F) -> Self
            where
                F: Fn(&RequestContext, &mut Record) -> HookResult + Send + Sync + 'static,
            {
                self.$name = Some(Arc::new(hook));
                self
            }
        )*
    };
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    record_hook_setter!(
        before_create,
        after_create,
        before_show,
        after_show,
        before_update,
        after_update,
        before_delete,
    );

    pub fn before_index<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut BulkFetchConfig) -> HookResult + Send + Sync + 'static,
    {
        self.before_index = Some(Arc::new(hook));
        self
    }

    pub fn after_index<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut Vec<Record>) -> HookResult + Send + Sync + 'static,
    {
        self.after_index = Some(Arc::new(hook));
        self
    }

    pub fn after_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext) -> HookResult + Send + Sync + 'static,
    {
        self.after_delete = Some(Arc::new(hook));
        self
    }
}

/// Run an optional hook; an absent slot always continues.
pub(crate) fn run<T: ?Sized>(
    hook: &Option<Arc<dyn Fn(&RequestContext, &mut T) -> HookResult + Send + Sync>>,
    ctx: &RequestContext,
    target: &mut T,
    stage: &'static str,
) -> HookResult {
    match hook {
        Some(h) => h(ctx, target).inspect_err(|halt| {
            tracing::debug!(stage, status = %halt.status(), "hook halted request");
        }),
        None => Ok(()),
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("before_create", self.before_create.is_some()),
            ("after_create", self.after_create.is_some()),
            ("before_index", self.before_index.is_some()),
            ("after_index", self.after_index.is_some()),
            ("before_show", self.before_show.is_some()),
            ("after_show", self.after_show.is_some()),
            ("before_update", self.before_update.is_some()),
            ("after_update", self.after_update.is_some()),
            ("before_delete", self.before_delete.is_some()),
            ("after_delete", self.after_delete.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();
        f.debug_struct("LifecycleHooks").field("set", &set).finish()
    }
}

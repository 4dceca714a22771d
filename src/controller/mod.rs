//! REST controllers derived from models and the relationship between them.
//!
//! One [`Controller`] covers all four shapes; the [`Relationship`] it is built from decides
//! the routes it registers and how each verb resolves, authorizes and mutates records.

mod params;
mod pipeline;
mod values;

pub use params::{ID_PARAM, NESTED_ID_PARAM};

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::hooks::LifecycleHooks;
use crate::model::{Model, Record};
use crate::response::Reply;
use crate::state::AppState;
use crate::store::Store;
use axum::extract::State;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Ownership check for one-to-many children: `belongs_to(parent, child)`.
pub type BelongsTo = Arc<dyn Fn(&Record, &Record) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Relationship {
    Plain {
        model: Model,
    },
    /// `foreign_reference` is a field on `base` holding the nested id.
    OneToOne {
        base: Model,
        nested: Model,
        nested_name_singular: String,
        foreign_reference: String,
    },
    /// `foreign_reference` is a field on `nested` holding the base id.
    OneToMany {
        base: Model,
        nested: Model,
        foreign_reference: String,
        belongs_to: BelongsTo,
    },
    ManyToMany {
        base: Model,
        nested: Model,
        relation: Model,
        base_reference: String,
        nested_reference: String,
    },
}

impl Relationship {
    pub fn plain(model: Model) -> Self {
        Relationship::Plain { model }
    }

    pub fn one_to_one(
        base: Model,
        nested: Model,
        nested_name_singular: impl Into<String>,
        foreign_reference: impl Into<String>,
    ) -> Self {
        Relationship::OneToOne {
            base,
            nested,
            nested_name_singular: nested_name_singular.into(),
            foreign_reference: foreign_reference.into(),
        }
    }

    /// Children belong to a parent when their `foreign_reference` equals the parent id.
    pub fn one_to_many(base: Model, nested: Model, foreign_reference: impl Into<String>) -> Self {
        let foreign_reference = foreign_reference.into();
        let field = foreign_reference.clone();
        Relationship::OneToMany {
            base,
            nested,
            foreign_reference,
            belongs_to: Arc::new(move |parent, child| child.get_i64(&field) == parent.id()),
        }
    }

    pub fn many_to_many(
        base: Model,
        nested: Model,
        relation: Model,
        base_reference: impl Into<String>,
        nested_reference: impl Into<String>,
    ) -> Self {
        Relationship::ManyToMany {
            base,
            nested,
            relation,
            base_reference: base_reference.into(),
            nested_reference: nested_reference.into(),
        }
    }

    /// Replace the ownership check of a one-to-many relationship. Other shapes are returned unchanged.
    pub fn with_belongs_to<F>(self, check: F) -> Self
    where
        F: Fn(&Record, &Record) -> bool + Send + Sync + 'static,
    {
        match self {
            Relationship::OneToMany {
                base,
                nested,
                foreign_reference,
                ..
            } => Relationship::OneToMany {
                base,
                nested,
                foreign_reference,
                belongs_to: Arc::new(check),
            },
            other => other,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Relationship::Plain { .. } => "plain",
            Relationship::OneToOne { .. } => "one_to_one",
            Relationship::OneToMany { .. } => "one_to_many",
            Relationship::ManyToMany { .. } => "many_to_many",
        }
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relationship::Plain { model } => f.debug_struct("Plain").field("model", &model.table_name).finish(),
            Relationship::OneToOne {
                base,
                nested,
                nested_name_singular,
                foreign_reference,
            } => f
                .debug_struct("OneToOne")
                .field("base", &base.table_name)
                .field("nested", &nested.table_name)
                .field("nested_name_singular", nested_name_singular)
                .field("foreign_reference", foreign_reference)
                .finish(),
            Relationship::OneToMany {
                base,
                nested,
                foreign_reference,
                ..
            } => f
                .debug_struct("OneToMany")
                .field("base", &base.table_name)
                .field("nested", &nested.table_name)
                .field("foreign_reference", foreign_reference)
                .finish_non_exhaustive(),
            Relationship::ManyToMany {
                base,
                nested,
                relation,
                base_reference,
                nested_reference,
            } => f
                .debug_struct("ManyToMany")
                .field("base", &base.table_name)
                .field("nested", &nested.table_name)
                .field("relation", &relation.table_name)
                .field("base_reference", base_reference)
                .field("nested_reference", nested_reference)
                .finish(),
        }
    }
}

/// The five REST verbs a controller can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Create,
    Index,
    Show,
    Update,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [Method::Create, Method::Index, Method::Show, Method::Update, Method::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Create => "CREATE",
            Method::Index => "INDEX",
            Method::Show => "SHOW",
            Method::Update => "UPDATE",
            Method::Delete => "DELETE",
        }
    }

    pub fn http_method(self) -> axum::http::Method {
        match self {
            Method::Create => axum::http::Method::POST,
            Method::Index | Method::Show => axum::http::Method::GET,
            Method::Update => axum::http::Method::PUT,
            Method::Delete => axum::http::Method::DELETE,
        }
    }

    fn filter(self) -> MethodFilter {
        match self {
            Method::Create => MethodFilter::POST,
            Method::Index | Method::Show => MethodFilter::GET,
            Method::Update => MethodFilter::PUT,
            Method::Delete => MethodFilter::DELETE,
        }
    }
}

/// One registered endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub verb: Method,
    pub path: String,
}

#[derive(Clone, Debug)]
pub struct Controller {
    relationship: Relationship,
    hooks: LifecycleHooks,
    /// Empty means every verb.
    methods: Vec<Method>,
}

impl Controller {
    pub fn new(relationship: Relationship) -> Self {
        Controller {
            relationship,
            hooks: LifecycleHooks::default(),
            methods: Vec::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn allows(&self, verb: Method) -> bool {
        self.methods.is_empty() || self.methods.contains(&verb)
    }

    /// Endpoints this controller registers, after applying the method whitelist.
    pub fn routes(&self) -> Vec<Route> {
        let (collection, member): (String, String) = match &self.relationship {
            Relationship::Plain { model } => {
                let collection = format!("/{}", model.table_name);
                let member = format!("{}/:{}", collection, ID_PARAM);
                (collection, member)
            }
            Relationship::OneToOne {
                base,
                nested_name_singular,
                ..
            } => {
                let path = format!("/{}/:{}/{}", base.table_name, ID_PARAM, nested_name_singular);
                (path.clone(), path)
            }
            Relationship::OneToMany { base, nested, .. } | Relationship::ManyToMany { base, nested, .. } => {
                let collection = format!("/{}/:{}/{}", base.table_name, ID_PARAM, nested.table_name);
                let member = format!("{}/:{}", collection, NESTED_ID_PARAM);
                (collection, member)
            }
        };
        let is_one_to_one = matches!(self.relationship, Relationship::OneToOne { .. });
        Method::ALL
            .into_iter()
            .filter(|verb| self.allows(*verb))
            .filter(|verb| !(is_one_to_one && *verb == Method::Index))
            .map(|verb| {
                let path = match verb {
                    Method::Create if !matches!(self.relationship, Relationship::ManyToMany { .. }) => &collection,
                    Method::Index => &collection,
                    _ => &member,
                };
                Route {
                    verb,
                    path: path.clone(),
                }
            })
            .collect()
    }

    /// Add this controller's routes to `router`.
    pub fn register(self, router: Router<AppState>) -> Router<AppState> {
        let controller = Arc::new(self);
        let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();
        for route in controller.routes() {
            tracing::info!(
                shape = controller.relationship.shape(),
                verb = route.verb.as_str(),
                method = %route.verb.http_method(),
                path = %route.path,
                "registering route"
            );
            let c = Arc::clone(&controller);
            let verb = route.verb;
            let handler = move |State(state): State<AppState>, ctx: RequestContext| async move {
                c.dispatch(verb, state.store.as_ref(), ctx).await
            };
            let entry = by_path.remove(&route.path).unwrap_or_default();
            by_path.insert(route.path, entry.on(verb.filter(), handler));
        }
        by_path
            .into_iter()
            .fold(router, |router, (path, methods)| router.route(&path, methods))
    }

    /// Run the pipeline for `verb` against `store`.
    pub async fn dispatch(&self, verb: Method, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        tracing::debug!(verb = verb.as_str(), path = %ctx.uri.path(), "dispatch");
        match verb {
            Method::Create => self.create(store, ctx).await,
            Method::Index => self.index(store, ctx).await,
            Method::Show => self.show(store, ctx).await,
            Method::Update => self.update(store, ctx).await,
            Method::Delete => self.delete(store, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, FieldKind, ModelConfig, Primitive, ID_FIELD};

    fn model(table: &str) -> Model {
        Arc::new(ModelConfig::new(table).field(FieldDef::managed(ID_FIELD, FieldKind::Required(Primitive::Int))))
    }

    fn paths(c: &Controller) -> Vec<(Method, String)> {
        c.routes().into_iter().map(|r| (r.verb, r.path)).collect()
    }

    #[test]
    fn plain_routes() {
        let c = Controller::new(Relationship::plain(model("users")));
        assert_eq!(
            paths(&c),
            vec![
                (Method::Create, "/users".to_string()),
                (Method::Index, "/users".to_string()),
                (Method::Show, "/users/:id".to_string()),
                (Method::Update, "/users/:id".to_string()),
                (Method::Delete, "/users/:id".to_string()),
            ]
        );
    }

    #[test]
    fn one_to_one_has_no_index() {
        let c = Controller::new(Relationship::one_to_one(model("users"), model("profiles"), "profile", "profile_id"));
        let routes = paths(&c);
        assert_eq!(routes.len(), 4);
        assert!(routes.iter().all(|(_, p)| p == "/users/:id/profile"));
    }

    #[test]
    fn many_to_many_create_targets_member() {
        let c = Controller::new(Relationship::many_to_many(
            model("users"),
            model("groups"),
            model("user_groups"),
            "user_id",
            "group_id",
        ))
        .with_methods([Method::Create, Method::Index]);
        assert_eq!(
            paths(&c),
            vec![
                (Method::Create, "/users/:id/groups/:nested_id".to_string()),
                (Method::Index, "/users/:id/groups".to_string()),
            ]
        );
    }
}

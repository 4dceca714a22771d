//! Per-verb request pipelines.
//!
//! Each verb runs a fixed sequence of stages and stops at the first failure:
//! validate, resolve the parent, authorize by relation, check preconditions, run the
//! before hook, mutate, run the after hook, respond.

use super::params::{index_params, validate_ids, validate_request, IndexParams, ID_PARAM, NESTED_ID_PARAM};
use super::values::{apply, insert_values, update_values};
use super::{Controller, Relationship};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::hooks::{self, RecordHook};
use crate::model::{FieldKind, FieldValue, Model, Primitive, Record, ID_FIELD};
use crate::precondition::{apply_modified_since, is_unmodified_since};
use crate::query::{BulkFetchConfig, Predicate};
use crate::response::Reply;
use crate::store::Store;

/// The record a Show, Update or Delete request addresses, plus what was loaded to reach it.
struct Target {
    parent: Option<Record>,
    record: Record,
}

async fn load(store: &dyn Store, model: &Model, id: i64) -> Result<Record, AppError> {
    let mut record = model.build();
    record.set_id(id);
    store.load(&mut record).await.map_err(AppError::from_load)?;
    Ok(record)
}

async fn fetch(store: &dyn Store, model: &Model, config: &BulkFetchConfig) -> Result<Vec<Record>, AppError> {
    store.bulk_fetch(model, config).await.map_err(AppError::Store)
}

/// The join row linking `id` to `nested_id`, if any.
async fn join_row(
    store: &dyn Store,
    relation: &Model,
    base_reference: &str,
    nested_reference: &str,
    id: i64,
    nested_id: i64,
) -> Result<Record, AppError> {
    let config = BulkFetchConfig::new(1, 0)
        .predicate(Predicate::equal(base_reference, id))
        .predicate(Predicate::equal(nested_reference, nested_id));
    fetch(store, relation, &config)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)
}

impl Controller {
    pub(crate) async fn create(&self, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        let hooks = &self.hooks;
        let mut record = match &self.relationship {
            Relationship::Plain { model } => {
                let (_, values) = validate_request(&ctx, &[], insert_values(&ctx, model, &[]))?;
                let mut record = model.build();
                apply(&mut record, values);
                hooks::run(&hooks.before_create, &ctx, &mut record, "before_create")?;
                store.insert(&mut record).await.map_err(AppError::from_write)?;
                record
            }
            Relationship::OneToOne {
                base,
                nested,
                foreign_reference,
                ..
            } => {
                let (ids, values) = validate_request(&ctx, &[ID_PARAM], insert_values(&ctx, nested, &[]))?;
                let mut parent = load(store, base, ids[0]).await?;
                if parent.get_i64(foreign_reference) != 0 {
                    tracing::debug!(table = %base.table_name, field = %foreign_reference, "one-to-one link already set");
                    return Err(AppError::Conflict(None));
                }
                let mut record = nested.build();
                apply(&mut record, values);
                hooks::run(&hooks.before_create, &ctx, &mut record, "before_create")?;
                store.insert(&mut record).await.map_err(AppError::from_write)?;
                parent.set(foreign_reference, record.id());
                store.update(&mut parent).await.map_err(AppError::Store)?;
                record
            }
            Relationship::OneToMany {
                base,
                nested,
                foreign_reference,
                ..
            } => {
                let inputs = insert_values(&ctx, nested, &[foreign_reference.as_str()]);
                let (ids, values) = validate_request(&ctx, &[ID_PARAM], inputs)?;
                let parent = load(store, base, ids[0]).await?;
                let mut record = nested.build();
                apply(&mut record, values);
                record.set(foreign_reference, parent.id());
                hooks::run(&hooks.before_create, &ctx, &mut record, "before_create")?;
                store.insert(&mut record).await.map_err(AppError::from_write)?;
                record
            }
            Relationship::ManyToMany {
                base,
                nested,
                relation,
                base_reference,
                nested_reference,
            } => {
                let inputs = insert_values(&ctx, relation, &[base_reference.as_str(), nested_reference.as_str()]);
                let (ids, values) = validate_request(&ctx, &[ID_PARAM, NESTED_ID_PARAM], inputs)?;
                let parent = load(store, base, ids[0]).await?;
                let child = load(store, nested, ids[1]).await?;
                let mut record = relation.build();
                apply(&mut record, values);
                record.set(base_reference, parent.id());
                record.set(nested_reference, child.id());
                hooks::run(&hooks.before_create, &ctx, &mut record, "before_create")?;
                store.insert(&mut record).await.map_err(AppError::from_write)?;
                record
            }
        };
        hooks::run(&hooks.after_create, &ctx, &mut record, "after_create")?;
        Ok(Reply::One(record))
    }

    pub(crate) async fn index(&self, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        let (model, mut config) = match &self.relationship {
            Relationship::Plain { model } => {
                let params = index_params(&ctx, &[], model)?;
                (model, params.fetch_config())
            }
            Relationship::OneToOne { .. } => return Err(AppError::MethodNotAllowed),
            Relationship::OneToMany {
                base,
                nested,
                foreign_reference,
                ..
            } => {
                let params = index_params(&ctx, &[ID_PARAM], nested)?;
                let parent = load(store, base, params.ids[0]).await?;
                let config = params
                    .fetch_config()
                    .predicate(Predicate::equal(foreign_reference.as_str(), parent.id()));
                (nested, config)
            }
            Relationship::ManyToMany {
                base,
                nested,
                relation,
                base_reference,
                nested_reference,
            } => {
                let params: IndexParams = index_params(&ctx, &[ID_PARAM], nested)?;
                let parent = load(store, base, params.ids[0]).await?;
                let joins = fetch(
                    store,
                    relation,
                    &BulkFetchConfig::unbounded().predicate(Predicate::equal(base_reference.as_str(), parent.id())),
                )
                .await?;
                if joins.is_empty() {
                    return Ok(Reply::Many(Vec::new()));
                }
                let ids: Vec<FieldValue> = joins
                    .iter()
                    .map(|join| FieldValue::Int(join.get_i64(nested_reference)))
                    .collect();
                (nested, params.fetch_config().predicate(Predicate::is_in(ID_FIELD, ids)))
            }
        };
        apply_modified_since(&ctx.headers, &mut config);
        hooks::run(&self.hooks.before_index, &ctx, &mut config, "before_index")?;
        let mut records = fetch(store, model, &config).await?;
        hooks::run(&self.hooks.after_index, &ctx, &mut records, "after_index")?;
        Ok(Reply::Many(records))
    }

    /// Resolve identifiers and ownership down to the addressed record.
    /// `before_load` runs immediately before the record itself is loaded.
    async fn resolve(
        &self,
        store: &dyn Store,
        ctx: &RequestContext,
        before_load: Option<(&Option<RecordHook>, &'static str)>,
    ) -> Result<Target, AppError> {
        let run_before = |record: &mut Record| match before_load {
            Some((hook, stage)) => hooks::run(hook, ctx, record, stage),
            None => Ok(()),
        };
        match &self.relationship {
            Relationship::Plain { model } => {
                let ids = validate_ids(ctx, &[ID_PARAM])?;
                let mut record = model.build();
                record.set_id(ids[0]);
                run_before(&mut record)?;
                store.load(&mut record).await.map_err(AppError::from_load)?;
                Ok(Target { parent: None, record })
            }
            Relationship::OneToOne {
                base,
                nested,
                foreign_reference,
                ..
            } => {
                let ids = validate_ids(ctx, &[ID_PARAM])?;
                let parent = load(store, base, ids[0]).await?;
                let nested_id = parent.get_i64(foreign_reference);
                if nested_id == 0 {
                    return Err(AppError::NotFound);
                }
                let mut record = nested.build();
                record.set_id(nested_id);
                run_before(&mut record)?;
                store.load(&mut record).await.map_err(AppError::from_load)?;
                Ok(Target {
                    parent: Some(parent),
                    record,
                })
            }
            Relationship::OneToMany {
                base,
                nested,
                belongs_to,
                ..
            } => {
                let ids = validate_ids(ctx, &[ID_PARAM, NESTED_ID_PARAM])?;
                let parent = load(store, base, ids[0]).await?;
                let mut record = nested.build();
                record.set_id(ids[1]);
                run_before(&mut record)?;
                store.load(&mut record).await.map_err(AppError::from_load)?;
                if !belongs_to(&parent, &record) {
                    tracing::debug!(parent = parent.id(), child = record.id(), "child does not belong to parent");
                    return Err(AppError::NotFound);
                }
                Ok(Target {
                    parent: Some(parent),
                    record,
                })
            }
            Relationship::ManyToMany {
                base,
                nested,
                relation,
                base_reference,
                nested_reference,
            } => {
                let ids = validate_ids(ctx, &[ID_PARAM, NESTED_ID_PARAM])?;
                let parent = load(store, base, ids[0]).await?;
                join_row(store, relation, base_reference, nested_reference, ids[0], ids[1]).await?;
                let mut record = nested.build();
                record.set_id(ids[1]);
                run_before(&mut record)?;
                store.load(&mut record).await.map_err(AppError::from_load)?;
                Ok(Target {
                    parent: Some(parent),
                    record,
                })
            }
        }
    }

    pub(crate) async fn show(&self, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        let mut target = self
            .resolve(store, &ctx, Some((&self.hooks.before_show, "before_show")))
            .await?;
        hooks::run(&self.hooks.after_show, &ctx, &mut target.record, "after_show")?;
        Ok(Reply::One(target.record))
    }

    pub(crate) async fn update(&self, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        let exclusions: Vec<&str> = match &self.relationship {
            Relationship::ManyToMany { .. } => return Err(AppError::MethodNotAllowed),
            Relationship::OneToMany { foreign_reference, .. } => vec![foreign_reference.as_str()],
            _ => Vec::new(),
        };
        let Target { mut record, .. } = self.resolve(store, &ctx, None).await?;
        if !is_unmodified_since(&ctx.headers, &record) {
            return Err(AppError::PreconditionFailed(
                "The `If-Unmodified-Since` condition is not satisfied".to_string(),
            ));
        }
        let (_, values) = validate_request(&ctx, &[], update_values(&ctx, record.config(), &exclusions))?;
        apply(&mut record, values);
        hooks::run(&self.hooks.before_update, &ctx, &mut record, "before_update")?;
        store.update(&mut record).await.map_err(AppError::from_write)?;
        hooks::run(&self.hooks.after_update, &ctx, &mut record, "after_update")?;
        Ok(Reply::One(record))
    }

    pub(crate) async fn delete(&self, store: &dyn Store, ctx: RequestContext) -> Result<Reply, AppError> {
        let mut doomed = match &self.relationship {
            Relationship::Plain { .. } | Relationship::OneToMany { .. } => self.resolve(store, &ctx, None).await?.record,
            Relationship::OneToOne {
                base,
                nested,
                foreign_reference,
                ..
            } => {
                let ids = validate_ids(&ctx, &[ID_PARAM])?;
                let mut parent = load(store, base, ids[0]).await?;
                let nullable_int = base
                    .field_def(foreign_reference)
                    .is_some_and(|def| def.kind == FieldKind::Nullable(Primitive::Int));
                if !nullable_int {
                    return Err(AppError::Internal(Some(format!(
                        "`{}.{}` is not nullable. DELETE should not be allowed.",
                        base.table_name, foreign_reference
                    ))));
                }
                let nested_id = parent.get_i64(foreign_reference);
                if nested_id == 0 {
                    return Err(AppError::NotFound);
                }
                let mut record = load(store, nested, nested_id).await?;
                hooks::run(&self.hooks.before_delete, &ctx, &mut record, "before_delete")?;
                parent.set(foreign_reference, FieldValue::Null);
                store.update(&mut parent).await.map_err(AppError::Store)?;
                store.delete(&record).await.map_err(AppError::from_load)?;
                return self.after_delete(&ctx);
            }
            Relationship::ManyToMany {
                base,
                relation,
                base_reference,
                nested_reference,
                ..
            } => {
                let ids = validate_ids(&ctx, &[ID_PARAM, NESTED_ID_PARAM])?;
                load(store, base, ids[0]).await?;
                join_row(store, relation, base_reference, nested_reference, ids[0], ids[1]).await?
            }
        };
        hooks::run(&self.hooks.before_delete, &ctx, &mut doomed, "before_delete")?;
        store.delete(&doomed).await.map_err(AppError::from_load)?;
        self.after_delete(&ctx)
    }

    fn after_delete(&self, ctx: &RequestContext) -> Result<Reply, AppError> {
        if let Some(hook) = &self.hooks.after_delete {
            hook(ctx).inspect_err(|halt| {
                tracing::debug!(stage = "after_delete", status = %halt.status(), "hook halted request");
            })?;
        }
        Ok(Reply::Empty)
    }
}

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::envelope::TableResult;
use crate::error::Error;
use crate::filter::table_filter;
use crate::metrics::metrics;
use crate::model::{EntityModel, ModelRegistry};
use crate::paging::Page;
use crate::query::{self, QueryScope, SelectQuery};
use crate::request::{RowShape, TableRequest};
use crate::spec::{where_clause, Specification};
use crate::Result;

const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

/// Server-side table query engine over one root entity.
///
/// The engine is stateless per call; clones share the pool and registry,
/// so one instance can serve concurrent requests. Each of the up to three
/// queries of a call (pre-filter count, filtered count, page select) runs
/// on its own pooled connection, acquired and released per stage.
#[derive(Clone)]
pub struct GridEngine {
    pool: PgPool,
    registry: Arc<ModelRegistry>,
    root_entity: String,
    slow_query_threshold: Duration,
}

impl GridEngine {
    pub async fn connect(
        url: &str,
        registry: ModelRegistry,
        root_entity: impl Into<String>,
    ) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::with_pool(pool, registry, root_entity))
    }

    pub fn with_pool(
        pool: PgPool,
        registry: ModelRegistry,
        root_entity: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            registry: Arc::new(registry),
            root_entity: root_entity.into(),
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
        }
    }

    pub fn builder(
        url: impl Into<String>,
        registry: ModelRegistry,
        root_entity: impl Into<String>,
    ) -> GridEngineBuilder {
        GridEngineBuilder::new(url, registry, root_entity)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// `find_all` without caller-supplied specifications.
    pub async fn find_all_simple<R>(&self, request: &TableRequest) -> Result<TableResult<R>>
    where
        R: DeserializeOwned,
    {
        self.find_all(request, None, None).await
    }

    /// Runs a table request and returns the widget envelope.
    ///
    /// `additional` is and-ed into the filtered stages only; `pre_filter`
    /// scopes everything, including the unfiltered count. Validation
    /// errors propagate; database and row-decode failures are logged and
    /// reported through `TableResult::error` with the counts computed so
    /// far and no data.
    pub async fn find_all<R>(
        &self,
        request: &TableRequest,
        additional: Option<Specification>,
        pre_filter: Option<Specification>,
    ) -> Result<TableResult<R>>
    where
        R: DeserializeOwned,
    {
        if request.columns.is_empty() {
            return Err(Error::EmptyColumns);
        }

        let mut output = TableResult::new(request.draw);
        if request.length == 0 {
            // mandatory short-circuit: no queries run for a zero-length page
            return Ok(output);
        }

        match self.run(request, additional, pre_filter, &mut output).await {
            Ok(()) => Ok(output),
            Err(err) if err.is_runtime() => {
                metrics().recovered_errors_total.fetch_add(1, Ordering::Relaxed);
                tracing::error!(target: "gridflow::engine", error = %err, "table query failed");
                output.data.clear();
                output.error = Some(err.to_string());
                Ok(output)
            }
            Err(err) => Err(err),
        }
    }

    async fn run<R>(
        &self,
        request: &TableRequest,
        additional: Option<Specification>,
        pre_filter: Option<Specification>,
        output: &mut TableResult<R>,
    ) -> Result<()>
    where
        R: DeserializeOwned,
    {
        let root = self.root_model()?;

        output.records_total = self.count(root, pre_filter.as_ref(), request).await?;
        tracing::debug!(
            target: "gridflow::engine",
            records_total = output.records_total,
            "pre-filter count"
        );
        if output.records_total == 0 {
            return Ok(());
        }

        let full = where_clause(table_filter(request))
            .and(additional)
            .and(pre_filter);

        output.records_filtered = self.count(root, Some(&full), request).await?;
        tracing::debug!(
            target: "gridflow::engine",
            records_filtered = output.records_filtered,
            "filtered count"
        );

        let page = Page::from_request(request);
        output.data = self.select_page(root, &full, request, &page).await?;
        Ok(())
    }

    fn root_model(&self) -> Result<&EntityModel> {
        self.registry
            .entity(&self.root_entity)
            .ok_or_else(|| Error::UnknownEntity(self.root_entity.clone()))
    }

    async fn count(
        &self,
        root: &EntityModel,
        spec: Option<&Specification>,
        request: &TableRequest,
    ) -> Result<i64> {
        let mut scope = QueryScope::new(&self.registry, root);
        let predicate = match spec {
            Some(spec) => Some(spec.to_predicate(&mut scope)?),
            None => None,
        };
        let group_by = resolve_group_by(&mut scope, request)?;

        let mut builder = query::build_count(&scope, predicate.as_ref(), &group_by);
        let sql = builder.sql().to_string();
        let started = Instant::now();
        let total = {
            let mut conn = self.pool.acquire().await?;
            builder
                .build_query_scalar::<i64>()
                .fetch_one(&mut *conn)
                .await?
        };
        metrics().count_queries_total.fetch_add(1, Ordering::Relaxed);
        self.warn_if_slow(&sql, started.elapsed());
        Ok(total)
    }

    async fn select_page<R>(
        &self,
        root: &EntityModel,
        full: &Specification,
        request: &TableRequest,
        page: &Page,
    ) -> Result<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let mut scope = QueryScope::new(&self.registry, root);
        let predicate = full.to_predicate(&mut scope)?;
        let group_by = resolve_group_by(&mut scope, request)?;

        let select = match request.shape {
            RowShape::Entity => "to_jsonb(t0.*)".to_string(),
            RowShape::Projection => {
                // project the group-by columns when grouping, the declared
                // columns otherwise
                let source = match &request.group_by_columns {
                    Some(groups) if !groups.is_empty() => groups,
                    _ => &request.columns,
                };
                let mut exprs = Vec::with_capacity(source.len());
                for column in source {
                    exprs.push(scope.resolve(&column.data)?.sql().to_string());
                }
                format!("jsonb_build_array({})", exprs.join(", "))
            }
        };

        let mut order_by = Vec::new();
        if let Some(sort) = page.sort() {
            for (direction, attribute) in sort {
                order_by.push((scope.resolve(attribute)?.sql().to_string(), *direction));
            }
        }

        let mut builder = query::build_select(
            &scope,
            SelectQuery {
                select,
                predicate: Some(predicate),
                group_by,
                order_by,
                limit: Some(page.page_size()),
                offset: Some(page.offset()),
            },
        );
        let sql = builder.sql().to_string();
        let started = Instant::now();
        let rows = {
            let mut conn = self.pool.acquire().await?;
            builder
                .build_query_as::<(Value,)>()
                .fetch_all(&mut *conn)
                .await?
        };
        metrics().select_queries_total.fetch_add(1, Ordering::Relaxed);
        metrics()
            .rows_returned_total
            .fetch_add(rows.len() as u64, Ordering::Relaxed);
        self.warn_if_slow(&sql, started.elapsed());

        rows.into_iter()
            .map(|(value,)| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    fn warn_if_slow(&self, sql: &str, elapsed: Duration) {
        if elapsed > self.slow_query_threshold {
            tracing::warn!(
                target: "gridflow::slow_query",
                elapsed_ms = elapsed.as_millis() as u64,
                sql = %sql,
                "slow table query"
            );
        }
    }
}

fn resolve_group_by(scope: &mut QueryScope<'_>, request: &TableRequest) -> Result<Vec<String>> {
    let Some(groups) = &request.group_by_columns else {
        return Ok(Vec::new());
    };
    groups
        .iter()
        .map(|column| Ok(scope.resolve(&column.data)?.sql().to_string()))
        .collect()
}

/// Pool and engine configuration, mirroring [`GridEngine::connect`] with
/// explicit settings.
pub struct GridEngineBuilder {
    url: String,
    registry: ModelRegistry,
    root_entity: String,
    max_connections: u32,
    acquire_timeout: Duration,
    slow_query_threshold: Duration,
}

impl GridEngineBuilder {
    pub fn new(
        url: impl Into<String>,
        registry: ModelRegistry,
        root_entity: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            registry,
            root_entity: root_entity.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }

    pub async fn connect(self) -> Result<GridEngine> {
        let pool = self.pool_options().connect(&self.url).await?;
        Ok(self.into_engine(pool))
    }

    /// Builds the engine without dialing the database; the pool connects
    /// on first use.
    pub fn connect_lazy(self) -> Result<GridEngine> {
        let pool = self.pool_options().connect_lazy(&self.url)?;
        Ok(self.into_engine(pool))
    }

    fn into_engine(self, pool: PgPool) -> GridEngine {
        GridEngine {
            pool,
            registry: Arc::new(self.registry),
            root_entity: self.root_entity,
            slow_query_threshold: self.slow_query_threshold,
        }
    }
}

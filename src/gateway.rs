use std::future::Future;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::models::{
    Cluster, LoadBalancer, LogEvent, LogStream, Service, Task, TargetGroup, TargetGroupHealth,
    TargetHealth,
};

pub const DEFAULT_STOP_REASON: &str = "Manual restart from dashboard";
/// Page size for service and task listings. Continuation tokens are not followed.
pub const LIST_CAP: i32 = 100;
pub const LOG_STREAM_LIMIT: i32 = 10;
pub const DEFAULT_EVENT_LIMIT: i32 = 100;

const CLUSTERS_PER_DESCRIBE: usize = 100;
const SERVICES_PER_DESCRIBE: usize = 10;
const TASKS_PER_DESCRIBE: usize = 100;
const DESCRIBE_CONCURRENCY: usize = 4;

/// One method per remote management call. Implementations map absent
/// collections to empty vectors and report failures with the remote message.
pub trait RemoteApi: Send + Sync + 'static {
    fn list_clusters(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn describe_clusters(
        &self,
        arns: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Cluster>>> + Send;

    fn list_services(
        &self,
        cluster: &str,
        max_results: i32,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn describe_services(
        &self,
        cluster: &str,
        arns: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Service>>> + Send;

    fn list_tasks(
        &self,
        cluster: &str,
        service_name: Option<&str>,
        max_results: i32,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn describe_tasks(
        &self,
        cluster: &str,
        arns: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Task>>> + Send;

    fn stop_task(
        &self,
        cluster: &str,
        task: &str,
        reason: &str,
    ) -> impl Future<Output = Result<Option<Task>>> + Send;

    fn describe_load_balancers(&self) -> impl Future<Output = Result<Vec<LoadBalancer>>> + Send;

    fn describe_target_groups(
        &self,
        load_balancer_arn: &str,
    ) -> impl Future<Output = Result<Vec<TargetGroup>>> + Send;

    fn describe_target_health(
        &self,
        target_group_arn: &str,
    ) -> impl Future<Output = Result<Vec<TargetHealth>>> + Send;

    /// Streams ordered by last event time, newest first.
    fn describe_log_streams(
        &self,
        log_group: &str,
        limit: i32,
    ) -> impl Future<Output = Result<Vec<LogStream>>> + Send;

    /// Events read from the tail of the stream.
    fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        limit: i32,
    ) -> impl Future<Output = Result<Vec<LogEvent>>> + Send;
}

/// A unit of remote work requested by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fetch {
    Clusters,
    LoadBalancers,
    Services {
        cluster: String,
    },
    Tasks {
        cluster: String,
        service: String,
    },
    StopTask {
        cluster: String,
        task: String,
        reason: String,
    },
    TargetGroups {
        load_balancer: String,
    },
    LogStreams {
        group: String,
    },
    LogEvents {
        group: String,
        stream: String,
        limit: i32,
    },
}

#[derive(Debug)]
pub enum Outcome {
    Clusters(Result<Vec<Cluster>>),
    LoadBalancers(Result<Vec<LoadBalancer>>),
    Services(Result<Vec<Service>>),
    Tasks(Result<Vec<Task>>),
    TaskStopped(Result<Option<Task>>),
    TargetGroups(Result<Vec<TargetGroupHealth>>),
    LogStreams(Result<Vec<LogStream>>),
    LogEvents(Result<Vec<LogEvent>>),
}

/// Enforces the call contract on top of a [`RemoteApi`]: empty describes never
/// reach the wire, listings are capped and errors carry a readable message.
pub struct Gateway<A> {
    api: A,
}

impl<A: RemoteApi> Gateway<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn list_clusters(&self) -> Result<Vec<String>> {
        let arns = self
            .api
            .list_clusters()
            .await
            .context("Error listing clusters")?;
        debug!(count = arns.len(), "listed clusters");
        Ok(arns)
    }

    pub async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<Cluster>> {
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        in_chunks(arns, CLUSTERS_PER_DESCRIBE, |chunk| {
            self.api.describe_clusters(chunk)
        })
        .await
        .context("Error describing clusters")
    }

    pub async fn list_services(&self, cluster: &str) -> Result<Vec<String>> {
        let arns = self
            .api
            .list_services(cluster, LIST_CAP)
            .await
            .context("Error listing services")?;
        debug!(cluster, count = arns.len(), "listed services");
        Ok(arns)
    }

    pub async fn describe_services(&self, cluster: &str, arns: &[String]) -> Result<Vec<Service>> {
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        in_chunks(arns, SERVICES_PER_DESCRIBE, |chunk| {
            self.api.describe_services(cluster, chunk)
        })
        .await
        .context("Error describing services")
    }

    pub async fn list_tasks(&self, cluster: &str, service_name: Option<&str>) -> Result<Vec<String>> {
        let arns = self
            .api
            .list_tasks(cluster, service_name, LIST_CAP)
            .await
            .context("Error listing tasks")?;
        debug!(cluster, ?service_name, count = arns.len(), "listed tasks");
        Ok(arns)
    }

    pub async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<Task>> {
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        in_chunks(arns, TASKS_PER_DESCRIBE, |chunk| {
            self.api.describe_tasks(cluster, chunk)
        })
        .await
        .context("Error describing tasks")
    }

    /// Stops the task. ECS schedules a replacement on its own; this does not
    /// wait for it.
    pub async fn stop_task(
        &self,
        cluster: &str,
        task: &str,
        reason: Option<&str>,
    ) -> Result<Option<Task>> {
        let reason = reason.unwrap_or(DEFAULT_STOP_REASON);
        debug!(cluster, task, reason, "stopping task");
        self.api
            .stop_task(cluster, task, reason)
            .await
            .context("Error restarting task")
    }

    pub async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let lbs = self
            .api
            .describe_load_balancers()
            .await
            .context("Error loading load balancers")?;
        debug!(count = lbs.len(), "listed load balancers");
        Ok(lbs)
    }

    pub async fn list_target_groups(&self, load_balancer_arn: &str) -> Result<Vec<TargetGroup>> {
        self.api
            .describe_target_groups(load_balancer_arn)
            .await
            .context("Error loading target groups")
    }

    pub async fn describe_target_health(&self, target_group_arn: &str) -> Result<Vec<TargetHealth>> {
        self.api
            .describe_target_health(target_group_arn)
            .await
            .context("Error loading target health")
    }

    pub async fn get_log_streams(&self, log_group: &str) -> Result<Vec<LogStream>> {
        let streams = self
            .api
            .describe_log_streams(log_group, LOG_STREAM_LIMIT)
            .await
            .context("Error loading log streams")?;
        debug!(log_group, count = streams.len(), "listed log streams");
        Ok(streams)
    }

    pub async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        limit: Option<i32>,
    ) -> Result<Vec<LogEvent>> {
        let limit = limit.unwrap_or(DEFAULT_EVENT_LIMIT);
        let events = self
            .api
            .get_log_events(log_group, log_stream, limit)
            .await
            .context("Error loading log events")?;
        debug!(log_group, log_stream, limit, count = events.len(), "fetched log events");
        Ok(events)
    }

    pub async fn load_clusters(&self) -> Result<Vec<Cluster>> {
        let arns = self.list_clusters().await?;
        self.describe_clusters(&arns).await
    }

    pub async fn load_services(&self, cluster: &str) -> Result<Vec<Service>> {
        let arns = self.list_services(cluster).await?;
        self.describe_services(cluster, &arns).await
    }

    pub async fn load_tasks(&self, cluster: &str, service_name: &str) -> Result<Vec<Task>> {
        let arns = self.list_tasks(cluster, Some(service_name)).await?;
        self.describe_tasks(cluster, &arns).await
    }

    /// Target groups of one load balancer, each with its target health,
    /// fetched one group after another.
    pub async fn load_target_groups(&self, load_balancer_arn: &str) -> Result<Vec<TargetGroupHealth>> {
        let groups = self.list_target_groups(load_balancer_arn).await?;
        let mut loaded = Vec::with_capacity(groups.len());
        for group in groups {
            let targets = if group.arn.is_empty() {
                Vec::new()
            } else {
                self.describe_target_health(&group.arn).await?
            };
            loaded.push(TargetGroupHealth { group, targets });
        }
        Ok(loaded)
    }

    pub async fn execute(&self, fetch: Fetch) -> Outcome {
        match fetch {
            Fetch::Clusters => Outcome::Clusters(self.load_clusters().await),
            Fetch::LoadBalancers => Outcome::LoadBalancers(self.list_load_balancers().await),
            Fetch::Services { cluster } => Outcome::Services(self.load_services(&cluster).await),
            Fetch::Tasks { cluster, service } => {
                Outcome::Tasks(self.load_tasks(&cluster, &service).await)
            }
            Fetch::StopTask {
                cluster,
                task,
                reason,
            } => Outcome::TaskStopped(self.stop_task(&cluster, &task, Some(reason.as_str())).await),
            Fetch::TargetGroups { load_balancer } => {
                Outcome::TargetGroups(self.load_target_groups(&load_balancer).await)
            }
            Fetch::LogStreams { group } => Outcome::LogStreams(self.get_log_streams(&group).await),
            Fetch::LogEvents {
                group,
                stream,
                limit,
            } => Outcome::LogEvents(self.get_log_events(&group, &stream, Some(limit)).await),
        }
    }
}

/// Splits `ids` into describe-sized batches and keeps the input order.
async fn in_chunks<T, F, Fut>(ids: &[String], size: usize, call: F) -> Result<Vec<T>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let chunks: Vec<Vec<String>> = ids.chunks(size).map(<[String]>::to_vec).collect();
    let pages: Vec<Vec<T>> = stream::iter(chunks)
        .map(call)
        .buffered(DESCRIBE_CONCURRENCY)
        .try_collect()
        .await?;
    Ok(pages.into_iter().flatten().collect())
}

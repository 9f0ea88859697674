use anyhow::{Result, anyhow};
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_cloudwatchlogs::types::OrderBy;
use aws_sdk_ecs::config::{Credentials as StaticCredentials, Region};
use aws_sdk_ecs::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ecs::types::{ClusterField, ServiceField, TaskField};
use tracing::info;

use crate::credentials::Session;
use crate::gateway::RemoteApi;
use crate::models::{
    Cluster, LoadBalancer, LogEvent, LogStream, Service, Task, TargetGroup, TargetHealth,
};

const PROVIDER_NAME: &str = "ecs-lookout";

/// Live clients for one session. Built fresh whenever credentials change.
pub struct AwsApi {
    ecs: aws_sdk_ecs::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
}

impl AwsApi {
    /// Uses the session's static keys and region only. Retries are off so a
    /// failed call surfaces on the first attempt.
    pub async fn connect(session: &Session) -> Self {
        let credentials = session.credentials();
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(StaticCredentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                PROVIDER_NAME,
            ))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        info!(session = %session.id, region = session.region(), "connected AWS clients");
        Self {
            ecs: aws_sdk_ecs::Client::new(&config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(&config),
            logs: aws_sdk_cloudwatchlogs::Client::new(&config),
        }
    }
}

impl RemoteApi for AwsApi {
    async fn list_clusters(&self) -> Result<Vec<String>> {
        let output = self
            .ecs
            .list_clusters()
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.cluster_arns().to_vec())
    }

    async fn describe_clusters(&self, arns: Vec<String>) -> Result<Vec<Cluster>> {
        let output = self
            .ecs
            .describe_clusters()
            .set_clusters(Some(arns))
            .include(ClusterField::Statistics)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.clusters().iter().map(Cluster::from).collect())
    }

    async fn list_services(&self, cluster: &str, max_results: i32) -> Result<Vec<String>> {
        let output = self
            .ecs
            .list_services()
            .cluster(cluster)
            .max_results(max_results)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.service_arns().to_vec())
    }

    async fn describe_services(&self, cluster: &str, arns: Vec<String>) -> Result<Vec<Service>> {
        let output = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .set_services(Some(arns))
            .include(ServiceField::Tags)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.services().iter().map(Service::from).collect())
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service_name: Option<&str>,
        max_results: i32,
    ) -> Result<Vec<String>> {
        let output = self
            .ecs
            .list_tasks()
            .cluster(cluster)
            .set_service_name(service_name.map(str::to_string))
            .max_results(max_results)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.task_arns().to_vec())
    }

    async fn describe_tasks(&self, cluster: &str, arns: Vec<String>) -> Result<Vec<Task>> {
        let output = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(arns))
            .include(TaskField::Tags)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.tasks().iter().map(Task::from).collect())
    }

    async fn stop_task(&self, cluster: &str, task: &str, reason: &str) -> Result<Option<Task>> {
        let output = self
            .ecs
            .stop_task()
            .cluster(cluster)
            .task(task)
            .reason(reason)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.task().map(Task::from))
    }

    async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let output = self
            .elb
            .describe_load_balancers()
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.load_balancers().iter().map(LoadBalancer::from).collect())
    }

    async fn describe_target_groups(&self, load_balancer_arn: &str) -> Result<Vec<TargetGroup>> {
        let output = self
            .elb
            .describe_target_groups()
            .load_balancer_arn(load_balancer_arn)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.target_groups().iter().map(TargetGroup::from).collect())
    }

    async fn describe_target_health(&self, target_group_arn: &str) -> Result<Vec<TargetHealth>> {
        let output = self
            .elb
            .describe_target_health()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output
            .target_health_descriptions()
            .iter()
            .map(TargetHealth::from)
            .collect())
    }

    async fn describe_log_streams(&self, log_group: &str, limit: i32) -> Result<Vec<LogStream>> {
        let output = self
            .logs
            .describe_log_streams()
            .log_group_name(log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.log_streams().iter().map(LogStream::from).collect())
    }

    async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        limit: i32,
    ) -> Result<Vec<LogEvent>> {
        let output = self
            .logs
            .get_log_events()
            .log_group_name(log_group)
            .log_stream_name(log_stream)
            .limit(limit)
            .start_from_head(false)
            .send()
            .await
            .map_err(describe_sdk_error)?;
        Ok(output.events().iter().map(LogEvent::from).collect())
    }
}

/// Turns an SDK failure into `code: message` so the remote text reaches the
/// status line unchanged.
fn describe_sdk_error<E>(err: SdkError<E>) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = match &err {
        SdkError::ServiceError(service) => {
            let service = service.err();
            let code = service.code().unwrap_or("ServiceError");
            let message = service.message().unwrap_or("no message provided");
            format!("{code}: {message}")
        }
        SdkError::DispatchFailure(failure) => format!("network/dispatch failure: {failure:?}"),
        SdkError::TimeoutError(_) => "request timed out; please retry".into(),
        SdkError::ResponseError(ctx) => format!("response error: {ctx:?}"),
        _ => return anyhow::Error::new(err),
    };
    anyhow!(detail)
}

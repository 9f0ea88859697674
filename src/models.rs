use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aws_sdk_cloudwatchlogs::types as logs;
use aws_sdk_ecs::types as ecs;
use aws_sdk_elasticloadbalancingv2::types as elb;

/// Values substituted when the remote response leaves a field out.
///
/// | field                                   | default          |
/// |-----------------------------------------|------------------|
/// | arns, names, dns name                   | `""`             |
/// | cluster/service/task/lb/target status   | [`UNKNOWN`]      |
/// | task, service and cluster counters      | `0`              |
/// | health check enabled                    | `false`          |
/// | everything else                         | `None`           |
pub const UNKNOWN: &str = "unknown";

pub const RUNNING: &str = "RUNNING";

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn status(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}

/// Last `/`-separated segment of an arn or stream name.
pub fn short_name(value: &str) -> &str {
    value.rsplit('/').next().unwrap_or(value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Health {
    Good,
    Warming,
    Bad,
    Unknown,
}

impl Health {
    pub fn of_cluster(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "ACTIVE" => Health::Good,
            "INACTIVE" => Health::Bad,
            "PROVISIONING" | "DEPROVISIONING" => Health::Warming,
            _ => Health::Unknown,
        }
    }

    pub fn of_service(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "ACTIVE" => Health::Good,
            "DRAINING" => Health::Warming,
            "INACTIVE" => Health::Bad,
            _ => Health::Unknown,
        }
    }

    pub fn of_task(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            RUNNING => Health::Good,
            "PENDING" | "PROVISIONING" | "ACTIVATING" => Health::Warming,
            "STOPPED" | "STOPPING" | "DEACTIVATING" | "DEPROVISIONING" => Health::Bad,
            _ => Health::Unknown,
        }
    }

    pub fn of_load_balancer(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "active" => Health::Good,
            "provisioning" | "active_impaired" => Health::Warming,
            "failed" => Health::Bad,
            _ => Health::Unknown,
        }
    }

    pub fn of_target(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "healthy" => Health::Good,
            "initial" | "draining" => Health::Warming,
            "unhealthy" | "unavailable" => Health::Bad,
            _ => Health::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub arn: String,
    pub name: String,
    pub status: String,
    pub running_tasks_count: i32,
    pub pending_tasks_count: i32,
    pub active_services_count: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLoadBalancer {
    pub target_group_arn: Option<String>,
    pub load_balancer_name: Option<String>,
    pub container_name: Option<String>,
    pub container_port: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub arn: String,
    pub name: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

impl Service {
    /// Every desired task is running.
    pub fn is_settled(&self) -> bool {
        self.running_count == self.desired_count
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub last_status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub arn: String,
    pub task_definition_arn: String,
    pub cluster_arn: String,
    pub last_status: String,
    pub desired_status: String,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub containers: Vec<Container>,
}

impl Task {
    pub fn short_id(&self) -> &str {
        short_name(&self.arn)
    }

    pub fn is_running(&self) -> bool {
        self.last_status == RUNNING
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub arn: String,
    pub dns_name: String,
    pub name: String,
    pub state: String,
    pub kind: Option<String>,
    pub scheme: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub arn: String,
    pub name: String,
    pub health_check_enabled: bool,
    pub health_check_path: Option<String>,
    pub target_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub target_id: String,
    pub target_port: Option<i32>,
    pub health_check_port: Option<String>,
    pub state: String,
    pub reason: Option<String>,
    pub description: Option<String>,
}

/// A target group together with the health of its registered targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupHealth {
    pub group: TargetGroup,
    pub targets: Vec<TargetHealth>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStream {
    pub name: String,
    pub last_event_time: Option<i64>,
}

impl LogStream {
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: Option<i64>,
    pub message: String,
}

fn smithy_time(value: Option<&aws_sdk_ecs::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

/// Milliseconds since the epoch rendered in the local timezone.
pub fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "N/A".into())
}

impl From<&ecs::Cluster> for Cluster {
    fn from(value: &ecs::Cluster) -> Self {
        Self {
            arn: text(value.cluster_arn()),
            name: text(value.cluster_name()),
            status: status(value.status()),
            running_tasks_count: value.running_tasks_count(),
            pending_tasks_count: value.pending_tasks_count(),
            active_services_count: value.active_services_count(),
        }
    }
}

impl From<&ecs::LoadBalancer> for ServiceLoadBalancer {
    fn from(value: &ecs::LoadBalancer) -> Self {
        Self {
            target_group_arn: value.target_group_arn().map(str::to_string),
            load_balancer_name: value.load_balancer_name().map(str::to_string),
            container_name: value.container_name().map(str::to_string),
            container_port: value.container_port(),
        }
    }
}

impl From<&ecs::Service> for Service {
    fn from(value: &ecs::Service) -> Self {
        Self {
            arn: text(value.service_arn()),
            name: text(value.service_name()),
            status: status(value.status()),
            desired_count: value.desired_count(),
            running_count: value.running_count(),
            pending_count: value.pending_count(),
            load_balancers: value.load_balancers().iter().map(Into::into).collect(),
        }
    }
}

impl From<&ecs::Container> for Container {
    fn from(value: &ecs::Container) -> Self {
        Self {
            name: text(value.name()),
            last_status: status(value.last_status()),
        }
    }
}

impl From<&ecs::Task> for Task {
    fn from(value: &ecs::Task) -> Self {
        Self {
            arn: text(value.task_arn()),
            task_definition_arn: text(value.task_definition_arn()),
            cluster_arn: text(value.cluster_arn()),
            last_status: status(value.last_status()),
            desired_status: status(value.desired_status()),
            cpu: value.cpu().map(str::to_string),
            memory: value.memory().map(str::to_string),
            started_at: smithy_time(value.started_at()),
            containers: value.containers().iter().map(Into::into).collect(),
        }
    }
}

impl From<&elb::LoadBalancer> for LoadBalancer {
    fn from(value: &elb::LoadBalancer) -> Self {
        Self {
            arn: text(value.load_balancer_arn()),
            dns_name: text(value.dns_name()),
            name: text(value.load_balancer_name()),
            state: status(
                value
                    .state()
                    .and_then(|state| state.code())
                    .map(|code| code.as_str()),
            ),
            kind: value.r#type().map(|kind| kind.as_str().to_string()),
            scheme: value.scheme().map(|scheme| scheme.as_str().to_string()),
        }
    }
}

impl From<&elb::TargetGroup> for TargetGroup {
    fn from(value: &elb::TargetGroup) -> Self {
        Self {
            arn: text(value.target_group_arn()),
            name: text(value.target_group_name()),
            health_check_enabled: value.health_check_enabled().unwrap_or(false),
            health_check_path: value.health_check_path().map(str::to_string),
            target_type: value.target_type().map(|kind| kind.as_str().to_string()),
        }
    }
}

impl From<&elb::TargetHealthDescription> for TargetHealth {
    fn from(value: &elb::TargetHealthDescription) -> Self {
        let health = value.target_health();
        Self {
            target_id: text(value.target().and_then(|target| target.id())),
            target_port: value.target().and_then(|target| target.port()),
            health_check_port: value.health_check_port().map(str::to_string),
            state: status(health.and_then(|h| h.state()).map(|s| s.as_str())),
            reason: health
                .and_then(|h| h.reason())
                .map(|reason| reason.as_str().to_string()),
            description: health
                .and_then(|h| h.description())
                .map(str::to_string),
        }
    }
}

impl From<&logs::LogStream> for LogStream {
    fn from(value: &logs::LogStream) -> Self {
        Self {
            name: text(value.log_stream_name()),
            last_event_time: value.last_event_timestamp(),
        }
    }
}

impl From<&logs::OutputLogEvent> for LogEvent {
    fn from(value: &logs::OutputLogEvent) -> Self {
        Self {
            timestamp: value.timestamp(),
            message: text(value.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_keeps_counts_and_defaults_status() {
        let sdk = ecs::Cluster::builder()
            .cluster_arn("arn:aws:ecs:us-east-1:123:cluster/a")
            .cluster_name("a")
            .running_tasks_count(3)
            .pending_tasks_count(1)
            .build();
        let cluster = Cluster::from(&sdk);
        assert_eq!(cluster.name, "a");
        assert_eq!(cluster.running_tasks_count, 3);
        assert_eq!(cluster.pending_tasks_count, 1);
        assert_eq!(cluster.active_services_count, 0);
        assert_eq!(cluster.status, UNKNOWN);
    }

    #[test]
    fn task_without_containers_maps_to_empty_list() {
        let sdk = ecs::Task::builder()
            .task_arn("arn:aws:ecs:us-east-1:123:task/main/0f3c9a")
            .last_status("RUNNING")
            .build();
        let task = Task::from(&sdk);
        assert!(task.containers.is_empty());
        assert_eq!(task.short_id(), "0f3c9a");
        assert!(task.is_running());
        assert_eq!(task.cpu, None);
        assert_eq!(task.desired_status, UNKNOWN);
    }

    #[test]
    fn task_start_time_is_carried_over() {
        let sdk = ecs::Task::builder()
            .started_at(aws_sdk_ecs::primitives::DateTime::from_secs(1_700_000_000))
            .build();
        let task = Task::from(&sdk);
        assert_eq!(
            task.started_at.map(|dt| dt.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn load_balancer_state_code_is_flattened() {
        let sdk = elb::LoadBalancer::builder()
            .load_balancer_arn("arn:lb/app/web/1")
            .load_balancer_name("web")
            .dns_name("web-1.elb.amazonaws.com")
            .state(
                elb::LoadBalancerState::builder()
                    .code(elb::LoadBalancerStateEnum::Active)
                    .build(),
            )
            .r#type(elb::LoadBalancerTypeEnum::Application)
            .scheme(elb::LoadBalancerSchemeEnum::InternetFacing)
            .build();
        let lb = LoadBalancer::from(&sdk);
        assert_eq!(lb.state, "active");
        assert_eq!(lb.kind.as_deref(), Some("application"));
        assert_eq!(lb.scheme.as_deref(), Some("internet-facing"));
        assert_eq!(Health::of_load_balancer(&lb.state), Health::Good);
    }

    #[test]
    fn target_health_without_target_keeps_state_and_reason() {
        let sdk = elb::TargetHealthDescription::builder()
            .health_check_port("8080")
            .target_health(
                elb::TargetHealth::builder()
                    .state(elb::TargetHealthStateEnum::Unhealthy)
                    .reason(elb::TargetHealthReasonEnum::FailedHealthChecks)
                    .build(),
            )
            .build();
        let health = TargetHealth::from(&sdk);
        assert_eq!(health.target_id, "");
        assert_eq!(health.target_port, None);
        assert_eq!(health.state, "unhealthy");
        assert_eq!(health.reason.as_deref(), Some("Target.FailedHealthChecks"));
        assert_eq!(Health::of_target(&health.state), Health::Bad);
    }

    #[test]
    fn target_health_without_health_block_is_unknown() {
        let health = TargetHealth::from(&elb::TargetHealthDescription::builder().build());
        assert_eq!(health.state, UNKNOWN);
        assert_eq!(health.health_check_port, None);
    }

    #[test]
    fn service_settles_when_running_matches_desired() {
        let sdk = ecs::Service::builder()
            .service_name("api")
            .desired_count(2)
            .running_count(2)
            .load_balancers(
                ecs::LoadBalancer::builder()
                    .target_group_arn("arn:tg/api")
                    .container_port(80)
                    .build(),
            )
            .build();
        let service = Service::from(&sdk);
        assert!(service.is_settled());
        assert_eq!(service.load_balancers.len(), 1);
        assert_eq!(service.load_balancers[0].container_port, Some(80));
    }

    #[test]
    fn short_names_strip_prefixes() {
        assert_eq!(short_name("ecs/web/abc123"), "abc123");
        assert_eq!(short_name("plain"), "plain");
        let stream = LogStream {
            name: "ecs/web/0a1b".into(),
            last_event_time: None,
        };
        assert_eq!(stream.short_name(), "0a1b");
    }

    #[test]
    fn missing_timestamps_render_as_not_available() {
        assert_eq!(format_millis(None), "N/A");
        assert_ne!(format_millis(Some(1_700_000_000_000)), "N/A");
    }

    #[test]
    fn statuses_classify_case_insensitively() {
        assert_eq!(Health::of_cluster("active"), Health::Good);
        assert_eq!(Health::of_service("DRAINING"), Health::Warming);
        assert_eq!(Health::of_task("STOPPED"), Health::Bad);
        assert_eq!(Health::of_target("Healthy"), Health::Good);
        assert_eq!(Health::of_target("whatever"), Health::Unknown);
    }
}

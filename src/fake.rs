//! In-memory [`RemoteApi`] that records every call it receives.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::gateway::RemoteApi;
use crate::models::{
    Cluster, Container, LoadBalancer, LogEvent, LogStream, Service, Task, TargetGroup,
    TargetHealth,
};

pub const FAILURE: &str = "AccessDeniedException: not authorized to perform this action";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ListClusters,
    DescribeClusters(Vec<String>),
    ListServices {
        cluster: String,
        max_results: i32,
    },
    DescribeServices {
        cluster: String,
        arns: Vec<String>,
    },
    ListTasks {
        cluster: String,
        service: Option<String>,
        max_results: i32,
    },
    DescribeTasks {
        cluster: String,
        arns: Vec<String>,
    },
    StopTask {
        cluster: String,
        task: String,
        reason: String,
    },
    DescribeLoadBalancers,
    DescribeTargetGroups(String),
    DescribeTargetHealth(String),
    DescribeLogStreams {
        group: String,
        limit: i32,
    },
    GetLogEvents {
        group: String,
        stream: String,
        limit: i32,
    },
}

#[derive(Default)]
struct State {
    clusters: Vec<Cluster>,
    services: HashMap<String, Vec<Service>>,
    tasks: HashMap<String, Vec<Task>>,
    load_balancers: Vec<LoadBalancer>,
    target_groups: HashMap<String, Vec<TargetGroup>>,
    target_health: HashMap<String, Vec<TargetHealth>>,
    log_streams: HashMap<String, Vec<LogStream>>,
    log_events: Vec<LogEvent>,
    failing: HashSet<&'static str>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
}

impl FakeApi {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call, op: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(anyhow!(FAILURE));
        }
        Ok(state)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn fail(&self, op: &'static str) {
        self.state().failing.insert(op);
    }

    pub fn with_clusters(&self, clusters: Vec<Cluster>) {
        self.state().clusters = clusters;
    }

    pub fn with_services(&self, cluster: &str, services: Vec<Service>) {
        self.state().services.insert(cluster.to_string(), services);
    }

    /// Tasks keyed by the name of the service that owns them.
    pub fn with_tasks(&self, service: &str, tasks: Vec<Task>) {
        self.state().tasks.insert(service.to_string(), tasks);
    }

    pub fn with_load_balancers(&self, lbs: Vec<LoadBalancer>) {
        self.state().load_balancers = lbs;
    }

    pub fn with_target_groups(&self, lb: &str, groups: Vec<TargetGroup>) {
        self.state().target_groups.insert(lb.to_string(), groups);
    }

    pub fn with_target_health(&self, group: &str, targets: Vec<TargetHealth>) {
        self.state().target_health.insert(group.to_string(), targets);
    }

    pub fn with_log_streams(&self, group: &str, streams: Vec<LogStream>) {
        self.state().log_streams.insert(group.to_string(), streams);
    }

    pub fn with_log_events(&self, events: Vec<LogEvent>) {
        self.state().log_events = events;
    }
}

impl RemoteApi for FakeApi {
    async fn list_clusters(&self) -> Result<Vec<String>> {
        let state = self.record(Call::ListClusters, "list_clusters")?;
        Ok(state.clusters.iter().map(|c| c.arn.clone()).collect())
    }

    async fn describe_clusters(&self, arns: Vec<String>) -> Result<Vec<Cluster>> {
        let state = self.record(Call::DescribeClusters(arns.clone()), "describe_clusters")?;
        Ok(state
            .clusters
            .iter()
            .filter(|c| arns.contains(&c.arn))
            .cloned()
            .collect())
    }

    async fn list_services(&self, cluster: &str, max_results: i32) -> Result<Vec<String>> {
        let call = Call::ListServices {
            cluster: cluster.to_string(),
            max_results,
        };
        let state = self.record(call, "list_services")?;
        Ok(state
            .services
            .get(cluster)
            .map(|services| services.iter().map(|s| s.arn.clone()).collect())
            .unwrap_or_default())
    }

    async fn describe_services(&self, cluster: &str, arns: Vec<String>) -> Result<Vec<Service>> {
        let call = Call::DescribeServices {
            cluster: cluster.to_string(),
            arns: arns.clone(),
        };
        let state = self.record(call, "describe_services")?;
        Ok(state
            .services
            .get(cluster)
            .map(|services| {
                services
                    .iter()
                    .filter(|s| arns.contains(&s.arn))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service_name: Option<&str>,
        max_results: i32,
    ) -> Result<Vec<String>> {
        let call = Call::ListTasks {
            cluster: cluster.to_string(),
            service: service_name.map(str::to_string),
            max_results,
        };
        let state = self.record(call, "list_tasks")?;
        Ok(service_name
            .and_then(|name| state.tasks.get(name))
            .map(|tasks| tasks.iter().map(|t| t.arn.clone()).collect())
            .unwrap_or_default())
    }

    async fn describe_tasks(&self, cluster: &str, arns: Vec<String>) -> Result<Vec<Task>> {
        let call = Call::DescribeTasks {
            cluster: cluster.to_string(),
            arns: arns.clone(),
        };
        let state = self.record(call, "describe_tasks")?;
        Ok(state
            .tasks
            .values()
            .flatten()
            .filter(|t| arns.contains(&t.arn))
            .cloned()
            .collect())
    }

    async fn stop_task(&self, cluster: &str, task: &str, reason: &str) -> Result<Option<Task>> {
        let call = Call::StopTask {
            cluster: cluster.to_string(),
            task: task.to_string(),
            reason: reason.to_string(),
        };
        let mut state = self.record(call, "stop_task")?;
        let stopped = state
            .tasks
            .values_mut()
            .flatten()
            .find(|t| t.arn == task)
            .map(|t| {
                t.desired_status = "STOPPED".into();
                t.clone()
            });
        Ok(stopped)
    }

    async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let state = self.record(Call::DescribeLoadBalancers, "describe_load_balancers")?;
        Ok(state.load_balancers.clone())
    }

    async fn describe_target_groups(&self, load_balancer_arn: &str) -> Result<Vec<TargetGroup>> {
        let call = Call::DescribeTargetGroups(load_balancer_arn.to_string());
        let state = self.record(call, "describe_target_groups")?;
        Ok(state
            .target_groups
            .get(load_balancer_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_target_health(&self, target_group_arn: &str) -> Result<Vec<TargetHealth>> {
        let call = Call::DescribeTargetHealth(target_group_arn.to_string());
        let state = self.record(call, "describe_target_health")?;
        Ok(state
            .target_health
            .get(target_group_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_log_streams(&self, log_group: &str, limit: i32) -> Result<Vec<LogStream>> {
        let call = Call::DescribeLogStreams {
            group: log_group.to_string(),
            limit,
        };
        let state = self.record(call, "describe_log_streams")?;
        Ok(state
            .log_streams
            .get(log_group)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        limit: i32,
    ) -> Result<Vec<LogEvent>> {
        let call = Call::GetLogEvents {
            group: log_group.to_string(),
            stream: log_stream.to_string(),
            limit,
        };
        let state = self.record(call, "get_log_events")?;
        Ok(state.log_events.clone())
    }
}

pub fn cluster(arn: &str, running: i32) -> Cluster {
    Cluster {
        arn: arn.to_string(),
        name: crate::models::short_name(arn).to_string(),
        status: "ACTIVE".into(),
        running_tasks_count: running,
        pending_tasks_count: 0,
        active_services_count: 1,
    }
}

pub fn service(arn: &str, name: &str) -> Service {
    Service {
        arn: arn.to_string(),
        name: name.to_string(),
        status: "ACTIVE".into(),
        desired_count: 1,
        running_count: 1,
        pending_count: 0,
        load_balancers: Vec::new(),
    }
}

pub fn task(arn: &str, last_status: &str) -> Task {
    Task {
        arn: arn.to_string(),
        task_definition_arn: "arn:task-definition/web:1".into(),
        cluster_arn: "arn:cluster/a".into(),
        last_status: last_status.to_string(),
        desired_status: "RUNNING".into(),
        cpu: Some("256".into()),
        memory: Some("512".into()),
        started_at: None,
        containers: vec![Container {
            name: "web".into(),
            last_status: last_status.to_string(),
        }],
    }
}

pub fn load_balancer(arn: &str) -> LoadBalancer {
    LoadBalancer {
        arn: arn.to_string(),
        dns_name: format!("{}.elb.amazonaws.com", crate::models::short_name(arn)),
        name: crate::models::short_name(arn).to_string(),
        state: "active".into(),
        kind: Some("application".into()),
        scheme: Some("internet-facing".into()),
    }
}

pub fn target_group(arn: &str) -> TargetGroup {
    TargetGroup {
        arn: arn.to_string(),
        name: crate::models::short_name(arn).to_string(),
        health_check_enabled: true,
        health_check_path: Some("/health".into()),
        target_type: Some("ip".into()),
    }
}

pub fn target(id: &str, state: &str) -> TargetHealth {
    TargetHealth {
        target_id: id.to_string(),
        target_port: Some(8080),
        health_check_port: Some("traffic-port".into()),
        state: state.to_string(),
        reason: None,
        description: None,
    }
}

pub fn stream(name: &str, last_event_time: i64) -> LogStream {
    LogStream {
        name: name.to_string(),
        last_event_time: Some(last_event_time),
    }
}

pub fn event(timestamp: i64, message: &str) -> LogEvent {
    LogEvent {
        timestamp: Some(timestamp),
        message: message.to_string(),
    }
}

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::credentials::{Credentials, DEFAULT_REGION};
use crate::error::ConsoleError;
use crate::gateway::{DEFAULT_STOP_REASON, Fetch, Outcome};
use crate::models::{
    Cluster, LoadBalancer, LogEvent, LogStream, Service, Task, TargetGroupHealth, short_name,
};

const STATUS_LIMIT: usize = 20;
/// Events requested when a stream is opened in the logs view.
pub const LOG_EVENT_LIMIT: i32 = 200;

pub const REGIONS: [&str; 11] = [
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "sa-east-1",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivePane {
    Clusters,
    Services,
    LoadBalancers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppMode {
    Onboarding,
    Browsing,
    Confirming,
    ViewingTasks,
    ViewingLogs,
    ShowingHelp,
    ViewingLog,
}

/// Independently refreshed pieces of state. Each one only accepts the
/// response to the most recent request issued for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slice {
    Clusters,
    Services,
    LoadBalancers,
    TargetGroups,
    Tasks,
    Restart,
    LogStreams,
    LogEvents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub slice: Slice,
    pub seq: u64,
}

#[derive(Default)]
struct Sequencer {
    next: u64,
    latest: HashMap<Slice, u64>,
}

impl Sequencer {
    fn issue(&mut self, slice: Slice) -> Ticket {
        self.next += 1;
        self.latest.insert(slice, self.next);
        Ticket {
            slice,
            seq: self.next,
        }
    }

    /// Accepts the ticket if it is the latest one issued for its slice.
    fn complete(&mut self, ticket: Ticket) -> bool {
        if self.latest.get(&ticket.slice) == Some(&ticket.seq) {
            self.latest.remove(&ticket.slice);
            true
        } else {
            false
        }
    }

    fn invalidate(&mut self, slice: Slice) {
        self.latest.remove(&slice);
    }

    fn invalidate_all(&mut self) {
        self.latest.clear();
    }

    fn in_flight(&self, slice: Slice) -> bool {
        self.latest.contains_key(&slice)
    }

    fn any_in_flight(&self) -> bool {
        !self.latest.is_empty()
    }
}

/// Work the controller wants done outside of itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Load(Ticket, Fetch),
    ForgetCredentials,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    StopTask {
        cluster: String,
        service: String,
        task: String,
    },
    Logout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialField {
    AccessKeyId,
    SecretAccessKey,
    Region,
}

impl CredentialField {
    pub fn next(self) -> Self {
        match self {
            CredentialField::AccessKeyId => CredentialField::SecretAccessKey,
            CredentialField::SecretAccessKey => CredentialField::Region,
            CredentialField::Region => CredentialField::AccessKeyId,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            CredentialField::AccessKeyId => CredentialField::Region,
            CredentialField::SecretAccessKey => CredentialField::AccessKeyId,
            CredentialField::Region => CredentialField::SecretAccessKey,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CredentialDraft {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region_index: usize,
    pub field: CredentialField,
}

impl Default for CredentialDraft {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region_index: REGIONS
                .iter()
                .position(|r| *r == DEFAULT_REGION)
                .unwrap_or_default(),
            field: CredentialField::AccessKeyId,
        }
    }
}

impl CredentialDraft {
    pub fn region(&self) -> &'static str {
        REGIONS[self.region_index % REGIONS.len()]
    }

    pub fn cycle_region(&mut self, delta: isize) {
        let len = REGIONS.len() as isize;
        self.region_index = (self.region_index as isize + delta).rem_euclid(len) as usize;
    }

    pub fn push(&mut self, ch: char) {
        match self.field {
            CredentialField::AccessKeyId => self.access_key_id.push(ch),
            CredentialField::SecretAccessKey => self.secret_access_key.push(ch),
            CredentialField::Region => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.field {
            CredentialField::AccessKeyId => {
                self.access_key_id.pop();
            }
            CredentialField::SecretAccessKey => {
                self.secret_access_key.pop();
            }
            CredentialField::Region => {}
        }
    }

    pub fn to_credentials(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.trim(),
            self.secret_access_key.trim(),
            self.region(),
        )
    }
}

/// Tasks of one service inside one cluster.
#[derive(Clone, Debug)]
pub struct TasksView {
    pub cluster: String,
    pub service: String,
    pub tasks: Vec<Task>,
    pub cursor: usize,
    pub restarting: Option<String>,
}

impl TasksView {
    pub fn selected(&self) -> Option<&Task> {
        self.tasks.get(self.cursor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogsFocus {
    GroupInput,
    Streams,
}

#[derive(Clone, Debug)]
pub struct LogsView {
    pub group_input: String,
    pub group: Option<String>,
    pub streams: Vec<LogStream>,
    pub stream_cursor: usize,
    pub selected_stream: Option<String>,
    pub events: Vec<LogEvent>,
    pub scroll: usize,
    pub error: Option<String>,
    pub focus: LogsFocus,
}

impl Default for LogsView {
    fn default() -> Self {
        Self {
            group_input: String::new(),
            group: None,
            streams: Vec::new(),
            stream_cursor: 0,
            selected_stream: None,
            events: Vec::new(),
            scroll: 0,
            error: None,
            focus: LogsFocus::GroupInput,
        }
    }
}

pub struct App {
    pub mode: AppMode,
    pub active_pane: ActivePane,
    pub region: Option<String>,
    pub clusters: Vec<Cluster>,
    pub selected_cluster: Option<String>,
    pub services: Vec<Service>,
    pub load_balancers: Vec<LoadBalancer>,
    pub expanded_load_balancer: Option<String>,
    pub target_groups: Vec<TargetGroupHealth>,
    pub cluster_cursor: usize,
    pub service_cursor: usize,
    pub lb_cursor: usize,
    pub tasks: Option<TasksView>,
    pub logs: LogsView,
    pub pending_action: Option<PendingAction>,
    pub auto_refresh: bool,
    pub draft: CredentialDraft,
    pub status: VecDeque<String>,
    pub last_error: Option<String>,
    previous_mode: AppMode,
    sequencer: Sequencer,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            mode: AppMode::Onboarding,
            active_pane: ActivePane::Clusters,
            region: None,
            clusters: Vec::new(),
            selected_cluster: None,
            services: Vec::new(),
            load_balancers: Vec::new(),
            expanded_load_balancer: None,
            target_groups: Vec::new(),
            cluster_cursor: 0,
            service_cursor: 0,
            lb_cursor: 0,
            tasks: None,
            logs: LogsView::default(),
            pending_action: None,
            auto_refresh: false,
            draft: CredentialDraft::default(),
            status: VecDeque::with_capacity(STATUS_LIMIT),
            last_error: None,
            previous_mode: AppMode::Browsing,
            sequencer: Sequencer::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.region.is_some()
    }

    pub fn auto_refresh_active(&self) -> bool {
        self.auto_refresh && self.is_configured()
    }

    pub fn is_loading(&self, slice: Slice) -> bool {
        self.sequencer.in_flight(slice)
    }

    pub fn is_busy(&self) -> bool {
        self.sequencer.any_in_flight()
    }

    pub fn selected_cluster(&self) -> Option<&Cluster> {
        let arn = self.selected_cluster.as_deref()?;
        self.clusters.iter().find(|c| c.arn == arn)
    }

    pub fn selected_cluster_name(&self) -> Option<&str> {
        self.selected_cluster()
            .map(|c| c.name.as_str())
            .or_else(|| self.selected_cluster.as_deref().map(short_name))
    }

    pub fn running_task_total(&self) -> i32 {
        self.clusters.iter().map(|c| c.running_tasks_count).sum()
    }

    pub fn push_status(&mut self, status: &str) {
        if self.status.len() == STATUS_LIMIT {
            self.status.pop_front();
        }
        self.status.push_back(status.to_string());
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
    }

    /// Opens an overlay that returns to the current mode when dismissed.
    pub fn overlay(&mut self, mode: AppMode) {
        if !matches!(
            self.mode,
            AppMode::Confirming | AppMode::ShowingHelp | AppMode::ViewingLog
        ) {
            self.previous_mode = self.mode;
        }
        self.mode = mode;
    }

    pub fn dismiss_overlay(&mut self) {
        self.mode = self.previous_mode;
    }

    pub fn next_pane(&mut self) {
        self.active_pane = match self.active_pane {
            ActivePane::Clusters => ActivePane::Services,
            ActivePane::Services => ActivePane::LoadBalancers,
            ActivePane::LoadBalancers => ActivePane::Clusters,
        };
    }

    pub fn previous_pane(&mut self) {
        self.active_pane = match self.active_pane {
            ActivePane::Clusters => ActivePane::LoadBalancers,
            ActivePane::Services => ActivePane::Clusters,
            ActivePane::LoadBalancers => ActivePane::Services,
        };
    }

    fn load(&mut self, slice: Slice, fetch: Fetch) -> Command {
        Command::Load(self.sequencer.issue(slice), fetch)
    }

    /// Credentials became available for `region`. Anything fetched under an
    /// earlier login is dropped first.
    pub fn on_configured(&mut self, region: &str) -> Vec<Command> {
        self.forget_session();
        self.region = Some(region.to_string());
        self.mode = AppMode::Browsing;
        self.push_status(&format!("Connected to {region}"));
        self.refresh()
    }

    fn forget_session(&mut self) {
        self.sequencer.invalidate_all();
        self.region = None;
        self.clusters.clear();
        self.selected_cluster = None;
        self.services.clear();
        self.load_balancers.clear();
        self.expanded_load_balancer = None;
        self.target_groups.clear();
        self.cluster_cursor = 0;
        self.service_cursor = 0;
        self.lb_cursor = 0;
        self.tasks = None;
        self.logs = LogsView::default();
        self.pending_action = None;
        self.last_error = None;
    }

    /// Reloads clusters and load balancers. The selected cluster's services
    /// follow once the cluster list has arrived.
    pub fn refresh(&mut self) -> Vec<Command> {
        if !self.is_configured() {
            self.push_status(&ConsoleError::NotConfigured.to_string());
            return Vec::new();
        }
        vec![
            self.load(Slice::Clusters, Fetch::Clusters),
            self.load(Slice::LoadBalancers, Fetch::LoadBalancers),
        ]
    }

    pub fn select_cluster(&mut self, arn: &str) -> Vec<Command> {
        if !self.is_configured() {
            return Vec::new();
        }
        self.selected_cluster = Some(arn.to_string());
        self.services.clear();
        self.service_cursor = 0;
        vec![self.load(
            Slice::Services,
            Fetch::Services {
                cluster: arn.to_string(),
            },
        )]
    }

    pub fn select_cluster_at_cursor(&mut self) -> Vec<Command> {
        match self.clusters.get(self.cluster_cursor).map(|c| c.arn.clone()) {
            Some(arn) => self.select_cluster(&arn),
            None => Vec::new(),
        }
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.auto_refresh = enabled;
        self.push_status(if enabled {
            "Auto-refresh enabled (30s)"
        } else {
            "Auto-refresh disabled"
        });
    }

    pub fn toggle_auto_refresh(&mut self) {
        self.set_auto_refresh(!self.auto_refresh);
    }

    pub fn toggle_load_balancer(&mut self, arn: &str) -> Vec<Command> {
        self.target_groups.clear();
        if self.expanded_load_balancer.as_deref() == Some(arn) {
            self.expanded_load_balancer = None;
            self.sequencer.invalidate(Slice::TargetGroups);
            return Vec::new();
        }
        if !self.is_configured() {
            return Vec::new();
        }
        self.expanded_load_balancer = Some(arn.to_string());
        vec![self.load(
            Slice::TargetGroups,
            Fetch::TargetGroups {
                load_balancer: arn.to_string(),
            },
        )]
    }

    pub fn view_tasks(&mut self, service: &str) -> Vec<Command> {
        let Some(cluster) = self.selected_cluster.clone() else {
            return Vec::new();
        };
        if !self.is_configured() {
            return Vec::new();
        }
        self.tasks = Some(TasksView {
            cluster,
            service: service.to_string(),
            tasks: Vec::new(),
            cursor: 0,
            restarting: None,
        });
        self.mode = AppMode::ViewingTasks;
        self.reload_tasks()
    }

    pub fn view_tasks_at_cursor(&mut self) -> Vec<Command> {
        match self.services.get(self.service_cursor).map(|s| s.name.clone()) {
            Some(name) => self.view_tasks(&name),
            None => Vec::new(),
        }
    }

    pub fn reload_tasks(&mut self) -> Vec<Command> {
        let Some(view) = &self.tasks else {
            return Vec::new();
        };
        let fetch = Fetch::Tasks {
            cluster: view.cluster.clone(),
            service: view.service.clone(),
        };
        vec![self.load(Slice::Tasks, fetch)]
    }

    pub fn close_tasks(&mut self) {
        self.tasks = None;
        self.sequencer.invalidate(Slice::Tasks);
        self.mode = AppMode::Browsing;
    }

    pub fn can_restart(&self, task: &Task) -> bool {
        task.is_running()
            && self
                .tasks
                .as_ref()
                .is_some_and(|view| view.restarting.as_deref() != Some(task.arn.as_str()))
    }

    /// Asks for confirmation before stopping a running task.
    pub fn request_restart(&mut self, task_arn: &str) -> Result<(), ConsoleError> {
        let view = self
            .tasks
            .as_ref()
            .ok_or_else(|| ConsoleError::NoSuchTask(task_arn.to_string()))?;
        let task = view
            .tasks
            .iter()
            .find(|t| t.arn == task_arn)
            .ok_or_else(|| ConsoleError::NoSuchTask(task_arn.to_string()))?;
        if view.restarting.as_deref() == Some(task_arn) {
            return Err(ConsoleError::RestartInFlight(task.short_id().to_string()));
        }
        if !task.is_running() {
            return Err(ConsoleError::TaskNotRunning(task.short_id().to_string()));
        }
        self.pending_action = Some(PendingAction::StopTask {
            cluster: view.cluster.clone(),
            service: view.service.clone(),
            task: task_arn.to_string(),
        });
        self.overlay(AppMode::Confirming);
        Ok(())
    }

    pub fn request_logout(&mut self) {
        self.pending_action = Some(PendingAction::Logout);
        self.overlay(AppMode::Confirming);
    }

    pub fn cancel(&mut self) {
        self.pending_action = None;
        self.dismiss_overlay();
        self.push_status("Cancelled");
    }

    pub fn confirm(&mut self) -> Vec<Command> {
        let Some(action) = self.pending_action.take() else {
            self.dismiss_overlay();
            return Vec::new();
        };
        self.dismiss_overlay();
        match action {
            PendingAction::StopTask {
                cluster,
                service,
                task,
            } => {
                if let Some(view) = self.tasks.as_mut() {
                    view.restarting = Some(task.clone());
                }
                self.push_status(&format!(
                    "Restarting task {} of {service}…",
                    short_name(&task)
                ));
                vec![self.load(
                    Slice::Restart,
                    Fetch::StopTask {
                        cluster,
                        task,
                        reason: DEFAULT_STOP_REASON.to_string(),
                    },
                )]
            }
            PendingAction::Logout => self.logout(),
        }
    }

    /// Drops every fetched slice and returns to onboarding.
    pub fn logout(&mut self) -> Vec<Command> {
        self.forget_session();
        self.auto_refresh = false;
        self.draft = CredentialDraft::default();
        self.mode = AppMode::Onboarding;
        self.push_status("Logged out");
        vec![Command::ForgetCredentials]
    }

    pub fn open_logs(&mut self) {
        self.mode = AppMode::ViewingLogs;
    }

    pub fn close_logs(&mut self) {
        self.mode = AppMode::Browsing;
    }

    pub fn search_logs(&mut self, group: &str) -> Result<Vec<Command>, ConsoleError> {
        let group = group.trim();
        if group.is_empty() {
            self.logs.error = Some(ConsoleError::MissingLogGroup.to_string());
            return Err(ConsoleError::MissingLogGroup);
        }
        if !self.is_configured() {
            return Err(ConsoleError::NotConfigured);
        }
        self.logs.group = Some(group.to_string());
        self.logs.error = None;
        self.logs.streams.clear();
        self.logs.stream_cursor = 0;
        self.logs.selected_stream = None;
        self.logs.events.clear();
        self.logs.scroll = 0;
        self.sequencer.invalidate(Slice::LogEvents);
        Ok(vec![self.load(
            Slice::LogStreams,
            Fetch::LogStreams {
                group: group.to_string(),
            },
        )])
    }

    pub fn select_stream(&mut self, stream: &str) -> Vec<Command> {
        let Some(group) = self.logs.group.clone() else {
            return Vec::new();
        };
        if !self.is_configured() {
            return Vec::new();
        }
        self.logs.selected_stream = Some(stream.to_string());
        self.logs.events.clear();
        self.logs.scroll = 0;
        self.logs.error = None;
        vec![self.load(
            Slice::LogEvents,
            Fetch::LogEvents {
                group,
                stream: stream.to_string(),
                limit: LOG_EVENT_LIMIT,
            },
        )]
    }

    pub fn select_stream_at_cursor(&mut self) -> Vec<Command> {
        match self
            .logs
            .streams
            .get(self.logs.stream_cursor)
            .map(|s| s.name.clone())
        {
            Some(name) => self.select_stream(&name),
            None => Vec::new(),
        }
    }

    fn report(&mut self, err: anyhow::Error) -> String {
        let message = format!("{err:#}");
        warn!(error = %message, "remote call failed");
        self.push_status(&message);
        self.last_error = Some(message.clone());
        message
    }

    /// Folds a finished fetch into state. Responses superseded by a newer
    /// request for the same slice are dropped.
    pub fn apply(&mut self, ticket: Ticket, outcome: Outcome) -> Vec<Command> {
        if !self.sequencer.complete(ticket) {
            debug!(?ticket, "discarding superseded response");
            return Vec::new();
        }
        match outcome {
            Outcome::Clusters(Ok(clusters)) => {
                self.clusters = clusters;
                self.cluster_cursor = clamp(self.cluster_cursor, self.clusters.len());
                match self.selected_cluster.clone() {
                    Some(arn) => vec![self.load(Slice::Services, Fetch::Services { cluster: arn })],
                    None => Vec::new(),
                }
            }
            Outcome::LoadBalancers(Ok(lbs)) => {
                self.load_balancers = lbs;
                self.lb_cursor = clamp(self.lb_cursor, self.load_balancers.len());
                Vec::new()
            }
            Outcome::Services(Ok(services)) => {
                self.services = services;
                self.service_cursor = clamp(self.service_cursor, self.services.len());
                Vec::new()
            }
            Outcome::TargetGroups(Ok(groups)) => {
                self.target_groups = groups;
                Vec::new()
            }
            Outcome::Tasks(Ok(tasks)) => {
                if let Some(view) = self.tasks.as_mut() {
                    view.cursor = clamp(view.cursor, tasks.len());
                    view.tasks = tasks;
                }
                Vec::new()
            }
            Outcome::TaskStopped(result) => {
                if let Some(view) = self.tasks.as_mut() {
                    view.restarting = None;
                }
                match result {
                    Ok(stopped) => {
                        let id = stopped
                            .as_ref()
                            .map(|t| t.short_id().to_string())
                            .unwrap_or_else(|| "task".into());
                        self.push_status(&format!(
                            "Stopped {id}. ECS will start a new task automatically."
                        ));
                        self.reload_tasks()
                    }
                    Err(err) => {
                        self.report(err);
                        Vec::new()
                    }
                }
            }
            Outcome::LogStreams(Ok(streams)) => {
                self.logs.streams = streams;
                self.logs.stream_cursor = 0;
                if !self.logs.streams.is_empty() {
                    self.logs.focus = LogsFocus::Streams;
                }
                Vec::new()
            }
            Outcome::LogEvents(Ok(events)) => {
                self.logs.events = events;
                Vec::new()
            }
            Outcome::LogStreams(Err(err)) | Outcome::LogEvents(Err(err)) => {
                let message = self.report(err);
                self.logs.error = Some(message);
                Vec::new()
            }
            Outcome::Clusters(Err(err))
            | Outcome::LoadBalancers(Err(err))
            | Outcome::Services(Err(err))
            | Outcome::TargetGroups(Err(err))
            | Outcome::Tasks(Err(err)) => {
                self.report(err);
                Vec::new()
            }
        }
    }
}

fn clamp(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

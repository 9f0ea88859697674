use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::app::{App, Command, Ticket};
use crate::aws::AwsApi;
use crate::credentials::{CredentialStore, Credentials, Session};
use crate::gateway::{Gateway, Outcome, RemoteApi};
use crate::refresh::AutoRefresh;

/// Builds a [`RemoteApi`] for a session.
pub trait Connector: Send + Sync + 'static {
    type Api: RemoteApi;

    fn connect(&self, session: &Session) -> impl Future<Output = Self::Api> + Send;
}

pub struct AwsConnector;

impl Connector for AwsConnector {
    type Api = AwsApi;

    async fn connect(&self, session: &Session) -> AwsApi {
        AwsApi::connect(session).await
    }
}

#[derive(Debug)]
pub enum Event {
    Loaded(Ticket, Outcome),
    Tick,
}

struct Connection<A> {
    session: Session,
    gateway: Arc<Gateway<A>>,
}

/// Owns the controller and performs the work it asks for. Remote calls run
/// as tokio tasks and report back through a channel drained by the UI loop.
pub struct Runtime<C: Connector> {
    pub app: App,
    store: CredentialStore,
    configured: watch::Receiver<bool>,
    connector: C,
    connection: Option<Connection<C::Api>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    auto_refresh: AutoRefresh,
}

impl<C: Connector> Runtime<C> {
    pub fn new(store: CredentialStore, connector: C) -> Self {
        let configured = store.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            app: App::new(),
            store,
            configured,
            connector,
            connection: None,
            events_tx,
            events_rx,
            auto_refresh: AutoRefresh::default(),
        }
    }

    /// Loads stored credentials, if any, and starts the first refresh.
    pub async fn start(&mut self) {
        if self.store.load().is_none() {
            self.app.push_status("Enter AWS credentials to begin");
        }
        self.sync_credentials().await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn auto_refresh_running(&self) -> bool {
        self.auto_refresh.is_running()
    }

    pub async fn save_credentials(&mut self, credentials: Credentials) -> Result<bool> {
        let saved = self.store.save(credentials)?;
        if !saved {
            self.app
                .push_status("Access key, secret key and region are all required");
        }
        self.sync_credentials().await;
        Ok(saved)
    }

    async fn sync_credentials(&mut self) {
        if !self.configured.has_changed().unwrap_or(false) {
            return;
        }
        let configured = *self.configured.borrow_and_update();
        match (configured, self.store.current().cloned()) {
            (true, Some(credentials)) => self.activate(credentials).await,
            _ => self.deactivate(),
        }
    }

    async fn activate(&mut self, credentials: Credentials) {
        let session = Session::new(credentials);
        let api = self.connector.connect(&session).await;
        info!(session = %session.id, region = session.region(), "session started");
        let region = session.region().to_string();
        self.connection = Some(Connection {
            session,
            gateway: Arc::new(Gateway::new(api)),
        });
        let commands = self.app.on_configured(&region);
        self.run(commands);
    }

    fn deactivate(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!(session = %connection.session.id, "session ended");
        }
        self.auto_refresh.stop();
    }

    /// Carries out controller commands. Loads are spawned and never awaited here.
    pub fn run(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Load(ticket, fetch) => {
                    let Some(connection) = &self.connection else {
                        debug!(?fetch, "dropping fetch without a session");
                        continue;
                    };
                    let gateway = Arc::clone(&connection.gateway);
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let outcome = gateway.execute(fetch).await;
                        if events.send(Event::Loaded(ticket, outcome)).is_err() {
                            debug!(?ticket, "runtime gone before response arrived");
                        }
                    });
                }
                Command::ForgetCredentials => {
                    if let Err(err) = self.store.clear() {
                        warn!(error = %format!("{err:#}"), "failed to clear credentials");
                        self.app.push_status(&format!("Failed to clear credentials: {err:#}"));
                    }
                    self.configured.borrow_and_update();
                    self.deactivate();
                }
            }
        }
        self.sync_auto_refresh();
    }

    pub fn handle(&mut self, event: Event) {
        let commands = match event {
            Event::Loaded(ticket, outcome) => self.app.apply(ticket, outcome),
            Event::Tick if self.app.auto_refresh_active() => {
                debug!("auto-refresh tick");
                self.app.refresh()
            }
            Event::Tick => Vec::new(),
        };
        self.run(commands);
    }

    /// Applies every event that has already arrived.
    pub fn drain(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
        }
    }

    /// Keeps the timer in step with the auto-refresh flag and session.
    pub fn sync_auto_refresh(&mut self) {
        let wanted = self.app.auto_refresh_active() && self.is_connected();
        if wanted && !self.auto_refresh.is_running() {
            let events = self.events_tx.clone();
            self.auto_refresh
                .start(move || events.send(Event::Tick).is_ok());
        } else if !wanted && self.auto_refresh.is_running() {
            self.auto_refresh.stop();
        }
    }
}

use axon_schema::Session;
use tokio::sync::watch;

/// Read side of the auth provider.
pub trait SessionSource: Send + Sync {
    fn current(&self) -> Session;
}

/// Fixed session, e.g. loaded from a file.
pub struct StaticSession(Session);

impl StaticSession {
    pub fn new(session: Session) -> Self {
        Self(session)
    }
}

impl SessionSource for StaticSession {
    fn current(&self) -> Session {
        self.0.clone()
    }
}

/// Session owned by an auth provider that updates it over time.
pub struct WatchSession {
    tx: watch::Sender<Session>,
}

impl WatchSession {
    pub fn new(initial: Session) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the session. Only the auth provider calls this.
    pub fn set(&self, session: Session) {
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl SessionSource for WatchSession {
    fn current(&self) -> Session {
        self.tx.borrow().clone()
    }
}

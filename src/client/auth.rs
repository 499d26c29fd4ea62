//! Current-user context.
//!
//! The auth collaborator is the only writer; every view gets a reader (or an
//! `Arc<CurrentUser>` snapshot) at construction and never mutates it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::common::models::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub display_name: String,
    pub session_token: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            session_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// Creates the single writer and a reader for the current-user slot.
pub fn auth_state() -> (AuthWriter, AuthReader) {
    let (tx, rx) = watch::channel(None);
    (AuthWriter { tx }, AuthReader { rx })
}

pub struct AuthWriter {
    tx: watch::Sender<Option<Arc<CurrentUser>>>,
}

impl AuthWriter {
    pub fn sign_in(&self, user: CurrentUser) {
        self.tx.send_replace(Some(Arc::new(user)));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    pub fn reader(&self) -> AuthReader {
        AuthReader { rx: self.tx.subscribe() }
    }
}

#[derive(Clone)]
pub struct AuthReader {
    rx: watch::Receiver<Option<Arc<CurrentUser>>>,
}

impl AuthReader {
    pub fn current(&self) -> Option<Arc<CurrentUser>> {
        self.rx.borrow().clone()
    }

    pub fn session_token(&self) -> Option<String> {
        self.current().and_then(|u| u.session_token.clone())
    }
}

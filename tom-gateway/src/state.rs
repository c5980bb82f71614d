//! Shared gateway state: the in-memory user table, session store, FCM
//! token store, and the HTTP client used for all proxied requests.

use crate::fcm::FcmStore;
use crate::session::SessionStore;
use std::collections::HashMap;
use tom_core::config::TomConfig;
use tom_core::model::User;

pub struct GatewayState {
    pub users: HashMap<String, User>,
    pub sessions: SessionStore,
    pub fcm: FcmStore,
    pub client: reqwest::Client,
    pub config: TomConfig,
    pub static_dir: String,
}

impl GatewayState {
    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }
}

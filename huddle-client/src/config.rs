use huddle_core::{IceServerConfig, JoinRequest, Role};

pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:3000/ws";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket endpoint of the relay, e.g. `ws://host:3000/ws`.
    pub signaling_url: String,
    /// `None` lets the relay pick `User XXXXXX`.
    pub display_name: Option<String>,
    pub role: Role,
    pub ice_servers: Vec<IceServerConfig>,
}

impl ClientConfig {
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_URL.to_owned(),
            display_name: None,
            role: Role::Guest,
            ice_servers: IceServerConfig::public_defaults(),
        }
    }
}

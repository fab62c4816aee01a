use serde::Deserialize;
use std::net::SocketAddr;

use super::SettingsError;

#[derive(Debug)]
pub struct Http {
    pub socket: SocketAddr,
}

impl Http {
    pub fn new(sources: Vec<PartialHttp>) -> Result<Self, SettingsError> {
        let socket = sources.into_iter().find_map(|s| s.socket);

        Ok(Http {
            socket: socket.ok_or_else(|| SettingsError::MissingValue("http.socket".to_string()))?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialHttp {
    pub socket: Option<SocketAddr>,
}

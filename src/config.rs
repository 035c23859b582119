use crate::error::SignalError;
use crate::peer::types::ServerConfig;

/// Default STUN servers used when no custom servers are configured.
pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun-0".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
}

/// Validates custom ICE server entries before they reach the connection
/// primitive. TURN servers need credentials; every entry needs a URL.
pub fn validate_ice_servers(servers: &[ServerConfig]) -> Result<(), SignalError> {
    for server in servers {
        if server.url.is_empty() {
            return Err(SignalError::Setup(format!(
                "ICE server {} has an empty URL",
                server.id
            )));
        }
        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(SignalError::Setup(format!(
                "TURN server {} requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_without_credentials_is_rejected() {
        let servers = vec![ServerConfig {
            id: "turn-0".into(),
            r#type: "turn".into(),
            url: "turn:turn.example.com".into(),
            username: Some("user".into()),
            credential: None,
        }];
        assert!(validate_ice_servers(&servers).is_err());
        assert!(validate_ice_servers(&default_ice_servers()).is_ok());
    }
}

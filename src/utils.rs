use crate::peer::types::ServerConfig;
use rand::Rng;

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Adds the protocol scheme to an ICE server URL if it is missing.
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:") || config.url.starts_with("stun:") {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(r#type: &str, url: &str) -> ServerConfig {
        ServerConfig {
            id: "test".into(),
            r#type: r#type.into(),
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn scheme_added_only_when_missing() {
        assert_eq!(
            add_ice_url_scheme(&server("turn", "turn.example.com:3478")),
            "turn:turn.example.com:3478"
        );
        assert_eq!(
            add_ice_url_scheme(&server("stun", "stun:stun.example.com")),
            "stun:stun.example.com"
        );
        assert_eq!(
            add_ice_url_scheme(&server("stun", "stun.example.com")),
            "stun:stun.example.com"
        );
    }
}

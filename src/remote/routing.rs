// ABOUTME: Maps a logical API endpoint to the physical URL for the current deployment
// ABOUTME: Dev proxy, same-origin path, or a forwarder taking the path as a query parameter

use url::form_urlencoded::byte_serialize;

/// Pluggable route selection. Callers above the transport only ever see
/// logical endpoints such as `/tasks/{id}/status`.
pub trait RouteStrategy: Send + Sync {
    fn resolve_base_url(&self) -> String;

    /// URL for JSON requests.
    fn url_for(&self, endpoint: &str) -> String;

    /// URL for binary downloads. Forwarders may expose these elsewhere.
    fn download_url_for(&self, endpoint: &str) -> String {
        self.url_for(endpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// Local development proxy in front of the service.
    DevProxy,
    /// Reverse proxy on the same origin forwards `/api` directly.
    SameOrigin,
    /// Serverless function forwarding `?path=` to the service.
    Forwarding,
}

impl Deployment {
    /// Development builds use the dev proxy; hosts carrying the direct-host
    /// marker have a same-origin proxy; everything else goes through the
    /// forwarder.
    pub fn detect(dev: bool, hostname: Option<&str>, direct_host_marker: &str) -> Self {
        if dev {
            return Deployment::DevProxy;
        }
        match hostname {
            Some(host) if !direct_host_marker.is_empty() && host.contains(direct_host_marker) => {
                Deployment::SameOrigin
            }
            _ => Deployment::Forwarding,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dev_proxy" | "dev" => Some(Deployment::DevProxy),
            "same_origin" | "direct" => Some(Deployment::SameOrigin),
            "forwarding" | "serverless" => Some(Deployment::Forwarding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentRoute {
    origin: String,
    deployment: Deployment,
}

impl DeploymentRoute {
    pub fn new(origin: impl Into<String>, deployment: Deployment) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self { origin, deployment }
    }
}

fn encode_component(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

impl RouteStrategy for DeploymentRoute {
    fn resolve_base_url(&self) -> String {
        format!("{}/api", self.origin)
    }

    fn url_for(&self, endpoint: &str) -> String {
        match self.deployment {
            Deployment::DevProxy | Deployment::SameOrigin => {
                format!("{}{}", self.resolve_base_url(), endpoint)
            }
            Deployment::Forwarding => {
                format!("{}?path={}", self.resolve_base_url(), encode_component(endpoint))
            }
        }
    }

    fn download_url_for(&self, endpoint: &str) -> String {
        match self.deployment {
            Deployment::Forwarding => format!(
                "{}/blup?path={}",
                self.resolve_base_url(),
                encode_component(endpoint)
            ),
            _ => self.url_for(endpoint),
        }
    }
}

/// Builds `path?key=value&...` with every value percent-encoded.
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    format!("{}?{}", path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_deployment() {
        assert_eq!(
            Deployment::detect(true, Some("anything.testserver.tech"), "testserver.tech"),
            Deployment::DevProxy
        );
        assert_eq!(
            Deployment::detect(false, Some("blup.testserver.tech"), "testserver.tech"),
            Deployment::SameOrigin
        );
        assert_eq!(
            Deployment::detect(false, Some("blup.netlify.app"), "testserver.tech"),
            Deployment::Forwarding
        );
        assert_eq!(
            Deployment::detect(false, None, "testserver.tech"),
            Deployment::Forwarding
        );
    }

    #[test]
    fn test_direct_routes_append_endpoint() {
        let route = DeploymentRoute::new("http://localhost:3000/", Deployment::DevProxy);
        assert_eq!(
            route.url_for("/tasks/abc/status"),
            "http://localhost:3000/api/tasks/abc/status"
        );
        assert_eq!(
            route.download_url_for("/tasks/abc/report"),
            "http://localhost:3000/api/tasks/abc/report"
        );
    }

    #[test]
    fn test_forwarding_route_encodes_path() {
        let route = DeploymentRoute::new("https://blup.example.org", Deployment::Forwarding);
        assert_eq!(
            route.url_for("/meta/breeds?db=bmk_yy"),
            "https://blup.example.org/api?path=%2Fmeta%2Fbreeds%3Fdb%3Dbmk_yy"
        );
        assert_eq!(
            route.download_url_for("/tasks/abc/report"),
            "https://blup.example.org/api/blup?path=%2Ftasks%2Fabc%2Freport"
        );
    }

    #[test]
    fn test_with_query_encodes_values() {
        assert_eq!(
            with_query("/meta/mask_values", &[("db", "bmk_yy"), ("field", "month year")]),
            "/meta/mask_values?db=bmk_yy&field=month+year"
        );
        assert_eq!(with_query("/meta/breeds_all", &[]), "/meta/breeds_all");
    }
}

// ABOUTME: Remote analysis service access
// ABOUTME: Route selection, HTTP transport, wire models and the endpoint client

pub mod client;
pub mod models;
pub mod routing;
pub mod transport;

pub use client::{BlupClient, TaskApi};
pub use routing::{Deployment, DeploymentRoute, RouteStrategy};
pub use transport::{Credentials, Transport};

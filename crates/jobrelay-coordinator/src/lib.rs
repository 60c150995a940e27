pub mod coordinator;
pub mod load_balancer;
pub mod registry;
pub mod server;

pub use coordinator::{Coordinator, CoordinatorConfig, DEFAULT_BIND_HOST};
pub use load_balancer::{LoadBalancer, RotationPolicy};
pub use registry::Registry;
pub use server::CoordinatorServer;

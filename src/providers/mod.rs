pub mod base;
pub mod errors;
pub mod instance;
pub mod registry;
pub mod session;

pub use base::{
    DeliveryError, HealthCheck, MessagingProvider, RemoteEndpoint, SendReceipt,
};
pub use registry::{ProviderRegistry, RegisteredServer, create_provider};

pub mod relay_client;
pub mod relay_client_error;

pub use relay_client::RelayClient;
pub use relay_client_error::RelayClientError;

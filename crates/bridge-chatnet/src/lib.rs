pub mod error;
pub mod memory;
pub mod network;
pub mod types;

pub use error::ChatNetworkError;
pub use memory::InMemoryChatNetwork;
pub use network::ChatNetwork;

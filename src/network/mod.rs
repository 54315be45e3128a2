pub mod architecture;
pub mod network;
pub mod params;

pub use architecture::ArchitectureDescriptor;
pub use network::Network;
pub use params::ParameterSet;

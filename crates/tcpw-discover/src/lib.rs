//! Host network interface discovery.

mod errors;
pub use errors::DiscoverError;

mod enumerator;
pub use enumerator::{DeviceEnumerator, HostInterfaces};

mod selector;
pub use selector::DeviceSelector;

use regex::Regex;

use tcpw_model::Device;

use crate::DiscoverError;

/// Source of host network interfaces.
pub trait DeviceEnumerator: Send + Sync {
    /// Names of the interfaces matching `matcher`, in host order.
    fn find(&self, matcher: &Regex) -> Result<Vec<String>, DiscoverError>;

    /// Resolve an interface name to its stable index.
    fn resolve(&self, name: &str) -> Result<Device, DiscoverError>;
}

/// Interfaces of the running host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostInterfaces;

impl DeviceEnumerator for HostInterfaces {
    fn find(&self, matcher: &Regex) -> Result<Vec<String>, DiscoverError> {
        let addrs =
            nix::ifaddrs::getifaddrs().map_err(|e| DiscoverError::Enumerate(e.to_string()))?;

        // getifaddrs yields one entry per address, so names repeat.
        let mut names: Vec<String> = Vec::new();
        for addr in addrs {
            if !names.contains(&addr.interface_name) && matcher.is_match(&addr.interface_name) {
                names.push(addr.interface_name);
            }
        }
        Ok(names)
    }

    fn resolve(&self, name: &str) -> Result<Device, DiscoverError> {
        let index = nix::net::if_::if_nametoindex(name).map_err(|e| DiscoverError::NotFound {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Device::new(index, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_listed_and_resolvable() {
        let host = HostInterfaces;
        let names = host.find(&Regex::new("^lo$").unwrap()).unwrap();
        if names.is_empty() {
            // sandboxed hosts may not expose a loopback
            return;
        }
        assert_eq!(names, ["lo"]);

        let device = host.resolve("lo").unwrap();
        assert_eq!(device.name, "lo");
        assert!(device.index > 0);
    }

    #[test]
    fn unknown_interface_fails_to_resolve() {
        let err = HostInterfaces.resolve("tcpw-missing0").unwrap_err();
        assert!(matches!(err, DiscoverError::NotFound { .. }));
    }
}

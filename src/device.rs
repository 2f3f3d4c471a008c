//! Device strings: `"<kind>"` or `"<kind>:<index>"`.

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// The family of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Host processor.
    Cpu,
    /// Graphics processor.
    Gpu,
    /// Tensor processor.
    Tpu,
}

impl DeviceKind {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Tpu => "tpu",
        }
    }
}

/// A parsed device string.
///
/// A bare kind means index 0, so `"gpu"` and `"gpu:0"` are the same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    /// Device family.
    pub kind: DeviceKind,
    /// Ordinal within the family.
    pub index: usize,
}

impl Device {
    /// The first host processor.
    pub const CPU: Self = Self::new(DeviceKind::Cpu, 0);

    /// Builds a device from its parts.
    #[must_use]
    pub const fn new(kind: DeviceKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::CPU
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.index)
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDevice { device: s.to_owned() };
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => (kind, Some(index)),
            None => (s, None),
        };
        let kind = match kind {
            "cpu" => DeviceKind::Cpu,
            "gpu" => DeviceKind::Gpu,
            "tpu" => DeviceKind::Tpu,
            _ => return Err(invalid()),
        };
        let index = match index {
            None => 0,
            // reject signs and whitespace that usize::from_str would not catch
            Some(i) if !i.is_empty() && i.bytes().all(|b| b.is_ascii_digit()) => {
                i.parse().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
        };
        Ok(Self { kind, index })
    }
}

/// Parses an optional device argument.
///
/// # Errors
/// [`Error::InvalidDevice`] for malformed strings.
pub fn parse_device(device: Option<&str>) -> Result<Option<Device>> {
    device.map(str::parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_kind_with_optional_index() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::CPU);
        assert_eq!(
            "gpu:3".parse::<Device>().unwrap(),
            Device::new(DeviceKind::Gpu, 3)
        );
        assert_eq!("tpu:0".parse::<Device>().unwrap().to_string(), "tpu:0");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["cuda:0", "gpu:", "gpu:-1", "gpu:1:2", "CPU", "", "cpu: 1"] {
            match bad.parse::<Device>() {
                Err(Error::InvalidDevice { device }) => assert_eq!(device, bad),
                other => panic!("{bad:?} parsed as {other:?}"),
            }
        }
    }
}

//! Packed API version and the version gate applied at context creation.
//!
//! A version is packed into a single `u32` as `variant << 29 | major << 22 | minor << 12 | patch`.
//! Callers pass the version they were compiled against; context creation only succeeds when it is
//! exactly [`IMPELLER_VERSION`]. There is no partial-compatibility negotiation.

use crate::errors::InteropError;

pub const VERSION_VARIANT: u32 = 1;
pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;

/// The version this library was built as.
pub const IMPELLER_VERSION: u32 = make_version(VERSION_VARIANT, VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH);

const VARIANT_BITS: u32 = 3;
const MAJOR_BITS: u32 = 7;
const MINOR_BITS: u32 = 10;
const PATCH_BITS: u32 = 12;

/// Packs the version components. Out of range components are truncated to their field width.
pub const fn make_version(variant: u32, major: u32, minor: u32, patch: u32) -> u32 {
    ((variant & mask(VARIANT_BITS)) << 29)
        | ((major & mask(MAJOR_BITS)) << 22)
        | ((minor & mask(MINOR_BITS)) << 12)
        | (patch & mask(PATCH_BITS))
}

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub variant: u32,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn unpack(packed: u32) -> Self {
        Self {
            variant: packed >> 29,
            major: (packed >> 22) & mask(MAJOR_BITS),
            minor: (packed >> 12) & mask(MINOR_BITS),
            patch: packed & mask(PATCH_BITS),
        }
    }

    pub fn pack(&self) -> u32 {
        make_version(self.variant, self.major, self.minor, self.patch)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.variant, self.major, self.minor, self.patch)
    }
}

/// Fails unless `version` is exactly the compiled-in [`IMPELLER_VERSION`].
pub fn check_version(version: u32) -> Result<(), InteropError> {
    if version != IMPELLER_VERSION {
        log::error!(
            "Version mismatch: library is {} but caller asked for {}",
            Version::unpack(IMPELLER_VERSION),
            Version::unpack(version)
        );
        return Err(InteropError::VersionMismatch {
            expected: IMPELLER_VERSION,
            actual: version,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_fields_into_their_bit_ranges() {
        assert_eq!(make_version(1, 0, 0, 0), 1 << 29);
        assert_eq!(make_version(0, 1, 0, 0), 1 << 22);
        assert_eq!(make_version(0, 0, 1, 0), 1 << 12);
        assert_eq!(make_version(0, 0, 0, 1), 1);
    }

    #[test]
    fn unpack_recovers_compiled_version() {
        let v = Version::unpack(IMPELLER_VERSION);
        assert_eq!(v, Version { variant: 1, major: 1, minor: 3, patch: 0 });
        assert_eq!(v.pack(), IMPELLER_VERSION);
        assert_eq!(v.to_string(), "1.1.3.0");
    }

    #[test]
    fn only_the_exact_version_passes() {
        assert!(check_version(IMPELLER_VERSION).is_ok());

        for other in [0, IMPELLER_VERSION + 1, IMPELLER_VERSION - 1, make_version(1, 1, 2, 0), u32::MAX] {
            match check_version(other) {
                Err(InteropError::VersionMismatch { expected, actual }) => {
                    assert_eq!(expected, IMPELLER_VERSION);
                    assert_eq!(actual, other);
                }
                res => panic!("expected mismatch for {other:#x}, got {res:?}"),
            }
        }
    }
}

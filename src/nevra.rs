// src/nevra.rs

//! NEVRA strings: `name-[epoch:]version-release.arch`

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Architecture of source packages
pub const ARCH_SRC: &str = "src";

/// A parsed RPM name-epoch-version-release-arch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    pub fn is_source(&self) -> bool {
        self.arch == ARCH_SRC || self.arch == "nosrc"
    }

    /// File name this package would normally be shipped as
    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            self.name, self.version, self.release, self.arch
        )
    }
}

impl FromStr for Nevra {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::ParseError(format!("Invalid NEVRA: {s}"));
        let trimmed = s.strip_suffix(".rpm").unwrap_or(s);

        let (rest, arch) = trimmed.rsplit_once('.').ok_or_else(invalid)?;
        let (rest, release) = rest.rsplit_once('-').ok_or_else(invalid)?;
        let (name, epoch_version) = rest.rsplit_once('-').ok_or_else(invalid)?;

        let (epoch, version) = match epoch_version.split_once(':') {
            Some((epoch, version)) => (epoch.parse::<i64>().map_err(|_| invalid())?, version),
            None => (0, epoch_version),
        };

        if [name, version, release, arch].iter().any(|p| p.is_empty()) || epoch < 0 {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            epoch,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }
}

//! Package map parsing
//!
//! `app-gen-toc` writes `app-package-map.txt` describing where each image
//! and the TOC package land in MRAM. The format belongs to the vendor tool
//! and shifts between releases, so it is scanned line by line for markers
//! rather than parsed structurally:
//!
//! ```text
//! 0x80000000  alif-img.bin  0x00012340  ...
//! APP Package Start Address: 0x8057f0f0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

use crate::config::defaults;

/// Package map errors
#[derive(Error, Debug)]
pub enum MapFileError {
    /// The map file is absent
    #[error("Package map not found at {path}. Re-run signing to regenerate it")]
    NotFound { path: PathBuf },

    /// The map file could not be read
    #[error("Failed to read package map '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// No line references the signed image
    #[error("Package map has no entry for {}", names.join(" or "))]
    MissingImageLine { names: Vec<String> },

    /// No package start address line
    #[error("Package map has no 'package start address' line")]
    MissingPackageStart,
}

/// Load and TOC addresses resolved from a map file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashAddresses {
    /// Where the signed image is written
    pub image: String,
    /// Where the TOC package is written
    pub toc: String,
}

/// A scanned package map
#[derive(Debug, Clone, Default)]
pub struct PackageMap {
    lines: Vec<String>,
}

impl PackageMap {
    /// Scan map text
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Read a map file
    pub fn from_path(path: &Path) -> Result<Self, MapFileError> {
        if !path.is_file() {
            return Err(MapFileError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| MapFileError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Ok(Self::parse(&content))
    }

    /// Load address of the first line mentioning any of `names`
    ///
    /// The address is the first whitespace-delimited field of that line.
    pub fn image_address(&self, names: &[&str]) -> Result<String, MapFileError> {
        self.lines
            .iter()
            .find(|l| names.iter().any(|n| l.contains(n)))
            .and_then(|l| l.split_whitespace().next())
            .map(str::to_string)
            .ok_or_else(|| MapFileError::MissingImageLine {
                names: names.iter().map(|n| (*n).to_string()).collect(),
            })
    }

    /// TOC address from the package start line, text after its last colon
    pub fn package_start(&self) -> Result<String, MapFileError> {
        self.lines
            .iter()
            .find(|l| l.to_lowercase().contains(defaults::PACKAGE_START_MARKER))
            .and_then(|l| l.rsplit(':').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(MapFileError::MissingPackageStart)
    }

    /// Both addresses; either one missing is an error
    pub fn flash_addresses(&self, image_names: &[&str]) -> Result<FlashAddresses, MapFileError> {
        Ok(FlashAddresses {
            image: self.image_address(image_names)?,
            toc: self.package_start()?,
        })
    }

    /// Addresses of every `...Address: 0x...` line, lowercased, first seen first
    pub fn labelled_addresses(&self) -> Vec<String> {
        let Ok(labelled) = Regex::new(r"Address\s*:\s*(0x[0-9a-fA-F]+)") else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        for caps in self.lines.iter().filter_map(|l| labelled.captures(l)) {
            let addr = caps[1].to_lowercase();
            if !found.contains(&addr) {
                found.push(addr);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generators::{hex_address, map_noise_line};
    use proptest::prelude::*;

    const MAP: &str = "\
Package map generated by app-gen-toc
Address      Name           Size
0x80000000  alif-img.bin  0x00012340  M55_HE
0x8057ff90  AppTocPackage.bin  0x00000070
APP Package Start Address: 0x8057f0f0
";

    #[test]
    fn test_resolves_both_addresses() {
        let map = PackageMap::parse(MAP);
        let addrs = map.flash_addresses(&["alif-img.bin"]).unwrap();
        assert_eq!(addrs.image, "0x80000000");
        assert_eq!(addrs.toc, "0x8057f0f0");
    }

    #[test]
    fn test_image_name_candidates() {
        let map = PackageMap::parse("0x80200000  blinky.bin  0x100\n");
        assert_eq!(
            map.image_address(&["alif-img.bin", "blinky.bin"]).unwrap(),
            "0x80200000"
        );
    }

    #[test]
    fn test_missing_image_line() {
        let map = PackageMap::parse("APP Package Start Address: 0x8057f0f0\n");
        assert!(matches!(
            map.flash_addresses(&["alif-img.bin"]),
            Err(MapFileError::MissingImageLine { .. })
        ));
    }

    #[test]
    fn test_missing_package_start() {
        let map = PackageMap::parse("0x80000000  alif-img.bin\n");
        assert!(matches!(
            map.flash_addresses(&["alif-img.bin"]),
            Err(MapFileError::MissingPackageStart)
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = PackageMap::from_path(Path::new("/nonexistent/app-package-map.txt")).unwrap_err();
        assert!(matches!(err, MapFileError::NotFound { .. }));
    }

    #[test]
    fn test_labelled_addresses() {
        let map = PackageMap::parse(
            "APP Package Start Address: 0x8057F0F0\nImage Address: 0x80000000 (alif-img.bin)\nToc Address: 0x8057f0f0\n0x80010000  other.bin\n",
        );
        assert_eq!(map.labelled_addresses(), vec!["0x8057f0f0", "0x80000000"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_addresses_found_among_noise(
            image in hex_address(),
            toc in hex_address(),
            noise in proptest::collection::vec(map_noise_line(), 0..8),
            pad in 1usize..6,
        ) {
            let mut text = noise.join("\n");
            text.push_str(&format!("\n  {image}{}alif-img.bin  0x10\n", " ".repeat(pad)));
            text.push_str(&format!("Package Start Address :{}{toc}  \n", " ".repeat(pad)));

            let addrs = PackageMap::parse(&text).flash_addresses(&["alif-img.bin"]).unwrap();
            prop_assert_eq!(addrs.image, image);
            prop_assert_eq!(addrs.toc, toc);
        }
    }
}

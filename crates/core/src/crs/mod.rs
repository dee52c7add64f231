//! Coordinate Reference System handling

mod reproject;

pub use reproject::{parse_utm_epsg, reproject_geometry, wgs84_to_utm};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation (primary)
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // WKT string equality is imperfect but conservative
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt
                .char_indices()
                .nth(50)
                .map(|(i, _)| i)
                .unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parse `EPSG:<code>`, a bare EPSG code, a `+proj=` string or WKT
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("empty CRS string".into()));
        }
        let code = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
            .unwrap_or(s);
        if let Ok(code) = code.parse::<u32>() {
            return Ok(Self::from_epsg(code));
        }
        if s.starts_with("+proj") {
            return Ok(Self::from_proj(s));
        }
        if s.contains('[') {
            return Ok(Self::from_wkt(s));
        }
        Err(Error::Config(format!("unrecognised CRS string: {}", s)))
    }
}

/// Require that both CRSes are present and equivalent.
///
/// `left` and `right` name the operands in the resulting error.
pub fn require_same_crs(
    a: Option<&CRS>,
    b: Option<&CRS>,
    left: &'static str,
    right: &'static str,
) -> Result<()> {
    let a = a.ok_or(Error::MissingCrs(left))?;
    let b = b.ok_or(Error::MissingCrs(right))?;
    if !a.is_equivalent(b) {
        return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(2232)));
    }

    #[test]
    fn test_crs_from_str() {
        assert_eq!("EPSG:2232".parse::<CRS>().unwrap().epsg(), Some(2232));
        assert_eq!("32613".parse::<CRS>().unwrap().epsg(), Some(32613));
        assert!("+proj=utm +zone=13".parse::<CRS>().unwrap().proj().is_some());
        assert!("".parse::<CRS>().is_err());
        assert!("garbage".parse::<CRS>().is_err());
    }

    #[test]
    fn test_require_same_crs_missing() {
        let a = CRS::from_epsg(2232);
        let err = require_same_crs(Some(&a), None, "canopy", "boundary").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CrsMismatch);
        assert!(err.to_string().contains("boundary"));
    }

    #[test]
    fn test_require_same_crs_different() {
        let a = CRS::from_epsg(2232);
        let b = CRS::from_epsg(4326);
        let err = require_same_crs(Some(&a), Some(&b), "canopy", "boundary").unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(..)));
        assert!(require_same_crs(Some(&a), Some(&a.clone()), "a", "b").is_ok());
    }
}

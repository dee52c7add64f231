//! Morphological closing (dilation followed by erosion)
//!
//! Fills background holes smaller than the structuring element inside
//! canopy patches.

use canopygap_core::raster::Raster;
use canopygap_core::Result;

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;

/// Closing = dilate then erode.
///
/// The erosion treats cells outside the raster as background, so
/// foreground within the element radius of the edge is cleared.
pub fn closing(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let dilated = dilate(mask, element)?;
    erode(&dilated, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_fills_hole() {
        let mut mask: Raster<u8> = Raster::filled(7, 7, 1);
        mask.set(3, 3, 0).unwrap();
        let out = closing(&mask, &StructuringElement::default()).unwrap();
        for r in 1..6 {
            for c in 1..6 {
                assert_eq!(out.get(r, c).unwrap(), 1, "cell ({}, {})", r, c);
            }
        }
        assert_eq!(out.get(0, 3).unwrap(), 0);
        assert_eq!(out.get(6, 6).unwrap(), 0);
    }

    #[test]
    fn test_closing_keeps_background() {
        let mask: Raster<u8> = Raster::new(6, 6);
        let out = closing(&mask, &StructuringElement::default()).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_closing_is_extensive_away_from_edge() {
        let mut mask: Raster<u8> = Raster::new(8, 8);
        for &(r, c) in &[(1, 1), (1, 2), (2, 2), (5, 5), (6, 3), (2, 6)] {
            mask.set(r, c, 1).unwrap();
        }
        let out = closing(&mask, &StructuringElement::square(3).unwrap()).unwrap();
        for (o, m) in out.data().iter().zip(mask.data().iter()) {
            assert!(*o >= *m);
        }
    }
}

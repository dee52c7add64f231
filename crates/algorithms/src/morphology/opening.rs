//! Morphological opening (erosion followed by dilation)
//!
//! Removes foreground specks smaller than the structuring element while
//! leaving larger canopy patches in place.

use canopygap_core::raster::Raster;
use canopygap_core::Result;

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;

/// Opening = erode then dilate.
///
/// The result never contains a foreground cell that was background in the
/// input.
pub fn opening(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let eroded = erode(mask, element)?;
    dilate(&eroded, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_removes_speck() {
        let mut mask: Raster<u8> = Raster::new(9, 9);
        mask.set(4, 4, 1).unwrap();
        let out = opening(&mask, &StructuringElement::default()).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_opening_preserves_large_block() {
        let mut mask: Raster<u8> = Raster::new(9, 9);
        for r in 2..7 {
            for c in 2..7 {
                mask.set(r, c, 1).unwrap();
            }
        }
        let out = opening(&mask, &StructuringElement::default()).unwrap();
        assert_eq!(out.data(), mask.data());
    }

    #[test]
    fn test_opening_is_anti_extensive() {
        let mask = Raster::from_vec(
            vec![
                1, 1, 0, 0, 1, //
                1, 1, 1, 0, 0, //
                0, 1, 1, 1, 0, //
                0, 0, 1, 1, 1, //
                1, 0, 0, 1, 1u8,
            ],
            5,
            5,
        )
        .unwrap();
        let out = opening(&mask, &StructuringElement::default()).unwrap();
        for (o, m) in out.data().iter().zip(mask.data().iter()) {
            assert!(*o <= *m);
        }
    }
}

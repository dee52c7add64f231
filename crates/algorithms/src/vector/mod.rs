//! Vector stage of the pipeline
//!
//! - Polygonize: trace a binary mask into class-labelled polygons
//! - Buffer: grow or shrink canopy polygons
//! - Overlay: dissolve, clip to a boundary, subtract canopy from a boundary
//! - Explode: split multi-part results into single polygons
//! - Measurements: area, acreage and size buckets

mod buffer;
mod explode;
mod measurements;
mod overlay;
mod polygonize;

pub use buffer::{buffer, buffer_multi_polygon};
pub use explode::explode;
pub use measurements::{
    area, area_summary, classify_by_area, compute_area, raster_bounds_polygon, AreaSummary,
    SizeClassCount,
};
pub use overlay::{
    clip_intersect, difference, dissolve, dissolve_by_class, union_all, CANOPY_CLASS, GAP_CLASS,
};
pub use polygonize::{
    label_regions, polygonize, polygonize_band_stack, trace_regions, PolygonizeParams, Polygonizer,
    RegionMap,
};

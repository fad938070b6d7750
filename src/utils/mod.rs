pub mod html;
pub mod pdf;
pub mod raster;

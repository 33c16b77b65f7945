pub mod export;
pub mod insights;
pub mod io;
pub mod observations;
pub mod polars_ext;
pub mod summary;
pub mod trends;

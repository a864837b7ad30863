
pub mod batch;
pub mod pool;

pub mod report;
pub mod weather;

pub mod columns;
pub mod normals;
pub mod parameters;
pub mod utils;

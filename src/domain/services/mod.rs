pub mod aggregation;
pub mod clustering;
pub mod rasterize;
pub mod storage_state;
pub mod typical_periods;

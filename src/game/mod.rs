pub mod chart;
pub mod gameplay;
pub mod hit_objects;
pub mod judgment;
pub mod life;
pub mod note;
pub mod pool;
pub mod scroll;
pub mod timing;
pub mod timing_lines;
pub mod timing_stats;
pub mod timing_windows;
pub mod velocity_buckets;

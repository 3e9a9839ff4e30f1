pub mod clock;
pub mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Admission, RateLimitPolicy, RateLimiter, spawn_sweeper};

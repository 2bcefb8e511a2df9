mod lifecycle;
mod replenishment;

pub use lifecycle::{
    LifecycleSystem, ANIMATION_RATE, FERTILE_AGE_MAX, FERTILE_AGE_MIN, REPRODUCTIVE_YEARS,
};
pub use replenishment::ReplenishmentSystem;

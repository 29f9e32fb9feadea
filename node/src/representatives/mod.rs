mod online_reps;
mod online_weight_sampler;
mod representative_register;

pub use online_reps::*;
pub use online_weight_sampler::*;
pub use representative_register::*;

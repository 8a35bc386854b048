pub mod options;

pub use options::{
    CoarseSolverType, MgCycleType, SamplerOptions, SeedPolicy, SmootherType, SweepDirection,
};

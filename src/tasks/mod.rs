//! Background tasks.

mod recovery;

pub use recovery::{
    RecoveryConfig, RecoveryConfigError, RecoverySweep, SweepOutcome, SweepReport,
};

pub mod exit_attempt;
pub mod preference;
pub mod target_selection;

pub use exit_attempt::ExitAttempt;
pub use preference::Preference;
pub use target_selection::TargetAppSelection;

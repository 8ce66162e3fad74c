pub mod exclusions;
pub mod extract;
pub mod sets;

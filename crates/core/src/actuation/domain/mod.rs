pub mod actuator;
pub mod stance;

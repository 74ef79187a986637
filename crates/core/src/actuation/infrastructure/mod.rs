pub mod logging_actuator;

pub mod control_loop;
pub mod control_signal;
pub mod loop_logger;

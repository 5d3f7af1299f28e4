pub mod rules;
pub mod simulate;
pub mod watch;

pub mod kill;
pub mod ports;
pub mod procs;

pub mod echo_worker;
pub mod replay;

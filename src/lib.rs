pub mod debugger;
pub mod rstate;
pub mod state;
pub mod syms;
pub mod tracer;

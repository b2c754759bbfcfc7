// Front-ends
// Interactive terminal loop and the one-page web form, both over a RagPipeline

pub mod cli;
pub mod web;

pub use cli::run_query_loop;
pub use web::{WebServer, build_router};

use std::process::ExitCode;

mod app;
mod cli;
mod commit;
mod config;
mod doctor;
mod logger;
mod notify;
mod orchestrate;
mod runner;
mod shell;
mod state;
mod transition;


fn main() -> ExitCode {
    app::main()
}

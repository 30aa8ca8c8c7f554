pub mod cli;
pub mod jq_exec;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}

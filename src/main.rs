use std::process::ExitCode;

fn main() -> ExitCode {
    contract_deployer::run()
}

use clap::Parser;

use gradespec::error::NiceError;
use gradespec::local::run;
use gradespec::opt::Opt;

fn main() {
    let opt = Opt::parse();
    opt.logger.enable_log();

    run(opt).nice_unwrap()
}

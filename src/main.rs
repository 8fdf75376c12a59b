use anyhow::{Context, Result};
use chrono::{Local, Utc};
use rusty_gpu::{
    arg_parser::ArgsOptions,
    logger,
    registry::IoregRegistry,
    report::{Report, render_table},
    snapshot::snapshot,
};

fn main() -> Result<()> {
    logger::init_logging();

    // Parse the command line arguments
    let args_options = ArgsOptions::parse();

    // A registry failure is logged and results in an empty report
    let devices = snapshot(&IoregRegistry::default());

    if args_options.raw {
        let report = Report::new(&devices, Utc::now().timestamp());
        let json = report
            .to_json()
            .with_context(|| "Failed to print the device report")?;

        println!("{json}");
    } else {
        print!("{}", render_table(&devices, &Local::now()));
    }

    Ok(())
}

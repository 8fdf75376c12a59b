use std::io;

use argparse::{ArgumentParser, Print, StoreTrue};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArgsOptions {
    // Print the report as JSON instead of a table
    pub raw: bool,
}

impl ArgsOptions {
    // Parse the process arguments, exit on --help, --version or invalid arguments
    pub fn parse() -> Self {
        let mut options = ArgsOptions::default();

        {
            let parser = Self::parser(&mut options);
            parser.parse_args_or_exit();
        }

        options
    }

    // Parse the given arguments, the first one being the program name.
    // On failure return the exit code the process should end with
    pub fn parse_from(args: Vec<String>) -> Result<Self, i32> {
        let mut options = ArgsOptions::default();

        {
            let parser = Self::parser(&mut options);
            parser.parse(args, &mut io::sink(), &mut io::sink())?;
        }

        Ok(options)
    }

    fn parser(options: &mut ArgsOptions) -> ArgumentParser<'_> {
        let mut parser = ArgumentParser::new();
        parser.set_description("Show VRAM usage and utilization of the graphics accelerators");

        // JSON output
        parser.refer(&mut options.raw).add_option(
            &["--raw"],
            StoreTrue,
            "Print the report as JSON",
        );

        // Show program version
        parser.add_option(
            &["-V", "--version"],
            Print(env!("CARGO_PKG_VERSION").to_string()),
            "Show the program version",
        );

        parser
    }
}

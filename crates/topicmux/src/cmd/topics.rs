use std::io;

use crate::cmd::{build_registry, load_config, TopicsArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_topics, OutputFormat};

pub fn run(args: TopicsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let registry = build_registry(&config, args.max_payload)?;
    print_topics(&mut io::stdout(), &registry.descriptors(), format);
    Ok(SUCCESS)
}

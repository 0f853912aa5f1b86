use std::collections::HashMap;
use std::io::{self, Read};

use topicmux_frame::decode_stream;
use topicmux_topic::{topic_identifier, DEFAULT_NAMESPACE};

use crate::cmd::{load_config, InspectArgs};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match &args.file {
        Some(path) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let names = match &args.config {
        Some(path) => topic_names(&load_config(Some(path.as_path()))?.topics),
        None => HashMap::new(),
    };

    let frames =
        decode_stream(&bytes, args.max_payload).map_err(|err| frame_error("decode failed", err))?;
    print_frames(
        &mut io::stdout(),
        &frames,
        |identifier| names.get(&identifier).map(String::as_str),
        format,
    );
    Ok(SUCCESS)
}

fn topic_names(entries: &[topicmux_client::TopicEntry]) -> HashMap<u32, String> {
    entries
        .iter()
        .map(|entry| {
            let namespace = entry.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
            (
                topic_identifier(&entry.name, namespace),
                format!("{namespace}/{}", entry.name),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmux_client::TopicEntry;

    #[test]
    fn names_are_keyed_by_wire_identifier() {
        let names = topic_names(&[
            TopicEntry::new("topic1"),
            TopicEntry::in_namespace("odom", "chassis"),
        ]);

        assert_eq!(
            names[&topic_identifier("topic1", DEFAULT_NAMESPACE)],
            "default/topic1"
        );
        assert_eq!(names[&topic_identifier("odom", "chassis")], "chassis/odom");
    }
}

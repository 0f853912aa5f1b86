use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use topicmux_client::ClientStats;
use topicmux_frame::Frame;
use topicmux_topic::TopicDescriptor;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct TopicOutput<'a> {
    name: &'a str,
    namespace: &'a str,
    identifier: u32,
    identifier_hex: String,
    max_payload_size: usize,
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: usize,
    identifier: u32,
    identifier_hex: String,
    topic: Option<&'a str>,
    payload_size: usize,
    payload: String,
}

pub fn print_topics(out: &mut dyn Write, topics: &[TopicDescriptor], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = topics
                .iter()
                .map(|topic| TopicOutput {
                    name: &topic.name,
                    namespace: &topic.namespace,
                    identifier: topic.identifier,
                    identifier_hex: hex_id(topic.identifier),
                    max_payload_size: topic.max_payload_size,
                })
                .collect();
            write_json(out, &rows);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["NAMESPACE", "TOPIC", "IDENTIFIER", "MAX PAYLOAD"]);
            for topic in topics {
                table.add_row(vec![
                    topic.namespace.clone(),
                    topic.name.clone(),
                    hex_id(topic.identifier),
                    topic.max_payload_size.to_string(),
                ]);
            }
            let _ = writeln!(out, "{table}");
        }
        OutputFormat::Pretty => {
            for topic in topics {
                let _ = writeln!(
                    out,
                    "{} id={} max_payload={}",
                    topic.qualified_name(),
                    hex_id(topic.identifier),
                    topic.max_payload_size
                );
            }
        }
    }
}

/// Print decoded frames. `topic_name` maps an identifier back to a topic.
pub fn print_frames<'a>(
    out: &mut dyn Write,
    frames: &[Frame],
    topic_name: impl Fn(u32) -> Option<&'a str>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = frames
                .iter()
                .enumerate()
                .map(|(index, frame)| FrameOutput {
                    index,
                    identifier: frame.identifier,
                    identifier_hex: hex_id(frame.identifier),
                    topic: topic_name(frame.identifier),
                    payload_size: frame.payload.len(),
                    payload: payload_preview(&frame.payload),
                })
                .collect();
            write_json(out, &rows);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "IDENTIFIER", "TOPIC", "SIZE", "PAYLOAD"]);
            for (index, frame) in frames.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    hex_id(frame.identifier),
                    topic_name(frame.identifier).unwrap_or("-").to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(&frame.payload),
                ]);
            }
            let _ = writeln!(out, "{table}");
        }
        OutputFormat::Pretty => {
            for (index, frame) in frames.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "#{index} id={} topic={} size={} payload={}",
                    hex_id(frame.identifier),
                    topic_name(frame.identifier).unwrap_or("-"),
                    frame.payload.len(),
                    payload_preview(&frame.payload)
                );
            }
        }
    }
}

pub fn print_stats(out: &mut dyn Write, stats: &ClientStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => write_json(out, stats),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COUNTER", "VALUE"]);
            for (name, value) in stat_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            let _ = writeln!(out, "{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = stat_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
    }
}

fn stat_rows(stats: &ClientStats) -> [(&'static str, u64); 7] {
    [
        ("frames_enqueued", stats.frames_enqueued),
        ("frames_dropped_queue_full", stats.frames_dropped_queue_full),
        ("frames_dropped_slot_busy", stats.frames_dropped_slot_busy),
        ("frames_dropped_oversize", stats.frames_dropped_oversize),
        ("bytes_written", stats.bytes_written),
        ("write_failures", stats.write_failures),
        ("wakeups", stats.wakeups),
    ]
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let _ = writeln!(out, "{json}");
}

pub fn hex_id(identifier: u32) -> String {
    format!("{identifier:#010x}")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

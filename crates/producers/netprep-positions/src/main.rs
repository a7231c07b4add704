use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use log::info;

use netprep_output::logger::initiate_logger;
use netprep_output::ui::Message;
use netprep_runner::runner::{add_event_listener, add_event_poller};

use crate::produce::config::{read_config, Config};
use crate::produce::parser::TraceParser;
use crate::produce::ui::SimRenderer;

mod produce;
mod vehicles;

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
struct CliArgs {
    #[arg(short = 'c', long, value_name = "Position Configuration File")]
    config: String,
}

fn main() {
    let config_file: String = CliArgs::parse().config;
    let start = std::time::Instant::now();
    let file_path = PathBuf::from(config_file);
    let config: Config = read_config(&file_path);
    let config_dir = file_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    initiate_logger(&config_dir, &config.log_settings);
    let parser = TraceParser::new(config);
    generate_positions(parser);
    let elapsed = start.elapsed();
    info!("Trace parsing finished in {} ms.", elapsed.as_millis());
}

fn generate_positions(mut trace_parser: TraceParser) {
    let (sender_ui, receiver_ui) = mpsc::sync_channel(0);
    let sender = sender_ui.clone();
    let terminal_sender = sender_ui.clone();
    let duration = trace_parser.duration.as_u64();
    let metadata = trace_parser.build_trace_metadata();
    let renderer = SimRenderer::new();
    thread::scope(|s| {
        s.spawn(move || {
            add_event_listener(receiver_ui, duration, metadata, renderer);
        });

        s.spawn(move || {
            add_event_poller(&sender);
            trace_parser.initialize();
            while let Some(now) = trace_parser.parse_next_step() {
                if terminal_sender.send(Message::CurrentTime(now.as_u64())).is_err() {
                    info!("User must have requested to quit, terminating at {}", now);
                    trace_parser.complete();
                    return;
                }
            }
            trace_parser.complete();
            sender_ui
                .send(Message::Quit)
                .expect("Failed to send quit message");
        });
    });
}

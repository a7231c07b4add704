use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use log::{debug, info};

use netprep_core::times::TimeMS;
use netprep_output::logger::initiate_logger;
use netprep_output::ui::Message;
use netprep_runner::runner::{add_event_listener, add_event_poller};

use crate::links::config::{read_config, Config};
use crate::links::linker::LinkFinder;
use crate::links::ui::SimRenderer;

mod links;

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
struct CliArgs {
    #[arg(short = 'c', long, value_name = "Link Configuration File")]
    config: String,
}

fn main() {
    let config_file: String = CliArgs::parse().config;
    let start = std::time::Instant::now();
    let file_path = PathBuf::from(config_file);
    let config: Config = read_config(&file_path);
    let config_dir = file_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    initiate_logger(&config_dir, &config.log_settings);
    let finder = LinkFinder::new(config);
    generate_links(finder);
    let elapsed = start.elapsed();
    info!("Link calculation finished in {} ms.", elapsed.as_millis());
}

fn generate_links(mut link_finder: LinkFinder) {
    let (sender_ui, receiver_ui) = mpsc::sync_channel(0);
    let sender = sender_ui.clone();
    let terminal_sender = sender_ui.clone();
    let duration = link_finder.duration.as_u64();
    let metadata = link_finder.build_link_metadata();
    let renderer = SimRenderer::new();
    thread::scope(|s| {
        s.spawn(move || {
            add_event_listener(receiver_ui, duration, metadata, renderer);
        });

        s.spawn(move || {
            thread::scope(|s2| {
                s2.spawn(move || add_event_poller(&sender));
            });
            link_finder.initialize();
            debug!("Looping from 0 to {} with step {}", link_finder.duration, link_finder.step_size);
            let mut now = TimeMS::default();
            while now < link_finder.duration {
                link_finder.find_links_at(now);
                if terminal_sender.send(Message::CurrentTime(now.as_u64())).is_err() {
                    info!("User must have requested to quit, terminating at {}", now);
                    link_finder.complete();
                    return;
                }
                now += link_finder.step_size;
            }
            link_finder.complete();
            sender_ui
                .send(Message::Quit)
                .expect("Failed to send quit message");
        });
    });
}

//! Command-line player.
//!
//! Plays one file or `http(s)://` URL and exits when the session ends.

use clap::Parser;
use parking_lot::Mutex;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tonearm_player::{
    init_logging, AudioError, AudioPlayer, DataSource, EngineConfig, Player, PlayerBackend,
    PlayerEvents,
};

#[derive(Parser)]
#[command(name = "tonearm")]
#[command(about = "Decode and play an audio file or stream")]
struct Args {
    /// File path or http(s) URL
    #[arg(required_unless_present = "list_codecs")]
    source: Option<String>,

    /// Print the available decoders and exit
    #[arg(long)]
    list_codecs: bool,

    /// Restart from the beginning at end of stream
    #[arg(long = "loop")]
    looping: bool,

    /// Report this duration (ms) instead of the source's
    #[arg(long)]
    target_ms: Option<u64>,

    /// Decode without opening an audio device
    #[arg(long)]
    null_output: bool,

    /// With --null-output, consume audio as fast as it decodes
    #[arg(long, requires = "null_output")]
    unpaced: bool,
}

/// Prints events and reports the terminal one
struct ConsoleListener {
    finished: Mutex<mpsc::Sender<Result<(), String>>>,
}

impl PlayerEvents for ConsoleListener {
    fn on_start(&self, mime: &str, sample_rate: u32, channels: u16, duration_ms: u64) {
        println!(
            "{} | {} Hz | {} ch | {}",
            mime,
            sample_rate,
            channels,
            format_ms(duration_ms)
        );
    }

    fn on_play(&self) {
        println!("playing");
    }

    fn on_play_update(&self, percent: u32, current_ms: u64, total_ms: u64) {
        if total_ms > 0 {
            println!("{} / {} ({}%)", format_ms(current_ms), format_ms(total_ms), percent);
        } else {
            println!("{} (live)", format_ms(current_ms));
        }
    }

    fn on_stop(&self) {
        let _ = self.finished.lock().send(Ok(()));
    }

    fn on_error(&self, error: &AudioError) {
        let _ = self.finished.lock().send(Err(error.to_string()));
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, ms % 1000)
}

fn print_codecs() {
    for (i, codec) in tonearm_decode::list_codecs().iter().enumerate() {
        println!("{}. {} {} ({})", i + 1, codec.name, codec.mime, codec.description);
    }
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    if args.list_codecs {
        print_codecs();
        return ExitCode::SUCCESS;
    }
    let Some(source) = args.source else {
        eprintln!("tonearm: no source given");
        return ExitCode::FAILURE;
    };

    let mut config = EngineConfig::default().with_progress_interval(Duration::from_secs(1));
    if let Some(target_ms) = args.target_ms {
        config = config.with_target_duration(Duration::from_millis(target_ms));
    }

    let backend = if args.null_output {
        PlayerBackend::headless(!args.unpaced)
    } else {
        PlayerBackend::default()
    };

    let mut player = match Player::with_backend(backend, config) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("tonearm: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (sender, finished) = mpsc::channel();
    player.set_events_listener(Some(Arc::new(ConsoleListener {
        finished: Mutex::new(sender),
    })));
    player.set_data_source(DataSource::parse(&source));
    player.set_loop(args.looping);

    if let Err(e) = player.play() {
        eprintln!("tonearm: {}", e);
        return ExitCode::FAILURE;
    }

    match finished.recv() {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(message)) => {
            eprintln!("tonearm: {}", message);
            ExitCode::FAILURE
        }
        Err(_) => ExitCode::FAILURE,
    }
}

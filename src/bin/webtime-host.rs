//! Chrome Native Messaging host for WebTime.
//!
//! This binary runs as the standalone native messaging counterpart of the
//! WebTime browser extension. The extension forwards tab/window/idle
//! signals and popup requests over stdin; accrual, limits and day rollover
//! happen here, and notification/badge instructions flow back over stdout.

use directories::ProjectDirs;
use std::io;
use std::sync::{Arc, Mutex};
use webtime_lib::{
    db::{migrations, Database},
    native_host::{self, NativeHost},
    tracker::{
        ticker::{Ticker, TickerConfig},
        Tracker,
    },
};

fn get_db_path() -> std::path::PathBuf {
    let proj_dirs = ProjectDirs::from("com", "webtime", "WebTime")
        .expect("Could not determine project directories");
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir).expect("Could not create data directory");
    data_dir.join("webtime.db")
}

fn main() {
    let db_path = get_db_path();
    let db = Database::open(&db_path).expect("Failed to open database");
    migrations::run(db.connection()).expect("Failed to run migrations");

    let tracker = Arc::new(Tracker::new(Arc::new(Mutex::new(db))));
    tracker
        .startup()
        .expect("Failed to initialize tracker state");

    let output = native_host::shared_writer(io::stdout());

    // The periodic tick bounds accrual staleness while the user sits on one
    // tab; any limit crossing it detects is pushed to the extension.
    let ticker = Ticker::new(Arc::clone(&tracker), TickerConfig::default());
    let ticker_output = Arc::clone(&output);
    let _tick_thread = ticker.start(move |effects| {
        for effect in effects {
            if native_host::write_message(&ticker_output, &native_host::effect_message(effect))
                .is_err()
            {
                break;
            }
        }
    });

    let host = NativeHost::new(Arc::clone(&tracker));
    let stdin = io::stdin();
    let mut input = stdin.lock();

    // Serve until the browser closes the connection
    let result = host.run(&mut input, &output);
    ticker.stop();

    if let Err(e) = result {
        // EOF is expected when the browser shuts the pipe
        if e.kind() != io::ErrorKind::UnexpectedEof {
            eprintln!("Native host error: {}", e);
            std::process::exit(1);
        }
    }
}
